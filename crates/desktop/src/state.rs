//! Application state shared by every command.

use std::sync::Arc;

use anyhow::Context;

use caravan_infra::{
    AppConfig, AuthorizationRepository, AutoSaveWorker, ClientRepository, CloudSync, Database,
    DirectorySync, Exporter, FileQrGenerator, JsonSnapshotExporter, ReportGenerator, ReportRunner,
    SaleRepository, StockRepository, VehicleRepository,
};

/// Repositories and collaborators, built once per process.
///
/// Every handle shares the same connection pool; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub clients: ClientRepository,
    pub vehicles: VehicleRepository,
    pub authorizations: AuthorizationRepository,
    pub stock: StockRepository,
    pub sales: SaleRepository,
    pub exporter: Arc<dyn Exporter>,
    pub sync: Arc<dyn CloudSync>,
    pub reports: Arc<dyn ReportGenerator>,
}

impl AppState {
    /// Open the database named by the config and wire the default collaborators.
    pub async fn open(config: AppConfig) -> anyhow::Result<Self> {
        config
            .ensure_dirs()
            .context("failed to create application directories")?;
        let db = Database::open(&config.db_path)
            .await
            .with_context(|| format!("failed to open database {}", config.db_path.display()))?;
        Ok(Self::with_database(config, db))
    }

    pub fn with_database(config: AppConfig, db: Database) -> Self {
        let qr = Arc::new(FileQrGenerator::new(config.qr_dir.clone()));
        let exporter: Arc<dyn Exporter> = Arc::new(JsonSnapshotExporter::new(config.export_dir.clone()));
        let sync: Arc<dyn CloudSync> = Arc::new(DirectorySync::new(config.sync_dir.clone()));
        let reports: Arc<dyn ReportGenerator> = Arc::new(ReportRunner::from_config(&config));

        Self {
            clients: ClientRepository::new(&db, qr),
            vehicles: VehicleRepository::new(&db),
            authorizations: AuthorizationRepository::new(&db),
            stock: StockRepository::new(&db),
            sales: SaleRepository::new(&db),
            exporter,
            sync,
            reports,
            db,
            config,
        }
    }

    /// The periodic backup worker, configured but not started.
    pub fn autosave_worker(&self) -> AutoSaveWorker {
        AutoSaveWorker::new(self.db.clone(), self.exporter.clone(), self.sync.clone())
            .with_interval(self.config.autosave_interval)
            .with_folder(self.config.sync_folder.clone())
    }
}
