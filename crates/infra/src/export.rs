//! Full-dataset export.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use caravan_inventory::{Authorization, VehicleUnit};
use caravan_parties::Client;
use caravan_sales::Sale;

use crate::db::Database;
use crate::error::{StoreResult, db_err};
use crate::rows::{CLIENT_COLUMNS, client_from_row};
use crate::sales::SaleRepository;
use crate::vehicles::{AuthorizationRepository, VehicleRepository};

/// Everything the store holds, as of `exported_at`.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub exported_at: DateTime<Utc>,
    pub clients: Vec<Client>,
    pub vehicles: Vec<VehicleUnit>,
    pub sales: Vec<Sale>,
    pub authorizations: Vec<Authorization>,
}

impl Dataset {
    pub async fn load(db: &Database) -> StoreResult<Self> {
        let rows = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clientes ORDER BY last_name, first_name"
        ))
        .fetch_all(db.pool())
        .await
        .map_err(db_err("export_clients"))?;
        let clients = rows
            .iter()
            .map(client_from_row)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Self {
            exported_at: Utc::now(),
            clients,
            vehicles: VehicleRepository::new(db).list().await?,
            sales: SaleRepository::new(db).list_full().await?,
            authorizations: AuthorizationRepository::new(db).list().await?,
        })
    }
}

/// Writes a dataset somewhere and reports where.
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, dataset: &Dataset) -> StoreResult<PathBuf>;
}

/// Pretty-printed JSON snapshots named `Report_{dd-MM-yyyy_HH-mm-ss}.json`.
#[derive(Debug, Clone)]
pub struct JsonSnapshotExporter {
    dir: PathBuf,
}

impl JsonSnapshotExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_name(at: DateTime<Local>) -> String {
        format!("Report_{}.json", at.format("%d-%m-%Y_%H-%M-%S"))
    }
}

#[async_trait]
impl Exporter for JsonSnapshotExporter {
    async fn export(&self, dataset: &Dataset) -> StoreResult<PathBuf> {
        let json = serde_json::to_vec_pretty(dataset)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(Self::file_name(Local::now()));
        tokio::fs::write(&path, json).await?;
        tracing::info!(path = %path.display(), "dataset exported");
        Ok(path)
    }
}
