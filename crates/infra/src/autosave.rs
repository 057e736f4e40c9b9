//! Periodic export + cloud upload.
//!
//! Runs once as soon as it starts and then on every interval tick. A tick
//! that fires while the previous one is still running is skipped, and a
//! failed tick is logged and retried on the next one.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::cloud::CloudSync;
use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::export::{Dataset, Exporter};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_FOLDER: &str = "reportes";

/// Result of one auto-save run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Remote id of the uploaded snapshot.
    Uploaded(String),
    /// Another run was still in progress.
    Skipped,
    Failed(String),
}

pub struct AutoSaveWorker {
    db: Database,
    exporter: Arc<dyn Exporter>,
    sync: Arc<dyn CloudSync>,
    interval: Duration,
    folder: String,
}

impl AutoSaveWorker {
    pub fn new(db: Database, exporter: Arc<dyn Exporter>, sync: Arc<dyn CloudSync>) -> Self {
        Self {
            db,
            exporter,
            sync,
            interval: DEFAULT_INTERVAL,
            folder: DEFAULT_FOLDER.to_string(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    /// Resolve the target folder and spawn the background loop.
    ///
    /// Fails with `CredentialMissing` (nothing scheduled) when the sync
    /// collaborator has no credentials.
    pub async fn start(self) -> StoreResult<AutoSaveHandle> {
        if !self.sync.has_credentials() {
            tracing::warn!("auto-save disabled: cloud sync has no credentials");
            return Err(StoreError::CredentialMissing);
        }
        let folder_id = self.sync.ensure_folder(&self.folder).await?;

        let runner = Arc::new(Runner {
            db: self.db,
            exporter: self.exporter,
            sync: self.sync,
            folder_id,
            running: Mutex::new(()),
        });
        let shutdown = Arc::new(Notify::new());

        let task = {
            let runner = runner.clone();
            let shutdown = shutdown.clone();
            let period = self.interval;
            tokio::spawn(async move {
                tracing::info!(interval_secs = period.as_secs(), "auto-save worker started");

                // The first tick completes immediately.
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

                loop {
                    tokio::select! {
                        _ = shutdown.notified() => {
                            tracing::info!("auto-save worker received shutdown signal");
                            break;
                        }
                        _ = interval.tick() => {
                            runner.tick().await;
                        }
                    }
                }

                tracing::info!("auto-save worker stopped");
            })
        };

        Ok(AutoSaveHandle {
            runner,
            shutdown,
            task,
        })
    }
}

/// Control handle for a running worker.
pub struct AutoSaveHandle {
    runner: Arc<Runner>,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl AutoSaveHandle {
    /// Run one export + upload now, outside the schedule.
    pub async fn trigger_now(&self) -> TickOutcome {
        self.runner.tick().await
    }

    /// Stop the loop and wait for it to exit. A run in progress finishes first.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "auto-save worker ended abnormally");
        }
    }
}

struct Runner {
    db: Database,
    exporter: Arc<dyn Exporter>,
    sync: Arc<dyn CloudSync>,
    folder_id: String,
    running: Mutex<()>,
}

impl Runner {
    async fn tick(&self) -> TickOutcome {
        let Ok(_guard) = self.running.try_lock() else {
            tracing::debug!("auto-save already running; tick skipped");
            return TickOutcome::Skipped;
        };

        match self.run_once().await {
            Ok(remote_id) => {
                tracing::info!(remote_id = %remote_id, "auto-save uploaded");
                TickOutcome::Uploaded(remote_id)
            }
            Err(e) => {
                tracing::warn!(error = %e, "auto-save failed; retrying next tick");
                TickOutcome::Failed(e.to_string())
            }
        }
    }

    async fn run_once(&self) -> StoreResult<String> {
        let dataset = Dataset::load(&self.db).await?;
        let path = self.exporter.export(&dataset).await?;
        self.sync
            .upload_or_replace(&path, &self.folder_id, &target_name(Local::now()))
            .await
    }
}

/// Uploads within the same hour replace each other.
pub(crate) fn target_name(at: DateTime<Local>) -> String {
    format!("AppCaravana_Completo_{}.json", at.format("%Y-%m-%d_%H"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use crate::cloud::DirectorySync;
    use crate::export::JsonSnapshotExporter;
    use crate::test_support::store;

    /// Signals when an export starts, then waits to be released.
    struct GatedExporter {
        entered: Arc<Notify>,
        release: Arc<Notify>,
        inner: JsonSnapshotExporter,
    }

    #[async_trait]
    impl Exporter for GatedExporter {
        async fn export(&self, dataset: &Dataset) -> StoreResult<PathBuf> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.export(dataset).await
        }
    }

    struct FailingExporter;

    #[async_trait]
    impl Exporter for FailingExporter {
        async fn export(&self, _dataset: &Dataset) -> StoreResult<PathBuf> {
            Err(StoreError::External("disk full".into()))
        }
    }

    #[test]
    fn target_name_is_hourly() {
        let at = Local.with_ymd_and_hms(2025, 3, 7, 9, 59, 59).unwrap();
        assert_eq!(target_name(at), "AppCaravana_Completo_2025-03-07_09.json");
    }

    #[tokio::test]
    async fn missing_credentials_schedule_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let worker = AutoSaveWorker::new(
            store().await,
            Arc::new(JsonSnapshotExporter::new(dir.path())),
            Arc::new(DirectorySync::default()),
        );
        assert!(matches!(worker.start().await, Err(StoreError::CredentialMissing)));
    }

    #[tokio::test]
    async fn uploads_into_the_target_folder() {
        let dir = tempfile::tempdir().unwrap();
        let handle = AutoSaveWorker::new(
            store().await,
            Arc::new(JsonSnapshotExporter::new(dir.path().join("exports"))),
            Arc::new(DirectorySync::new(Some(dir.path().join("drive")))),
        )
        .with_interval(Duration::from_secs(3600))
        .start()
        .await
        .unwrap();

        let outcome = loop {
            match handle.trigger_now().await {
                TickOutcome::Skipped => tokio::task::yield_now().await,
                other => break other,
            }
        };
        handle.shutdown().await;

        let TickOutcome::Uploaded(remote) = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        let remote = PathBuf::from(remote);
        assert_eq!(remote.parent().unwrap(), dir.path().join("drive").join("reportes"));
        assert!(remote.exists());
    }

    #[tokio::test]
    async fn overlapping_ticks_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let handle = AutoSaveWorker::new(
            store().await,
            Arc::new(GatedExporter {
                entered: entered.clone(),
                release: release.clone(),
                inner: JsonSnapshotExporter::new(dir.path().join("exports")),
            }),
            Arc::new(DirectorySync::new(Some(dir.path().join("drive")))),
        )
        .start()
        .await
        .unwrap();

        // The immediate run is now parked inside the exporter.
        entered.notified().await;
        assert_eq!(handle.trigger_now().await, TickOutcome::Skipped);

        release.notify_one();
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn failures_are_reported_and_the_worker_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        let handle = AutoSaveWorker::new(
            store().await,
            Arc::new(FailingExporter),
            Arc::new(DirectorySync::new(Some(dir.path().to_path_buf()))),
        )
        .with_folder("backups")
        .start()
        .await
        .unwrap();

        for _ in 0..2 {
            loop {
                match handle.trigger_now().await {
                    TickOutcome::Skipped => tokio::task::yield_now().await,
                    outcome => {
                        assert!(matches!(outcome, TickOutcome::Failed(ref msg) if msg.contains("disk full")));
                        break;
                    }
                }
            }
        }
        assert!(dir.path().join("backups").is_dir());
        handle.shutdown().await;
    }
}
