//! Infrastructure layer: SQLite store, repositories, background collaborators.
//!
//! Every repository holds a handle to the shared [`Database`] pool and runs
//! each save/delete as one scoped transaction. There is no ambient session:
//! callers pass the repositories (or [`Database`]) explicitly.

pub mod autosave;
pub mod clients;
pub mod cloud;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod ledger;
pub mod qr;
pub mod reports;
pub mod sales;
pub mod vehicles;

mod rows;
#[cfg(test)]
mod test_support;

pub use autosave::{AutoSaveHandle, AutoSaveWorker, TickOutcome};
pub use clients::{ClientLookup, ClientRepository};
pub use cloud::{CloudSync, DirectorySync};
pub use config::AppConfig;
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use export::{Dataset, Exporter, JsonSnapshotExporter};
pub use ledger::VehicleAvailabilityLedger;
pub use qr::{FileQrGenerator, QrArtifact, QrCodeGenerator, QrRequest};
pub use reports::{ReportGenerator, ReportRunner};
pub use sales::{SaleRepository, SaleSummary};
pub use vehicles::{AuthorizationRepository, StockRepository, VehicleRepository};
