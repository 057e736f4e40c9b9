//! Inventory domain module.
//!
//! Vehicle units (caravans), their regulatory authorizations and the per-type
//! stock summary, implemented purely as deterministic domain logic (no IO, no
//! storage). Availability bookkeeping lives with the store, which flips
//! [`VehicleUnit::available`] in the same transaction as the sale change that
//! caused it.

pub mod authorization;
pub mod stock;
pub mod vehicle;

pub use authorization::{Authorization, AuthorizationForm, AuthorizationId};
pub use stock::{StockEntry, summarize_stock};
pub use vehicle::{VehicleForm, VehicleUnit, VehicleUnitId};
