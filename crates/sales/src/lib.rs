//! Sales domain module.
//!
//! A sale aggregates one or more vehicle units for a client. This crate holds
//! the sale record, the in-memory composition editor used while a sale is
//! being built or edited, and the reconciliation plan that diffs an edited
//! selection against the persisted line items. No IO, no storage.

pub mod composition;
pub mod reconcile;
pub mod sale;

pub use composition::{CompositionState, SaleCompositionEditor};
pub use reconcile::{ReconciliationPlan, plan_reconciliation};
pub use sale::{LineItemId, Sale, SaleDraft, SaleId, SaleLineItem};
