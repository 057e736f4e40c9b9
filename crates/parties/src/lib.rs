//! Clients domain module.
//!
//! Client records, form validation and the public lookup code carried by
//! each client's QR card. Pure domain logic (no IO, no storage).

pub mod client;
pub mod qr;

pub use client::{Client, ClientForm, ClientId};
pub use qr::{LookupQuery, QR_PREFIX, extract_public_code, generate_public_code, qr_content};
