//! Per-type stock summary derived from the vehicle units.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::vehicle::VehicleUnit;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    pub kind: String,
    pub available: u32,
    pub total: u32,
    pub updated_at: DateTime<Utc>,
}

/// Count units per commercial type, sorted by type name.
pub fn summarize_stock(units: &[VehicleUnit], now: DateTime<Utc>) -> Vec<StockEntry> {
    let mut by_kind: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
    for unit in units {
        let counts = by_kind.entry(unit.kind.as_str()).or_default();
        counts.1 += 1;
        if unit.available {
            counts.0 += 1;
        }
    }

    by_kind
        .into_iter()
        .map(|(kind, (available, total))| StockEntry {
            kind: kind.to_string(),
            available,
            total,
            updated_at: now,
        })
        .collect()
}
