//! Reconciliation: diff an edited selection against persisted line items.

use caravan_inventory::VehicleUnitId;

use crate::sale::SaleLineItem;

/// What has to change so the persisted line items match a new selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Persisted line items whose unit is no longer selected.
    pub to_remove: Vec<SaleLineItem>,
    /// Persisted line items that stay untouched (their captured price too).
    pub kept: Vec<SaleLineItem>,
    /// Selected units that have no line item yet.
    pub to_add: Vec<VehicleUnitId>,
}

impl ReconciliationPlan {
    pub fn is_noop(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

pub fn plan_reconciliation(persisted: &[SaleLineItem], selected: &[VehicleUnitId]) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();

    for item in persisted {
        if selected.contains(&item.vehicle_id) {
            plan.kept.push(item.clone());
        } else {
            plan.to_remove.push(item.clone());
        }
    }

    for id in selected {
        let persisted_already = persisted.iter().any(|l| l.vehicle_id == *id);
        if !persisted_already && !plan.to_add.contains(id) {
            plan.to_add.push(*id);
        }
    }

    plan
}
