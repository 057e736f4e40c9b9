//! Working set of vehicle units while a sale is being created or edited.

use std::collections::HashSet;

use chrono::NaiveDate;

use caravan_core::{DomainError, DomainResult, ExpectedVersion, Money};
use caravan_inventory::{VehicleUnit, VehicleUnitId};
use caravan_parties::ClientId;

use crate::sale::{SaleDraft, SaleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionState {
    Empty,
    Populated,
}

/// In-memory sale composition, independent of persistence.
///
/// Tracks two lists: the units selected for the sale and the pool the user
/// may pick from. When editing an existing sale, the units already attached
/// to it stay pickable even though they are globally unavailable, since they
/// are unavailable only because of this very sale.
#[derive(Debug, Clone)]
pub struct SaleCompositionEditor {
    sale_id: Option<SaleId>,
    expected_version: ExpectedVersion,
    selected: Vec<VehicleUnit>,
    pool: Vec<VehicleUnit>,
    attached_at_load: HashSet<VehicleUnitId>,
}

impl SaleCompositionEditor {
    /// Start composing a new sale. Only available units enter the pool.
    pub fn new(candidates: Vec<VehicleUnit>) -> Self {
        Self {
            sale_id: None,
            expected_version: ExpectedVersion::Any,
            selected: Vec::new(),
            pool: candidates.into_iter().filter(|u| u.available).collect(),
            attached_at_load: HashSet::new(),
        }
    }

    /// Start editing an existing sale whose line items reference `attached`.
    pub fn for_sale(
        sale_id: SaleId,
        expected_version: ExpectedVersion,
        attached: Vec<VehicleUnit>,
        candidates: Vec<VehicleUnit>,
    ) -> Self {
        let mut editor = Self::new(candidates);
        editor.sale_id = Some(sale_id);
        editor.expected_version = expected_version;
        editor.attached_at_load = attached.iter().map(|u| u.id).collect();
        editor.pool.retain(|u| !editor.attached_at_load.contains(&u.id));
        editor.selected = attached;
        editor
    }

    pub fn sale_id(&self) -> Option<SaleId> {
        self.sale_id
    }

    pub fn state(&self) -> CompositionState {
        if self.selected.is_empty() {
            CompositionState::Empty
        } else {
            CompositionState::Populated
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn contains(&self, unit_id: VehicleUnitId) -> bool {
        self.selected.iter().any(|u| u.id == unit_id)
    }

    /// Add a unit to the selection. Returns `false` (and changes nothing) if
    /// it is already selected.
    pub fn add_unit(&mut self, unit: VehicleUnit) -> bool {
        if self.contains(unit.id) {
            return false;
        }
        self.pool.retain(|u| u.id != unit.id);
        self.selected.push(unit);
        true
    }

    /// Remove a unit from the selection.
    ///
    /// The unit goes back to the pick pool if it was free before this edit
    /// session, or if it belonged to the sale being edited.
    pub fn remove_unit(&mut self, unit_id: VehicleUnitId) -> Option<VehicleUnit> {
        let idx = self.selected.iter().position(|u| u.id == unit_id)?;
        let unit = self.selected.remove(idx);
        let pickable = unit.available || self.attached_at_load.contains(&unit.id);
        if pickable && self.pool.iter().all(|u| u.id != unit.id) {
            self.pool.push(unit.clone());
        }
        Some(unit)
    }

    /// Sum of the selected units' current list prices.
    pub fn total(&self) -> Money {
        self.selected.iter().map(|u| u.price).sum()
    }

    /// Selected units, ordered by serial.
    pub fn selected(&self) -> Vec<&VehicleUnit> {
        sorted_by_serial(&self.selected)
    }

    pub fn selected_ids(&self) -> Vec<VehicleUnitId> {
        self.selected.iter().map(|u| u.id).collect()
    }

    /// Units that can still be picked, ordered by serial.
    pub fn available_pool(&self) -> Vec<&VehicleUnit> {
        sorted_by_serial(&self.pool)
    }

    /// Find a pool unit by id (so a UI can add by id).
    pub fn pool_unit(&self, unit_id: VehicleUnitId) -> Option<&VehicleUnit> {
        self.pool.iter().find(|u| u.id == unit_id)
    }

    /// A sale can be saved once a client is chosen and a unit is selected.
    pub fn validate_for_save(&self, client_id: Option<ClientId>) -> DomainResult<ClientId> {
        let client_id =
            client_id.ok_or_else(|| DomainError::validation("a client must be selected"))?;
        if self.selected.is_empty() {
            return Err(DomainError::validation(
                "at least one vehicle unit must be selected",
            ));
        }
        Ok(client_id)
    }

    /// Build the draft to hand to the repository.
    pub fn to_draft(&self, client_id: Option<ClientId>, date: NaiveDate) -> DomainResult<SaleDraft> {
        let client_id = self.validate_for_save(client_id)?;
        Ok(SaleDraft {
            sale_id: self.sale_id,
            expected_version: self.expected_version,
            client_id: Some(client_id),
            date,
            vehicle_ids: self.selected_ids(),
        })
    }
}

fn sorted_by_serial(units: &[VehicleUnit]) -> Vec<&VehicleUnit> {
    let mut out: Vec<&VehicleUnit> = units.iter().collect();
    out.sort_by(|a, b| a.serial.cmp(&b.serial));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use caravan_core::DomainError;
    use proptest::prelude::*;

    fn unit(serial: &str, units: u64, available: bool) -> VehicleUnit {
        VehicleUnit {
            id: VehicleUnitId::new(),
            serial: serial.into(),
            brand: "Vulcano".into(),
            model: "R".into(),
            year: 2024,
            plate: format!("P-{serial}"),
            registration_number: format!("R-{serial}"),
            kind: "trailer".into(),
            price: Money::from_units(units),
            available,
            features: String::new(),
            description: String::new(),
        }
    }

    fn serials(units: Vec<&VehicleUnit>) -> Vec<&str> {
        units.into_iter().map(|u| u.serial.as_str()).collect()
    }

    #[test]
    fn new_editor_pools_only_available_units() {
        let editor = SaleCompositionEditor::new(vec![
            unit("B", 10, true),
            unit("A", 10, true),
            unit("C", 10, false),
        ]);
        assert_eq!(editor.state(), CompositionState::Empty);
        assert_eq!(serials(editor.available_pool()), vec!["A", "B"]);
    }

    #[test]
    fn add_is_idempotent_and_updates_total() {
        let u1 = unit("U1", 1000, true);
        let u2 = unit("U2", 1500, true);
        let mut editor = SaleCompositionEditor::new(vec![u1.clone(), u2.clone()]);

        assert!(editor.add_unit(u1.clone()));
        assert!(!editor.add_unit(u1.clone()));
        assert!(editor.add_unit(u2));

        assert_eq!(editor.state(), CompositionState::Populated);
        assert_eq!(editor.total(), Money::from_units(2500));
        assert!(editor.available_pool().is_empty());
    }

    #[test]
    fn removed_free_unit_returns_to_pool() {
        let u1 = unit("U1", 1000, true);
        let mut editor = SaleCompositionEditor::new(vec![u1.clone()]);
        editor.add_unit(u1.clone());
        assert!(editor.remove_unit(u1.id).is_some());

        assert_eq!(editor.state(), CompositionState::Empty);
        assert_eq!(editor.total(), Money::ZERO);
        assert_eq!(serials(editor.available_pool()), vec!["U1"]);
        assert!(editor.remove_unit(u1.id).is_none());
    }

    #[test]
    fn removed_unit_reserved_elsewhere_does_not_return() {
        let foreign = unit("X", 500, false);
        let mut editor = SaleCompositionEditor::new(vec![]);
        editor.add_unit(foreign.clone());
        editor.remove_unit(foreign.id);
        assert!(editor.available_pool().is_empty());
    }

    #[test]
    fn editing_shows_attached_units_as_pickable() {
        let u1 = unit("U1", 1000, false);
        let u2 = unit("U2", 1500, false);
        let u3 = unit("U3", 2000, true);
        let sale_id = SaleId::new();
        let mut editor = SaleCompositionEditor::for_sale(
            sale_id,
            ExpectedVersion::Exact(1),
            vec![u1.clone(), u2.clone()],
            vec![u1.clone(), u2.clone(), u3.clone()],
        );

        assert_eq!(editor.sale_id(), Some(sale_id));
        assert_eq!(editor.total(), Money::from_units(2500));
        assert_eq!(serials(editor.available_pool()), vec!["U3"]);

        editor.remove_unit(u2.id);
        editor.add_unit(u3.clone());

        assert_eq!(editor.total(), Money::from_units(3000));
        assert_eq!(serials(editor.available_pool()), vec!["U2"]);
        assert_eq!(serials(editor.selected()), vec!["U1", "U3"]);

        let draft = editor
            .to_draft(Some(ClientId::new()), NaiveDate::from_ymd_opt(2025, 12, 1).unwrap())
            .unwrap();
        assert_eq!(draft.sale_id, Some(sale_id));
        assert_eq!(draft.expected_version, ExpectedVersion::Exact(1));
        assert_eq!(draft.vehicle_ids, vec![u1.id, u3.id]);
    }

    #[test]
    fn empty_selection_cannot_be_saved() {
        let editor = SaleCompositionEditor::new(vec![unit("A", 1, true)]);
        let err = editor
            .to_draft(Some(ClientId::new()), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(usize),
        Remove(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![(0usize..6).prop_map(Op::Add), (0usize..6).prop_map(Op::Remove)]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: after any sequence of adds and removes, the total equals
        /// the sum of the selected units' prices and nothing is selected twice.
        #[test]
        fn total_tracks_selection(
            prices in prop::collection::vec(0u64..5_000_000u64, 6),
            availability in prop::collection::vec(any::<bool>(), 6),
            ops in prop::collection::vec(op(), 0..40),
        ) {
            let units: Vec<VehicleUnit> = prices
                .iter()
                .zip(&availability)
                .enumerate()
                .map(|(i, (p, a))| {
                    let mut u = unit(&format!("S{i}"), 0, *a);
                    u.price = Money::from_cents(*p);
                    u
                })
                .collect();
            let mut editor = SaleCompositionEditor::new(units.clone());

            for op in ops {
                match op {
                    Op::Add(i) => { editor.add_unit(units[i].clone()); }
                    Op::Remove(i) => { editor.remove_unit(units[i].id); }
                }
                let expected: Money = editor.selected().iter().map(|u| u.price).sum();
                prop_assert_eq!(editor.total(), expected);

                let ids = editor.selected_ids();
                let unique: HashSet<_> = ids.iter().collect();
                prop_assert_eq!(unique.len(), ids.len());
                for id in &ids {
                    prop_assert!(editor.pool_unit(*id).is_none());
                }
            }
        }
    }
}
