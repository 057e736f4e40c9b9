use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use caravan_core::{AggregateRoot, DomainError, DomainResult, ExpectedVersion, Money, record_id};
use caravan_inventory::VehicleUnitId;
use caravan_parties::ClientId;

record_id!(
    /// Sale identifier.
    SaleId
);

record_id!(
    /// Sale line item identifier.
    LineItemId
);

/// One vehicle unit sold as part of a sale.
///
/// `price` is copied from the unit when the line is created and never
/// changes afterwards, so later list-price edits leave past sales intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineItem {
    pub id: LineItemId,
    pub sale_id: SaleId,
    pub vehicle_id: VehicleUnitId,
    pub price: Money,
}

/// Aggregate root: Sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    id: SaleId,
    client_id: ClientId,
    date: NaiveDate,
    total: Money,
    version: u64,
    line_items: Vec<SaleLineItem>,
}

impl Sale {
    /// Rebuild a sale from stored state.
    pub fn restore(
        id: SaleId,
        client_id: ClientId,
        date: NaiveDate,
        total: Money,
        version: u64,
        line_items: Vec<SaleLineItem>,
    ) -> Self {
        Self {
            id,
            client_id,
            date,
            total,
            version,
            line_items,
        }
    }

    pub fn id_typed(&self) -> SaleId {
        self.id
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Stored total.
    pub fn total(&self) -> Money {
        self.total
    }

    pub fn line_items(&self) -> &[SaleLineItem] {
        &self.line_items
    }

    pub fn vehicle_ids(&self) -> Vec<VehicleUnitId> {
        self.line_items.iter().map(|l| l.vehicle_id).collect()
    }

    /// Sum of the prices captured on the line items.
    pub fn line_total(&self) -> Money {
        self.line_items.iter().map(|l| l.price).sum()
    }

    pub fn contains(&self, vehicle_id: VehicleUnitId) -> bool {
        self.line_items.iter().any(|l| l.vehicle_id == vehicle_id)
    }

    /// Optimistic concurrency expectation for an edit based on this state.
    pub fn expected_version(&self) -> ExpectedVersion {
        ExpectedVersion::Exact(self.version)
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// The final state of a sale edit, handed to the repository for saving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDraft {
    /// `None` for a new sale.
    pub sale_id: Option<SaleId>,
    pub expected_version: ExpectedVersion,
    pub client_id: Option<ClientId>,
    pub date: NaiveDate,
    pub vehicle_ids: Vec<VehicleUnitId>,
}

impl SaleDraft {
    pub fn new(client_id: ClientId, date: NaiveDate, vehicle_ids: Vec<VehicleUnitId>) -> Self {
        Self {
            sale_id: None,
            expected_version: ExpectedVersion::Any,
            client_id: Some(client_id),
            date,
            vehicle_ids,
        }
    }

    /// Turn this draft into an edit of an existing sale.
    pub fn editing(mut self, sale_id: SaleId, expected_version: ExpectedVersion) -> Self {
        self.sale_id = Some(sale_id);
        self.expected_version = expected_version;
        self
    }

    /// A sale needs a client and at least one vehicle unit.
    ///
    /// Returns the client id and the selected unit ids without duplicates
    /// (first occurrence wins).
    pub fn validate(&self) -> DomainResult<(ClientId, Vec<VehicleUnitId>)> {
        let client_id = self
            .client_id
            .ok_or_else(|| DomainError::validation("a client must be selected"))?;

        let mut unique = Vec::with_capacity(self.vehicle_ids.len());
        for id in &self.vehicle_ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        if unique.is_empty() {
            return Err(DomainError::validation(
                "at least one vehicle unit must be selected",
            ));
        }
        Ok((client_id, unique))
    }
}
