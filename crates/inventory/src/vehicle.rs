use serde::{Deserialize, Serialize};

use caravan_core::error::required;
use caravan_core::{DomainError, DomainResult, Entity, Money, record_id};

record_id!(
    /// Vehicle unit identifier.
    VehicleUnitId
);

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

/// A single towable unit in the dealership's inventory.
///
/// Serial, plate and registration number are each unique across all units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleUnit {
    pub id: VehicleUnitId,
    pub serial: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub plate: String,
    pub registration_number: String,
    /// Commercial type (single axle, trailer, light, ...).
    pub kind: String,
    /// Current list price. Line items copy it at sale time.
    pub price: Money,
    /// False iff the unit appears in at least one sale line item.
    pub available: bool,
    pub features: String,
    pub description: String,
}

impl Entity for VehicleUnit {
    type Id = VehicleUnitId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl VehicleUnit {
    /// Short label used in listings: `serial (brand model)`.
    pub fn label(&self) -> String {
        format!("{} ({} {})", self.serial, self.brand, self.model)
    }
}

/// Raw vehicle form input.
///
/// Availability is not part of the form: new units always start available
/// and afterwards only sale composition changes the flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleForm {
    /// `None` when registering a new unit.
    pub id: Option<VehicleUnitId>,
    pub serial: String,
    pub brand: String,
    pub model: String,
    pub year: String,
    pub plate: String,
    pub registration_number: String,
    pub kind: String,
    pub price: String,
    pub features: String,
    pub description: String,
}

impl VehicleForm {
    /// Validate the form and build the unit it describes.
    ///
    /// `available` is the flag currently stored for an existing unit; it is
    /// carried over untouched. New units are always available.
    pub fn validate(&self, available: Option<bool>) -> DomainResult<VehicleUnit> {
        let serial = required("serial", &self.serial)?;
        let brand = required("brand", &self.brand)?;
        let model = required("model", &self.model)?;
        let year_raw = required("year", &self.year)?;
        let plate = required("plate", &self.plate)?;
        let registration_number = required("registration number", &self.registration_number)?;
        let kind = required("type", &self.kind)?;
        let price_raw = required("price", &self.price)?;

        let year: i32 = year_raw
            .parse()
            .map_err(|_| DomainError::validation(format!("year {year_raw:?} is not a number")))?;
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(DomainError::validation(format!(
                "year must be between {MIN_YEAR} and {MAX_YEAR}"
            )));
        }
        let price: Money = price_raw.parse()?;

        Ok(VehicleUnit {
            id: self.id.unwrap_or_default(),
            serial,
            brand,
            model,
            year,
            plate,
            registration_number,
            kind,
            price,
            available: available.unwrap_or(true),
            features: self.features.trim().to_string(),
            description: self.description.trim().to_string(),
        })
    }

    /// Pre-fill a form from a stored unit (edit screen).
    pub fn from_unit(unit: &VehicleUnit) -> Self {
        Self {
            id: Some(unit.id),
            serial: unit.serial.clone(),
            brand: unit.brand.clone(),
            model: unit.model.clone(),
            year: unit.year.to_string(),
            plate: unit.plate.clone(),
            registration_number: unit.registration_number.clone(),
            kind: unit.kind.clone(),
            price: unit.price.to_string(),
            features: unit.features.clone(),
            description: unit.description.clone(),
        }
    }
}
