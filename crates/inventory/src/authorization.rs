use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use caravan_core::error::required;
use caravan_core::{DomainResult, Entity, record_id};

use crate::vehicle::VehicleUnitId;

record_id!(
    /// Regulatory authorization identifier.
    AuthorizationId
);

/// Regulatory (SENASA) authorization issued for a vehicle unit.
///
/// Deleted together with its vehicle unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub id: AuthorizationId,
    pub vehicle_id: VehicleUnitId,
    pub number: String,
    pub issued_on: NaiveDate,
    pub status: String,
}

impl Entity for Authorization {
    type Id = AuthorizationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationForm {
    pub id: Option<AuthorizationId>,
    pub vehicle_id: VehicleUnitId,
    pub number: String,
    pub issued_on: NaiveDate,
    pub status: String,
}

impl AuthorizationForm {
    pub fn validate(&self) -> DomainResult<Authorization> {
        Ok(Authorization {
            id: self.id.unwrap_or_default(),
            vehicle_id: self.vehicle_id,
            number: required("authorization number", &self.number)?,
            issued_on: self.issued_on,
            status: required("status", &self.status)?,
        })
    }
}
