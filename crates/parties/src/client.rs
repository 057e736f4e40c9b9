use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use caravan_core::error::required;
use caravan_core::{DomainResult, Entity, record_id};

record_id!(
    /// Client identifier.
    ClientId
);

/// A buyer registered with the dealership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub first_name: String,
    pub last_name: String,
    /// National ID (DNI). Unique across clients.
    pub national_id: String,
    pub phone: String,
    pub email: String,
    pub registered_at: DateTime<Utc>,
    /// Opaque code printed on the client's QR card; never the record id.
    pub public_code: Option<String>,
    pub qr_image_path: Option<String>,
}

impl Entity for Client {
    type Id = ClientId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Client {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Whether the lookup code or QR image still has to be generated.
    pub fn needs_qr(&self) -> bool {
        self.public_code.as_deref().is_none_or(|c| c.trim().is_empty())
            || self.qr_image_path.is_none()
    }
}

/// Raw client form input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientForm {
    /// `None` when registering a new client.
    pub id: Option<ClientId>,
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
    pub phone: String,
    pub email: String,
}

impl ClientForm {
    /// Validate the form against the stored record (if editing).
    ///
    /// The registration timestamp and QR data of an existing client are kept;
    /// new clients are stamped with `now`.
    pub fn validate(&self, existing: Option<&Client>, now: DateTime<Utc>) -> DomainResult<Client> {
        let first_name = required("first name", &self.first_name)?;
        let last_name = required("last name", &self.last_name)?;
        let national_id = required("national ID", &self.national_id)?;

        Ok(Client {
            id: existing.map(|c| c.id).or(self.id).unwrap_or_default(),
            first_name,
            last_name,
            national_id,
            phone: self.phone.trim().to_string(),
            email: self.email.trim().to_string(),
            registered_at: existing.map(|c| c.registered_at).unwrap_or(now),
            public_code: existing.and_then(|c| c.public_code.clone()),
            qr_image_path: existing.and_then(|c| c.qr_image_path.clone()),
        })
    }

    pub fn from_client(client: &Client) -> Self {
        Self {
            id: Some(client.id),
            first_name: client.first_name.clone(),
            last_name: client.last_name.clone(),
            national_id: client.national_id.clone(),
            phone: client.phone.clone(),
            email: client.email.clone(),
        }
    }
}
