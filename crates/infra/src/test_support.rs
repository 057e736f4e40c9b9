//! Shared fixtures for the store tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use caravan_inventory::VehicleForm;
use caravan_parties::{ClientForm, ClientId, generate_public_code, qr_content};

use crate::db::Database;
use crate::error::StoreResult;
use crate::qr::{QrArtifact, QrCodeGenerator, QrRequest};

pub(crate) async fn store() -> Database {
    Database::in_memory().await.unwrap()
}

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub(crate) fn sample_vehicle(serial: &str, price: &str) -> VehicleForm {
    VehicleForm {
        id: None,
        serial: serial.into(),
        brand: "Bahiker".into(),
        model: "Explorer".into(),
        year: "2024".into(),
        plate: format!("PLATE-{serial}"),
        registration_number: format!("REG-{serial}"),
        kind: "Trailer".into(),
        price: price.into(),
        features: String::new(),
        description: String::new(),
    }
}

pub(crate) fn sample_client(national_id: &str) -> ClientForm {
    ClientForm {
        id: None,
        first_name: "Ana".into(),
        last_name: "Gomez".into(),
        national_id: national_id.into(),
        phone: "555-0101".into(),
        email: "ana@example.com".into(),
    }
}

/// QR generator that keeps nothing on disk.
#[derive(Debug, Default)]
pub(crate) struct MemoryQr;

#[async_trait]
impl QrCodeGenerator for MemoryQr {
    async fn generate(&self, request: &QrRequest) -> StoreResult<QrArtifact> {
        let public_code = request
            .existing_code
            .clone()
            .unwrap_or_else(generate_public_code);
        Ok(QrArtifact {
            image_path: PathBuf::from(format!("memory/Cliente_{}_QR", request.client_id)),
            content: qr_content(
                &public_code,
                &request.full_name,
                request.sale_count,
                request.sales_total,
            ),
            public_code,
        })
    }

    fn has_image(&self, _path: &Path) -> bool {
        true
    }

    async fn delete_image(&self, _client_id: ClientId) -> StoreResult<()> {
        Ok(())
    }
}

pub(crate) fn memory_qr() -> Arc<dyn QrCodeGenerator> {
    Arc::new(MemoryQr)
}
