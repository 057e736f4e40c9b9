//! QR card collaborator.
//!
//! Rendering an actual QR image is out of scope; [`FileQrGenerator`] writes
//! the encoded content to a text file where the image would go, which keeps
//! the lookup round trip testable.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use caravan_core::Money;
use caravan_parties::{ClientId, generate_public_code, qr_content};

use crate::error::StoreResult;

/// What a QR card encodes for one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrRequest {
    pub client_id: ClientId,
    pub full_name: String,
    /// Reused when present so printed cards stay valid.
    pub existing_code: Option<String>,
    pub sale_count: usize,
    pub sales_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrArtifact {
    pub image_path: PathBuf,
    pub content: String,
    pub public_code: String,
}

#[async_trait]
pub trait QrCodeGenerator: Send + Sync {
    async fn generate(&self, request: &QrRequest) -> StoreResult<QrArtifact>;

    fn has_image(&self, path: &Path) -> bool {
        path.exists()
    }

    async fn delete_image(&self, client_id: ClientId) -> StoreResult<()>;
}

/// Writes `Cliente_{id}_QR.txt` files under one directory.
#[derive(Debug, Clone)]
pub struct FileQrGenerator {
    dir: PathBuf,
}

impl FileQrGenerator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn image_path(&self, client_id: ClientId) -> PathBuf {
        self.dir.join(format!("Cliente_{client_id}_QR.txt"))
    }
}

#[async_trait]
impl QrCodeGenerator for FileQrGenerator {
    async fn generate(&self, request: &QrRequest) -> StoreResult<QrArtifact> {
        let public_code = request
            .existing_code
            .clone()
            .unwrap_or_else(generate_public_code);
        let content = qr_content(
            &public_code,
            &request.full_name,
            request.sale_count,
            request.sales_total,
        );

        tokio::fs::create_dir_all(&self.dir).await?;
        let image_path = self.image_path(request.client_id);
        tokio::fs::write(&image_path, &content).await?;

        Ok(QrArtifact {
            image_path,
            content,
            public_code,
        })
    }

    async fn delete_image(&self, client_id: ClientId) -> StoreResult<()> {
        match tokio::fs::remove_file(self.image_path(client_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
