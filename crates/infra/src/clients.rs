//! Client persistence, QR card upkeep and QR lookup.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::instrument;

use caravan_core::{DomainError, Money};
use caravan_parties::{Client, ClientForm, ClientId, LookupQuery};

use crate::db::Database;
use crate::error::{StoreResult, db_err};
use crate::qr::{QrCodeGenerator, QrRequest};
use crate::rows::{CLIENT_COLUMNS, client_from_row};
use crate::sales::{SaleRepository, SaleSummary};

/// A client found through its QR card, with its purchase history.
#[derive(Debug, Clone, Serialize)]
pub struct ClientLookup {
    pub client: Client,
    /// Newest first.
    pub sales: Vec<SaleSummary>,
    pub sale_count: usize,
    pub sales_total: Money,
    pub unit_total: usize,
}

#[derive(Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
    sales: SaleRepository,
    qr: Arc<dyn QrCodeGenerator>,
}

impl std::fmt::Debug for ClientRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRepository").finish_non_exhaustive()
    }
}

impl ClientRepository {
    pub fn new(db: &Database, qr: Arc<dyn QrCodeGenerator>) -> Self {
        Self {
            pool: db.pool().clone(),
            sales: SaleRepository::new(db),
            qr,
        }
    }

    /// Register or update a client, then refresh its QR card.
    ///
    /// QR failures are logged; the client is saved regardless.
    #[instrument(skip(self, form), fields(client_id = ?form.id), err)]
    pub async fn save(&self, form: &ClientForm) -> StoreResult<Client> {
        let existing = match form.id {
            Some(id) => Some(self.get(id).await?),
            None => None,
        };
        let mut client = form.validate(existing.as_ref(), Utc::now())?;

        let holder: Option<(String, String)> = sqlx::query_as(
            "SELECT first_name, last_name FROM clientes WHERE national_id = ? AND id <> ?",
        )
        .bind(&client.national_id)
        .bind(client.id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("check_client_unique"))?;
        if let Some((first, last)) = holder {
            return Err(DomainError::conflict(format!(
                "national ID {} is already registered to {first} {last}",
                client.national_id
            ))
            .into());
        }

        let result = if existing.is_some() {
            sqlx::query(
                r#"
                UPDATE clientes
                SET first_name = ?, last_name = ?, national_id = ?, phone = ?, email = ?
                WHERE id = ?
                "#,
            )
            .bind(&client.first_name)
            .bind(&client.last_name)
            .bind(&client.national_id)
            .bind(&client.phone)
            .bind(&client.email)
            .bind(client.id.to_string())
            .execute(&self.pool)
            .await
        } else {
            sqlx::query(
                r#"
                INSERT INTO clientes (id, first_name, last_name, national_id, phone, email, registered_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(client.id.to_string())
            .bind(&client.first_name)
            .bind(&client.last_name)
            .bind(&client.national_id)
            .bind(&client.phone)
            .bind(&client.email)
            .bind(client.registered_at.to_rfc3339())
            .execute(&self.pool)
            .await
        };
        result.map_err(db_err("save_client"))?;

        if let Err(e) = self.refresh_qr(&mut client).await {
            tracing::warn!(client_id = %client.id, error = %e, "QR card could not be generated");
        }

        tracing::info!(client_id = %client.id, "client saved");
        Ok(client)
    }

    pub async fn get(&self, id: ClientId) -> StoreResult<Client> {
        let row = sqlx::query(&format!("SELECT {CLIENT_COLUMNS} FROM clientes WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("get_client"))?
            .ok_or_else(|| DomainError::not_found(format!("client {id}")))?;
        client_from_row(&row)
    }

    /// All clients by last then first name, filling in missing QR cards.
    pub async fn list(&self) -> StoreResult<Vec<Client>> {
        let rows = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clientes ORDER BY last_name, first_name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list_clients"))?;

        let mut clients = rows
            .iter()
            .map(client_from_row)
            .collect::<StoreResult<Vec<_>>>()?;

        for client in &mut clients {
            let image_missing = client
                .qr_image_path
                .as_deref()
                .is_none_or(|p| !self.qr.has_image(Path::new(p)));
            if client.needs_qr() || image_missing {
                if let Err(e) = self.refresh_qr(client).await {
                    tracing::warn!(client_id = %client.id, error = %e, "QR card could not be generated");
                }
            }
        }
        Ok(clients)
    }

    /// Delete a client without sales and its QR image.
    #[instrument(skip(self), fields(client_id = %id), err)]
    pub async fn delete(&self, id: ClientId) -> StoreResult<()> {
        let client = self.get(id).await?;

        let (sales,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ventas WHERE client_id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("delete_client"))?;
        if sales > 0 {
            return Err(DomainError::restricted(format!(
                "client {} has {sales} sale(s) and cannot be deleted",
                client.full_name()
            ))
            .into());
        }

        sqlx::query("DELETE FROM clientes WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err("delete_client"))?;

        if let Err(e) = self.qr.delete_image(id).await {
            tracing::warn!(error = %e, "QR image could not be removed");
        }
        tracing::info!("client deleted");
        Ok(())
    }

    /// Find a client from scanned QR content or a typed public code.
    #[instrument(skip(self), err)]
    pub async fn lookup(&self, input: &str) -> StoreResult<ClientLookup> {
        let query = LookupQuery::parse(input)?;
        let client = self
            .find_by_public_code(query.public_code())
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("no client with code {}", query.public_code()))
            })?;

        let sales = self.sales_of(client.id).await?;
        Ok(ClientLookup {
            sale_count: sales.len(),
            sales_total: sales.iter().map(|s| s.total).sum(),
            unit_total: sales.iter().map(SaleSummary::unit_count).sum(),
            client,
            sales,
        })
    }

    pub async fn find_by_public_code(&self, code: &str) -> StoreResult<Option<Client>> {
        let row = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clientes WHERE public_code = ? COLLATE NOCASE"
        ))
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("find_client_by_code"))?;
        row.as_ref().map(client_from_row).transpose()
    }

    pub async fn sales_of(&self, id: ClientId) -> StoreResult<Vec<SaleSummary>> {
        self.sales.sales_of_client(id).await
    }

    /// Regenerate the QR card (keeping the public code) and store its path.
    async fn refresh_qr(&self, client: &mut Client) -> StoreResult<()> {
        let (sale_count, total_cents): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(total_cents), 0) FROM ventas WHERE client_id = ?",
        )
        .bind(client.id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("client_sales_totals"))?;

        let artifact = self
            .qr
            .generate(&QrRequest {
                client_id: client.id,
                full_name: client.full_name(),
                existing_code: client.public_code.clone().filter(|c| !c.trim().is_empty()),
                sale_count: sale_count.max(0) as usize,
                sales_total: Money::from_cents(total_cents.max(0) as u64),
            })
            .await?;

        let image_path = artifact.image_path.to_string_lossy().into_owned();
        sqlx::query("UPDATE clientes SET public_code = ?, qr_image_path = ? WHERE id = ?")
            .bind(&artifact.public_code)
            .bind(&image_path)
            .bind(client.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err("store_qr"))?;

        client.public_code = Some(artifact.public_code);
        client.qr_image_path = Some(image_path);
        Ok(())
    }
}
