//! Vehicle units, their authorizations and the stock summary.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use caravan_core::DomainError;
use caravan_inventory::{
    Authorization, AuthorizationForm, AuthorizationId, StockEntry, VehicleForm, VehicleUnit,
    VehicleUnitId, summarize_stock,
};

use crate::db::Database;
use crate::error::{StoreResult, db_err};
use crate::ledger::VehicleAvailabilityLedger;
use crate::rows::{
    DATE_FORMAT, VEHICLE_COLUMNS, authorization_from_row, cents, text, timestamp_column,
    vehicle_from_row,
};

#[derive(Debug, Clone)]
pub struct VehicleRepository {
    pool: SqlitePool,
}

impl VehicleRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Create or update a unit from its form.
    ///
    /// The availability flag is never taken from the form: new units start
    /// available, edits keep the stored flag.
    #[instrument(skip(self, form), fields(serial = %form.serial.trim()), err)]
    pub async fn save(&self, form: &VehicleForm) -> StoreResult<VehicleUnit> {
        let stored_flag = match form.id {
            Some(id) => Some(self.get(id).await?.available),
            None => None,
        };
        let unit = form.validate(stored_flag)?;

        self.ensure_unique("serial", &unit.serial, unit.id).await?;
        self.ensure_unique("plate", &unit.plate, unit.id).await?;
        self.ensure_unique("registration_number", &unit.registration_number, unit.id)
            .await?;

        let result = if stored_flag.is_some() {
            sqlx::query(
                r#"
                UPDATE caravanas
                SET serial = ?, brand = ?, model = ?, year = ?, plate = ?,
                    registration_number = ?, kind = ?, price_cents = ?,
                    features = ?, description = ?
                WHERE id = ?
                "#,
            )
            .bind(&unit.serial)
            .bind(&unit.brand)
            .bind(&unit.model)
            .bind(i64::from(unit.year))
            .bind(&unit.plate)
            .bind(&unit.registration_number)
            .bind(&unit.kind)
            .bind(cents(unit.price)?)
            .bind(&unit.features)
            .bind(&unit.description)
            .bind(unit.id.to_string())
            .execute(&self.pool)
            .await
        } else {
            sqlx::query(
                r#"
                INSERT INTO caravanas (id, serial, brand, model, year, plate, registration_number,
                                       kind, price_cents, available, features, description)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(unit.id.to_string())
            .bind(&unit.serial)
            .bind(&unit.brand)
            .bind(&unit.model)
            .bind(i64::from(unit.year))
            .bind(&unit.plate)
            .bind(&unit.registration_number)
            .bind(&unit.kind)
            .bind(cents(unit.price)?)
            .bind(unit.available)
            .bind(&unit.features)
            .bind(&unit.description)
            .execute(&self.pool)
            .await
        };
        result.map_err(db_err("save_vehicle"))?;

        tracing::info!(vehicle_id = %unit.id, "vehicle unit saved");
        Ok(unit)
    }

    pub async fn get(&self, id: VehicleUnitId) -> StoreResult<VehicleUnit> {
        let row = sqlx::query(&format!("SELECT {VEHICLE_COLUMNS} FROM caravanas WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("get_vehicle"))?
            .ok_or_else(|| DomainError::not_found(format!("vehicle unit {id}")))?;
        vehicle_from_row(&row)
    }

    /// All units, ordered by brand.
    pub async fn list(&self) -> StoreResult<Vec<VehicleUnit>> {
        let rows = sqlx::query(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM caravanas ORDER BY brand, model, serial"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list_vehicles"))?;
        rows.iter().map(vehicle_from_row).collect()
    }

    /// Units no sale line item references.
    pub async fn list_available(&self) -> StoreResult<Vec<VehicleUnit>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {VEHICLE_COLUMNS} FROM caravanas c
            WHERE NOT EXISTS (SELECT 1 FROM venta_caravanas vc WHERE vc.vehicle_id = c.id)
            ORDER BY serial
            "#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list_available_vehicles"))?;
        rows.iter().map(vehicle_from_row).collect()
    }

    /// Delete a unit that was never sold. Its authorizations go with it.
    #[instrument(skip(self), fields(vehicle_id = %id), err)]
    pub async fn delete(&self, id: VehicleUnitId) -> StoreResult<()> {
        let unit = self.get(id).await?;

        let (sales,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM venta_caravanas WHERE vehicle_id = ?")
                .bind(id.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(db_err("delete_vehicle"))?;
        if sales > 0 {
            return Err(DomainError::restricted(format!(
                "vehicle unit {} is part of a sale and cannot be deleted",
                unit.serial
            ))
            .into());
        }

        sqlx::query("DELETE FROM caravanas WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err("delete_vehicle"))?;
        tracing::info!("vehicle unit deleted");
        Ok(())
    }

    pub async fn is_available(&self, id: VehicleUnitId) -> StoreResult<bool> {
        let mut conn = self.pool.acquire().await.map_err(db_err("acquire"))?;
        VehicleAvailabilityLedger::on(&mut conn).is_available(id).await
    }

    /// Units whose stored availability flag disagrees with their sales.
    pub async fn inconsistencies(&self) -> StoreResult<Vec<VehicleUnitId>> {
        let mut conn = self.pool.acquire().await.map_err(db_err("acquire"))?;
        VehicleAvailabilityLedger::on(&mut conn).inconsistencies().await
    }

    async fn ensure_unique(
        &self,
        column: &'static str,
        value: &str,
        id: VehicleUnitId,
    ) -> StoreResult<()> {
        let taken: Option<(String,)> = sqlx::query_as(&format!(
            "SELECT serial FROM caravanas WHERE {column} = ? AND id <> ? LIMIT 1"
        ))
        .bind(value)
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("check_vehicle_unique"))?;

        match taken {
            Some((serial,)) => Err(DomainError::conflict(format!(
                "{} {value:?} is already used by vehicle unit {serial}",
                column.replace('_', " ")
            ))
            .into()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthorizationRepository {
    pool: SqlitePool,
}

impl AuthorizationRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    #[instrument(skip(self, form), fields(vehicle_id = %form.vehicle_id), err)]
    pub async fn save(&self, form: &AuthorizationForm) -> StoreResult<Authorization> {
        let authorization = form.validate()?;

        let vehicle: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM caravanas WHERE id = ?")
            .bind(authorization.vehicle_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("save_authorization"))?;
        if vehicle.is_none() {
            return Err(
                DomainError::not_found(format!("vehicle unit {}", authorization.vehicle_id)).into(),
            );
        }

        sqlx::query(
            r#"
            INSERT INTO autorizaciones (id, vehicle_id, number, issued_on, status)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                vehicle_id = excluded.vehicle_id,
                number = excluded.number,
                issued_on = excluded.issued_on,
                status = excluded.status
            "#,
        )
        .bind(authorization.id.to_string())
        .bind(authorization.vehicle_id.to_string())
        .bind(&authorization.number)
        .bind(authorization.issued_on.format(DATE_FORMAT).to_string())
        .bind(&authorization.status)
        .execute(&self.pool)
        .await
        .map_err(db_err("save_authorization"))?;

        Ok(authorization)
    }

    /// Newest first.
    pub async fn list_for_vehicle(&self, vehicle_id: VehicleUnitId) -> StoreResult<Vec<Authorization>> {
        let rows = sqlx::query(
            "SELECT id, vehicle_id, number, issued_on, status FROM autorizaciones \
             WHERE vehicle_id = ? ORDER BY issued_on DESC, number",
        )
        .bind(vehicle_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list_authorizations"))?;
        rows.iter().map(authorization_from_row).collect()
    }

    pub async fn list(&self) -> StoreResult<Vec<Authorization>> {
        let rows = sqlx::query(
            "SELECT id, vehicle_id, number, issued_on, status FROM autorizaciones \
             ORDER BY issued_on DESC, number",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list_authorizations"))?;
        rows.iter().map(authorization_from_row).collect()
    }

    #[instrument(skip(self), fields(authorization_id = %id), err)]
    pub async fn delete(&self, id: AuthorizationId) -> StoreResult<()> {
        let deleted = sqlx::query("DELETE FROM autorizaciones WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err("delete_authorization"))?;
        if deleted.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("authorization {id}")).into());
        }
        Ok(())
    }
}

/// Per-type stock counts kept in the `stock` table.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Recompute the counts from the vehicle units and replace the table.
    #[instrument(skip(self), err)]
    pub async fn refresh(&self) -> StoreResult<Vec<StockEntry>> {
        let mut tx = self.pool.begin().await.map_err(db_err("begin_transaction"))?;

        let rows = sqlx::query(&format!("SELECT {VEHICLE_COLUMNS} FROM caravanas"))
            .fetch_all(&mut *tx)
            .await
            .map_err(db_err("refresh_stock"))?;
        let units = rows
            .iter()
            .map(vehicle_from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        let entries = summarize_stock(&units, Utc::now());

        sqlx::query("DELETE FROM stock")
            .execute(&mut *tx)
            .await
            .map_err(db_err("refresh_stock"))?;
        for entry in &entries {
            sqlx::query("INSERT INTO stock (kind, available, total, updated_at) VALUES (?, ?, ?, ?)")
                .bind(&entry.kind)
                .bind(i64::from(entry.available))
                .bind(i64::from(entry.total))
                .bind(entry.updated_at.to_rfc3339())
                .execute(&mut *tx)
                .await
                .map_err(db_err("refresh_stock"))?;
        }

        tx.commit().await.map_err(db_err("commit_transaction"))?;
        tracing::info!(kinds = entries.len(), "stock refreshed");
        Ok(entries)
    }

    pub async fn list(&self) -> StoreResult<Vec<StockEntry>> {
        let rows = sqlx::query("SELECT kind, available, total, updated_at FROM stock ORDER BY kind")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("list_stock"))?;

        rows.iter()
            .map(|row| {
                let available: i64 = row.try_get("available").map_err(db_err("decode_row"))?;
                let total: i64 = row.try_get("total").map_err(db_err("decode_row"))?;
                Ok(StockEntry {
                    kind: text(row, "kind")?,
                    available: available.max(0) as u32,
                    total: total.max(0) as u32,
                    updated_at: timestamp_column(row, "updated_at")?,
                })
            })
            .collect()
    }
}
