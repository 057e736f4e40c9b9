//! Availability bookkeeping for vehicle units.
//!
//! A unit is available iff no sale line item references it. The ledger keeps
//! the stored `available` flag in step with that rule, and every call runs on
//! the caller's connection (normally an open transaction) so the flag flips
//! atomically with the line-item change that caused it.

use sqlx::SqliteConnection;
use tracing::instrument;

use caravan_core::DomainError;
use caravan_inventory::VehicleUnitId;
use caravan_sales::SaleId;

use crate::error::{StoreResult, db_err};
use crate::rows::parse_id;

pub struct VehicleAvailabilityLedger<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> VehicleAvailabilityLedger<'c> {
    /// Borrow a connection or transaction (`&mut *tx`).
    pub fn on(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// True iff no line item references the unit.
    ///
    /// Fails with `NotFound` if the unit does not exist.
    pub async fn is_available(&mut self, unit_id: VehicleUnitId) -> StoreResult<bool> {
        self.ensure_unit(unit_id).await?;
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM venta_caravanas WHERE vehicle_id = ?")
                .bind(unit_id.to_string())
                .fetch_one(&mut *self.conn)
                .await
                .map_err(db_err("is_available"))?;
        Ok(count == 0)
    }

    /// Mark the unit as sold by `sale_id`.
    ///
    /// Fails with `Conflict` if a line item of a different sale references
    /// the unit, `NotFound` if the unit does not exist.
    #[instrument(skip(self), fields(unit_id = %unit_id, sale_id = %sale_id), err)]
    pub async fn reserve(&mut self, unit_id: VehicleUnitId, sale_id: SaleId) -> StoreResult<()> {
        self.ensure_unit(unit_id).await?;

        let other: Option<(String,)> = sqlx::query_as(
            "SELECT sale_id FROM venta_caravanas WHERE vehicle_id = ? AND sale_id <> ? LIMIT 1",
        )
        .bind(unit_id.to_string())
        .bind(sale_id.to_string())
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(db_err("reserve"))?;

        if let Some((other_sale,)) = other {
            return Err(DomainError::conflict(format!(
                "vehicle unit {unit_id} is already part of sale {other_sale}"
            ))
            .into());
        }

        sqlx::query("UPDATE caravanas SET available = 0 WHERE id = ?")
            .bind(unit_id.to_string())
            .execute(&mut *self.conn)
            .await
            .map_err(db_err("reserve"))?;
        Ok(())
    }

    /// Mark the unit as free unless a sale other than `excluding` still
    /// references it.
    ///
    /// Returns whether the unit was released. Unknown units are a no-op.
    #[instrument(skip(self), fields(unit_id = %unit_id, excluding = %excluding), err)]
    pub async fn release(&mut self, unit_id: VehicleUnitId, excluding: SaleId) -> StoreResult<bool> {
        let (others,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM venta_caravanas WHERE vehicle_id = ? AND sale_id <> ?",
        )
        .bind(unit_id.to_string())
        .bind(excluding.to_string())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(db_err("release"))?;

        if others > 0 {
            tracing::warn!(others, "vehicle unit still referenced by another sale; left reserved");
            return Ok(false);
        }

        let updated = sqlx::query("UPDATE caravanas SET available = 1 WHERE id = ?")
            .bind(unit_id.to_string())
            .execute(&mut *self.conn)
            .await
            .map_err(db_err("release"))?;
        Ok(updated.rows_affected() > 0)
    }

    /// Units whose stored flag disagrees with their line items.
    pub async fn inconsistencies(&mut self) -> StoreResult<Vec<VehicleUnitId>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT c.id
            FROM caravanas c
            WHERE c.available <> CASE
                WHEN EXISTS (SELECT 1 FROM venta_caravanas vc WHERE vc.vehicle_id = c.id) THEN 0
                ELSE 1
            END
            ORDER BY c.serial
            "#,
        )
        .fetch_all(&mut *self.conn)
        .await
        .map_err(db_err("inconsistencies"))?;

        rows.iter().map(|(id,)| parse_id("caravanas.id", id)).collect()
    }

    async fn ensure_unit(&mut self, unit_id: VehicleUnitId) -> StoreResult<()> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM caravanas WHERE id = ?")
            .bind(unit_id.to_string())
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(db_err("find_vehicle"))?;
        match found {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found(format!("vehicle unit {unit_id}")).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caravan_sales::SaleDraft;

    use crate::clients::ClientRepository;
    use crate::sales::SaleRepository;
    use crate::test_support::{date, memory_qr, sample_client, sample_vehicle, store};
    use crate::vehicles::VehicleRepository;

    #[tokio::test]
    async fn reserve_is_idempotent_for_the_owning_sale_only() {
        let db = store().await;
        let client = ClientRepository::new(&db, memory_qr())
            .save(&sample_client("30111222"))
            .await
            .unwrap();
        let unit = VehicleRepository::new(&db)
            .save(&sample_vehicle("U1", "1000"))
            .await
            .unwrap();
        let sale = SaleRepository::new(&db)
            .save(&SaleDraft::new(client.id, date(2025, 3, 1), vec![unit.id]))
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let mut ledger = VehicleAvailabilityLedger::on(&mut conn);
        assert!(!ledger.is_available(unit.id).await.unwrap());
        ledger.reserve(unit.id, sale.id_typed()).await.unwrap();

        let err = ledger.reserve(unit.id, SaleId::new()).await.unwrap_err();
        assert!(err.is_conflict());

        // Still referenced by its own sale's line item.
        assert!(!ledger.release(unit.id, SaleId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_units_are_not_found() {
        let db = store().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let mut ledger = VehicleAvailabilityLedger::on(&mut conn);

        let err = ledger.is_available(VehicleUnitId::new()).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::NotFound(_))));
        let err = ledger
            .reserve(VehicleUnitId::new(), SaleId::new())
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::NotFound(_))));
        assert!(!ledger.release(VehicleUnitId::new(), SaleId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn drifted_flags_are_reported() {
        let db = store().await;
        let vehicles = VehicleRepository::new(&db);
        let unit = vehicles.save(&sample_vehicle("U1", "1000")).await.unwrap();
        vehicles.save(&sample_vehicle("U2", "1000")).await.unwrap();
        assert!(vehicles.inconsistencies().await.unwrap().is_empty());

        sqlx::query("UPDATE caravanas SET available = 0 WHERE id = ?")
            .bind(unit.id.to_string())
            .execute(db.pool())
            .await
            .unwrap();
        assert_eq!(vehicles.inconsistencies().await.unwrap(), vec![unit.id]);
    }
}
