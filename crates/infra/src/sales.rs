//! Sale persistence.
//!
//! `save` and `delete_sale` each run in one transaction together with the
//! availability changes they cause; any failure rolls the whole thing back,
//! leaving line items and availability flags as they were.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::instrument;

use caravan_core::{DomainError, Money};
use caravan_inventory::{VehicleUnit, VehicleUnitId};
use caravan_parties::ClientId;
use caravan_sales::{
    LineItemId, Sale, SaleCompositionEditor, SaleDraft, SaleId, SaleLineItem, plan_reconciliation,
};

use crate::db::Database;
use crate::error::{StoreError, StoreResult, db_err};
use crate::ledger::VehicleAvailabilityLedger;
use crate::rows::{
    DATE_FORMAT, VEHICLE_COLUMNS, cents, date_column, id_column, line_item_from_row, money_column,
    parse_id, vehicle_from_row,
};
use crate::vehicles::VehicleRepository;

/// One row of the sales list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleSummary {
    pub sale_id: SaleId,
    pub date: NaiveDate,
    pub total: Money,
    pub client_id: ClientId,
    pub client_name: String,
    /// Serials of the units in the sale, sorted.
    pub vehicle_serials: Vec<String>,
}

impl SaleSummary {
    pub fn unit_count(&self) -> usize {
        self.vehicle_serials.len()
    }
}

#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    vehicles: VehicleRepository,
}

impl SaleRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
            vehicles: VehicleRepository::new(db),
        }
    }

    /// Create or edit a sale so its line items match the draft's selection.
    ///
    /// Removed units are released, added units are reserved at their current
    /// price, kept line items keep the price captured when they were added.
    /// The stored total is the sum of the final line items.
    #[instrument(
        skip(self, draft),
        fields(sale_id = ?draft.sale_id, units = draft.vehicle_ids.len()),
        err
    )]
    pub async fn save(&self, draft: &SaleDraft) -> StoreResult<Sale> {
        let (client_id, vehicle_ids) = draft.validate()?;

        let mut tx = self.pool.begin().await.map_err(db_err("begin_transaction"))?;

        match save_in(&mut tx, draft, client_id, &vehicle_ids).await {
            Ok(sale) => {
                tx.commit().await.map_err(db_err("commit_transaction"))?;
                tracing::info!(
                    sale_id = %sale.id_typed(),
                    total = %sale.total(),
                    "sale saved"
                );
                Ok(sale)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Delete a sale, releasing its units.
    ///
    /// A unit that another sale still references stays reserved; that is
    /// logged, not an error.
    #[instrument(skip(self), fields(sale_id = %sale_id), err)]
    pub async fn delete_sale(&self, sale_id: SaleId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err("begin_transaction"))?;

        match delete_in(&mut tx, sale_id).await {
            Ok(released) => {
                tx.commit().await.map_err(db_err("commit_transaction"))?;
                tracing::info!(released, "sale deleted");
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    pub async fn load(&self, sale_id: SaleId) -> StoreResult<Sale> {
        let mut conn = self.pool.acquire().await.map_err(db_err("acquire"))?;
        load_in(&mut conn, sale_id).await
    }

    /// All sales, newest first.
    pub async fn list(&self) -> StoreResult<Vec<SaleSummary>> {
        self.summaries(None).await
    }

    pub async fn sales_of_client(&self, client_id: ClientId) -> StoreResult<Vec<SaleSummary>> {
        self.summaries(Some(client_id)).await
    }

    /// Every sale with its line items, oldest first.
    pub async fn list_full(&self) -> StoreResult<Vec<Sale>> {
        let headers = sqlx::query(
            "SELECT id, client_id, sale_date, total_cents, version FROM ventas ORDER BY sale_date, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list_sales"))?;

        let lines = sqlx::query(
            "SELECT id, sale_id, vehicle_id, price_cents FROM venta_caravanas ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list_sales"))?;

        let mut by_sale: HashMap<SaleId, Vec<SaleLineItem>> = HashMap::new();
        for row in &lines {
            let item = line_item_from_row(row)?;
            by_sale.entry(item.sale_id).or_default().push(item);
        }

        headers
            .iter()
            .map(|row| {
                let id: SaleId = id_column(row, "id")?;
                let items = by_sale.remove(&id).unwrap_or_default();
                sale_from_row(row, items)
            })
            .collect()
    }

    /// Composition editor for a new sale, seeded with the available units.
    pub async fn editor_for_new(&self) -> StoreResult<SaleCompositionEditor> {
        Ok(SaleCompositionEditor::new(self.vehicles.list().await?))
    }

    /// Composition editor for an existing sale, plus the sale as loaded.
    ///
    /// The sale's own units are selected and remain pickable after removal.
    pub async fn editor_for(&self, sale_id: SaleId) -> StoreResult<(Sale, SaleCompositionEditor)> {
        let sale = self.load(sale_id).await?;
        let candidates = self.vehicles.list().await?;

        let attached: Vec<VehicleUnit> = sale
            .line_items()
            .iter()
            .filter_map(|line| candidates.iter().find(|u| u.id == line.vehicle_id).cloned())
            .collect();

        let editor = SaleCompositionEditor::for_sale(
            sale.id_typed(),
            sale.expected_version(),
            attached,
            candidates,
        );
        Ok((sale, editor))
    }

    async fn summaries(&self, client_id: Option<ClientId>) -> StoreResult<Vec<SaleSummary>> {
        let filter = if client_id.is_some() { "WHERE v.client_id = ?" } else { "" };
        let sql = format!(
            r#"
            SELECT v.id, v.sale_date, v.total_cents, v.client_id, c.first_name, c.last_name
            FROM ventas v
            JOIN clientes c ON c.id = v.client_id
            {filter}
            ORDER BY v.sale_date DESC, v.id DESC
            "#
        );
        let mut query = sqlx::query_as::<_, SummaryRow>(&sql);
        if let Some(client_id) = client_id {
            query = query.bind(client_id.to_string());
        }
        let headers = query.fetch_all(&self.pool).await.map_err(db_err("list_sales"))?;

        let serial_rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT vc.sale_id, c.serial
            FROM venta_caravanas vc
            JOIN caravanas c ON c.id = vc.vehicle_id
            ORDER BY c.serial
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list_sales"))?;

        let mut serials: HashMap<String, Vec<String>> = HashMap::new();
        for (sale_id, serial) in serial_rows {
            serials.entry(sale_id).or_default().push(serial);
        }

        headers
            .into_iter()
            .map(|h| {
                let vehicle_serials = serials.remove(&h.id).unwrap_or_default();
                h.into_summary(vehicle_serials)
            })
            .collect()
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: String,
    sale_date: String,
    total_cents: i64,
    client_id: String,
    first_name: String,
    last_name: String,
}

impl SummaryRow {
    fn into_summary(self, vehicle_serials: Vec<String>) -> StoreResult<SaleSummary> {
        Ok(SaleSummary {
            sale_id: parse_id("ventas.id", &self.id)?,
            date: NaiveDate::parse_from_str(&self.sale_date, DATE_FORMAT)
                .map_err(|e| StoreError::CorruptRow(format!("ventas.sale_date: {e}")))?,
            total: u64::try_from(self.total_cents)
                .map(Money::from_cents)
                .map_err(|_| StoreError::CorruptRow("ventas.total_cents: negative".into()))?,
            client_id: parse_id("ventas.client_id", &self.client_id)?,
            client_name: format!("{} {}", self.first_name, self.last_name),
            vehicle_serials,
        })
    }
}

async fn save_in(
    conn: &mut SqliteConnection,
    draft: &SaleDraft,
    client_id: ClientId,
    vehicle_ids: &[VehicleUnitId],
) -> StoreResult<Sale> {
    let date = draft.date.format(DATE_FORMAT).to_string();

    // The header write comes first so the write lock is held before any
    // availability check.
    let (sale_id, version) = match draft.sale_id {
        None => {
            let sale_id = SaleId::new();
            let inserted = sqlx::query(
                r#"
                INSERT INTO ventas (id, client_id, sale_date, total_cents, version)
                SELECT ?, ?, ?, 0, 1
                WHERE EXISTS (SELECT 1 FROM clientes WHERE id = ?)
                "#,
            )
            .bind(sale_id.to_string())
            .bind(client_id.to_string())
            .bind(&date)
            .bind(client_id.to_string())
            .execute(&mut *conn)
            .await
            .map_err(db_err("insert_sale"))?;
            if inserted.rows_affected() == 0 {
                return Err(DomainError::not_found(format!("client {client_id}")).into());
            }
            (sale_id, 1)
        }
        Some(sale_id) => {
            let bumped: Option<(i64,)> = sqlx::query_as(
                "UPDATE ventas SET sale_date = ?, version = version + 1 WHERE id = ? RETURNING version",
            )
            .bind(&date)
            .bind(sale_id.to_string())
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err("update_sale"))?;
            let Some((version,)) = bumped else {
                return Err(DomainError::not_found(format!("sale {sale_id}")).into());
            };
            let version = version.max(1) as u64;
            draft.expected_version.check(version - 1)?;

            let updated = sqlx::query(
                r#"
                UPDATE ventas SET client_id = ?
                WHERE id = ? AND EXISTS (SELECT 1 FROM clientes WHERE id = ?)
                "#,
            )
            .bind(client_id.to_string())
            .bind(sale_id.to_string())
            .bind(client_id.to_string())
            .execute(&mut *conn)
            .await
            .map_err(db_err("update_sale"))?;
            if updated.rows_affected() == 0 {
                return Err(DomainError::not_found(format!("client {client_id}")).into());
            }
            (sale_id, version)
        }
    };

    let mut units: HashMap<VehicleUnitId, VehicleUnit> = HashMap::with_capacity(vehicle_ids.len());
    for &vehicle_id in vehicle_ids {
        let row = sqlx::query(&format!("SELECT {VEHICLE_COLUMNS} FROM caravanas WHERE id = ?"))
            .bind(vehicle_id.to_string())
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err("load_vehicle"))?
            .ok_or_else(|| DomainError::not_found(format!("vehicle unit {vehicle_id}")))?;
        units.insert(vehicle_id, vehicle_from_row(&row)?);
    }

    let persisted = line_items_in(conn, sale_id).await?;
    let plan = plan_reconciliation(&persisted, vehicle_ids);

    for line in &plan.to_remove {
        sqlx::query("DELETE FROM venta_caravanas WHERE id = ?")
            .bind(line.id.to_string())
            .execute(&mut *conn)
            .await
            .map_err(db_err("delete_line_item"))?;
        VehicleAvailabilityLedger::on(conn)
            .release(line.vehicle_id, sale_id)
            .await?;
    }

    let mut line_items = plan.kept;
    for vehicle_id in plan.to_add {
        let Some(unit) = units.get(&vehicle_id) else {
            return Err(DomainError::not_found(format!("vehicle unit {vehicle_id}")).into());
        };
        let line = SaleLineItem {
            id: LineItemId::new(),
            sale_id,
            vehicle_id,
            price: unit.price,
        };
        sqlx::query(
            "INSERT INTO venta_caravanas (id, sale_id, vehicle_id, price_cents) VALUES (?, ?, ?, ?)",
        )
        .bind(line.id.to_string())
        .bind(sale_id.to_string())
        .bind(vehicle_id.to_string())
        .bind(cents(line.price)?)
        .execute(&mut *conn)
        .await
        .map_err(db_err("insert_line_item"))?;

        VehicleAvailabilityLedger::on(conn)
            .reserve(vehicle_id, sale_id)
            .await?;
        line_items.push(line);
    }

    let total = Money::try_sum(line_items.iter().map(|l| l.price))?;
    sqlx::query("UPDATE ventas SET total_cents = ? WHERE id = ?")
        .bind(cents(total)?)
        .bind(sale_id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(db_err("update_sale_total"))?;

    Ok(Sale::restore(sale_id, client_id, draft.date, total, version, line_items))
}

/// Returns how many units were released.
async fn delete_in(conn: &mut SqliteConnection, sale_id: SaleId) -> StoreResult<usize> {
    let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM ventas WHERE id = ?")
        .bind(sale_id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err("delete_sale"))?;
    if exists.is_none() {
        return Err(DomainError::not_found(format!("sale {sale_id}")).into());
    }

    let mut released = 0;
    for line in line_items_in(conn, sale_id).await? {
        if VehicleAvailabilityLedger::on(conn)
            .release(line.vehicle_id, sale_id)
            .await?
        {
            released += 1;
        }
    }

    sqlx::query("DELETE FROM venta_caravanas WHERE sale_id = ?")
        .bind(sale_id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(db_err("delete_line_items"))?;
    sqlx::query("DELETE FROM ventas WHERE id = ?")
        .bind(sale_id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(db_err("delete_sale"))?;

    Ok(released)
}

async fn load_in(conn: &mut SqliteConnection, sale_id: SaleId) -> StoreResult<Sale> {
    let header = sqlx::query(
        "SELECT id, client_id, sale_date, total_cents, version FROM ventas WHERE id = ?",
    )
    .bind(sale_id.to_string())
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err("load_sale"))?
    .ok_or_else(|| DomainError::not_found(format!("sale {sale_id}")))?;

    let items = line_items_in(conn, sale_id).await?;
    sale_from_row(&header, items)
}

async fn line_items_in(conn: &mut SqliteConnection, sale_id: SaleId) -> StoreResult<Vec<SaleLineItem>> {
    let rows = sqlx::query(
        "SELECT id, sale_id, vehicle_id, price_cents FROM venta_caravanas WHERE sale_id = ? ORDER BY rowid",
    )
    .bind(sale_id.to_string())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err("load_line_items"))?;
    rows.iter().map(line_item_from_row).collect()
}

fn sale_from_row(row: &sqlx::sqlite::SqliteRow, items: Vec<SaleLineItem>) -> StoreResult<Sale> {
    let version: i64 = row.try_get("version").map_err(db_err("decode_row"))?;
    Ok(Sale::restore(
        id_column(row, "id")?,
        id_column(row, "client_id")?,
        date_column(row, "sale_date")?,
        money_column(row, "total_cents")?,
        version.max(0) as u64,
        items,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientRepository;
    use crate::test_support::{date, sample_client, sample_vehicle, memory_qr, store};
    use caravan_core::{AggregateRoot, ExpectedVersion};

    struct Fixture {
        db: Database,
        sales: SaleRepository,
        vehicles: VehicleRepository,
        client: ClientId,
    }

    async fn fixture() -> Fixture {
        let db = store().await;
        let clients = ClientRepository::new(&db, memory_qr());
        let client = clients.save(&sample_client("30111222")).await.unwrap().id;
        Fixture {
            sales: SaleRepository::new(&db),
            vehicles: VehicleRepository::new(&db),
            db,
            client,
        }
    }

    impl Fixture {
        async fn unit(&self, serial: &str, price: &str) -> VehicleUnitId {
            self.vehicles.save(&sample_vehicle(serial, price)).await.unwrap().id
        }

        async fn available(&self, unit: VehicleUnitId) -> bool {
            let ledger_view = self.vehicles.is_available(unit).await.unwrap();
            let flag = self.vehicles.get(unit).await.unwrap().available;
            assert_eq!(ledger_view, flag, "stored flag out of step for {unit}");
            flag
        }

        async fn assert_consistent(&self) {
            assert!(self.vehicles.inconsistencies().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn create_then_swap_units() {
        let f = fixture().await;
        let u1 = f.unit("U1", "1000").await;
        let u2 = f.unit("U2", "1500").await;
        let u3 = f.unit("U3", "2000").await;

        let sale = f
            .sales
            .save(&SaleDraft::new(f.client, date(2025, 3, 1), vec![u1, u2]))
            .await
            .unwrap();
        assert_eq!(sale.total(), Money::from_units(2500));
        assert!(!f.available(u1).await);
        assert!(!f.available(u2).await);
        assert!(f.available(u3).await);

        let (loaded, mut editor) = f.sales.editor_for(sale.id_typed()).await.unwrap();
        assert_eq!(loaded, sale);
        editor.remove_unit(u2).unwrap();
        let u3_unit = editor.pool_unit(u3).unwrap().clone();
        assert!(editor.add_unit(u3_unit));
        assert_eq!(editor.total(), Money::from_units(3000));

        let edited = f
            .sales
            .save(&editor.to_draft(Some(f.client), date(2025, 3, 2)).unwrap())
            .await
            .unwrap();
        assert_eq!(edited.total(), Money::from_units(3000));
        assert_eq!(edited.version(), 2);
        assert!(!f.available(u1).await);
        assert!(f.available(u2).await);
        assert!(!f.available(u3).await);
        f.assert_consistent().await;

        let reloaded = f.sales.load(sale.id_typed()).await.unwrap();
        assert_eq!(reloaded.total(), reloaded.line_total());
        assert_eq!(reloaded.date(), date(2025, 3, 2));
    }

    #[tokio::test]
    async fn kept_lines_keep_their_captured_price() {
        let f = fixture().await;
        let u1 = f.unit("U1", "1000").await;
        let u2 = f.unit("U2", "500").await;
        let sale = f
            .sales
            .save(&SaleDraft::new(f.client, date(2025, 3, 1), vec![u1]))
            .await
            .unwrap();

        let mut form = caravan_inventory::VehicleForm::from_unit(&f.vehicles.get(u1).await.unwrap());
        form.price = "9999".into();
        f.vehicles.save(&form).await.unwrap();

        let edited = f
            .sales
            .save(
                &SaleDraft::new(f.client, date(2025, 3, 1), vec![u1, u2])
                    .editing(sale.id_typed(), sale.expected_version()),
            )
            .await
            .unwrap();
        assert_eq!(edited.total(), Money::from_units(1500));
    }

    #[tokio::test]
    async fn reserve_conflict_rolls_back_everything() {
        let f = fixture().await;
        let u1 = f.unit("U1", "1000").await;
        let u2 = f.unit("U2", "1500").await;
        f.sales
            .save(&SaleDraft::new(f.client, date(2025, 3, 1), vec![u1]))
            .await
            .unwrap();

        let err = f
            .sales
            .save(&SaleDraft::new(f.client, date(2025, 3, 2), vec![u2, u1]))
            .await
            .unwrap_err();
        assert!(err.is_conflict(), "{err}");

        assert_eq!(f.sales.list().await.unwrap().len(), 1);
        assert!(f.available(u2).await);
        assert!(!f.available(u1).await);
        f.assert_consistent().await;
    }

    #[tokio::test]
    async fn failed_edit_leaves_the_sale_untouched() {
        let f = fixture().await;
        let u1 = f.unit("U1", "1000").await;
        let u2 = f.unit("U2", "1500").await;
        let u3 = f.unit("U3", "2000").await;
        let s1 = f
            .sales
            .save(&SaleDraft::new(f.client, date(2025, 3, 1), vec![u1]))
            .await
            .unwrap();
        f.sales
            .save(&SaleDraft::new(f.client, date(2025, 3, 1), vec![u3]))
            .await
            .unwrap();

        // Drops U1, adds U2 and U3; U3 belongs to the other sale.
        let err = f
            .sales
            .save(
                &SaleDraft::new(f.client, date(2025, 4, 1), vec![u2, u3])
                    .editing(s1.id_typed(), s1.expected_version()),
            )
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        assert_eq!(f.sales.load(s1.id_typed()).await.unwrap(), s1);
        assert!(!f.available(u1).await);
        assert!(f.available(u2).await);
        f.assert_consistent().await;
    }

    #[tokio::test]
    async fn stale_edit_is_a_conflict() {
        let f = fixture().await;
        let u1 = f.unit("U1", "1000").await;
        let u2 = f.unit("U2", "1500").await;
        let sale = f
            .sales
            .save(&SaleDraft::new(f.client, date(2025, 3, 1), vec![u1]))
            .await
            .unwrap();
        let stale = sale.expected_version();

        f.sales
            .save(&SaleDraft::new(f.client, date(2025, 3, 1), vec![u1, u2]).editing(sale.id_typed(), stale))
            .await
            .unwrap();

        let err = f
            .sales
            .save(&SaleDraft::new(f.client, date(2025, 3, 1), vec![u1]).editing(sale.id_typed(), stale))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(!f.available(u2).await);
    }

    #[tokio::test]
    async fn missing_references_are_not_found() {
        let f = fixture().await;
        let u1 = f.unit("U1", "1000").await;

        let err = f
            .sales
            .save(&SaleDraft::new(ClientId::new(), date(2025, 3, 1), vec![u1]))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::NotFound(_))));

        let err = f
            .sales
            .save(&SaleDraft::new(f.client, date(2025, 3, 1), vec![u1, VehicleUnitId::new()]))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::NotFound(_))));

        let err = f
            .sales
            .save(
                &SaleDraft::new(f.client, date(2025, 3, 1), vec![u1])
                    .editing(SaleId::new(), ExpectedVersion::Any),
            )
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::NotFound(_))));

        assert!(f.sales.list().await.unwrap().is_empty());
        assert!(f.available(u1).await);
    }

    #[tokio::test]
    async fn empty_selection_is_a_validation_error() {
        let f = fixture().await;
        let err = f
            .sales
            .save(&SaleDraft::new(f.client, date(2025, 3, 1), vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn total_beyond_the_money_range_is_rejected() {
        let f = fixture().await;
        let price = "92233720368547758";
        let units = vec![
            f.unit("U1", price).await,
            f.unit("U2", price).await,
            f.unit("U3", price).await,
        ];

        let err = f
            .sales
            .save(&SaleDraft::new(f.client, date(2025, 3, 1), units.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::Validation(_))));
        for unit in units {
            assert!(f.available(unit).await);
        }
        assert!(f.sales.list().await.unwrap().is_empty());
        f.assert_consistent().await;
    }

    #[tokio::test]
    async fn delete_releases_units() {
        let f = fixture().await;
        let u1 = f.unit("U1", "1000").await;
        let u2 = f.unit("U2", "1500").await;
        let sale = f
            .sales
            .save(&SaleDraft::new(f.client, date(2025, 3, 1), vec![u1, u2]))
            .await
            .unwrap();

        f.sales.delete_sale(sale.id_typed()).await.unwrap();
        assert!(f.available(u1).await);
        assert!(f.available(u2).await);
        assert!(f.sales.list().await.unwrap().is_empty());

        let err = f.sales.delete_sale(sale.id_typed()).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_keeps_units_another_sale_still_holds() {
        let f = fixture().await;
        let u1 = f.unit("U1", "1000").await;
        let u2 = f.unit("U2", "1500").await;
        let s1 = f
            .sales
            .save(&SaleDraft::new(f.client, date(2025, 3, 1), vec![u1, u2]))
            .await
            .unwrap();
        let s2 = f
            .sales
            .save(&SaleDraft::new(f.client, date(2025, 3, 2), vec![f.unit("U3", "10").await]))
            .await
            .unwrap();

        // Legacy data: U1 was recorded on both sales.
        sqlx::query(
            "INSERT INTO venta_caravanas (id, sale_id, vehicle_id, price_cents) VALUES (?, ?, ?, 100000)",
        )
        .bind(LineItemId::new().to_string())
        .bind(s2.id_typed().to_string())
        .bind(u1.to_string())
        .execute(f.db.pool())
        .await
        .unwrap();

        f.sales.delete_sale(s1.id_typed()).await.unwrap();
        assert!(!f.available(u1).await);
        assert!(f.available(u2).await);
    }

    #[tokio::test]
    async fn list_is_newest_first_with_serials() {
        let f = fixture().await;
        let u1 = f.unit("U1", "1000").await;
        let u2 = f.unit("U2", "1500").await;
        let u3 = f.unit("U3", "2000").await;
        f.sales
            .save(&SaleDraft::new(f.client, date(2025, 1, 10), vec![u2, u1]))
            .await
            .unwrap();
        f.sales
            .save(&SaleDraft::new(f.client, date(2025, 2, 10), vec![u3]))
            .await
            .unwrap();

        let list = f.sales.list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].date, date(2025, 2, 10));
        assert_eq!(list[1].vehicle_serials, vec!["U1", "U2"]);
        assert_eq!(list[1].unit_count(), 2);
        assert_eq!(list[1].client_name, "Ana Gomez");

        assert_eq!(f.sales.sales_of_client(f.client).await.unwrap().len(), 2);
        assert_eq!(f.sales.list_full().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn new_sale_editor_offers_only_free_units() {
        let f = fixture().await;
        let u1 = f.unit("U1", "1000").await;
        let u2 = f.unit("U2", "1500").await;
        f.sales
            .save(&SaleDraft::new(f.client, date(2025, 3, 1), vec![u1]))
            .await
            .unwrap();

        let editor = f.sales.editor_for_new().await.unwrap();
        let pool: Vec<_> = editor.available_pool().iter().map(|u| u.id).collect();
        assert_eq!(pool, vec![u2]);
    }
}
