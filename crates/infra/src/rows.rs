//! Row decoding shared by the repositories.
//!
//! Ids and timestamps are stored as TEXT, amounts as INTEGER cents.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use caravan_core::{DomainError, Money};
use caravan_inventory::{Authorization, VehicleUnit};
use caravan_parties::Client;
use caravan_sales::SaleLineItem;

use crate::error::{StoreError, StoreResult, db_err};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) const VEHICLE_COLUMNS: &str = "id, serial, brand, model, year, plate, registration_number, \
     kind, price_cents, available, features, description";

pub(crate) const CLIENT_COLUMNS: &str = "id, first_name, last_name, national_id, phone, email, \
     registered_at, public_code, qr_image_path";

pub(crate) fn text(row: &SqliteRow, column: &'static str) -> StoreResult<String> {
    row.try_get::<String, _>(column).map_err(db_err("decode_row"))
}

pub(crate) fn parse_id<T>(column: &str, raw: &str) -> StoreResult<T>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse()
        .map_err(|e| StoreError::CorruptRow(format!("{column}: {e}")))
}

pub(crate) fn id_column<T>(row: &SqliteRow, column: &'static str) -> StoreResult<T>
where
    T: FromStr<Err = DomainError>,
{
    parse_id(column, &text(row, column)?)
}

pub(crate) fn money_column(row: &SqliteRow, column: &'static str) -> StoreResult<Money> {
    let cents: i64 = row.try_get(column).map_err(db_err("decode_row"))?;
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| StoreError::CorruptRow(format!("{column}: negative amount {cents}")))
}

pub(crate) fn cents(money: Money) -> StoreResult<i64> {
    i64::try_from(money.cents())
        .map_err(|_| StoreError::Domain(DomainError::validation(format!("amount {money} is too large"))))
}

pub(crate) fn date_column(row: &SqliteRow, column: &'static str) -> StoreResult<NaiveDate> {
    let raw = text(row, column)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|e| StoreError::CorruptRow(format!("{column}: {raw:?}: {e}")))
}

pub(crate) fn timestamp_column(row: &SqliteRow, column: &'static str) -> StoreResult<DateTime<Utc>> {
    let raw = text(row, column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow(format!("{column}: {raw:?}: {e}")))
}

pub(crate) fn vehicle_from_row(row: &SqliteRow) -> StoreResult<VehicleUnit> {
    Ok(VehicleUnit {
        id: id_column(row, "id")?,
        serial: text(row, "serial")?,
        brand: text(row, "brand")?,
        model: text(row, "model")?,
        year: row.try_get::<i64, _>("year").map_err(db_err("decode_row"))? as i32,
        plate: text(row, "plate")?,
        registration_number: text(row, "registration_number")?,
        kind: text(row, "kind")?,
        price: money_column(row, "price_cents")?,
        available: row.try_get::<bool, _>("available").map_err(db_err("decode_row"))?,
        features: text(row, "features")?,
        description: text(row, "description")?,
    })
}

pub(crate) fn client_from_row(row: &SqliteRow) -> StoreResult<Client> {
    Ok(Client {
        id: id_column(row, "id")?,
        first_name: text(row, "first_name")?,
        last_name: text(row, "last_name")?,
        national_id: text(row, "national_id")?,
        phone: text(row, "phone")?,
        email: text(row, "email")?,
        registered_at: timestamp_column(row, "registered_at")?,
        public_code: row.try_get("public_code").map_err(db_err("decode_row"))?,
        qr_image_path: row.try_get("qr_image_path").map_err(db_err("decode_row"))?,
    })
}

pub(crate) fn line_item_from_row(row: &SqliteRow) -> StoreResult<SaleLineItem> {
    Ok(SaleLineItem {
        id: id_column(row, "id")?,
        sale_id: id_column(row, "sale_id")?,
        vehicle_id: id_column(row, "vehicle_id")?,
        price: money_column(row, "price_cents")?,
    })
}

pub(crate) fn authorization_from_row(row: &SqliteRow) -> StoreResult<Authorization> {
    Ok(Authorization {
        id: id_column(row, "id")?,
        vehicle_id: id_column(row, "vehicle_id")?,
        number: text(row, "number")?,
        issued_on: date_column(row, "issued_on")?,
        status: text(row, "status")?,
    })
}
