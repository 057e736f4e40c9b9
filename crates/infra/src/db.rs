//! SQLite connection pool and schema.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::instrument;

use crate::error::{StoreResult, db_err};

/// Tables and indexes, applied idempotently on every open.
///
/// Sales cascade to their line items; line items restrict deleting the
/// vehicle units they reference; sales restrict deleting their client;
/// authorizations cascade with their vehicle unit.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS clientes (
        id              TEXT PRIMARY KEY,
        first_name      TEXT NOT NULL,
        last_name       TEXT NOT NULL,
        national_id     TEXT NOT NULL UNIQUE,
        phone           TEXT NOT NULL DEFAULT '',
        email           TEXT NOT NULL DEFAULT '',
        registered_at   TEXT NOT NULL,
        public_code     TEXT NULL UNIQUE,
        qr_image_path   TEXT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS caravanas (
        id                  TEXT PRIMARY KEY,
        serial              TEXT NOT NULL UNIQUE,
        brand               TEXT NOT NULL,
        model               TEXT NOT NULL,
        year                INTEGER NOT NULL,
        plate               TEXT NOT NULL UNIQUE,
        registration_number TEXT NOT NULL UNIQUE,
        kind                TEXT NOT NULL,
        price_cents         INTEGER NOT NULL CHECK (price_cents >= 0),
        available           INTEGER NOT NULL DEFAULT 1,
        features            TEXT NOT NULL DEFAULT '',
        description         TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ventas (
        id          TEXT PRIMARY KEY,
        client_id   TEXT NOT NULL REFERENCES clientes(id) ON DELETE RESTRICT,
        sale_date   TEXT NOT NULL,
        total_cents INTEGER NOT NULL DEFAULT 0,
        version     INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS venta_caravanas (
        id          TEXT PRIMARY KEY,
        sale_id     TEXT NOT NULL REFERENCES ventas(id) ON DELETE CASCADE,
        vehicle_id  TEXT NOT NULL REFERENCES caravanas(id) ON DELETE RESTRICT,
        price_cents INTEGER NOT NULL,
        UNIQUE (sale_id, vehicle_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS ix_venta_caravanas_sale ON venta_caravanas (sale_id)",
    "CREATE INDEX IF NOT EXISTS ix_venta_caravanas_vehicle ON venta_caravanas (vehicle_id)",
    "CREATE INDEX IF NOT EXISTS ix_ventas_client ON ventas (client_id)",
    r#"
    CREATE TABLE IF NOT EXISTS stock (
        kind        TEXT PRIMARY KEY,
        available   INTEGER NOT NULL,
        total       INTEGER NOT NULL,
        updated_at  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS autorizaciones (
        id          TEXT PRIMARY KEY,
        vehicle_id  TEXT NOT NULL REFERENCES caravanas(id) ON DELETE CASCADE,
        number      TEXT NOT NULL,
        issued_on   TEXT NOT NULL,
        status      TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS ix_autorizaciones_vehicle ON autorizaciones (vehicle_id)",
];

/// Handle to the local store.
///
/// Cheap to clone; all clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file and apply the schema.
    #[instrument(skip_all, fields(path = %path.display()), err)]
    pub async fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(db_err("connect"))?;

        let db = Self { pool };
        db.migrate().await?;
        tracing::info!("database ready");
        Ok(db)
    }

    /// Private in-memory database (tests, dry runs).
    ///
    /// Uses a single long-lived connection: each SQLite in-memory connection
    /// is its own database.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(db_err("connect"))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(db_err("connect"))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_err("migrate"))?;
        }
        Ok(())
    }
}
