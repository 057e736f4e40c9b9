//! Configuration loading and representation.
//!
//! Every setting comes from a `CARAVAN_*` environment variable and falls back
//! to a location under the OS data directory (`{data_dir}/caravan/...`).

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{StoreError, StoreResult};

const DEFAULT_AUTOSAVE_SECS: u64 = 60 * 60;
const DEFAULT_SYNC_FOLDER: &str = "reportes";
const DEFAULT_INTERPRETERS: [&str; 3] = ["python3", "python", "py"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Root for generated artifacts.
    pub data_dir: PathBuf,
    /// Where full-dataset exports are written.
    pub export_dir: PathBuf,
    /// Where client QR artifacts are written.
    pub qr_dir: PathBuf,
    /// Cloud mirror root. `None` means no credentials: auto-save stays off.
    pub sync_dir: Option<PathBuf>,
    pub sync_folder: String,
    pub autosave_interval: Duration,
    /// Report-generation script run by an external interpreter.
    pub report_script: PathBuf,
    /// Interpreters tried in order when running the report script.
    pub interpreters: Vec<String>,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let data_dir = match var("CARAVAN_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        let path_or = |key: &str, default: PathBuf| var(key).map(PathBuf::from).unwrap_or(default);

        let autosave_interval = match var("CARAVAN_AUTOSAVE_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    StoreError::Config(format!("CARAVAN_AUTOSAVE_SECS {raw:?} is not a number"))
                })?;
                if secs == 0 {
                    return Err(StoreError::Config(
                        "CARAVAN_AUTOSAVE_SECS must be positive".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_AUTOSAVE_SECS),
        };

        let interpreters = match var("CARAVAN_PYTHON") {
            Some(python) => vec![python],
            None => DEFAULT_INTERPRETERS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            db_path: path_or("CARAVAN_DB_PATH", data_dir.join("caravanas.db")),
            export_dir: path_or("CARAVAN_EXPORT_DIR", data_dir.join("exports")),
            qr_dir: path_or("CARAVAN_QR_DIR", data_dir.join("qr_codes")),
            sync_dir: var("CARAVAN_SYNC_DIR").map(PathBuf::from),
            sync_folder: var("CARAVAN_SYNC_FOLDER").unwrap_or_else(|| DEFAULT_SYNC_FOLDER.to_string()),
            autosave_interval,
            report_script: path_or(
                "CARAVAN_REPORT_SCRIPT",
                data_dir.join("reports").join("generate_reports.py"),
            ),
            interpreters,
            data_dir,
        })
    }

    /// Create the directories the application writes into.
    pub fn ensure_dirs(&self) -> StoreResult<()> {
        for dir in [&self.data_dir, &self.export_dir, &self.qr_dir] {
            std::fs::create_dir_all(dir)?;
        }
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// `{app_data_dir}/caravan`, falling back to `~/.local/share/caravan`.
fn default_data_dir() -> StoreResult<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .ok_or_else(|| {
            StoreError::Config("failed to resolve OS app data directory; set CARAVAN_DATA_DIR".into())
        })?;
    Ok(base.join("caravan"))
}
