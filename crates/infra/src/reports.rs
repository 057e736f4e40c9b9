//! Out-of-process report generation.
//!
//! The charts are drawn by an external script; this side finds an
//! interpreter, runs `interpreter script db_path` and reads back a JSON object
//! mapping report names to image paths.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::instrument;

use crate::config::AppConfig;
use crate::error::{StoreError, StoreResult};

const RUN_TIMEOUT: Duration = Duration::from_secs(60);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const REPORTS_DIR: &str = "reports_output";

#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// Run the generator; returns report name -> image path.
    async fn generate(&self) -> StoreResult<BTreeMap<String, PathBuf>>;

    /// Names of the reports already rendered.
    fn available_reports(&self) -> StoreResult<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct ReportRunner {
    script: PathBuf,
    db_path: PathBuf,
    interpreters: Vec<String>,
    probe_args: Vec<String>,
    timeout: Duration,
}

impl ReportRunner {
    pub fn new(script: impl Into<PathBuf>, db_path: impl Into<PathBuf>, interpreters: Vec<String>) -> Self {
        Self {
            script: script.into(),
            db_path: db_path.into(),
            interpreters,
            probe_args: vec!["--version".to_string()],
            timeout: RUN_TIMEOUT,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.report_script.clone(),
            config.db_path.clone(),
            config.interpreters.clone(),
        )
    }

    /// Arguments used to check that a candidate interpreter runs.
    pub fn with_probe_args(mut self, args: Vec<String>) -> Self {
        self.probe_args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `{db dir}/reports_output`.
    pub fn reports_dir(&self) -> PathBuf {
        self.db_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(REPORTS_DIR)
    }

    pub fn report_path(&self, name: &str) -> PathBuf {
        self.reports_dir().join(format!("{name}.png"))
    }

    /// First candidate that starts and exits successfully.
    pub async fn find_interpreter(&self) -> StoreResult<String> {
        for candidate in &self.interpreters {
            let probe = Command::new(candidate)
                .args(&self.probe_args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .status();

            match tokio::time::timeout(PROBE_TIMEOUT, probe).await {
                Ok(Ok(status)) if status.success() => return Ok(candidate.clone()),
                Ok(Ok(status)) => tracing::debug!(candidate = %candidate, %status, "interpreter probe failed"),
                Ok(Err(e)) => tracing::debug!(candidate = %candidate, error = %e, "interpreter not runnable"),
                Err(_) => tracing::debug!(candidate = %candidate, "interpreter probe timed out"),
            }
        }
        Err(StoreError::ExternalToolUnavailable(format!(
            "no interpreter found (tried {})",
            self.interpreters.join(", ")
        )))
    }
}

#[async_trait]
impl ReportGenerator for ReportRunner {
    #[instrument(skip(self), fields(script = %self.script.display()), err)]
    async fn generate(&self) -> StoreResult<BTreeMap<String, PathBuf>> {
        if !self.script.exists() {
            return Err(StoreError::ExternalToolUnavailable(format!(
                "report script {} not found",
                self.script.display()
            )));
        }
        let interpreter = self.find_interpreter().await?;
        tokio::fs::create_dir_all(self.reports_dir()).await?;

        let run = Command::new(&interpreter)
            .arg(&self.script)
            .arg(&self.db_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                StoreError::External(format!(
                    "report script did not finish within {}s",
                    self.timeout.as_secs()
                ))
            })??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(StoreError::External(if stderr.is_empty() {
                "report script produced no output".to_string()
            } else {
                format!("report script failed: {stderr}")
            }));
        }

        let reports: BTreeMap<String, String> = serde_json::from_str(stdout).map_err(|e| {
            StoreError::External(format!("report script output is not a JSON object: {e}"))
        })?;
        tracing::info!(reports = reports.len(), %interpreter, "reports generated");
        Ok(reports
            .into_iter()
            .map(|(name, path)| (name, PathBuf::from(path)))
            .collect())
    }

    fn available_reports(&self) -> StoreResult<Vec<String>> {
        let entries = match std::fs::read_dir(self.reports_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png")) {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// Runs scripts with `sh`, probing it with a no-op command.
    fn runner(dir: &Path, script_body: &str) -> ReportRunner {
        let script = dir.join("generate_reports.sh");
        std::fs::write(&script, script_body).unwrap();
        ReportRunner::new(
            script,
            dir.join("caravanas.db"),
            vec!["definitely-not-an-interpreter".into(), "sh".into()],
        )
        .with_probe_args(vec!["-c".into(), "exit 0".into()])
    }

    #[tokio::test]
    async fn parses_the_report_map() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(
            dir.path(),
            "echo '{\"ventas_por_mes\": \"out/ventas.png\", \"stock\": \"out/stock.png\"}'\n",
        );

        assert_eq!(runner.find_interpreter().await.unwrap(), "sh");
        let reports = runner.generate().await.unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports["stock"], PathBuf::from("out/stock.png"));
        assert!(runner.reports_dir().is_dir());
    }

    #[tokio::test]
    async fn receives_the_database_path() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), "printf '{\"db\": \"%s\"}' \"$1\"\n");
        let reports = runner.generate().await.unwrap();
        assert_eq!(reports["db"], dir.path().join("caravanas.db"));
    }

    #[tokio::test]
    async fn empty_output_surfaces_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), "echo 'matplotlib missing' >&2\nexit 1\n");
        let err = runner.generate().await.unwrap_err();
        assert!(matches!(err, StoreError::External(ref msg) if msg.contains("matplotlib missing")));
    }

    #[tokio::test]
    async fn missing_interpreter_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ReportRunner::new(
            dir.path().join("missing.py"),
            dir.path().join("caravanas.db"),
            vec!["definitely-not-an-interpreter".into()],
        );
        assert!(matches!(
            runner.find_interpreter().await,
            Err(StoreError::ExternalToolUnavailable(_))
        ));
        assert!(matches!(
            runner.generate().await,
            Err(StoreError::ExternalToolUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn slow_scripts_time_out() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), "sleep 5\n").with_timeout(Duration::from_millis(200));
        let err = runner.generate().await.unwrap_err();
        assert!(matches!(err, StoreError::External(ref msg) if msg.contains("did not finish")));
    }

    #[test]
    fn lists_rendered_png_reports() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), "");
        assert!(runner.available_reports().unwrap().is_empty());

        std::fs::create_dir_all(runner.reports_dir()).unwrap();
        std::fs::write(runner.reports_dir().join("stock.png"), b"").unwrap();
        std::fs::write(runner.reports_dir().join("ventas.PNG"), b"").unwrap();
        std::fs::write(runner.reports_dir().join("notes.txt"), b"").unwrap();

        assert_eq!(runner.available_reports().unwrap(), vec!["stock", "ventas"]);
        assert_eq!(runner.report_path("stock"), runner.reports_dir().join("stock.png"));
    }
}
