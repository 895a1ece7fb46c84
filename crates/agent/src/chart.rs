use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use staffchat_core::config::ChartConfig;
use staffchat_core::RowRecord;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

/// Everything the renderer needs: generated plotting code plus the dataset it plots.
#[derive(Clone, Copy, Debug)]
pub struct ChartRequest<'a> {
    pub code: &'a str,
    pub sql_query: &'a str,
    pub headers: &'a [String],
    pub rows: &'a [RowRecord],
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Error: SQL query parameter is required.")]
    MissingQuery,
    #[error("Failed to execute. Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to execute. Error: {0}")]
    Execution(String),
    #[error("Failed to execute. Error: {0}")]
    Dataset(#[from] csv::Error),
    #[error("Failed to execute. Error: chart rendering timed out after {0}s")]
    Timeout(u64),
}

/// Chart-rendering sandbox. Returns the handle of the written chart.
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render(&self, request: ChartRequest<'_>) -> Result<String, RenderError>;
}

/// Runs matplotlib code in a child Python process against a CSV dump of the rows.
#[derive(Clone, Debug)]
pub struct PythonChartRenderer {
    directory: PathBuf,
    python_bin: String,
    timeout: Duration,
}

impl PythonChartRenderer {
    pub fn new(directory: impl Into<PathBuf>, python_bin: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            directory: directory.into(),
            python_bin: python_bin.into(),
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    pub fn from_config(config: &ChartConfig) -> Self {
        Self::new(config.directory.clone(), config.python_bin.clone(), config.timeout_secs)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Script paths already include the chart directory, so the child keeps our working directory.
    fn script_command(&self, script_path: &Path) -> Command {
        let mut command = Command::new(&self.python_bin);
        command
            .arg(script_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn run_script(&self, script_path: &Path) -> Result<String, RenderError> {
        let child = self.script_command(script_path).output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| RenderError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.trim().lines().last().unwrap_or("python exited unsuccessfully");
            return Err(RenderError::Execution(format!("{detail} ({})", output.status)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl ChartRenderer for PythonChartRenderer {
    async fn render(&self, request: ChartRequest<'_>) -> Result<String, RenderError> {
        if request.sql_query.trim().is_empty() {
            return Err(RenderError::MissingQuery);
        }

        tokio::fs::create_dir_all(&self.directory).await?;
        let run_id = Uuid::new_v4();
        let csv_path = self.directory.join(format!("{run_id}.csv"));
        let script_path = self.directory.join(format!("{run_id}.py"));
        let chart_path = self.directory.join(format!("{}.png", Uuid::new_v4()));

        tokio::fs::write(&csv_path, rows_to_csv(request.headers, request.rows)?).await?;
        tokio::fs::write(&script_path, build_script(request.code, &csv_path, &chart_path)).await?;

        let outcome = self.run_script(&script_path).await;

        for scratch in [&csv_path, &script_path] {
            if let Err(error) = tokio::fs::remove_file(scratch).await {
                warn!(
                    event_name = "agent.chart.cleanup_failed",
                    path = %scratch.display(),
                    error = %error,
                    "could not remove chart scratch file"
                );
            }
        }

        let stdout = outcome?;
        if !stdout.is_empty() {
            debug!(event_name = "agent.chart.stdout", stdout = %stdout, "chart script output");
        }
        if tokio::fs::metadata(&chart_path).await.is_err() {
            return Err(RenderError::Execution("script finished without writing a chart".to_string()));
        }

        Ok(chart_path.display().to_string())
    }
}

/// Headless preamble, dataframe injection, the model's code minus any savefig, then our savefig.
pub fn build_script(code: &str, csv_path: &Path, chart_path: &Path) -> String {
    let body = code
        .lines()
        .filter(|line| !line.contains("plt.savefig("))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "import matplotlib\nmatplotlib.use('Agg')\nimport matplotlib.pyplot as plt\n\
         import pandas as pd\ndf = pd.read_csv({csv})\n{body}\nplt.savefig({chart})\n",
        csv = python_str(csv_path),
        chart = python_str(chart_path),
    )
}

// A JSON string literal is also a valid Python string literal.
fn python_str(path: &Path) -> String {
    Value::String(path.display().to_string().replace('\\', "/")).to_string()
}

pub fn rows_to_csv(headers: &[String], rows: &[RowRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    if !headers.is_empty() {
        writer.write_record(headers)?;
    }

    for row in rows {
        if headers.is_empty() {
            writer.write_record(row.values().into_iter().map(cell_text))?;
        } else {
            writer.write_record(headers.iter().enumerate().map(|(index, header)| {
                row.cell(header, index).map(cell_text).unwrap_or_default()
            }))?;
        }
    }

    writer.into_inner().map_err(|error| csv::Error::from(error.into_error()))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use serde_json::json;
    use staffchat_core::config::AppConfig;
    use staffchat_core::RowRecord;

    use super::{build_script, rows_to_csv, ChartRenderer, ChartRequest, PythonChartRenderer, RenderError};

    #[test]
    fn script_replaces_model_savefig_with_ours() {
        let code = "plt.plot(df['day'], df['logins'])\nplt.savefig('elsewhere.png')\nplt.title('x')";

        let script = build_script(code, Path::new("/tmp/c/data.csv"), Path::new("/tmp/c/out.png"));

        assert!(script.starts_with("import matplotlib\nmatplotlib.use('Agg')\n"));
        assert!(script.contains("df = pd.read_csv(\"/tmp/c/data.csv\")"));
        assert!(!script.contains("elsewhere.png"));
        assert!(script.contains("plt.title('x')"));
        assert!(script.trim_end().ends_with("plt.savefig(\"/tmp/c/out.png\")"));
    }

    #[test]
    fn csv_quotes_awkward_fields_and_orders_mapping_cells_by_header() {
        let headers = vec!["day".to_string(), "note".to_string()];
        let rows = vec![
            RowRecord::Positional(vec![json!("2024-01-01"), json!("a, \"b\"")]),
            serde_json::from_value(json!({"note": null, "day": "2024-01-02"})).expect("row"),
        ];

        let csv = rows_to_csv(&headers, &rows).expect("csv");

        assert_eq!(
            String::from_utf8(csv).expect("utf8"),
            "day,note\n2024-01-01,\"a, \"\"b\"\"\"\n2024-01-02,\n"
        );
    }

    #[tokio::test]
    async fn missing_query_is_rejected_before_touching_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let renderer = PythonChartRenderer::new(dir.path().join("charts"), "python3", 5);

        let error = renderer
            .render(ChartRequest { code: "plt.plot(df)", sql_query: " ", headers: &[], rows: &[] })
            .await
            .expect_err("should refuse");

        assert!(matches!(error, RenderError::MissingQuery));
        assert_eq!(error.to_string(), "Error: SQL query parameter is required.");
        assert!(!dir.path().join("charts").exists());
    }

    #[tokio::test]
    async fn spawn_failure_is_reported_and_scratch_files_are_removed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let renderer = PythonChartRenderer::new(dir.path(), "/nonexistent/staffchat-python", 5);
        let headers = vec!["n".to_string()];
        let rows = vec![RowRecord::Positional(vec![json!(1)])];

        let error = renderer
            .render(ChartRequest {
                code: "plt.plot(df)",
                sql_query: "SELECT 1 AS n",
                headers: &headers,
                rows: &rows,
            })
            .await
            .expect_err("binary does not exist");

        assert!(error.to_string().starts_with("Failed to execute. Error: "));
        let leftovers = std::fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(leftovers, 0, "csv and script must be cleaned up");
    }

    #[test]
    fn default_config_runs_script_from_the_callers_working_directory() {
        let renderer = PythonChartRenderer::from_config(&AppConfig::default().charts);
        let script_path = renderer.directory().join("run.py");

        let command = renderer.script_command(&script_path);
        let std_command = command.as_std();

        assert_eq!(renderer.directory(), Path::new("charts"));
        assert_eq!(std_command.get_current_dir(), None);
        assert_eq!(std_command.get_args().collect::<Vec<_>>(), [Path::new("charts/run.py").as_os_str()]);
    }

    #[test]
    fn rows_without_headers_are_written_positionally() {
        let rows = vec![
            RowRecord::Positional(vec![json!(1), json!("x")]),
            RowRecord::Positional(vec![json!(2.5)]),
        ];

        let csv = rows_to_csv(&[], &rows).expect("csv");

        assert_eq!(String::from_utf8(csv).expect("utf8"), "1,x\n2.5\n");
    }

    // `cat` reads the script back, so a wrong script path shows up as a spawn-side error.
    #[cfg(unix)]
    #[tokio::test]
    async fn relative_chart_directory_resolves_script_path_once() {
        let dir = tempfile::tempdir_in(".").expect("tempdir");
        let relative = dir.path().join("charts");
        assert!(relative.is_relative());
        let renderer = PythonChartRenderer::new(&relative, "cat", 5);
        let headers = vec!["n".to_string()];
        let rows = vec![RowRecord::Positional(vec![json!(1)])];

        let error = renderer
            .render(ChartRequest {
                code: "plt.plot(df)",
                sql_query: "SELECT 1 AS n",
                headers: &headers,
                rows: &rows,
            })
            .await
            .expect_err("cat never writes a chart");

        assert_eq!(
            error.to_string(),
            "Failed to execute. Error: script finished without writing a chart"
        );
        let leftovers = std::fs::read_dir(&relative).expect("read dir").count();
        assert_eq!(leftovers, 0);
    }
}
