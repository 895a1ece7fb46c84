use std::path::Path;

use secrecy::ExposeSecret;
use staffchat_core::config::{AppConfig, LoadOptions};
use staffchat_db::{connect_with_settings, AccessMode};
use serde::Serialize;

use crate::commands::current_thread_runtime;

const STAFFCONNECT_TABLES: [&str; 5] =
    ["AuditTrail", "Master_ActionType", "Users", "Master_Role", "ELMAH_Error"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm_readiness(&config));
            checks.push(check_database(&config));
            checks.push(check_chart_directory(&config.charts.directory));
            checks.push(check_baseline(&config.anomaly.baseline_path));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["llm_readiness", "database_schema", "chart_directory", "anomaly_baseline"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| matches!(check.status, CheckStatus::Pass | CheckStatus::Warn));
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm_readiness(config: &AppConfig) -> DoctorCheck {
    let key_set = !config.llm.api_key.expose_secret().trim().is_empty();
    DoctorCheck {
        name: "llm_readiness",
        status: if key_set { CheckStatus::Pass } else { CheckStatus::Fail },
        details: format!(
            "endpoint `{}`, router `{}`, query `{}`, analysis `{}`",
            config.llm.base_url,
            config.llm.router_model,
            config.llm.query_model,
            config.llm.analysis_model
        ),
    }
}

fn check_database(config: &AppConfig) -> DoctorCheck {
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_schema",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
            AccessMode::ReadOnly,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        let mut missing = Vec::new();
        for table in STAFFCONNECT_TABLES {
            let present: i64 = sqlx::query_scalar(
                "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .map_err(|error| format!("schema lookup failed: {error}"))?;
            if present == 0 {
                missing.push(table);
            }
        }

        pool.close().await;
        Ok::<Vec<&str>, String>(missing)
    });

    match result {
        Ok(missing) if missing.is_empty() => DoctorCheck {
            name: "database_schema",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`; all StaffConnect tables present", config.database.url),
        },
        Ok(missing) => DoctorCheck {
            name: "database_schema",
            status: CheckStatus::Fail,
            details: format!("missing tables: {} (run `staffchat seed` for demo data)", missing.join(", ")),
        },
        Err(error) => DoctorCheck { name: "database_schema", status: CheckStatus::Fail, details: error },
    }
}

fn check_chart_directory(directory: &Path) -> DoctorCheck {
    match std::fs::create_dir_all(directory) {
        Ok(()) => DoctorCheck {
            name: "chart_directory",
            status: CheckStatus::Pass,
            details: format!("`{}` is available", directory.display()),
        },
        Err(error) => DoctorCheck {
            name: "chart_directory",
            status: CheckStatus::Fail,
            details: format!("`{}` could not be created: {error}", directory.display()),
        },
    }
}

fn check_baseline(path: &Path) -> DoctorCheck {
    if path.is_file() {
        DoctorCheck {
            name: "anomaly_baseline",
            status: CheckStatus::Pass,
            details: format!("baseline found at `{}`", path.display()),
        }
    } else {
        DoctorCheck {
            name: "anomaly_baseline",
            status: CheckStatus::Warn,
            details: format!("`{}` not found; anomaly analysis runs without a baseline", path.display()),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
