use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use staffchat_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let entries: Vec<(&str, String, &[&str])> = vec![
        ("database.url", config.database.url.clone(), &["STAFFCHAT_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["STAFFCHAT_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["STAFFCHAT_DATABASE_TIMEOUT_SECS"],
        ),
        (
            "llm.api_key",
            redact_token(config.llm.api_key.expose_secret()),
            &["STAFFCHAT_LLM_API_KEY", "OPENAI_API_KEY"],
        ),
        ("llm.base_url", config.llm.base_url.clone(), &["STAFFCHAT_LLM_BASE_URL"]),
        ("llm.router_model", config.llm.router_model.clone(), &["STAFFCHAT_LLM_ROUTER_MODEL"]),
        ("llm.query_model", config.llm.query_model.clone(), &["STAFFCHAT_LLM_QUERY_MODEL"]),
        (
            "llm.analysis_model",
            config.llm.analysis_model.clone(),
            &["STAFFCHAT_LLM_ANALYSIS_MODEL"],
        ),
        ("llm.temperature", config.llm.temperature.to_string(), &[]),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), &["STAFFCHAT_LLM_TIMEOUT_SECS"]),
        (
            "charts.directory",
            config.charts.directory.display().to_string(),
            &["STAFFCHAT_CHARTS_DIRECTORY"],
        ),
        ("charts.python_bin", config.charts.python_bin.clone(), &["STAFFCHAT_CHARTS_PYTHON_BIN"]),
        (
            "charts.timeout_secs",
            config.charts.timeout_secs.to_string(),
            &["STAFFCHAT_CHARTS_TIMEOUT_SECS"],
        ),
        (
            "anomaly.baseline_path",
            config.anomaly.baseline_path.display().to_string(),
            &["STAFFCHAT_ANOMALY_BASELINE_PATH"],
        ),
        (
            "history.max_tokens",
            config.history.max_tokens.to_string(),
            &["STAFFCHAT_HISTORY_MAX_TOKENS"],
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            &["STAFFCHAT_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), &["STAFFCHAT_SERVER_PORT"]),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["STAFFCHAT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["STAFFCHAT_LOGGING_LEVEL", "STAFFCHAT_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["STAFFCHAT_LOGGING_FORMAT", "STAFFCHAT_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in entries {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("staffchat.toml"), PathBuf::from("config/staffchat.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }
    "<redacted>".to_string()
}
