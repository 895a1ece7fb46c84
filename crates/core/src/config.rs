use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub charts: ChartConfig,
    pub anomaly: AnomalyConfig,
    pub history: HistoryConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub router_model: String,
    pub query_model: String,
    pub analysis_model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ChartConfig {
    pub directory: PathBuf,
    pub python_bin: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AnomalyConfig {
    pub baseline_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct HistoryConfig {
    pub max_tokens: usize,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub chart_directory: Option<PathBuf>,
    pub baseline_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://staffconnect.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                api_key: String::new().into(),
                base_url: "https://api.openai.com/v1".to_string(),
                router_model: "gpt-4o-mini".to_string(),
                query_model: "gpt-4o-mini".to_string(),
                analysis_model: "o3-mini".to_string(),
                temperature: 0.1,
                timeout_secs: 60,
            },
            charts: ChartConfig {
                directory: PathBuf::from("charts"),
                python_bin: "python3".to_string(),
                timeout_secs: 60,
            },
            anomaly: AnomalyConfig { baseline_path: PathBuf::from("memory/elmah_baseline.txt") },
            history: HistoryConfig { max_tokens: 112_000 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("staffchat.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = secret_value(llm_api_key_value);
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(router_model) = llm.router_model {
                self.llm.router_model = router_model;
            }
            if let Some(query_model) = llm.query_model {
                self.llm.query_model = query_model;
            }
            if let Some(analysis_model) = llm.analysis_model {
                self.llm.analysis_model = analysis_model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(charts) = patch.charts {
            if let Some(directory) = charts.directory {
                self.charts.directory = directory;
            }
            if let Some(python_bin) = charts.python_bin {
                self.charts.python_bin = python_bin;
            }
            if let Some(timeout_secs) = charts.timeout_secs {
                self.charts.timeout_secs = timeout_secs;
            }
        }

        if let Some(anomaly) = patch.anomaly {
            if let Some(baseline_path) = anomaly.baseline_path {
                self.anomaly.baseline_path = baseline_path;
            }
        }

        if let Some(history) = patch.history {
            if let Some(max_tokens) = history.max_tokens {
                self.history.max_tokens = max_tokens;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("STAFFCHAT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("STAFFCHAT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("STAFFCHAT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("STAFFCHAT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("STAFFCHAT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let api_key = read_env("STAFFCHAT_LLM_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = secret_value(value);
        }
        if let Some(value) = read_env("STAFFCHAT_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("STAFFCHAT_LLM_ROUTER_MODEL") {
            self.llm.router_model = value;
        }
        if let Some(value) = read_env("STAFFCHAT_LLM_QUERY_MODEL") {
            self.llm.query_model = value;
        }
        if let Some(value) = read_env("STAFFCHAT_LLM_ANALYSIS_MODEL") {
            self.llm.analysis_model = value;
        }
        if let Some(value) = read_env("STAFFCHAT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("STAFFCHAT_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("STAFFCHAT_CHARTS_DIRECTORY") {
            self.charts.directory = PathBuf::from(value);
        }
        if let Some(value) = read_env("STAFFCHAT_CHARTS_PYTHON_BIN") {
            self.charts.python_bin = value;
        }
        if let Some(value) = read_env("STAFFCHAT_CHARTS_TIMEOUT_SECS") {
            self.charts.timeout_secs = parse_u64("STAFFCHAT_CHARTS_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("STAFFCHAT_ANOMALY_BASELINE_PATH") {
            self.anomaly.baseline_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("STAFFCHAT_HISTORY_MAX_TOKENS") {
            self.history.max_tokens = parse_usize("STAFFCHAT_HISTORY_MAX_TOKENS", &value)?;
        }

        if let Some(value) = read_env("STAFFCHAT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("STAFFCHAT_SERVER_PORT") {
            self.server.port = parse_u16("STAFFCHAT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("STAFFCHAT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("STAFFCHAT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("STAFFCHAT_LOGGING_LEVEL").or_else(|| read_env("STAFFCHAT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("STAFFCHAT_LOGGING_FORMAT").or_else(|| read_env("STAFFCHAT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = secret_value(llm_api_key);
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(chart_directory) = overrides.chart_directory {
            self.charts.directory = chart_directory;
        }
        if let Some(baseline_path) = overrides.baseline_path {
            self.anomaly.baseline_path = baseline_path;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_charts(&self.charts)?;
        validate_history(&self.history)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("staffchat.toml"), PathBuf::from("config/staffchat.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(strip_quotes(&value));
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "llm.api_key is required (set STAFFCHAT_LLM_API_KEY or OPENAI_API_KEY)".to_string(),
        ));
    }

    let base_url = llm.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    for (key, model) in [
        ("llm.router_model", &llm.router_model),
        ("llm.query_model", &llm.query_model),
        ("llm.analysis_model", &llm.analysis_model),
    ] {
        if model.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{key} must not be empty")));
        }
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_charts(charts: &ChartConfig) -> Result<(), ConfigError> {
    if charts.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation("charts.directory must not be empty".to_string()));
    }
    if charts.python_bin.trim().is_empty() {
        return Err(ConfigError::Validation("charts.python_bin must not be empty".to_string()));
    }
    if charts.timeout_secs == 0 || charts.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "charts.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    Ok(())
}

fn validate_history(history: &HistoryConfig) -> Result<(), ConfigError> {
    if history.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "history.max_tokens must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

/// Deployment tooling tends to wrap env values in quotes; the raw value is what we want.
fn strip_quotes(value: &str) -> &str {
    value.trim().trim_matches(|ch| ch == '"' || ch == '\'')
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| strip_quotes(&value).to_string()).filter(|value| !value.is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    charts: Option<ChartPatch>,
    anomaly: Option<AnomalyPatch>,
    history: Option<HistoryPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    router_model: Option<String>,
    query_model: Option<String>,
    analysis_model: Option<String>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartPatch {
    directory: Option<PathBuf>,
    python_bin: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AnomalyPatch {
    baseline_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryPatch {
    max_tokens: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
