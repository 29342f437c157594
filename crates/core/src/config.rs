//! Runtime configuration, resolved in precedence order: built-in defaults,
//! then an optional `quill.toml`, then `QUILL_*` environment variables, then
//! programmatic overrides. The result is validated before anything else
//! starts, so a bad deployment fails at boot rather than mid-request.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

const CONFIG_FILE_CANDIDATES: [&str; 2] = ["quill.toml", "config/quill.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub intake: IntakeConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct IntakeConfig {
    /// Shared secret partner portals present on referred-lead submissions.
    /// Unset means partner intake is open (e.g. local development).
    pub partner_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unrecognized log format `{other}`, expected one of compact, pretty, json"
            ))),
        }
    }
}

/// Programmatic last-word overrides, applied after file and environment.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub server_port: Option<u16>,
    pub partner_token: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("config file is required but missing: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("config file references undefined environment variable `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated `${{...}}` interpolation in config file")]
    UnterminatedInterpolation,
    #[error("environment override `{key}` has unusable value `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://quill.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            intake: IntakeConfig { partner_token: None },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match locate_config_file(options.config_path.as_deref()) {
            Some(path) => parse_config_file(&path)?.merge_into(&mut config),
            None if options.require_file => {
                let expected = options
                    .config_path
                    .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }

        config.overlay_env()?;
        options.overrides.apply(&mut config);
        config.validate()?;

        Ok(config)
    }

    fn overlay_env(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = env_string("QUILL_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(max_connections) = env_parsed("QUILL_DATABASE_MAX_CONNECTIONS")? {
            self.database.max_connections = max_connections;
        }
        if let Some(timeout_secs) = env_parsed("QUILL_DATABASE_TIMEOUT_SECS")? {
            self.database.timeout_secs = timeout_secs;
        }

        if let Some(bind_address) = env_string("QUILL_SERVER_BIND_ADDRESS") {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = env_parsed("QUILL_SERVER_PORT")? {
            self.server.port = port;
        }
        if let Some(drain) = env_parsed("QUILL_SERVER_GRACEFUL_SHUTDOWN_SECS")? {
            self.server.graceful_shutdown_secs = drain;
        }

        if let Some(token) = env_string("QUILL_INTAKE_PARTNER_TOKEN") {
            self.intake.partner_token = Some(token.into());
        }

        // the short QUILL_LOG_* aliases are kept for operator convenience
        if let Some(level) =
            env_string("QUILL_LOGGING_LEVEL").or_else(|| env_string("QUILL_LOG_LEVEL"))
        {
            self.logging.level = level;
        }
        let format = match env_parsed("QUILL_LOGGING_FORMAT")? {
            Some(format) => Some(format),
            None => env_parsed("QUILL_LOG_FORMAT")?,
        };
        if let Some(format) = format {
            self.logging.format = format;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.server.validate()?;
        self.intake.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

impl DatabaseConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let url = self.url.trim();
        if !(url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:") {
            return Err(ConfigError::Validation(
                "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                    .to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be greater than zero".to_string(),
            ));
        }
        if !(1..=300).contains(&self.timeout_secs) {
            return Err(ConfigError::Validation(
                "database.timeout_secs must be in range 1..=300".to_string(),
            ));
        }
        Ok(())
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server.bind_address must not be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(ConfigError::Validation(
                "server.port must be greater than zero".to_string(),
            ));
        }
        if self.graceful_shutdown_secs == 0 {
            return Err(ConfigError::Validation(
                "server.graceful_shutdown_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl IntakeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match &self.partner_token {
            Some(token) if token.expose_secret().trim().is_empty() => Err(ConfigError::Validation(
                "intake.partner_token must not be blank when set (unset it to disable the check)"
                    .to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ConfigError::Validation(
                "logging.level must be one of trace|debug|info|warn|error".to_string(),
            )),
        }
    }
}

impl ConfigOverrides {
    fn apply(self, config: &mut AppConfig) {
        if let Some(database_url) = self.database_url {
            config.database.url = database_url;
        }
        if let Some(port) = self.server_port {
            config.server.port = port;
        }
        if let Some(partner_token) = self.partner_token {
            config.intake.partner_token = Some(partner_token.into());
        }
        if let Some(log_level) = self.log_level {
            config.logging.level = log_level;
        }
    }
}

fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists()),
    }
}

fn parse_config_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    let expanded = expand_env_refs(&raw)?;

    toml::from_str(&expanded)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Replace every `${VAR}` in the file body with the named environment
/// variable before TOML parsing, so secrets never have to live in the file.
fn expand_env_refs(input: &str) -> Result<String, ConfigError> {
    let mut expanded = String::with_capacity(input.len());
    let mut remaining = input;

    while let Some(start) = remaining.find("${") {
        expanded.push_str(&remaining[..start]);
        let expression = &remaining[start + 2..];
        let Some(end) = expression.find('}') else {
            return Err(ConfigError::UnterminatedInterpolation);
        };

        let var = &expression[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        expanded.push_str(&value);
        remaining = &expression[end + 1..];
    }

    expanded.push_str(remaining);
    Ok(expanded)
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parsed<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    let Some(value) = env_string(key) else {
        return Ok(None);
    };

    match value.trim().parse() {
        Ok(parsed) => Ok(Some(parsed)),
        Err(_) => Err(ConfigError::InvalidEnvOverride { key: key.to_string(), value }),
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    database: Option<RawDatabase>,
    server: Option<RawServer>,
    intake: Option<RawIntake>,
    logging: Option<RawLogging>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawServer {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawIntake {
    partner_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl RawConfig {
    fn merge_into(self, config: &mut AppConfig) {
        if let Some(database) = self.database {
            merge_field(database.url, &mut config.database.url);
            merge_field(database.max_connections, &mut config.database.max_connections);
            merge_field(database.timeout_secs, &mut config.database.timeout_secs);
        }
        if let Some(server) = self.server {
            merge_field(server.bind_address, &mut config.server.bind_address);
            merge_field(server.port, &mut config.server.port);
            merge_field(server.graceful_shutdown_secs, &mut config.server.graceful_shutdown_secs);
        }
        if let Some(intake) = self.intake {
            if let Some(token) = intake.partner_token {
                config.intake.partner_token = Some(token.into());
            }
        }
        if let Some(logging) = self.logging {
            merge_field(logging.level, &mut config.logging.level);
            merge_field(logging.format, &mut config.logging.format);
        }
    }
}

fn merge_field<T>(candidate: Option<T>, target: &mut T) {
    if let Some(value) = candidate {
        *target = value;
    }
}
