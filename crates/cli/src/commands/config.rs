use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use quill_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = locate_config_file();
    let file_doc = file_path.as_deref().and_then(read_toml_doc);

    let partner_token =
        if config.intake.partner_token.is_some() { "<redacted>" } else { "<unset>" };

    // (key path, effective value, env override name)
    let rows: [(&str, String, &str); 9] = [
        ("database.url", config.database.url.clone(), "QUILL_DATABASE_URL"),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            "QUILL_DATABASE_MAX_CONNECTIONS",
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            "QUILL_DATABASE_TIMEOUT_SECS",
        ),
        ("server.bind_address", config.server.bind_address.clone(), "QUILL_SERVER_BIND_ADDRESS"),
        ("server.port", config.server.port.to_string(), "QUILL_SERVER_PORT"),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            "QUILL_SERVER_GRACEFUL_SHUTDOWN_SECS",
        ),
        ("intake.partner_token", partner_token.to_string(), "QUILL_INTAKE_PARTNER_TOKEN"),
        ("logging.level", config.logging.level.clone(), "QUILL_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "QUILL_LOGGING_FORMAT"),
    ];

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in rows {
        let source = field_source(key, env_key, file_doc.as_ref(), file_path.as_deref());
        lines.push(format!("- {key} = {value} (source: {source})"));
    }

    lines.join("\n")
}

fn locate_config_file() -> Option<PathBuf> {
    ["quill.toml", "config/quill.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_toml_doc(path: &Path) -> Option<Value> {
    fs::read_to_string(path).ok()?.parse().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    file_doc: Option<&Value>,
    file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if file_doc.is_some_and(|doc| doc_contains(doc, key_path)) {
        let display = file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({display})");
    }

    "default".to_string()
}

fn doc_contains(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        match current.get(key) {
            Some(next) => current = next,
            None => return false,
        }
    }
    true
}
