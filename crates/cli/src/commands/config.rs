use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use steps_core::config::{AppConfig, LoadOptions};
use toml::Value;

/// `(key path, env override)` for every rendered setting.
const FIELDS: &[(&str, &str)] = &[
    ("database.url", "STEPS_DATABASE_URL"),
    ("database.max_connections", "STEPS_DATABASE_MAX_CONNECTIONS"),
    ("database.timeout_secs", "STEPS_DATABASE_TIMEOUT_SECS"),
    ("server.bind_address", "STEPS_SERVER_BIND_ADDRESS"),
    ("server.port", "STEPS_SERVER_PORT"),
    ("server.graceful_shutdown_secs", "STEPS_SERVER_GRACEFUL_SHUTDOWN_SECS"),
    ("auth.api_token", "STEPS_AUTH_API_TOKEN"),
    ("drafts.directory", "STEPS_DRAFTS_DIRECTORY"),
    ("logging.level", "STEPS_LOGGING_LEVEL"),
    ("logging.format", "STEPS_LOGGING_FORMAT"),
];

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for &(key_path, env_key) in FIELDS {
        lines.push(render_line(
            key_path,
            &field_value(&config, key_path),
            field_source(key_path, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref()),
        ));
    }

    lines.join("\n")
}

fn field_value(config: &AppConfig, key_path: &str) -> String {
    match key_path {
        "database.url" => config.database.url.clone(),
        "database.max_connections" => config.database.max_connections.to_string(),
        "database.timeout_secs" => config.database.timeout_secs.to_string(),
        "server.bind_address" => config.server.bind_address.clone(),
        "server.port" => config.server.port.to_string(),
        "server.graceful_shutdown_secs" => config.server.graceful_shutdown_secs.to_string(),
        "auth.api_token" => config
            .auth
            .api_token
            .as_ref()
            .map(|token| redact_token(token.expose_secret()))
            .unwrap_or_else(|| "<unset>".to_string()),
        "drafts.directory" => config.drafts.directory.display().to_string(),
        "logging.level" => config.logging.level.clone(),
        "logging.format" => config.logging.format.as_str().to_string(),
        _ => "<unknown>".to_string(),
    }
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("steps.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/steps.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
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

    let visible = trimmed.chars().take(4).collect::<String>();
    format!("{visible}***")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token, render_line};

    #[test]
    fn tokens_are_redacted_to_a_short_prefix() {
        assert_eq!(redact_token("0123456789abcdef"), "0123***");
        assert_eq!(redact_token("   "), "<empty>");
    }

    #[test]
    fn nested_key_paths_are_found_in_the_config_file() {
        let doc: Value = "[server]\nport = 9090\n".parse().expect("toml");
        assert!(contains_path(&doc, "server.port"));
        assert!(!contains_path(&doc, "server.bind_address"));
        assert_eq!(
            render_line("server.port", "9090", "file (steps.toml)".to_string()),
            "- server.port = 9090 (source: file (steps.toml))"
        );
    }
}
