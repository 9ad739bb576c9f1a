use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use paygate_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    CommandResult { exit_code: 0, output: render(&config) }
}

pub fn render(config: &AppConfig) -> String {
    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let admin_identity =
        config.admin.identity.map_or_else(|| "<unset>".to_string(), |identity| identity.to_string());
    let rows = [
        (
            "telegram.bot_token",
            redact_token(config.telegram.bot_token.expose_secret()),
            source("telegram.bot_token", &["PAYGATE_TELEGRAM_BOT_TOKEN", "BOT_TOKEN"]),
        ),
        ("admin.identity", admin_identity, source("admin.identity", &["PAYGATE_ADMIN_ID", "ADMIN_ID"])),
        (
            "admin.owner_handle",
            config.admin.owner_handle.clone(),
            source("admin.owner_handle", &["PAYGATE_OWNER_USERNAME", "OWNER_USERNAME"]),
        ),
        (
            "polling.timeout_secs",
            config.polling.timeout_secs.to_string(),
            source("polling.timeout_secs", &["PAYGATE_POLLING_TIMEOUT_SECS"]),
        ),
        (
            "polling.max_retries",
            config.polling.max_retries.to_string(),
            source("polling.max_retries", &["PAYGATE_POLLING_MAX_RETRIES"]),
        ),
        (
            "polling.base_delay_ms",
            config.polling.base_delay_ms.to_string(),
            source("polling.base_delay_ms", &[]),
        ),
        (
            "polling.max_delay_ms",
            config.polling.max_delay_ms.to_string(),
            source("polling.max_delay_ms", &[]),
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            source("server.bind_address", &["PAYGATE_SERVER_BIND_ADDRESS"]),
        ),
        (
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            source("server.health_check_port", &["PAYGATE_SERVER_HEALTH_CHECK_PORT"]),
        ),
        (
            "server.health_enabled",
            config.server.health_enabled.to_string(),
            source("server.health_enabled", &["PAYGATE_SERVER_HEALTH_ENABLED"]),
        ),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            source("server.graceful_shutdown_secs", &["PAYGATE_SERVER_GRACEFUL_SHUTDOWN_SECS"]),
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            source("logging.level", &["PAYGATE_LOGGING_LEVEL", "PAYGATE_LOG_LEVEL"]),
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            source("logging.format", &["PAYGATE_LOGGING_FORMAT", "PAYGATE_LOG_FORMAT"]),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(rows.into_iter().map(|(key, value, source)| render_line(key, &value, source)));
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("paygate.toml"), PathBuf::from("config/paygate.toml")]
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

/// Keeps the public bot id before `:` and hides the secret half.
pub fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::redact_token;

    #[test]
    fn redaction_keeps_only_bot_id() {
        assert_eq!(redact_token("123456:AAE-secret"), "123456:***");
        assert_eq!(redact_token("  "), "<empty>");
        assert_eq!(redact_token("opaque"), "<redacted>");
    }
}
