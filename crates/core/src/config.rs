use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::identity::Identity;

pub const DEFAULT_OWNER_HANDLE: &str = "@dtxzahid";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub admin: AdminConfig,
    pub polling: PollingConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
}

#[derive(Clone, Debug)]
pub struct AdminConfig {
    pub identity: Option<Identity>,
    pub owner_handle: String,
}

#[derive(Clone, Debug)]
pub struct PollingConfig {
    pub timeout_secs: u32,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub health_enabled: bool,
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
    pub bot_token: Option<String>,
    pub admin_identity: Option<Identity>,
    pub owner_handle: Option<String>,
    pub log_level: Option<String>,
    pub health_check_port: Option<u16>,
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
            telegram: TelegramConfig { bot_token: String::new().into() },
            admin: AdminConfig { identity: None, owner_handle: DEFAULT_OWNER_HANDLE.to_string() },
            polling: PollingConfig {
                timeout_secs: 30,
                max_retries: 5,
                base_delay_ms: 500,
                max_delay_ms: 30_000,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                health_enabled: true,
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

impl AdminConfig {
    pub fn required_identity(&self) -> Result<Identity, ConfigError> {
        self.identity.ok_or_else(|| {
            ConfigError::Validation(
                "admin.identity is required (set PAYGATE_ADMIN_ID or ADMIN_ID to the administrator's numeric user id)"
                    .to_string(),
            )
        })
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("paygate.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(telegram) = patch.telegram {
            if let Some(bot_token_value) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token_value);
            }
        }

        if let Some(admin) = patch.admin {
            if let Some(identity) = admin.identity {
                self.admin.identity = Some(Identity(identity));
            }
            if let Some(owner_handle) = admin.owner_handle {
                self.admin.owner_handle = owner_handle;
            }
        }

        if let Some(polling) = patch.polling {
            if let Some(timeout_secs) = polling.timeout_secs {
                self.polling.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = polling.max_retries {
                self.polling.max_retries = max_retries;
            }
            if let Some(base_delay_ms) = polling.base_delay_ms {
                self.polling.base_delay_ms = base_delay_ms;
            }
            if let Some(max_delay_ms) = polling.max_delay_ms {
                self.polling.max_delay_ms = max_delay_ms;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(health_enabled) = server.health_enabled {
                self.server.health_enabled = health_enabled;
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
        if let Some((_, value)) = read_env_any(&["PAYGATE_TELEGRAM_BOT_TOKEN", "BOT_TOKEN"]) {
            self.telegram.bot_token = secret_value(value);
        }

        if let Some((key, value)) = read_env_any(&["PAYGATE_ADMIN_ID", "ADMIN_ID"]) {
            self.admin.identity = Some(parse_identity(key, &value)?);
        }
        if let Some((_, value)) = read_env_any(&["PAYGATE_OWNER_USERNAME", "OWNER_USERNAME"]) {
            self.admin.owner_handle = value;
        }

        if let Some(value) = read_env("PAYGATE_POLLING_TIMEOUT_SECS") {
            self.polling.timeout_secs = parse_u32("PAYGATE_POLLING_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PAYGATE_POLLING_MAX_RETRIES") {
            self.polling.max_retries = parse_u32("PAYGATE_POLLING_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("PAYGATE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PAYGATE_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("PAYGATE_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("PAYGATE_SERVER_HEALTH_ENABLED") {
            self.server.health_enabled = parse_bool("PAYGATE_SERVER_HEALTH_ENABLED", &value)?;
        }
        if let Some(value) = read_env("PAYGATE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PAYGATE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some((_, value)) = read_env_any(&["PAYGATE_LOGGING_LEVEL", "PAYGATE_LOG_LEVEL"]) {
            self.logging.level = value;
        }
        if let Some((_, value)) = read_env_any(&["PAYGATE_LOGGING_FORMAT", "PAYGATE_LOG_FORMAT"])
        {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bot_token) = overrides.bot_token {
            self.telegram.bot_token = secret_value(bot_token);
        }
        if let Some(admin_identity) = overrides.admin_identity {
            self.admin.identity = Some(admin_identity);
        }
        if let Some(owner_handle) = overrides.owner_handle {
            self.admin.owner_handle = owner_handle;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(health_check_port) = overrides.health_check_port {
            self.server.health_check_port = health_check_port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_telegram(&self.telegram)?;
        validate_admin(&self.admin)?;
        validate_polling(&self.polling)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("paygate.toml"), PathBuf::from("config/paygate.toml")]
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
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    let bot_token = telegram.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required (set PAYGATE_TELEGRAM_BOT_TOKEN or BOT_TOKEN). Get it from @BotFather".to_string(),
        ));
    }

    let well_formed = bot_token.split_once(':').is_some_and(|(bot_id, secret)| {
        !bot_id.is_empty() && bot_id.bytes().all(|byte| byte.is_ascii_digit()) && !secret.is_empty()
    });
    if !well_formed {
        return Err(ConfigError::Validation(
            "telegram.bot_token must look like `<bot id>:<secret>` as issued by @BotFather"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_admin(admin: &AdminConfig) -> Result<(), ConfigError> {
    admin.required_identity()?;

    if admin.owner_handle.trim().is_empty() {
        return Err(ConfigError::Validation("admin.owner_handle must not be empty".to_string()));
    }

    Ok(())
}

fn validate_polling(polling: &PollingConfig) -> Result<(), ConfigError> {
    if polling.timeout_secs == 0 || polling.timeout_secs > 50 {
        return Err(ConfigError::Validation(
            "polling.timeout_secs must be in range 1..=50".to_string(),
        ));
    }

    if polling.base_delay_ms > polling.max_delay_ms {
        return Err(ConfigError::Validation(
            "polling.base_delay_ms must not exceed polling.max_delay_ms".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_enabled && server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
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

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_env_any<'a>(keys: &[&'a str]) -> Option<(&'a str, String)> {
    keys.iter().find_map(|key| read_env(key).map(|value| (*key, value)))
}

fn parse_identity(key: &str, value: &str) -> Result<Identity, ConfigError> {
    value.parse::<Identity>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
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

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    telegram: Option<TelegramPatch>,
    admin: Option<AdminPatch>,
    polling: Option<PollingPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AdminPatch {
    identity: Option<u64>,
    owner_handle: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PollingPatch {
    timeout_secs: Option<u32>,
    max_retries: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    health_enabled: Option<bool>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::domain::identity::Identity;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const ALL_VARS: &[&str] = &[
        "PAYGATE_TELEGRAM_BOT_TOKEN",
        "BOT_TOKEN",
        "PAYGATE_ADMIN_ID",
        "ADMIN_ID",
        "PAYGATE_OWNER_USERNAME",
        "OWNER_USERNAME",
        "PAYGATE_LOG_LEVEL",
        "PAYGATE_LOG_FORMAT",
        "TEST_PAYGATE_BOT_TOKEN",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn legacy_env_names_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("BOT_TOKEN", "123456:legacy-secret");
        env::set_var("ADMIN_ID", "6486714430");
        env::set_var("OWNER_USERNAME", "@owner");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.telegram.bot_token.expose_secret() == "123456:legacy-secret",
                "bot token should be read from BOT_TOKEN",
            )?;
            ensure(
                config.admin.identity == Some(Identity(6_486_714_430)),
                "admin identity should be read from ADMIN_ID",
            )?;
            ensure(config.admin.owner_handle == "@owner", "owner handle should be read")?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn owner_handle_defaults_when_unset() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("PAYGATE_TELEGRAM_BOT_TOKEN", "42:abc");
        env::set_var("PAYGATE_ADMIN_ID", "12345");
        env::set_var("PAYGATE_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.admin.owner_handle == "@dtxzahid", "default owner handle expected")?;
            ensure(matches!(config.logging.format, LogFormat::Json), "json format expected")?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn missing_admin_identity_is_fatal() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("BOT_TOKEN", "42:abc");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected validation failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::Validation(ref message) if message.contains("admin.identity")),
                "validation failure should mention admin.identity",
            )
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn non_numeric_admin_identity_is_fatal() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("BOT_TOKEN", "42:abc");
        env::set_var("ADMIN_ID", "admin");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "ADMIN_ID"),
                "error should name ADMIN_ID",
            )
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn missing_bot_token_is_fatal() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                admin_identity: Some(Identity(12_345)),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let error = match result {
            Ok(_) => return Err("expected validation failure".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(error, ConfigError::Validation(ref message) if message.contains("telegram.bot_token")),
            "validation failure should mention telegram.bot_token",
        )
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("TEST_PAYGATE_BOT_TOKEN", "777:from-interpolation");
        env::set_var("PAYGATE_OWNER_USERNAME", "@from_env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("paygate.toml");
            fs::write(
                &path,
                r#"
[telegram]
bot_token = "${TEST_PAYGATE_BOT_TOKEN}"

[admin]
identity = 1111111
owner_handle = "@from_file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.telegram.bot_token.expose_secret() == "777:from-interpolation",
                "file token should be interpolated from env",
            )?;
            ensure(config.admin.identity == Some(Identity(1_111_111)), "file admin id expected")?;
            ensure(config.admin.owner_handle == "@from_env", "env should win over file")?;
            ensure(config.logging.level == "debug", "override should win over file")?;
            Ok(())
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn malformed_bot_token_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                bot_token: Some("not-a-token".to_string()),
                admin_identity: Some(Identity(12_345)),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        ensure(
            matches!(result, Err(ConfigError::Validation(ref message)) if message.contains("<bot id>:<secret>")),
            "malformed token should be rejected",
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                bot_token: Some("4242:super-secret-value".to_string()),
                admin_identity: Some(Identity(12_345)),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        let debug = format!("{config:?}");
        ensure(!debug.contains("super-secret-value"), "debug output should not contain token")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }
}
