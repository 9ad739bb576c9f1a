use std::env;
use std::sync::{Mutex, OnceLock};

use paygate_cli::commands::{config, doctor};
use serde_json::Value;

const VALID_ENV: &[(&str, &str)] =
    &[("PAYGATE_TELEGRAM_BOT_TOKEN", "123456:test-secret"), ("PAYGATE_ADMIN_ID", "1000001")];

#[test]
fn config_renders_sources_and_redacts_token() {
    with_env(VALID_ENV, || {
        let result = config::run();
        assert_eq!(result.exit_code, 0);

        assert!(result.output.contains(
            "- telegram.bot_token = 123456:*** (source: env (PAYGATE_TELEGRAM_BOT_TOKEN))"
        ));
        assert!(result.output.contains("- admin.identity = 1000001 (source: env (PAYGATE_ADMIN_ID))"));
        assert!(result.output.contains("- admin.owner_handle = @dtxzahid (source: default)"));
        assert!(!result.output.contains("test-secret"));
    });
}

#[test]
fn config_attributes_legacy_aliases() {
    with_env(
        &[("BOT_TOKEN", "654321:legacy"), ("ADMIN_ID", "42424"), ("OWNER_USERNAME", "@boss")],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);

            assert!(result.output.contains("(source: env (BOT_TOKEN))"));
            assert!(result.output.contains("- admin.identity = 42424 (source: env (ADMIN_ID))"));
            assert!(result.output.contains("- admin.owner_handle = @boss (source: env (OWNER_USERNAME))"));
        },
    );
}

#[test]
fn config_reports_validation_failure_without_admin() {
    with_env(&[("PAYGATE_TELEGRAM_BOT_TOKEN", "123456:test-secret")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or("").contains("admin.identity"));
    });
}

#[test]
fn doctor_offline_passes_with_valid_env() {
    with_env(VALID_ENV, || {
        let result = doctor::run(true, true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let checks = payload["checks"].as_array().expect("checks array");
        assert_eq!(checks.len(), 3);
        assert_eq!(checks[1]["name"], "admin_identity");
        assert_eq!(checks[2]["status"], "skipped");
    });
}

#[test]
fn doctor_fails_and_skips_dependent_checks_without_token() {
    with_env(&[], || {
        let result = doctor::run(false, true);
        assert_eq!(result.exit_code, 1);

        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] config_validation: "));
        assert!(result.output.contains("- [skip] admin_identity: "));
        assert!(result.output.contains("- [skip] telegram_api: "));
    });
}

#[test]
fn doctor_rejects_non_numeric_admin_id() {
    with_env(&[("PAYGATE_TELEGRAM_BOT_TOKEN", "123456:test-secret"), ("ADMIN_ID", "boss")], || {
        let result = doctor::run(true, true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert!(payload["checks"][0]["details"].as_str().unwrap_or("").contains("ADMIN_ID"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid json")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PAYGATE_TELEGRAM_BOT_TOKEN",
        "BOT_TOKEN",
        "PAYGATE_ADMIN_ID",
        "ADMIN_ID",
        "PAYGATE_OWNER_USERNAME",
        "OWNER_USERNAME",
        "PAYGATE_POLLING_TIMEOUT_SECS",
        "PAYGATE_POLLING_MAX_RETRIES",
        "PAYGATE_SERVER_BIND_ADDRESS",
        "PAYGATE_SERVER_HEALTH_CHECK_PORT",
        "PAYGATE_SERVER_HEALTH_ENABLED",
        "PAYGATE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "PAYGATE_LOGGING_LEVEL",
        "PAYGATE_LOGGING_FORMAT",
        "PAYGATE_LOG_LEVEL",
        "PAYGATE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
