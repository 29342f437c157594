//! Runtime tests for the operator commands, driven purely through `QUILL_*`
//! environment overrides so no config file is needed on disk.

use std::env;
use std::sync::{Mutex, OnceLock};

use quill_cli::commands::{doctor, migrate, seed, smoke, start};
use serde_json::Value;

const QUILL_ENV_KEYS: &[&str] = &[
    "QUILL_DATABASE_URL",
    "QUILL_DATABASE_MAX_CONNECTIONS",
    "QUILL_DATABASE_TIMEOUT_SECS",
    "QUILL_SERVER_BIND_ADDRESS",
    "QUILL_SERVER_PORT",
    "QUILL_SERVER_GRACEFUL_SHUTDOWN_SECS",
    "QUILL_INTAKE_PARTNER_TOKEN",
    "QUILL_LOGGING_LEVEL",
    "QUILL_LOGGING_FORMAT",
    "QUILL_LOG_LEVEL",
    "QUILL_LOG_FORMAT",
];

fn with_scoped_env(vars: &[(&str, &str)], test: impl FnOnce()) {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = LOCK.get_or_init(|| Mutex::new(())).lock().expect("env lock");

    let saved: Vec<(&str, Option<String>)> =
        QUILL_ENV_KEYS.iter().map(|key| (*key, env::var(key).ok())).collect();
    for key in QUILL_ENV_KEYS {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test();

    for (key, value) in saved {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}

fn memory_database() -> [(&'static str, &'static str); 2] {
    [("QUILL_DATABASE_URL", "sqlite::memory:"), ("QUILL_DATABASE_MAX_CONNECTIONS", "1")]
}

fn json_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

#[test]
fn start_preflight_passes_on_a_fresh_database() {
    with_scoped_env(&memory_database(), || {
        let result = start::run();
        assert_eq!(result.exit_code, 0, "preflight should pass: {}", result.output);

        let payload = json_payload(&result.output);
        assert_eq!(payload["command"], "start");
        assert_eq!(payload["status"], "ok");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("rotation-eligible staff"));
    });
}

#[test]
fn start_fails_with_config_exit_code_on_bad_database_url() {
    with_scoped_env(&[("QUILL_DATABASE_URL", "postgres://nope")], || {
        let result = start::run();
        assert_eq!(result.exit_code, 2);

        let payload = json_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn migrate_applies_cleanly_against_a_fresh_database() {
    with_scoped_env(&memory_database(), || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "migrate should pass: {}", result.output);

        let payload = json_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn seed_loads_and_verifies_the_demo_dataset() {
    with_scoped_env(&memory_database(), || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "seed should pass: {}", result.output);

        let payload = json_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("5 staff members"));
        assert!(message.contains("2 demo leads"));
    });
}

#[test]
fn seed_reports_the_same_outcome_when_repeated() {
    with_scoped_env(&memory_database(), || {
        let first = json_payload(&seed::run().output);
        let second = json_payload(&seed::run().output);

        assert_eq!(first["status"], "ok");
        assert_eq!(second["status"], "ok");
        assert_eq!(first["message"], second["message"]);
    });
}

#[test]
fn smoke_passes_every_check_on_a_fresh_database() {
    with_scoped_env(&memory_database(), || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 0, "smoke should pass: {}", result.output);

        // human summary line first, machine JSON report last
        let machine = result.output.lines().last().unwrap_or_default();
        let payload = json_payload(machine);
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "pass");
    });
}

#[test]
fn smoke_fails_and_skips_downstream_checks_on_bad_config() {
    with_scoped_env(&[("QUILL_DATABASE_URL", "postgres://nope")], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 6);

        let payload = json_payload(result.output.lines().last().unwrap_or_default());
        assert_eq!(payload["status"], "fail");

        let checks = payload["checks"].as_array().expect("checks array");
        assert!(checks.iter().any(|check| check["status"] == "skipped"));
    });
}

#[test]
fn doctor_emits_a_machine_readable_report() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("quill.db").display());

    with_scoped_env(
        &[("QUILL_DATABASE_URL", url.as_str()), ("QUILL_DATABASE_MAX_CONNECTIONS", "1")],
        || {
            assert_eq!(migrate::run().exit_code, 0, "migrate before doctor");

            let report: Value = serde_json::from_str(&doctor::run(true))
                .expect("doctor output should be valid JSON");

            assert_eq!(report["overall_status"], "pass");
            let checks = report["checks"].as_array().expect("checks array");
            assert!(checks.iter().any(|check| check["name"] == "rotation_pool_readiness"));
        },
    );
}
