use std::fmt::Display;
use std::time::Instant;

use quill_core::config::{AppConfig, LoadOptions};
use quill_db::repositories::{SqlStaffRepository, StaffRepository};
use quill_db::{connect_with_settings, migrations};
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

/// Accumulates check outcomes; once a check fails, the remaining ones are
/// recorded as skipped instead of being attempted against broken state.
#[derive(Default)]
struct Ledger {
    checks: Vec<SmokeCheck>,
}

impl Ledger {
    fn record<T, E: Display>(
        &mut self,
        name: &'static str,
        started: Instant,
        result: Result<T, E>,
        describe: impl FnOnce(&T) -> String,
    ) -> Option<T> {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(value) => {
                let message = describe(&value);
                self.checks.push(SmokeCheck { name, status: SmokeStatus::Pass, elapsed_ms, message });
                Some(value)
            }
            Err(error) => {
                self.checks.push(SmokeCheck {
                    name,
                    status: SmokeStatus::Fail,
                    elapsed_ms,
                    message: error.to_string(),
                });
                None
            }
        }
    }

    fn skip(&mut self, names: &[&'static str]) {
        for name in names {
            self.checks.push(SmokeCheck {
                name,
                status: SmokeStatus::Skipped,
                elapsed_ms: 0,
                message: "skipped after an earlier failure".to_string(),
            });
        }
    }

    fn finalize(self, total_elapsed_ms: u64) -> CommandResult {
        let passed = self.checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
        let failed = self.checks.iter().any(|check| check.status == SmokeStatus::Fail);
        let total = self.checks.len();

        let report = SmokeReport {
            command: "smoke",
            status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
            summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
            total_elapsed_ms,
            checks: self.checks,
        };

        let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
            format!(
                "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });

        CommandResult {
            exit_code: if failed { 6 } else { 0 },
            output: format!("{}\n{machine}", report.summary),
        }
    }
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut ledger = Ledger::default();

    let Some(config) = ledger.record(
        "config_validation",
        Instant::now(),
        AppConfig::load(LoadOptions::default()),
        |_| "configuration loaded and validated".to_string(),
    ) else {
        ledger.skip(&["db_connectivity", "migration_visibility", "rotation_pool_visibility"]);
        return ledger.finalize(started.elapsed().as_millis() as u64);
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            ledger.record::<(), String>(
                "db_connectivity",
                Instant::now(),
                Err(format!("failed to initialize async runtime: {error}")),
                |_| String::new(),
            );
            ledger.skip(&["migration_visibility", "rotation_pool_visibility"]);
            return ledger.finalize(started.elapsed().as_millis() as u64);
        }
    };

    runtime.block_on(async {
        let connect_started = Instant::now();
        let connected = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await;

        let Some(pool) = ledger.record("db_connectivity", connect_started, connected, |_| {
            format!("connected using `{}`", config.database.url)
        }) else {
            ledger.skip(&["migration_visibility", "rotation_pool_visibility"]);
            return;
        };

        let migration_started = Instant::now();
        ledger.record(
            "migration_visibility",
            migration_started,
            migrations::run_pending(&pool).await,
            |_| "migrations are visible and executable".to_string(),
        );

        let rotation_started = Instant::now();
        ledger.record(
            "rotation_pool_visibility",
            rotation_started,
            SqlStaffRepository::new(pool.clone()).rotation_pool().await,
            |members| format!("rotation pool readable ({} eligible staff)", members.len()),
        );

        pool.close().await;
    });

    ledger.finalize(started.elapsed().as_millis() as u64)
}
