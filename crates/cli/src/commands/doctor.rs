use quill_core::config::{AppConfig, LoadOptions};
use quill_db::connect_with_settings;
use quill_db::repositories::{SqlStaffRepository, StaffRepository};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped: {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        })
    } else {
        render_human(&report)
    }
}

fn build_report() -> DoctorReport {
    let checks = run_checks();

    let healthy = checks.iter().all(|check| check.status == CheckStatus::Pass);
    DoctorReport {
        overall_status: if healthy { CheckStatus::Pass } else { CheckStatus::Fail },
        summary: if healthy {
            "doctor: all readiness checks passed".to_string()
        } else {
            "doctor: one or more readiness checks failed".to_string()
        },
        checks,
    }
}

fn run_checks() -> Vec<DoctorCheck> {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            let reason = "configuration did not load";
            return vec![
                DoctorCheck::fail("config_validation", error.to_string()),
                DoctorCheck::skipped("database_connectivity", reason),
                DoctorCheck::skipped("rotation_pool_readiness", reason),
            ];
        }
    };

    let mut checks =
        vec![DoctorCheck::pass("config_validation", "configuration loaded and validated")];

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(DoctorCheck::fail(
                "database_connectivity",
                format!("failed to initialize async runtime: {error}"),
            ));
            checks.push(DoctorCheck::skipped("rotation_pool_readiness", "no async runtime"));
            return checks;
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                checks.push(DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to connect to database: {error}"),
                ));
                checks
                    .push(DoctorCheck::skipped("rotation_pool_readiness", "database unreachable"));
                return;
            }
        };

        checks.push(DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        ));
        checks.push(rotation_pool_check(&pool).await);

        pool.close().await;
    });

    checks
}

async fn rotation_pool_check(pool: &quill_db::DbPool) -> DoctorCheck {
    match SqlStaffRepository::new(pool.clone()).rotation_pool().await {
        Ok(members) if members.is_empty() => DoctorCheck::pass(
            "rotation_pool_readiness",
            "no rotation-eligible staff yet; new leads will queue for manual assignment",
        ),
        Ok(members) => DoctorCheck::pass(
            "rotation_pool_readiness",
            format!("{} rotation-eligible staff on file", members.len()),
        ),
        Err(error) => DoctorCheck::fail(
            "rotation_pool_readiness",
            format!("could not read the staff roster (run `quill migrate`?): {error}"),
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];
    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("  [{marker}] {}: {}", check.name, check.details));
    }
    lines.join("\n")
}
