use sqlx::Executor;

use quill_core::domain::staff::ROTATION_ELIGIBLE_ROLES;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_STAFF_IDS: &[&str] = &[
    "staff-admin-001",
    "staff-sales-001",
    "staff-sales-002",
    "staff-sales-003",
    "staff-writer-001",
];

const SEED_LEAD_IDS: &[&str] = &["lead-demo-001", "lead-demo-002"];

const SEED_ACTIVITY_IDS: &[&str] = &["act-demo-001", "act-demo-002"];

const SEED_ROTATION_ELIGIBLE_COUNT: i64 = 3;

/// Deterministic demo roster and sample leads for local development and
/// smoke validation.
pub struct SeedDataset;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub staff_seeded: usize,
    pub leads_seeded: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

impl SeedDataset {
    /// SQL fixture content; `INSERT OR IGNORE` keeps reseeding idempotent.
    pub const SQL: &str = include_str!("../../../config/fixtures/seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult { staff_seeded: SEED_STAFF_IDS.len(), leads_seeded: SEED_LEAD_IDS.len() })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let staff_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM staff WHERE id IN {}",
            sql_array_from_ids(SEED_STAFF_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("staff-roster", staff_count == SEED_STAFF_IDS.len() as i64));

        let eligible_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM staff WHERE role IN {}",
            sql_array_from_ids(&ROTATION_ELIGIBLE_ROLES.map(|role| role.as_str()))
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("rotation-pool", eligible_count >= SEED_ROTATION_ELIGIBLE_COUNT));

        let lead_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM lead WHERE id IN {} AND status = 'new'",
            sql_array_from_ids(SEED_LEAD_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("demo-leads", lead_count == SEED_LEAD_IDS.len() as i64));

        let partner_lead: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM lead WHERE id = 'lead-demo-002'
                 AND referred_by_partner_id = 'partner-uniprep')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("partner-attribution", partner_lead == 1));

        let activity_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM lead_activity WHERE id IN {}",
            sql_array_from_ids(SEED_ACTIVITY_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("intake-activity", activity_count == SEED_ACTIVITY_IDS.len() as i64));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| format!("'{id}'")).collect();
    format!("({})", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::SeedDataset;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool(dir: &TempDir) -> DbPool {
        let path = dir.path().join("quill.db");
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = connect_with_settings(&url, 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    #[tokio::test]
    async fn seed_loads_and_verifies() {
        let dir = TempDir::new().expect("temp dir");
        let pool = setup_pool(&dir).await;

        let result = SeedDataset::load(&pool).await.expect("load seed");
        assert_eq!(result.staff_seeded, 5);
        assert_eq!(result.leads_seeded, 2);

        let verification = SeedDataset::verify(&pool).await.expect("verify seed");
        assert!(verification.all_present, "failed checks: {:?}", verification.checks);

        pool.close().await;
    }

    #[tokio::test]
    async fn reseeding_is_idempotent() {
        let dir = TempDir::new().expect("temp dir");
        let pool = setup_pool(&dir).await;

        SeedDataset::load(&pool).await.expect("first seed");
        SeedDataset::load(&pool).await.expect("second seed");

        let staff_count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM staff").fetch_one(&pool).await.expect("count");
        assert_eq!(staff_count, 5);

        pool.close().await;
    }
}
