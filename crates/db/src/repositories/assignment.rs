use chrono::Utc;
use sqlx::{Row, Sqlite, Transaction};

use quill_core::domain::lead::{LeadId, LeadStatus};
use quill_core::domain::staff::{SalesTeamMember, StaffId};
use quill_core::rotation::{self, AssignmentOutcome, RotationState};

use super::staff::fetch_rotation_pool;
use super::{parse_timestamp, AssignmentStore, RepositoryError};
use crate::DbPool;

/// Rotation pointer store backed by the `rotation_state` single-row table.
///
/// Every assignment runs as one immediate transaction: pool read, index
/// read, and index write all see the same snapshot, and SQLite serializes
/// the writers. The index write is additionally a compare-and-swap on the
/// observed value, so a lost race retries the whole round instead of
/// advancing from a stale index.
pub struct SqlAssignmentStore {
    pool: DbPool,
}

const MAX_ADVANCE_ATTEMPTS: u32 = 8;

impl SqlAssignmentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AssignmentStore for SqlAssignmentStore {
    async fn last_assigned_index(&self) -> Result<Option<i64>, RepositoryError> {
        read_last_index(&self.pool).await
    }

    async fn assign_next(&self) -> Result<Option<SalesTeamMember>, RepositoryError> {
        for _ in 0..MAX_ADVANCE_ATTEMPTS {
            let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

            let members = fetch_rotation_pool(&mut *tx).await?;
            let last = read_last_index(&mut *tx).await?;
            let Some(next) = rotation::next_index(last, members.len()) else {
                tx.rollback().await?;
                return Ok(None);
            };

            if try_advance(&mut tx, last, next as i64).await? {
                tx.commit().await?;
                return Ok(Some(members[next].clone()));
            }

            tx.rollback().await?;
        }

        Err(RepositoryError::Contention(MAX_ADVANCE_ATTEMPTS))
    }

    async fn assign_lead(&self, lead_id: &LeadId) -> Result<AssignmentOutcome, RepositoryError> {
        for _ in 0..MAX_ADVANCE_ATTEMPTS {
            let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

            let current = sqlx::query("SELECT assigned_to FROM lead WHERE id = ?")
                .bind(&lead_id.0)
                .fetch_optional(&mut *tx)
                .await?;
            let Some(row) = current else {
                tx.rollback().await?;
                return Ok(AssignmentOutcome::LeadNotFound);
            };
            if let Some(assignee) = row.try_get::<Option<String>, _>("assigned_to")? {
                tx.rollback().await?;
                return Ok(AssignmentOutcome::AlreadyAssigned { assignee: StaffId(assignee) });
            }

            let members = fetch_rotation_pool(&mut *tx).await?;
            let last = read_last_index(&mut *tx).await?;
            let Some(next) = rotation::next_index(last, members.len()) else {
                tx.rollback().await?;
                return Ok(AssignmentOutcome::NoEligibleAssignee);
            };

            if !try_advance(&mut tx, last, next as i64).await? {
                tx.rollback().await?;
                continue;
            }

            let member = members[next].clone();
            let claimed = sqlx::query(
                "UPDATE lead SET assigned_to = ?, status = ?, updated_at = ?
                 WHERE id = ? AND assigned_to IS NULL",
            )
            .bind(&member.id.0)
            .bind(LeadStatus::Assigned.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(&lead_id.0)
            .execute(&mut *tx)
            .await?;

            if claimed.rows_affected() != 1 {
                tx.rollback().await?;
                continue;
            }

            tx.commit().await?;
            return Ok(AssignmentOutcome::Assigned { member, rotation_index: next as i64 });
        }

        Err(RepositoryError::Contention(MAX_ADVANCE_ATTEMPTS))
    }
}

async fn read_state<'e, E>(executor: E) -> Result<Option<RotationState>, RepositoryError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row =
        sqlx::query("SELECT last_assigned_index, updated_at FROM rotation_state WHERE id = 0")
            .fetch_optional(executor)
            .await?;

    row.map(|row| {
        Ok(RotationState {
            last_assigned_index: row.try_get("last_assigned_index")?,
            updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
        })
    })
    .transpose()
}

async fn read_last_index<'e, E>(executor: E) -> Result<Option<i64>, RepositoryError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    Ok(read_state(executor).await?.map(|state| state.last_assigned_index))
}

/// Compare-and-swap the rotation pointer. Returns `false` when the observed
/// value no longer matches, which sends the caller back around the loop.
async fn try_advance(
    tx: &mut Transaction<'_, Sqlite>,
    observed: Option<i64>,
    next: i64,
) -> Result<bool, RepositoryError> {
    let now = Utc::now().to_rfc3339();

    let result = match observed {
        Some(last) => {
            sqlx::query(
                "UPDATE rotation_state SET last_assigned_index = ?, updated_at = ?
                 WHERE id = 0 AND last_assigned_index = ?",
            )
            .bind(next)
            .bind(&now)
            .bind(last)
            .execute(&mut **tx)
            .await?
        }
        None => {
            sqlx::query(
                "INSERT INTO rotation_state (id, last_assigned_index, updated_at)
                 VALUES (0, ?, ?)
                 ON CONFLICT(id) DO NOTHING",
            )
            .bind(next)
            .bind(&now)
            .execute(&mut **tx)
            .await?
        }
    };

    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use tempfile::TempDir;

    use quill_core::domain::lead::{Lead, LeadId, LeadStatus};
    use quill_core::domain::staff::{SalesTeamMember, StaffId, StaffRole};
    use quill_core::rotation::AssignmentOutcome;

    use super::SqlAssignmentStore;
    use crate::repositories::{
        AssignmentStore, LeadRepository, SqlLeadRepository, SqlStaffRepository, StaffRepository,
    };
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool(dir: &TempDir, max_connections: u32) -> DbPool {
        let path = dir.path().join("quill.db");
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool =
            connect_with_settings(&url, max_connections, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    async fn seed_sales_team(pool: &DbPool, count: usize) {
        let staff = SqlStaffRepository::new(pool.clone());
        for index in 0..count {
            staff
                .save(SalesTeamMember {
                    id: StaffId(format!("staff-{index:02}")),
                    name: format!("Member {index:02}"),
                    email: format!("member{index:02}@quill.example"),
                    role: StaffRole::SalesTeam,
                })
                .await
                .expect("seed staff member");
        }
    }

    async fn seed_new_lead(pool: &DbPool, id: &str) {
        let leads = SqlLeadRepository::new(pool.clone());
        let now = chrono::Utc::now();
        leads
            .save(Lead {
                id: LeadId(id.to_string()),
                name: "Ava Lindqvist".to_string(),
                email: "ava@example.com".to_string(),
                phone: "+1-555-0131".to_string(),
                service_type: None,
                message: None,
                referred_by_partner_id: None,
                status: LeadStatus::New,
                assigned_to: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("seed lead");
    }

    #[tokio::test]
    async fn rotation_is_fair_over_a_stable_pool() {
        let dir = TempDir::new().expect("temp dir");
        let pool = setup_pool(&dir, 1).await;
        seed_sales_team(&pool, 3).await;

        let store = SqlAssignmentStore::new(pool.clone());

        let mut assigned = Vec::new();
        for _ in 0..3 {
            let member = store.assign_next().await.expect("assign next").expect("member");
            assigned.push(member.id.0);
        }

        assert_eq!(assigned, vec!["staff-00", "staff-01", "staff-02"]);

        pool.close().await;
    }

    #[tokio::test]
    async fn rotation_wraps_after_the_last_member() {
        let dir = TempDir::new().expect("temp dir");
        let pool = setup_pool(&dir, 1).await;
        seed_sales_team(&pool, 2).await;

        let store = SqlAssignmentStore::new(pool.clone());

        for _ in 0..2 {
            store.assign_next().await.expect("assign next").expect("member");
        }
        let wrapped = store.assign_next().await.expect("assign next").expect("member");

        assert_eq!(wrapped.id.0, "staff-00");
        assert_eq!(store.last_assigned_index().await.expect("read index"), Some(0));

        pool.close().await;
    }

    #[tokio::test]
    async fn empty_pool_assigns_nobody_and_leaves_state_untouched() {
        let dir = TempDir::new().expect("temp dir");
        let pool = setup_pool(&dir, 1).await;

        let store = SqlAssignmentStore::new(pool.clone());

        assert_eq!(store.assign_next().await.expect("assign next"), None);
        assert_eq!(store.last_assigned_index().await.expect("read index"), None);

        pool.close().await;
    }

    #[tokio::test]
    async fn rotation_survives_reconnection() {
        let dir = TempDir::new().expect("temp dir");

        let pool = setup_pool(&dir, 1).await;
        seed_sales_team(&pool, 3).await;
        let store = SqlAssignmentStore::new(pool.clone());
        store.assign_next().await.expect("assign").expect("member");
        store.assign_next().await.expect("assign").expect("member");
        pool.close().await;

        // fresh pool over the same database file stands in for a restart
        let reopened = setup_pool(&dir, 1).await;
        let store = SqlAssignmentStore::new(reopened.clone());

        assert_eq!(store.last_assigned_index().await.expect("read index"), Some(1));
        let resumed = store.assign_next().await.expect("assign").expect("member");
        assert_eq!(resumed.id.0, "staff-02", "rotation should continue, not restart");

        reopened.close().await;
    }

    #[tokio::test]
    async fn shrunken_pool_still_yields_a_valid_member() {
        let dir = TempDir::new().expect("temp dir");
        let pool = setup_pool(&dir, 1).await;
        seed_sales_team(&pool, 3).await;

        let store = SqlAssignmentStore::new(pool.clone());
        for _ in 0..3 {
            store.assign_next().await.expect("assign").expect("member");
        }

        // drop a member at a different index than the last-assigned one
        sqlx::query("DELETE FROM staff WHERE id = 'staff-00'")
            .execute(&pool)
            .await
            .expect("remove member");

        let member = store.assign_next().await.expect("assign after shrink").expect("member");
        assert!(["staff-01", "staff-02"].contains(&member.id.0.as_str()));

        pool.close().await;
    }

    #[tokio::test]
    async fn concurrent_assignments_never_share_an_index() {
        let dir = TempDir::new().expect("temp dir");
        let pool = setup_pool(&dir, 4).await;
        seed_sales_team(&pool, 5).await;

        let store = Arc::new(SqlAssignmentStore::new(pool.clone()));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.assign_next().await.expect("assign next").expect("member")
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            let member = handle.await.expect("join task");
            assert!(seen.insert(member.id.0.clone()), "member {} assigned twice", member.id.0);
        }

        assert_eq!(seen.len(), 5);
        assert_eq!(
            store.last_assigned_index().await.expect("read index"),
            Some(4),
            "five assignments should advance the index by exactly five",
        );

        pool.close().await;
    }

    #[tokio::test]
    async fn assign_lead_is_idempotent_per_lead() {
        let dir = TempDir::new().expect("temp dir");
        let pool = setup_pool(&dir, 1).await;
        seed_sales_team(&pool, 3).await;
        seed_new_lead(&pool, "lead-idem-001").await;

        let store = SqlAssignmentStore::new(pool.clone());
        let lead_id = LeadId("lead-idem-001".to_string());

        let first = store.assign_lead(&lead_id).await.expect("first assignment");
        let AssignmentOutcome::Assigned { member, rotation_index } = first else {
            panic!("expected assignment, got {first:?}");
        };
        assert_eq!(rotation_index, 0);

        let retry = store.assign_lead(&lead_id).await.expect("retried assignment");
        assert_eq!(retry, AssignmentOutcome::AlreadyAssigned { assignee: member.id.clone() });

        assert_eq!(
            store.last_assigned_index().await.expect("read index"),
            Some(0),
            "retry must not advance the rotation",
        );

        let leads = SqlLeadRepository::new(pool.clone());
        let stored = leads.find_by_id(&lead_id).await.expect("find lead").expect("lead exists");
        assert_eq!(stored.status, LeadStatus::Assigned);
        assert_eq!(stored.assigned_to, Some(member.id));

        pool.close().await;
    }

    #[tokio::test]
    async fn assign_lead_with_empty_pool_leaves_lead_new() {
        let dir = TempDir::new().expect("temp dir");
        let pool = setup_pool(&dir, 1).await;
        seed_new_lead(&pool, "lead-empty-001").await;

        let store = SqlAssignmentStore::new(pool.clone());
        let lead_id = LeadId("lead-empty-001".to_string());

        let outcome = store.assign_lead(&lead_id).await.expect("assignment attempt");
        assert_eq!(outcome, AssignmentOutcome::NoEligibleAssignee);

        let leads = SqlLeadRepository::new(pool.clone());
        let stored = leads.find_by_id(&lead_id).await.expect("find lead").expect("lead exists");
        assert_eq!(stored.status, LeadStatus::New);
        assert_eq!(stored.assigned_to, None);
        assert_eq!(store.last_assigned_index().await.expect("read index"), None);

        pool.close().await;
    }

    #[tokio::test]
    async fn assign_lead_reports_missing_lead() {
        let dir = TempDir::new().expect("temp dir");
        let pool = setup_pool(&dir, 1).await;
        seed_sales_team(&pool, 1).await;

        let store = SqlAssignmentStore::new(pool.clone());
        let outcome = store
            .assign_lead(&LeadId("lead-missing".to_string()))
            .await
            .expect("assignment attempt");

        assert_eq!(outcome, AssignmentOutcome::LeadNotFound);
        assert_eq!(store.last_assigned_index().await.expect("read index"), None);

        pool.close().await;
    }
}
