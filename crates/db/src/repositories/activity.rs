use sqlx::{sqlite::SqliteRow, Row};

use quill_core::domain::lead::{LeadActivity, LeadActivityKind, LeadId};

use super::{parse_timestamp, LeadActivityRepository, RepositoryError};
use crate::DbPool;

pub struct SqlLeadActivityRepository {
    pool: DbPool,
}

impl SqlLeadActivityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LeadActivityRepository for SqlLeadActivityRepository {
    async fn append(&self, activity: LeadActivity) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO lead_activity (id, lead_id, kind, detail, actor, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&activity.id)
        .bind(&activity.lead_id.0)
        .bind(activity.kind.as_str())
        .bind(&activity.detail)
        .bind(&activity.actor)
        .bind(activity.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_lead(&self, lead_id: &LeadId) -> Result<Vec<LeadActivity>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, lead_id, kind, detail, actor, occurred_at
             FROM lead_activity
             WHERE lead_id = ?
             ORDER BY occurred_at ASC, id ASC",
        )
        .bind(&lead_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(activity_from_row).collect()
    }
}

fn activity_from_row(row: SqliteRow) -> Result<LeadActivity, RepositoryError> {
    let kind_raw = row.try_get::<String, _>("kind")?;
    let kind = LeadActivityKind::parse(&kind_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown activity kind `{kind_raw}`")))?;

    Ok(LeadActivity {
        id: row.try_get("id")?,
        lead_id: LeadId(row.try_get("lead_id")?),
        kind,
        detail: row.try_get("detail")?,
        actor: row.try_get("actor")?,
        occurred_at: parse_timestamp("occurred_at", row.try_get("occurred_at")?)?,
    })
}
