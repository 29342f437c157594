use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use quill_core::domain::staff::{SalesTeamMember, StaffId, StaffRole, ROTATION_ELIGIBLE_ROLES};

use super::{RepositoryError, StaffRepository};
use crate::DbPool;

pub struct SqlStaffRepository {
    pool: DbPool,
}

impl SqlStaffRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl StaffRepository for SqlStaffRepository {
    async fn find_by_id(&self, id: &StaffId) -> Result<Option<SalesTeamMember>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, email, role FROM staff WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(member_from_row).transpose()
    }

    async fn save(&self, member: SalesTeamMember) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO staff (id, name, email, role, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                role = excluded.role,
                updated_at = excluded.updated_at",
        )
        .bind(&member.id.0)
        .bind(&member.name)
        .bind(&member.email)
        .bind(member.role.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn rotation_pool(&self) -> Result<Vec<SalesTeamMember>, RepositoryError> {
        fetch_rotation_pool(&self.pool).await
    }
}

/// Shared by the staff repository and the assignment store so the pool read
/// inside an assignment transaction uses the exact same ordering.
pub(crate) async fn fetch_rotation_pool<'e, E>(
    executor: E,
) -> Result<Vec<SalesTeamMember>, RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let placeholders = vec!["?"; ROTATION_ELIGIBLE_ROLES.len()].join(", ");
    let sql = format!(
        "SELECT id, name, email, role FROM staff WHERE role IN ({placeholders}) ORDER BY id"
    );

    let mut query = sqlx::query(&sql);
    for role in ROTATION_ELIGIBLE_ROLES {
        query = query.bind(role.as_str());
    }

    let rows = query.fetch_all(executor).await?;
    rows.into_iter().map(member_from_row).collect()
}

fn member_from_row(row: SqliteRow) -> Result<SalesTeamMember, RepositoryError> {
    let role_raw = row.try_get::<String, _>("role")?;
    let role = StaffRole::parse(&role_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown staff role `{role_raw}`")))?;

    Ok(SalesTeamMember {
        id: StaffId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role,
    })
}
