use sqlx::{sqlite::SqliteRow, QueryBuilder, Row};

use quill_core::domain::lead::{Lead, LeadId, LeadStatus, PartnerId};
use quill_core::domain::staff::StaffId;

use super::{parse_timestamp, LeadFilter, LeadRepository, RepositoryError};
use crate::DbPool;

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const LEAD_COLUMNS: &str = "id, name, email, phone, service_type, message, \
     referred_by_partner_id, status, assigned_to, created_at, updated_at";

#[async_trait::async_trait]
impl LeadRepository for SqlLeadRepository {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {LEAD_COLUMNS} FROM lead WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(lead_from_row).transpose()
    }

    async fn save(&self, lead: Lead) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO lead (
                id,
                name,
                email,
                phone,
                service_type,
                message,
                referred_by_partner_id,
                status,
                assigned_to,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                phone = excluded.phone,
                service_type = excluded.service_type,
                message = excluded.message,
                referred_by_partner_id = excluded.referred_by_partner_id,
                status = excluded.status,
                assigned_to = excluded.assigned_to,
                updated_at = excluded.updated_at",
        )
        .bind(&lead.id.0)
        .bind(&lead.name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(lead.service_type.as_deref())
        .bind(lead.message.as_deref())
        .bind(lead.referred_by_partner_id.as_ref().map(|partner| partner.0.as_str()))
        .bind(lead.status.as_str())
        .bind(lead.assigned_to.as_ref().map(|staff| staff.0.as_str()))
        .bind(lead.created_at.to_rfc3339())
        .bind(lead.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, filter: LeadFilter) -> Result<Vec<Lead>, RepositoryError> {
        let mut builder = QueryBuilder::new(format!("SELECT {LEAD_COLUMNS} FROM lead"));
        let mut has_clause = false;

        if let Some(status) = filter.status {
            builder.push(" WHERE status = ").push_bind(status.as_str());
            has_clause = true;
        }
        if let Some(assignee) = filter.assigned_to {
            builder.push(if has_clause { " AND assigned_to = " } else { " WHERE assigned_to = " });
            builder.push_bind(assignee.0);
        }

        builder.push(" ORDER BY created_at DESC, id DESC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(lead_from_row).collect()
    }
}

fn lead_from_row(row: SqliteRow) -> Result<Lead, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = LeadStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown lead status `{status_raw}`")))?;

    Ok(Lead {
        id: LeadId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        service_type: row.try_get("service_type")?,
        message: row.try_get("message")?,
        referred_by_partner_id: row
            .try_get::<Option<String>, _>("referred_by_partner_id")?
            .map(PartnerId),
        status,
        assigned_to: row.try_get::<Option<String>, _>("assigned_to")?.map(StaffId),
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
