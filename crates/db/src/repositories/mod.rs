use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use quill_core::domain::lead::{Lead, LeadActivity, LeadId, LeadStatus};
use quill_core::domain::staff::{SalesTeamMember, StaffId};
use quill_core::rotation::AssignmentOutcome;

pub mod activity;
pub mod assignment;
pub mod lead;
pub mod memory;
pub mod staff;

pub use activity::SqlLeadActivityRepository;
pub use assignment::SqlAssignmentStore;
pub use lead::SqlLeadRepository;
pub use memory::{
    InMemoryAssignmentStore, InMemoryLeadActivityRepository, InMemoryLeadRepository,
    InMemoryStaffRepository,
};
pub use staff::SqlStaffRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("rotation pointer contention: advance retries exhausted after {0} attempts")]
    Contention(u32),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub assigned_to: Option<StaffId>,
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError>;
    async fn save(&self, lead: Lead) -> Result<(), RepositoryError>;
    async fn list(&self, filter: LeadFilter) -> Result<Vec<Lead>, RepositoryError>;
}

#[async_trait]
pub trait StaffRepository: Send + Sync {
    async fn find_by_id(&self, id: &StaffId) -> Result<Option<SalesTeamMember>, RepositoryError>;
    async fn save(&self, member: SalesTeamMember) -> Result<(), RepositoryError>;

    /// Rotation-eligible members, freshly fetched and ordered by id. The
    /// ordering is the rotation order; it must be reproducible across calls.
    async fn rotation_pool(&self) -> Result<Vec<SalesTeamMember>, RepositoryError>;
}

/// The only writer of the rotation pointer. Implementations must make each
/// assignment an atomic read-compute-write: two concurrent calls never
/// advance from the same observed index.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn last_assigned_index(&self) -> Result<Option<i64>, RepositoryError>;

    /// Advance the rotation and return the selected member, or `None` when
    /// no staff is rotation-eligible. Every successful call moves the
    /// pointer; retries are not safe unless keyed per lead (`assign_lead`).
    async fn assign_next(&self) -> Result<Option<SalesTeamMember>, RepositoryError>;

    /// Rotate and claim `lead_id` in one atomic step. Idempotent per lead:
    /// an already-assigned lead reports its recorded assignee without
    /// advancing the rotation.
    async fn assign_lead(&self, lead_id: &LeadId) -> Result<AssignmentOutcome, RepositoryError>;
}

#[async_trait]
pub trait LeadActivityRepository: Send + Sync {
    async fn append(&self, activity: LeadActivity) -> Result<(), RepositoryError>;
    async fn list_for_lead(&self, lead_id: &LeadId) -> Result<Vec<LeadActivity>, RepositoryError>;
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}
