use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use quill_core::domain::lead::{Lead, LeadActivity, LeadId, LeadStatus};
use quill_core::domain::staff::{SalesTeamMember, StaffId};
use quill_core::rotation::{self, AssignmentOutcome};

use super::{
    AssignmentStore, LeadActivityRepository, LeadFilter, LeadRepository, RepositoryError,
    StaffRepository,
};

#[derive(Default)]
pub struct InMemoryLeadRepository {
    leads: RwLock<HashMap<String, Lead>>,
}

#[async_trait::async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let leads = self.leads.read().await;
        Ok(leads.get(&id.0).cloned())
    }

    async fn save(&self, lead: Lead) -> Result<(), RepositoryError> {
        let mut leads = self.leads.write().await;
        leads.insert(lead.id.0.clone(), lead);
        Ok(())
    }

    async fn list(&self, filter: LeadFilter) -> Result<Vec<Lead>, RepositoryError> {
        let leads = self.leads.read().await;
        let mut matching: Vec<Lead> = leads
            .values()
            .filter(|lead| filter.status.map_or(true, |status| lead.status == status))
            .filter(|lead| {
                filter
                    .assigned_to
                    .as_ref()
                    .map_or(true, |assignee| lead.assigned_to.as_ref() == Some(assignee))
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.0.cmp(&a.id.0)));
        Ok(matching)
    }
}

// BTreeMap keeps members in id order, matching the SQL rotation ordering.
#[derive(Default)]
pub struct InMemoryStaffRepository {
    members: RwLock<BTreeMap<String, SalesTeamMember>>,
}

#[async_trait::async_trait]
impl StaffRepository for InMemoryStaffRepository {
    async fn find_by_id(&self, id: &StaffId) -> Result<Option<SalesTeamMember>, RepositoryError> {
        let members = self.members.read().await;
        Ok(members.get(&id.0).cloned())
    }

    async fn save(&self, member: SalesTeamMember) -> Result<(), RepositoryError> {
        let mut members = self.members.write().await;
        members.insert(member.id.0.clone(), member);
        Ok(())
    }

    async fn rotation_pool(&self) -> Result<Vec<SalesTeamMember>, RepositoryError> {
        let members = self.members.read().await;
        Ok(members.values().filter(|member| member.role.is_rotation_eligible()).cloned().collect())
    }
}

/// In-memory stand-in for the SQL assignment store. A single mutex over the
/// rotation pointer plays the role of the database transaction: the pool
/// read, the index read, and the index write happen under one lock.
pub struct InMemoryAssignmentStore {
    staff: Arc<InMemoryStaffRepository>,
    leads: Arc<InMemoryLeadRepository>,
    last_assigned_index: Mutex<Option<i64>>,
}

impl InMemoryAssignmentStore {
    pub fn new(staff: Arc<InMemoryStaffRepository>, leads: Arc<InMemoryLeadRepository>) -> Self {
        Self { staff, leads, last_assigned_index: Mutex::new(None) }
    }
}

#[async_trait::async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn last_assigned_index(&self) -> Result<Option<i64>, RepositoryError> {
        Ok(*self.last_assigned_index.lock().await)
    }

    async fn assign_next(&self) -> Result<Option<SalesTeamMember>, RepositoryError> {
        let mut state = self.last_assigned_index.lock().await;

        let members = self.staff.rotation_pool().await?;
        let Some(next) = rotation::next_index(*state, members.len()) else {
            return Ok(None);
        };

        *state = Some(next as i64);
        Ok(Some(members[next].clone()))
    }

    async fn assign_lead(&self, lead_id: &LeadId) -> Result<AssignmentOutcome, RepositoryError> {
        let mut state = self.last_assigned_index.lock().await;
        let mut leads = self.leads.leads.write().await;

        let Some(lead) = leads.get_mut(&lead_id.0) else {
            return Ok(AssignmentOutcome::LeadNotFound);
        };
        if let Some(assignee) = &lead.assigned_to {
            return Ok(AssignmentOutcome::AlreadyAssigned { assignee: assignee.clone() });
        }

        let members = self.staff.rotation_pool().await?;
        let Some(next) = rotation::next_index(*state, members.len()) else {
            return Ok(AssignmentOutcome::NoEligibleAssignee);
        };

        let member = members[next].clone();
        lead.assigned_to = Some(member.id.clone());
        lead.status = LeadStatus::Assigned;
        lead.updated_at = Utc::now();
        *state = Some(next as i64);

        Ok(AssignmentOutcome::Assigned { member, rotation_index: next as i64 })
    }
}

#[derive(Default)]
pub struct InMemoryLeadActivityRepository {
    entries: RwLock<Vec<LeadActivity>>,
}

#[async_trait::async_trait]
impl LeadActivityRepository for InMemoryLeadActivityRepository {
    async fn append(&self, activity: LeadActivity) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        entries.push(activity);
        Ok(())
    }

    async fn list_for_lead(&self, lead_id: &LeadId) -> Result<Vec<LeadActivity>, RepositoryError> {
        let entries = self.entries.read().await;
        let mut trail: Vec<LeadActivity> =
            entries.iter().filter(|entry| &entry.lead_id == lead_id).cloned().collect();
        trail.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
        Ok(trail)
    }
}
