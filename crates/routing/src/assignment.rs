use std::sync::Arc;

use tracing::{info, warn};

use quill_core::domain::lead::{LeadActivity, LeadActivityKind, LeadId};
use quill_core::domain::staff::SalesTeamMember;
use quill_core::errors::ApplicationError;
use quill_core::rotation::AssignmentOutcome;
use quill_db::repositories::{AssignmentStore, LeadActivityRepository};

use crate::persistence;

/// Round-robin assignment over the rotation-eligible staff pool. The store
/// owns the atomicity of each advance; this service adds the activity trail
/// and telemetry.
pub struct AssignmentRotator {
    store: Arc<dyn AssignmentStore>,
    activity: Arc<dyn LeadActivityRepository>,
}

impl AssignmentRotator {
    pub fn new(store: Arc<dyn AssignmentStore>, activity: Arc<dyn LeadActivityRepository>) -> Self {
        Self { store, activity }
    }

    /// Next member in rotation, or `None` when nobody is eligible. Every
    /// successful call advances the shared pointer, so a blind retry can
    /// skip a member; prefer [`Self::assign_lead`] when the call is tied to
    /// a lead and may be retried.
    pub async fn assign_next(&self) -> Result<Option<SalesTeamMember>, ApplicationError> {
        let selected = self.store.assign_next().await.map_err(persistence)?;

        match &selected {
            Some(member) => info!(
                event_name = "lead.rotation.advanced",
                staff_id = %member.id.0,
                "rotation selected next assignee"
            ),
            None => warn!(
                event_name = "lead.rotation.empty_pool",
                "no rotation-eligible staff available"
            ),
        }

        Ok(selected)
    }

    /// Rotate and attach the assignee to `lead_id`. Idempotent per lead: a
    /// retry after a lost acknowledgment reports the recorded assignee
    /// without advancing the rotation again.
    pub async fn assign_lead(
        &self,
        lead_id: &LeadId,
    ) -> Result<AssignmentOutcome, ApplicationError> {
        let outcome = self.store.assign_lead(lead_id).await.map_err(persistence)?;

        match &outcome {
            AssignmentOutcome::Assigned { member, rotation_index } => {
                self.activity
                    .append(LeadActivity::new(
                        lead_id,
                        LeadActivityKind::Assigned,
                        format!("assigned to {} ({})", member.name, member.id.0),
                        "rotation",
                    ))
                    .await
                    .map_err(persistence)?;
                info!(
                    event_name = "lead.assignment.completed",
                    lead_id = %lead_id.0,
                    staff_id = %member.id.0,
                    rotation_index,
                    "lead assigned"
                );
            }
            AssignmentOutcome::AlreadyAssigned { assignee } => {
                info!(
                    event_name = "lead.assignment.replayed",
                    lead_id = %lead_id.0,
                    staff_id = %assignee.0,
                    "lead already assigned; rotation not advanced"
                );
            }
            AssignmentOutcome::NoEligibleAssignee => {
                warn!(
                    event_name = "lead.assignment.unassigned",
                    lead_id = %lead_id.0,
                    "no eligible assignee; lead left for manual assignment"
                );
            }
            AssignmentOutcome::LeadNotFound => {}
        }

        Ok(outcome)
    }
}
