use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use quill_core::domain::lead::{Lead, LeadActivity, LeadActivityKind, LeadId, LeadStatus};
use quill_core::errors::ApplicationError;
use quill_db::repositories::{LeadActivityRepository, LeadRepository};

use crate::persistence;

/// Staff-driven status transitions after intake and assignment.
pub struct LeadProgress {
    leads: Arc<dyn LeadRepository>,
    activity: Arc<dyn LeadActivityRepository>,
}

impl LeadProgress {
    pub fn new(leads: Arc<dyn LeadRepository>, activity: Arc<dyn LeadActivityRepository>) -> Self {
        Self { leads, activity }
    }

    pub async fn update_status(
        &self,
        lead_id: &LeadId,
        next: LeadStatus,
        actor: &str,
    ) -> Result<Lead, ApplicationError> {
        let Some(mut lead) = self.leads.find_by_id(lead_id).await.map_err(persistence)? else {
            return Err(ApplicationError::NotFound(format!("lead `{}` does not exist", lead_id.0)));
        };

        let from = lead.status;
        lead.transition_to(next)?;
        lead.updated_at = Utc::now();

        self.leads.save(lead.clone()).await.map_err(persistence)?;
        self.activity
            .append(LeadActivity::new(
                lead_id,
                LeadActivityKind::StatusChanged,
                format!("status changed from {} to {}", from.as_str(), next.as_str()),
                actor,
            ))
            .await
            .map_err(persistence)?;

        info!(
            event_name = "lead.status.updated",
            lead_id = %lead_id.0,
            from = from.as_str(),
            to = next.as_str(),
            actor,
            "lead status updated"
        );

        Ok(lead)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use quill_core::domain::lead::{Lead, LeadId, LeadStatus};
    use quill_core::domain::staff::StaffId;
    use quill_core::errors::{ApplicationError, DomainError};
    use quill_db::repositories::{
        InMemoryLeadActivityRepository, InMemoryLeadRepository, LeadActivityRepository,
        LeadRepository,
    };

    use super::LeadProgress;

    fn progress() -> (LeadProgress, Arc<InMemoryLeadRepository>, Arc<InMemoryLeadActivityRepository>)
    {
        let leads = Arc::new(InMemoryLeadRepository::default());
        let activity = Arc::new(InMemoryLeadActivityRepository::default());
        let progress = LeadProgress::new(
            Arc::clone(&leads) as Arc<dyn LeadRepository>,
            Arc::clone(&activity) as Arc<dyn LeadActivityRepository>,
        );
        (progress, leads, activity)
    }

    fn assigned_lead(id: &str) -> Lead {
        let now = Utc::now();
        Lead {
            id: LeadId(id.to_string()),
            name: "Ava Lindqvist".to_string(),
            email: "ava@example.com".to_string(),
            phone: "+1-555-0131".to_string(),
            service_type: None,
            message: None,
            referred_by_partner_id: None,
            status: LeadStatus::Assigned,
            assigned_to: Some(StaffId("s-a".to_string())),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn valid_transition_persists_and_logs() {
        let (progress, leads, activity) = progress();
        leads.save(assigned_lead("L-1")).await.expect("save lead");

        let lead_id = LeadId("L-1".to_string());
        let updated = progress
            .update_status(&lead_id, LeadStatus::InProgress, "staff-sales-001")
            .await
            .expect("update status");
        assert_eq!(updated.status, LeadStatus::InProgress);

        let stored = leads.find_by_id(&lead_id).await.expect("find").expect("lead exists");
        assert_eq!(stored.status, LeadStatus::InProgress);

        let trail = activity.list_for_lead(&lead_id).await.expect("trail");
        assert_eq!(trail.len(), 1);
        assert!(trail[0].detail.contains("assigned"));
        assert!(trail[0].detail.contains("in-progress"));
    }

    #[tokio::test]
    async fn invalid_transition_is_rejected() {
        let (progress, leads, _) = progress();
        leads.save(assigned_lead("L-1")).await.expect("save lead");

        let error = progress
            .update_status(&LeadId("L-1".to_string()), LeadStatus::Closed, "staff-sales-001")
            .await
            .expect_err("assigned -> closed should fail");

        assert!(matches!(
            error,
            ApplicationError::Domain(DomainError::InvalidLeadTransition { .. })
        ));

        let stored = leads
            .find_by_id(&LeadId("L-1".to_string()))
            .await
            .expect("find")
            .expect("lead exists");
        assert_eq!(stored.status, LeadStatus::Assigned, "rejected transition must not persist");
    }

    #[tokio::test]
    async fn missing_lead_reports_not_found() {
        let (progress, _, _) = progress();

        let error = progress
            .update_status(&LeadId("L-404".to_string()), LeadStatus::Lost, "staff-admin-001")
            .await
            .expect_err("missing lead should fail");

        assert!(matches!(error, ApplicationError::NotFound(_)));
    }
}
