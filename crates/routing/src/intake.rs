use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use quill_core::domain::lead::{
    Lead, LeadActivity, LeadActivityKind, LeadId, LeadStatus, NewLead,
};
use quill_core::errors::ApplicationError;
use quill_db::repositories::{LeadActivityRepository, LeadRepository};

use crate::persistence;

/// Records submitted leads. Assignment is a separate, explicitly invoked
/// step, so intake keeps working when no sales staff exist.
pub struct LeadIntake {
    leads: Arc<dyn LeadRepository>,
    activity: Arc<dyn LeadActivityRepository>,
}

impl LeadIntake {
    pub fn new(leads: Arc<dyn LeadRepository>, activity: Arc<dyn LeadActivityRepository>) -> Self {
        Self { leads, activity }
    }

    /// Validate and persist one submission. Rejections surface before
    /// anything is written; a persistence failure propagates so the caller
    /// can tell the submitter instead of silently dropping the lead.
    pub async fn record_lead(&self, submission: NewLead) -> Result<Lead, ApplicationError> {
        submission.validate()?;

        let now = Utc::now();
        let lead = Lead {
            id: LeadId(Uuid::new_v4().to_string()),
            name: submission.name.trim().to_string(),
            email: submission.email.trim().to_string(),
            phone: submission.phone.trim().to_string(),
            service_type: submission.service_type,
            message: submission.message,
            referred_by_partner_id: submission.referred_by_partner_id,
            status: LeadStatus::New,
            assigned_to: None,
            created_at: now,
            updated_at: now,
        };

        self.leads.save(lead.clone()).await.map_err(persistence)?;

        let source = if lead.referred_by_partner_id.is_some() { "partner" } else { "website" };
        self.activity
            .append(LeadActivity::new(
                &lead.id,
                LeadActivityKind::Recorded,
                format!("lead recorded from {source} submission"),
                source,
            ))
            .await
            .map_err(persistence)?;

        info!(
            event_name = "lead.intake.recorded",
            lead_id = %lead.id.0,
            source,
            "lead recorded"
        );

        Ok(lead)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quill_core::domain::lead::{LeadActivityKind, LeadStatus, NewLead, PartnerId};
    use quill_core::errors::{ApplicationError, DomainError};
    use quill_db::repositories::{
        InMemoryLeadActivityRepository, InMemoryLeadRepository, LeadActivityRepository,
        LeadRepository,
    };

    use super::LeadIntake;

    fn submission() -> NewLead {
        NewLead {
            name: "Ava Lindqvist".to_string(),
            email: "ava@example.com".to_string(),
            phone: "+1-555-0131".to_string(),
            service_type: Some("manuscript-editing".to_string()),
            message: None,
            referred_by_partner_id: None,
        }
    }

    fn intake() -> (LeadIntake, Arc<InMemoryLeadRepository>, Arc<InMemoryLeadActivityRepository>) {
        let leads = Arc::new(InMemoryLeadRepository::default());
        let activity = Arc::new(InMemoryLeadActivityRepository::default());
        let intake = LeadIntake::new(
            Arc::clone(&leads) as Arc<dyn LeadRepository>,
            Arc::clone(&activity) as Arc<dyn LeadActivityRepository>,
        );
        (intake, leads, activity)
    }

    #[tokio::test]
    async fn recorded_lead_round_trips_as_new_and_unattributed() {
        let (intake, leads, activity) = intake();

        let lead = intake.record_lead(submission()).await.expect("record lead");

        let stored = leads.find_by_id(&lead.id).await.expect("find").expect("lead exists");
        assert_eq!(stored.status, LeadStatus::New);
        assert_eq!(stored.referred_by_partner_id, None);
        assert_eq!(stored.assigned_to, None);
        assert_eq!(stored.created_at, lead.created_at);

        let trail = activity.list_for_lead(&lead.id).await.expect("activity trail");
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].kind, LeadActivityKind::Recorded);
        assert_eq!(trail[0].actor, "website");
    }

    #[tokio::test]
    async fn partner_attribution_is_stored_verbatim() {
        let (intake, leads, _) = intake();

        let mut referred = submission();
        referred.referred_by_partner_id = Some(PartnerId("partner-uniprep".to_string()));

        let lead = intake.record_lead(referred).await.expect("record referred lead");

        let stored = leads.find_by_id(&lead.id).await.expect("find").expect("lead exists");
        assert_eq!(stored.referred_by_partner_id, Some(PartnerId("partner-uniprep".to_string())));
    }

    #[tokio::test]
    async fn invalid_submission_is_rejected_before_persistence() {
        let (intake, leads, _) = intake();

        let mut blank_name = submission();
        blank_name.name = "  ".to_string();

        let error = intake.record_lead(blank_name).await.expect_err("blank name should fail");
        assert!(matches!(error, ApplicationError::Domain(DomainError::Validation(_))));

        let all = leads.list(Default::default()).await.expect("list");
        assert!(all.is_empty(), "nothing should be persisted for a rejected submission");
    }

    #[tokio::test]
    async fn contact_fields_are_trimmed() {
        let (intake, _, _) = intake();

        let mut padded = submission();
        padded.name = "  Ava Lindqvist ".to_string();
        padded.email = " ava@example.com ".to_string();

        let lead = intake.record_lead(padded).await.expect("record lead");
        assert_eq!(lead.name, "Ava Lindqvist");
        assert_eq!(lead.email, "ava@example.com");
    }
}
