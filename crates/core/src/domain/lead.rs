use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::staff::StaffId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartnerId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeadStatus {
    New,
    Assigned,
    InProgress,
    Closed,
    Lost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Assigned => "assigned",
            Self::InProgress => "in-progress",
            Self::Closed => "closed",
            Self::Lost => "lost",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::New),
            "assigned" => Some(Self::Assigned),
            "in-progress" => Some(Self::InProgress),
            "closed" => Some(Self::Closed),
            "lost" => Some(Self::Lost),
            _ => None,
        }
    }
}

/// A prospective-client contact record. `referred_by_partner_id` is `None`
/// for organic website submissions. Leads are never deleted; `Lost` and
/// `Closed` are terminal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service_type: Option<String>,
    pub message: Option<String>,
    pub referred_by_partner_id: Option<PartnerId>,
    pub status: LeadStatus,
    pub assigned_to: Option<StaffId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn can_transition_to(&self, next: LeadStatus) -> bool {
        matches!(
            (self.status, next),
            (LeadStatus::New, LeadStatus::Assigned)
                | (LeadStatus::Assigned, LeadStatus::InProgress)
                | (LeadStatus::InProgress, LeadStatus::Closed)
                | (LeadStatus::New, LeadStatus::Lost)
                | (LeadStatus::Assigned, LeadStatus::Lost)
                | (LeadStatus::InProgress, LeadStatus::Lost)
        )
    }

    pub fn transition_to(&mut self, next: LeadStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidLeadTransition { from: self.status, to: next })
    }
}

/// Fields accepted from a submission form, before identity and timestamps
/// are stamped.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service_type: Option<String>,
    pub message: Option<String>,
    pub referred_by_partner_id: Option<PartnerId>,
}

impl NewLead {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::Validation("lead name must not be empty".to_string()));
        }

        let email = self.email.trim();
        if email.is_empty() {
            return Err(DomainError::Validation("lead email must not be empty".to_string()));
        }
        if !email.contains('@') {
            return Err(DomainError::Validation(format!(
                "lead email `{email}` is not a valid address"
            )));
        }

        if self.phone.trim().is_empty() {
            return Err(DomainError::Validation("lead phone must not be empty".to_string()));
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeadActivityKind {
    Recorded,
    Assigned,
    StatusChanged,
}

impl LeadActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recorded => "recorded",
            Self::Assigned => "assigned",
            Self::StatusChanged => "status-changed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "recorded" => Some(Self::Recorded),
            "assigned" => Some(Self::Assigned),
            "status-changed" => Some(Self::StatusChanged),
            _ => None,
        }
    }
}

/// Append-only history entry shown on lead detail views.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadActivity {
    pub id: String,
    pub lead_id: LeadId,
    pub kind: LeadActivityKind,
    pub detail: String,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

impl LeadActivity {
    pub fn new(
        lead_id: &LeadId,
        kind: LeadActivityKind,
        detail: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            lead_id: lead_id.clone(),
            kind,
            detail: detail.into(),
            actor: actor.into(),
            occurred_at: Utc::now(),
        }
    }
}
