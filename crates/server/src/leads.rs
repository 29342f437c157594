//! Lead routing API.
//!
//! JSON Endpoints (mounted under `/api/v1`):
//! - `POST  /leads`                        — public contact-form intake
//! - `POST  /partners/{partner_id}/leads`  — partner-referred intake
//! - `POST  /leads/{lead_id}/assign`       — rotate and attach an assignee
//! - `PATCH /leads/{lead_id}/status`       — staff status transition
//! - `GET   /leads`                        — list with status/assignee filters
//! - `GET   /leads/{lead_id}`              — detail plus activity trail

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use quill_core::domain::lead::{Lead, LeadActivity, LeadId, LeadStatus, NewLead, PartnerId};
use quill_core::domain::staff::StaffId;
use quill_core::errors::{ApplicationError, DomainError, InterfaceError};
use quill_core::rotation::AssignmentOutcome;
use quill_db::repositories::{LeadActivityRepository, LeadFilter, LeadRepository};
use quill_routing::{AssignmentRotator, LeadIntake, LeadProgress};

const PARTNER_TOKEN_HEADER: &str = "x-partner-token";

#[derive(Clone)]
pub struct LeadsState {
    intake: Arc<LeadIntake>,
    rotator: Arc<AssignmentRotator>,
    progress: Arc<LeadProgress>,
    leads: Arc<dyn LeadRepository>,
    activity: Arc<dyn LeadActivityRepository>,
    partner_token: Option<SecretString>,
}

impl LeadsState {
    pub fn new(
        intake: Arc<LeadIntake>,
        rotator: Arc<AssignmentRotator>,
        progress: Arc<LeadProgress>,
        leads: Arc<dyn LeadRepository>,
        activity: Arc<dyn LeadActivityRepository>,
        partner_token: Option<SecretString>,
    ) -> Self {
        Self { intake, rotator, progress, leads, activity, partner_token }
    }
}

pub fn router(state: LeadsState) -> Router {
    Router::new()
        .route("/leads", post(submit_lead).get(list_leads))
        .route("/leads/{lead_id}", get(get_lead))
        .route("/leads/{lead_id}/assign", post(assign_lead))
        .route("/leads/{lead_id}/status", patch(update_status))
        .route("/partners/{partner_id}/leads", post(submit_partner_lead))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SubmitLeadRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service_type: Option<String>,
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LeadResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service_type: Option<String>,
    pub message: Option<String>,
    pub referred_by_partner_id: Option<String>,
    pub status: String,
    pub assigned_to: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Lead> for LeadResponse {
    fn from(lead: Lead) -> Self {
        Self {
            id: lead.id.0,
            name: lead.name,
            email: lead.email,
            phone: lead.phone,
            service_type: lead.service_type,
            message: lead.message,
            referred_by_partner_id: lead.referred_by_partner_id.map(|partner| partner.0),
            status: lead.status.as_str().to_string(),
            assigned_to: lead.assigned_to.map(|staff| staff.0),
            created_at: lead.created_at.to_rfc3339(),
            updated_at: lead.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActivityResponse {
    pub id: String,
    pub kind: String,
    pub detail: String,
    pub actor: String,
    pub occurred_at: String,
}

impl From<LeadActivity> for ActivityResponse {
    fn from(activity: LeadActivity) -> Self {
        Self {
            id: activity.id,
            kind: activity.kind.as_str().to_string(),
            detail: activity.detail,
            actor: activity.actor,
            occurred_at: activity.occurred_at.to_rfc3339(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LeadDetailResponse {
    pub lead: LeadResponse,
    pub activity: Vec<ActivityResponse>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AssignmentResponse {
    pub assigned: bool,
    pub already_assigned: bool,
    pub assignee_id: Option<String>,
    pub assignee_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub actor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListLeadsQuery {
    pub status: Option<String>,
    pub assigned_to: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    fn from_application(error: ApplicationError) -> Self {
        let correlation_id = Uuid::new_v4().to_string();
        let interface = error.into_interface(correlation_id.clone());
        let status = match &interface {
            InterfaceError::BadRequest { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        error!(
            event_name = "lead.api.request_failed",
            correlation_id = %correlation_id,
            error = %interface,
            "request failed"
        );

        Self {
            status,
            body: ErrorResponse {
                error: interface.user_message().to_string(),
                correlation_id,
            },
        }
    }

    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: ErrorResponse {
                error: "A valid partner token is required.".to_string(),
                correlation_id: Uuid::new_v4().to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn submit_lead(
    State(state): State<LeadsState>,
    Json(request): Json<SubmitLeadRequest>,
) -> Result<(StatusCode, Json<LeadResponse>), ApiError> {
    let lead = state
        .intake
        .record_lead(new_lead(request, None))
        .await
        .map_err(ApiError::from_application)?;

    Ok((StatusCode::CREATED, Json(lead.into())))
}

pub async fn submit_partner_lead(
    State(state): State<LeadsState>,
    Path(partner_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<SubmitLeadRequest>,
) -> Result<(StatusCode, Json<LeadResponse>), ApiError> {
    if let Some(expected) = &state.partner_token {
        let presented = headers
            .get(PARTNER_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if presented != expected.expose_secret() {
            warn!(
                event_name = "lead.api.partner_token_rejected",
                partner_id = %partner_id,
                "partner submission rejected: bad or missing token"
            );
            return Err(ApiError::unauthorized());
        }
    }

    let lead = state
        .intake
        .record_lead(new_lead(request, Some(PartnerId(partner_id))))
        .await
        .map_err(ApiError::from_application)?;

    Ok((StatusCode::CREATED, Json(lead.into())))
}

pub async fn assign_lead(
    State(state): State<LeadsState>,
    Path(lead_id): Path<String>,
) -> Result<(StatusCode, Json<AssignmentResponse>), ApiError> {
    let outcome = state
        .rotator
        .assign_lead(&LeadId(lead_id.clone()))
        .await
        .map_err(ApiError::from_application)?;

    match outcome {
        AssignmentOutcome::Assigned { member, .. } => Ok((
            StatusCode::OK,
            Json(AssignmentResponse {
                assigned: true,
                already_assigned: false,
                assignee_id: Some(member.id.0),
                assignee_name: Some(member.name),
            }),
        )),
        AssignmentOutcome::AlreadyAssigned { assignee } => Ok((
            StatusCode::OK,
            Json(AssignmentResponse {
                assigned: true,
                already_assigned: true,
                assignee_id: Some(assignee.0),
                assignee_name: None,
            }),
        )),
        AssignmentOutcome::NoEligibleAssignee => Ok((
            StatusCode::CONFLICT,
            Json(AssignmentResponse {
                assigned: false,
                already_assigned: false,
                assignee_id: None,
                assignee_name: None,
            }),
        )),
        AssignmentOutcome::LeadNotFound => Err(ApiError::from_application(
            ApplicationError::NotFound(format!("lead `{lead_id}` does not exist")),
        )),
    }
}

pub async fn update_status(
    State(state): State<LeadsState>,
    Path(lead_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<LeadResponse>, ApiError> {
    let Some(next) = LeadStatus::parse(&request.status) else {
        return Err(ApiError::from_application(ApplicationError::Domain(
            DomainError::Validation(format!("unknown lead status `{}`", request.status)),
        )));
    };

    let actor = request.actor.as_deref().unwrap_or("staff");
    let lead = state
        .progress
        .update_status(&LeadId(lead_id), next, actor)
        .await
        .map_err(ApiError::from_application)?;

    Ok(Json(lead.into()))
}

pub async fn list_leads(
    State(state): State<LeadsState>,
    Query(query): Query<ListLeadsQuery>,
) -> Result<Json<Vec<LeadResponse>>, ApiError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(LeadStatus::parse(raw).ok_or_else(|| {
            ApiError::from_application(ApplicationError::Domain(DomainError::Validation(
                format!("unknown lead status `{raw}`"),
            )))
        })?),
        None => None,
    };

    let filter = LeadFilter { status, assigned_to: query.assigned_to.map(StaffId) };
    let leads = state
        .leads
        .list(filter)
        .await
        .map_err(|error| ApiError::from_application(ApplicationError::Persistence(error.to_string())))?;

    Ok(Json(leads.into_iter().map(LeadResponse::from).collect()))
}

pub async fn get_lead(
    State(state): State<LeadsState>,
    Path(lead_id): Path<String>,
) -> Result<Json<LeadDetailResponse>, ApiError> {
    let lead_id = LeadId(lead_id);

    let lead = state
        .leads
        .find_by_id(&lead_id)
        .await
        .map_err(|error| ApiError::from_application(ApplicationError::Persistence(error.to_string())))?
        .ok_or_else(|| {
            ApiError::from_application(ApplicationError::NotFound(format!(
                "lead `{}` does not exist",
                lead_id.0
            )))
        })?;

    let activity = state
        .activity
        .list_for_lead(&lead_id)
        .await
        .map_err(|error| ApiError::from_application(ApplicationError::Persistence(error.to_string())))?;

    Ok(Json(LeadDetailResponse {
        lead: lead.into(),
        activity: activity.into_iter().map(ActivityResponse::from).collect(),
    }))
}

fn new_lead(request: SubmitLeadRequest, referred_by: Option<PartnerId>) -> NewLead {
    NewLead {
        name: request.name,
        email: request.email,
        phone: request.phone,
        service_type: request.service_type,
        message: request.message,
        referred_by_partner_id: referred_by,
    }
}
