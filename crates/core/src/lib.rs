pub mod config;
pub mod domain;
pub mod errors;
pub mod rotation;

pub use domain::lead::{
    Lead, LeadActivity, LeadActivityKind, LeadId, LeadStatus, NewLead, PartnerId,
};
pub use domain::staff::{SalesTeamMember, StaffId, StaffRole, ROTATION_ELIGIBLE_ROLES};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use rotation::{next_index, AssignmentOutcome, RotationState};
