//! Rotation arithmetic for round-robin lead assignment.
//!
//! The rotation pointer is a single shared record; all reads and writes of
//! it go through the assignment store. This module only holds the pure
//! index math and the outcome types, so every store backend advances the
//! rotation the same way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::staff::{SalesTeamMember, StaffId};

/// The persisted rotation pointer. Created on the first assignment,
/// overwritten by every later one, never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationState {
    pub last_assigned_index: i64,
    pub updated_at: DateTime<Utc>,
}

/// Index of the next member to assign, given the last persisted index and
/// the size of the freshly fetched pool. Returns `None` for an empty pool.
///
/// The pool may have grown or shrunk since the index was written; the
/// modulo keeps the result in range either way, at worst re-favoring a
/// member near a removed index for one cycle.
pub fn next_index(last_assigned_index: Option<i64>, pool_size: usize) -> Option<usize> {
    if pool_size == 0 {
        return None;
    }

    let next = (last_assigned_index.unwrap_or(-1) + 1).rem_euclid(pool_size as i64);
    Some(next as usize)
}

/// Result of routing a specific lead through the rotation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentOutcome {
    Assigned { member: SalesTeamMember, rotation_index: i64 },
    AlreadyAssigned { assignee: StaffId },
    NoEligibleAssignee,
    LeadNotFound,
}
