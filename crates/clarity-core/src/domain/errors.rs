//! Error taxonomy for the governance engine.
//!
//! Three families, all scoped to a single request:
//! - Validation: malformed input, never retried.
//! - NotFound: missing task/project/request, never retried.
//! - Conflict: the caller raced another writer or took the wrong path; carries
//!   enough detail to re-fetch state and retry the correct path.
//!
//! `ApprovalState` is a specialization of Conflict for re-resolving a request
//! that already reached a terminal state. `Internal` sits outside the
//! request-scoped taxonomy: it marks a bug on our side (e.g. a response that
//! fails to encode), not a problem with the caller's input or timing.

use serde::Serialize;
use thiserror::Error;

use super::change_request::RequestStatus;
use super::ids::RequestId;

/// Coarse classification used by the JSON boundary to shape error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Internal,
}

#[derive(Debug, Error)]
pub enum GovernanceError {
    /// Malformed input (empty weekday set, out-of-range percentage, empty
    /// reason, unparseable date, wrong task behavior, ...).
    #[error("validation: {0}")]
    Validation(String),

    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity family ("task", "project", "change request", "recurrence pattern").
        entity: &'static str,
        /// Display form of the missing id.
        id: String,
    },

    /// The operation clashes with current state; re-fetch and take the
    /// correct path (e.g. open a change request instead of a direct edit).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Re-resolution of a change request that is no longer Pending.
    #[error("change request {request_id} is already {status}, cannot resolve again")]
    ApprovalState {
        request_id: RequestId,
        status: RequestStatus,
    },

    /// A bug on our side, not the caller's. Nothing to retry or correct.
    #[error("internal: {0}")]
    Internal(String),
}

impl GovernanceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) | Self::ApprovalState { .. } => ErrorKind::Conflict,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}
