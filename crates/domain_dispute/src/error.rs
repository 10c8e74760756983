//! Dispute domain errors
//!
//! Every failure is a value. A failed command leaves the case exactly as it
//! was and carries enough structure for the service boundary to report a
//! machine-readable reason.

use thiserror::Error;

use core_kernel::{CaseId, PortError};

use crate::classifier::Venue;
use crate::deadline::{AnchorEventKind, DeadlineKind};
use crate::lifecycle::{CaseAction, CaseStatus};

/// Errors constructing facts or configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisputeError {
    #[error("Invalid facts: {0}")]
    InvalidFacts(String),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfiguration(String),
}

impl DisputeError {
    pub(crate) fn missing_field(field: &str) -> Self {
        DisputeError::InvalidFacts(format!("missing required field: {}", field))
    }
}

/// Template variables that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Template '{template_key}' has unresolved variables: {}", missing_variables.join(", "))]
pub struct BindError {
    pub template_key: String,
    /// Deduplicated, in order of first appearance
    pub missing_variables: Vec<String>,
}

/// Deadline computation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeadlineError {
    #[error("Deadline {kind} requires anchor event {anchor}, which has not been recorded")]
    MissingAnchor {
        kind: DeadlineKind,
        anchor: AnchorEventKind,
    },
}

/// Rejections of a lifecycle command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Invalid transition: '{action}' is not allowed from {state} on case {case_id}")]
    InvalidTransition {
        case_id: CaseId,
        state: CaseStatus,
        action: String,
    },

    #[error("Appeal re-entry limit of {limit} reached on case {case_id}")]
    ReentryLimitExceeded { case_id: CaseId, limit: u32 },

    #[error("Actor '{actor}' is not authorized to {action}")]
    Unauthorized { actor: String, action: CaseAction },

    #[error("Venue {venue} does not permit IDR filing")]
    IneligibleVenue { venue: Venue },

    #[error("Reclassification to {venue} would move case {case_id} off its path while {state}")]
    VenuePathConflict {
        case_id: CaseId,
        state: CaseStatus,
        venue: Venue,
    },

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Deadline(#[from] DeadlineError),
}

impl TransitionError {
    /// Machine-readable code for the service boundary
    pub fn code(&self) -> &'static str {
        match self {
            TransitionError::InvalidTransition { .. } => "INVALID_TRANSITION",
            TransitionError::ReentryLimitExceeded { .. } => "REENTRY_LIMIT_EXCEEDED",
            TransitionError::Unauthorized { .. } => "UNAUTHORIZED",
            TransitionError::IneligibleVenue { .. } => "INELIGIBLE_VENUE",
            TransitionError::VenuePathConflict { .. } => "VENUE_PATH_CONFLICT",
            TransitionError::TemplateNotFound(_) => "TEMPLATE_NOT_FOUND",
            TransitionError::Bind(_) => "BIND_ERROR",
            TransitionError::Deadline(_) => "DEADLINE_COMPUTATION_ERROR",
        }
    }
}

/// Errors surfaced by the engine service
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Dispute(#[from] DisputeError),

    #[error("Case not found: {0}")]
    NotFound(CaseId),

    #[error("Case {case_id} was modified concurrently")]
    StoreConflict { case_id: CaseId },

    #[error("Case store failure: {0}")]
    Store(#[source] PortError),
}

impl EngineError {
    /// Maps a store failure for a known case
    pub fn from_store(case_id: CaseId, err: PortError) -> Self {
        if err.is_conflict() {
            EngineError::StoreConflict { case_id }
        } else if err.is_not_found() {
            EngineError::NotFound(case_id)
        } else {
            EngineError::Store(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_lists_missing_variables() {
        let err = BindError {
            template_key: "appeal_letter".to_string(),
            missing_variables: vec!["ContractedRate".to_string(), "DenialDate".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Template 'appeal_letter' has unresolved variables: ContractedRate, DenialDate"
        );
    }

    #[test]
    fn test_store_conflict_mapping() {
        let id = CaseId::new();
        let err = EngineError::from_store(id, PortError::conflict("version 3 expected"));
        assert!(matches!(err, EngineError::StoreConflict { case_id } if case_id == id));

        let err = EngineError::from_store(id, PortError::not_found("Case", id));
        assert!(matches!(err, EngineError::NotFound(_)));

        let err = EngineError::from_store(id, PortError::connection("refused"));
        assert!(matches!(err, EngineError::Store(_)));
    }

    #[test]
    fn test_transition_error_codes() {
        let err = TransitionError::from(DeadlineError::MissingAnchor {
            kind: DeadlineKind::IdrFilingDeadline,
            anchor: AnchorEventKind::NegotiationEnded,
        });
        assert_eq!(err.code(), "DEADLINE_COMPUTATION_ERROR");
        assert!(err.to_string().contains("IDRFilingDeadline"));
    }
}
