//! Domain events for the case aggregate
//!
//! Events are collected on the case while a command is applied and drained
//! by the engine after the new version is durably stored. They feed the
//! structured log and any downstream integration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::CaseId;

use crate::classifier::Venue;
use crate::deadline::{AnchorEventKind, DeadlineKind};
use crate::lifecycle::{CaseAction, CaseStatus};

/// Domain events emitted by the Case aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeEvent {
    /// Case created and classified
    CaseOpened {
        case_id: CaseId,
        venue: Venue,
        timestamp: DateTime<Utc>,
    },

    /// Status changed through a lifecycle action
    StatusChanged {
        case_id: CaseId,
        from: CaseStatus,
        to: CaseStatus,
        action: CaseAction,
        actor: String,
        timestamp: DateTime<Utc>,
    },

    /// A deadline was computed and attached
    DeadlineAttached {
        case_id: CaseId,
        kind: DeadlineKind,
        due_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// Correspondence was bound
    DocumentBound {
        case_id: CaseId,
        template_key: String,
        timestamp: DateTime<Utc>,
    },

    /// An anchor timestamp was corrected
    AnchorCorrected {
        case_id: CaseId,
        anchor: AnchorEventKind,
        previous: Option<DateTime<Utc>>,
        corrected: DateTime<Utc>,
        actor: String,
        timestamp: DateTime<Utc>,
    },

    /// Venue re-evaluated
    VenueReclassified {
        case_id: CaseId,
        from: Venue,
        to: Venue,
        actor: String,
        timestamp: DateTime<Utc>,
    },
}

impl DisputeEvent {
    /// Returns the case ID associated with this event
    pub fn case_id(&self) -> CaseId {
        match self {
            DisputeEvent::CaseOpened { case_id, .. } => *case_id,
            DisputeEvent::StatusChanged { case_id, .. } => *case_id,
            DisputeEvent::DeadlineAttached { case_id, .. } => *case_id,
            DisputeEvent::DocumentBound { case_id, .. } => *case_id,
            DisputeEvent::AnchorCorrected { case_id, .. } => *case_id,
            DisputeEvent::VenueReclassified { case_id, .. } => *case_id,
        }
    }

    /// Returns the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DisputeEvent::CaseOpened { timestamp, .. } => *timestamp,
            DisputeEvent::StatusChanged { timestamp, .. } => *timestamp,
            DisputeEvent::DeadlineAttached { timestamp, .. } => *timestamp,
            DisputeEvent::DocumentBound { timestamp, .. } => *timestamp,
            DisputeEvent::AnchorCorrected { timestamp, .. } => *timestamp,
            DisputeEvent::VenueReclassified { timestamp, .. } => *timestamp,
        }
    }

    /// Returns the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            DisputeEvent::CaseOpened { .. } => "CaseOpened",
            DisputeEvent::StatusChanged { .. } => "StatusChanged",
            DisputeEvent::DeadlineAttached { .. } => "DeadlineAttached",
            DisputeEvent::DocumentBound { .. } => "DocumentBound",
            DisputeEvent::AnchorCorrected { .. } => "AnchorCorrected",
            DisputeEvent::VenueReclassified { .. } => "VenueReclassified",
        }
    }
}
