//! Case aggregate
//!
//! A case owns everything the engine has decided about one disputed claim:
//! the fact snapshots it was classified from, its venue, status, anchor
//! events, deadlines, correspondence and audit history. Deadlines, history,
//! documents and fact snapshots are append-only.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CaseId, DocumentId, Timezone};

use crate::binder::BoundDocument;
use crate::classifier::{Classification, DisputePath, Venue};
use crate::deadline::{AnchorEventKind, Deadline, DeadlineKind, DeadlineStatus};
use crate::events::DisputeEvent;
use crate::facts::FactModel;
use crate::lifecycle::{CaseAction, CaseStatus};

/// Why a fact snapshot was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotReason {
    Intake,
    NegotiationStarted,
    NegotiationEnded,
}

/// An immutable fact model captured at a point in the case's life
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactSnapshot {
    pub sequence: u32,
    pub reason: SnapshotReason,
    pub captured_at: DateTime<Utc>,
    pub facts: FactModel,
}

/// One audit trail entry per applied transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub from_state: CaseStatus,
    pub to_state: CaseStatus,
    pub actor: String,
    pub action: CaseAction,
}

/// Correspondence produced on entering a status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseDocument {
    pub id: DocumentId,
    pub template_key: String,
    pub bound_at: DateTime<Utc>,
    pub payload: BoundDocument,
}

impl CaseDocument {
    pub fn new(payload: BoundDocument, bound_at: DateTime<Utc>) -> Self {
        Self {
            id: DocumentId::new_v7(),
            template_key: payload.template_key.clone(),
            bound_at,
            payload,
        }
    }
}

/// A dispute case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    id: CaseId,
    /// Store version for optimistic concurrency, zero until first persisted
    #[serde(default)]
    version: u64,
    venue: Venue,
    eligibility_reasons: Vec<String>,
    #[serde(default)]
    classification_indeterminate: bool,
    status: CaseStatus,
    /// Snapshot currently in force
    facts: FactSnapshot,
    /// Earlier snapshots, oldest first
    #[serde(default)]
    superseded_facts: Vec<FactSnapshot>,
    #[serde(default)]
    anchors: BTreeMap<AnchorEventKind, DateTime<Utc>>,
    #[serde(default)]
    deadlines: Vec<Deadline>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
    #[serde(default)]
    documents: Vec<CaseDocument>,
    #[serde(default)]
    appeal_reentries: u32,
    opened_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Domain events to be published
    #[serde(skip)]
    events: Vec<DisputeEvent>,
}

impl Case {
    /// Opens a case at `New` and seeds the anchors known from the facts
    pub(crate) fn open(
        facts: FactModel,
        classification: Classification,
        timezone: Timezone,
        at: DateTime<Utc>,
    ) -> Self {
        let mut anchors = BTreeMap::new();
        anchors.insert(AnchorEventKind::CaseOpened, at);
        anchors.insert(
            AnchorEventKind::DateOfService,
            timezone.start_of_day(facts.date_of_service()),
        );
        if let Some(received_on) = facts.remittance_received_on() {
            anchors.insert(AnchorEventKind::PaymentDetermination, timezone.start_of_day(received_on));
        }
        if let Some(started_at) = facts.negotiation().started_at {
            anchors.insert(AnchorEventKind::NegotiationStarted, started_at);
        }
        if let Some(end) = facts.negotiation().ended {
            anchors.insert(AnchorEventKind::NegotiationEnded, end.ended_at);
        }

        let id = CaseId::new_v7();
        let venue = classification.venue;

        Self {
            id,
            version: 0,
            venue,
            eligibility_reasons: classification.reasons,
            classification_indeterminate: classification.indeterminate,
            status: CaseStatus::New,
            facts: FactSnapshot {
                sequence: 1,
                reason: SnapshotReason::Intake,
                captured_at: at,
                facts,
            },
            superseded_facts: Vec::new(),
            anchors,
            deadlines: Vec::new(),
            history: Vec::new(),
            documents: Vec::new(),
            appeal_reentries: 0,
            opened_at: at,
            updated_at: at,
            events: vec![DisputeEvent::CaseOpened {
                case_id: id,
                venue,
                timestamp: at,
            }],
        }
    }

    pub fn id(&self) -> CaseId {
        self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Records the version assigned by the case store
    pub fn mark_persisted(&mut self, version: u64) {
        self.version = version;
    }

    pub fn venue(&self) -> Venue {
        self.venue
    }

    pub fn path(&self) -> DisputePath {
        self.venue.path()
    }

    pub fn eligibility_reasons(&self) -> &[String] {
        &self.eligibility_reasons
    }

    pub fn is_classification_indeterminate(&self) -> bool {
        self.classification_indeterminate
    }

    pub fn status(&self) -> CaseStatus {
        self.status
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    /// The fact model currently in force
    pub fn facts(&self) -> &FactModel {
        &self.facts.facts
    }

    /// All fact snapshots, oldest first
    pub fn fact_snapshots(&self) -> Vec<&FactSnapshot> {
        self.superseded_facts.iter().chain(std::iter::once(&self.facts)).collect()
    }

    pub fn anchors(&self) -> &BTreeMap<AnchorEventKind, DateTime<Utc>> {
        &self.anchors
    }

    pub fn anchor(&self, kind: AnchorEventKind) -> Option<DateTime<Utc>> {
        self.anchors.get(&kind).copied()
    }

    /// Every deadline record ever computed, including superseded ones
    pub fn deadlines(&self) -> &[Deadline] {
        &self.deadlines
    }

    /// Most recent record of a deadline kind
    pub fn deadline(&self, kind: DeadlineKind) -> Option<&Deadline> {
        self.deadlines.iter().rev().find(|d| d.kind == kind)
    }

    /// Most recent record per deadline kind, in order of computation
    pub fn latest_deadlines(&self) -> Vec<&Deadline> {
        let mut seen = BTreeSet::new();
        let mut latest: Vec<&Deadline> = self
            .deadlines
            .iter()
            .rev()
            .filter(|d| seen.insert(d.kind))
            .collect();
        latest.reverse();
        latest
    }

    /// Latest deadlines attached to the current status
    pub fn active_deadlines(&self) -> Vec<&Deadline> {
        self.latest_deadlines()
            .into_iter()
            .filter(|d| d.attached_to == self.status)
            .collect()
    }

    /// Urgency of the active deadlines, soonest first
    pub fn deadline_statuses(&self, now: DateTime<Utc>, urgent_threshold_days: i64) -> Vec<DeadlineStatus> {
        if self.is_closed() {
            return Vec::new();
        }
        let mut statuses: Vec<DeadlineStatus> = self
            .active_deadlines()
            .into_iter()
            .map(|d| d.status_at(now, urgent_threshold_days))
            .collect();
        statuses.sort_by_key(|s| s.due_at);
        statuses
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn documents(&self) -> &[CaseDocument] {
        &self.documents
    }

    pub fn appeal_reentries(&self) -> u32 {
        self.appeal_reentries
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Takes the pending domain events
    pub fn take_events(&mut self) -> Vec<DisputeEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn pending_events(&self) -> &[DisputeEvent] {
        &self.events
    }

    /// Records an anchor; `keep_existing` preserves a timestamp already known
    pub(crate) fn record_anchor(&mut self, kind: AnchorEventKind, at: DateTime<Utc>, keep_existing: bool) {
        if keep_existing {
            self.anchors.entry(kind).or_insert(at);
        } else {
            self.anchors.insert(kind, at);
        }
    }

    pub(crate) fn push_snapshot(&mut self, facts: FactModel, reason: SnapshotReason, at: DateTime<Utc>) {
        let next = FactSnapshot {
            sequence: self.facts.sequence + 1,
            reason,
            captured_at: at,
            facts,
        };
        let previous = std::mem::replace(&mut self.facts, next);
        self.superseded_facts.push(previous);
    }

    pub(crate) fn apply_classification(&mut self, classification: Classification) {
        self.venue = classification.venue;
        self.eligibility_reasons = classification.reasons;
        self.classification_indeterminate = classification.indeterminate;
    }

    pub(crate) fn set_status(&mut self, status: CaseStatus, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    pub(crate) fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    pub(crate) fn push_deadline(&mut self, deadline: Deadline) {
        self.deadlines.push(deadline);
    }

    pub(crate) fn push_document(&mut self, document: CaseDocument) {
        self.documents.push(document);
    }

    pub(crate) fn push_event(&mut self, event: DisputeEvent) {
        self.events.push(event);
    }

    pub(crate) fn increment_reentries(&mut self) {
        self.appeal_reentries += 1;
    }
}
