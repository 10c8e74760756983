//! Case lifecycle state machine
//!
//! Status values form a closed enum and legal moves live in one explicit
//! table. Applying an action never mutates the case it is given: the machine
//! works on a copy and hands back the successor, so a rejected action, a
//! failed deadline computation or a failed document binding leaves the
//! caller's case untouched.
//!
//! ```text
//! NSA path:    New -> InNegotiation -> ReadyForIDR -> IDRFiled -> Closed
//!                 \________________________/
//! Appeal path: New -> AppealDrafted -> AppealSubmitted -> Closed
//!                          ^                  |
//!                          +---- Denied <-----+
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::binder::DocumentBinder;
use crate::case::{Case, CaseDocument, HistoryEntry, SnapshotReason};
use crate::classifier::DisputePath;
use crate::config::EngineConfig;
use crate::deadline::{
    AnchorEventKind, AnchorRef, Deadline, DeadlineCalculator, DeadlineRequirement, HolidayProvider,
};
use crate::error::{DeadlineError, TransitionError};
use crate::events::DisputeEvent;
use crate::facts::FactModel;

/// Case status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CaseStatus {
    New,
    InNegotiation,
    #[serde(rename = "ReadyForIDR")]
    ReadyForIdr,
    #[serde(rename = "IDRFiled")]
    IdrFiled,
    AppealDrafted,
    AppealSubmitted,
    Denied,
    Closed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::New => "New",
            CaseStatus::InNegotiation => "InNegotiation",
            CaseStatus::ReadyForIdr => "ReadyForIDR",
            CaseStatus::IdrFiled => "IDRFiled",
            CaseStatus::AppealDrafted => "AppealDrafted",
            CaseStatus::AppealSubmitted => "AppealSubmitted",
            CaseStatus::Denied => "Denied",
            CaseStatus::Closed => "Closed",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, CaseStatus::Closed)
    }

    /// Anchor event recorded when the case enters this status
    pub fn entry_anchor(&self) -> Option<AnchorEventKind> {
        match self {
            CaseStatus::InNegotiation => Some(AnchorEventKind::NegotiationStarted),
            CaseStatus::ReadyForIdr => Some(AnchorEventKind::NegotiationEnded),
            CaseStatus::IdrFiled => Some(AnchorEventKind::IdrInitiated),
            CaseStatus::AppealSubmitted => Some(AnchorEventKind::AppealSubmitted),
            CaseStatus::Denied => Some(AnchorEventKind::DenialReceived),
            CaseStatus::New | CaseStatus::AppealDrafted | CaseStatus::Closed => None,
        }
    }

    pub fn all() -> [CaseStatus; 8] {
        [
            CaseStatus::New,
            CaseStatus::InNegotiation,
            CaseStatus::ReadyForIdr,
            CaseStatus::IdrFiled,
            CaseStatus::AppealDrafted,
            CaseStatus::AppealSubmitted,
            CaseStatus::Denied,
            CaseStatus::Closed,
        ]
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller command applied to a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaseAction {
    StartNegotiation,
    EndNegotiation,
    Settle,
    MarkAsFiled,
    RecordDetermination,
    DraftAppeal,
    SubmitAppeal,
    RecordDenial,
    Resolve,
    Close,
    Withdraw,
    Reopen,
}

impl CaseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseAction::StartNegotiation => "startNegotiation",
            CaseAction::EndNegotiation => "endNegotiation",
            CaseAction::Settle => "settle",
            CaseAction::MarkAsFiled => "markAsFiled",
            CaseAction::RecordDetermination => "recordDetermination",
            CaseAction::DraftAppeal => "draftAppeal",
            CaseAction::SubmitAppeal => "submitAppeal",
            CaseAction::RecordDenial => "recordDenial",
            CaseAction::Resolve => "resolve",
            CaseAction::Close => "close",
            CaseAction::Withdraw => "withdraw",
            CaseAction::Reopen => "reopen",
        }
    }

    pub fn all() -> [CaseAction; 12] {
        [
            CaseAction::StartNegotiation,
            CaseAction::EndNegotiation,
            CaseAction::Settle,
            CaseAction::MarkAsFiled,
            CaseAction::RecordDetermination,
            CaseAction::DraftAppeal,
            CaseAction::SubmitAppeal,
            CaseAction::RecordDenial,
            CaseAction::Resolve,
            CaseAction::Close,
            CaseAction::Withdraw,
            CaseAction::Reopen,
        ]
    }
}

impl fmt::Display for CaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CaseAction::all()
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown action '{}'", s))
    }
}

/// Which path a table row applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathScope {
    Nsa,
    Appeal,
    Both,
}

impl PathScope {
    fn admits(&self, path: DisputePath) -> bool {
        match self {
            PathScope::Nsa => path == DisputePath::Nsa,
            PathScope::Appeal => path == DisputePath::Appeal,
            PathScope::Both => true,
        }
    }
}

/// `None` as the source state means any state other than `Closed`
struct Transition {
    from: Option<CaseStatus>,
    action: CaseAction,
    to: CaseStatus,
    scope: PathScope,
}

const fn row(from: CaseStatus, action: CaseAction, to: CaseStatus, scope: PathScope) -> Transition {
    Transition {
        from: Some(from),
        action,
        to,
        scope,
    }
}

use CaseAction as A;
use CaseStatus as S;

const TRANSITIONS: &[Transition] = &[
    row(S::New, A::StartNegotiation, S::InNegotiation, PathScope::Nsa),
    row(S::New, A::EndNegotiation, S::ReadyForIdr, PathScope::Nsa),
    row(S::InNegotiation, A::EndNegotiation, S::ReadyForIdr, PathScope::Nsa),
    row(S::InNegotiation, A::Settle, S::Closed, PathScope::Nsa),
    row(S::ReadyForIdr, A::MarkAsFiled, S::IdrFiled, PathScope::Nsa),
    row(S::ReadyForIdr, A::Settle, S::Closed, PathScope::Nsa),
    row(S::IdrFiled, A::RecordDetermination, S::Closed, PathScope::Nsa),
    row(S::IdrFiled, A::Settle, S::Closed, PathScope::Nsa),
    row(S::New, A::DraftAppeal, S::AppealDrafted, PathScope::Appeal),
    row(S::AppealDrafted, A::SubmitAppeal, S::AppealSubmitted, PathScope::Appeal),
    row(S::AppealSubmitted, A::RecordDenial, S::Denied, PathScope::Appeal),
    row(S::AppealSubmitted, A::Resolve, S::Closed, PathScope::Appeal),
    row(S::Denied, A::DraftAppeal, S::AppealDrafted, PathScope::Appeal),
    row(S::Denied, A::Close, S::Closed, PathScope::Appeal),
    Transition {
        from: None,
        action: A::Withdraw,
        to: S::Closed,
        scope: PathScope::Both,
    },
    row(S::Closed, A::Reopen, S::New, PathScope::Both),
];

/// Looks up the target status for an action, if the table allows it
pub fn next_status(status: CaseStatus, action: CaseAction, path: DisputePath) -> Option<CaseStatus> {
    TRANSITIONS
        .iter()
        .find(|t| {
            t.action == action
                && t.scope.admits(path)
                && match t.from {
                    Some(from) => from == status,
                    None => !status.is_closed(),
                }
        })
        .map(|t| t.to)
}

/// Actions available from a status on a path
pub fn allowed_actions(status: CaseStatus, path: DisputePath) -> Vec<CaseAction> {
    CaseAction::all()
        .into_iter()
        .filter(|action| next_status(status, *action, path).is_some())
        .collect()
}

/// Who is performing a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    /// Separately granted permission to reopen closed cases
    #[serde(default)]
    pub may_reopen: bool,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            may_reopen: false,
        }
    }

    pub fn system() -> Self {
        Self::new("system")
    }

    pub fn with_reopen_authorization(mut self) -> Self {
        self.may_reopen = true;
        self
    }
}

/// Applies lifecycle commands under a given engine configuration
pub struct CaseLifecycle<'a> {
    config: &'a EngineConfig,
    holidays: &'a dyn HolidayProvider,
}

impl<'a> CaseLifecycle<'a> {
    /// Uses the configuration's own holiday calendar
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            holidays: &config.holidays,
        }
    }

    /// Overrides the holiday source
    pub fn with_holidays(mut self, holidays: &'a dyn HolidayProvider) -> Self {
        self.holidays = holidays;
        self
    }

    fn calculator(&self) -> DeadlineCalculator<'a> {
        DeadlineCalculator::new(self.config.timezone, self.holidays)
    }

    /// Classifies the facts and opens a case at `New`
    ///
    /// # Errors
    ///
    /// Fails if a statutory deadline attached to `New` has no anchor, or a
    /// document bound on entry to `New` cannot be resolved.
    pub fn open(&self, facts: FactModel, at: DateTime<Utc>) -> Result<Case, TransitionError> {
        let classification = self.config.classifier.classify(&facts);
        let mut case = Case::open(facts, classification, self.config.timezone, at);

        self.attach_deadlines(&mut case, at)?;
        self.attach_documents(&mut case, at)?;

        info!(
            case_id = %case.id(),
            venue = %case.venue(),
            deadlines = case.deadlines().len(),
            "Case opened"
        );
        Ok(case)
    }

    /// Applies an action and returns the successor case
    ///
    /// # Arguments
    ///
    /// * `case` - Current case, left untouched
    /// * `action` - Command to apply
    /// * `actor` - Who performs it, recorded in history
    /// * `at` - Timestamp of the action
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for moves outside the table, and aborts
    /// with the underlying error if the venue, deadlines or documents for the
    /// target status cannot be produced.
    pub fn transition(
        &self,
        case: &Case,
        action: CaseAction,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<Case, TransitionError> {
        let from = case.status();
        let Some(to) = next_status(from, action, case.path()) else {
            warn!(
                case_id = %case.id(),
                status = %from,
                action = %action,
                "Rejected transition"
            );
            return Err(TransitionError::InvalidTransition {
                case_id: case.id(),
                state: from,
                action: action.as_str().to_string(),
            });
        };

        if action == CaseAction::Reopen && !actor.may_reopen {
            return Err(TransitionError::Unauthorized {
                actor: actor.id.clone(),
                action,
            });
        }

        let reentry = from == CaseStatus::Denied && to == CaseStatus::AppealDrafted;
        if reentry && case.appeal_reentries() >= self.config.max_appeal_reentries {
            return Err(TransitionError::ReentryLimitExceeded {
                case_id: case.id(),
                limit: self.config.max_appeal_reentries,
            });
        }

        let mut next = case.clone();

        if let Some(anchor) = to.entry_anchor() {
            let keep_known = matches!(
                anchor,
                AnchorEventKind::NegotiationStarted | AnchorEventKind::NegotiationEnded
            );
            next.record_anchor(anchor, at, keep_known);
        }

        match action {
            CaseAction::StartNegotiation => {
                if next.facts().negotiation().started_at.is_none() {
                    let started_at = next.anchor(AnchorEventKind::NegotiationStarted).unwrap_or(at);
                    let amended = next.facts().with_negotiation_started(started_at);
                    next.push_snapshot(amended, SnapshotReason::NegotiationStarted, at);
                }
            }
            CaseAction::EndNegotiation => self.conclude_negotiation(&mut next, at)?,
            _ => {}
        }

        if reentry {
            next.increment_reentries();
        }

        next.set_status(to, at);
        next.push_history(HistoryEntry {
            timestamp: at,
            from_state: from,
            to_state: to,
            actor: actor.id.clone(),
            action,
        });
        next.push_event(DisputeEvent::StatusChanged {
            case_id: next.id(),
            from,
            to,
            action,
            actor: actor.id.clone(),
            timestamp: at,
        });

        self.attach_deadlines(&mut next, at)?;
        self.attach_documents(&mut next, at)?;

        info!(
            case_id = %next.id(),
            from = %from,
            to = %to,
            action = %action,
            actor = %actor.id,
            "Case transitioned"
        );
        Ok(next)
    }

    /// Corrects an anchor timestamp and recomputes the deadlines counted from it
    ///
    /// Superseded deadline records stay on the case unmodified; the
    /// recomputed ones are appended and use the rule frozen on the original.
    pub fn correct_anchor(
        &self,
        case: &Case,
        anchor: AnchorEventKind,
        corrected_at: DateTime<Utc>,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<Case, TransitionError> {
        if case.status().is_closed() {
            return Err(TransitionError::InvalidTransition {
                case_id: case.id(),
                state: case.status(),
                action: "correctAnchor".to_string(),
            });
        }

        let mut next = case.clone();
        let previous = next.anchor(anchor);
        next.record_anchor(anchor, corrected_at, false);

        let calculator = self.calculator();
        let stale: Vec<Deadline> = next
            .latest_deadlines()
            .into_iter()
            .filter(|d| d.computed_from.anchor == anchor)
            .cloned()
            .collect();

        for old in stale {
            let due_at = calculator.compute_due_date(corrected_at, &old.rule);
            let recomputed = Deadline {
                id: core_kernel::DeadlineId::new_v7(),
                kind: old.kind,
                due_at,
                computed_from: AnchorRef {
                    anchor,
                    anchored_at: corrected_at,
                },
                rule: old.rule.clone(),
                rule_set_version: old.rule_set_version.clone(),
                attached_to: old.attached_to,
                computed_at: at,
                supersedes: Some(old.id),
            };
            next.push_event(DisputeEvent::DeadlineAttached {
                case_id: next.id(),
                kind: recomputed.kind,
                due_at,
                timestamp: at,
            });
            next.push_deadline(recomputed);
        }

        next.touch(at);
        next.push_event(DisputeEvent::AnchorCorrected {
            case_id: next.id(),
            anchor,
            previous,
            corrected: corrected_at,
            actor: actor.id.clone(),
            timestamp: at,
        });

        info!(
            case_id = %next.id(),
            anchor = %anchor,
            corrected = %corrected_at,
            actor = %actor.id,
            "Anchor corrected"
        );
        Ok(next)
    }

    /// Re-runs classification against the current facts
    ///
    /// Once a case has left `New` its status belongs to one path, so a venue
    /// on the other path is rejected with `VenuePathConflict`.
    pub fn reclassify(&self, case: &Case, actor: &Actor, at: DateTime<Utc>) -> Result<Case, TransitionError> {
        if case.status().is_closed() {
            return Err(TransitionError::InvalidTransition {
                case_id: case.id(),
                state: case.status(),
                action: "reclassify".to_string(),
            });
        }

        let classification = self.config.classifier.classify(case.facts());
        if case.status() != CaseStatus::New && classification.venue.path() != case.path() {
            warn!(
                case_id = %case.id(),
                status = %case.status(),
                venue = %classification.venue,
                "Rejected reclassification across paths"
            );
            return Err(TransitionError::VenuePathConflict {
                case_id: case.id(),
                state: case.status(),
                venue: classification.venue,
            });
        }

        let mut next = case.clone();
        let from = next.venue();
        next.apply_classification(classification);
        next.touch(at);
        next.push_event(DisputeEvent::VenueReclassified {
            case_id: next.id(),
            from,
            to: next.venue(),
            actor: actor.id.clone(),
            timestamp: at,
        });
        Ok(next)
    }

    /// Amends the facts with the negotiation outcome and fixes the final venue
    fn conclude_negotiation(&self, case: &mut Case, at: DateTime<Utc>) -> Result<(), TransitionError> {
        if !case.facts().negotiation().has_ended() {
            let ended_at = case.anchor(AnchorEventKind::NegotiationEnded).unwrap_or(at);
            let amended = case.facts().with_negotiation_ended(ended_at, false);
            case.push_snapshot(amended, SnapshotReason::NegotiationEnded, at);
        }

        let classification = self.config.classifier.classify(case.facts());
        let venue = classification.venue;
        if !venue.is_idr() {
            return Err(TransitionError::IneligibleVenue { venue });
        }

        let from = case.venue();
        case.apply_classification(classification);
        if from != venue {
            case.push_event(DisputeEvent::VenueReclassified {
                case_id: case.id(),
                from,
                to: venue,
                actor: "system".to_string(),
                timestamp: at,
            });
        }
        Ok(())
    }

    fn attach_deadlines(&self, case: &mut Case, at: DateTime<Utc>) -> Result<(), TransitionError> {
        let calculator = self.calculator();
        let status = case.status();
        let path = case.path();

        for rule in self.config.deadline_rules_for(status, path) {
            match case.anchor(rule.anchor) {
                Some(anchored_at) => {
                    let due_at = calculator.compute_due_date(anchored_at, rule);
                    case.push_event(DisputeEvent::DeadlineAttached {
                        case_id: case.id(),
                        kind: rule.kind,
                        due_at,
                        timestamp: at,
                    });
                    case.push_deadline(Deadline {
                        id: core_kernel::DeadlineId::new_v7(),
                        kind: rule.kind,
                        due_at,
                        computed_from: AnchorRef {
                            anchor: rule.anchor,
                            anchored_at,
                        },
                        rule: rule.clone(),
                        rule_set_version: self.config.version.clone(),
                        attached_to: status,
                        computed_at: at,
                        supersedes: None,
                    });
                }
                None if rule.requirement == DeadlineRequirement::Informational => {
                    warn!(
                        case_id = %case.id(),
                        kind = %rule.kind,
                        anchor = %rule.anchor,
                        "Skipping informational deadline without anchor"
                    );
                }
                None => {
                    return Err(DeadlineError::MissingAnchor {
                        kind: rule.kind,
                        anchor: rule.anchor,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    fn attach_documents(&self, case: &mut Case, at: DateTime<Utc>) -> Result<(), TransitionError> {
        let binder = DocumentBinder::new(self.config.timezone);
        let status = case.status();
        let path = case.path();

        for key in self.config.document_bindings_for(status, path) {
            let template = self
                .config
                .templates
                .get(key)
                .ok_or_else(|| TransitionError::TemplateNotFound(key.to_string()))?;
            let bound = binder.bind(template, case.facts(), case)?;
            case.push_event(DisputeEvent::DocumentBound {
                case_id: case.id(),
                template_key: bound.template_key.clone(),
                timestamp: at,
            });
            case.push_document(CaseDocument::new(bound, at));
        }
        Ok(())
    }
}
