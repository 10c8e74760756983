//! Dispute Routing Domain
//!
//! This crate decides which forum an underpaid, denied or out-of-network
//! claim must be pursued in, drives the dispute case through its lifecycle,
//! tracks the regulatory deadlines attached to each state, and binds case
//! facts into correspondence templates.
//!
//! # Case Lifecycle
//!
//! ```text
//! facts -> classify -> New -> ... -> Closed
//!                       |
//!                       +-- on each state entry: anchors, deadlines, documents
//! ```
//!
//! The classifier, deadline calculator and binder are pure. The only
//! stateful component is [`DisputeEngine`], which serializes commands per
//! case and persists through the [`CaseStore`] port.

pub mod binder;
pub mod case;
pub mod classifier;
pub mod config;
pub mod deadline;
pub mod error;
pub mod events;
pub mod facts;
pub mod lifecycle;
pub mod ports;
pub mod service;

pub use binder::{BoundDocument, DocumentBinder, Template, TemplateLibrary};
pub use case::{Case, CaseDocument, FactSnapshot, HistoryEntry, SnapshotReason};
pub use classifier::{
    Classification, ConsentRules, ConsentWaiver, DisputePath, EligibilityClassifier, StateIdrRegistry, Venue,
};
pub use config::{DocumentBinding, EngineConfig, StateDeadlineRule};
pub use deadline::{
    AnchorEventKind, CalendarMode, Deadline, DeadlineCalculator, DeadlineKind, DeadlineRequirement, DeadlineRule,
    DeadlineStatus, Holiday, HolidayCalendar, HolidayProvider,
};
pub use error::{BindError, DeadlineError, DisputeError, EngineError, TransitionError};
pub use events::DisputeEvent;
pub use facts::{
    ClaimRecord, ConsentStatus, ContractTerms, Facility, FacilityType, FactModel, FactModelBuilder, Financials,
    NegotiationEnd, NegotiationRecord, NetworkStatus, Payer, PlanType, RemitRecord,
};
pub use lifecycle::{Actor, CaseAction, CaseLifecycle, CaseStatus};
pub use ports::CaseStore;
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::InMemoryCaseStore;
pub use service::DisputeEngine;
