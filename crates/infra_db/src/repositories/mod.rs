//! Repository implementations
//!
//! Repositories own the SQL. They speak in row types and leave the
//! translation to domain aggregates to the adapters.

pub mod case;

pub use case::{CaseRepository, CaseRow, HistoryRow};
