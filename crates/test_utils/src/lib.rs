//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! dispute engine test suites.
//!
//! # Modules
//!
//! - `fixtures`: Canonical claims, timestamps, actors and engines
//! - `builders`: Builder for fact models with sensible defaults
//! - `assertions`: Assertion helpers for cases, deadlines and documents
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use assertions::*;
pub use generators::*;
