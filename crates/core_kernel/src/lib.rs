//! Core Kernel - Foundational types shared by the dispute engine crates
//!
//! - Money held in integer minor units
//! - Practice-local timezone handling
//! - Strongly typed identifiers
//! - Port error and health types for the hexagonal adapters

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod ports;

pub use money::{Money, Currency, MoneyError};
pub use temporal::{Timezone, TemporalError};
pub use identifiers::{CaseId, DocumentId, DeadlineId};
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
