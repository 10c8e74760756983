//! Domain Adapters
//!
//! Adapter implementations for domain ports, connecting domain interfaces
//! to the PostgreSQL database layer. Each adapter implements the port
//! trait and translates between aggregates and repository row types.
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresCaseStore;
//! use domain_dispute::CaseStore;
//!
//! let store = PostgresCaseStore::new(pool);
//! let case = store.load(case_id).await?;
//! ```

pub mod case_store;

pub use case_store::PostgresCaseStore;
