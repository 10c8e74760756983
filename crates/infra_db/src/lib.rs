//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for dispute cases using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern: [`repositories`] owns the SQL
//! and row types, [`adapters`] implements the domain's `CaseStore` port on
//! top of it.
//!
//! # Storage model
//!
//! - `dispute_cases`: one row per case, the aggregate as JSONB plus a
//!   `version` column checked on every update
//! - `case_history`: append-only copy of each transition for reporting
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresCaseStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/disputes")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresCaseStore::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::PostgresCaseStore;
pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
pub use repositories::CaseRepository;
