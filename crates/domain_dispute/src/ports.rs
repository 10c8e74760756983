//! Dispute Domain Ports
//!
//! The engine persists cases through the [`CaseStore`] port. Adapters:
//!
//! - **PostgreSQL Adapter**: `infra_db::PostgresCaseStore`, JSONB payload with
//!   a version column and an append-only history table
//! - **Mock Adapter**: [`mock::InMemoryCaseStore`] for tests and local runs
//!
//! # Concurrency contract
//!
//! `save` succeeds only if the stored version still equals `case.version()`;
//! otherwise it returns `PortError::Conflict` and writes nothing. The engine
//! never retries a conflict on its own.
//!
//! ```rust,ignore
//! let store: Arc<dyn CaseStore> = Arc::new(PostgresCaseStore::new(pool));
//! let engine = DisputeEngine::new(store, EngineConfig::default());
//! ```

use async_trait::async_trait;

use core_kernel::{CaseId, DomainPort, HealthCheckable, PortError};

use crate::case::Case;

/// Durable case persistence with optimistic concurrency
#[async_trait]
pub trait CaseStore: DomainPort + HealthCheckable {
    /// Loads a case with its stored version
    async fn load(&self, id: CaseId) -> Result<Case, PortError>;

    /// Stores a new case and returns its first version
    async fn insert(&self, case: &Case) -> Result<u64, PortError>;

    /// Replaces the stored case if its version matches, returning the new version
    async fn save(&self, case: &Case) -> Result<u64, PortError>;
}

/// Mock implementation of CaseStore for testing
///
/// Keeps cases in memory. Failures can be injected to exercise the
/// engine's commit-failure path.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// In-memory mock implementation of CaseStore
    #[derive(Debug, Default)]
    pub struct InMemoryCaseStore {
        cases: Arc<RwLock<HashMap<CaseId, Case>>>,
        fail_next_save: AtomicBool,
        saves: AtomicUsize,
    }

    impl InMemoryCaseStore {
        /// Creates an empty store
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes the next `save` fail with a connection error
        pub fn fail_next_save(&self) {
            self.fail_next_save.store(true, Ordering::SeqCst);
        }

        /// Number of successful saves
        pub fn save_count(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }

        /// Stored copy of a case, bypassing the port
        pub async fn snapshot(&self, id: CaseId) -> Option<Case> {
            self.cases.read().await.get(&id).cloned()
        }

        pub async fn len(&self) -> usize {
            self.cases.read().await.len()
        }

        pub async fn is_empty(&self) -> bool {
            self.cases.read().await.is_empty()
        }
    }

    impl DomainPort for InMemoryCaseStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryCaseStore {
        async fn health_check(&self) -> core_kernel::HealthCheckResult {
            core_kernel::HealthCheckResult {
                adapter_id: "in-memory-case-store".to_string(),
                status: core_kernel::AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("Mock adapter always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl CaseStore for InMemoryCaseStore {
        async fn load(&self, id: CaseId) -> Result<Case, PortError> {
            self.cases
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Case", id))
        }

        async fn insert(&self, case: &Case) -> Result<u64, PortError> {
            let mut cases = self.cases.write().await;
            if cases.contains_key(&case.id()) {
                return Err(PortError::conflict(format!("case {} already exists", case.id())));
            }
            let mut stored = case.clone();
            stored.take_events();
            stored.mark_persisted(1);
            cases.insert(case.id(), stored);
            Ok(1)
        }

        async fn save(&self, case: &Case) -> Result<u64, PortError> {
            if self.fail_next_save.swap(false, Ordering::SeqCst) {
                return Err(PortError::connection("injected save failure"));
            }

            let mut cases = self.cases.write().await;
            let current = cases
                .get(&case.id())
                .ok_or_else(|| PortError::not_found("Case", case.id()))?;
            if current.version() != case.version() {
                return Err(PortError::conflict(format!(
                    "case {} is at version {}, update was based on {}",
                    case.id(),
                    current.version(),
                    case.version()
                )));
            }

            let version = case.version() + 1;
            let mut stored = case.clone();
            stored.take_events();
            stored.mark_persisted(version);
            cases.insert(case.id(), stored);
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(version)
        }
    }
}
