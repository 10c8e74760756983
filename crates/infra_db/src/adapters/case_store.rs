//! PostgreSQL Case Store
//!
//! Implements [`CaseStore`] on top of [`CaseRepository`]. The aggregate is
//! stored whole as JSONB; the version column is authoritative and is copied
//! back onto the case on load.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{AdapterHealth, CaseId, DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_dispute::{Case, CaseStore};

use crate::error::DatabaseError;
use crate::repositories::case::{CaseRepository, CaseRow, HistoryRow};

/// PostgreSQL-backed implementation of the CaseStore port
#[derive(Debug, Clone)]
pub struct PostgresCaseStore {
    repository: CaseRepository,
    pool: PgPool,
}

impl PostgresCaseStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: CaseRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns a reference to the underlying repository
    ///
    /// Gives reporting code access to the mirrored history table.
    pub fn repository(&self) -> &CaseRepository {
        &self.repository
    }
}

fn to_db_version(version: u64) -> Result<i64, DatabaseError> {
    i64::try_from(version)
        .map_err(|_| DatabaseError::SerializationError(format!("version {} out of range", version)))
}

fn from_db_version(version: i64) -> Result<u64, DatabaseError> {
    u64::try_from(version)
        .map_err(|_| DatabaseError::SerializationError(format!("stored version {} is negative", version)))
}

/// Builds the row for `case` as it will be stored at `version`
pub(crate) fn case_to_row(case: &Case, version: u64) -> Result<CaseRow, DatabaseError> {
    let mut stored = case.clone();
    stored.take_events();
    stored.mark_persisted(version);

    Ok(CaseRow {
        case_id: case.id().into(),
        version: to_db_version(version)?,
        status: case.status().as_str().to_string(),
        venue: case.venue().as_str().to_string(),
        claim_id: case.facts().claim_id().to_string(),
        payload: serde_json::to_value(&stored)?,
        opened_at: case.opened_at(),
        updated_at: case.updated_at(),
    })
}

/// Restores a case from its row, trusting the version column over the payload
pub(crate) fn row_to_case(row: CaseRow) -> Result<Case, DatabaseError> {
    let version = from_db_version(row.version)?;
    let mut case: Case = serde_json::from_value(row.payload)?;
    case.mark_persisted(version);
    Ok(case)
}

pub(crate) fn history_rows(case: &Case) -> Result<Vec<HistoryRow>, DatabaseError> {
    let case_id = case.id().into();
    case.history()
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let sequence = i32::try_from(index + 1).map_err(|_| {
                DatabaseError::SerializationError("history too long".to_string())
            })?;
            Ok(HistoryRow {
                case_id,
                sequence,
                occurred_at: entry.timestamp,
                from_state: entry.from_state.as_str().to_string(),
                to_state: entry.to_state.as_str().to_string(),
                actor: entry.actor.clone(),
                action: entry.action.as_str().to_string(),
            })
        })
        .collect()
}

fn not_found_or(id: CaseId, error: DatabaseError) -> PortError {
    if error.is_not_found() {
        PortError::not_found("Case", id)
    } else {
        error.into()
    }
}

impl DomainPort for PostgresCaseStore {}

#[async_trait]
impl HealthCheckable for PostgresCaseStore {
    /// Checks database connectivity with a SELECT 1
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult {
                adapter_id: "postgres-case-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: "postgres-case-store".to_string(),
                status: AdapterHealth::Unhealthy,
                latency_ms,
                message: Some(format!("Database error: {}", e)),
                checked_at: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl CaseStore for PostgresCaseStore {
    #[instrument(skip(self))]
    async fn load(&self, id: CaseId) -> Result<Case, PortError> {
        let row = self
            .repository
            .get_by_id(id.into())
            .await
            .map_err(|e| not_found_or(id, e))?
            .ok_or_else(|| PortError::not_found("Case", id))?;

        debug!(version = row.version, "Loaded case");
        row_to_case(row).map_err(PortError::from)
    }

    #[instrument(skip(self, case), fields(case_id = %case.id()))]
    async fn insert(&self, case: &Case) -> Result<u64, PortError> {
        let row = case_to_row(case, 1)?;
        let history = history_rows(case)?;
        self.repository.insert(&row, &history).await?;
        Ok(1)
    }

    #[instrument(skip(self, case), fields(case_id = %case.id(), version = case.version()))]
    async fn save(&self, case: &Case) -> Result<u64, PortError> {
        let next = case.version() + 1;
        let row = case_to_row(case, next)?;
        let history = history_rows(case)?;
        let expected = to_db_version(case.version())?;

        let stored = self
            .repository
            .update_if_version(&row, expected, &history)
            .await
            .map_err(|e| not_found_or(case.id(), e))?;

        Ok(from_db_version(stored)?)
    }
}
