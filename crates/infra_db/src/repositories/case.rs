//! Case repository
//!
//! Stores each dispute case as a JSONB payload keyed by case id, guarded by
//! a version column. Transition history is mirrored into `case_history`.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::DatabaseError;

/// A row of `dispute_cases`
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CaseRow {
    pub case_id: Uuid,
    pub version: i64,
    pub status: String,
    pub venue: String,
    pub claim_id: String,
    pub payload: JsonValue,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row of `case_history`
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct HistoryRow {
    pub case_id: Uuid,
    pub sequence: i32,
    pub occurred_at: DateTime<Utc>,
    pub from_state: String,
    pub to_state: String,
    pub actor: String,
    pub action: String,
}

/// Repository for dispute case persistence
#[derive(Debug, Clone)]
pub struct CaseRepository {
    pool: PgPool,
}

impl CaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetches a case row by id
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, case_id: Uuid) -> Result<Option<CaseRow>, DatabaseError> {
        let row = sqlx::query_as::<_, CaseRow>(
            r#"
            SELECT case_id, version, status, venue, claim_id, payload, opened_at, updated_at
            FROM dispute_cases
            WHERE case_id = $1
            "#,
        )
        .bind(case_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        Ok(row)
    }

    /// Inserts a new case together with its history
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::DuplicateEntry` if the case id already exists
    #[instrument(skip(self, row, history), fields(case_id = %row.case_id))]
    pub async fn insert(&self, row: &CaseRow, history: &[HistoryRow]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO dispute_cases (
                case_id, version, status, venue, claim_id, payload, opened_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(row.case_id)
        .bind(row.version)
        .bind(&row.status)
        .bind(&row.venue)
        .bind(&row.claim_id)
        .bind(&row.payload)
        .bind(row.opened_at)
        .bind(row.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DatabaseError::from(&e) {
            DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate("Case", "case_id", row.case_id),
            other => other,
        })?;

        Self::append_history(&mut tx, history).await?;

        tx.commit().await?;
        debug!(version = row.version, "Inserted case");
        Ok(())
    }

    /// Replaces a case row if the stored version still equals `expected_version`
    ///
    /// `row.version` carries the new version. History rows already stored are
    /// left untouched.
    ///
    /// # Errors
    ///
    /// - `DatabaseError::NotFound` if the case does not exist
    /// - `DatabaseError::VersionConflict` if another writer got there first
    #[instrument(skip(self, row, history), fields(case_id = %row.case_id))]
    pub async fn update_if_version(
        &self,
        row: &CaseRow,
        expected_version: i64,
        history: &[HistoryRow],
    ) -> Result<i64, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE dispute_cases
            SET version = $2, status = $3, venue = $4, claim_id = $5,
                payload = $6, updated_at = $7
            WHERE case_id = $1 AND version = $8
            "#,
        )
        .bind(row.case_id)
        .bind(row.version)
        .bind(&row.status)
        .bind(&row.venue)
        .bind(&row.claim_id)
        .bind(&row.payload)
        .bind(row.updated_at)
        .bind(expected_version)
        .execute(&mut *tx)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        if result.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM dispute_cases WHERE case_id = $1)",
            )
            .bind(row.case_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from(&e))?;

            tx.rollback().await?;
            if exists {
                warn!(expected_version, "Stale case update rejected");
                return Err(DatabaseError::version_conflict(row.case_id, expected_version));
            }
            return Err(DatabaseError::not_found("Case", row.case_id));
        }

        Self::append_history(&mut tx, history).await?;

        tx.commit().await?;
        debug!(version = row.version, "Updated case");
        Ok(row.version)
    }

    /// Transition history for a case in sequence order
    pub async fn history_for(&self, case_id: Uuid) -> Result<Vec<HistoryRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT case_id, sequence, occurred_at, from_state, to_state, actor, action
            FROM case_history
            WHERE case_id = $1
            ORDER BY sequence
            "#,
        )
        .bind(case_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        Ok(rows)
    }

    async fn append_history(
        tx: &mut Transaction<'_, Postgres>,
        history: &[HistoryRow],
    ) -> Result<(), DatabaseError> {
        for entry in history {
            sqlx::query(
                r#"
                INSERT INTO case_history (
                    case_id, sequence, occurred_at, from_state, to_state, actor, action
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (case_id, sequence) DO NOTHING
                "#,
            )
            .bind(entry.case_id)
            .bind(entry.sequence)
            .bind(entry.occurred_at)
            .bind(&entry.from_state)
            .bind(&entry.to_state)
            .bind(&entry.actor)
            .bind(&entry.action)
            .execute(&mut **tx)
            .await
            .map_err(|e| DatabaseError::from(&e))?;
        }
        Ok(())
    }
}
