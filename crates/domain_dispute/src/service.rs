//! Dispute engine service
//!
//! Composes the classifier, state machine, deadline calculator and binder
//! with a [`CaseStore`]. Commands on one case are serialized by a per-case
//! async mutex held across load, apply and save; commands on different
//! cases run in parallel. The state machine works on a copy, so a failed
//! commit discards the transition and the caller sees the store error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use core_kernel::{CaseId, HealthCheckResult};

use crate::case::Case;
use crate::classifier::Classification;
use crate::config::EngineConfig;
use crate::deadline::{AnchorEventKind, DeadlineStatus};
use crate::error::{EngineError, TransitionError};
use crate::facts::FactModel;
use crate::lifecycle::{Actor, CaseAction, CaseLifecycle};
use crate::ports::CaseStore;

/// Application service for dispute cases
pub struct DisputeEngine {
    store: Arc<dyn CaseStore>,
    config: RwLock<Arc<EngineConfig>>,
    locks: Mutex<HashMap<CaseId, Arc<tokio::sync::Mutex<()>>>>,
}

impl DisputeEngine {
    /// Creates an engine over a case store
    pub fn new(store: Arc<dyn CaseStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config: RwLock::new(Arc::new(config)),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Configuration currently in force
    pub fn config(&self) -> Arc<EngineConfig> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swaps in a new configuration
    ///
    /// Deadlines already attached to cases keep the rule and version they
    /// were computed with.
    pub fn reload_config(&self, config: EngineConfig) -> Result<(), EngineError> {
        config.validate()?;
        let version = config.version.clone();
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
        info!(version = %version, "Engine configuration reloaded");
        Ok(())
    }

    /// Classifies facts without opening a case
    pub fn classify(&self, facts: &FactModel) -> Classification {
        self.config().classifier.classify(facts)
    }

    /// Classifies the facts, opens a case and stores it
    pub async fn create_case(&self, facts: FactModel, actor: &Actor) -> Result<Case, EngineError> {
        self.create_case_at(facts, actor, Utc::now()).await
    }

    pub async fn create_case_at(
        &self,
        facts: FactModel,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<Case, EngineError> {
        facts.validate()?;
        let config = self.config();
        let mut case = CaseLifecycle::new(&config).open(facts, at)?;

        let version = self
            .store
            .insert(&case)
            .await
            .map_err(|e| EngineError::from_store(case.id(), e))?;
        case.mark_persisted(version);

        info!(case_id = %case.id(), actor = %actor.id, venue = %case.venue(), "Case created");
        publish(&mut case);
        Ok(case)
    }

    /// Loads a case
    pub async fn get_case(&self, id: CaseId) -> Result<Case, EngineError> {
        self.store.load(id).await.map_err(|e| EngineError::from_store(id, e))
    }

    /// Applies a lifecycle action
    pub async fn transition(&self, id: CaseId, action: CaseAction, actor: &Actor) -> Result<Case, EngineError> {
        self.transition_at(id, action, actor, Utc::now()).await
    }

    pub async fn transition_at(
        &self,
        id: CaseId,
        action: CaseAction,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<Case, EngineError> {
        self.mutate(id, |lifecycle, case| lifecycle.transition(case, action, actor, at))
            .await
    }

    /// Corrects an anchor timestamp and recomputes dependent deadlines
    pub async fn correct_anchor(
        &self,
        id: CaseId,
        anchor: AnchorEventKind,
        corrected_at: DateTime<Utc>,
        actor: &Actor,
    ) -> Result<Case, EngineError> {
        let at = Utc::now();
        self.mutate(id, |lifecycle, case| {
            lifecycle.correct_anchor(case, anchor, corrected_at, actor, at)
        })
        .await
    }

    /// Re-runs classification on the case's current facts
    pub async fn reclassify(&self, id: CaseId, actor: &Actor) -> Result<Case, EngineError> {
        let at = Utc::now();
        self.mutate(id, |lifecycle, case| lifecycle.reclassify(case, actor, at))
            .await
    }

    /// Urgency of the case's active deadlines at `now`
    pub async fn upcoming_deadlines(&self, id: CaseId, now: DateTime<Utc>) -> Result<Vec<DeadlineStatus>, EngineError> {
        let case = self.get_case(id).await?;
        Ok(case.deadline_statuses(now, self.config().urgent_threshold_days))
    }

    /// Health of the underlying store
    pub async fn store_health(&self) -> HealthCheckResult {
        self.store.health_check().await
    }

    /// Load, apply and save under the case's lock
    async fn mutate<F>(&self, id: CaseId, apply: F) -> Result<Case, EngineError>
    where
        F: FnOnce(&CaseLifecycle<'_>, &Case) -> Result<Case, TransitionError>,
    {
        let lock = self.case_lock(id);
        let result = {
            let _guard = lock.lock().await;
            self.apply_and_save(id, apply).await
        };
        drop(lock);
        self.release_lock(id);
        result
    }

    async fn apply_and_save<F>(&self, id: CaseId, apply: F) -> Result<Case, EngineError>
    where
        F: FnOnce(&CaseLifecycle<'_>, &Case) -> Result<Case, TransitionError>,
    {
        let current = self.get_case(id).await?;
        let config = self.config();
        let lifecycle = CaseLifecycle::new(&config);

        let mut next = apply(&lifecycle, &current).map_err(|e| {
            warn!(case_id = %id, status = %current.status(), error = %e, code = e.code(), "Command rejected");
            EngineError::from(e)
        })?;

        let version = self
            .store
            .save(&next)
            .await
            .map_err(|e| EngineError::from_store(id, e))?;
        next.mark_persisted(version);

        publish(&mut next);
        Ok(next)
    }

    fn case_lock(&self, id: CaseId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(id).or_default().clone()
    }

    /// Drops the lock entry once no other command holds or awaits it
    fn release_lock(&self, id: CaseId) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(&id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&id);
        }
    }
}

/// Drains and logs the case's domain events
fn publish(case: &mut Case) {
    for event in case.take_events() {
        info!(
            case_id = %event.case_id(),
            event = event.event_type(),
            at = %event.timestamp(),
            "Dispute event"
        );
    }
}
