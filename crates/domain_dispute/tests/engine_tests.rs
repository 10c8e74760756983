//! Dispute Engine Tests
//!
//! Exercises the engine service against the in-memory case store:
//! persistence of every command, atomicity on rejection or commit failure,
//! per-case serialization, and configuration reloads.

use std::sync::Arc;

use chrono::Duration;
use core_kernel::{AdapterHealth, CaseId};
use domain_dispute::{
    AnchorEventKind, CaseAction, CaseStatus, CaseStore, DeadlineKind, DisputeError, EngineConfig, EngineError,
    TransitionError, Venue,
};
use test_utils::{
    assert_case_unchanged, assert_history_consistent, ActorFixtures, EngineFixtures, FactFixtures, TemporalFixtures,
};

// ============================================================================
// CREATE AND LOAD
// ============================================================================

#[tokio::test]
async fn test_create_case_persists_scenario_a() {
    let (store, engine) = EngineFixtures::engine();

    let case = engine
        .create_case_at(FactFixtures::scenario_a(), &ActorFixtures::biller(), TemporalFixtures::case_opened_at())
        .await
        .unwrap();

    assert_eq!(case.venue(), Venue::OpenNegotiationRequired);
    assert_eq!(case.version(), 1);
    assert!(case.pending_events().is_empty());
    assert_eq!(store.len().await, 1);

    let loaded = engine.get_case(case.id()).await.unwrap();
    assert_case_unchanged(&case, &loaded);
}

#[tokio::test]
async fn test_unknown_case_is_not_found() {
    let (_store, engine) = EngineFixtures::engine();
    let id = CaseId::new();

    let err = engine.get_case(id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(missing) if missing == id));

    let err = engine
        .transition(id, CaseAction::Withdraw, &ActorFixtures::biller())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn test_classify_does_not_open_a_case() {
    let (store, engine) = EngineFixtures::engine();

    let classification = engine.classify(&FactFixtures::scenario_c());

    assert_eq!(classification.venue, Venue::AppealOnly);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_store_health_is_reported() {
    let (_store, engine) = EngineFixtures::engine();
    assert_eq!(engine.store_health().await.status, AdapterHealth::Healthy);
}

// ============================================================================
// TRANSITIONS
// ============================================================================

#[tokio::test]
async fn test_scenario_b_through_engine() {
    let (store, engine) = EngineFixtures::engine();
    let biller = ActorFixtures::biller();
    let opened_at = TemporalFixtures::case_opened_at();

    let case = engine
        .create_case_at(FactFixtures::scenario_b(), &biller, opened_at)
        .await
        .unwrap();
    let case = engine
        .transition_at(case.id(), CaseAction::StartNegotiation, &biller, opened_at + Duration::hours(1))
        .await
        .unwrap();
    let case = engine
        .transition_at(
            case.id(),
            CaseAction::EndNegotiation,
            &biller,
            TemporalFixtures::negotiation_ended_at() + Duration::hours(1),
        )
        .await
        .unwrap();

    assert_eq!(case.status(), CaseStatus::ReadyForIdr);
    assert_eq!(case.version(), 3);
    assert_eq!(store.save_count(), 2);
    assert_history_consistent(&case);

    let stored = store.snapshot(case.id()).await.unwrap();
    assert_eq!(stored.status(), CaseStatus::ReadyForIdr);
    assert!(stored.deadline(DeadlineKind::IdrFilingDeadline).is_some());

    let now = TemporalFixtures::utc(2024, 5, 21, 12, 0);
    let upcoming = engine.upcoming_deadlines(case.id(), now).await.unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].kind, DeadlineKind::IdrFilingDeadline);
    assert_eq!(upcoming[0].days_until, 3);
    assert!(upcoming[0].is_urgent);
    assert!(!upcoming[0].is_overdue);
}

#[tokio::test]
async fn test_scenario_d_leaves_stored_case_untouched() {
    let (store, engine) = EngineFixtures::engine();
    let case = engine
        .create_case(FactFixtures::scenario_a(), &ActorFixtures::biller())
        .await
        .unwrap();
    let before = store.snapshot(case.id()).await.unwrap();

    let err = engine
        .transition(case.id(), CaseAction::MarkAsFiled, &ActorFixtures::biller())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Transition(TransitionError::InvalidTransition {
            state: CaseStatus::New,
            ..
        })
    ));
    let after = store.snapshot(case.id()).await.unwrap();
    assert_case_unchanged(&before, &after);
    assert_eq!(after.version(), 1);
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn test_failed_commit_discards_transition() {
    let (store, engine) = EngineFixtures::engine();
    let case = engine
        .create_case(FactFixtures::scenario_c(), &ActorFixtures::biller())
        .await
        .unwrap();

    store.fail_next_save();
    let err = engine
        .transition(case.id(), CaseAction::DraftAppeal, &ActorFixtures::biller())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Store(ref port) if port.is_transient()));
    let stored = engine.get_case(case.id()).await.unwrap();
    assert_eq!(stored.status(), CaseStatus::New);
    assert!(stored.documents().is_empty());

    let retried = engine
        .transition(case.id(), CaseAction::DraftAppeal, &ActorFixtures::biller())
        .await
        .unwrap();
    assert_eq!(retried.status(), CaseStatus::AppealDrafted);
    assert_eq!(retried.documents().len(), 1);
}

#[tokio::test]
async fn test_reopen_through_engine_requires_authorization() {
    let (_store, engine) = EngineFixtures::engine();
    let case = engine
        .create_case(FactFixtures::scenario_c(), &ActorFixtures::biller())
        .await
        .unwrap();
    engine
        .transition(case.id(), CaseAction::Withdraw, &ActorFixtures::biller())
        .await
        .unwrap();

    let err = engine
        .transition(case.id(), CaseAction::Reopen, &ActorFixtures::biller())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Transition(TransitionError::Unauthorized { .. })));

    let reopened = engine
        .transition(case.id(), CaseAction::Reopen, &ActorFixtures::supervisor())
        .await
        .unwrap();
    assert_eq!(reopened.status(), CaseStatus::New);
    assert!(engine.upcoming_deadlines(case.id(), TemporalFixtures::case_opened_at()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_anchor_correction_and_reclassification_are_persisted() {
    let (store, engine) = EngineFixtures::engine();
    let biller = ActorFixtures::biller();
    let case = engine
        .create_case_at(FactFixtures::scenario_a(), &biller, TemporalFixtures::case_opened_at())
        .await
        .unwrap();
    engine
        .transition_at(
            case.id(),
            CaseAction::StartNegotiation,
            &biller,
            TemporalFixtures::negotiation_started_at(),
        )
        .await
        .unwrap();

    let corrected_at = TemporalFixtures::utc(2024, 4, 16, 14, 0);
    let corrected = engine
        .correct_anchor(case.id(), AnchorEventKind::NegotiationStarted, corrected_at, &ActorFixtures::supervisor())
        .await
        .unwrap();
    assert_eq!(corrected.anchor(AnchorEventKind::NegotiationStarted), Some(corrected_at));
    assert!(corrected
        .deadline(DeadlineKind::OpenNegotiationPeriodEnd)
        .and_then(|d| d.supersedes)
        .is_some());

    let reclassified = engine.reclassify(case.id(), &ActorFixtures::supervisor()).await.unwrap();
    assert_eq!(reclassified.venue(), Venue::OpenNegotiationRequired);
    assert_eq!(reclassified.version(), 4);
    assert_eq!(store.snapshot(case.id()).await.unwrap().version(), 4);
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_commands_on_one_case_are_serialized() {
    let (store, engine) = EngineFixtures::engine();
    let engine = Arc::new(engine);
    let case = engine
        .create_case(FactFixtures::scenario_a(), &ActorFixtures::biller())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = engine.clone();
        let id = case.id();
        handles.push(tokio::spawn(async move {
            let actor = domain_dispute::Actor::new(format!("biller-{i}"));
            engine.transition(id, CaseAction::StartNegotiation, &actor).await
        }));
    }

    let mut applied = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => applied += 1,
            Err(EngineError::Transition(TransitionError::InvalidTransition { .. })) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(rejected, 7);
    assert_eq!(store.save_count(), 1);
    let stored = store.snapshot(case.id()).await.unwrap();
    assert_eq!(stored.history().len(), 1);
    assert_eq!(stored.version(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_commands_on_different_cases_proceed_independently() {
    let (store, engine) = EngineFixtures::engine();
    let engine = Arc::new(engine);

    let mut ids = Vec::new();
    for _ in 0..10 {
        let case = engine
            .create_case(FactFixtures::scenario_c(), &ActorFixtures::biller())
            .await
            .unwrap();
        ids.push(case.id());
    }

    let handles: Vec<_> = ids
        .iter()
        .map(|id| {
            let engine = engine.clone();
            let id = *id;
            tokio::spawn(async move {
                engine
                    .transition(id, CaseAction::DraftAppeal, &ActorFixtures::biller())
                    .await
            })
        })
        .collect();

    for handle in handles {
        let case = handle.await.unwrap().unwrap();
        assert_eq!(case.status(), CaseStatus::AppealDrafted);
    }
    assert_eq!(store.save_count(), 10);
}

#[tokio::test]
async fn test_stale_write_is_rejected_by_store() {
    let (store, engine) = EngineFixtures::engine();
    let case = engine
        .create_case(FactFixtures::scenario_c(), &ActorFixtures::biller())
        .await
        .unwrap();
    let stale = store.load(case.id()).await.unwrap();

    engine
        .transition(case.id(), CaseAction::DraftAppeal, &ActorFixtures::biller())
        .await
        .unwrap();

    let err = store.save(&stale).await.unwrap_err();
    assert!(err.is_conflict());
    assert!(matches!(
        EngineError::from_store(case.id(), err),
        EngineError::StoreConflict { .. }
    ));
    assert_eq!(store.snapshot(case.id()).await.unwrap().status(), CaseStatus::AppealDrafted);
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[tokio::test]
async fn test_reload_keeps_frozen_rules_on_existing_deadlines() {
    let (_store, engine) = EngineFixtures::engine();
    let case = engine
        .create_case(FactFixtures::scenario_c(), &ActorFixtures::biller())
        .await
        .unwrap();
    let case = engine
        .transition(case.id(), CaseAction::DraftAppeal, &ActorFixtures::biller())
        .await
        .unwrap();

    let mut config = EngineConfig::default();
    config.version = "2024.2".to_string();
    for state_rule in &mut config.deadline_rules {
        if state_rule.rule.kind == DeadlineKind::AppealFilingDeadline {
            state_rule.rule.offset_days = 90;
        }
    }
    engine.reload_config(config).unwrap();
    assert_eq!(engine.config().version, "2024.2");

    let first = case.deadline(DeadlineKind::AppealFilingDeadline).unwrap().clone();
    let case = engine
        .correct_anchor(
            case.id(),
            AnchorEventKind::PaymentDetermination,
            TemporalFixtures::utc(2024, 4, 2, 16, 0),
            &ActorFixtures::supervisor(),
        )
        .await
        .unwrap();

    let recomputed = case.deadline(DeadlineKind::AppealFilingDeadline).unwrap();
    assert_eq!(recomputed.rule.offset_days, 180);
    assert_eq!(recomputed.rule_set_version, "default");
    assert_eq!(recomputed.supersedes, Some(first.id));
}

#[tokio::test]
async fn test_invalid_reload_is_rejected() {
    let (_store, engine) = EngineFixtures::engine();
    let mut config = EngineConfig::default();
    config.version = String::new();

    let err = engine.reload_config(config).unwrap_err();

    assert!(matches!(err, EngineError::Dispute(DisputeError::InvalidConfiguration(_))));
    assert_eq!(engine.config().version, "default");
}
