//! Dispute case handlers
//!
//! Each write handler derives the actor from the caller's JWT claims and
//! delegates to the engine; the engine's per-case lock serializes
//! concurrent commands on the same case.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use core_kernel::CaseId;

use crate::auth::{permissions, require_role, Claims};
use crate::dto::cases::*;
use crate::{error::ApiError, AppState};

/// Classifies facts without opening a case
pub async fn classify(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<FactsRequest>,
) -> Result<Json<ClassificationResponse>, ApiError> {
    require_role(&claims, permissions::DISPUTE_READ)?;
    request.validate()?;
    let facts = request.into_facts()?;

    Ok(Json(state.engine.classify(&facts).into()))
}

/// Opens a case
pub async fn create_case(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<FactsRequest>,
) -> Result<(StatusCode, Json<CaseResponse>), ApiError> {
    require_role(&claims, permissions::DISPUTE_WRITE)?;
    request.validate()?;
    let facts = request.into_facts()?;

    let case = state.engine.create_case(facts, &claims.actor()).await?;
    Ok((StatusCode::CREATED, Json(CaseResponse::from(&case))))
}

/// Gets a case by ID
pub async fn get_case(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<CaseResponse>, ApiError> {
    require_role(&claims, permissions::DISPUTE_READ)?;
    let case = state.engine.get_case(CaseId::from(id)).await?;
    Ok(Json(CaseResponse::from(&case)))
}

/// Applies a lifecycle action
pub async fn transition(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<CaseResponse>, ApiError> {
    require_role(&claims, permissions::DISPUTE_WRITE)?;
    let case = state
        .engine
        .transition(CaseId::from(id), request.action, &claims.actor())
        .await?;

    info!(case_id = %id, action = %request.action, status = %case.status(), "Transition applied via API");
    Ok(Json(CaseResponse::from(&case)))
}

/// Corrects an anchor timestamp
pub async fn correct_anchor(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<CorrectAnchorRequest>,
) -> Result<Json<CaseResponse>, ApiError> {
    require_role(&claims, permissions::DISPUTE_WRITE)?;
    let case = state
        .engine
        .correct_anchor(CaseId::from(id), request.anchor, request.corrected_at, &claims.actor())
        .await?;
    Ok(Json(CaseResponse::from(&case)))
}

/// Re-runs venue classification on the case's facts
pub async fn reclassify(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<CaseResponse>, ApiError> {
    require_role(&claims, permissions::DISPUTE_WRITE)?;
    let case = state.engine.reclassify(CaseId::from(id), &claims.actor()).await?;
    Ok(Json(CaseResponse::from(&case)))
}

/// Urgency of the case's active deadlines
pub async fn deadlines(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeadlinesQuery>,
) -> Result<Json<DeadlinesResponse>, ApiError> {
    require_role(&claims, permissions::DISPUTE_READ)?;
    let evaluated_at = query.at.unwrap_or_else(Utc::now);
    let deadlines = state
        .engine
        .upcoming_deadlines(CaseId::from(id), evaluated_at)
        .await?;

    Ok(Json(DeadlinesResponse {
        case_id: id,
        evaluated_at,
        deadlines,
    }))
}
