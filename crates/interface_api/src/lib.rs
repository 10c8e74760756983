//! HTTP API Layer
//!
//! REST API for the dispute engine using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: classification and case commands, liveness and readiness checks
//! - **Middleware**: JWT authentication, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: engine errors mapped to status codes and error codes
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let engine = Arc::new(DisputeEngine::new(store, engine_config));
//! let app = create_router(engine, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use domain_dispute::DisputeEngine;

use crate::config::ApiConfig;
use crate::handlers::{cases, health};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DisputeEngine>,
    pub config: ApiConfig,
}

/// Creates the main API router
///
/// # Arguments
///
/// * `engine` - Dispute engine over the configured case store
/// * `config` - API configuration
pub fn create_router(engine: Arc<DisputeEngine>, config: ApiConfig) -> Router {
    let state = AppState { engine, config };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let case_routes = Router::new()
        .route("/", post(cases::create_case))
        .route("/:id", get(cases::get_case))
        .route("/:id/transitions", post(cases::transition))
        .route("/:id/anchors", post(cases::correct_anchor))
        .route("/:id/reclassify", post(cases::reclassify))
        .route("/:id/deadlines", get(cases::deadlines));

    // Protected API routes
    let api_routes = Router::new()
        .route("/classify", post(cases::classify))
        .nest("/cases", case_routes)
        .layer(axum_middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
