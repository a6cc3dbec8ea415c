//! cgm-ui library - congregation dashboard HTTP API
//!
//! Exposes the router and state so integration tests can drive the
//! application without binding a socket.

pub mod api;
pub mod error;
pub mod pagination;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use cgm_common::events::EventBus;
use services::WorkbookClient;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Broadcast channel feeding `/api/events`
    pub event_bus: EventBus,
    pub workbook: WorkbookClient,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, workbook: WorkbookClient) -> Self {
        Self {
            db,
            event_bus,
            workbook,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::member_routes())
        .merge(api::assignment_routes())
        .merge(api::workbook_routes())
        .merge(api::cleaning_routes())
        .merge(api::territory_routes())
        .merge(api::report_routes())
        .merge(api::finance_routes())
        .merge(api::message_routes())
        .merge(api::settings_routes())
        .merge(api::export_routes())
        .merge(api::sse_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
