//! Runtime settings API
//!
//! GET returns every setting with defaults filled in; PUT applies a partial
//! update and returns the new snapshot.

use axum::{extract::State, routing::get, Json, Router};
use tracing::info;

use cgm_common::db::settings::{self, Settings, SettingsUpdate};

use crate::{ApiResult, AppState};

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<Settings>> {
    Ok(Json(settings::load_settings(&state.db).await?))
}

/// PUT /api/settings
///
/// **Errors:** 400 when a value is out of range; nothing is written in that case.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<Json<Settings>> {
    let updated = settings::update_settings(&state.db, update).await?;
    info!(
        overdue_days = updated.territory_overdue_days,
        pioneer_goal = updated.regular_pioneer_annual_goal,
        "Settings updated"
    );
    Ok(Json(updated))
}

pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/api/settings", get(get_settings).put(update_settings))
}
