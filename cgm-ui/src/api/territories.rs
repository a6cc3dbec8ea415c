//! Territories: records, division, distribution and check-out tracking

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use cgm_common::db::models::{Territory, TerritoryAssignment, TerritoryInput};
use cgm_common::db::settings::get_territory_overdue_days;
use cgm_common::db::territories::{
    self, CheckoutRequest, DistributionRequest, OverdueTerritory, TerritoryFilter,
};
use cgm_common::events::CgmEvent;
use cgm_common::territory::DistributionPlan;
use cgm_common::time::{now, today};

use crate::{ApiResult, AppState};

fn territories_changed(state: &AppState, territory_ids: Vec<Uuid>) {
    if territory_ids.is_empty() {
        return;
    }
    state.event_bus.emit_lossy(CgmEvent::TerritoriesChanged {
        territory_ids,
        timestamp: now(),
    });
}

/// GET /api/territories?group_id=&parent_id=
pub async fn list_territories(
    State(state): State<AppState>,
    Query(filter): Query<TerritoryFilter>,
) -> ApiResult<Json<Vec<Territory>>> {
    Ok(Json(territories::list_territories(&state.db, &filter).await?))
}

pub async fn create_territory(
    State(state): State<AppState>,
    Json(input): Json<TerritoryInput>,
) -> ApiResult<(StatusCode, Json<Territory>)> {
    let territory = territories::create_territory(&state.db, input).await?;
    info!(territory_id = %territory.id, "Created territory {}", territory.number);
    territories_changed(&state, vec![territory.id]);
    Ok((StatusCode::CREATED, Json(territory)))
}

pub async fn get_territory(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Territory>> {
    Ok(Json(territories::get_territory(&state.db, id).await?))
}

pub async fn update_territory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<TerritoryInput>,
) -> ApiResult<Json<Territory>> {
    let territory = territories::update_territory(&state.db, id, input).await?;
    territories_changed(&state, vec![id]);
    Ok(Json(territory))
}

pub async fn delete_territory(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    territories::delete_territory(&state.db, id).await?;
    territories_changed(&state, vec![id]);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct DivideRequest {
    pub parts: usize,
}

/// POST /api/territories/:id/divide
///
/// Creates `parts` sub-territories numbered `<number>-1..=<number>-<parts>`;
/// the parent is kept.
pub async fn divide_territory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<DivideRequest>,
) -> ApiResult<(StatusCode, Json<Vec<Territory>>)> {
    let children = territories::divide_territory(&state.db, id, request.parts).await?;
    let mut changed: Vec<Uuid> = children.iter().map(|t| t.id).collect();
    changed.push(id);
    territories_changed(&state, changed);
    Ok((StatusCode::CREATED, Json(children)))
}

/// POST /api/territories/distribution/preview
pub async fn preview_distribution(
    State(state): State<AppState>,
    Json(request): Json<DistributionRequest>,
) -> ApiResult<Json<DistributionPlan>> {
    Ok(Json(territories::plan_distribution(&state.db, &request).await?))
}

/// POST /api/territories/distribution/apply
///
/// Recomputes the plan from current data and writes it in one transaction.
pub async fn apply_distribution(
    State(state): State<AppState>,
    Json(request): Json<DistributionRequest>,
) -> ApiResult<Json<DistributionPlan>> {
    let plan = territories::plan_distribution(&state.db, &request).await?;
    territories::apply_distribution(&state.db, &plan).await?;
    territories_changed(&state, plan.allocations.iter().map(|a| a.territory_id).collect());
    Ok(Json(plan))
}

/// POST /api/territories/:id/checkout
///
/// 409 when the territory is already out.
pub async fn checkout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<TerritoryAssignment>)> {
    let entry = territories::checkout_territory(&state.db, id, request).await?;
    territories_changed(&state, vec![id]);
    Ok((StatusCode::CREATED, Json(entry)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReturnRequest {
    /// Defaults to today
    #[serde(default)]
    pub returned_on: Option<NaiveDate>,
}

/// POST /api/territories/:id/return
pub async fn return_territory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReturnRequest>,
) -> ApiResult<Json<TerritoryAssignment>> {
    let returned_on = request.returned_on.unwrap_or_else(today);
    let entry = territories::return_territory(&state.db, id, returned_on).await?;
    territories_changed(&state, vec![id]);
    Ok(Json(entry))
}

/// GET /api/territories/:id/history
pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<TerritoryAssignment>>> {
    Ok(Json(territories::territory_history(&state.db, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct OverdueQuery {
    /// Defaults to the `territory_overdue_days` setting
    #[serde(default)]
    pub days: Option<i64>,
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

/// GET /api/territories/overdue?days=&as_of=
pub async fn overdue(
    State(state): State<AppState>,
    Query(query): Query<OverdueQuery>,
) -> ApiResult<Json<Vec<OverdueTerritory>>> {
    let days = match query.days {
        Some(days) => days,
        None => get_territory_overdue_days(&state.db).await?,
    };
    let as_of = query.as_of.unwrap_or_else(today);
    Ok(Json(territories::overdue_territories(&state.db, as_of, days).await?))
}

pub fn territory_routes() -> Router<AppState> {
    Router::new()
        .route("/api/territories", get(list_territories).post(create_territory))
        .route("/api/territories/overdue", get(overdue))
        .route("/api/territories/distribution/preview", post(preview_distribution))
        .route("/api/territories/distribution/apply", post(apply_distribution))
        .route(
            "/api/territories/:id",
            get(get_territory).put(update_territory).delete(delete_territory),
        )
        .route("/api/territories/:id/divide", post(divide_territory))
        .route("/api/territories/:id/checkout", post(checkout))
        .route("/api/territories/:id/return", post(return_territory))
        .route("/api/territories/:id/history", get(history))
}
