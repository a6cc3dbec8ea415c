//! Cleaning schedule and supplies inventory

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use cgm_common::cleaning::{restock_list, RestockLine};
use cgm_common::db::cleaning::{self, RotationRequest, StockAdjustment, TaskFilter};
use cgm_common::db::models::{CleaningTask, CleaningTaskInput, InventoryItem, InventoryItemInput, TaskStatus};
use cgm_common::db::settings::get_inventory_restock_factor;
use cgm_common::events::CgmEvent;
use cgm_common::time::now;

use crate::{ApiResult, AppState};

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// GET /api/cleaning/tasks?from=&to=&group_id=&status=
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Json<Vec<CleaningTask>>> {
    Ok(Json(cleaning::list_tasks(&state.db, &filter).await?))
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(input): Json<CleaningTaskInput>,
) -> ApiResult<(StatusCode, Json<CleaningTask>)> {
    let task = cleaning::create_task(&state.db, input).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<CleaningTask>> {
    Ok(Json(cleaning::get_task(&state.db, id).await?))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<CleaningTaskInput>,
) -> ApiResult<Json<CleaningTask>> {
    Ok(Json(cleaning::update_task(&state.db, id, input).await?))
}

pub async fn delete_task(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    cleaning::delete_task(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TaskStatus,
}

/// POST /api/cleaning/tasks/:id/status
///
/// 400 for a transition the task lifecycle does not allow.
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<StatusRequest>,
) -> ApiResult<Json<CleaningTask>> {
    let task = cleaning::set_task_status(&state.db, id, request.status, now()).await?;
    info!(task_id = %id, "Cleaning task '{}' is now {}", task.area, task.status);
    Ok(Json(task))
}

/// POST /api/cleaning/rotation
pub async fn create_rotation(
    State(state): State<AppState>,
    Json(request): Json<RotationRequest>,
) -> ApiResult<(StatusCode, Json<Vec<CleaningTask>>)> {
    let tasks = cleaning::create_rotation(&state.db, request).await?;
    Ok((StatusCode::CREATED, Json(tasks)))
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

pub async fn list_items(State(state): State<AppState>) -> ApiResult<Json<Vec<InventoryItem>>> {
    Ok(Json(cleaning::list_items(&state.db).await?))
}

pub async fn create_item(
    State(state): State<AppState>,
    Json(input): Json<InventoryItemInput>,
) -> ApiResult<(StatusCode, Json<InventoryItem>)> {
    let item = cleaning::create_item(&state.db, input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_item(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<InventoryItem>> {
    Ok(Json(cleaning::get_item(&state.db, id).await?))
}

pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<InventoryItemInput>,
) -> ApiResult<Json<InventoryItem>> {
    Ok(Json(cleaning::update_item(&state.db, id, input).await?))
}

pub async fn delete_item(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    cleaning::delete_item(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    /// Positive to restock, negative to consume
    pub delta: i64,
}

/// POST /api/inventory/:id/adjust
///
/// Emits `InventoryLow` when the stock level gets worse.
pub async fn adjust_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AdjustRequest>,
) -> ApiResult<Json<StockAdjustment>> {
    let adjustment = cleaning::adjust_quantity(&state.db, id, request.delta).await?;

    if adjustment.dropped() {
        let item = &adjustment.item;
        warn!(item_id = %item.id, "Inventory '{}' is {:?} ({} left)", item.name, adjustment.level, item.quantity);
        state.event_bus.emit_lossy(CgmEvent::InventoryLow {
            item_id: item.id,
            name: item.name.clone(),
            quantity: item.quantity,
            level: adjustment.level,
            timestamp: now(),
        });
    }
    Ok(Json(adjustment))
}

/// GET /api/inventory/restock
pub async fn restock(State(state): State<AppState>) -> ApiResult<Json<Vec<RestockLine>>> {
    let factor = get_inventory_restock_factor(&state.db).await?;
    let items = cleaning::list_items(&state.db).await?;
    Ok(Json(restock_list(&items, factor)))
}

pub fn cleaning_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cleaning/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/cleaning/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/api/cleaning/tasks/:id/status", post(set_status))
        .route("/api/cleaning/rotation", post(create_rotation))
        .route("/api/inventory", get(list_items).post(create_item))
        .route("/api/inventory/restock", get(restock))
        .route(
            "/api/inventory/:id",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/api/inventory/:id/adjust", post(adjust_item))
}
