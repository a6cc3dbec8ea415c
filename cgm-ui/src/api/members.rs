//! Members and field service groups

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

use cgm_common::db::members::{self, MemberFilter};
use cgm_common::db::models::{Group, GroupInput, Member, MemberInput};

use crate::{ApiResult, AppState};

/// GET /api/groups
pub async fn list_groups(State(state): State<AppState>) -> ApiResult<Json<Vec<Group>>> {
    Ok(Json(members::list_groups(&state.db).await?))
}

/// POST /api/groups
pub async fn create_group(
    State(state): State<AppState>,
    Json(input): Json<GroupInput>,
) -> ApiResult<(StatusCode, Json<Group>)> {
    let group = members::create_group(&state.db, input).await?;
    info!(group_id = %group.id, "Created group {}", group.name);
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn get_group(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Group>> {
    Ok(Json(members::get_group(&state.db, id).await?))
}

pub async fn update_group(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<GroupInput>,
) -> ApiResult<Json<Group>> {
    Ok(Json(members::update_group(&state.db, id, input).await?))
}

/// DELETE /api/groups/:id
///
/// Members of the group are kept with no group.
pub async fn delete_group(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    members::delete_group(&state.db, id).await?;
    info!(group_id = %id, "Deleted group");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/members?group_id=&active=&search=
pub async fn list_members(
    State(state): State<AppState>,
    Query(filter): Query<MemberFilter>,
) -> ApiResult<Json<Vec<Member>>> {
    Ok(Json(members::list_members(&state.db, &filter).await?))
}

/// POST /api/members
pub async fn create_member(
    State(state): State<AppState>,
    Json(input): Json<MemberInput>,
) -> ApiResult<(StatusCode, Json<Member>)> {
    let member = members::create_member(&state.db, input).await?;
    info!(member_id = %member.id, "Created member {}", member.full_name());
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn get_member(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Member>> {
    Ok(Json(members::get_member(&state.db, id).await?))
}

pub async fn update_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<MemberInput>,
) -> ApiResult<Json<Member>> {
    Ok(Json(members::update_member(&state.db, id, input).await?))
}

/// DELETE /api/members/:id
///
/// Removes the member's reports and assignments with them.
pub async fn delete_member(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    members::delete_member(&state.db, id).await?;
    info!(member_id = %id, "Deleted member");
    Ok(StatusCode::NO_CONTENT)
}

pub fn member_routes() -> Router<AppState> {
    Router::new()
        .route("/api/groups", get(list_groups).post(create_group))
        .route(
            "/api/groups/:id",
            get(get_group).put(update_group).delete(delete_group),
        )
        .route("/api/members", get(list_members).post(create_member))
        .route(
            "/api/members/:id",
            get(get_member).put(update_member).delete(delete_member),
        )
}
