//! Congregation messaging

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use cgm_common::db::messages;
use cgm_common::db::models::{InboxEntry, Message, MessageInput};
use cgm_common::events::CgmEvent;
use cgm_common::time::now;

use crate::pagination::{paginate, Page, PageQuery};
use crate::{ApiResult, AppState};

/// GET /api/messages?page=&page_size=
pub async fn list_messages(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Page<Message>>> {
    let all = messages::list_messages(&state.db).await?;
    Ok(Json(paginate(all, &page)))
}

/// POST /api/messages
pub async fn post_message(
    State(state): State<AppState>,
    Json(input): Json<MessageInput>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let message = messages::post_message(&state.db, input, now()).await?;
    info!(message_id = %message.id, "Posted message: {}", message.subject);

    state.event_bus.emit_lossy(CgmEvent::MessagePosted {
        message_id: message.id,
        audience: message.audience,
        subject: message.subject.clone(),
        timestamp: message.created_at,
    });
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn get_message(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Message>> {
    Ok(Json(messages::get_message(&state.db, id).await?))
}

pub async fn delete_message(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    messages::delete_message(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub member_id: Uuid,
}

/// POST /api/messages/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<MarkReadRequest>,
) -> ApiResult<StatusCode> {
    messages::mark_read(&state.db, id, request.member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/members/:id/inbox
pub async fn inbox(State(state): State<AppState>, Path(member_id): Path<Uuid>) -> ApiResult<Json<Vec<InboxEntry>>> {
    Ok(Json(messages::inbox(&state.db, member_id).await?))
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub member_id: Uuid,
    pub unread: i64,
}

/// GET /api/members/:id/unread
pub async fn unread(State(state): State<AppState>, Path(member_id): Path<Uuid>) -> ApiResult<Json<UnreadCount>> {
    let unread = messages::unread_count(&state.db, member_id).await?;
    Ok(Json(UnreadCount { member_id, unread }))
}

pub fn message_routes() -> Router<AppState> {
    Router::new()
        .route("/api/messages", get(list_messages).post(post_message))
        .route("/api/messages/:id", get(get_message).delete(delete_message))
        .route("/api/messages/:id/read", post(mark_read))
        .route("/api/members/:id/inbox", get(inbox))
        .route("/api/members/:id/unread", get(unread))
}
