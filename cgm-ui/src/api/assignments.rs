//! Meeting assignments
//!
//! Saving, moving or deleting an assignment emits `AssignmentsChanged` for
//! every meeting week it touched.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use cgm_common::db::assignments::{self, AssignmentFilter};
use cgm_common::db::members::{list_members, MemberFilter};
use cgm_common::db::models::{Assignment, AssignmentInput, AssignmentType, Member};
use cgm_common::events::CgmEvent;
use cgm_common::meetings::{find_conflicts, is_eligible, suggest_assignee, AssignmentConflict};
use cgm_common::time::{now, week_start};

use crate::{ApiResult, AppState};

fn week_changed(state: &AppState, week_of: NaiveDate) {
    state.event_bus.emit_lossy(CgmEvent::AssignmentsChanged {
        week_of,
        timestamp: now(),
    });
}

/// GET /api/assignments?from=&to=&member_id=&meeting_type=
pub async fn list_assignments(
    State(state): State<AppState>,
    Query(filter): Query<AssignmentFilter>,
) -> ApiResult<Json<Vec<Assignment>>> {
    Ok(Json(assignments::list_assignments(&state.db, &filter).await?))
}

/// GET /api/assignments/week/:date
///
/// `date` may be any day of the week.
pub async fn list_week(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> ApiResult<Json<Vec<Assignment>>> {
    Ok(Json(assignments::list_week(&state.db, date).await?))
}

/// POST /api/assignments
///
/// Rejected with 400 when the assignee is not eligible, unless `force`.
pub async fn create_assignment(
    State(state): State<AppState>,
    Json(input): Json<AssignmentInput>,
) -> ApiResult<(StatusCode, Json<Assignment>)> {
    let assignment = assignments::create_assignment(&state.db, input).await?;
    info!(
        assignment_id = %assignment.id,
        "Assigned {} for week of {}",
        assignment.assignment_type,
        assignment.week_of
    );
    week_changed(&state, assignment.week_of);
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn get_assignment(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Assignment>> {
    Ok(Json(assignments::get_assignment(&state.db, id).await?))
}

pub async fn update_assignment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<AssignmentInput>,
) -> ApiResult<Json<Assignment>> {
    let previous = assignments::get_assignment(&state.db, id).await?;
    let assignment = assignments::update_assignment(&state.db, id, input).await?;

    week_changed(&state, assignment.week_of);
    if previous.week_of != assignment.week_of {
        week_changed(&state, previous.week_of);
    }
    Ok(Json(assignment))
}

pub async fn delete_assignment(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    let removed = assignments::delete_assignment(&state.db, id).await?;
    week_changed(&state, removed.week_of);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/assignments/conflicts?from=&to=
pub async fn list_conflicts(
    State(state): State<AppState>,
    Query(filter): Query<AssignmentFilter>,
) -> ApiResult<Json<Vec<AssignmentConflict>>> {
    let range = AssignmentFilter {
        from: filter.from,
        to: filter.to,
        ..AssignmentFilter::default()
    };
    let saved = assignments::list_assignments(&state.db, &range).await?;
    Ok(Json(find_conflicts(&saved)))
}

#[derive(Debug, Deserialize)]
pub struct TypeQuery {
    pub assignment_type: AssignmentType,
    /// Any day of the target week; used by the suggestion endpoint
    #[serde(default)]
    pub week_of: Option<NaiveDate>,
}

/// GET /api/assignments/eligible?assignment_type=
pub async fn list_eligible(
    State(state): State<AppState>,
    Query(query): Query<TypeQuery>,
) -> ApiResult<Json<Vec<Member>>> {
    let active = MemberFilter {
        active: Some(true),
        ..MemberFilter::default()
    };
    let eligible = list_members(&state.db, &active)
        .await?
        .into_iter()
        .filter(|m| is_eligible(m, query.assignment_type))
        .collect();
    Ok(Json(eligible))
}

#[derive(Debug, Serialize)]
pub struct Suggestion {
    pub assignment_type: AssignmentType,
    pub week_of: NaiveDate,
    /// `None` when nobody eligible is free that week
    pub member: Option<Member>,
}

/// GET /api/assignments/suggest?assignment_type=&week_of=
///
/// Eligible member who has gone longest without this assignment type and
/// holds nothing else that week.
pub async fn suggest(
    State(state): State<AppState>,
    Query(query): Query<TypeQuery>,
) -> ApiResult<Json<Suggestion>> {
    let week_of = week_start(query.week_of.unwrap_or_else(cgm_common::time::today));
    let active = MemberFilter {
        active: Some(true),
        ..MemberFilter::default()
    };
    let candidates = list_members(&state.db, &active).await?;

    let mut history = assignments::history_for_type(&state.db, query.assignment_type, week_of).await?;
    history.extend(assignments::list_week(&state.db, week_of).await?);

    let member = suggest_assignee(&candidates, &history, query.assignment_type, week_of).cloned();
    Ok(Json(Suggestion {
        assignment_type: query.assignment_type,
        week_of,
        member,
    }))
}

pub fn assignment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/assignments", get(list_assignments).post(create_assignment))
        .route("/api/assignments/week/:date", get(list_week))
        .route("/api/assignments/conflicts", get(list_conflicts))
        .route("/api/assignments/eligible", get(list_eligible))
        .route("/api/assignments/suggest", get(suggest))
        .route(
            "/api/assignments/:id",
            get(get_assignment).put(update_assignment).delete(delete_assignment),
        )
}
