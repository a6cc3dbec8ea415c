//! Meeting workbook lookup

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use cgm_common::time::today;

use crate::services::WorkbookWeek;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WorkbookQuery {
    /// Any day of the week; defaults to the current week
    #[serde(default)]
    pub week_of: Option<NaiveDate>,
}

/// GET /api/workbook?week_of=
///
/// Always 200. When the workbook cannot be fetched or parsed the response
/// has `source: null` and no parts.
pub async fn get_workbook(
    State(state): State<AppState>,
    Query(query): Query<WorkbookQuery>,
) -> Json<WorkbookWeek> {
    let date = query.week_of.unwrap_or_else(today);
    Json(state.workbook.fetch_week(date).await)
}

pub fn workbook_routes() -> Router<AppState> {
    Router::new().route("/api/workbook", get(get_workbook))
}
