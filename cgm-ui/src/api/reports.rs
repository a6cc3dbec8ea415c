//! Field service reports, publisher records and overseer views

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use cgm_common::db::members::{get_group, get_member, list_members, MemberFilter};
use cgm_common::db::models::{Member, MonthlyReport, MonthlyReportInput};
use cgm_common::db::reports::{self, ReportFilter};
use cgm_common::db::settings::get_regular_pioneer_annual_goal;
use cgm_common::events::CgmEvent;
use cgm_common::overseer::{group_month_report, inactive_publishers, GroupMonthReport};
use cgm_common::service_year::{
    congregation_totals, pioneer_summary, publisher_record, service_year_for_date, MonthKey, PioneerSummary,
    PublisherRecord, ServiceYearTotals,
};
use cgm_common::time::{now, today};

use crate::{ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ServiceYearQuery {
    /// Defaults to the service year containing today
    #[serde(default)]
    pub service_year: Option<i32>,
}

impl ServiceYearQuery {
    pub fn resolve(&self) -> i32 {
        self.service_year.unwrap_or_else(|| service_year_for_date(today()))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MonthQuery {
    /// `YYYY-MM`, defaults to the previous month
    #[serde(default)]
    pub month: Option<MonthKey>,
}

impl MonthQuery {
    fn resolve(&self) -> MonthKey {
        self.month.unwrap_or_else(|| MonthKey::from_date(today()).previous())
    }
}

async fn year_reports(state: &AppState, member_id: Option<Uuid>, service_year: i32) -> ApiResult<Vec<MonthlyReport>> {
    let filter = ReportFilter {
        member_id,
        service_year: Some(service_year),
    };
    Ok(reports::list_reports(&state.db, &filter).await?)
}

/// GET /api/reports?member_id=&service_year=
pub async fn list_reports(
    State(state): State<AppState>,
    Query(filter): Query<ReportFilter>,
) -> ApiResult<Json<Vec<MonthlyReport>>> {
    Ok(Json(reports::list_reports(&state.db, &filter).await?))
}

/// POST /api/reports
///
/// Saving a second report for the same member and month replaces the first.
pub async fn save_report(
    State(state): State<AppState>,
    Json(input): Json<MonthlyReportInput>,
) -> ApiResult<(StatusCode, Json<MonthlyReport>)> {
    let report = reports::save_report(&state.db, input).await?;
    info!(member_id = %report.member_id, month = %report.month, "Saved field service report");
    state.event_bus.emit_lossy(CgmEvent::ReportSubmitted {
        member_id: report.member_id,
        month: report.month,
        timestamp: now(),
    });
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn get_report(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<MonthlyReport>> {
    Ok(Json(reports::get_report(&state.db, id).await?))
}

pub async fn delete_report(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    reports::delete_report(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/reports/record/:member_id?service_year=
pub async fn record(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Query(query): Query<ServiceYearQuery>,
) -> ApiResult<Json<PublisherRecord>> {
    get_member(&state.db, member_id).await?;
    let service_year = query.resolve();
    let reports = year_reports(&state, Some(member_id), service_year).await?;
    Ok(Json(publisher_record(member_id, service_year, &reports)))
}

/// GET /api/reports/totals?service_year=
pub async fn totals(
    State(state): State<AppState>,
    Query(query): Query<ServiceYearQuery>,
) -> ApiResult<Json<ServiceYearTotals>> {
    let service_year = query.resolve();
    let reports = year_reports(&state, None, service_year).await?;
    Ok(Json(congregation_totals(service_year, &reports)))
}

/// GET /api/reports/pioneers?service_year=
pub async fn pioneers(
    State(state): State<AppState>,
    Query(query): Query<ServiceYearQuery>,
) -> ApiResult<Json<PioneerSummary>> {
    let service_year = query.resolve();
    let goal = get_regular_pioneer_annual_goal(&state.db).await?;
    let members = list_members(&state.db, &MemberFilter::default()).await?;
    let reports = year_reports(&state, None, service_year).await?;
    Ok(Json(pioneer_summary(service_year, &members, &reports, goal)))
}

/// GET /api/reports/groups/:group_id?month=
pub async fn group_report(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Query(query): Query<MonthQuery>,
) -> ApiResult<Json<GroupMonthReport>> {
    get_group(&state.db, group_id).await?;
    let month = query.resolve();
    let filter = MemberFilter {
        group_id: Some(group_id),
        ..MemberFilter::default()
    };
    let members = list_members(&state.db, &filter).await?;
    let reports = year_reports(&state, None, month.service_year()).await?;
    Ok(Json(group_month_report(group_id, month, &members, &reports)))
}

/// GET /api/reports/inactive?month=
pub async fn inactive(
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> ApiResult<Json<Vec<Member>>> {
    let month = query.resolve();
    let members = list_members(&state.db, &MemberFilter::default()).await?;
    let reports = reports::list_reports(&state.db, &ReportFilter::default()).await?;
    Ok(Json(inactive_publishers(month, &members, &reports)))
}

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/api/reports", get(list_reports).post(save_report))
        .route("/api/reports/totals", get(totals))
        .route("/api/reports/pioneers", get(pioneers))
        .route("/api/reports/inactive", get(inactive))
        .route("/api/reports/record/:member_id", get(record))
        .route("/api/reports/groups/:group_id", get(group_report))
        .route("/api/reports/:id", get(get_report).delete(delete_report))
}
