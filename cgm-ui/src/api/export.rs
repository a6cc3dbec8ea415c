//! CSV downloads

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use uuid::Uuid;

use cgm_common::db::finance::{list_transactions, TransactionFilter};
use cgm_common::db::members::{get_member, list_groups};
use cgm_common::db::reports::{list_reports, ReportFilter};
use cgm_common::db::settings::get_finance_opening_balance_cents;
use cgm_common::db::territories::{list_territories, TerritoryFilter};
use cgm_common::export::{congregation_totals_csv, finance_summary_csv, publisher_record_csv, territory_list_csv};
use cgm_common::finance::service_year_finance;
use cgm_common::service_year::{congregation_totals, publisher_record};

use crate::api::reports::ServiceYearQuery;
use crate::{ApiError, ApiResult, AppState};

/// Attach CSV content type and a download filename
fn csv_response(filename: &str, body: String) -> ApiResult<Response> {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|e| ApiError::Internal(format!("bad export filename '{}': {}", filename, e)))?;
    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
        (header::CONTENT_DISPOSITION, disposition),
    ];
    Ok((headers, body).into_response())
}

/// Lowercase ASCII letters and digits, everything else collapsed to `-`
fn slug(text: &str) -> String {
    let mut out = String::new();
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

/// GET /api/export/record/:member_id?service_year=
pub async fn export_record(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Query(query): Query<ServiceYearQuery>,
) -> ApiResult<Response> {
    let member = get_member(&state.db, member_id).await?;
    let service_year = query.resolve();
    let filter = ReportFilter {
        member_id: Some(member_id),
        service_year: Some(service_year),
    };
    let reports = list_reports(&state.db, &filter).await?;
    let record = publisher_record(member_id, service_year, &reports);

    let filename = format!("record-{}-{}.csv", slug(&member.full_name()), service_year);
    csv_response(&filename, publisher_record_csv(&member, &record))
}

/// GET /api/export/territories
pub async fn export_territories(State(state): State<AppState>) -> ApiResult<Response> {
    let territories = list_territories(&state.db, &TerritoryFilter::default()).await?;
    let groups = list_groups(&state.db).await?;
    csv_response("territories.csv", territory_list_csv(&territories, &groups))
}

/// GET /api/export/finance?service_year=
pub async fn export_finance(
    State(state): State<AppState>,
    Query(query): Query<ServiceYearQuery>,
) -> ApiResult<Response> {
    let service_year = query.resolve();
    let opening = get_finance_opening_balance_cents(&state.db).await?;
    let transactions = list_transactions(&state.db, &TransactionFilter::default()).await?;
    let summary = service_year_finance(service_year, &transactions, opening);
    csv_response(&format!("finance-{}.csv", service_year), finance_summary_csv(&summary))
}

/// GET /api/export/totals?service_year=
pub async fn export_totals(
    State(state): State<AppState>,
    Query(query): Query<ServiceYearQuery>,
) -> ApiResult<Response> {
    let service_year = query.resolve();
    let filter = ReportFilter {
        member_id: None,
        service_year: Some(service_year),
    };
    let reports = list_reports(&state.db, &filter).await?;
    let totals = congregation_totals(service_year, &reports);
    csv_response(&format!("totals-{}.csv", service_year), congregation_totals_csv(&totals))
}

pub fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/api/export/record/:member_id", get(export_record))
        .route("/api/export/territories", get(export_territories))
        .route("/api/export/finance", get(export_finance))
        .route("/api/export/totals", get(export_totals))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug() {
        assert_eq!(slug("Nora Vale"), "nora-vale");
        assert_eq!(slug("  José  O'Neil "), "jos-o-neil");
        assert_eq!(slug("---"), "");
    }
}
