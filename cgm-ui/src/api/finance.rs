//! Contributions, expenses and balances

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use cgm_common::db::finance::{self, TransactionFilter};
use cgm_common::db::models::{Transaction, TransactionInput, TransactionKind};
use cgm_common::db::settings::get_finance_opening_balance_cents;
use cgm_common::finance::{
    category_breakdown, monthly_summary, service_year_finance, CategoryTotal, MonthlyFinance, ServiceYearFinance,
};
use cgm_common::service_year::MonthKey;

use crate::api::reports::ServiceYearQuery;
use crate::pagination::{paginate, Page, PageQuery};
use crate::{ApiResult, AppState};

/// GET /api/finance/transactions?from=&to=&kind=&category=&page=&page_size=
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(filter): Query<TransactionFilter>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Page<Transaction>>> {
    let transactions = finance::list_transactions(&state.db, &filter).await?;
    Ok(Json(paginate(transactions, &page)))
}

pub async fn create_transaction(
    State(state): State<AppState>,
    Json(input): Json<TransactionInput>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    let tx = finance::create_transaction(&state.db, input).await?;
    info!(transaction_id = %tx.id, kind = %tx.kind, "Recorded {} in {}", tx.amount_cents, tx.category);
    Ok((StatusCode::CREATED, Json(tx)))
}

pub async fn get_transaction(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Transaction>> {
    Ok(Json(finance::get_transaction(&state.db, id).await?))
}

pub async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<TransactionInput>,
) -> ApiResult<Json<Transaction>> {
    Ok(Json(finance::update_transaction(&state.db, id, input).await?))
}

pub async fn delete_transaction(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    finance::delete_transaction(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/finance/monthly?from=&to=
///
/// The running balance covers every transaction from the configured opening
/// balance; `from`/`to` only select which months are returned.
pub async fn monthly(
    State(state): State<AppState>,
    Query(filter): Query<TransactionFilter>,
) -> ApiResult<Json<Vec<MonthlyFinance>>> {
    let opening = get_finance_opening_balance_cents(&state.db).await?;
    let all = finance::list_transactions(&state.db, &TransactionFilter::default()).await?;

    let mut summary = monthly_summary(&all, opening);
    summary.retain(|m| {
        filter.from.map_or(true, |from| m.month >= MonthKey::from_date(from))
            && filter.to.map_or(true, |to| m.month <= MonthKey::from_date(to))
    });
    Ok(Json(summary))
}

/// GET /api/finance/service-year?service_year=
pub async fn service_year(
    State(state): State<AppState>,
    Query(query): Query<ServiceYearQuery>,
) -> ApiResult<Json<ServiceYearFinance>> {
    let opening = get_finance_opening_balance_cents(&state.db).await?;
    let all = finance::list_transactions(&state.db, &TransactionFilter::default()).await?;
    Ok(Json(service_year_finance(query.resolve(), &all, opening)))
}

#[derive(Debug, Deserialize)]
pub struct BreakdownQuery {
    pub kind: TransactionKind,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

/// GET /api/finance/categories?kind=&from=&to=
pub async fn categories(
    State(state): State<AppState>,
    Query(query): Query<BreakdownQuery>,
) -> ApiResult<Json<Vec<CategoryTotal>>> {
    let filter = TransactionFilter {
        from: query.from,
        to: query.to,
        kind: Some(query.kind),
        category: None,
    };
    let transactions = finance::list_transactions(&state.db, &filter).await?;
    Ok(Json(category_breakdown(&transactions, query.kind)))
}

/// GET /api/finance/category-list
pub async fn category_list(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(finance::list_categories(&state.db).await?))
}

pub fn finance_routes() -> Router<AppState> {
    Router::new()
        .route("/api/finance/transactions", get(list_transactions).post(create_transaction))
        .route(
            "/api/finance/transactions/:id",
            get(get_transaction).put(update_transaction).delete(delete_transaction),
        )
        .route("/api/finance/monthly", get(monthly))
        .route("/api/finance/service-year", get(service_year))
        .route("/api/finance/categories", get(categories))
        .route("/api/finance/category-list", get(category_list))
}
