//! HTTP API integration tests
//!
//! Drive the router with `oneshot` against an in-memory database.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use cgm_common::config::WorkbookConfig;
use cgm_common::db::init_memory_database;
use cgm_common::events::EventBus;
use cgm_ui::services::WorkbookClient;
use cgm_ui::{build_router, AppState};

async fn test_app() -> Router {
    let db = init_memory_database().await.unwrap();
    let workbook = WorkbookClient::new(WorkbookConfig::default()).unwrap();
    build_router(AppState::new(db, EventBus::new(16), workbook))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, _, bytes) = send_raw(app, method, uri, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, bytes)
}

async fn create_group(app: &Router, name: &str) -> String {
    let (status, group) = send(app, Method::POST, "/api/groups", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    group["id"].as_str().unwrap().to_string()
}

async fn create_member(app: &Router, first: &str, last: &str, group_id: Option<&str>) -> String {
    let body = json!({
        "first_name": first,
        "last_name": last,
        "gender": "female",
        "group_id": group_id,
        "baptized": true,
    });
    let (status, member) = send(app, Method::POST, "/api/members", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    member["id"].as_str().unwrap().to_string()
}

async fn create_territory(app: &Router, number: &str, size: i64) -> String {
    let body = json!({ "number": number, "name": format!("Territory {}", number), "size": size });
    let (status, territory) = send(app, Method::POST, "/api/territories", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    territory["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "cgm-ui");

    let (status, info) = send(&app, Method::GET, "/api/buildinfo", None).await;
    assert_eq!(status, StatusCode::OK);
    let git_hash = info["git_hash"].as_str().unwrap();
    assert!(git_hash == "unknown" || git_hash.len() >= 8);
    assert!(!info["build_timestamp"].as_str().unwrap().is_empty());
    assert!(!info["build_profile"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_member_create_and_list() {
    let app = test_app().await;
    let group = create_group(&app, "North").await;
    create_member(&app, "Ruth", "Adler", Some(&group)).await;
    create_member(&app, "Anna", "Zeller", None).await;

    let (status, all) = send(&app, Method::GET, "/api/members", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = all
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["last_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Adler", "Zeller"]);

    let uri = format!("/api/members?group_id={}", group);
    let (_, in_group) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(in_group.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_resource_error_shape() {
    let app = test_app().await;
    let uri = format!("/api/members/{}", uuid::Uuid::new_v4());
    let (status, body) = send(&app, Method::GET, &uri, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert!(body["error"]["message"].as_str().unwrap().contains("member"));
}

#[tokio::test]
async fn test_invalid_member_is_bad_request() {
    let app = test_app().await;
    let body = json!({ "first_name": " ", "last_name": "Blank", "gender": "male" });
    let (status, body) = send(&app, Method::POST, "/api/members", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_distribution_preview_then_apply() {
    let app = test_app().await;
    let north = create_group(&app, "North").await;
    let south = create_group(&app, "South").await;
    for n in 1..=5 {
        create_territory(&app, &n.to_string(), 10).await;
    }

    let request = json!({ "strategy": "equal", "group_ids": [north, south] });
    let (status, plan) = send(
        &app,
        Method::POST,
        "/api/territories/distribution/preview",
        Some(request.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plan["allocations"].as_array().unwrap().len(), 5);
    let counts: Vec<u64> = plan["loads"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["territory_count"].as_u64().unwrap())
        .collect();
    assert_eq!(counts.iter().sum::<u64>(), 5);
    assert!(counts.iter().all(|&c| c == 2 || c == 3));

    // Preview writes nothing
    let uri = format!("/api/territories?group_id={}", north);
    let (_, before) = send(&app, Method::GET, &uri, None).await;
    assert!(before.as_array().unwrap().is_empty());

    let (status, applied) = send(&app, Method::POST, "/api/territories/distribution/apply", Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, after) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(
        after.as_array().unwrap().len() as u64,
        applied["loads"][0]["territory_count"].as_u64().unwrap()
    );
}

#[tokio::test]
async fn test_divide_territory() {
    let app = test_app().await;
    let id = create_territory(&app, "12", 31).await;

    let uri = format!("/api/territories/{}/divide", id);
    let (status, children) = send(&app, Method::POST, &uri, Some(json!({ "parts": 3 }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let children = children.as_array().unwrap();
    let numbers: Vec<&str> = children.iter().map(|c| c["number"].as_str().unwrap()).collect();
    assert_eq!(numbers, vec!["12-1", "12-2", "12-3"]);
    let sizes: i64 = children.iter().map(|c| c["size"].as_i64().unwrap()).sum();
    assert_eq!(sizes, 31);

    let (status, _) = send(&app, Method::POST, &uri, Some(json!({ "parts": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_conflict_and_return() {
    let app = test_app().await;
    let group = create_group(&app, "East").await;
    let id = create_territory(&app, "7", 12).await;

    let checkout = format!("/api/territories/{}/checkout", id);
    let body = json!({ "group_id": group, "assigned_on": "2024-01-10" });
    let (status, _) = send(&app, Method::POST, &checkout, Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, err) = send(&app, Method::POST, &checkout, Some(body.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"]["code"], "CONFLICT");

    let (_, overdue) = send(
        &app,
        Method::GET,
        "/api/territories/overdue?days=120&as_of=2024-06-01",
        None,
    )
    .await;
    let overdue = overdue.as_array().unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0]["days_out"], 143);

    let ret = format!("/api/territories/{}/return", id);
    let (status, entry) = send(&app, Method::POST, &ret, Some(json!({ "returned_on": "2024-06-01" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["returned_on"], "2024-06-01");

    let (status, _) = send(&app, Method::POST, &checkout, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, history) = send(&app, Method::GET, &format!("/api/territories/{}/history", id), None).await;
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_reports_and_service_year_totals() {
    let app = test_app().await;
    let member = create_member(&app, "Lena", "Brook", None).await;

    for (month, hours) in [("2024-09", 10), ("2025-01", 5)] {
        let body = json!({ "member_id": member, "month": month, "hours": hours, "bible_studies": 1 });
        let (status, _) = send(&app, Method::POST, "/api/reports", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, totals) = send(&app, Method::GET, "/api/reports/totals?service_year=2024", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(totals["label"], "2024/2025");
    assert_eq!(totals["totals"]["total_hours"], 15);
    assert_eq!(totals["months"].as_array().unwrap().len(), 12);

    let uri = format!("/api/reports/record/{}?service_year=2024", member);
    let (_, record) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(record["totals"]["hours"], 15);

    let (_, next_year) = send(&app, Method::GET, "/api/reports/totals?service_year=2025", None).await;
    assert_eq!(next_year["totals"]["total_hours"], 0);
}

#[tokio::test]
async fn test_finance_transactions_paginated() {
    let app = test_app().await;
    for day in 1..=3 {
        let body = json!({
            "date": format!("2024-09-0{}", day),
            "kind": "contribution",
            "category": "Worldwide work",
            "amount_cents": 1000,
        });
        let (status, _) = send(&app, Method::POST, "/api/finance/transactions", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = send(&app, Method::GET, "/api/finance/transactions?page=2&page_size=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);

    let (_, year) = send(&app, Method::GET, "/api/finance/service-year?service_year=2024", None).await;
    assert_eq!(year["total_contributions_cents"], 3000);
}

#[tokio::test]
async fn test_oversized_amount_rejected() {
    let app = test_app().await;
    let body = json!({
        "date": "2024-09-01",
        "kind": "contribution",
        "category": "Building",
        "amount_cents": 10_000_000_000_000_000i64,
    });
    let (status, error) = send(&app, Method::POST, "/api/finance/transactions", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["error"]["message"].as_str().unwrap().contains("amount_cents"));

    let (status, breakdown) = send(&app, Method::GET, "/api/finance/categories?kind=contribution", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(breakdown.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_distribution_repeated_territory_is_bad_request() {
    let app = test_app().await;
    let north = create_group(&app, "North").await;
    let south = create_group(&app, "South").await;
    let a = create_territory(&app, "1", 10).await;
    let b = create_territory(&app, "2", 10).await;

    let request = json!({ "strategy": "equal", "group_ids": [north, south], "territory_ids": [a, a, b] });
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/territories/distribution/apply",
        Some(request),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("more than once"));

    // Nothing was written
    let uri = format!("/api/territories?group_id={}", north);
    let (_, assigned) = send(&app, Method::GET, &uri, None).await;
    assert!(assigned.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_message_inbox_flow() {
    let app = test_app().await;
    let member = create_member(&app, "Mia", "Stone", None).await;

    let body = json!({ "audience": { "kind": "everyone" }, "subject": "Assembly", "body": "Saturday 9:30" });
    let (status, message) = send(&app, Method::POST, "/api/messages", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let message_id = message["id"].as_str().unwrap().to_string();

    let unread_uri = format!("/api/members/{}/unread", member);
    let (_, unread) = send(&app, Method::GET, &unread_uri, None).await;
    assert_eq!(unread["unread"], 1);

    let read_uri = format!("/api/messages/{}/read", message_id);
    let (status, _) = send(&app, Method::POST, &read_uri, Some(json!({ "member_id": member }))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, unread) = send(&app, Method::GET, &unread_uri, None).await;
    assert_eq!(unread["unread"], 0);
}

#[tokio::test]
async fn test_territory_csv_export() {
    let app = test_app().await;
    create_territory(&app, "10", 20).await;
    create_territory(&app, "2", 5).await;

    let (status, headers, body) = send_raw(&app, Method::GET, "/api/export/territories", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("territories.csv"));

    let text = String::from_utf8(body).unwrap();
    let lines: Vec<&str> = text.split("\r\n").collect();
    assert!(lines[0].starts_with("Number,Name,Group"));
    assert!(lines[1].starts_with("2,"));
    assert!(lines[2].starts_with("10,"));
}

#[tokio::test]
async fn test_settings_update() {
    let app = test_app().await;
    let (status, settings) = send(&app, Method::GET, "/api/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["territory_overdue_days"], 120);

    let update = json!({ "territory_overdue_days": 90, "congregation_name": "Riverside" });
    let (status, settings) = send(&app, Method::PUT, "/api/settings", Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["territory_overdue_days"], 90);
    assert_eq!(settings["congregation_name"], "Riverside");
    assert_eq!(settings["regular_pioneer_annual_goal"], 600);

    let (status, _) = send(&app, Method::PUT, "/api/settings", Some(json!({ "territory_overdue_days": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_file_database_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data").join("cgm.db");

    let db = cgm_common::db::init_database(&db_path).await.unwrap();
    let workbook = WorkbookClient::new(WorkbookConfig::default()).unwrap();
    let app = build_router(AppState::new(db.clone(), EventBus::new(16), workbook.clone()));
    create_group(&app, "West").await;
    db.close().await;

    let db = cgm_common::db::init_database(&db_path).await.unwrap();
    let app = build_router(AppState::new(db, EventBus::new(16), workbook));
    let (_, groups) = send(&app, Method::GET, "/api/groups", None).await;
    assert_eq!(groups[0]["name"], "West");
}
