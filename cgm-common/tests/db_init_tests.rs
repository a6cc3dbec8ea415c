//! Database initialization against a real file
//!
//! Covers first-run creation, reopening an existing database and the
//! default settings seeded on startup.

use cgm_common::db::init_database;
use cgm_common::db::settings::{load_settings, set_setting, TERRITORY_OVERDUE_DAYS};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_created_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("cgm.db");
    assert!(!db_path.exists());

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing_and_keeps_settings() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("cgm.db");

    let pool = init_database(&db_path).await.unwrap();
    set_setting(&pool, TERRITORY_OVERDUE_DAYS, 90).await.unwrap();
    pool.close().await;

    // Second startup must not reset user-changed values
    let pool = init_database(&db_path).await.unwrap();
    let settings = load_settings(&pool).await.unwrap();
    assert_eq!(settings.territory_overdue_days, 90);
}

#[tokio::test]
async fn test_default_settings_initialized() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("cgm.db")).await.unwrap();

    let settings = load_settings(&pool).await.unwrap();
    assert_eq!(settings.congregation_name, "");
    assert_eq!(settings.territory_overdue_days, 120);
    assert_eq!(settings.regular_pioneer_annual_goal, 600);
    assert_eq!(settings.finance_opening_balance_cents, 0);
    assert_eq!(settings.inventory_restock_factor, 2);
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("cgm.db")).await.unwrap();

    let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(enabled, 1);
}
