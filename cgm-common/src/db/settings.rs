//! Settings database operations
//!
//! Key-value accessors over the `settings` table plus a typed snapshot
//! of every runtime setting.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::cleaning::DEFAULT_RESTOCK_FACTOR;
use crate::service_year::DEFAULT_REGULAR_PIONEER_ANNUAL_GOAL;
use crate::territory::DEFAULT_OVERDUE_DAYS;
use crate::{Error, Result};

pub const CONGREGATION_NAME: &str = "congregation_name";
pub const TERRITORY_OVERDUE_DAYS: &str = "territory_overdue_days";
pub const REGULAR_PIONEER_ANNUAL_GOAL: &str = "regular_pioneer_annual_goal";
pub const FINANCE_OPENING_BALANCE_CENTS: &str = "finance_opening_balance_cents";
pub const INVENTORY_RESTOCK_FACTOR: &str = "inventory_restock_factor";

/// Read and parse a setting; `None` if missing or NULL
pub async fn get_setting<T>(db: &SqlitePool, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value.flatten() {
        Some(value) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Setting '{}' has invalid value '{}': {}", key, value, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

pub async fn set_setting<T>(db: &SqlitePool, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

pub async fn get_territory_overdue_days(db: &SqlitePool) -> Result<i64> {
    get_setting(db, TERRITORY_OVERDUE_DAYS)
        .await
        .map(|opt| opt.unwrap_or(DEFAULT_OVERDUE_DAYS))
}

pub async fn get_regular_pioneer_annual_goal(db: &SqlitePool) -> Result<i64> {
    get_setting(db, REGULAR_PIONEER_ANNUAL_GOAL)
        .await
        .map(|opt| opt.unwrap_or(DEFAULT_REGULAR_PIONEER_ANNUAL_GOAL))
}

pub async fn get_finance_opening_balance_cents(db: &SqlitePool) -> Result<i64> {
    get_setting(db, FINANCE_OPENING_BALANCE_CENTS)
        .await
        .map(|opt| opt.unwrap_or(0))
}

pub async fn get_inventory_restock_factor(db: &SqlitePool) -> Result<i64> {
    get_setting(db, INVENTORY_RESTOCK_FACTOR)
        .await
        .map(|opt| opt.unwrap_or(DEFAULT_RESTOCK_FACTOR))
}

/// Every runtime setting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub congregation_name: String,
    pub territory_overdue_days: i64,
    pub regular_pioneer_annual_goal: i64,
    pub finance_opening_balance_cents: i64,
    pub inventory_restock_factor: i64,
}

pub async fn load_settings(db: &SqlitePool) -> Result<Settings> {
    Ok(Settings {
        congregation_name: get_setting(db, CONGREGATION_NAME).await?.unwrap_or_default(),
        territory_overdue_days: get_territory_overdue_days(db).await?,
        regular_pioneer_annual_goal: get_regular_pioneer_annual_goal(db).await?,
        finance_opening_balance_cents: get_finance_opening_balance_cents(db).await?,
        inventory_restock_factor: get_inventory_restock_factor(db).await?,
    })
}

/// Partial settings update; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub congregation_name: Option<String>,
    #[serde(default)]
    pub territory_overdue_days: Option<i64>,
    #[serde(default)]
    pub regular_pioneer_annual_goal: Option<i64>,
    #[serde(default)]
    pub finance_opening_balance_cents: Option<i64>,
    #[serde(default)]
    pub inventory_restock_factor: Option<i64>,
}

impl SettingsUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(days) = self.territory_overdue_days {
            if days < 1 {
                return Err(Error::InvalidInput(format!(
                    "territory_overdue_days must be at least 1 (got {})",
                    days
                )));
            }
        }
        if let Some(goal) = self.regular_pioneer_annual_goal {
            if goal < 0 {
                return Err(Error::InvalidInput(format!(
                    "regular_pioneer_annual_goal cannot be negative (got {})",
                    goal
                )));
            }
        }
        if let Some(factor) = self.inventory_restock_factor {
            if factor < 1 {
                return Err(Error::InvalidInput(format!(
                    "inventory_restock_factor must be at least 1 (got {})",
                    factor
                )));
            }
        }
        Ok(())
    }
}

/// Validate and write `update` in one transaction, returning the new snapshot
pub async fn update_settings(db: &SqlitePool, update: SettingsUpdate) -> Result<Settings> {
    update.validate()?;

    let mut pairs: Vec<(&str, String)> = Vec::new();
    if let Some(name) = update.congregation_name {
        pairs.push((CONGREGATION_NAME, name.trim().to_string()));
    }
    if let Some(days) = update.territory_overdue_days {
        pairs.push((TERRITORY_OVERDUE_DAYS, days.to_string()));
    }
    if let Some(goal) = update.regular_pioneer_annual_goal {
        pairs.push((REGULAR_PIONEER_ANNUAL_GOAL, goal.to_string()));
    }
    if let Some(cents) = update.finance_opening_balance_cents {
        pairs.push((FINANCE_OPENING_BALANCE_CENTS, cents.to_string()));
    }
    if let Some(factor) = update.inventory_restock_factor {
        pairs.push((INVENTORY_RESTOCK_FACTOR, factor.to_string()));
    }

    let mut tx = db.begin().await?;
    for (key, value) in pairs {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    load_settings(db).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;

    #[tokio::test]
    async fn test_defaults_after_init() {
        let pool = init_memory_database().await.unwrap();
        let settings = load_settings(&pool).await.unwrap();
        assert_eq!(settings.congregation_name, "");
        assert_eq!(settings.territory_overdue_days, 120);
        assert_eq!(settings.regular_pioneer_annual_goal, 600);
        assert_eq!(settings.finance_opening_balance_cents, 0);
        assert_eq!(settings.inventory_restock_factor, 2);
    }

    #[tokio::test]
    async fn test_update_settings_partial() {
        let pool = init_memory_database().await.unwrap();
        let updated = update_settings(
            &pool,
            SettingsUpdate {
                congregation_name: Some("  Riverside ".to_string()),
                territory_overdue_days: Some(90),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.congregation_name, "Riverside");
        assert_eq!(updated.territory_overdue_days, 90);
        assert_eq!(updated.regular_pioneer_annual_goal, 600);
    }

    #[tokio::test]
    async fn test_update_settings_rejects_invalid_values() {
        let pool = init_memory_database().await.unwrap();
        let result = update_settings(
            &pool,
            SettingsUpdate {
                congregation_name: Some("Hilltop".to_string()),
                inventory_restock_factor: Some(0),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        // Nothing written
        let settings = load_settings(&pool).await.unwrap();
        assert_eq!(settings.congregation_name, "");
    }

    #[tokio::test]
    async fn test_unparseable_setting_is_config_error() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, TERRITORY_OVERDUE_DAYS, "soon").await.unwrap();
        assert!(matches!(
            get_territory_overdue_days(&pool).await,
            Err(Error::Config(_))
        ));
    }
}
