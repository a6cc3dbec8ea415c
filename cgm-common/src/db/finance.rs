//! Contribution and expense database operations

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::models::{Transaction, TransactionInput, TransactionKind};
use crate::db::{format_date, parse_column, parse_stored_date, parse_uuid};
use crate::{Error, Result};

const TRANSACTION_COLUMNS: &str = "id, date, kind, category, amount_cents, description";

fn transaction_from_row(row: &SqliteRow) -> Result<Transaction> {
    let id: String = row.get("id");
    let date: String = row.get("date");
    let kind: String = row.get("kind");

    Ok(Transaction {
        id: parse_uuid("transactions.id", &id)?,
        date: parse_stored_date("transactions.date", &date)?,
        kind: parse_column("transactions.kind", &kind)?,
        category: row.get("category"),
        amount_cents: row.get("amount_cents"),
        description: row.get("description"),
    })
}

/// Optional filters for [`list_transactions`]; dates are inclusive
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub kind: Option<TransactionKind>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Transactions in date order
pub async fn list_transactions(pool: &SqlitePool, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM transactions
        WHERE (?1 IS NULL OR date >= ?1)
          AND (?2 IS NULL OR date <= ?2)
          AND (?3 IS NULL OR kind = ?3)
          AND (?4 IS NULL OR category = ?4)
        ORDER BY date, created_at
        "#,
        TRANSACTION_COLUMNS
    );

    let rows = sqlx::query(&sql)
        .bind(filter.from.map(format_date))
        .bind(filter.to.map(format_date))
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.category.as_deref())
        .fetch_all(pool)
        .await?;
    rows.iter().map(transaction_from_row).collect()
}

pub async fn get_transaction(pool: &SqlitePool, id: Uuid) -> Result<Transaction> {
    let sql = format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => transaction_from_row(&row),
        None => Err(Error::NotFound(format!("transaction {}", id))),
    }
}

pub async fn create_transaction(pool: &SqlitePool, input: TransactionInput) -> Result<Transaction> {
    input.validate()?;
    let transaction = Transaction {
        id: Uuid::new_v4(),
        date: input.date,
        kind: input.kind,
        category: input.category.trim().to_string(),
        amount_cents: input.amount_cents,
        description: input.description,
    };

    sqlx::query(
        "INSERT INTO transactions (id, date, kind, category, amount_cents, description) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(transaction.id.to_string())
    .bind(format_date(transaction.date))
    .bind(transaction.kind.as_str())
    .bind(&transaction.category)
    .bind(transaction.amount_cents)
    .bind(&transaction.description)
    .execute(pool)
    .await?;

    Ok(transaction)
}

pub async fn update_transaction(pool: &SqlitePool, id: Uuid, input: TransactionInput) -> Result<Transaction> {
    input.validate()?;
    get_transaction(pool, id).await?;

    sqlx::query(
        "UPDATE transactions SET date = ?, kind = ?, category = ?, amount_cents = ?, description = ? WHERE id = ?",
    )
    .bind(format_date(input.date))
    .bind(input.kind.as_str())
    .bind(input.category.trim())
    .bind(input.amount_cents)
    .bind(&input.description)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    get_transaction(pool, id).await
}

pub async fn delete_transaction(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("transaction {}", id)));
    }
    Ok(())
}

/// Distinct categories in use, alphabetical
pub async fn list_categories(pool: &SqlitePool) -> Result<Vec<String>> {
    let categories: Vec<String> = sqlx::query_scalar("SELECT DISTINCT category FROM transactions ORDER BY category")
        .fetch_all(pool)
        .await?;
    Ok(categories)
}
