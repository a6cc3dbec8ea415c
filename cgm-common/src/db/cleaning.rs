//! Cleaning task and inventory database operations

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::cleaning::{adjusted_quantity, check_transition, rotation, stock_level, StockLevel};
use crate::db::members::get_group;
use crate::db::models::{CleaningTask, CleaningTaskInput, InventoryItem, InventoryItemInput, TaskStatus};
use crate::db::{format_date, format_timestamp, opt_uuid_text, parse_column, parse_opt_uuid, parse_stored_date, parse_timestamp, parse_uuid};
use crate::time::week_start;
use crate::{Error, Result};

const TASK_COLUMNS: &str = "id, area, group_id, week_of, status, notes, completed_at";

fn task_from_row(row: &SqliteRow) -> Result<CleaningTask> {
    let id: String = row.get("id");
    let week_of: String = row.get("week_of");
    let status: String = row.get("status");
    let completed_at: Option<String> = row.get("completed_at");

    Ok(CleaningTask {
        id: parse_uuid("cleaning_tasks.id", &id)?,
        area: row.get("area"),
        group_id: parse_opt_uuid("cleaning_tasks.group_id", row.get("group_id"))?,
        week_of: parse_stored_date("cleaning_tasks.week_of", &week_of)?,
        status: parse_column("cleaning_tasks.status", &status)?,
        notes: row.get("notes"),
        completed_at: completed_at
            .map(|v| parse_timestamp("cleaning_tasks.completed_at", &v))
            .transpose()?,
    })
}

fn item_from_row(row: &SqliteRow) -> Result<InventoryItem> {
    let id: String = row.get("id");
    Ok(InventoryItem {
        id: parse_uuid("inventory_items.id", &id)?,
        name: row.get("name"),
        category: row.get("category"),
        quantity: row.get("quantity"),
        min_threshold: row.get("min_threshold"),
        unit: row.get("unit"),
    })
}

async fn check_group(pool: &SqlitePool, group_id: Option<Uuid>) -> Result<()> {
    if let Some(group_id) = group_id {
        get_group(pool, group_id).await.map_err(|e| match e {
            Error::NotFound(what) => Error::InvalidInput(format!("unknown {}", what)),
            other => other,
        })?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Cleaning tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

pub async fn list_tasks(pool: &SqlitePool, filter: &TaskFilter) -> Result<Vec<CleaningTask>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM cleaning_tasks
        WHERE (?1 IS NULL OR week_of >= ?1)
          AND (?2 IS NULL OR week_of <= ?2)
          AND (?3 IS NULL OR group_id = ?3)
          AND (?4 IS NULL OR status = ?4)
        ORDER BY week_of, area
        "#,
        TASK_COLUMNS
    );

    let rows = sqlx::query(&sql)
        .bind(filter.from.map(|d| format_date(week_start(d))))
        .bind(filter.to.map(format_date))
        .bind(opt_uuid_text(filter.group_id))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(pool)
        .await?;
    rows.iter().map(task_from_row).collect()
}

pub async fn get_task(pool: &SqlitePool, id: Uuid) -> Result<CleaningTask> {
    let sql = format!("SELECT {} FROM cleaning_tasks WHERE id = ?", TASK_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => task_from_row(&row),
        None => Err(Error::NotFound(format!("cleaning task {}", id))),
    }
}

/// New tasks start out pending
pub async fn create_task(pool: &SqlitePool, input: CleaningTaskInput) -> Result<CleaningTask> {
    input.validate()?;
    check_group(pool, input.group_id).await?;

    let task = CleaningTask {
        id: Uuid::new_v4(),
        area: input.area.trim().to_string(),
        group_id: input.group_id,
        week_of: week_start(input.week_of),
        status: TaskStatus::Pending,
        notes: input.notes,
        completed_at: None,
    };

    sqlx::query(
        "INSERT INTO cleaning_tasks (id, area, group_id, week_of, status, notes) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(task.id.to_string())
    .bind(&task.area)
    .bind(opt_uuid_text(task.group_id))
    .bind(format_date(task.week_of))
    .bind(task.status.as_str())
    .bind(&task.notes)
    .execute(pool)
    .await?;

    Ok(task)
}

/// Edit area, group, week and notes; status has its own operation
pub async fn update_task(pool: &SqlitePool, id: Uuid, input: CleaningTaskInput) -> Result<CleaningTask> {
    input.validate()?;
    get_task(pool, id).await?;
    check_group(pool, input.group_id).await?;

    sqlx::query("UPDATE cleaning_tasks SET area = ?, group_id = ?, week_of = ?, notes = ? WHERE id = ?")
        .bind(input.area.trim())
        .bind(opt_uuid_text(input.group_id))
        .bind(format_date(week_start(input.week_of)))
        .bind(&input.notes)
        .bind(id.to_string())
        .execute(pool)
        .await?;

    get_task(pool, id).await
}

/// Move a task to `status`
///
/// Completing stamps `completed_at` with `at`; leaving completed clears it.
pub async fn set_task_status(
    pool: &SqlitePool,
    id: Uuid,
    status: TaskStatus,
    at: DateTime<Utc>,
) -> Result<CleaningTask> {
    let task = get_task(pool, id).await?;
    check_transition(task.status, status)?;

    let completed_at = if status == TaskStatus::Completed {
        Some(format_timestamp(at))
    } else {
        None
    };

    sqlx::query("UPDATE cleaning_tasks SET status = ?, completed_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(completed_at)
        .bind(id.to_string())
        .execute(pool)
        .await?;

    get_task(pool, id).await
}

pub async fn delete_task(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM cleaning_tasks WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("cleaning task {}", id)));
    }
    Ok(())
}

/// Request body for generating a rotation
#[derive(Debug, Clone, Deserialize)]
pub struct RotationRequest {
    pub area: String,
    pub group_ids: Vec<Uuid>,
    pub start: NaiveDate,
    pub weeks: usize,
}

/// One pending task per week for `area`, groups taking turns
pub async fn create_rotation(pool: &SqlitePool, request: RotationRequest) -> Result<Vec<CleaningTask>> {
    let area = request.area.trim().to_string();
    if area.is_empty() {
        return Err(Error::InvalidInput("area is required".to_string()));
    }
    for group_id in &request.group_ids {
        check_group(pool, Some(*group_id)).await?;
    }
    let slots = rotation(&request.group_ids, request.start, request.weeks)?;

    let tasks: Vec<CleaningTask> = slots
        .into_iter()
        .map(|slot| CleaningTask {
            id: Uuid::new_v4(),
            area: area.clone(),
            group_id: Some(slot.group_id),
            week_of: slot.week_of,
            status: TaskStatus::Pending,
            notes: None,
            completed_at: None,
        })
        .collect();

    let mut tx = pool.begin().await?;
    for task in &tasks {
        sqlx::query(
            "INSERT INTO cleaning_tasks (id, area, group_id, week_of, status) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(task.id.to_string())
        .bind(&task.area)
        .bind(opt_uuid_text(task.group_id))
        .bind(format_date(task.week_of))
        .bind(task.status.as_str())
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!("Created {}-week cleaning rotation for {}", tasks.len(), area);
    Ok(tasks)
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

pub async fn list_items(pool: &SqlitePool) -> Result<Vec<InventoryItem>> {
    let rows = sqlx::query(
        "SELECT id, name, category, quantity, min_threshold, unit FROM inventory_items ORDER BY category, name",
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(item_from_row).collect()
}

pub async fn get_item(pool: &SqlitePool, id: Uuid) -> Result<InventoryItem> {
    let row = sqlx::query(
        "SELECT id, name, category, quantity, min_threshold, unit FROM inventory_items WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => item_from_row(&row),
        None => Err(Error::NotFound(format!("inventory item {}", id))),
    }
}

async fn item_name_taken(pool: &SqlitePool, name: &str, except: Option<Uuid>) -> Result<bool> {
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM inventory_items WHERE name = ? AND id IS NOT ?)",
    )
    .bind(name)
    .bind(opt_uuid_text(except))
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

pub async fn create_item(pool: &SqlitePool, input: InventoryItemInput) -> Result<InventoryItem> {
    input.validate()?;
    let name = input.name.trim().to_string();
    if item_name_taken(pool, &name, None).await? {
        return Err(Error::Conflict(format!("inventory item '{}' already exists", name)));
    }

    let item = InventoryItem {
        id: Uuid::new_v4(),
        name,
        category: input.category.trim().to_string(),
        quantity: input.quantity,
        min_threshold: input.min_threshold,
        unit: input.unit.trim().to_string(),
    };

    sqlx::query(
        "INSERT INTO inventory_items (id, name, category, quantity, min_threshold, unit) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(item.id.to_string())
    .bind(&item.name)
    .bind(&item.category)
    .bind(item.quantity)
    .bind(item.min_threshold)
    .bind(&item.unit)
    .execute(pool)
    .await?;

    Ok(item)
}

pub async fn update_item(pool: &SqlitePool, id: Uuid, input: InventoryItemInput) -> Result<InventoryItem> {
    input.validate()?;
    get_item(pool, id).await?;
    let name = input.name.trim().to_string();
    if item_name_taken(pool, &name, Some(id)).await? {
        return Err(Error::Conflict(format!("inventory item '{}' already exists", name)));
    }

    sqlx::query(
        r#"
        UPDATE inventory_items
        SET name = ?, category = ?, quantity = ?, min_threshold = ?, unit = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(&name)
    .bind(input.category.trim())
    .bind(input.quantity)
    .bind(input.min_threshold)
    .bind(input.unit.trim())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    get_item(pool, id).await
}

pub async fn delete_item(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM inventory_items WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("inventory item {}", id)));
    }
    Ok(())
}

/// Result of a stock adjustment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockAdjustment {
    pub item: InventoryItem,
    pub previous_level: StockLevel,
    pub level: StockLevel,
}

impl StockAdjustment {
    /// Stock went from ok to low/out, or from low to out
    pub fn dropped(&self) -> bool {
        let rank = |level: StockLevel| match level {
            StockLevel::Ok => 0,
            StockLevel::Low => 1,
            StockLevel::Out => 2,
        };
        rank(self.level) > rank(self.previous_level)
    }
}

/// Add `delta` (negative to consume) to an item's quantity
pub async fn adjust_quantity(pool: &SqlitePool, id: Uuid, delta: i64) -> Result<StockAdjustment> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        "SELECT id, name, category, quantity, min_threshold, unit FROM inventory_items WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&mut *tx)
    .await?;
    let mut item = match row {
        Some(row) => item_from_row(&row)?,
        None => return Err(Error::NotFound(format!("inventory item {}", id))),
    };

    let previous_level = stock_level(&item);
    item.quantity = adjusted_quantity(&item, delta)?;

    sqlx::query("UPDATE inventory_items SET quantity = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(item.quantity)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let level = stock_level(&item);
    Ok(StockAdjustment {
        item,
        previous_level,
        level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;
    use crate::db::members::create_group;
    use crate::db::models::GroupInput;

    async fn group(pool: &SqlitePool, name: &str) -> Uuid {
        create_group(
            pool,
            GroupInput {
                name: name.to_string(),
                overseer_id: None,
                assistant_id: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    fn soap(quantity: i64) -> InventoryItemInput {
        InventoryItemInput {
            name: "Hand soap".to_string(),
            category: "Restroom".to_string(),
            quantity,
            min_threshold: 3,
            unit: "bottles".to_string(),
        }
    }

    #[tokio::test]
    async fn test_task_status_lifecycle() {
        let pool = init_memory_database().await.unwrap();
        let task = create_task(
            &pool,
            CleaningTaskInput {
                area: "Main hall".to_string(),
                group_id: None,
                week_of: NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(),
                notes: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.week_of, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());

        let done = set_task_status(&pool, task.id, TaskStatus::Completed, Utc::now())
            .await
            .unwrap();
        assert!(done.completed_at.is_some());

        assert!(matches!(
            set_task_status(&pool, task.id, TaskStatus::Skipped, Utc::now()).await,
            Err(Error::InvalidInput(_))
        ));

        let reopened = set_task_status(&pool, task.id, TaskStatus::Pending, Utc::now())
            .await
            .unwrap();
        assert_eq!(reopened.completed_at, None);
    }

    #[tokio::test]
    async fn test_rotation_persists_round_robin() {
        let pool = init_memory_database().await.unwrap();
        let a = group(&pool, "A").await;
        let b = group(&pool, "B").await;

        let tasks = create_rotation(
            &pool,
            RotationRequest {
                area: "Restrooms".to_string(),
                group_ids: vec![a, b],
                start: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
                weeks: 5,
            },
        )
        .await
        .unwrap();
        assert_eq!(tasks.len(), 5);

        let for_b = list_tasks(
            &pool,
            &TaskFilter {
                group_id: Some(b),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(for_b.len(), 2);
        assert_eq!(for_b[0].week_of, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
    }

    #[tokio::test]
    async fn test_adjust_quantity_reports_drop() {
        let pool = init_memory_database().await.unwrap();
        let item = create_item(&pool, soap(5)).await.unwrap();

        let used = adjust_quantity(&pool, item.id, -2).await.unwrap();
        assert_eq!(used.item.quantity, 3);
        assert_eq!(used.level, StockLevel::Low);
        assert!(used.dropped());

        let restocked = adjust_quantity(&pool, item.id, 10).await.unwrap();
        assert!(!restocked.dropped());
        assert_eq!(restocked.level, StockLevel::Ok);

        assert!(matches!(
            adjust_quantity(&pool, item.id, -100).await,
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(get_item(&pool, item.id).await.unwrap().quantity, 13);
    }

    #[tokio::test]
    async fn test_item_names_unique() {
        let pool = init_memory_database().await.unwrap();
        create_item(&pool, soap(1)).await.unwrap();
        assert!(matches!(create_item(&pool, soap(2)).await, Err(Error::Conflict(_))));
    }
}
