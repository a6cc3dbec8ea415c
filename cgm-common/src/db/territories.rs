//! Territory database operations
//!
//! CRUD, division into sub-territories, applying distribution plans and
//! the check-out history.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::members::{get_group, get_member, list_groups};
use crate::db::models::{Territory, TerritoryAssignment, TerritoryInput};
use crate::db::{
    format_date, format_opt_date, opt_uuid_text, parse_opt_stored_date, parse_opt_uuid, parse_stored_date,
    parse_uuid,
};
use crate::territory::{compare_numbers, distribute, divide, is_overdue, validate_return, DistributionPlan, DistributionStrategy};
use crate::time::days_between;
use crate::{Error, Result};

const TERRITORY_COLUMNS: &str = "id, number, name, boundaries, difficulty, size, group_id, parent_id, notes";
const HISTORY_COLUMNS: &str = "id, territory_id, group_id, member_id, assigned_on, returned_on";

fn territory_from_row(row: &SqliteRow) -> Result<Territory> {
    let id: String = row.get("id");
    Ok(Territory {
        id: parse_uuid("territories.id", &id)?,
        number: row.get("number"),
        name: row.get("name"),
        boundaries: row.get("boundaries"),
        difficulty: row.get("difficulty"),
        size: row.get("size"),
        group_id: parse_opt_uuid("territories.group_id", row.get("group_id"))?,
        parent_id: parse_opt_uuid("territories.parent_id", row.get("parent_id"))?,
        notes: row.get("notes"),
    })
}

fn history_from_row(row: &SqliteRow) -> Result<TerritoryAssignment> {
    let id: String = row.get("id");
    let territory_id: String = row.get("territory_id");
    let assigned_on: String = row.get("assigned_on");

    Ok(TerritoryAssignment {
        id: parse_uuid("territory_assignments.id", &id)?,
        territory_id: parse_uuid("territory_assignments.territory_id", &territory_id)?,
        group_id: parse_opt_uuid("territory_assignments.group_id", row.get("group_id"))?,
        member_id: parse_opt_uuid("territory_assignments.member_id", row.get("member_id"))?,
        assigned_on: parse_stored_date("territory_assignments.assigned_on", &assigned_on)?,
        returned_on: parse_opt_stored_date("territory_assignments.returned_on", row.get("returned_on"))?,
    })
}

fn unknown(e: Error) -> Error {
    match e {
        Error::NotFound(what) => Error::InvalidInput(format!("unknown {}", what)),
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Territories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TerritoryFilter {
    #[serde(default)]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

/// Territories in natural number order ("2" before "10", "4-1" after "4")
pub async fn list_territories(pool: &SqlitePool, filter: &TerritoryFilter) -> Result<Vec<Territory>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM territories
        WHERE (?1 IS NULL OR group_id = ?1)
          AND (?2 IS NULL OR parent_id = ?2)
        "#,
        TERRITORY_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(opt_uuid_text(filter.group_id))
        .bind(opt_uuid_text(filter.parent_id))
        .fetch_all(pool)
        .await?;

    let mut territories = rows.iter().map(territory_from_row).collect::<Result<Vec<_>>>()?;
    territories.sort_by(|a, b| compare_numbers(&a.number, &b.number));
    Ok(territories)
}

pub async fn get_territory(pool: &SqlitePool, id: Uuid) -> Result<Territory> {
    let sql = format!("SELECT {} FROM territories WHERE id = ?", TERRITORY_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => territory_from_row(&row),
        None => Err(Error::NotFound(format!("territory {}", id))),
    }
}

async fn number_taken(pool: &SqlitePool, number: &str, except: Option<Uuid>) -> Result<bool> {
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM territories WHERE number = ? AND id IS NOT ?)",
    )
    .bind(number)
    .bind(opt_uuid_text(except))
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

pub async fn create_territory(pool: &SqlitePool, input: TerritoryInput) -> Result<Territory> {
    input.validate()?;
    let number = input.number.trim().to_string();
    if number_taken(pool, &number, None).await? {
        return Err(Error::Conflict(format!("territory number '{}' is already used", number)));
    }
    if let Some(group_id) = input.group_id {
        get_group(pool, group_id).await.map_err(unknown)?;
    }

    let territory = Territory {
        id: Uuid::new_v4(),
        number,
        name: input.name.trim().to_string(),
        boundaries: input.boundaries,
        difficulty: input.difficulty,
        size: input.size,
        group_id: input.group_id,
        parent_id: None,
        notes: input.notes,
    };
    insert_territory(pool, &territory).await?;
    Ok(territory)
}

async fn insert_territory<'e, E>(executor: E, territory: &Territory) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO territories (
            id, number, name, boundaries, difficulty, size, group_id, parent_id, notes
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(territory.id.to_string())
    .bind(&territory.number)
    .bind(&territory.name)
    .bind(&territory.boundaries)
    .bind(territory.difficulty)
    .bind(territory.size)
    .bind(opt_uuid_text(territory.group_id))
    .bind(opt_uuid_text(territory.parent_id))
    .bind(&territory.notes)
    .execute(executor)
    .await?;
    Ok(())
}

/// Replace the editable fields; `parent_id` is kept
pub async fn update_territory(pool: &SqlitePool, id: Uuid, input: TerritoryInput) -> Result<Territory> {
    input.validate()?;
    get_territory(pool, id).await?;
    let number = input.number.trim().to_string();
    if number_taken(pool, &number, Some(id)).await? {
        return Err(Error::Conflict(format!("territory number '{}' is already used", number)));
    }
    if let Some(group_id) = input.group_id {
        get_group(pool, group_id).await.map_err(unknown)?;
    }

    sqlx::query(
        r#"
        UPDATE territories
        SET number = ?, name = ?, boundaries = ?, difficulty = ?, size = ?, group_id = ?,
            notes = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(&number)
    .bind(input.name.trim())
    .bind(&input.boundaries)
    .bind(input.difficulty)
    .bind(input.size)
    .bind(opt_uuid_text(input.group_id))
    .bind(&input.notes)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    get_territory(pool, id).await
}

/// Sub-territories become standalone; check-out history is deleted
pub async fn delete_territory(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM territories WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("territory {}", id)));
    }
    Ok(())
}

/// Split a territory into `parts` new sub-territories in one transaction
///
/// The original stays as the parent record.
pub async fn divide_territory(pool: &SqlitePool, id: Uuid, parts: usize) -> Result<Vec<Territory>> {
    let parent = get_territory(pool, id).await?;
    let children = divide(&parent, parts)?;

    for child in &children {
        if number_taken(pool, &child.number, None).await? {
            return Err(Error::Conflict(format!(
                "territory {} cannot be divided: number '{}' is already used",
                parent.number, child.number
            )));
        }
    }

    let mut tx = pool.begin().await?;
    for child in &children {
        insert_territory(&mut *tx, child).await?;
    }
    tx.commit().await?;

    tracing::info!("Divided territory {} into {} parts", parent.number, parts);
    Ok(children)
}

/// What to distribute and to whom
#[derive(Debug, Clone, Deserialize)]
pub struct DistributionRequest {
    pub strategy: DistributionStrategy,
    /// Receiving groups in tie-break order; empty means every group by name
    #[serde(default)]
    pub group_ids: Vec<Uuid>,
    /// Territories to hand out; absent means every territory that has not
    /// been divided
    #[serde(default)]
    pub territory_ids: Option<Vec<Uuid>>,
}

/// Compute a plan without writing anything
pub async fn plan_distribution(pool: &SqlitePool, request: &DistributionRequest) -> Result<DistributionPlan> {
    let group_ids = if request.group_ids.is_empty() {
        list_groups(pool).await?.into_iter().map(|g| g.id).collect()
    } else {
        for id in &request.group_ids {
            get_group(pool, *id).await.map_err(unknown)?;
        }
        request.group_ids.clone()
    };

    let territories = match &request.territory_ids {
        Some(ids) => {
            let mut seen = HashSet::new();
            if let Some(repeated) = ids.iter().find(|id| !seen.insert(**id)) {
                return Err(Error::InvalidInput(format!(
                    "territory {} listed more than once",
                    repeated
                )));
            }
            let mut selected = Vec::with_capacity(ids.len());
            for id in ids {
                selected.push(get_territory(pool, *id).await.map_err(unknown)?);
            }
            selected
        }
        None => {
            let all = list_territories(pool, &TerritoryFilter::default()).await?;
            let divided: HashSet<Uuid> = all.iter().filter_map(|t| t.parent_id).collect();
            all.into_iter().filter(|t| !divided.contains(&t.id)).collect()
        }
    };

    distribute(&territories, &group_ids, request.strategy)
}

/// Write every allocation's group in one transaction
pub async fn apply_distribution(pool: &SqlitePool, plan: &DistributionPlan) -> Result<()> {
    let mut tx = pool.begin().await?;
    for allocation in &plan.allocations {
        let result = sqlx::query(
            "UPDATE territories SET group_id = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(allocation.group_id.to_string())
        .bind(allocation.territory_id.to_string())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            // Dropping tx rolls back
            return Err(Error::NotFound(format!("territory {}", allocation.territory_id)));
        }
    }
    tx.commit().await?;

    tracing::info!(
        "Applied {:?} distribution of {} territories",
        plan.strategy,
        plan.allocations.len()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Check-out history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub member_id: Option<Uuid>,
    pub assigned_on: NaiveDate,
}

async fn open_entry(pool: &SqlitePool, territory_id: Uuid) -> Result<Option<TerritoryAssignment>> {
    let sql = format!(
        "SELECT {} FROM territory_assignments WHERE territory_id = ? AND returned_on IS NULL",
        HISTORY_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(territory_id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(history_from_row).transpose()
}

/// Record a check-out; a territory can only be out once at a time
pub async fn checkout_territory(
    pool: &SqlitePool,
    territory_id: Uuid,
    request: CheckoutRequest,
) -> Result<TerritoryAssignment> {
    let territory = get_territory(pool, territory_id).await?;
    if request.group_id.is_none() && request.member_id.is_none() {
        return Err(Error::InvalidInput(
            "a check-out needs a group or a member".to_string(),
        ));
    }
    if let Some(group_id) = request.group_id {
        get_group(pool, group_id).await.map_err(unknown)?;
    }
    if let Some(member_id) = request.member_id {
        get_member(pool, member_id).await.map_err(unknown)?;
    }
    if open_entry(pool, territory_id).await?.is_some() {
        return Err(Error::Conflict(format!(
            "territory {} is already checked out",
            territory.number
        )));
    }

    let entry = TerritoryAssignment {
        id: Uuid::new_v4(),
        territory_id,
        group_id: request.group_id,
        member_id: request.member_id,
        assigned_on: request.assigned_on,
        returned_on: None,
    };

    let insert = sqlx::query(
        r#"
        INSERT INTO territory_assignments (id, territory_id, group_id, member_id, assigned_on)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.territory_id.to_string())
    .bind(opt_uuid_text(entry.group_id))
    .bind(opt_uuid_text(entry.member_id))
    .bind(format_date(entry.assigned_on))
    .execute(pool)
    .await;

    match insert {
        Ok(_) => Ok(entry),
        // Lost a race with another check-out of the same territory
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(Error::Conflict(format!(
            "territory {} is already checked out",
            territory.number
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Close the open check-out of a territory
pub async fn return_territory(
    pool: &SqlitePool,
    territory_id: Uuid,
    returned_on: NaiveDate,
) -> Result<TerritoryAssignment> {
    let territory = get_territory(pool, territory_id).await?;
    let mut entry = open_entry(pool, territory_id).await?.ok_or_else(|| {
        Error::Conflict(format!("territory {} is not checked out", territory.number))
    })?;
    validate_return(&entry, returned_on)?;

    sqlx::query("UPDATE territory_assignments SET returned_on = ? WHERE id = ?")
        .bind(format_opt_date(Some(returned_on)))
        .bind(entry.id.to_string())
        .execute(pool)
        .await?;

    entry.returned_on = Some(returned_on);
    Ok(entry)
}

/// Check-out history of one territory, newest first
pub async fn territory_history(pool: &SqlitePool, territory_id: Uuid) -> Result<Vec<TerritoryAssignment>> {
    get_territory(pool, territory_id).await?;
    let sql = format!(
        "SELECT {} FROM territory_assignments WHERE territory_id = ? ORDER BY assigned_on DESC, rowid DESC",
        HISTORY_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(territory_id.to_string())
        .fetch_all(pool)
        .await?;
    rows.iter().map(history_from_row).collect()
}

/// A checked-out territory past the overdue limit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverdueTerritory {
    pub territory: Territory,
    pub assignment: TerritoryAssignment,
    pub days_out: i64,
}

/// Open check-outs older than `overdue_days` as of `today`, longest out first
pub async fn overdue_territories(
    pool: &SqlitePool,
    today: NaiveDate,
    overdue_days: i64,
) -> Result<Vec<OverdueTerritory>> {
    let sql = format!(
        "SELECT {} FROM territory_assignments WHERE returned_on IS NULL ORDER BY assigned_on",
        HISTORY_COLUMNS
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    let mut overdue = Vec::new();
    for row in &rows {
        let assignment = history_from_row(row)?;
        if !is_overdue(&assignment, today, overdue_days) {
            continue;
        }
        let territory = get_territory(pool, assignment.territory_id).await?;
        overdue.push(OverdueTerritory {
            days_out: days_between(assignment.assigned_on, today),
            territory,
            assignment,
        });
    }
    Ok(overdue)
}
