//! Meeting assignment database operations
//!
//! Eligibility is checked here against the stored members before any write,
//! so callers cannot bypass the rules in [`crate::meetings`].

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::members::get_member;
use crate::db::models::{Assignment, AssignmentInput, AssignmentType, MeetingType};
use crate::db::{format_date, opt_uuid_text, parse_column, parse_opt_uuid, parse_stored_date, parse_uuid};
use crate::meetings::validate_assignment;
use crate::time::week_start;
use crate::{Error, Result};

const ASSIGNMENT_COLUMNS: &str =
    "id, week_of, meeting_type, assignment_type, assignee_id, assistant_id, title, notes";

fn assignment_from_row(row: &SqliteRow) -> Result<Assignment> {
    let id: String = row.get("id");
    let week_of: String = row.get("week_of");
    let meeting_type: String = row.get("meeting_type");
    let assignment_type: String = row.get("assignment_type");
    let assignee_id: String = row.get("assignee_id");

    Ok(Assignment {
        id: parse_uuid("assignments.id", &id)?,
        week_of: parse_stored_date("assignments.week_of", &week_of)?,
        meeting_type: parse_column("assignments.meeting_type", &meeting_type)?,
        assignment_type: parse_column("assignments.assignment_type", &assignment_type)?,
        assignee_id: parse_uuid("assignments.assignee_id", &assignee_id)?,
        assistant_id: parse_opt_uuid("assignments.assistant_id", row.get("assistant_id"))?,
        title: row.get("title"),
        notes: row.get("notes"),
    })
}

/// Optional filters for [`list_assignments`]; dates are inclusive
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentFilter {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub member_id: Option<Uuid>,
    #[serde(default)]
    pub meeting_type: Option<MeetingType>,
}

/// Assignments ordered by week, meeting, then type
pub async fn list_assignments(pool: &SqlitePool, filter: &AssignmentFilter) -> Result<Vec<Assignment>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM assignments
        WHERE (?1 IS NULL OR week_of >= ?1)
          AND (?2 IS NULL OR week_of <= ?2)
          AND (?3 IS NULL OR assignee_id = ?3 OR assistant_id = ?3)
          AND (?4 IS NULL OR meeting_type = ?4)
        ORDER BY week_of, meeting_type, assignment_type, created_at
        "#,
        ASSIGNMENT_COLUMNS
    );

    let rows = sqlx::query(&sql)
        .bind(filter.from.map(|d| format_date(week_start(d))))
        .bind(filter.to.map(format_date))
        .bind(opt_uuid_text(filter.member_id))
        .bind(filter.meeting_type.map(|m| m.as_str()))
        .fetch_all(pool)
        .await?;
    rows.iter().map(assignment_from_row).collect()
}

/// Every assignment in the week containing `date`
pub async fn list_week(pool: &SqlitePool, date: NaiveDate) -> Result<Vec<Assignment>> {
    let monday = week_start(date);
    list_assignments(
        pool,
        &AssignmentFilter {
            from: Some(monday),
            to: Some(monday),
            ..Default::default()
        },
    )
    .await
}

pub async fn get_assignment(pool: &SqlitePool, id: Uuid) -> Result<Assignment> {
    let sql = format!("SELECT {} FROM assignments WHERE id = ?", ASSIGNMENT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => assignment_from_row(&row),
        None => Err(Error::NotFound(format!("assignment {}", id))),
    }
}

async fn check_input(pool: &SqlitePool, input: &AssignmentInput) -> Result<()> {
    let unknown = |e: Error| match e {
        Error::NotFound(what) => Error::InvalidInput(format!("unknown {}", what)),
        other => other,
    };

    let assignee = get_member(pool, input.assignee_id).await.map_err(unknown)?;
    let assistant = match input.assistant_id {
        Some(id) => Some(get_member(pool, id).await.map_err(unknown)?),
        None => None,
    };

    validate_assignment(input, &assignee, assistant.as_ref())
}

fn normalized(id: Uuid, input: AssignmentInput) -> Assignment {
    Assignment {
        id,
        week_of: week_start(input.week_of),
        meeting_type: input.meeting_type,
        assignment_type: input.assignment_type,
        assignee_id: input.assignee_id,
        assistant_id: input.assistant_id,
        title: input.title.filter(|t| !t.trim().is_empty()),
        notes: input.notes,
    }
}

pub async fn create_assignment(pool: &SqlitePool, input: AssignmentInput) -> Result<Assignment> {
    check_input(pool, &input).await?;
    if input.force {
        tracing::info!(
            "Saving {} for member {} with eligibility override",
            input.assignment_type,
            input.assignee_id
        );
    }

    let assignment = normalized(Uuid::new_v4(), input);
    sqlx::query(
        r#"
        INSERT INTO assignments (
            id, week_of, meeting_type, assignment_type, assignee_id, assistant_id, title, notes
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(assignment.id.to_string())
    .bind(format_date(assignment.week_of))
    .bind(assignment.meeting_type.as_str())
    .bind(assignment.assignment_type.as_str())
    .bind(assignment.assignee_id.to_string())
    .bind(opt_uuid_text(assignment.assistant_id))
    .bind(&assignment.title)
    .bind(&assignment.notes)
    .execute(pool)
    .await?;

    Ok(assignment)
}

pub async fn update_assignment(pool: &SqlitePool, id: Uuid, input: AssignmentInput) -> Result<Assignment> {
    get_assignment(pool, id).await?;
    check_input(pool, &input).await?;

    let assignment = normalized(id, input);
    sqlx::query(
        r#"
        UPDATE assignments
        SET week_of = ?, meeting_type = ?, assignment_type = ?, assignee_id = ?,
            assistant_id = ?, title = ?, notes = ?
        WHERE id = ?
        "#,
    )
    .bind(format_date(assignment.week_of))
    .bind(assignment.meeting_type.as_str())
    .bind(assignment.assignment_type.as_str())
    .bind(assignment.assignee_id.to_string())
    .bind(opt_uuid_text(assignment.assistant_id))
    .bind(&assignment.title)
    .bind(&assignment.notes)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(assignment)
}

/// Returns the deleted row so callers can report its week
pub async fn delete_assignment(pool: &SqlitePool, id: Uuid) -> Result<Assignment> {
    let assignment = get_assignment(pool, id).await?;
    sqlx::query("DELETE FROM assignments WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(assignment)
}

/// Past assignments of one type, newest first, for rotation suggestions
pub async fn history_for_type(
    pool: &SqlitePool,
    kind: AssignmentType,
    before: NaiveDate,
) -> Result<Vec<Assignment>> {
    let sql = format!(
        "SELECT {} FROM assignments WHERE assignment_type = ? AND week_of < ? ORDER BY week_of DESC",
        ASSIGNMENT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(kind.as_str())
        .bind(format_date(week_start(before)))
        .fetch_all(pool)
        .await?;
    rows.iter().map(assignment_from_row).collect()
}
