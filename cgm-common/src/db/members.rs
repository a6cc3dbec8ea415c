//! Member and field service group database operations

use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::models::{Group, GroupInput, Member, MemberInput, Privilege};
use crate::db::{opt_uuid_text, parse_column, parse_opt_uuid, parse_uuid};
use crate::{Error, Result};

const MEMBER_COLUMNS: &str = "id, first_name, last_name, gender, appointment, pioneer_status, \
     privileges, group_id, email, phone, baptized, active";

fn member_from_row(row: &SqliteRow) -> Result<Member> {
    let id: String = row.get("id");
    let gender: String = row.get("gender");
    let appointment: String = row.get("appointment");
    let pioneer_status: String = row.get("pioneer_status");
    let privileges: String = row.get("privileges");

    Ok(Member {
        id: parse_uuid("members.id", &id)?,
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        gender: parse_column("members.gender", &gender)?,
        appointment: parse_column("members.appointment", &appointment)?,
        pioneer_status: parse_column("members.pioneer_status", &pioneer_status)?,
        privileges: serde_json::from_str::<Vec<Privilege>>(&privileges)?,
        group_id: parse_opt_uuid("members.group_id", row.get("group_id"))?,
        email: row.get("email"),
        phone: row.get("phone"),
        baptized: row.get("baptized"),
        active: row.get("active"),
    })
}

fn group_from_row(row: &SqliteRow) -> Result<Group> {
    let id: String = row.get("id");
    Ok(Group {
        id: parse_uuid("groups.id", &id)?,
        name: row.get("name"),
        overseer_id: parse_opt_uuid("groups.overseer_id", row.get("overseer_id"))?,
        assistant_id: parse_opt_uuid("groups.assistant_id", row.get("assistant_id"))?,
    })
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

pub async fn list_groups(pool: &SqlitePool) -> Result<Vec<Group>> {
    let rows = sqlx::query("SELECT id, name, overseer_id, assistant_id FROM groups ORDER BY name")
        .fetch_all(pool)
        .await?;
    rows.iter().map(group_from_row).collect()
}

pub async fn get_group(pool: &SqlitePool, id: Uuid) -> Result<Group> {
    let row = sqlx::query("SELECT id, name, overseer_id, assistant_id FROM groups WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => group_from_row(&row),
        None => Err(Error::NotFound(format!("group {}", id))),
    }
}

async fn group_name_taken(pool: &SqlitePool, name: &str, except: Option<Uuid>) -> Result<bool> {
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM groups WHERE name = ? AND id IS NOT ?)",
    )
    .bind(name)
    .bind(opt_uuid_text(except))
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

async fn check_group_officers(pool: &SqlitePool, input: &GroupInput) -> Result<()> {
    for id in [input.overseer_id, input.assistant_id].into_iter().flatten() {
        get_member(pool, id).await.map_err(|e| match e {
            Error::NotFound(what) => Error::InvalidInput(format!("unknown {}", what)),
            other => other,
        })?;
    }
    if input.overseer_id.is_some() && input.overseer_id == input.assistant_id {
        return Err(Error::InvalidInput(
            "overseer and assistant must be different members".to_string(),
        ));
    }
    Ok(())
}

pub async fn create_group(pool: &SqlitePool, input: GroupInput) -> Result<Group> {
    input.validate()?;
    let name = input.name.trim().to_string();
    if group_name_taken(pool, &name, None).await? {
        return Err(Error::Conflict(format!("a group named '{}' already exists", name)));
    }
    check_group_officers(pool, &input).await?;

    let group = Group {
        id: Uuid::new_v4(),
        name,
        overseer_id: input.overseer_id,
        assistant_id: input.assistant_id,
    };

    sqlx::query("INSERT INTO groups (id, name, overseer_id, assistant_id) VALUES (?, ?, ?, ?)")
        .bind(group.id.to_string())
        .bind(&group.name)
        .bind(opt_uuid_text(group.overseer_id))
        .bind(opt_uuid_text(group.assistant_id))
        .execute(pool)
        .await?;

    Ok(group)
}

pub async fn update_group(pool: &SqlitePool, id: Uuid, input: GroupInput) -> Result<Group> {
    input.validate()?;
    get_group(pool, id).await?;
    let name = input.name.trim().to_string();
    if group_name_taken(pool, &name, Some(id)).await? {
        return Err(Error::Conflict(format!("a group named '{}' already exists", name)));
    }
    check_group_officers(pool, &input).await?;

    sqlx::query(
        r#"
        UPDATE groups
        SET name = ?, overseer_id = ?, assistant_id = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(&name)
    .bind(opt_uuid_text(input.overseer_id))
    .bind(opt_uuid_text(input.assistant_id))
    .bind(id.to_string())
    .execute(pool)
    .await?;

    get_group(pool, id).await
}

/// Members, territories and cleaning tasks of the group lose their group
pub async fn delete_group(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM groups WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("group {}", id)));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// Optional filters for [`list_members`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberFilter {
    #[serde(default)]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub active: Option<bool>,
    /// Case-insensitive match on first or last name
    #[serde(default)]
    pub search: Option<String>,
}

/// Members sorted by last name, then first name
pub async fn list_members(pool: &SqlitePool, filter: &MemberFilter) -> Result<Vec<Member>> {
    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.to_lowercase()));

    let sql = format!(
        r#"
        SELECT {}
        FROM members
        WHERE (?1 IS NULL OR group_id = ?1)
          AND (?2 IS NULL OR active = ?2)
          AND (?3 IS NULL OR lower(first_name) LIKE ?3 OR lower(last_name) LIKE ?3)
        ORDER BY last_name, first_name
        "#,
        MEMBER_COLUMNS
    );

    let rows = sqlx::query(&sql)
        .bind(opt_uuid_text(filter.group_id))
        .bind(filter.active)
        .bind(search)
        .fetch_all(pool)
        .await?;
    rows.iter().map(member_from_row).collect()
}

pub async fn get_member(pool: &SqlitePool, id: Uuid) -> Result<Member> {
    let sql = format!("SELECT {} FROM members WHERE id = ?", MEMBER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => member_from_row(&row),
        None => Err(Error::NotFound(format!("member {}", id))),
    }
}

async fn check_member_group(pool: &SqlitePool, group_id: Option<Uuid>) -> Result<()> {
    if let Some(group_id) = group_id {
        get_group(pool, group_id).await.map_err(|e| match e {
            Error::NotFound(what) => Error::InvalidInput(format!("unknown {}", what)),
            other => other,
        })?;
    }
    Ok(())
}

pub async fn create_member(pool: &SqlitePool, input: MemberInput) -> Result<Member> {
    input.validate()?;
    check_member_group(pool, input.group_id).await?;

    let member = Member::from_input(Uuid::new_v4(), input);
    sqlx::query(
        r#"
        INSERT INTO members (
            id, first_name, last_name, gender, appointment, pioneer_status,
            privileges, group_id, email, phone, baptized, active
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(member.id.to_string())
    .bind(&member.first_name)
    .bind(&member.last_name)
    .bind(member.gender.as_str())
    .bind(member.appointment.as_str())
    .bind(member.pioneer_status.as_str())
    .bind(serde_json::to_string(&member.privileges)?)
    .bind(opt_uuid_text(member.group_id))
    .bind(&member.email)
    .bind(&member.phone)
    .bind(member.baptized)
    .bind(member.active)
    .execute(pool)
    .await?;

    tracing::debug!("Created member {} ({})", member.full_name(), member.id);
    Ok(member)
}

/// Replace every field of a member
pub async fn update_member(pool: &SqlitePool, id: Uuid, input: MemberInput) -> Result<Member> {
    input.validate()?;
    get_member(pool, id).await?;
    check_member_group(pool, input.group_id).await?;

    let member = Member::from_input(id, input);
    sqlx::query(
        r#"
        UPDATE members
        SET first_name = ?, last_name = ?, gender = ?, appointment = ?, pioneer_status = ?,
            privileges = ?, group_id = ?, email = ?, phone = ?, baptized = ?, active = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(&member.first_name)
    .bind(&member.last_name)
    .bind(member.gender.as_str())
    .bind(member.appointment.as_str())
    .bind(member.pioneer_status.as_str())
    .bind(serde_json::to_string(&member.privileges)?)
    .bind(opt_uuid_text(member.group_id))
    .bind(&member.email)
    .bind(&member.phone)
    .bind(member.baptized)
    .bind(member.active)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(member)
}

/// Deletes the member's reports and assignments; other references are cleared
pub async fn delete_member(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM members WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("member {}", id)));
    }
    Ok(())
}
