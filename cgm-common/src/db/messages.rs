//! Messaging database operations

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::members::{get_group, get_member};
use crate::db::models::{Audience, InboxEntry, Message, MessageInput};
use crate::db::{format_timestamp, opt_uuid_text, parse_opt_uuid, parse_timestamp, parse_uuid};
use crate::{Error, Result};

const MESSAGE_COLUMNS: &str = "m.id AS id, m.sender_id AS sender_id, m.audience_kind AS audience_kind, \
     m.audience_id AS audience_id, m.subject AS subject, m.body AS body, m.created_at AS created_at";

/// Messages visible to member `?1` whose group is `?2`
const VISIBLE_TO_MEMBER: &str = "(m.audience_kind = 'everyone' \
     OR (m.audience_kind = 'member' AND m.audience_id = ?1) \
     OR (m.audience_kind = 'group' AND m.audience_id = ?2))";

fn message_from_row(row: &SqliteRow) -> Result<Message> {
    let id: String = row.get("id");
    let audience_kind: String = row.get("audience_kind");
    let audience_id: Option<String> = row.get("audience_id");
    let created_at: String = row.get("created_at");

    Ok(Message {
        id: parse_uuid("messages.id", &id)?,
        sender_id: parse_opt_uuid("messages.sender_id", row.get("sender_id"))?,
        audience: Audience::from_columns(&audience_kind, audience_id.as_deref())?,
        subject: row.get("subject"),
        body: row.get("body"),
        created_at: parse_timestamp("messages.created_at", &created_at)?,
    })
}

fn unknown(e: Error) -> Error {
    match e {
        Error::NotFound(what) => Error::InvalidInput(format!("unknown {}", what)),
        other => other,
    }
}

pub async fn get_message(pool: &SqlitePool, id: Uuid) -> Result<Message> {
    let sql = format!("SELECT {} FROM messages m WHERE m.id = ?", MESSAGE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => message_from_row(&row),
        None => Err(Error::NotFound(format!("message {}", id))),
    }
}

/// Every message, newest first
pub async fn list_messages(pool: &SqlitePool) -> Result<Vec<Message>> {
    let sql = format!(
        "SELECT {} FROM messages m ORDER BY m.created_at DESC, m.rowid DESC",
        MESSAGE_COLUMNS
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(message_from_row).collect()
}

pub async fn post_message(pool: &SqlitePool, input: MessageInput, at: DateTime<Utc>) -> Result<Message> {
    input.validate()?;
    if let Some(sender_id) = input.sender_id {
        get_member(pool, sender_id).await.map_err(unknown)?;
    }
    match input.audience {
        Audience::Member(id) => {
            get_member(pool, id).await.map_err(unknown)?;
        }
        Audience::Group(id) => {
            get_group(pool, id).await.map_err(unknown)?;
        }
        Audience::Everyone => {}
    }

    let message = Message {
        id: Uuid::new_v4(),
        sender_id: input.sender_id,
        audience: input.audience,
        subject: input.subject.trim().to_string(),
        body: input.body,
        created_at: at,
    };
    let (audience_kind, audience_id) = message.audience.to_columns();

    sqlx::query(
        r#"
        INSERT INTO messages (id, sender_id, audience_kind, audience_id, subject, body, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(message.id.to_string())
    .bind(opt_uuid_text(message.sender_id))
    .bind(audience_kind)
    .bind(audience_id)
    .bind(&message.subject)
    .bind(&message.body)
    .bind(format_timestamp(message.created_at))
    .execute(pool)
    .await?;

    Ok(message)
}

pub async fn delete_message(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM messages WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("message {}", id)));
    }
    Ok(())
}

/// Messages addressed to the member, their group or everyone, newest first
pub async fn inbox(pool: &SqlitePool, member_id: Uuid) -> Result<Vec<InboxEntry>> {
    let member = get_member(pool, member_id).await?;
    let sql = format!(
        r#"
        SELECT {}, (r.member_id IS NOT NULL) AS is_read
        FROM messages m
        LEFT JOIN message_reads r ON r.message_id = m.id AND r.member_id = ?1
        WHERE {}
        ORDER BY m.created_at DESC, m.rowid DESC
        "#,
        MESSAGE_COLUMNS, VISIBLE_TO_MEMBER
    );

    let rows = sqlx::query(&sql)
        .bind(member.id.to_string())
        .bind(opt_uuid_text(member.group_id))
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| {
            Ok(InboxEntry {
                message: message_from_row(row)?,
                read: row.get("is_read"),
            })
        })
        .collect()
}

/// Record that `member_id` read `message_id`; repeating is a no-op
pub async fn mark_read(pool: &SqlitePool, message_id: Uuid, member_id: Uuid) -> Result<()> {
    get_message(pool, message_id).await?;
    get_member(pool, member_id).await?;

    sqlx::query("INSERT OR IGNORE INTO message_reads (message_id, member_id) VALUES (?, ?)")
        .bind(message_id.to_string())
        .bind(member_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn unread_count(pool: &SqlitePool, member_id: Uuid) -> Result<i64> {
    let member = get_member(pool, member_id).await?;
    let sql = format!(
        r#"
        SELECT COUNT(*)
        FROM messages m
        WHERE {}
          AND NOT EXISTS (
              SELECT 1 FROM message_reads r WHERE r.message_id = m.id AND r.member_id = ?1
          )
        "#,
        VISIBLE_TO_MEMBER
    );

    let count: i64 = sqlx::query_scalar(&sql)
        .bind(member.id.to_string())
        .bind(opt_uuid_text(member.group_id))
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;
    use crate::db::members::{create_group, create_member};
    use crate::db::models::{Appointment, Gender, GroupInput, MemberInput, PioneerStatus};
    use chrono::Duration;

    async fn member(pool: &SqlitePool, first: &str, group_id: Option<Uuid>) -> Uuid {
        create_member(
            pool,
            MemberInput {
                first_name: first.to_string(),
                last_name: "Grant".to_string(),
                gender: Gender::Male,
                appointment: Appointment::None,
                pioneer_status: PioneerStatus::None,
                privileges: vec![],
                group_id,
                email: None,
                phone: None,
                baptized: true,
                active: true,
            },
        )
        .await
        .unwrap()
        .id
    }

    fn message(audience: Audience, subject: &str) -> MessageInput {
        MessageInput {
            sender_id: None,
            audience,
            subject: subject.to_string(),
            body: "Details inside".to_string(),
        }
    }

    #[tokio::test]
    async fn test_inbox_routing_and_read_state() {
        let pool = init_memory_database().await.unwrap();
        let group = create_group(
            &pool,
            GroupInput {
                name: "Central".to_string(),
                overseer_id: None,
                assistant_id: None,
            },
        )
        .await
        .unwrap();
        let in_group = member(&pool, "Ivan", Some(group.id)).await;
        let outsider = member(&pool, "Otto", None).await;

        let t0 = Utc::now();
        let everyone = post_message(&pool, message(Audience::Everyone, "Assembly"), t0).await.unwrap();
        post_message(&pool, message(Audience::Group(group.id), "Field service"), t0 + Duration::seconds(1))
            .await
            .unwrap();
        post_message(&pool, message(Audience::Member(outsider), "Personal"), t0 + Duration::seconds(2))
            .await
            .unwrap();

        let ivan = inbox(&pool, in_group).await.unwrap();
        let subjects: Vec<&str> = ivan.iter().map(|e| e.message.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Field service", "Assembly"]);
        assert!(ivan.iter().all(|e| !e.read));

        let otto = inbox(&pool, outsider).await.unwrap();
        assert_eq!(otto.len(), 2);
        assert_eq!(unread_count(&pool, outsider).await.unwrap(), 2);

        mark_read(&pool, everyone.id, outsider).await.unwrap();
        mark_read(&pool, everyone.id, outsider).await.unwrap();
        assert_eq!(unread_count(&pool, outsider).await.unwrap(), 1);
        assert_eq!(unread_count(&pool, in_group).await.unwrap(), 2);

        let otto = inbox(&pool, outsider).await.unwrap();
        let read: Vec<bool> = otto.iter().map(|e| e.read).collect();
        assert_eq!(read, vec![false, true]);
    }

    #[tokio::test]
    async fn test_unknown_recipient_rejected() {
        let pool = init_memory_database().await.unwrap();
        let result = post_message(&pool, message(Audience::Member(Uuid::new_v4()), "Hi"), Utc::now()).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
