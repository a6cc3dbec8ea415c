//! Monthly field service report database operations

use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::members::get_member;
use crate::db::models::{MonthlyReport, MonthlyReportInput};
use crate::db::{opt_uuid_text, parse_column, parse_uuid};
use crate::service_year::service_year_months;
use crate::{Error, Result};

const REPORT_COLUMNS: &str = "id, member_id, month, participated, hours, bible_studies, \
     auxiliary_pioneer, regular_pioneer, remarks";

fn report_from_row(row: &SqliteRow) -> Result<MonthlyReport> {
    let id: String = row.get("id");
    let member_id: String = row.get("member_id");
    let month: String = row.get("month");

    Ok(MonthlyReport {
        id: parse_uuid("monthly_reports.id", &id)?,
        member_id: parse_uuid("monthly_reports.member_id", &member_id)?,
        month: parse_column("monthly_reports.month", &month)?,
        participated: row.get("participated"),
        hours: row.get("hours"),
        bible_studies: row.get("bible_studies"),
        auxiliary_pioneer: row.get("auxiliary_pioneer"),
        regular_pioneer: row.get("regular_pioneer"),
        remarks: row.get("remarks"),
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportFilter {
    #[serde(default)]
    pub member_id: Option<Uuid>,
    /// September-August year, e.g. 2024 for 2024-09..2025-08
    #[serde(default)]
    pub service_year: Option<i32>,
}

/// Reports ordered by month, then member
pub async fn list_reports(pool: &SqlitePool, filter: &ReportFilter) -> Result<Vec<MonthlyReport>> {
    let (first, last) = match filter.service_year {
        Some(sy) => {
            let months = service_year_months(sy);
            (Some(months[0].to_string()), Some(months[11].to_string()))
        }
        None => (None, None),
    };

    let sql = format!(
        r#"
        SELECT {}
        FROM monthly_reports
        WHERE (?1 IS NULL OR member_id = ?1)
          AND (?2 IS NULL OR month >= ?2)
          AND (?3 IS NULL OR month <= ?3)
        ORDER BY month, member_id
        "#,
        REPORT_COLUMNS
    );

    let rows = sqlx::query(&sql)
        .bind(opt_uuid_text(filter.member_id))
        .bind(first)
        .bind(last)
        .fetch_all(pool)
        .await?;
    rows.iter().map(report_from_row).collect()
}

pub async fn get_report(pool: &SqlitePool, id: Uuid) -> Result<MonthlyReport> {
    let sql = format!("SELECT {} FROM monthly_reports WHERE id = ?", REPORT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => report_from_row(&row),
        None => Err(Error::NotFound(format!("report {}", id))),
    }
}

/// Insert a report, or replace the member's existing report for that month
///
/// A replaced report keeps its id.
pub async fn save_report(pool: &SqlitePool, input: MonthlyReportInput) -> Result<MonthlyReport> {
    input.validate()?;
    get_member(pool, input.member_id).await.map_err(|e| match e {
        Error::NotFound(what) => Error::InvalidInput(format!("unknown {}", what)),
        other => other,
    })?;

    sqlx::query(
        r#"
        INSERT INTO monthly_reports (
            id, member_id, month, participated, hours, bible_studies,
            auxiliary_pioneer, regular_pioneer, remarks
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(member_id, month) DO UPDATE SET
            participated = excluded.participated,
            hours = excluded.hours,
            bible_studies = excluded.bible_studies,
            auxiliary_pioneer = excluded.auxiliary_pioneer,
            regular_pioneer = excluded.regular_pioneer,
            remarks = excluded.remarks,
            submitted_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(input.member_id.to_string())
    .bind(input.month.to_string())
    .bind(input.participated)
    .bind(input.hours)
    .bind(input.bible_studies)
    .bind(input.auxiliary_pioneer)
    .bind(input.regular_pioneer)
    .bind(input.remarks.as_deref().map(str::trim).filter(|r| !r.is_empty()))
    .execute(pool)
    .await?;

    let sql = format!(
        "SELECT {} FROM monthly_reports WHERE member_id = ? AND month = ?",
        REPORT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(input.member_id.to_string())
        .bind(input.month.to_string())
        .fetch_one(pool)
        .await?;
    report_from_row(&row)
}

pub async fn delete_report(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM monthly_reports WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("report {}", id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;
    use crate::db::members::{create_member, delete_member};
    use crate::db::models::{Appointment, Gender, MemberInput, PioneerStatus};
    use crate::service_year::publisher_record;

    async fn publisher(pool: &SqlitePool) -> Uuid {
        create_member(
            pool,
            MemberInput {
                first_name: "Lia".to_string(),
                last_name: "Moss".to_string(),
                gender: Gender::Female,
                appointment: Appointment::None,
                pioneer_status: PioneerStatus::None,
                privileges: vec![],
                group_id: None,
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

    fn report(member_id: Uuid, month: &str, hours: i64) -> MonthlyReportInput {
        MonthlyReportInput {
            member_id,
            month: month.parse().unwrap(),
            participated: true,
            hours,
            bible_studies: 1,
            auxiliary_pioneer: false,
            regular_pioneer: false,
            remarks: None,
        }
    }

    #[tokio::test]
    async fn test_saving_twice_replaces_report() {
        let pool = init_memory_database().await.unwrap();
        let member_id = publisher(&pool).await;

        let first = save_report(&pool, report(member_id, "2025-01", 4)).await.unwrap();
        let second = save_report(&pool, report(member_id, "2025-01", 9)).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.hours, 9);

        let all = list_reports(&pool, &ReportFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_service_year_filter_and_record_card() {
        let pool = init_memory_database().await.unwrap();
        let member_id = publisher(&pool).await;

        save_report(&pool, report(member_id, "2024-08", 7)).await.unwrap();
        save_report(&pool, report(member_id, "2024-09", 10)).await.unwrap();
        save_report(&pool, report(member_id, "2025-01", 5)).await.unwrap();
        save_report(&pool, report(member_id, "2025-09", 3)).await.unwrap();

        let reports = list_reports(
            &pool,
            &ReportFilter {
                member_id: Some(member_id),
                service_year: Some(2024),
            },
        )
        .await
        .unwrap();
        assert_eq!(reports.len(), 2);

        let record = publisher_record(member_id, 2024, &reports);
        assert_eq!(record.totals.hours, 15);
    }

    #[tokio::test]
    async fn test_unknown_member_and_cascade() {
        let pool = init_memory_database().await.unwrap();
        assert!(matches!(
            save_report(&pool, report(Uuid::new_v4(), "2025-01", 1)).await,
            Err(Error::InvalidInput(_))
        ));

        let member_id = publisher(&pool).await;
        let saved = save_report(&pool, report(member_id, "2025-01", 1)).await.unwrap();
        delete_member(&pool, member_id).await.unwrap();
        assert!(matches!(get_report(&pool, saved.id).await, Err(Error::NotFound(_))));
    }
}
