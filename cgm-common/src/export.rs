//! CSV exports
//!
//! RFC 4180 output: CRLF line endings, fields quoted when they contain a
//! comma, quote, CR or LF, embedded quotes doubled.

use std::collections::HashMap;

use uuid::Uuid;

use crate::db::models::{Group, Member, Territory};
use crate::finance::{format_cents, ServiceYearFinance};
use crate::service_year::{service_year_label, PublisherRecord, ServiceYearTotals};
use crate::territory::compare_numbers;

/// Quote a single field if needed
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn push_row<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    let line: Vec<String> = fields.iter().map(|f| csv_field(f.as_ref())).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        ""
    }
}

/// Publisher record card: one row per service-year month plus a totals row
pub fn publisher_record_csv(member: &Member, record: &PublisherRecord) -> String {
    let mut out = String::new();
    push_row(&mut out, &["Name", &member.full_name()]);
    push_row(&mut out, &["Service year", &service_year_label(record.service_year)]);
    push_row(
        &mut out,
        &[
            "Month",
            "Participated",
            "Bible studies",
            "Auxiliary pioneer",
            "Regular pioneer",
            "Hours",
            "Remarks",
        ],
    );

    for month in &record.months {
        let hours = if month.reported { month.hours.to_string() } else { String::new() };
        let studies = if month.reported { month.bible_studies.to_string() } else { String::new() };
        push_row(
            &mut out,
            &[
                month.month.to_string(),
                yes_no(month.participated).to_string(),
                studies,
                yes_no(month.auxiliary_pioneer).to_string(),
                yes_no(month.regular_pioneer).to_string(),
                hours,
                month.remarks.clone().unwrap_or_default(),
            ],
        );
    }

    let totals = &record.totals;
    push_row(
        &mut out,
        &[
            "Total".to_string(),
            totals.months_participated.to_string(),
            format!("{:.1}", totals.average_bible_studies),
            totals.auxiliary_pioneer_months.to_string(),
            totals.regular_pioneer_months.to_string(),
            totals.hours.to_string(),
            String::new(),
        ],
    );
    out
}

/// Territory list in number order with group names resolved
pub fn territory_list_csv(territories: &[Territory], groups: &[Group]) -> String {
    let group_names: HashMap<Uuid, &str> = groups.iter().map(|g| (g.id, g.name.as_str())).collect();
    let numbers: HashMap<Uuid, &str> = territories.iter().map(|t| (t.id, t.number.as_str())).collect();

    let mut sorted: Vec<&Territory> = territories.iter().collect();
    sorted.sort_by(|a, b| compare_numbers(&a.number, &b.number));

    let mut out = String::new();
    push_row(
        &mut out,
        &["Number", "Name", "Group", "Difficulty", "Addresses", "Parent", "Boundaries", "Notes"],
    );
    for t in sorted {
        push_row(
            &mut out,
            &[
                t.number.clone(),
                t.name.clone(),
                t.group_id
                    .and_then(|id| group_names.get(&id).copied())
                    .unwrap_or_default()
                    .to_string(),
                t.difficulty.to_string(),
                t.size.to_string(),
                t.parent_id
                    .and_then(|id| numbers.get(&id).copied())
                    .unwrap_or_default()
                    .to_string(),
                t.boundaries.clone().unwrap_or_default(),
                t.notes.clone().unwrap_or_default(),
            ],
        );
    }
    out
}

/// Twelve months of contributions, expenses and balance
pub fn finance_summary_csv(summary: &ServiceYearFinance) -> String {
    let mut out = String::new();
    push_row(&mut out, &["Service year", &summary.label]);
    push_row(
        &mut out,
        &["Opening balance", &format_cents(summary.opening_balance_cents)],
    );
    push_row(&mut out, &["Month", "Contributions", "Expenses", "Net", "Balance"]);

    for month in &summary.months {
        push_row(
            &mut out,
            &[
                month.month.to_string(),
                format_cents(month.contributions_cents),
                format_cents(month.expenses_cents),
                format_cents(month.net_cents),
                format_cents(month.closing_balance_cents),
            ],
        );
    }
    push_row(
        &mut out,
        &[
            "Total".to_string(),
            format_cents(summary.total_contributions_cents),
            format_cents(summary.total_expenses_cents),
            format_cents(summary.net_cents),
            format_cents(summary.closing_balance_cents),
        ],
    );
    out
}

/// Congregation monthly totals for a service year
pub fn congregation_totals_csv(totals: &ServiceYearTotals) -> String {
    let mut out = String::new();
    push_row(&mut out, &["Service year", &totals.label]);
    push_row(
        &mut out,
        &[
            "Month",
            "Reports",
            "Publishers",
            "Bible studies",
            "Auxiliary pioneers",
            "Auxiliary pioneer hours",
            "Regular pioneers",
            "Regular pioneer hours",
            "Total hours",
        ],
    );

    let rows = totals.months.iter().chain(std::iter::once(&totals.totals));
    for month in rows {
        let label = month.month.map(|m| m.to_string()).unwrap_or_else(|| "Total".to_string());
        push_row(
            &mut out,
            &[
                label,
                month.reports.to_string(),
                month.participating_publishers.to_string(),
                month.total_bible_studies.to_string(),
                month.auxiliary_pioneers.to_string(),
                month.auxiliary_pioneer_hours.to_string(),
                month.regular_pioneers.to_string(),
                month.regular_pioneer_hours.to_string(),
                month.total_hours.to_string(),
            ],
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Appointment, Gender, MonthlyReport, PioneerStatus};
    use crate::service_year::publisher_record;

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_publisher_record_csv_layout() {
        let member = Member {
            id: Uuid::new_v4(),
            first_name: "Nora".to_string(),
            last_name: "Vale".to_string(),
            gender: Gender::Female,
            appointment: Appointment::None,
            pioneer_status: PioneerStatus::None,
            privileges: vec![],
            group_id: None,
            email: None,
            phone: None,
            baptized: true,
            active: true,
        };
        let reports = vec![MonthlyReport {
            id: Uuid::new_v4(),
            member_id: member.id,
            month: "2024-09".parse().unwrap(),
            participated: true,
            hours: 10,
            bible_studies: 2,
            auxiliary_pioneer: false,
            regular_pioneer: false,
            remarks: Some("Visited, then moved".to_string()),
        }];
        let record = publisher_record(member.id, 2024, &reports);
        let csv = publisher_record_csv(&member, &record);
        let lines: Vec<&str> = csv.split("\r\n").collect();

        // name, year, header, 12 months, totals, trailing empty
        assert_eq!(lines.len(), 17);
        assert_eq!(lines[0], "Name,Nora Vale");
        assert_eq!(lines[1], "Service year,2024/2025");
        assert_eq!(lines[3], "2024-09,yes,2,,,10,\"Visited, then moved\"");
        assert_eq!(lines[4], "2024-10,,,,,,");
        assert_eq!(lines[15], "Total,1,2.0,0,0,10,");
    }

    #[test]
    fn test_territory_list_resolves_names() {
        let group = Group {
            id: Uuid::new_v4(),
            name: "North".to_string(),
            overseer_id: None,
            assistant_id: None,
        };
        let parent = Territory {
            id: Uuid::new_v4(),
            number: "10".to_string(),
            name: "Hill".to_string(),
            boundaries: None,
            difficulty: 3,
            size: 20,
            group_id: Some(group.id),
            parent_id: None,
            notes: None,
        };
        let child = Territory {
            id: Uuid::new_v4(),
            number: "10-1".to_string(),
            name: "Hill (1/2)".to_string(),
            parent_id: Some(parent.id),
            size: 10,
            ..parent.clone()
        };
        let small = Territory {
            id: Uuid::new_v4(),
            number: "2".to_string(),
            name: "Docks".to_string(),
            group_id: None,
            ..parent.clone()
        };

        let csv = territory_list_csv(&[parent, child, small], &[group]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[1], "2,Docks,,3,20,,,");
        assert_eq!(lines[2], "10,Hill,North,3,20,,,");
        assert_eq!(lines[3], "10-1,Hill (1/2),North,3,10,10,,");
    }
}
