//! Group overseer reporting
//!
//! Which publishers of a field service group have reported for a month, and
//! which active publishers have gone quiet.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::db::models::{Member, MonthlyReport};
use crate::service_year::MonthKey;

/// Months without a participating report before a publisher counts as inactive
pub const INACTIVE_WINDOW_MONTHS: i32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublisherStatus {
    pub member_id: Uuid,
    pub name: String,
    pub hours: i64,
    pub bible_studies: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMonthReport {
    pub group_id: Uuid,
    pub month: MonthKey,
    pub reported: Vec<PublisherStatus>,
    pub missing: Vec<PublisherStatus>,
    pub total_hours: i64,
    pub total_bible_studies: i64,
    pub auxiliary_pioneers: u32,
    pub regular_pioneers: u32,
}

fn sorted_by_name(members: &[&Member]) -> Vec<Member> {
    let mut sorted: Vec<Member> = members.iter().map(|m| (*m).clone()).collect();
    sorted.sort_by(|a, b| {
        (a.last_name.as_str(), a.first_name.as_str()).cmp(&(b.last_name.as_str(), b.first_name.as_str()))
    });
    sorted
}

/// Reporting status of a group's active members for `month`
///
/// `members` may contain the whole congregation; only active members of
/// `group_id` are considered, and only reports for `month` are used.
pub fn group_month_report(
    group_id: Uuid,
    month: MonthKey,
    members: &[Member],
    reports: &[MonthlyReport],
) -> GroupMonthReport {
    let in_group: Vec<&Member> = members
        .iter()
        .filter(|m| m.active && m.group_id == Some(group_id))
        .collect();

    let this_month: HashMap<Uuid, &MonthlyReport> = reports
        .iter()
        .filter(|r| r.month == month)
        .map(|r| (r.member_id, r))
        .collect();

    let mut report = GroupMonthReport {
        group_id,
        month,
        reported: Vec::new(),
        missing: Vec::new(),
        total_hours: 0,
        total_bible_studies: 0,
        auxiliary_pioneers: 0,
        regular_pioneers: 0,
    };

    for member in sorted_by_name(&in_group) {
        match this_month.get(&member.id) {
            Some(r) => {
                report.total_hours = report.total_hours.saturating_add(r.hours);
                report.total_bible_studies = report.total_bible_studies.saturating_add(r.bible_studies);
                if r.auxiliary_pioneer {
                    report.auxiliary_pioneers += 1;
                }
                if r.regular_pioneer {
                    report.regular_pioneers += 1;
                }
                report.reported.push(PublisherStatus {
                    member_id: member.id,
                    name: member.full_name(),
                    hours: r.hours,
                    bible_studies: r.bible_studies,
                });
            }
            None => report.missing.push(PublisherStatus {
                member_id: member.id,
                name: member.full_name(),
                hours: 0,
                bible_studies: 0,
            }),
        }
    }

    report
}

/// Active members with no participating report in the six months ending
/// with `month`, sorted by name
pub fn inactive_publishers(month: MonthKey, members: &[Member], reports: &[MonthlyReport]) -> Vec<Member> {
    let window_start = month.add_months(-(INACTIVE_WINDOW_MONTHS - 1));
    let participating: HashSet<Uuid> = reports
        .iter()
        .filter(|r| r.participated && r.month >= window_start && r.month <= month)
        .map(|r| r.member_id)
        .collect();

    let quiet: Vec<&Member> = members
        .iter()
        .filter(|m| m.active && !participating.contains(&m.id))
        .collect();
    sorted_by_name(&quiet)
}
