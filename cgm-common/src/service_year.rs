//! Service-year bucketing and field service report aggregation
//!
//! A service year runs September through August and is named by the
//! calendar year in which it starts: 2024-09 through 2025-08 is service
//! year 2024. Every aggregate in this module maps monthly records onto the
//! twelve buckets of [`SERVICE_YEAR_MONTHS`] and sums over them, so the
//! results never depend on the order reports were loaded in.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::db::models::{Member, MonthlyReport, PioneerStatus};
use crate::{Error, Result};

/// Calendar months in service-year order
pub const SERVICE_YEAR_MONTHS: [u32; 12] = [9, 10, 11, 12, 1, 2, 3, 4, 5, 6, 7, 8];

/// Default annual hour requirement for regular pioneers
pub const DEFAULT_REGULAR_PIONEER_ANNUAL_GOAL: i64 = 600;

/// A calendar month, written `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidInput(format!(
                "month must be between 1 and 12 (got {})",
                month
            )));
        }
        if !(1..=9999).contains(&year) {
            return Err(Error::InvalidInput(format!("year out of range: {}", year)));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// `year` for September onwards, otherwise `year - 1`
    pub fn service_year(&self) -> i32 {
        service_year_of(self.year, self.month)
    }

    /// Position of this month in [`SERVICE_YEAR_MONTHS`] (September = 0)
    pub fn index_in_service_year(&self) -> usize {
        ((self.month + 3) % 12) as usize
    }

    pub fn first_day(&self) -> NaiveDate {
        // month and year are range-checked on construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn next(&self) -> Self {
        self.add_months(1)
    }

    pub fn previous(&self) -> Self {
        self.add_months(-1)
    }

    /// Shift by `delta` months (may be negative)
    pub fn add_months(&self, delta: i32) -> Self {
        let zero_based = self.year * 12 + (self.month as i32 - 1) + delta;
        Self {
            year: zero_based.div_euclid(12),
            month: (zero_based.rem_euclid(12) + 1) as u32,
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidInput(format!("Invalid month key '{}', expected YYYY-MM", s));

        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4
            || month.len() != 2
            || !year.bytes().all(|b| b.is_ascii_digit())
            || !month.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        MonthKey::new(year, month)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Sum that pins at the `i64` bounds instead of overflowing
pub(crate) fn saturating_sum(values: impl IntoIterator<Item = i64>) -> i64 {
    values.into_iter().fold(0i64, |acc, v| acc.saturating_add(v))
}

/// Service year containing `year`/`month`
pub fn service_year_of(year: i32, month: u32) -> i32 {
    if month >= 9 {
        year
    } else {
        year - 1
    }
}

/// Service year containing `date`
pub fn service_year_for_date(date: NaiveDate) -> i32 {
    service_year_of(date.year(), date.month())
}

/// The twelve month keys of a service year, September first
pub fn service_year_months(service_year: i32) -> [MonthKey; 12] {
    SERVICE_YEAR_MONTHS.map(|month| MonthKey {
        year: if month >= 9 { service_year } else { service_year + 1 },
        month,
    })
}

/// Display label, e.g. `2024/2025`
pub fn service_year_label(service_year: i32) -> String {
    format!("{}/{}", service_year, service_year + 1)
}

/// Group reports by the service year their month falls in
pub fn group_by_service_year(reports: &[MonthlyReport]) -> BTreeMap<i32, Vec<&MonthlyReport>> {
    let mut grouped: BTreeMap<i32, Vec<&MonthlyReport>> = BTreeMap::new();
    for report in reports {
        grouped.entry(report.month.service_year()).or_default().push(report);
    }
    grouped
}

// ---------------------------------------------------------------------------
// Publisher record card
// ---------------------------------------------------------------------------

/// One month of a publisher record card
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthActivity {
    pub month: MonthKey,
    /// False when no report exists for the month; all values are then zero
    pub reported: bool,
    pub participated: bool,
    pub hours: i64,
    pub bible_studies: i64,
    pub auxiliary_pioneer: bool,
    pub regular_pioneer: bool,
    pub remarks: Option<String>,
}

impl MonthActivity {
    fn empty(month: MonthKey) -> Self {
        Self {
            month,
            reported: false,
            participated: false,
            hours: 0,
            bible_studies: 0,
            auxiliary_pioneer: false,
            regular_pioneer: false,
            remarks: None,
        }
    }

    /// Merge a report into this bucket; duplicates add up
    fn absorb(&mut self, report: &MonthlyReport) {
        self.reported = true;
        self.participated |= report.participated;
        self.hours = self.hours.saturating_add(report.hours);
        self.bible_studies = self.bible_studies.saturating_add(report.bible_studies);
        self.auxiliary_pioneer |= report.auxiliary_pioneer;
        self.regular_pioneer |= report.regular_pioneer;
        if let Some(remarks) = report.remarks.as_deref().filter(|r| !r.trim().is_empty()) {
            self.remarks = Some(match self.remarks.take() {
                Some(existing) => format!("{}; {}", existing, remarks),
                None => remarks.to_string(),
            });
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordTotals {
    pub hours: i64,
    pub months_reported: u32,
    pub months_participated: u32,
    pub auxiliary_pioneer_months: u32,
    pub regular_pioneer_months: u32,
    /// Mean bible studies over reported months
    pub average_bible_studies: f64,
}

/// A member's twelve service-year months with totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublisherRecord {
    pub member_id: Uuid,
    pub service_year: i32,
    pub months: Vec<MonthActivity>,
    pub totals: RecordTotals,
}

fn bucket_months<'a>(
    service_year: i32,
    reports: impl IntoIterator<Item = &'a MonthlyReport>,
) -> Vec<MonthActivity> {
    let mut months: Vec<MonthActivity> = service_year_months(service_year)
        .into_iter()
        .map(MonthActivity::empty)
        .collect();

    for report in reports {
        if report.month.service_year() == service_year {
            months[report.month.index_in_service_year()].absorb(report);
        }
    }
    months
}

fn record_totals(months: &[MonthActivity]) -> RecordTotals {
    let count = |pred: fn(&MonthActivity) -> bool| months.iter().filter(|m| pred(m)).count() as u32;

    let months_reported = count(|m| m.reported);
    let studies = saturating_sum(months.iter().map(|m| m.bible_studies));

    RecordTotals {
        hours: saturating_sum(months.iter().map(|m| m.hours)),
        months_reported,
        months_participated: count(|m| m.participated),
        auxiliary_pioneer_months: count(|m| m.auxiliary_pioneer),
        regular_pioneer_months: count(|m| m.regular_pioneer),
        average_bible_studies: if months_reported == 0 {
            0.0
        } else {
            studies as f64 / months_reported as f64
        },
    }
}

/// Record card for one member and one service year
///
/// Reports belonging to other members or other service years are ignored.
pub fn publisher_record(member_id: Uuid, service_year: i32, reports: &[MonthlyReport]) -> PublisherRecord {
    let months = bucket_months(
        service_year,
        reports.iter().filter(|r| r.member_id == member_id),
    );
    let totals = record_totals(&months);

    PublisherRecord {
        member_id,
        service_year,
        months,
        totals,
    }
}

/// Record cards for every service year a member has reports in, oldest first
pub fn publisher_records(member_id: Uuid, reports: &[MonthlyReport]) -> Vec<PublisherRecord> {
    let years: BTreeSet<i32> = reports
        .iter()
        .filter(|r| r.member_id == member_id)
        .map(|r| r.month.service_year())
        .collect();

    years
        .into_iter()
        .map(|year| publisher_record(member_id, year, reports))
        .collect()
}

// ---------------------------------------------------------------------------
// Congregation totals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CongregationMonth {
    pub month: Option<MonthKey>,
    pub reports: u32,
    pub participating_publishers: u32,
    pub publisher_bible_studies: i64,
    pub auxiliary_pioneers: u32,
    pub auxiliary_pioneer_hours: i64,
    pub regular_pioneers: u32,
    pub regular_pioneer_hours: i64,
    pub total_hours: i64,
    pub total_bible_studies: i64,
}

impl CongregationMonth {
    fn add(&mut self, report: &MonthlyReport) {
        self.reports += 1;
        if report.participated {
            self.participating_publishers += 1;
        }
        if report.regular_pioneer {
            self.regular_pioneers += 1;
            self.regular_pioneer_hours = self.regular_pioneer_hours.saturating_add(report.hours);
        } else if report.auxiliary_pioneer {
            self.auxiliary_pioneers += 1;
            self.auxiliary_pioneer_hours = self.auxiliary_pioneer_hours.saturating_add(report.hours);
        } else {
            self.publisher_bible_studies = self.publisher_bible_studies.saturating_add(report.bible_studies);
        }
        self.total_hours = self.total_hours.saturating_add(report.hours);
        self.total_bible_studies = self.total_bible_studies.saturating_add(report.bible_studies);
    }

    fn accumulate(&mut self, other: &CongregationMonth) {
        self.reports = self.reports.saturating_add(other.reports);
        self.participating_publishers = self.participating_publishers.saturating_add(other.participating_publishers);
        self.publisher_bible_studies = self.publisher_bible_studies.saturating_add(other.publisher_bible_studies);
        self.auxiliary_pioneers = self.auxiliary_pioneers.saturating_add(other.auxiliary_pioneers);
        self.auxiliary_pioneer_hours = self.auxiliary_pioneer_hours.saturating_add(other.auxiliary_pioneer_hours);
        self.regular_pioneers = self.regular_pioneers.saturating_add(other.regular_pioneers);
        self.regular_pioneer_hours = self.regular_pioneer_hours.saturating_add(other.regular_pioneer_hours);
        self.total_hours = self.total_hours.saturating_add(other.total_hours);
        self.total_bible_studies = self.total_bible_studies.saturating_add(other.total_bible_studies);
    }
}

/// Per-month congregation figures for a service year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceYearTotals {
    pub service_year: i32,
    pub label: String,
    pub months: Vec<CongregationMonth>,
    /// Column sums over the twelve months (`month` is `None`)
    pub totals: CongregationMonth,
}

pub fn congregation_totals(service_year: i32, reports: &[MonthlyReport]) -> ServiceYearTotals {
    let mut months: Vec<CongregationMonth> = service_year_months(service_year)
        .into_iter()
        .map(|month| CongregationMonth {
            month: Some(month),
            ..Default::default()
        })
        .collect();

    for report in reports.iter().filter(|r| r.month.service_year() == service_year) {
        months[report.month.index_in_service_year()].add(report);
    }

    let mut totals = CongregationMonth::default();
    for month in &months {
        totals.accumulate(month);
    }

    ServiceYearTotals {
        service_year,
        label: service_year_label(service_year),
        months,
        totals,
    }
}

// ---------------------------------------------------------------------------
// Pioneer summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PioneerMonth {
    pub month: MonthKey,
    pub reported: bool,
    /// Regular pioneer status for this month, from that month's report
    pub regular_pioneer: bool,
    pub hours: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PioneerYear {
    pub member_id: Uuid,
    pub name: String,
    pub months: Vec<PioneerMonth>,
    pub regular_pioneer_months: u32,
    /// Hours in months reported as regular pioneer
    pub pioneer_hours: i64,
    /// Hours across every reported month of the year
    pub total_hours: i64,
    /// Annual goal prorated over the regular-pioneer months
    pub goal: i64,
    pub remaining: i64,
    pub on_track: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PioneerSummary {
    pub service_year: i32,
    pub label: String,
    pub annual_goal: i64,
    pub pioneers: Vec<PioneerYear>,
    pub total_pioneer_hours: i64,
}

/// Regular pioneer summary for a service year
///
/// A member is listed when any of their reports in the year carries the
/// regular pioneer flag, or when their member record says regular or
/// special pioneer. Status is taken month by month from the reports, so a
/// pioneer appointed in January only has the months from January counted
/// toward the prorated goal.
pub fn pioneer_summary(
    service_year: i32,
    members: &[Member],
    reports: &[MonthlyReport],
    annual_goal: i64,
) -> PioneerSummary {
    let by_id: HashMap<Uuid, &Member> = members.iter().map(|m| (m.id, m)).collect();
    let in_year: Vec<&MonthlyReport> = reports
        .iter()
        .filter(|r| r.month.service_year() == service_year)
        .collect();

    let mut candidates: BTreeSet<Uuid> = in_year
        .iter()
        .filter(|r| r.regular_pioneer)
        .map(|r| r.member_id)
        .collect();
    candidates.extend(
        members
            .iter()
            .filter(|m| matches!(m.pioneer_status, PioneerStatus::Regular | PioneerStatus::Special))
            .map(|m| m.id),
    );

    let mut pioneers: Vec<PioneerYear> = candidates
        .into_iter()
        .map(|member_id| {
            let months = bucket_months(
                service_year,
                in_year.iter().copied().filter(|r| r.member_id == member_id),
            );

            let pioneer_months: Vec<PioneerMonth> = months
                .iter()
                .map(|m| PioneerMonth {
                    month: m.month,
                    reported: m.reported,
                    regular_pioneer: m.regular_pioneer,
                    hours: m.hours,
                })
                .collect();

            let regular_pioneer_months = months.iter().filter(|m| m.regular_pioneer).count() as u32;
            let pioneer_hours = saturating_sum(months.iter().filter(|m| m.regular_pioneer).map(|m| m.hours));
            let total_hours = saturating_sum(months.iter().map(|m| m.hours));
            let goal = annual_goal.saturating_mul(regular_pioneer_months as i64) / 12;

            PioneerYear {
                member_id,
                name: by_id
                    .get(&member_id)
                    .map(|m| m.full_name())
                    .unwrap_or_else(|| member_id.to_string()),
                months: pioneer_months,
                regular_pioneer_months,
                pioneer_hours,
                total_hours,
                goal,
                remaining: goal.saturating_sub(pioneer_hours).max(0),
                on_track: pioneer_hours >= goal,
            }
        })
        .collect();

    pioneers.sort_by(|a, b| {
        let key = |p: &PioneerYear| {
            by_id
                .get(&p.member_id)
                .map(|m| (m.last_name.clone(), m.first_name.clone()))
                .unwrap_or_else(|| (p.name.clone(), String::new()))
        };
        key(a).cmp(&key(b)).then(a.member_id.cmp(&b.member_id))
    });

    let total_pioneer_hours = saturating_sum(pioneers.iter().map(|p| p.pioneer_hours));

    PioneerSummary {
        service_year,
        label: service_year_label(service_year),
        annual_goal,
        pioneers,
        total_pioneer_hours,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Appointment, Gender};

    fn key(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    fn report(member_id: Uuid, month: &str, hours: i64) -> MonthlyReport {
        MonthlyReport {
            id: Uuid::new_v4(),
            member_id,
            month: key(month),
            participated: true,
            hours,
            bible_studies: 0,
            auxiliary_pioneer: false,
            regular_pioneer: false,
            remarks: None,
        }
    }

    fn member(first: &str, last: &str, status: PioneerStatus) -> Member {
        Member {
            id: Uuid::new_v4(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            gender: Gender::Female,
            appointment: Appointment::None,
            pioneer_status: status,
            privileges: vec![],
            group_id: None,
            email: None,
            phone: None,
            baptized: true,
            active: true,
        }
    }

    #[test]
    fn test_month_key_parse_and_display() {
        let k = key("2024-09");
        assert_eq!(k.year(), 2024);
        assert_eq!(k.month(), 9);
        assert_eq!(k.to_string(), "2024-09");
    }

    #[test]
    fn test_month_key_rejects_malformed() {
        for bad in ["2024-13", "2024-00", "2024-9", "24-09", "2024/09", "2024-09-01", "", "abcd-ef"] {
            assert!(bad.parse::<MonthKey>().is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_service_year_boundaries() {
        assert_eq!(key("2024-08").service_year(), 2023);
        assert_eq!(key("2024-09").service_year(), 2024);
        assert_eq!(key("2024-12").service_year(), 2024);
        assert_eq!(key("2025-01").service_year(), 2024);
        assert_eq!(key("2025-08").service_year(), 2024);
    }

    #[test]
    fn test_index_in_service_year() {
        assert_eq!(key("2024-09").index_in_service_year(), 0);
        assert_eq!(key("2024-12").index_in_service_year(), 3);
        assert_eq!(key("2025-01").index_in_service_year(), 4);
        assert_eq!(key("2025-08").index_in_service_year(), 11);
    }

    #[test]
    fn test_service_year_months_order() {
        let months = service_year_months(2024);
        assert_eq!(months[0], key("2024-09"));
        assert_eq!(months[3], key("2024-12"));
        assert_eq!(months[4], key("2025-01"));
        assert_eq!(months[11], key("2025-08"));
        for (i, m) in months.iter().enumerate() {
            assert_eq!(m.service_year(), 2024);
            assert_eq!(m.index_in_service_year(), i);
        }
    }

    #[test]
    fn test_add_months_across_years() {
        assert_eq!(key("2024-12").next(), key("2025-01"));
        assert_eq!(key("2025-01").previous(), key("2024-12"));
        assert_eq!(key("2025-03").add_months(-6), key("2024-09"));
        assert_eq!(key("2024-09").add_months(24), key("2026-09"));
    }

    #[test]
    fn test_month_key_serde_as_string() {
        let json = serde_json::to_string(&key("2025-01")).unwrap();
        assert_eq!(json, "\"2025-01\"");
        let parsed: MonthKey = serde_json::from_str("\"2025-01\"").unwrap();
        assert_eq!(parsed, key("2025-01"));
        assert!(serde_json::from_str::<MonthKey>("\"2025-1\"").is_err());
    }

    #[test]
    fn test_example_scenario_buckets_into_one_year() {
        let member_id = Uuid::new_v4();
        let reports = vec![report(member_id, "2024-09", 10), report(member_id, "2025-01", 5)];

        let grouped = group_by_service_year(&reports);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[&2024].len(), 2);

        let record = publisher_record(member_id, 2024, &reports);
        assert_eq!(record.totals.hours, 15);
        assert_eq!(record.months[0].hours, 10);
        assert_eq!(record.months[4].hours, 5);
        assert_eq!(record.totals.months_reported, 2);
    }

    #[test]
    fn test_missing_months_default_to_zero() {
        let member_id = Uuid::new_v4();
        let record = publisher_record(member_id, 2024, &[report(member_id, "2024-10", 3)]);

        assert_eq!(record.months.len(), 12);
        let empty = &record.months[0];
        assert!(!empty.reported);
        assert_eq!(empty.hours, 0);
        assert_eq!(empty.bible_studies, 0);
        assert!(!empty.participated);
    }

    #[test]
    fn test_record_ignores_other_members_and_years() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let reports = vec![
            report(a, "2024-09", 10),
            report(b, "2024-09", 99),
            report(a, "2024-08", 7), // service year 2023
        ];
        let record = publisher_record(a, 2024, &reports);
        assert_eq!(record.totals.hours, 10);

        let all = publisher_records(a, &reports);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].service_year, 2023);
        assert_eq!(all[1].service_year, 2024);
    }

    #[test]
    fn test_duplicate_month_reports_are_merged() {
        let member_id = Uuid::new_v4();
        let mut first = report(member_id, "2024-11", 4);
        first.remarks = Some("late".to_string());
        let mut second = report(member_id, "2024-11", 6);
        second.auxiliary_pioneer = true;
        second.remarks = Some("corrected".to_string());

        let record = publisher_record(member_id, 2024, &[first, second]);
        let month = &record.months[2];
        assert_eq!(month.hours, 10);
        assert!(month.auxiliary_pioneer);
        assert_eq!(month.remarks.as_deref(), Some("late; corrected"));
        assert_eq!(record.totals.months_reported, 1);
    }

    #[test]
    fn test_average_bible_studies_over_reported_months() {
        let member_id = Uuid::new_v4();
        let mut a = report(member_id, "2024-09", 1);
        a.bible_studies = 2;
        let mut b = report(member_id, "2024-10", 1);
        b.bible_studies = 1;
        let record = publisher_record(member_id, 2024, &[a, b]);
        assert!((record.totals.average_bible_studies - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_congregation_totals_split_by_status() {
        let reports = vec![
            MonthlyReport {
                regular_pioneer: true,
                bible_studies: 3,
                ..report(Uuid::new_v4(), "2024-09", 55)
            },
            MonthlyReport {
                auxiliary_pioneer: true,
                ..report(Uuid::new_v4(), "2024-09", 30)
            },
            MonthlyReport {
                bible_studies: 1,
                ..report(Uuid::new_v4(), "2024-09", 0)
            },
            MonthlyReport {
                participated: false,
                ..report(Uuid::new_v4(), "2024-09", 0)
            },
        ];

        let totals = congregation_totals(2024, &reports);
        let sept = &totals.months[0];
        assert_eq!(sept.reports, 4);
        assert_eq!(sept.participating_publishers, 3);
        assert_eq!(sept.regular_pioneers, 1);
        assert_eq!(sept.regular_pioneer_hours, 55);
        assert_eq!(sept.auxiliary_pioneers, 1);
        assert_eq!(sept.auxiliary_pioneer_hours, 30);
        assert_eq!(sept.publisher_bible_studies, 1);
        assert_eq!(sept.total_bible_studies, 4);
        assert_eq!(totals.totals.total_hours, 85);
        assert_eq!(totals.label, "2024/2025");
        assert!(totals.totals.month.is_none());
    }

    #[test]
    fn test_pioneer_status_is_evaluated_per_month() {
        let pioneer = member("Maria", "Santos", PioneerStatus::Regular);
        let mut reports = vec![report(pioneer.id, "2024-09", 12)];
        for month in ["2025-01", "2025-02", "2025-03"] {
            reports.push(MonthlyReport {
                regular_pioneer: true,
                ..report(pioneer.id, month, 50)
            });
        }

        let summary = pioneer_summary(2024, &[pioneer.clone()], &reports, 600);
        assert_eq!(summary.pioneers.len(), 1);
        let row = &summary.pioneers[0];
        assert_eq!(row.regular_pioneer_months, 3);
        assert_eq!(row.pioneer_hours, 150);
        assert_eq!(row.total_hours, 162);
        assert_eq!(row.goal, 150);
        assert_eq!(row.remaining, 0);
        assert!(row.on_track);
        assert!(!row.months[0].regular_pioneer);
        assert!(row.months[4].regular_pioneer);
    }

    #[test]
    fn test_pioneer_summary_includes_flagged_reports_and_sorts() {
        let listed = member("Zoe", "Adams", PioneerStatus::Regular);
        let flagged = member("Ben", "Young", PioneerStatus::None);
        let publisher = member("Carl", "Brown", PioneerStatus::None);
        let reports = vec![
            MonthlyReport {
                regular_pioneer: true,
                ..report(flagged.id, "2024-10", 40)
            },
            report(publisher.id, "2024-10", 5),
        ];

        let summary = pioneer_summary(
            2024,
            &[listed.clone(), flagged.clone(), publisher],
            &reports,
            600,
        );
        let names: Vec<&str> = summary.pioneers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Zoe Adams", "Ben Young"]);

        let young = &summary.pioneers[1];
        assert_eq!(young.goal, 50);
        assert_eq!(young.remaining, 10);
        assert!(!young.on_track);
        assert_eq!(summary.total_pioneer_hours, 40);
    }

    #[test]
    fn test_huge_hours_saturate() {
        let pioneer = member("Ada", "Lane", PioneerStatus::Regular);
        let reports = vec![
            MonthlyReport {
                regular_pioneer: true,
                bible_studies: i64::MAX,
                ..report(pioneer.id, "2024-09", i64::MAX)
            },
            MonthlyReport {
                regular_pioneer: true,
                bible_studies: i64::MAX,
                ..report(pioneer.id, "2024-10", i64::MAX)
            },
        ];

        let record = publisher_record(pioneer.id, 2024, &reports);
        assert_eq!(record.totals.hours, i64::MAX);

        let totals = congregation_totals(2024, &reports);
        assert_eq!(totals.totals.total_hours, i64::MAX);
        assert_eq!(totals.totals.regular_pioneer_hours, i64::MAX);
        assert_eq!(totals.totals.total_bible_studies, i64::MAX);

        let summary = pioneer_summary(2024, &[pioneer], &reports, i64::MAX);
        assert_eq!(summary.total_pioneer_hours, i64::MAX);
        assert_eq!(summary.pioneers[0].pioneer_hours, i64::MAX);
        assert_eq!(summary.pioneers[0].remaining, 0);
    }
}
