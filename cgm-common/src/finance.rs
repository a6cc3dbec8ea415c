//! Contribution and expense analytics
//!
//! Monthly figures reuse the service-year buckets from
//! [`crate::service_year`], so a financial year lines up with the
//! publisher records.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::db::models::{Transaction, TransactionKind};
use crate::service_year::{saturating_sum, service_year_label, service_year_months, MonthKey};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyFinance {
    pub month: MonthKey,
    pub contributions_cents: i64,
    pub expenses_cents: i64,
    pub net_cents: i64,
    /// Balance at month end
    pub closing_balance_cents: i64,
}

/// Month-by-month figures for every month that has transactions
///
/// The running balance starts from `opening_balance_cents`.
pub fn monthly_summary(transactions: &[Transaction], opening_balance_cents: i64) -> Vec<MonthlyFinance> {
    let mut by_month: BTreeMap<MonthKey, (i64, i64)> = BTreeMap::new();
    for tx in transactions {
        let entry = by_month.entry(MonthKey::from_date(tx.date)).or_default();
        match tx.kind {
            TransactionKind::Contribution => entry.0 = entry.0.saturating_add(tx.amount_cents),
            TransactionKind::Expense => entry.1 = entry.1.saturating_add(tx.amount_cents),
        }
    }

    let mut balance = opening_balance_cents;
    by_month
        .into_iter()
        .map(|(month, (contributions_cents, expenses_cents))| {
            let net_cents = contributions_cents.saturating_sub(expenses_cents);
            balance = balance.saturating_add(net_cents);
            MonthlyFinance {
                month,
                contributions_cents,
                expenses_cents,
                net_cents,
                closing_balance_cents: balance,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceYearFinance {
    pub service_year: i32,
    pub label: String,
    pub opening_balance_cents: i64,
    /// Twelve months, September first
    pub months: Vec<MonthlyFinance>,
    pub total_contributions_cents: i64,
    pub total_expenses_cents: i64,
    pub net_cents: i64,
    pub closing_balance_cents: i64,
    pub average_monthly_contribution_cents: i64,
}

/// September–August financial summary
///
/// `opening_balance_cents` is the balance before any transaction; activity
/// dated before the service year is folded into the year's opening balance.
pub fn service_year_finance(
    service_year: i32,
    transactions: &[Transaction],
    opening_balance_cents: i64,
) -> ServiceYearFinance {
    let months = service_year_months(service_year);
    let first = months[0];

    let mut opening = opening_balance_cents;
    let mut buckets = [(0i64, 0i64); 12];
    for tx in transactions {
        let month = MonthKey::from_date(tx.date);
        let signed = match tx.kind {
            TransactionKind::Contribution => tx.amount_cents,
            TransactionKind::Expense => tx.amount_cents.saturating_neg(),
        };
        if month < first {
            opening = opening.saturating_add(signed);
        } else if month.service_year() == service_year {
            let bucket = &mut buckets[month.index_in_service_year()];
            match tx.kind {
                TransactionKind::Contribution => bucket.0 = bucket.0.saturating_add(tx.amount_cents),
                TransactionKind::Expense => bucket.1 = bucket.1.saturating_add(tx.amount_cents),
            }
        }
    }

    let mut balance = opening;
    let rows: Vec<MonthlyFinance> = months
        .iter()
        .zip(buckets)
        .map(|(&month, (contributions_cents, expenses_cents))| {
            let net_cents = contributions_cents.saturating_sub(expenses_cents);
            balance = balance.saturating_add(net_cents);
            MonthlyFinance {
                month,
                contributions_cents,
                expenses_cents,
                net_cents,
                closing_balance_cents: balance,
            }
        })
        .collect();

    let total_contributions_cents = saturating_sum(rows.iter().map(|m| m.contributions_cents));
    let total_expenses_cents = saturating_sum(rows.iter().map(|m| m.expenses_cents));

    ServiceYearFinance {
        service_year,
        label: service_year_label(service_year),
        opening_balance_cents: opening,
        months: rows,
        total_contributions_cents,
        total_expenses_cents,
        net_cents: total_contributions_cents.saturating_sub(total_expenses_cents),
        closing_balance_cents: balance,
        average_monthly_contribution_cents: total_contributions_cents / 12,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total_cents: i64,
    /// Share of the kind's total in tenths of a percent
    pub share_per_mille: i64,
}

/// Totals per category for one kind, largest first (ties by name)
pub fn category_breakdown(transactions: &[Transaction], kind: TransactionKind) -> Vec<CategoryTotal> {
    let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
    for tx in transactions.iter().filter(|t| t.kind == kind) {
        let total = totals.entry(tx.category.as_str()).or_default();
        *total = total.saturating_add(tx.amount_cents);
    }

    let grand_total = saturating_sum(totals.values().copied());
    let mut rows: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, total_cents)| CategoryTotal {
            category: category.to_string(),
            total_cents,
            share_per_mille: if grand_total == 0 {
                0
            } else {
                (i128::from(total_cents) * 1000 / i128::from(grand_total)) as i64
            },
        })
        .collect();

    rows.sort_by(|a, b| b.total_cents.cmp(&a.total_cents).then_with(|| a.category.cmp(&b.category)));
    rows
}

/// `1234567` -> `"12345.67"`
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn tx(date: &str, kind: TransactionKind, category: &str, amount_cents: i64) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            kind,
            category: category.to_string(),
            amount_cents,
            description: None,
        }
    }

    #[test]
    fn test_monthly_summary_running_balance() {
        let txs = vec![
            tx("2024-10-05", TransactionKind::Contribution, "Local", 10_000),
            tx("2024-09-10", TransactionKind::Contribution, "Local", 5_000),
            tx("2024-10-20", TransactionKind::Expense, "Utilities", 3_000),
        ];
        let months = monthly_summary(&txs, 1_000);
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month.to_string(), "2024-09");
        assert_eq!(months[0].closing_balance_cents, 6_000);
        assert_eq!(months[1].net_cents, 7_000);
        assert_eq!(months[1].closing_balance_cents, 13_000);
    }

    #[test]
    fn test_service_year_finance_buckets_and_opening() {
        let txs = vec![
            tx("2024-08-31", TransactionKind::Contribution, "Local", 2_000), // previous year
            tx("2024-09-01", TransactionKind::Contribution, "Local", 12_000),
            tx("2025-01-15", TransactionKind::Expense, "Repairs", 4_000),
            tx("2025-09-01", TransactionKind::Contribution, "Local", 99_000), // next year
        ];
        let summary = service_year_finance(2024, &txs, 500);

        assert_eq!(summary.opening_balance_cents, 2_500);
        assert_eq!(summary.months.len(), 12);
        assert_eq!(summary.months[0].contributions_cents, 12_000);
        assert_eq!(summary.months[4].expenses_cents, 4_000);
        assert_eq!(summary.total_contributions_cents, 12_000);
        assert_eq!(summary.net_cents, 8_000);
        assert_eq!(summary.closing_balance_cents, 10_500);
        assert_eq!(summary.months[11].closing_balance_cents, 10_500);
        assert_eq!(summary.average_monthly_contribution_cents, 1_000);
    }

    #[test]
    fn test_category_breakdown_sorted_with_shares() {
        let txs = vec![
            tx("2024-09-01", TransactionKind::Expense, "Utilities", 3_000),
            tx("2024-09-02", TransactionKind::Expense, "Repairs", 1_000),
            tx("2024-09-03", TransactionKind::Expense, "Utilities", 1_000),
            tx("2024-09-04", TransactionKind::Contribution, "Local", 50_000),
        ];
        let rows = category_breakdown(&txs, TransactionKind::Expense);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category, "Utilities");
        assert_eq!(rows[0].total_cents, 4_000);
        assert_eq!(rows[0].share_per_mille, 800);
        assert_eq!(rows[1].share_per_mille, 200);
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(1_234_567), "12345.67");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(-250), "-2.50");
    }

    #[test]
    fn test_huge_amounts_do_not_overflow() {
        let txs = vec![
            tx("2024-09-01", TransactionKind::Contribution, "Building", 10_i64.pow(16)),
            tx("2024-09-02", TransactionKind::Contribution, "Building", i64::MAX),
            tx("2024-09-03", TransactionKind::Contribution, "Local", 10_i64.pow(16)),
            tx("2024-10-01", TransactionKind::Expense, "Repairs", i64::MAX),
        ];

        let breakdown = category_breakdown(&txs, TransactionKind::Contribution);
        assert_eq!(breakdown[0].category, "Building");
        assert_eq!(breakdown[0].total_cents, i64::MAX);
        assert!(breakdown.iter().all(|c| (0..=1000).contains(&c.share_per_mille)));

        let months = monthly_summary(&txs, i64::MAX);
        assert_eq!(months[0].closing_balance_cents, i64::MAX);
        assert_eq!(months[1].net_cents, -i64::MAX);

        let summary = service_year_finance(2024, &txs, 0);
        assert_eq!(summary.total_contributions_cents, i64::MAX);
        assert_eq!(summary.total_expenses_cents, i64::MAX);
        assert_eq!(summary.net_cents, 0);
    }
}
