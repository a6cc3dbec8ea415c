//! Database schema, models and queries
//!
//! Ids are stored as TEXT UUIDs, dates as `YYYY-MM-DD`, months as
//! `YYYY-MM`, enums as their snake_case text form.

pub mod assignments;
pub mod cleaning;
pub mod finance;
pub mod init;
pub mod members;
pub mod messages;
pub mod models;
pub mod reports;
pub mod settings;
pub mod territories;

pub use init::*;
pub use models::*;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;

use crate::{Error, Result};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn parse_uuid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("column {} holds invalid UUID '{}': {}", column, value, e)))
}

pub(crate) fn parse_opt_uuid(column: &str, value: Option<String>) -> Result<Option<Uuid>> {
    value.map(|v| parse_uuid(column, &v)).transpose()
}

pub(crate) fn parse_stored_date(column: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| Error::Internal(format!("column {} holds invalid date '{}': {}", column, value, e)))
}

pub(crate) fn parse_opt_stored_date(column: &str, value: Option<String>) -> Result<Option<NaiveDate>> {
    value.map(|v| parse_stored_date(column, &v)).transpose()
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("column {} holds invalid timestamp '{}': {}", column, value, e)))
}

/// Decode a text-enum column; a bad value means the row is corrupt
pub(crate) fn parse_column<T>(column: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr<Err = Error>,
{
    value
        .parse()
        .map_err(|e| Error::Internal(format!("column {}: {}", column, e)))
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Fixed-width UTC timestamps so they sort as text
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn format_opt_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(format_date)
}

pub(crate) fn opt_uuid_text(id: Option<Uuid>) -> Option<String> {
    id.map(|id| id.to_string())
}
