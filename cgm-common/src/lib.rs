//! # CGM Common Library
//!
//! Shared code for the congregation manager including:
//! - Database schema, models and queries
//! - Service-year bucketing and report aggregation
//! - Territory distribution and division
//! - Meeting assignment rules, cleaning/inventory, finance analytics
//! - Event types (CgmEvent enum) and SSE helpers
//! - Configuration loading

pub mod cleaning;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod export;
pub mod finance;
pub mod meetings;
pub mod overseer;
pub mod service_year;
pub mod sse;
pub mod territory;
pub mod time;

pub use error::{Error, Result};
pub use service_year::MonthKey;
