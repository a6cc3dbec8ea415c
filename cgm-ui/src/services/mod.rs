//! Outbound services

pub mod workbook_client;

pub use workbook_client::{WorkbookClient, WorkbookClientError, WorkbookParser, WorkbookWeek};
