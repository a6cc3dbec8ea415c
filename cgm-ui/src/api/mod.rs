//! HTTP API handlers for cgm-ui

pub mod assignments;
pub mod cleaning;
pub mod export;
pub mod finance;
pub mod health;
pub mod members;
pub mod messages;
pub mod reports;
pub mod settings;
pub mod sse;
pub mod territories;
pub mod workbook;

pub use assignments::assignment_routes;
pub use cleaning::cleaning_routes;
pub use export::export_routes;
pub use finance::finance_routes;
pub use health::health_routes;
pub use members::member_routes;
pub use messages::message_routes;
pub use reports::report_routes;
pub use settings::settings_routes;
pub use sse::sse_routes;
pub use territories::territory_routes;
pub use workbook::workbook_routes;
