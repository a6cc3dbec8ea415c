//! Database initialization
//!
//! Creates the database on first run, builds every table idempotently and
//! seeds default settings. Safe to call on every startup.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::db::settings;
use crate::Result;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if needed) the database at `db_path` and build the schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    Ok(pool)
}

/// Same schema on a private in-memory database
///
/// The pool holds exactly one connection that never expires; a second
/// connection would see a different, empty database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_groups_table(pool).await?;
    create_members_table(pool).await?;
    create_assignments_table(pool).await?;
    create_cleaning_tasks_table(pool).await?;
    create_inventory_items_table(pool).await?;
    create_territories_table(pool).await?;
    create_territory_assignments_table(pool).await?;
    create_monthly_reports_table(pool).await?;
    create_transactions_table(pool).await?;
    create_messages_table(pool).await?;
    create_message_reads_table(pool).await?;

    record_schema_version(pool).await?;
    init_default_settings(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn record_schema_version(pool: &SqlitePool) -> Result<()> {
    let result = sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    if result.rows_affected() > 0 {
        info!("Recorded schema version {}", SCHEMA_VERSION);
    }
    Ok(())
}

/// Key-value application settings
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, settings::CONGREGATION_NAME, "").await?;
    ensure_setting(pool, settings::TERRITORY_OVERDUE_DAYS, "120").await?;
    ensure_setting(pool, settings::REGULAR_PIONEER_ANNUAL_GOAL, "600").await?;
    ensure_setting(pool, settings::FINANCE_OPENING_BALANCE_CENTS, "0").await?;
    ensure_setting(pool, settings::INVENTORY_RESTOCK_FACTOR, "2").await?;

    debug!("Default settings initialized");
    Ok(())
}

/// Create `key` with `default_value` if missing; reset it if NULL
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let existing: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match existing {
        None => {
            // OR IGNORE: two processes may initialize at once
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;
            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
        Some(None) => {
            sqlx::query(
                "UPDATE settings SET value = ?, updated_at = CURRENT_TIMESTAMP WHERE key = ?",
            )
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;
            warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
        }
        Some(Some(_)) => {}
    }

    Ok(())
}

/// Field service groups
///
/// Overseer and assistant references are cleared when the member is deleted.
pub async fn create_groups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            overseer_id TEXT REFERENCES members(id) ON DELETE SET NULL,
            assistant_id TEXT REFERENCES members(id) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Congregation members
///
/// `privileges` is a JSON array of privilege tags.
pub async fn create_members_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS members (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            gender TEXT NOT NULL CHECK (gender IN ('male', 'female')),
            appointment TEXT NOT NULL DEFAULT 'none',
            pioneer_status TEXT NOT NULL DEFAULT 'none',
            privileges TEXT NOT NULL DEFAULT '[]',
            group_id TEXT REFERENCES groups(id) ON DELETE SET NULL,
            email TEXT,
            phone TEXT,
            baptized INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_members_group ON members(group_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_members_name ON members(last_name, first_name)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_assignments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assignments (
            id TEXT PRIMARY KEY,
            week_of TEXT NOT NULL,
            meeting_type TEXT NOT NULL CHECK (meeting_type IN ('midweek', 'weekend')),
            assignment_type TEXT NOT NULL,
            assignee_id TEXT NOT NULL REFERENCES members(id) ON DELETE CASCADE,
            assistant_id TEXT REFERENCES members(id) ON DELETE SET NULL,
            title TEXT,
            notes TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_assignments_week ON assignments(week_of)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_assignments_assignee ON assignments(assignee_id)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_cleaning_tasks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cleaning_tasks (
            id TEXT PRIMARY KEY,
            area TEXT NOT NULL,
            group_id TEXT REFERENCES groups(id) ON DELETE SET NULL,
            week_of TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'in_progress', 'completed', 'skipped')),
            notes TEXT,
            completed_at TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cleaning_tasks_week ON cleaning_tasks(week_of)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_inventory_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inventory_items (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            category TEXT NOT NULL DEFAULT '',
            quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
            min_threshold INTEGER NOT NULL DEFAULT 0 CHECK (min_threshold >= 0),
            unit TEXT NOT NULL DEFAULT '',
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Territories; sub-territories point at their parent
pub async fn create_territories_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS territories (
            id TEXT PRIMARY KEY,
            number TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            boundaries TEXT,
            difficulty INTEGER NOT NULL DEFAULT 3 CHECK (difficulty BETWEEN 1 AND 5),
            size INTEGER NOT NULL DEFAULT 0 CHECK (size >= 0),
            group_id TEXT REFERENCES groups(id) ON DELETE SET NULL,
            parent_id TEXT REFERENCES territories(id) ON DELETE SET NULL,
            notes TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_territories_parent ON territories(parent_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Check-out history
///
/// At most one open (not returned) entry per territory.
pub async fn create_territory_assignments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS territory_assignments (
            id TEXT PRIMARY KEY,
            territory_id TEXT NOT NULL REFERENCES territories(id) ON DELETE CASCADE,
            group_id TEXT REFERENCES groups(id) ON DELETE SET NULL,
            member_id TEXT REFERENCES members(id) ON DELETE SET NULL,
            assigned_on TEXT NOT NULL,
            returned_on TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_territory_assignments_open
        ON territory_assignments(territory_id) WHERE returned_on IS NULL
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One field service report per member and month
pub async fn create_monthly_reports_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS monthly_reports (
            id TEXT PRIMARY KEY,
            member_id TEXT NOT NULL REFERENCES members(id) ON DELETE CASCADE,
            month TEXT NOT NULL,
            participated INTEGER NOT NULL DEFAULT 1,
            hours INTEGER NOT NULL DEFAULT 0 CHECK (hours >= 0),
            bible_studies INTEGER NOT NULL DEFAULT 0 CHECK (bible_studies >= 0),
            auxiliary_pioneer INTEGER NOT NULL DEFAULT 0,
            regular_pioneer INTEGER NOT NULL DEFAULT 0,
            remarks TEXT,
            submitted_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (member_id, month)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_monthly_reports_month ON monthly_reports(month)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_transactions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('contribution', 'expense')),
            category TEXT NOT NULL,
            amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
            description TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_messages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            sender_id TEXT REFERENCES members(id) ON DELETE SET NULL,
            audience_kind TEXT NOT NULL CHECK (audience_kind IN ('member', 'group', 'everyone')),
            audience_id TEXT,
            subject TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Per-member read receipts
pub async fn create_message_reads_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS message_reads (
            message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            member_id TEXT NOT NULL REFERENCES members(id) ON DELETE CASCADE,
            read_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (message_id, member_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
