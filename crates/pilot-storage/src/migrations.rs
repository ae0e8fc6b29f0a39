//! Schema initialization and legacy repair.
//!
//! Runs on every process start. Creates any missing table, then brings
//! installations that predate tenant isolation up to date: uniquely keyed
//! legacy tables are moved aside to `<table>_v1_backup`, and every other table
//! gains a `tenant_id` column defaulting to the bootstrap tenant so its rows
//! stay visible to the original operator. Individual corrective steps that
//! fail are logged and skipped; they never abort startup.

use rusqlite::Connection;
use tracing::{info, warn};

use pilot_core::error::{PilotError, Result};
use pilot_core::types::TenantId;

use crate::tenants::hash_secret;

/// Tables whose unique keys clash with the tenant-scoped ones; legacy copies are renamed.
const QUARANTINED_TABLES: [&str; 3] = ["custom_agents", "custom_tasks", "agent_memory"];

/// Every tenant-scoped table.
const TENANT_TABLES: [&str; 8] = [
    "leads",
    "telephony_logs",
    "agent_memory",
    "social_posts",
    "agent_outputs",
    "custom_agents",
    "custom_tasks",
    "pending_actions",
];

/// Columns added after the first release, as (table, column, declaration).
const LATE_COLUMNS: [(&str, &str, &str); 10] = [
    ("leads", "email", "TEXT"),
    ("leads", "research_summary", "TEXT"),
    ("leads", "attempts", "INTEGER NOT NULL DEFAULT 0"),
    ("leads", "last_error", "TEXT"),
    ("leads", "updated_at", "INTEGER"),
    ("telephony_logs", "transcript", "TEXT"),
    ("agent_outputs", "status", "TEXT DEFAULT 'Success'"),
    ("agent_outputs", "execution_time", "REAL"),
    ("agent_outputs", "metadata", "TEXT"),
    ("agent_outputs", "tokens_used", "INTEGER"),
];

/// Timestamp columns, as (table, column). Legacy rows hold `DATETIME` text here.
const TIMESTAMP_COLUMNS: [(&str, &str); 9] = [
    ("tenants", "created_at"),
    ("leads", "created_at"),
    ("leads", "updated_at"),
    ("telephony_logs", "timestamp"),
    ("agent_memory", "updated_at"),
    ("social_posts", "timestamp"),
    ("agent_outputs", "timestamp"),
    ("custom_tasks", "timestamp"),
    ("pending_actions", "timestamp"),
];

const SCHEMA_VERSION: i64 = 1;
const DEFAULT_ADMIN_NAME: &str = "admin";
const DEFAULT_ADMIN_SECRET: &str = "admin123";

/// Create and repair the schema. Idempotent.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| PilotError::Storage(format!("Failed to create migrations table: {}", e)))?;

    quarantine_legacy_tables(conn);
    create_tables(conn)?;
    adopt_legacy_rows(conn);
    normalize_timestamps(conn);
    create_indexes(conn);
    bootstrap_tenant(conn)?;

    let applied = conn
        .execute(
            "INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (?1, 'tenant_schema')",
            rusqlite::params![SCHEMA_VERSION],
        )
        .map_err(|e| PilotError::Storage(format!("Failed to record migration: {}", e)))?;
    if applied > 0 {
        info!("Applied migration v{}: tenant_schema", SCHEMA_VERSION);
    }

    Ok(())
}

/// Column names of a table; empty when the table does not exist.
pub fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = match conn.prepare(&format!("PRAGMA table_info({})", table)) {
        Ok(stmt) => stmt,
        Err(_) => return Vec::new(),
    };
    let rows = match stmt.query_map([], |row| row.get::<_, String>(1)) {
        Ok(rows) => rows,
        Err(_) => return Vec::new(),
    };
    rows.filter_map(|r| r.ok()).collect()
}

fn has_column(columns: &[String], name: &str) -> bool {
    columns.iter().any(|c| c == name)
}

/// Run one corrective statement; failures are logged and swallowed.
fn try_step(conn: &Connection, sql: &str) {
    if let Err(e) = conn.execute_batch(sql) {
        warn!(error = %e, sql, "Schema repair step skipped");
    }
}

fn quarantine_legacy_tables(conn: &Connection) {
    for table in QUARANTINED_TABLES {
        let columns = table_columns(conn, table);
        if columns.is_empty()
            || has_column(&columns, "tenant_id")
            || has_column(&columns, "user_id")
        {
            continue;
        }
        info!(table, "Moving legacy table aside");
        try_step(
            conn,
            &format!("ALTER TABLE {table} RENAME TO {table}_v1_backup"),
        );
    }
}

fn adopt_legacy_rows(conn: &Connection) {
    for table in TENANT_TABLES {
        let columns = table_columns(conn, table);
        if columns.is_empty() || has_column(&columns, "tenant_id") {
            continue;
        }
        info!(table, "Adding tenant_id to legacy table");
        try_step(
            conn,
            &format!(
                "ALTER TABLE {table} ADD COLUMN tenant_id INTEGER NOT NULL DEFAULT {}",
                TenantId::BOOTSTRAP.0
            ),
        );
        // Tables from the per-user era keep their owner.
        if has_column(&columns, "user_id") {
            try_step(
                conn,
                &format!("UPDATE {table} SET tenant_id = user_id WHERE user_id IS NOT NULL"),
            );
        }
    }

    for (table, column, decl) in LATE_COLUMNS {
        let columns = table_columns(conn, table);
        if columns.is_empty() || has_column(&columns, column) {
            continue;
        }
        try_step(conn, &format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"));
    }
}

/// Rewrite legacy text timestamps as unix seconds.
///
/// SQLite orders every TEXT value after every INTEGER, so mixed columns would
/// put legacy rows ahead of new ones in newest-first lists.
fn normalize_timestamps(conn: &Connection) {
    for (table, column) in TIMESTAMP_COLUMNS {
        if !has_column(&table_columns(conn, table), column) {
            continue;
        }
        try_step(
            conn,
            &format!(
                "UPDATE {table} SET {column} = CAST(strftime('%s', {column}) AS INTEGER)
                 WHERE typeof({column}) = 'text' AND strftime('%s', {column}) IS NOT NULL"
            ),
        );
    }
}

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tenants (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT NOT NULL UNIQUE,
            secret_hash     TEXT NOT NULL,
            api_key         TEXT,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE TABLE IF NOT EXISTS leads (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id       INTEGER NOT NULL DEFAULT 1,
            name            TEXT NOT NULL,
            phone           TEXT NOT NULL,
            email           TEXT,
            status          TEXT NOT NULL DEFAULT 'Pending'
                            CHECK (status IN ('Pending', 'Contacting', 'Completed', 'Failed')),
            research_summary TEXT,
            attempts        INTEGER NOT NULL DEFAULT 0,
            last_error      TEXT,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            updated_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE TABLE IF NOT EXISTS telephony_logs (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id       INTEGER NOT NULL DEFAULT 1,
            lead_id         INTEGER,
            provider        TEXT NOT NULL,
            sid             TEXT,
            type            TEXT NOT NULL CHECK (type IN ('sms', 'call')),
            result          TEXT,
            transcript      TEXT,
            timestamp       INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE TABLE IF NOT EXISTS agent_memory (
            tenant_id       INTEGER NOT NULL DEFAULT 1,
            key             TEXT NOT NULL,
            value           TEXT NOT NULL,
            updated_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            PRIMARY KEY (tenant_id, key)
        );

        CREATE TABLE IF NOT EXISTS social_posts (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id       INTEGER NOT NULL DEFAULT 1,
            platform        TEXT NOT NULL,
            topic           TEXT NOT NULL,
            content         TEXT NOT NULL,
            status          TEXT NOT NULL DEFAULT 'Pending',
            timestamp       INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE TABLE IF NOT EXISTS agent_outputs (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id       INTEGER NOT NULL DEFAULT 1,
            crew_name       TEXT NOT NULL,
            output          TEXT NOT NULL,
            status          TEXT DEFAULT 'Success',
            execution_time  REAL,
            metadata        TEXT,
            tokens_used     INTEGER,
            timestamp       INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE TABLE IF NOT EXISTS custom_agents (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id       INTEGER NOT NULL DEFAULT 1,
            name            TEXT NOT NULL,
            role            TEXT NOT NULL,
            goal            TEXT NOT NULL,
            backstory       TEXT NOT NULL,
            temperature     REAL NOT NULL DEFAULT 0.7,
            tools           TEXT NOT NULL DEFAULT '',
            UNIQUE (tenant_id, name)
        );

        CREATE TABLE IF NOT EXISTS custom_tasks (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id       INTEGER NOT NULL DEFAULT 1,
            name            TEXT NOT NULL,
            description     TEXT NOT NULL,
            expected_output TEXT NOT NULL,
            agent_name      TEXT NOT NULL DEFAULT '',
            timestamp       INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            UNIQUE (tenant_id, name)
        );

        CREATE TABLE IF NOT EXISTS pending_actions (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id       INTEGER NOT NULL DEFAULT 1,
            tool_name       TEXT NOT NULL,
            action_details  TEXT NOT NULL,
            status          TEXT NOT NULL DEFAULT 'Pending'
                            CHECK (status IN ('Pending', 'Approved', 'Rejected')),
            feedback        TEXT,
            timestamp       INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );
        ",
    )
    .map_err(|e| PilotError::Storage(format!("Failed to create tables: {}", e)))
}

/// Indexes are created after legacy repair so `tenant_id` exists on every table.
fn create_indexes(conn: &Connection) {
    for sql in [
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_agent_memory_tenant_key
            ON agent_memory (tenant_id, key)",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_custom_agents_tenant_name
            ON custom_agents (tenant_id, name)",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_custom_tasks_tenant_name
            ON custom_tasks (tenant_id, name)",
        "CREATE INDEX IF NOT EXISTS idx_leads_tenant_status
            ON leads (tenant_id, status)",
        "CREATE INDEX IF NOT EXISTS idx_pending_actions_tenant_status
            ON pending_actions (tenant_id, status)",
        "CREATE INDEX IF NOT EXISTS idx_telephony_logs_tenant
            ON telephony_logs (tenant_id, timestamp DESC)",
    ] {
        try_step(conn, sql);
    }
}

/// Seed the bootstrap tenant so rows adopted from a single-user install have an owner.
fn bootstrap_tenant(conn: &Connection) -> Result<()> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM tenants", [], |row| row.get(0))
        .map_err(|e| PilotError::Storage(format!("Failed to count tenants: {}", e)))?;
    if count == 0 {
        conn.execute(
            "INSERT INTO tenants (id, name, secret_hash) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                TenantId::BOOTSTRAP.0,
                DEFAULT_ADMIN_NAME,
                hash_secret(DEFAULT_ADMIN_SECRET)
            ],
        )
        .map_err(|e| PilotError::Storage(format!("Failed to seed bootstrap tenant: {}", e)))?;
        info!("Seeded bootstrap tenant '{}'", DEFAULT_ADMIN_NAME);
    }
    Ok(())
}
