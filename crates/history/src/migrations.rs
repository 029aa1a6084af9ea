use chrono::Utc;
use libsql::Connection;

use crate::error::Result;

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 3;

/// Bring the schema up to [`SCHEMA_VERSION`], applying each missing step once
pub async fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let current_version = current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::debug!("History schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Migrating history schema from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Check results").await?;
    }

    if current_version < 2 {
        run_migration_v2(conn).await?;
        record_migration(conn, 2, "Per-target health state").await?;
    }

    if current_version < 3 {
        run_migration_v3(conn).await?;
        record_migration(conn, 3, "Alert records").await?;
    }

    Ok(())
}

pub async fn current_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    match rows.next().await? {
        Some(row) => Ok(row.get::<Option<i32>>(0)?.unwrap_or(0)),
        None => Ok(0),
    }
}

async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, Utc::now().timestamp(), description],
    )
    .await?;

    tracing::info!("Applied migration v{}: {}", version, description);
    Ok(())
}

/// Migration v1: one row per check attempt
async fn run_migration_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS checks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            target TEXT NOT NULL,
            address TEXT NOT NULL,
            ok INTEGER NOT NULL,
            latency_ms INTEGER,
            status_code INTEGER,
            error TEXT,
            ts INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_checks_target_ts ON checks(target, ts DESC)", ()).await?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_checks_ts ON checks(ts DESC)", ()).await?;

    Ok(())
}

/// Migration v2: latest confirmed state per target, upserted after each check
async fn run_migration_v2(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS target_states (
            target TEXT PRIMARY KEY,
            health TEXT NOT NULL,
            consecutive_failures INTEGER NOT NULL DEFAULT 0,
            consecutive_successes INTEGER NOT NULL DEFAULT 0,
            last_transition_at INTEGER,
            last_alert_at INTEGER,
            updated_at INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    Ok(())
}

/// Migration v3: dispatched alerts with their per-channel outcome as JSON
async fn run_migration_v3(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS alerts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            target TEXT NOT NULL,
            health TEXT NOT NULL,
            ts INTEGER NOT NULL,
            deliveries TEXT NOT NULL DEFAULT '[]'
        )",
        (),
    )
    .await?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_alerts_ts ON alerts(ts DESC)", ()).await?;

    Ok(())
}
