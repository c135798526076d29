//! Versioned schema for the cache, outbox and remote log tables.

use libsql::Connection;

use crate::error::{Error, Result};

struct Migration {
    version: i64,
    name: &'static str,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "local cache and outbox",
        statements: &[
            // Wholesale key/value snapshots (key 'messages')
            "CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS outbox (
                id TEXT PRIMARY KEY,
                message TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE INDEX IF NOT EXISTS idx_outbox_created ON outbox(created_at ASC)",
        ],
    },
    Migration {
        version: 2,
        name: "ordered message log",
        statements: &[
            "CREATE TABLE IF NOT EXISTS remote_messages (
                id TEXT PRIMARY KEY,
                client_id TEXT UNIQUE,
                record TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_remote_messages_created
                ON remote_messages(created_at DESC)",
        ],
    },
];

/// Apply every migration newer than the recorded schema version.
pub async fn run(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
        (),
    )
    .await?;
    let current = schema_version(conn).await?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(conn, migration).await?;
        tracing::info!(
            "Migrated database to version {} ({})",
            migration.version,
            migration.name
        );
    }
    Ok(())
}

async fn schema_version(conn: &Connection) -> Result<i64> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get(0)?),
        None => Ok(0),
    }
}

async fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let outcome = async {
        for statement in migration.statements {
            conn.execute(statement, ()).await?;
        }
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?)",
            [migration.version],
        )
        .await?;
        conn.execute("COMMIT", ()).await?;
        Ok::<(), Error>(())
    }
    .await;

    if outcome.is_err() {
        conn.execute("ROLLBACK", ()).await.ok();
    }
    outcome
}
