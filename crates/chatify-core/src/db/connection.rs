//! libSQL database handle shared by the cache, outbox and remote log.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use libsql::{Builder, Connection, Database as LibSqlDatabase};

use super::migrations;
use crate::error::{Error, Result};

/// How often an embedded replica pulls in the background.
pub const DEFAULT_REPLICA_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Pragmas applied on open. Failures of optional ones are ignored
/// (embedded replicas reject some of them).
const PRAGMAS: [(&str, bool); 4] = [
    ("PRAGMA journal_mode = WAL;", false),
    ("PRAGMA synchronous = NORMAL;", false),
    ("PRAGMA busy_timeout = 5000;", false),
    ("PRAGMA foreign_keys = ON;", true),
];

/// Turso embedded replica of the shared message log
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SyncConfig {
    /// Remote database URL (e.g., `libsql://chat.turso.io`)
    pub url: Option<String>,
    /// Authentication token for remote database
    pub auth_token: Option<String>,
    /// Background pull interval; `None` syncs only on demand
    pub sync_interval: Option<Duration>,
}

impl SyncConfig {
    pub fn new(url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            auth_token: Some(auth_token.into()),
            sync_interval: Some(DEFAULT_REPLICA_SYNC_INTERVAL),
        }
    }

    pub const fn is_configured(&self) -> bool {
        self.url.is_some() && self.auth_token.is_some()
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncConfig")
            .field("url", &self.url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("sync_interval", &self.sync_interval)
            .finish()
    }
}

/// Where a [`Database`] keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Memory,
    File(PathBuf),
    Replica { path: PathBuf, url: String },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("in-memory database"),
            Self::File(path) => write!(f, "database {}", path.display()),
            Self::Replica { path, url } => {
                write!(f, "replica {} of {url}", path.display())
            }
        }
    }
}

/// An open libSQL database with the chat schema applied
pub struct Database {
    db: LibSqlDatabase,
    conn: Connection,
    location: Location,
}

impl Database {
    /// Open (or create) a local database file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = Builder::new_local(&path).build().await?;
        Self::prepare(db, Location::File(path)).await
    }

    /// Open a throwaway in-memory database.
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::prepare(db, Location::Memory).await
    }

    /// Open an embedded replica of a remote Turso database.
    ///
    /// Reads are served from `local_path`; writes go to the remote and come
    /// back on the next sync. The first sync happens before migrations so an
    /// existing remote schema is picked up instead of recreated.
    pub async fn open_with_sync(
        local_path: impl AsRef<Path>,
        sync_config: SyncConfig,
    ) -> Result<Self> {
        let (Some(url), Some(token)) = (sync_config.url, sync_config.auth_token) else {
            return Err(Error::InvalidInput(
                "Replica needs both a sync URL and an auth token".to_string(),
            ));
        };
        let path = local_path.as_ref().to_path_buf();

        let mut builder = Builder::new_remote_replica(&path, url.clone(), token);
        if let Some(interval) = sync_config.sync_interval {
            builder = builder.sync_interval(interval);
        }
        let db = builder.build().await?;

        db.sync()
            .await
            .map_err(|error| Error::Network(format!("Initial sync with {url} failed: {error}")))?;
        Self::prepare(db, Location::Replica { path, url }).await
    }

    async fn prepare(db: LibSqlDatabase, location: Location) -> Result<Self> {
        let conn = db.connect()?;
        for (pragma, required) in PRAGMAS {
            match conn.execute(pragma, ()).await {
                Ok(_) => {}
                Err(error) if required => return Err(error.into()),
                Err(error) => tracing::debug!("Skipping `{pragma}` on {location}: {error}"),
            }
        }
        migrations::run(&conn).await?;

        tracing::debug!("Opened {location}");
        Ok(Self { db, conn, location })
    }

    /// Pull remote changes into a replica. No-op for local databases.
    pub async fn sync(&self) -> Result<()> {
        if let Location::Replica { url, .. } = &self.location {
            self.db
                .sync()
                .await
                .map_err(|error| Error::Network(format!("Sync with {url} failed: {error}")))?;
            tracing::debug!("Synced {}", self.location);
        }
        Ok(())
    }

    pub const fn is_sync_enabled(&self) -> bool {
        matches!(self.location, Location::Replica { .. })
    }

    pub const fn location(&self) -> &Location {
        &self.location
    }

    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    async fn count(db: &Database, table: &str) -> i64 {
        let mut rows = db
            .connection()
            .query(&format!("SELECT COUNT(*) FROM {table}"), ())
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get(0).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_database_is_local_only() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(!db.is_sync_enabled());
        assert_eq!(db.location(), &Location::Memory);
        db.sync().await.unwrap();
        assert_eq!(count(&db, "remote_messages").await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn local_file_keeps_rows_across_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("chatify.db");

        let db = Database::open(&path).await.unwrap();
        db.connection()
            .execute(
                "INSERT INTO cache_entries (key, value, updated_at) VALUES ('messages', '[]', 1)",
                (),
            )
            .await
            .unwrap();
        drop(db);

        let db = Database::open(&path).await.unwrap();
        assert_eq!(db.location(), &Location::File(path));
        assert_eq!(count(&db, "cache_entries").await, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replica_requires_url_and_token() {
        let tmp = tempdir().unwrap();
        let error = Database::open_with_sync(tmp.path().join("replica.db"), SyncConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[test]
    fn sync_config_defaults_to_background_pulls() {
        let config = SyncConfig::new("libsql://chat.turso.io", "token");
        assert!(config.is_configured());
        assert_eq!(config.sync_interval, Some(DEFAULT_REPLICA_SYNC_INTERVAL));
        assert!(!SyncConfig::default().is_configured());
    }

    #[test]
    fn sync_config_debug_redacts_token() {
        let config = SyncConfig::new("libsql://chat.turso.io", "secret-token");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn locations_describe_themselves() {
        let replica = Location::Replica {
            path: PathBuf::from("/tmp/replica.db"),
            url: "libsql://chat.turso.io".to_string(),
        };
        assert_eq!(
            replica.to_string(),
            "replica /tmp/replica.db of libsql://chat.turso.io"
        );
        assert_eq!(Location::Memory.to_string(), "in-memory database");
    }

    /// Run with: TURSO_DATABASE_URL=... TURSO_AUTH_TOKEN=... cargo test replica_syncs_with_turso -- --ignored
    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "Requires TURSO_DATABASE_URL and TURSO_AUTH_TOKEN"]
    async fn replica_syncs_with_turso() {
        let url = env::var("TURSO_DATABASE_URL").expect("TURSO_DATABASE_URL must be set");
        let token = env::var("TURSO_AUTH_TOKEN").expect("TURSO_AUTH_TOKEN must be set");

        let tmp = tempdir().unwrap();
        let db = Database::open_with_sync(tmp.path().join("replica.db"), SyncConfig::new(url, token))
            .await
            .unwrap();
        assert!(db.is_sync_enabled());
        assert!(count(&db, "remote_messages").await >= 0);
        db.sync().await.expect("Sync should succeed");
    }
}
