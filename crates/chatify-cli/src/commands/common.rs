use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chatify_core::cache::LibSqlMessageCache;
use chatify_core::config::ChatConfig;
use chatify_core::connectivity::{
    watch_reachability, ConnectivityMonitor, ConnectivitySubscription, HttpReachabilityProbe,
    ReachabilityProbe,
};
use chatify_core::db::Database;
use chatify_core::models::{DeliveryState, Message, MessageId};
use chatify_core::remote::LibSqlRemoteLog;
use chatify_core::storage::{BlobStore, FsBlobStore, ObjectHandle, R2BlobStore};
use chatify_core::sync::{LibSqlOutbox, SyncController, SyncEvent, SyncMode};
use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::CliError;

/// How long a command waits for the first snapshot after going online.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a send waits for the remote log to confirm the message.
pub const CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

pub const LOCAL_DB_FILE: &str = "chatify.db";
const REPLICA_DB_FILE: &str = "remote-replica.db";
const ATTACHMENTS_DIR: &str = "attachments";

pub type Controller = SyncController<LibSqlRemoteLog, LibSqlMessageCache, LibSqlOutbox>;

#[derive(Debug, Serialize)]
pub struct MessageListItem {
    pub id: String,
    pub author: String,
    pub created_at: i64,
    pub created_at_iso: String,
    pub relative_time: String,
    pub kind: String,
    pub content: String,
    pub delivery: DeliveryState,
}

/// One running client: local store, remote log, connectivity and controller.
pub struct Session {
    pub config: ChatConfig,
    pub controller: Controller,
    pub connectivity: ConnectivitySubscription,
    data_dir: PathBuf,
    _local: Arc<Database>,
    _monitor: ConnectivityMonitor,
    watcher: JoinHandle<()>,
}

impl Session {
    pub async fn open_from_env(data_dir: &Path) -> Result<Self, CliError> {
        let config = ChatConfig::from_env()?;
        Self::open(config, data_dir).await
    }

    pub async fn open(config: ChatConfig, data_dir: &Path) -> Result<Self, CliError> {
        std::fs::create_dir_all(data_dir)?;

        let local = Arc::new(Database::open(data_dir.join(LOCAL_DB_FILE)).await?);
        let (remote_db, reachable) = open_remote_database(&config, data_dir, &local).await?;

        let remote = LibSqlRemoteLog::new(Arc::clone(&remote_db), config.poll_interval);
        let cache = LibSqlMessageCache::new(local.connection().clone());
        let outbox = LibSqlOutbox::new(local.connection().clone());
        let mut controller = SyncController::new(remote, cache, outbox);
        controller.bootstrap().await;

        let monitor = ConnectivityMonitor::new();
        let connectivity = monitor.subscribe();
        let probe = match &config.probe_url {
            Some(url) if reachable => SessionProbe::Http(HttpReachabilityProbe::new(url.clone())?),
            _ => SessionProbe::Replica(ReplicaProbe {
                db: remote_db,
                reachable,
            }),
        };
        monitor.report(probe.check().await);
        let watcher = tokio::spawn(watch_reachability(
            monitor.clone(),
            probe,
            config.poll_interval,
        ));

        Ok(Self {
            config,
            controller,
            connectivity,
            data_dir: data_dir.to_path_buf(),
            _local: local,
            _monitor: monitor,
            watcher,
        })
    }

    /// Apply connectivity readings already known and, when online, wait
    /// (bounded) for the first snapshot.
    pub async fn settle(&mut self) {
        while let Some(status) = self.connectivity.try_recv() {
            self.controller.on_connectivity(status).await;
        }
        if self.controller.mode() != SyncMode::Live {
            return;
        }

        let deadline = Instant::now() + SETTLE_TIMEOUT;
        loop {
            let next = self.controller.next_event(&mut self.connectivity);
            let Ok(Some(event)) = tokio::time::timeout_at(deadline, next).await else {
                tracing::debug!("No snapshot arrived before the settle timeout");
                return;
            };
            let is_snapshot = matches!(event, SyncEvent::Snapshot(_));
            self.controller.handle_event(event).await;
            if is_snapshot || self.controller.mode() != SyncMode::Live {
                return;
            }
        }
    }

    /// Wait until `id` is no longer pending. Returns whether it was confirmed.
    pub async fn wait_for_confirmation(&mut self, id: &MessageId, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while is_pending(self.controller.messages(), id) {
            if self.controller.mode() != SyncMode::Live {
                return false;
            }
            let next = self.controller.next_event(&mut self.connectivity);
            match tokio::time::timeout_at(deadline, next).await {
                Ok(Some(event)) => self.controller.handle_event(event).await,
                Ok(None) | Err(_) => return false,
            }
        }
        true
    }

    pub fn blob_store(&self) -> Result<CliBlobStore, CliError> {
        match &self.config.r2 {
            Some(r2) => Ok(CliBlobStore::R2(R2BlobStore::new(r2.clone()))),
            None => Ok(CliBlobStore::Fs(FsBlobStore::new(
                self.data_dir.join(ATTACHMENTS_DIR),
            )?)),
        }
    }

    pub fn close(mut self) {
        self.controller.shutdown();
        self.watcher.abort();
    }
}

fn is_pending(messages: &[Message], id: &MessageId) -> bool {
    messages
        .iter()
        .any(|message| &message.id == id && message.is_pending())
}

/// Open the database holding the remote log.
///
/// Without Turso the log lives in the local database (single-device mode).
/// When the replica cannot be opened the session runs offline.
async fn open_remote_database(
    config: &ChatConfig,
    data_dir: &Path,
    local: &Arc<Database>,
) -> Result<(Arc<Database>, bool), CliError> {
    let Some(sync) = config.sync.clone() else {
        return Ok((Arc::clone(local), true));
    };

    match Database::open_with_sync(data_dir.join(REPLICA_DB_FILE), sync).await {
        Ok(db) => Ok((Arc::new(db), true)),
        Err(error) => {
            tracing::warn!("Remote log unavailable, starting offline: {error}");
            Ok((Arc::new(Database::open_in_memory().await?), false))
        }
    }
}

/// Probe picked for a session.
enum SessionProbe {
    Http(HttpReachabilityProbe),
    Replica(ReplicaProbe),
}

impl ReachabilityProbe for SessionProbe {
    async fn check(&self) -> Option<bool> {
        match self {
            Self::Http(probe) => probe.check().await,
            Self::Replica(probe) => probe.check().await,
        }
    }
}

/// Reachability of the remote log database itself.
struct ReplicaProbe {
    db: Arc<Database>,
    reachable: bool,
}

impl ReachabilityProbe for ReplicaProbe {
    async fn check(&self) -> Option<bool> {
        if !self.reachable {
            return Some(false);
        }
        if !self.db.is_sync_enabled() {
            return Some(true);
        }
        Some(self.db.sync().await.is_ok())
    }
}

/// Blob store selected by configuration.
pub enum CliBlobStore {
    R2(R2BlobStore),
    Fs(FsBlobStore),
}

impl BlobStore for CliBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> chatify_core::Result<ObjectHandle> {
        match self {
            Self::R2(store) => store.put(key, bytes, content_type).await,
            Self::Fs(store) => store.put(key, bytes, content_type).await,
        }
    }

    async fn url(&self, handle: &ObjectHandle) -> chatify_core::Result<String> {
        match self {
            Self::R2(store) => store.url(handle).await,
            Self::Fs(store) => store.url(handle).await,
        }
    }

    async fn delete(&self, handle: &ObjectHandle) -> chatify_core::Result<()> {
        match self {
            Self::R2(store) => store.delete(handle).await,
            Self::Fs(store) => store.delete(handle).await,
        }
    }
}

pub fn resolve_data_dir(cli_data_dir: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_data_dir {
        Some(path) => Ok(path),
        None => dirs::data_dir()
            .map(|dir| dir.join("chatify"))
            .ok_or(CliError::NoDataDir),
    }
}

pub fn message_to_list_item(message: &Message) -> MessageListItem {
    let now_ms = Utc::now().timestamp_millis();
    MessageListItem {
        id: message.id.to_string(),
        author: message.author.display_name.clone(),
        created_at: message.created_at,
        created_at_iso: format_timestamp(message.created_at),
        relative_time: format_relative_time(message.created_at, now_ms),
        kind: message.payload.kind().to_string(),
        content: message.payload.summary(),
        delivery: message.delivery,
    }
}

pub fn format_message_lines(messages: &[Message]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    messages
        .iter()
        .map(|message| {
            let author = message.author.display_name.chars().take(12).collect::<String>();
            let relative_time = format_relative_time(message.created_at, now_ms);
            let summary = message.payload.summary();

            if message.is_pending() {
                format!("{relative_time:<10}  {author:<12}  {summary}  (pending)")
            } else {
                format!("{relative_time:<10}  {author:<12}  {summary}")
            }
        })
        .collect()
}

pub const fn mode_banner(mode: SyncMode) -> Option<&'static str> {
    match mode {
        SyncMode::Live => None,
        SyncMode::Cached => Some("Offline - showing cached messages"),
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn normalize_message_text(parts: &[String]) -> Result<String, CliError> {
    let text = parts.join(" ");
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyMessage)
    } else {
        Ok(trimmed.to_string())
    }
}
