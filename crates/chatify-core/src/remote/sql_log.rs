//! Remote log backed by a libSQL table.
//!
//! With an embedded replica the table lives in Turso and every poll pulls
//! the latest frames before reading; a local database gives a single-device
//! log that behaves the same way.

use std::sync::Arc;
use std::time::Duration;

use libsql::Connection;

use super::{snapshot_channel, RemoteLog, RemoteRecord, SnapshotPublisher, Subscription};
use crate::db::Database;
use crate::models::{Message, MessageId};
use crate::{Error, Result};

/// Remote log stored in the `remote_messages` table.
#[derive(Clone)]
pub struct LibSqlRemoteLog {
    db: Arc<Database>,
    poll_interval: Duration,
}

impl LibSqlRemoteLog {
    pub fn new(db: Arc<Database>, poll_interval: Duration) -> Self {
        Self { db, poll_interval }
    }

    /// Read the whole log once, newest first.
    pub async fn snapshot(&self) -> Result<Vec<Message>> {
        self.db.sync().await?;
        load_snapshot(self.db.connection()).await
    }
}

impl RemoteLog for LibSqlRemoteLog {
    fn subscribe(&self, generation: u64) -> Result<Subscription> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Network(format!("No async runtime for subscription: {e}")))?;
        let (publisher, subscription) = snapshot_channel(generation);
        handle.spawn(poll_snapshots(
            Arc::clone(&self.db),
            publisher,
            self.poll_interval,
        ));
        tracing::debug!("Opened remote subscription generation {generation}");
        Ok(subscription)
    }

    async fn append(&self, message: &Message) -> Result<()> {
        let record = RemoteRecord::from(message);
        let raw = serde_json::to_string(&record)?;
        let server_id = MessageId::new();

        let inserted = self
            .db
            .connection()
            .execute(
                "INSERT OR IGNORE INTO remote_messages (id, client_id, record, created_at)
                 VALUES (?, ?, ?, ?)",
                libsql::params![
                    server_id.as_str(),
                    message.id.as_str(),
                    raw,
                    message.created_at
                ],
            )
            .await
            .map_err(|e| Error::Network(format!("Failed to append message: {e}")))?;

        if inserted == 0 {
            tracing::debug!("Message {} already in remote log", message.id);
        } else {
            tracing::debug!("Appended {} message {}", message.payload.kind(), message.id);
        }
        Ok(())
    }
}

async fn poll_snapshots(db: Arc<Database>, publisher: SnapshotPublisher, interval: Duration) {
    let mut last: Option<Vec<Message>> = None;

    while !publisher.is_cancelled() {
        if let Err(error) = db.sync().await {
            tracing::warn!("Remote sync failed: {error}");
        }

        match load_snapshot(db.connection()).await {
            Ok(messages) if last.as_ref() != Some(&messages) => {
                if !publisher.publish(messages.clone()) {
                    break;
                }
                last = Some(messages);
            }
            Ok(_) => {}
            Err(error) => tracing::warn!("Failed to read remote log: {error}"),
        }

        tokio::time::sleep(interval).await;
    }

    tracing::debug!(
        "Remote subscription generation {} stopped",
        publisher.generation()
    );
}

async fn load_snapshot(conn: &Connection) -> Result<Vec<Message>> {
    let mut rows = conn
        .query(
            "SELECT id, record FROM remote_messages ORDER BY created_at DESC, rowid DESC",
            (),
        )
        .await?;

    let mut messages = Vec::new();
    while let Some(row) = rows.next().await? {
        let id: String = row.get(0)?;
        let raw: String = row.get(1)?;

        let parsed = serde_json::from_str::<RemoteRecord>(&raw)
            .map_err(Error::from)
            .and_then(|record| record.into_message(id.parse()?));
        match parsed {
            Ok(message) => messages.push(message),
            Err(error) => tracing::warn!("Skipping unreadable remote record {id}: {error}"),
        }
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Author, DeliveryState, Payload};

    async fn setup() -> LibSqlRemoteLog {
        let db = Database::open_in_memory().await.unwrap();
        LibSqlRemoteLog::new(Arc::new(db), Duration::from_millis(10))
    }

    fn message(text: &str, created_at: i64) -> Message {
        Message::compose(
            Author::new("u1", "Ada").unwrap(),
            Payload::text(text).unwrap(),
            created_at,
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_append_and_snapshot_newest_first() {
        let log = setup().await;
        log.append(&message("first", 1)).await.unwrap();
        log.append(&message("second", 2)).await.unwrap();

        let snapshot = log.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].payload, Payload::Text("second".to_string()));
        assert!(snapshot.iter().all(|m| m.delivery == DeliveryState::Synced));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_append_is_idempotent_per_client_id() {
        let log = setup().await;
        let pending = message("once", 1);
        log.append(&pending).await.unwrap();
        log.append(&pending).await.unwrap();

        let snapshot = log.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].client_id, Some(pending.id.clone()));
        assert_ne!(snapshot[0].id, pending.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_subscription_delivers_initial_and_later_snapshots() {
        let log = setup().await;
        log.append(&message("before", 1)).await.unwrap();

        let mut subscription = log.subscribe(4).unwrap();
        let initial = subscription.next().await.unwrap();
        assert_eq!(initial.generation, 4);
        assert_eq!(initial.messages.len(), 1);

        log.append(&message("after", 2)).await.unwrap();
        let next = subscription.next().await.unwrap();
        assert_eq!(next.messages.len(), 2);

        subscription.cancel();
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_rows_are_skipped() {
        let log = setup().await;
        log.append(&message("valid", 2)).await.unwrap();
        log.db
            .connection()
            .execute(
                "INSERT INTO remote_messages (id, client_id, record, created_at)
                 VALUES ('bad', NULL, '{\"createdAt\":1,\"user\":{\"_id\":\"u1\",\"name\":\"Ada\"}}', 1)",
                (),
            )
            .await
            .unwrap();

        let snapshot = log.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
    }
}
