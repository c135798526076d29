//! Durable queue of messages whose append failed.

use libsql::Connection;

use crate::error::{Error, Result};
use crate::models::{Message, MessageId};

/// A queued message and how often its append was attempted.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub message: Message,
    pub attempts: u32,
}

/// Durable store of pending messages awaiting a successful append.
#[allow(async_fn_in_trait)]
pub trait Outbox {
    /// Queue a pending message. Re-queueing the same id counts another attempt.
    async fn enqueue(&self, message: &Message) -> Result<()>;

    /// Queued messages, oldest first.
    async fn pending(&self) -> Result<Vec<OutboxEntry>>;

    /// Drop a message once the remote log accepted it.
    async fn remove(&self, id: &MessageId) -> Result<()>;
}

/// libSQL implementation of `Outbox`
#[derive(Clone)]
pub struct LibSqlOutbox {
    conn: Connection,
}

impl LibSqlOutbox {
    /// Create a new outbox on the given connection
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl Outbox for LibSqlOutbox {
    async fn enqueue(&self, message: &Message) -> Result<()> {
        if !message.is_pending() {
            return Err(Error::InvalidInput(format!(
                "Only pending messages can be queued, {} is synced",
                message.id
            )));
        }

        let raw = serde_json::to_string(message)?;
        self.conn
            .execute(
                "INSERT INTO outbox (id, message, created_at, attempts) VALUES (?, ?, ?, 1)
                 ON CONFLICT(id) DO UPDATE SET attempts = attempts + 1",
                libsql::params![message.id.as_str(), raw, message.created_at],
            )
            .await?;
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<OutboxEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT message, attempts FROM outbox ORDER BY created_at ASC, rowid ASC",
                (),
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            let raw: String = row.get(0)?;
            let attempts: i64 = row.get(1)?;
            match serde_json::from_str::<Message>(&raw) {
                Ok(message) => entries.push(OutboxEntry {
                    message,
                    attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
                }),
                Err(error) => tracing::warn!("Skipping unreadable outbox entry: {error}"),
            }
        }
        Ok(entries)
    }

    async fn remove(&self, id: &MessageId) -> Result<()> {
        self.conn
            .execute("DELETE FROM outbox WHERE id = ?", [id.as_str()])
            .await?;
        Ok(())
    }
}
