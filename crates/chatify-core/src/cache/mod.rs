//! Offline bootstrap cache of the last confirmed conversation.

use libsql::Connection;

use crate::error::{Error, Result};
use crate::models::Message;

/// Key holding the JSON array of confirmed messages.
pub const MESSAGES_KEY: &str = "messages";

/// Durable store for the last remote-confirmed message list.
///
/// `save` overwrites wholesale; there is no merge.
#[allow(async_fn_in_trait)]
pub trait LocalCache {
    /// Load the cached list, `None` when nothing was ever saved.
    async fn load(&self) -> Result<Option<Vec<Message>>>;

    /// Replace the cached list.
    async fn save(&self, messages: &[Message]) -> Result<()>;
}

/// libSQL implementation of `LocalCache`
#[derive(Clone)]
pub struct LibSqlMessageCache {
    conn: Connection,
}

impl LibSqlMessageCache {
    /// Create a new cache on the given connection
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl LocalCache for LibSqlMessageCache {
    async fn load(&self) -> Result<Option<Vec<Message>>> {
        let mut rows = self
            .conn
            .query(
                "SELECT value FROM cache_entries WHERE key = ?",
                [MESSAGES_KEY],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let value: String = row.get(0)?;
        let messages = serde_json::from_str(&value)
            .map_err(|error| Error::Cache(format!("Cached messages are unreadable: {error}")))?;
        Ok(Some(messages))
    }

    async fn save(&self, messages: &[Message]) -> Result<()> {
        if let Some(pending) = messages.iter().find(|message| message.is_pending()) {
            return Err(Error::Cache(format!(
                "Refusing to cache unconfirmed message {}",
                pending.id
            )));
        }

        let value = serde_json::to_string(messages)?;
        let now = chrono::Utc::now().timestamp_millis();
        self.conn
            .execute(
                "INSERT OR REPLACE INTO cache_entries (key, value, updated_at) VALUES (?, ?, ?)",
                libsql::params![MESSAGES_KEY, value, now],
            )
            .await?;
        Ok(())
    }
}
