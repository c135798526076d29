use std::path::Path;

use chatify_core::db::Database;
use chatify_core::sync::{LibSqlOutbox, Outbox, OutboxEntry};
use serde::Serialize;

use crate::commands::common::{format_timestamp, LOCAL_DB_FILE};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct OutboxListItem {
    pub id: String,
    pub kind: String,
    pub content: String,
    pub created_at_iso: String,
    pub attempts: u32,
}

/// Inspect queued messages without connecting to the remote log.
pub async fn run_outbox(as_json: bool, data_dir: &Path) -> Result<(), CliError> {
    let db = Database::open(data_dir.join(LOCAL_DB_FILE)).await?;
    let outbox = LibSqlOutbox::new(db.connection().clone());
    let entries = outbox.pending().await?;

    if as_json {
        let json_items = entries
            .iter()
            .map(outbox_entry_to_item)
            .collect::<Vec<OutboxListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Outbox is empty");
        return Ok(());
    }
    for line in format_outbox_lines(&entries) {
        println!("{line}");
    }
    Ok(())
}

pub fn outbox_entry_to_item(entry: &OutboxEntry) -> OutboxListItem {
    OutboxListItem {
        id: entry.message.id.to_string(),
        kind: entry.message.payload.kind().to_string(),
        content: entry.message.payload.summary(),
        created_at_iso: format_timestamp(entry.message.created_at),
        attempts: entry.attempts,
    }
}

pub fn format_outbox_lines(entries: &[OutboxEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let attempts = if entry.attempts == 1 {
                "1 attempt".to_string()
            } else {
                format!("{} attempts", entry.attempts)
            };
            format!(
                "{}  {}  {}  ({attempts})",
                entry.message.id,
                format_timestamp(entry.message.created_at),
                entry.message.payload.summary()
            )
        })
        .collect()
}
