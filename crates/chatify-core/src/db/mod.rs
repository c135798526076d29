//! libSQL storage: connection handling and schema migrations

mod connection;
mod migrations;

pub use connection::{Database, Location, SyncConfig, DEFAULT_REPLICA_SYNC_INTERVAL};
