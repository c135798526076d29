//! chatify-core - Core library for Chatify
//!
//! This crate contains the message model, the live/cached sync controller,
//! the durable cache and outbox, the remote log client, blob storage, and the
//! attachment composer shared by Chatify front ends.

pub mod cache;
pub mod clock;
pub mod compose;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod device;
pub mod error;
pub mod models;
pub mod reference;
pub mod remote;
pub mod storage;
pub mod sync;
mod util;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use models::{Message, MessageId};
