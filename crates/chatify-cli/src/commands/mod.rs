pub mod common;
pub mod compose;
pub mod list;
pub mod outbox;
pub mod watch;
