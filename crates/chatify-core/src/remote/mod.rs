//! Ordered, append-only remote message log.
//!
//! A subscription delivers full snapshots (never deltas) of the log ordered
//! by `created_at` descending. Each subscription carries the generation it
//! was opened with so a consumer can drop anything produced for a
//! subscription it already abandoned.

mod record;
mod sql_log;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::models::{sort_newest_first, DeliveryState, Message};
use crate::Result;

pub use record::{RemoteRecord, RemoteUser};
pub use sql_log::LibSqlRemoteLog;

/// Client for the remote message log.
#[allow(async_fn_in_trait)]
pub trait RemoteLog {
    /// Start receiving snapshots tagged with `generation`.
    ///
    /// The current state of the log is delivered as the first snapshot.
    fn subscribe(&self, generation: u64) -> Result<Subscription>;

    /// Durably append a message. Appending a client id that is already in
    /// the log is a no-op.
    async fn append(&self, message: &Message) -> Result<()>;
}

/// Full ordered content of the log at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub generation: u64,
    pub messages: Vec<Message>,
}

/// Create a connected publisher/subscription pair.
pub fn snapshot_channel(generation: u64) -> (SnapshotPublisher, Subscription) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let cancelled = Arc::new(AtomicBool::new(false));
    (
        SnapshotPublisher {
            generation,
            sender,
            cancelled: Arc::clone(&cancelled),
        },
        Subscription {
            generation,
            receiver,
            cancelled,
        },
    )
}

/// Consumer handle of a remote subscription.
///
/// After [`Subscription::cancel`] returns, [`Subscription::next`] never yields
/// another snapshot, even if the producer had one in flight.
pub struct Subscription {
    generation: u64,
    receiver: mpsc::UnboundedReceiver<Snapshot>,
    cancelled: Arc<AtomicBool>,
}

impl Subscription {
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Wait for the next snapshot; `None` once cancelled or the producer ended.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if self.is_cancelled() {
            return None;
        }
        self.receiver.recv().await
    }

    /// Take an already delivered snapshot without waiting.
    pub fn try_next(&mut self) -> Option<Snapshot> {
        if self.is_cancelled() {
            return None;
        }
        self.receiver.try_recv().ok()
    }

    /// Stop the subscription and discard anything already queued.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Producer handle of a remote subscription.
pub struct SnapshotPublisher {
    generation: u64,
    sender: mpsc::UnboundedSender<Snapshot>,
    cancelled: Arc<AtomicBool>,
}

impl SnapshotPublisher {
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the consumer cancelled or went away.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || self.sender.is_closed()
    }

    /// Deliver a snapshot. Messages are marked synced and ordered newest first.
    ///
    /// Returns `false` when the subscription is gone.
    pub fn publish(&self, mut messages: Vec<Message>) -> bool {
        if self.is_cancelled() {
            return false;
        }
        for message in &mut messages {
            message.delivery = DeliveryState::Synced;
        }
        sort_newest_first(&mut messages);
        self.sender
            .send(Snapshot {
                generation: self.generation,
                messages,
            })
            .is_ok()
    }
}
