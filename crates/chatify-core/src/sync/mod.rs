//! Live/cached orchestration of the conversation.
//!
//! The controller owns the displayed message list. While `Live` it follows a
//! remote subscription and mirrors every snapshot into the local cache; while
//! `Cached` it serves the last cached snapshot and refuses new messages.
//! Optimistic messages are kept apart from the confirmed snapshot and merged
//! into the view until a snapshot confirms them.

mod outbox;

use std::time::Duration;

use crate::cache::LocalCache;
use crate::compose::MessageSink;
use crate::connectivity::{ConnectivitySubscription, NetworkStatus};
use crate::models::{sort_newest_first, Message, MessageId};
use crate::remote::{RemoteLog, Snapshot, Subscription};
use crate::{Error, Result};

pub use outbox::{LibSqlOutbox, Outbox, OutboxEntry};

/// Wait before subscribing again while online but without a subscription.
pub const DEFAULT_RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// Where the displayed list comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// Served from the local cache; composing is disabled.
    #[default]
    Cached,
    /// Following the remote log.
    Live,
}

/// Input the controller reacts to, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Connectivity(NetworkStatus),
    Snapshot(Snapshot),
    /// The producer of a subscription went away.
    SubscriptionClosed { generation: u64 },
    /// Online without a subscription for a while; time to try again.
    Resubscribe,
}

/// Orchestrator of remote log, cache and outbox.
pub struct SyncController<R: RemoteLog, C: LocalCache, O: Outbox> {
    remote: R,
    cache: C,
    outbox: O,
    mode: SyncMode,
    network: NetworkStatus,
    resubscribe_delay: Duration,
    generation: u64,
    subscription: Option<Subscription>,
    confirmed: Vec<Message>,
    pending: Vec<Message>,
    messages: Vec<Message>,
}

impl<R: RemoteLog, C: LocalCache, O: Outbox> SyncController<R, C, O> {
    pub fn new(remote: R, cache: C, outbox: O) -> Self {
        Self {
            remote,
            cache,
            outbox,
            mode: SyncMode::Cached,
            network: NetworkStatus::Unknown,
            resubscribe_delay: DEFAULT_RESUBSCRIBE_DELAY,
            generation: 0,
            subscription: None,
            confirmed: Vec::new(),
            pending: Vec::new(),
            messages: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_resubscribe_delay(mut self, delay: Duration) -> Self {
        self.resubscribe_delay = delay;
        self
    }

    /// Load the cached conversation and any queued messages.
    ///
    /// Cache and outbox failures are logged; the controller starts empty.
    pub async fn bootstrap(&mut self) {
        match self.cache.load().await {
            Ok(cached) => self.confirmed = cached.unwrap_or_default(),
            Err(error) => tracing::warn!("Failed to load cached messages: {error}"),
        }
        match self.outbox.pending().await {
            Ok(entries) => {
                for entry in entries {
                    self.track_pending(entry.message);
                }
            }
            Err(error) => tracing::warn!("Failed to read outbox: {error}"),
        }
        self.rebuild();
        tracing::info!(
            "Loaded {} cached and {} queued messages",
            self.confirmed.len(),
            self.pending.len()
        );
    }

    /// Displayed list, newest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub const fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Whether the composer is enabled.
    pub const fn can_compose(&self) -> bool {
        matches!(self.mode, SyncMode::Live)
    }

    /// Number of optimistic messages not yet confirmed by a snapshot.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Generation of the most recent subscription.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub const fn cache(&self) -> &C {
        &self.cache
    }

    pub const fn outbox(&self) -> &O {
        &self.outbox
    }

    /// Apply a connectivity reading.
    pub async fn on_connectivity(&mut self, status: NetworkStatus) {
        self.network = status;
        match (self.mode, status) {
            (SyncMode::Cached, NetworkStatus::Online) => self.go_live().await,
            (SyncMode::Live, NetworkStatus::Offline) => self.go_cached().await,
            _ => tracing::debug!("Ignoring {status:?} while {:?}", self.mode),
        }
    }

    /// Replace the confirmed list with a snapshot of the current subscription.
    ///
    /// Returns `false` when the snapshot was stale and dropped.
    pub async fn apply_snapshot(&mut self, snapshot: Snapshot) -> bool {
        let current = self
            .subscription
            .as_ref()
            .is_some_and(|subscription| subscription.generation() == snapshot.generation);
        if self.mode != SyncMode::Live || !current {
            tracing::debug!(
                "Dropping snapshot of generation {} (current {}, {:?})",
                snapshot.generation,
                self.generation,
                self.mode
            );
            return false;
        }

        let confirmed_ids: Vec<MessageId> = self
            .pending
            .iter()
            .filter(|pending| snapshot.messages.iter().any(|m| m.confirms(pending)))
            .map(|pending| pending.id.clone())
            .collect();
        self.pending
            .retain(|pending| !confirmed_ids.contains(&pending.id));
        for id in &confirmed_ids {
            if let Err(error) = self.outbox.remove(id).await {
                tracing::warn!("Failed to drop confirmed message {id} from outbox: {error}");
            }
        }

        self.confirmed = snapshot.messages;
        self.rebuild();

        if let Err(error) = self.cache.save(&self.confirmed).await {
            tracing::warn!("Failed to cache snapshot: {error}");
        }
        tracing::debug!(
            "Applied snapshot of {} messages, {} confirmed, {} still pending",
            self.confirmed.len(),
            confirmed_ids.len(),
            self.pending.len()
        );
        true
    }

    /// Retry queued messages oldest first, stopping at the first failure.
    ///
    /// Returns how many messages were appended.
    pub async fn flush_outbox(&mut self) -> Result<usize> {
        let entries = self.outbox.pending().await?;
        let mut flushed = 0;

        for entry in entries {
            let message = entry.message;
            self.track_pending(message.clone());

            if let Err(error) = self.remote.append(&message).await {
                tracing::warn!(
                    "Retry {} of message {} failed: {error}",
                    entry.attempts + 1,
                    message.id
                );
                if let Err(error) = self.outbox.enqueue(&message).await {
                    tracing::warn!("Failed to record retry of {}: {error}", message.id);
                }
                break;
            }

            if let Err(error) = self.outbox.remove(&message.id).await {
                tracing::warn!("Failed to remove {} from outbox: {error}", message.id);
            }
            flushed += 1;
        }

        if flushed > 0 {
            tracing::info!("Flushed {flushed} queued messages");
        }
        self.rebuild();
        Ok(flushed)
    }

    /// Wait for the next connectivity change or snapshot.
    ///
    /// Connectivity readings win when both are ready; snapshots already
    /// delivered are still applied before going offline. While online without
    /// a subscription a [`SyncEvent::Resubscribe`] fires after the resubscribe
    /// delay. Returns `None` once the connectivity source is gone.
    pub async fn next_event(
        &mut self,
        connectivity: &mut ConnectivitySubscription,
    ) -> Option<SyncEvent> {
        let generation = self.generation;
        let retry = self.needs_subscription();
        tokio::select! {
            biased;
            status = connectivity.recv() => status.map(SyncEvent::Connectivity),
            snapshot = next_snapshot(&mut self.subscription) => Some(match snapshot {
                Some(snapshot) => SyncEvent::Snapshot(snapshot),
                None => SyncEvent::SubscriptionClosed { generation },
            }),
            () = tokio::time::sleep(self.resubscribe_delay), if retry => {
                Some(SyncEvent::Resubscribe)
            }
        }
    }

    /// Apply one event.
    pub async fn handle_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Connectivity(status) => self.on_connectivity(status).await,
            SyncEvent::Snapshot(snapshot) => {
                self.apply_snapshot(snapshot).await;
            }
            SyncEvent::SubscriptionClosed { generation } => {
                if generation == self.generation && self.subscription.is_some() {
                    tracing::warn!("Remote subscription {generation} closed by producer");
                    self.go_cached().await;
                }
            }
            SyncEvent::Resubscribe => {
                if self.needs_subscription() {
                    self.go_live().await;
                }
            }
        }
    }

    /// Drive the controller until the connectivity source is gone, calling
    /// `on_change` after every applied event.
    pub async fn run(
        &mut self,
        connectivity: &mut ConnectivitySubscription,
        mut on_change: impl FnMut(&[Message], SyncMode),
    ) {
        while let Some(event) = self.next_event(connectivity).await {
            self.handle_event(event).await;
            on_change(&self.messages, self.mode);
        }
        self.shutdown();
    }

    /// Cancel the live subscription, if any.
    pub fn shutdown(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
            tracing::debug!("Cancelled subscription {}", subscription.generation());
        }
    }

    async fn go_live(&mut self) {
        self.generation += 1;
        match self.remote.subscribe(self.generation) {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                self.mode = SyncMode::Live;
                tracing::info!("Online, following remote log (generation {})", self.generation);
            }
            Err(error) => {
                tracing::warn!(
                    "Failed to subscribe to remote log, retrying in {:?}: {error}",
                    self.resubscribe_delay
                );
                return;
            }
        }

        if let Err(error) = self.flush_outbox().await {
            tracing::warn!("Failed to flush outbox: {error}");
        }
    }

    async fn go_cached(&mut self) {
        self.apply_delivered().await;
        self.shutdown();
        self.mode = SyncMode::Cached;

        match self.cache.load().await {
            Ok(cached) => self.confirmed = cached.unwrap_or_default(),
            Err(error) => tracing::warn!("Failed to load cached messages: {error}"),
        }
        self.rebuild();
        tracing::info!(
            "Showing {} cached messages",
            self.confirmed.len()
        );
    }

    /// Apply the newest snapshot the subscription already holds.
    async fn apply_delivered(&mut self) {
        let Some(subscription) = self.subscription.as_mut() else {
            return;
        };
        let latest = std::iter::from_fn(|| subscription.try_next()).last();
        if let Some(snapshot) = latest {
            self.apply_snapshot(snapshot).await;
        }
    }

    const fn needs_subscription(&self) -> bool {
        matches!(self.network, NetworkStatus::Online) && matches!(self.mode, SyncMode::Cached)
    }

    fn track_pending(&mut self, message: Message) {
        if !self.pending.iter().any(|pending| pending.id == message.id) {
            self.pending.push(message);
        }
    }

    fn forget_pending(&mut self, id: &MessageId) {
        self.pending.retain(|pending| &pending.id != id);
    }

    fn rebuild(&mut self) {
        let mut messages = self.confirmed.clone();
        messages.extend(self.pending.iter().cloned());
        sort_newest_first(&mut messages);
        self.messages = messages;
    }
}

impl<R: RemoteLog, C: LocalCache, O: Outbox> MessageSink for SyncController<R, C, O> {
    fn can_accept(&self) -> bool {
        self.can_compose()
    }

    async fn submit(&mut self, message: Message) -> Result<()> {
        if !self.can_compose() {
            return Err(Error::Offline);
        }
        if !message.is_pending() {
            return Err(Error::InvalidInput(
                "Only pending messages can be submitted".to_string(),
            ));
        }

        self.track_pending(message.clone());
        self.rebuild();

        let Err(error) = self.remote.append(&message).await else {
            tracing::debug!("Appended message {}", message.id);
            return Ok(());
        };
        tracing::warn!("Append of {} failed, queueing: {error}", message.id);

        if let Err(queue_error) = self.outbox.enqueue(&message).await {
            tracing::error!("Failed to queue message {}: {queue_error}", message.id);
            self.forget_pending(&message.id);
            self.rebuild();
            return Err(Error::Network(format!(
                "{error}; message could not be queued: {queue_error}"
            )));
        }
        Ok(())
    }
}

async fn next_snapshot(subscription: &mut Option<Subscription>) -> Option<Snapshot> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}
