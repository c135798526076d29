//! Network reachability tracking.
//!
//! The monitor starts in [`NetworkStatus::Unknown`] and only ever emits
//! definitive transitions (`Online` / `Offline`) to its subscribers. Every
//! transition is delivered in order; nothing is coalesced or debounced.

mod probe;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;

pub use probe::{watch_reachability, HttpReachabilityProbe, ReachabilityProbe};

/// Reachability as reported by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NetworkStatus {
    /// No definitive reading yet
    #[default]
    Unknown,
    Online,
    Offline,
}

impl NetworkStatus {
    const fn from_reading(reachable: bool) -> Self {
        if reachable {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

#[derive(Default)]
struct MonitorState {
    status: NetworkStatus,
    next_id: u64,
    subscribers: Vec<(u64, mpsc::UnboundedSender<NetworkStatus>)>,
}

/// Fan-out of reachability transitions.
///
/// Cloning yields another handle to the same monitor.
#[derive(Clone, Default)]
pub struct ConnectivityMonitor {
    state: Arc<Mutex<MonitorState>>,
}

impl ConnectivityMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last definitive status, or `Unknown` before the first reading.
    pub fn status(&self) -> NetworkStatus {
        self.lock().status
    }

    /// Feed a raw platform reading; `None` is an indeterminate reading.
    ///
    /// Returns `true` when the reading caused a transition.
    pub fn report(&self, reachable: Option<bool>) -> bool {
        let Some(reachable) = reachable else {
            return false;
        };
        let next = NetworkStatus::from_reading(reachable);

        let mut state = self.lock();
        if state.status == next {
            return false;
        }
        tracing::debug!("Connectivity changed: {:?} -> {:?}", state.status, next);
        state.status = next;
        state
            .subscribers
            .retain(|(_, sender)| sender.send(next).is_ok());
        true
    }

    /// Register for transitions.
    ///
    /// When the monitor already holds a definitive status, it is delivered
    /// first so late subscribers can bootstrap.
    pub fn subscribe(&self) -> ConnectivitySubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.lock();
        if state.status != NetworkStatus::Unknown {
            // The receiver is alive in this scope.
            let _ = sender.send(state.status);
        }
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push((id, sender));

        ConnectivitySubscription {
            id,
            receiver,
            monitor: Arc::downgrade(&self.state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receiving end of [`ConnectivityMonitor::subscribe`].
///
/// Dropping it (or calling [`Self::unsubscribe`]) detaches from the monitor.
pub struct ConnectivitySubscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<NetworkStatus>,
    monitor: Weak<Mutex<MonitorState>>,
}

impl ConnectivitySubscription {
    /// Next transition; `None` once the monitor is gone.
    pub async fn recv(&mut self) -> Option<NetworkStatus> {
        self.receiver.recv().await
    }

    /// Next already-delivered transition, without waiting.
    pub fn try_recv(&mut self) -> Option<NetworkStatus> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(self) {}
}

impl Drop for ConnectivitySubscription {
    fn drop(&mut self) {
        if let Some(state) = self.monitor.upgrade() {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            state.subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}
