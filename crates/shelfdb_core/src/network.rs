//! Online/offline state shared between transmitters.
//!
//! A [`NetworkTracker`] is created by the application and handed to
//! whatever needs it. The platform glue reports connectivity through
//! [`NetworkTracker::set_state`]; subscribers only wake on a real change.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Connectivity as last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkState {
    /// The network is reachable.
    Online,
    /// The network is not reachable.
    Offline,
}

impl NetworkState {
    /// Returns `true` for [`NetworkState::Online`].
    #[must_use]
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

/// Holds the current connectivity state and notifies subscribers when it
/// changes.
///
/// Cheap to clone; clones share the same state.
#[derive(Debug, Clone)]
pub struct NetworkTracker {
    sender: Arc<watch::Sender<NetworkState>>,
}

impl NetworkTracker {
    /// Creates a tracker starting in `initial`.
    #[must_use]
    pub fn new(initial: NetworkState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> NetworkState {
        *self.sender.borrow()
    }

    /// Returns `true` while the state is [`NetworkState::Online`].
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.state().is_online()
    }

    /// Records a new state. Subscribers are notified only if it differs
    /// from the current one. Returns whether the state changed.
    pub fn set_state(&self, state: NetworkState) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if changed {
            debug!(%state, "network state changed");
        }
        changed
    }

    /// Starts listening for changes. Dropping the subscription
    /// unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> NetworkSubscription {
        NetworkSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NetworkTracker {
    fn default() -> Self {
        Self::new(NetworkState::Online)
    }
}

/// A subscription to a [`NetworkTracker`].
#[derive(Debug)]
pub struct NetworkSubscription {
    receiver: watch::Receiver<NetworkState>,
}

impl NetworkSubscription {
    /// The tracker's current state.
    #[must_use]
    pub fn state(&self) -> NetworkState {
        *self.receiver.borrow()
    }

    /// Waits for the next change and returns the new state, or `None` once
    /// every tracker clone has been dropped.
    pub async fn changed(&mut self) -> Option<NetworkState> {
        self.receiver.changed().await.ok()?;
        Some(*self.receiver.borrow_and_update())
    }

    /// Returns `true` if a change arrived that [`NetworkSubscription::changed`]
    /// has not returned yet.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }
}
