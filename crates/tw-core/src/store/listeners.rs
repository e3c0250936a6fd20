//! Listener registry
//!
//! Callbacks run synchronously, in registration order, each with its own
//! copy of the roster. The registry lock is released before any callback
//! runs, so a callback may read the store or unsubscribe itself.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tw_protocol::TeamMember;

/// Callback notified with a fresh copy of the roster
pub type Listener = Arc<dyn Fn(Vec<TeamMember>) + Send + Sync>;

#[derive(Default)]
struct Entries {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Ordered set of roster listeners
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Arc<Mutex<Entries>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` and call it once with `current`
    pub fn subscribe(&self, listener: Listener, current: Vec<TeamMember>) -> Subscription {
        let id = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let id = entries.next_id;
            entries.next_id += 1;
            entries.listeners.push((id, Arc::clone(&listener)));
            id
        };

        listener(current);

        Subscription {
            id,
            entries: Arc::downgrade(&self.entries),
        }
    }

    /// Call every registered listener with its own copy of `members`
    pub fn notify(&self, members: &[TeamMember]) {
        let snapshot: Vec<Listener> = {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };

        tracing::trace!("Notifying {} roster listeners", snapshot.len());
        for listener in snapshot {
            listener(members.to_vec());
        }
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// De-registration handle returned by subscribe
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    entries: Weak<Mutex<Entries>>,
}

impl Subscription {
    /// Remove the listener; a no-op if it is already gone
    pub fn unsubscribe(&self) {
        if let Some(entries) = self.entries.upgrade() {
            let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.listeners.retain(|(id, _)| *id != self.id);
        }
    }
}
