//! The record store
//!
//! Every successful mutation runs the same pipeline: persist, broadcast,
//! notify. Persisting and notifying happen before the call returns. The
//! broadcast is spawned on the current tokio runtime and its result is
//! reported on the outcome feed instead of to the caller.
//!
//! Mutations and received rosters are serialized from snapshot to notify,
//! so the stored copy and the last listener call always match memory.
//! Listeners may read the store from inside a callback but must not mutate
//! it or subscribe to it there.
//!
//! A roster received from another viewer replaces the local one wholesale.
//! Timestamps are carried on the wire but never compared, so the last
//! message to arrive wins.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::defaults::default_team;
use super::listeners::{Listener, ListenerRegistry, Subscription};
use crate::config::StoreConfig;
use crate::error::{ChannelError, StorageError};
use crate::time::current_time_millis;
use crate::traits::{ChannelSubscription, KeyValueStorage, SyncChannel};
use crate::types::{BroadcastOutcome, BroadcastReport, NetworkStatus};
use tw_protocol::{MemberUpdate, SyncMessage, TeamMember};

/// Reports buffered on the outcome feed before slow readers start lagging
const OUTCOME_FEED_CAPACITY: usize = 32;

/// Names and limits a store is opened with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Storage key the roster is persisted under
    pub storage_key: String,
    /// Sync channel name
    pub channel: String,
    /// Upper bound on a single publish
    pub publish_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

impl From<&StoreConfig> for StoreOptions {
    fn from(config: &StoreConfig) -> Self {
        Self {
            storage_key: config.storage_key.clone(),
            channel: config.channel.clone(),
            publish_timeout: config.connect_timeout,
        }
    }
}

/// Authoritative roster for one viewer process
pub struct RecordStore {
    options: StoreOptions,
    storage: Arc<dyn KeyValueStorage>,
    members: Mutex<Vec<TeamMember>>,
    sequence: Mutex<()>,
    listeners: ListenerRegistry,
    channel: RwLock<Option<Arc<dyn SyncChannel>>>,
    receiver: Mutex<Option<JoinHandle<()>>>,
    outcomes: broadcast::Sender<BroadcastReport>,
}

impl RecordStore {
    /// Open the store, loading the persisted roster
    ///
    /// Falls back to the default team when nothing usable is stored. The
    /// defaults are written back only when the key was absent, so a corrupt
    /// value is left on disk for inspection.
    pub fn open(storage: Arc<dyn KeyValueStorage>, options: StoreOptions) -> Arc<Self> {
        let (members, absent) = load_roster(storage.as_ref(), &options.storage_key);
        let (outcomes, _) = broadcast::channel(OUTCOME_FEED_CAPACITY);

        let store = Arc::new(Self {
            options,
            storage,
            members: Mutex::new(members),
            sequence: Mutex::new(()),
            listeners: ListenerRegistry::new(),
            channel: RwLock::new(None),
            receiver: Mutex::new(None),
            outcomes,
        });

        if absent {
            store.persist(&store.get_all());
        }

        tracing::debug!(
            "Opened record store with {} members under key {}",
            store.members().len(),
            store.options.storage_key
        );
        store
    }

    /// Options the store was opened with
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Sync channel name
    pub fn channel_name(&self) -> &str {
        &self.options.channel
    }

    /// Copy of the whole roster
    pub fn get_all(&self) -> Vec<TeamMember> {
        self.members().clone()
    }

    /// Copy of one member, if present
    pub fn get_member(&self, id: &str) -> Option<TeamMember> {
        self.members().iter().find(|m| m.id == id).cloned()
    }

    /// Merge `update` into member `id`
    ///
    /// Returns `false`, with no side effects, when no member has that id.
    pub fn update_member(&self, id: &str, update: &MemberUpdate) -> bool {
        self.mutate(id, |member| member.apply(update))
    }

    /// Flip member `id`'s completion flag
    ///
    /// Returns `false`, with no side effects, when no member has that id.
    pub fn toggle_completion(&self, id: &str) -> bool {
        self.mutate(id, |member| member.is_completed = !member.is_completed)
    }

    /// Register a listener; it is called right away with the current roster
    ///
    /// Must not be called from inside another listener.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Vec<TeamMember>) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let _sequence = self.sequence();
        self.listeners.subscribe(listener, self.get_all())
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Feed of broadcast results, one report per mutation
    pub fn broadcast_outcomes(&self) -> broadcast::Receiver<BroadcastReport> {
        self.outcomes.subscribe()
    }

    /// Attach a sync channel and start applying rosters from other viewers
    ///
    /// Returns `false` and stays local-only if the subscription fails.
    /// Attaching a second channel replaces the first.
    pub async fn connect(self: &Arc<Self>, channel: Arc<dyn SyncChannel>) -> bool {
        let subscription = match channel.subscribe(&self.options.channel).await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!(
                    "Could not join channel {}; running local-only: {}",
                    self.options.channel,
                    e
                );
                return false;
            }
        };

        *self.channel.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&channel));

        let task = tokio::spawn(receive_loop(Arc::downgrade(self), subscription));
        if let Some(previous) = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task)
        {
            previous.abort();
        }

        tracing::info!(
            "Joined channel {} as {}",
            self.options.channel,
            channel.instance_id().short()
        );
        true
    }

    /// Whether a sync channel is attached
    pub fn is_connected(&self) -> bool {
        self.current_channel().is_some()
    }

    /// Apply a message from the sync channel
    ///
    /// A `team_update` with unique ids replaces the roster, is persisted and
    /// notified. Anything else is ignored. Returns whether the roster was
    /// replaced.
    pub fn receive(&self, message: SyncMessage) -> bool {
        let update = match message {
            SyncMessage::TeamUpdate(update) => update,
            SyncMessage::Other { kind, .. } => {
                tracing::debug!("Ignoring {} message", kind);
                return false;
            }
        };

        if !has_unique_ids(&update.team_members) {
            tracing::warn!("Discarding received roster with duplicate ids");
            return false;
        }

        tracing::debug!(
            "Applying received roster of {} members (timestamp {})",
            update.team_members.len(),
            update.timestamp
        );

        let _sequence = self.sequence();
        let snapshot = {
            let mut members = self.members();
            *members = update.team_members;
            members.clone()
        };

        self.persist(&snapshot);
        self.listeners.notify(&snapshot);
        true
    }

    /// Connectivity summary; offline whenever presence cannot be queried
    pub async fn network_status(&self) -> NetworkStatus {
        let Some(channel) = self.current_channel() else {
            return NetworkStatus::offline();
        };

        match channel.presence(&self.options.channel).await {
            Ok(peers) => NetworkStatus::online(peers.len()),
            Err(e) => {
                tracing::debug!("Presence query failed: {}", e);
                NetworkStatus::offline()
            }
        }
    }

    fn members(&self) -> std::sync::MutexGuard<'_, Vec<TeamMember>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Held from snapshot to notify
    fn sequence(&self) -> std::sync::MutexGuard<'_, ()> {
        self.sequence.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_channel(&self) -> Option<Arc<dyn SyncChannel>> {
        self.channel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn mutate(&self, id: &str, edit: impl FnOnce(&mut TeamMember)) -> bool {
        let _sequence = self.sequence();
        let snapshot = {
            let mut members = self.members();
            let Some(member) = members.iter_mut().find(|m| m.id == id) else {
                tracing::debug!("No member with id {}", id);
                return false;
            };
            edit(member);
            members.clone()
        };

        self.persist(&snapshot);
        self.broadcast(snapshot.clone(), current_time_millis());
        self.listeners.notify(&snapshot);
        true
    }

    fn persist(&self, members: &[TeamMember]) {
        let result = serde_json::to_string(members)
            .map_err(StorageError::from)
            .and_then(|json| self.storage.set(&self.options.storage_key, &json));

        if let Err(e) = result {
            tracing::warn!("Failed to persist roster: {}", e);
        }
    }

    fn broadcast(&self, members: Vec<TeamMember>, timestamp: u64) {
        let Some(channel) = self.current_channel() else {
            self.report(timestamp, BroadcastOutcome::Unreachable);
            return;
        };

        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("No async runtime; roster update was not broadcast");
            self.report(timestamp, BroadcastOutcome::Unknown);
            return;
        };

        let name = self.options.channel.clone();
        let limit = self.options.publish_timeout;
        let outcomes = self.outcomes.clone();

        runtime.spawn(async move {
            let message = SyncMessage::team_update(members, timestamp);
            let outcome = match tokio::time::timeout(limit, channel.publish(&name, message)).await {
                Ok(Ok(())) => BroadcastOutcome::Sent,
                Ok(Err(ChannelError::Timeout)) | Err(_) => BroadcastOutcome::Unknown,
                Ok(Err(_)) => BroadcastOutcome::Unreachable,
            };
            send_report(&outcomes, timestamp, outcome);
        });
    }

    fn report(&self, timestamp: u64, outcome: BroadcastOutcome) {
        send_report(&self.outcomes, timestamp, outcome);
    }
}

impl Drop for RecordStore {
    fn drop(&mut self) {
        if let Some(task) = self
            .receiver
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}

fn send_report(outcomes: &broadcast::Sender<BroadcastReport>, timestamp: u64, outcome: BroadcastOutcome) {
    match outcome {
        BroadcastOutcome::Sent => tracing::debug!("Roster update {} broadcast", timestamp),
        other => tracing::warn!("Roster update {} not broadcast: {}", timestamp, other),
    }
    // No receivers is fine
    let _ = outcomes.send(BroadcastReport { timestamp, outcome });
}

async fn receive_loop(weak: Weak<RecordStore>, mut subscription: ChannelSubscription) {
    while let Some(delivery) = subscription.recv().await {
        let Some(store) = weak.upgrade() else {
            break;
        };
        tracing::debug!(
            "Received {} from {} on {}",
            delivery.message.kind(),
            delivery.origin.short(),
            subscription.channel()
        );
        store.receive(delivery.message);
    }
    tracing::debug!("Subscription to {} ended", subscription.channel());
}

/// Stored roster, or the defaults plus whether the key was absent
fn load_roster(storage: &dyn KeyValueStorage, key: &str) -> (Vec<TeamMember>, bool) {
    let text = match storage.get(key) {
        Ok(Some(text)) => text,
        Ok(None) => {
            tracing::info!("No stored roster under {}; seeding defaults", key);
            return (default_team(), true);
        }
        Err(e) => {
            tracing::warn!("Could not read stored roster: {}", e);
            return (default_team(), false);
        }
    };

    let members = match serde_json::from_str::<Vec<TeamMember>>(&text) {
        Ok(members) if has_unique_ids(&members) => members,
        Ok(_) => {
            tracing::warn!("Stored roster has duplicate ids; using defaults");
            default_team()
        }
        Err(e) => {
            tracing::warn!("Stored roster is unreadable; using defaults: {}", e);
            default_team()
        }
    };
    (members, false)
}

fn has_unique_ids(members: &[TeamMember]) -> bool {
    let mut seen = HashSet::with_capacity(members.len());
    members.iter().all(|m| seen.insert(m.id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LocalHub;
    use crate::storage::MemoryStorage;
    use std::sync::Condvar;
    use tw_protocol::InstanceId;

    const KEY: &str = "bridge_team_data";

    fn open(storage: &MemoryStorage) -> Arc<RecordStore> {
        RecordStore::open(Arc::new(storage.clone()), StoreOptions::default())
    }

    #[test]
    fn test_first_open_seeds_and_persists_defaults() {
        let storage = MemoryStorage::new();
        let store = open(&storage);

        assert_eq!(store.get_all(), default_team());
        let stored: Vec<TeamMember> =
            serde_json::from_str(&storage.get(KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored, default_team());
    }

    #[test]
    fn test_corrupt_data_falls_back_without_overwrite() {
        let storage = MemoryStorage::new();
        storage.set(KEY, "{not json").unwrap();

        let store = open(&storage);

        assert_eq!(store.get_all().len(), 9);
        assert_eq!(storage.get(KEY).unwrap().as_deref(), Some("{not json"));
    }

    #[test]
    fn test_duplicate_ids_in_storage_use_defaults() {
        let storage = MemoryStorage::new();
        let dupes = vec![TeamMember::new("1", "A", "X"), TeamMember::new("1", "B", "Y")];
        storage.set(KEY, &serde_json::to_string(&dupes).unwrap()).unwrap();

        assert_eq!(open(&storage).get_all(), default_team());
    }

    #[test]
    fn test_get_all_is_a_copy() {
        let store = open(&MemoryStorage::new());
        let mut copy = store.get_all();
        copy[0].name = "Changed".to_string();

        assert_eq!(store.get_member("1").unwrap().name, "Domendra");
    }

    #[test]
    fn test_mutation_persists() {
        let storage = MemoryStorage::new();
        let store = open(&storage);

        assert!(store.update_member("4", &MemberUpdate::new().task("Culvert sizing")));

        let stored: Vec<TeamMember> =
            serde_json::from_str(&storage.get(KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored[3].task, "Culvert sizing");
    }

    #[test]
    fn test_empty_update_still_notifies() {
        let store = open(&MemoryStorage::new());
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let _sub = store.subscribe(move |_| *counter.lock().unwrap() += 1);

        assert!(store.update_member("2", &MemberUpdate::new()));
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_without_channel_outcome_is_unreachable() {
        let store = open(&MemoryStorage::new());
        let mut outcomes = store.broadcast_outcomes();

        store.toggle_completion("1");

        let report = outcomes.try_recv().unwrap();
        assert_eq!(report.outcome, BroadcastOutcome::Unreachable);
    }

    #[test]
    fn test_without_runtime_outcome_is_unknown() {
        let store = open(&MemoryStorage::new());
        let hub = LocalHub::new();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let channel: Arc<dyn SyncChannel> = Arc::new(hub.handle(InstanceId::new("a"), None));
        assert!(runtime.block_on(store.connect(channel)));

        let mut outcomes = store.broadcast_outcomes();
        store.toggle_completion("1");

        assert_eq!(outcomes.try_recv().unwrap().outcome, BroadcastOutcome::Unknown);
    }

    #[tokio::test]
    async fn test_publish_is_reported_sent() {
        let store = open(&MemoryStorage::new());
        let hub = LocalHub::new();
        assert!(store.connect(Arc::new(hub.handle(InstanceId::new("a"), None))).await);

        let mut outcomes = store.broadcast_outcomes();
        store.toggle_completion("2");

        let report = outcomes.recv().await.unwrap();
        assert_eq!(report.outcome, BroadcastOutcome::Sent);
        assert!(report.timestamp > 0);
    }

    #[tokio::test]
    async fn test_offline_hub_keeps_store_local() {
        let store = open(&MemoryStorage::new());
        let hub = LocalHub::new();
        hub.set_available(false);

        assert!(!store.connect(Arc::new(hub.handle(InstanceId::new("a"), None))).await);
        assert!(!store.is_connected());
        assert!(store.toggle_completion("1"));
        assert_eq!(store.network_status().await, NetworkStatus::offline());
    }

    #[test]
    fn test_receive_ignores_other_kinds_and_duplicates() {
        let store = open(&MemoryStorage::new());

        let other = SyncMessage::Other {
            kind: "ping".to_string(),
            data: serde_json::Value::Null,
        };
        assert!(!store.receive(other));

        let dupes = vec![TeamMember::new("1", "A", "X"), TeamMember::new("1", "B", "Y")];
        assert!(!store.receive(SyncMessage::team_update(dupes, 1)));

        assert_eq!(store.get_all(), default_team());
    }

    #[test]
    fn test_receive_replaces_and_notifies() {
        let storage = MemoryStorage::new();
        let store = open(&storage);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = store.subscribe(move |members| sink.lock().unwrap().push(members.len()));

        let roster = vec![TeamMember::new("a", "Ann", "Lead")];
        assert!(store.receive(SyncMessage::team_update(roster.clone(), 0)));

        assert_eq!(store.get_all(), roster);
        assert_eq!(*seen.lock().unwrap(), vec![9, 1]);
        assert!(storage.get(KEY).unwrap().unwrap().contains("Ann"));
    }

    /// Memory storage whose writes block while the gate is closed
    #[derive(Default)]
    struct GatedStorage {
        inner: MemoryStorage,
        closed: Mutex<bool>,
        opened: Condvar,
        writes: Mutex<Vec<std::sync::mpsc::Sender<()>>>,
    }

    impl GatedStorage {
        fn close(&self) -> std::sync::mpsc::Receiver<()> {
            let (tx, rx) = std::sync::mpsc::channel();
            self.writes.lock().unwrap().push(tx);
            *self.closed.lock().unwrap() = true;
            rx
        }

        fn open(&self) {
            *self.closed.lock().unwrap() = false;
            self.opened.notify_all();
        }
    }

    impl KeyValueStorage for GatedStorage {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            for tx in self.writes.lock().unwrap().iter() {
                let _ = tx.send(());
            }
            let closed = self.closed.lock().unwrap();
            drop(self.opened.wait_while(closed, |closed| *closed).unwrap());
            self.inner.set(key, value)
        }
    }

    #[test]
    fn test_slow_write_does_not_overtake_received_roster() {
        let storage = Arc::new(GatedStorage::default());
        let store = RecordStore::open(storage.clone(), StoreOptions::default());
        let last = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&last);
        let _sub = store.subscribe(move |members| *sink.lock().unwrap() = members);

        let writing = storage.close();
        let editor = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || store.update_member("1", &MemberUpdate::new().task("local")))
        };
        writing.recv().unwrap();

        let receiver = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let roster = vec![TeamMember::new("r", "Remote", "Lead")];
                store.receive(SyncMessage::team_update(roster, 2))
            })
        };
        std::thread::sleep(Duration::from_millis(50));
        storage.open();

        assert!(editor.join().unwrap());
        assert!(receiver.join().unwrap());

        let memory = store.get_all();
        let stored: Vec<TeamMember> =
            serde_json::from_str(&storage.get(KEY).unwrap().unwrap()).unwrap();
        assert_eq!(memory.len(), 1);
        assert_eq!(stored, memory);
        assert_eq!(*last.lock().unwrap(), memory);
    }
}
