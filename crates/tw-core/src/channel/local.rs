//! In-process sync hub
//!
//! Every [`LocalChannel`] handed out by one [`LocalHub`] shares the same
//! rooms. Fan-out uses `try_send`, so a subscriber that stops draining its
//! queue loses messages instead of stalling the publisher.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::SUBSCRIBER_BUFFER;
use crate::error::ChannelError;
use crate::traits::{ChannelSubscription, Delivery, SyncChannel};
use tw_protocol::{InstanceId, PeerInfo, SyncMessage};

struct RoomMember {
    instance: InstanceId,
    label: Option<String>,
    tx: mpsc::Sender<Delivery>,
}

/// Shared rooms for in-process viewers
#[derive(Clone)]
pub struct LocalHub {
    rooms: Arc<DashMap<String, Vec<RoomMember>>>,
    available: Arc<AtomicBool>,
}

impl LocalHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Create a channel handle for one viewer
    pub fn handle(&self, instance: InstanceId, label: Option<String>) -> LocalChannel {
        LocalChannel {
            hub: self.clone(),
            instance,
            label,
        }
    }

    /// Take the hub offline (or back online); offline hubs fail every call
    /// with [`ChannelError::Unreachable`]
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Live subscriptions on `channel`
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.prune(channel);
        self.rooms.get(channel).map(|room| room.len()).unwrap_or(0)
    }

    fn check_available(&self) -> Result<(), ChannelError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ChannelError::Unreachable("local hub is offline".to_string()))
        }
    }

    fn prune(&self, channel: &str) {
        if let Some(mut room) = self.rooms.get_mut(channel) {
            room.retain(|member| !member.tx.is_closed());
        }
    }
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One viewer's handle on a [`LocalHub`]
pub struct LocalChannel {
    hub: LocalHub,
    instance: InstanceId,
    label: Option<String>,
}

#[async_trait]
impl SyncChannel for LocalChannel {
    fn instance_id(&self) -> &InstanceId {
        &self.instance
    }

    async fn subscribe(&self, channel: &str) -> Result<ChannelSubscription, ChannelError> {
        self.hub.check_available()?;

        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.hub
            .rooms
            .entry(channel.to_string())
            .or_default()
            .push(RoomMember {
                instance: self.instance.clone(),
                label: self.label.clone(),
                tx,
            });

        tracing::debug!("Instance {} joined local channel {}", self.instance.short(), channel);
        Ok(ChannelSubscription::new(channel, rx))
    }

    async fn publish(&self, channel: &str, message: SyncMessage) -> Result<(), ChannelError> {
        self.hub.check_available()?;

        let Some(mut room) = self.hub.rooms.get_mut(channel) else {
            return Ok(());
        };

        let delivery = Delivery {
            origin: self.instance.clone(),
            message,
        };

        room.retain(|member| {
            if member.instance == self.instance {
                return !member.tx.is_closed();
            }
            match member.tx.try_send(delivery.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        "Dropping delivery for {} on {}: queue full",
                        member.instance.short(),
                        channel
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });

        Ok(())
    }

    async fn presence(&self, channel: &str) -> Result<Vec<PeerInfo>, ChannelError> {
        self.hub.check_available()?;
        self.hub.prune(channel);

        let Some(room) = self.hub.rooms.get(channel) else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let peers = room
            .iter()
            .filter(|member| member.instance != self.instance)
            .filter(|member| seen.insert(member.instance.clone()))
            .map(|member| PeerInfo {
                instance: member.instance.clone(),
                label: member.label.clone(),
            })
            .collect();

        Ok(peers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_protocol::TeamMember;

    fn update(id: &str) -> SyncMessage {
        SyncMessage::team_update(vec![TeamMember::new(id, "Name", "Role")], 1)
    }

    #[tokio::test]
    async fn test_publish_reaches_others_but_not_self() {
        let hub = LocalHub::new();
        let a = hub.handle(InstanceId::new("a"), None);
        let b = hub.handle(InstanceId::new("b"), None);

        let mut sub_a = a.subscribe("wall").await.unwrap();
        let mut sub_b = b.subscribe("wall").await.unwrap();

        a.publish("wall", update("1")).await.unwrap();

        let delivery = sub_b.recv().await.unwrap();
        assert_eq!(delivery.origin, InstanceId::new("a"));
        assert_eq!(delivery.message, update("1"));

        assert!(sub_a.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let hub = LocalHub::new();
        let a = hub.handle(InstanceId::new("a"), None);
        let b = hub.handle(InstanceId::new("b"), None);

        let mut sub_b = b.subscribe("other").await.unwrap();
        a.publish("wall", update("1")).await.unwrap();

        assert!(sub_b.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_presence_excludes_self_and_dropped() {
        let hub = LocalHub::new();
        let a = hub.handle(InstanceId::new("a"), Some("lobby".into()));
        let b = hub.handle(InstanceId::new("b"), None);
        let c = hub.handle(InstanceId::new("c"), None);

        let _sub_a = a.subscribe("wall").await.unwrap();
        let _sub_b = b.subscribe("wall").await.unwrap();
        let sub_c = c.subscribe("wall").await.unwrap();

        let peers = b.presence("wall").await.unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].label.as_deref(), Some("lobby"));

        drop(sub_c);
        let peers = b.presence("wall").await.unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].instance, InstanceId::new("a"));
        assert_eq!(hub.subscriber_count("wall"), 2);
    }

    #[tokio::test]
    async fn test_offline_hub_fails_everything() {
        let hub = LocalHub::new();
        let a = hub.handle(InstanceId::new("a"), None);
        hub.set_available(false);

        assert!(matches!(a.subscribe("wall").await, Err(ChannelError::Unreachable(_))));
        assert!(matches!(a.publish("wall", update("1")).await, Err(ChannelError::Unreachable(_))));
        assert!(matches!(a.presence("wall").await, Err(ChannelError::Unreachable(_))));

        hub.set_available(true);
        assert!(a.presence("wall").await.unwrap().is_empty());
    }
}
