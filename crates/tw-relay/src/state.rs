//! Shared relay state
//!
//! Rooms map a channel name to the connections that joined it. Each member
//! carries the sender half of its connection's outbound queue, so fan-out
//! never touches a socket directly.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use tw_core::config::RelayConfig;
use tw_protocol::{InstanceId, PeerInfo, RelayFrame, SyncMessage};

/// Relay-local connection identifier
pub type ConnectionId = u64;

/// One connection's membership in a room
#[derive(Debug, Clone)]
pub struct RoomMember {
    pub connection: ConnectionId,
    pub instance: InstanceId,
    pub label: Option<String>,
    pub outbound: mpsc::Sender<RelayFrame>,
}

/// Global state for the relay daemon
pub struct RelayState {
    /// Configuration
    pub config: RelayConfig,
    rooms: DashMap<String, Vec<RoomMember>>,
    next_connection: AtomicU64,
    active: AtomicUsize,
}

impl RelayState {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            rooms: DashMap::new(),
            next_connection: AtomicU64::new(1),
            active: AtomicUsize::new(0),
        }
    }

    /// Claim a connection slot, or `None` when the relay is full
    pub fn open_connection(&self) -> Option<ConnectionId> {
        let limit = self.config.max_connections.map(|max| max as usize);
        let claimed = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |active| match limit {
                Some(max) if active >= max => None,
                _ => Some(active + 1),
            });

        claimed
            .ok()
            .map(|_| self.next_connection.fetch_add(1, Ordering::Relaxed))
    }

    /// Release a connection slot and leave every room it joined
    pub fn close_connection(&self, connection: ConnectionId) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.rooms
            .iter_mut()
            .for_each(|mut room| room.retain(|m| m.connection != connection));
        self.rooms.retain(|_, room| !room.is_empty());
    }

    /// Connections currently open
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Add a member to `channel`; joining twice replaces the earlier entry
    pub fn join(&self, channel: &str, member: RoomMember) {
        let mut room = self.rooms.entry(channel.to_string()).or_default();
        room.retain(|m| m.connection != member.connection);
        tracing::debug!(
            "Connection {} joined {} as {}",
            member.connection,
            channel,
            member.instance.short()
        );
        room.push(member);
    }

    /// Remove a connection from `channel`
    pub fn leave(&self, channel: &str, connection: ConnectionId) {
        let now_empty = match self.rooms.get_mut(channel) {
            Some(mut room) => {
                room.retain(|m| m.connection != connection);
                room.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.rooms.remove_if(channel, |_, room| room.is_empty());
        }
    }

    /// Forward `message` to every member of `channel` except the publisher
    ///
    /// Returns the number of connections it was queued for. A member whose
    /// queue is full misses this message.
    pub fn publish(
        &self,
        channel: &str,
        from: ConnectionId,
        origin: &InstanceId,
        message: &SyncMessage,
    ) -> usize {
        let Some(room) = self.rooms.get(channel) else {
            return 0;
        };

        let mut delivered = 0;
        for member in room.iter().filter(|m| m.connection != from) {
            let frame = RelayFrame::Delivery {
                channel: channel.to_string(),
                origin: origin.clone(),
                message: message.clone(),
            };
            match member.outbound.try_send(frame) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        "Connection {} is not keeping up; dropped a message on {}",
                        member.connection,
                        channel
                    );
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    /// Every instance joined to `channel`, once each, in join order
    pub fn presence(&self, channel: &str) -> Vec<PeerInfo> {
        let Some(room) = self.rooms.get(channel) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        room.iter()
            .filter(|m| seen.insert(m.instance.clone()))
            .map(|m| PeerInfo {
                instance: m.instance.clone(),
                label: m.label.clone(),
            })
            .collect()
    }

    /// Channels with at least one member
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tw_protocol::TeamMember;

    fn member(
        state: &RelayState,
        instance: &str,
    ) -> (RoomMember, mpsc::Receiver<RelayFrame>) {
        let (tx, rx) = mpsc::channel(4);
        let connection = state.open_connection().unwrap();
        let member = RoomMember {
            connection,
            instance: InstanceId::new(instance),
            label: None,
            outbound: tx,
        };
        (member, rx)
    }

    fn message() -> SyncMessage {
        SyncMessage::team_update(vec![TeamMember::new("1", "Domendra", "Geo Tech")], 7)
    }

    #[test]
    fn test_publish_skips_publisher() {
        let state = RelayState::new(RelayConfig::default());
        let (a, mut rx_a) = member(&state, "a");
        let (b, mut rx_b) = member(&state, "b");
        let from = a.connection;
        state.join("wall", a);
        state.join("wall", b);

        let delivered = state.publish("wall", from, &InstanceId::new("a"), &message());

        assert_eq!(delivered, 1);
        assert!(rx_a.try_recv().is_err());
        match rx_b.try_recv().unwrap() {
            RelayFrame::Delivery { origin, .. } => assert_eq!(origin, InstanceId::new("a")),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_rejoin_does_not_duplicate() {
        let state = RelayState::new(RelayConfig::default());
        let (a, _rx) = member(&state, "a");
        state.join("wall", a.clone());
        state.join("wall", a);

        assert_eq!(state.presence("wall").len(), 1);
    }

    #[test]
    fn test_close_connection_leaves_all_rooms() {
        let state = RelayState::new(RelayConfig::default());
        let (a, _rx_a) = member(&state, "a");
        let (b, _rx_b) = member(&state, "b");
        let gone = a.connection;
        state.join("wall", a.clone());
        state.join("lobby", a);
        state.join("wall", b);

        state.close_connection(gone);

        assert_eq!(state.presence("wall").len(), 1);
        assert_eq!(state.room_count(), 1);
        assert_eq!(state.active_connections(), 1);
    }

    #[test]
    fn test_leave_removes_empty_room() {
        let state = RelayState::new(RelayConfig::default());
        let (a, _rx) = member(&state, "a");
        let connection = a.connection;
        state.join("wall", a);

        state.leave("wall", connection);

        assert!(state.presence("wall").is_empty());
        assert_eq!(state.room_count(), 0);
    }

    #[test]
    fn test_connection_limit() {
        let config = RelayConfig {
            max_connections: Some(2),
            ..RelayConfig::default()
        };
        let state = RelayState::new(config);

        let first = state.open_connection().unwrap();
        assert!(state.open_connection().is_some());
        assert!(state.open_connection().is_none());

        state.close_connection(first);
        assert!(state.open_connection().is_some());
    }
}
