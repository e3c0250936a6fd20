//! Sync channel traits

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ChannelError;
use tw_protocol::{InstanceId, PeerInfo, SyncMessage};

/// A message received on a channel, with the instance that published it
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Publishing instance
    pub origin: InstanceId,
    /// The message itself
    pub message: SyncMessage,
}

/// Stream of deliveries for one channel
///
/// Dropping the subscription leaves the channel.
#[derive(Debug)]
pub struct ChannelSubscription {
    channel: String,
    rx: mpsc::Receiver<Delivery>,
}

impl ChannelSubscription {
    pub fn new(channel: impl Into<String>, rx: mpsc::Receiver<Delivery>) -> Self {
        Self {
            channel: channel.into(),
            rx,
        }
    }

    /// Channel name this subscription listens on
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next delivery; `None` once the channel is gone
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Take a delivery that has already arrived, without waiting
    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }
}

/// Best-effort publish/subscribe transport shared by viewers
///
/// A handle belongs to one viewer instance. Implementations never hand a
/// viewer its own publications, and presence never lists the caller.
#[async_trait]
pub trait SyncChannel: Send + Sync {
    /// Instance this handle publishes as
    fn instance_id(&self) -> &InstanceId;

    /// Start receiving messages published on `channel` by other instances
    async fn subscribe(&self, channel: &str) -> Result<ChannelSubscription, ChannelError>;

    /// Publish a message to every other subscriber of `channel`
    async fn publish(&self, channel: &str, message: SyncMessage) -> Result<(), ChannelError>;

    /// Other instances currently subscribed to `channel`
    async fn presence(&self, channel: &str) -> Result<Vec<PeerInfo>, ChannelError>;
}
