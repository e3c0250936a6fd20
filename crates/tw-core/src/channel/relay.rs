//! Relay client
//!
//! Connects to a `tw-relay` daemon over TCP and speaks the framed relay
//! protocol. Two background tasks own the socket:
//!
//! - the writer drains an outbound queue into the framed sink; it runs
//!   until the queue is closed, so frames queued before the channel is
//!   dropped still reach the relay
//! - the reader dispatches `Delivery` frames to channel subscribers,
//!   `PresenceList` frames to the caller waiting on that request id, and
//!   `Joined` / `Error` frames to callers waiting on a join
//!
//! When the connection drops the channel is marked disconnected and every
//! later call fails with [`ChannelError::Disconnected`]. There is no
//! reconnect.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use super::SUBSCRIBER_BUFFER;
use crate::error::ChannelError;
use crate::traits::{ChannelSubscription, Delivery, SyncChannel};
use tw_protocol::{InstanceId, PeerInfo, RelayCodec, RelayFrame, SyncMessage};

/// Frames queued for the writer task
const OUTBOUND_BUFFER: usize = 64;

type Subscribers = Arc<DashMap<String, Vec<mpsc::Sender<Delivery>>>>;
type PendingPresence = Arc<DashMap<u64, oneshot::Sender<Vec<PeerInfo>>>>;
type PendingJoins = Arc<DashMap<String, Vec<oneshot::Sender<Result<(), String>>>>>;

/// Sync channel backed by a relay daemon
pub struct RelayChannel {
    address: String,
    instance: InstanceId,
    label: Option<String>,
    timeout: Duration,
    outbound: mpsc::Sender<RelayFrame>,
    subscribers: Subscribers,
    pending: PendingPresence,
    joins: PendingJoins,
    next_request: AtomicU64,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl RelayChannel {
    /// Connect to the relay at `address`
    ///
    /// `timeout` bounds the TCP connect here and every join or presence
    /// request later.
    pub async fn connect(
        address: &str,
        instance: InstanceId,
        label: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        tracing::debug!("Connecting to relay at {}", address);

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ChannelError::Unreachable(format!("{}: {}", address, e)));
            }
            Err(_) => return Err(ChannelError::Timeout),
        };
        let _ = stream.set_nodelay(true);

        let (sink, stream) = Framed::new(stream, RelayCodec::new()).split();
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);

        let subscribers: Subscribers = Arc::new(DashMap::new());
        let pending: PendingPresence = Arc::new(DashMap::new());
        let joins: PendingJoins = Arc::new(DashMap::new());
        let connected = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        tokio::spawn(write_loop(sink, outbound_rx));
        tokio::spawn(read_loop(
            stream,
            Arc::clone(&subscribers),
            Arc::clone(&pending),
            Arc::clone(&joins),
            Arc::clone(&connected),
            cancel.clone(),
        ));

        tracing::info!("Connected to relay at {} as {}", address, instance.short());

        Ok(Self {
            address: address.to_string(),
            instance,
            label,
            timeout,
            outbound,
            subscribers,
            pending,
            joins,
            next_request: AtomicU64::new(1),
            connected,
            cancel,
        })
    }

    /// Relay address this channel talks to
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the connection is still up
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, frame: RelayFrame) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Disconnected);
        }
        self.outbound
            .send(frame)
            .await
            .map_err(|_| ChannelError::Disconnected)
    }
}

impl Drop for RelayChannel {
    // Stops the reader only; the writer ends once `outbound` is dropped
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl SyncChannel for RelayChannel {
    fn instance_id(&self) -> &InstanceId {
        &self.instance
    }

    /// Join `channel` and wait for the relay to confirm it
    async fn subscribe(&self, channel: &str) -> Result<ChannelSubscription, ChannelError> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers
            .entry(channel.to_string())
            .or_default()
            .push(tx);

        let (joined_tx, joined_rx) = oneshot::channel();
        self.joins
            .entry(channel.to_string())
            .or_default()
            .push(joined_tx);

        // The reader clears waiters after marking the connection down
        if !self.is_connected() {
            self.joins.remove(channel);
            return Err(ChannelError::Disconnected);
        }

        self.send(RelayFrame::Join {
            channel: channel.to_string(),
            instance: self.instance.clone(),
            label: self.label.clone(),
        })
        .await?;

        match tokio::time::timeout(self.timeout, joined_rx).await {
            Ok(Ok(Ok(()))) => Ok(ChannelSubscription::new(channel, rx)),
            Ok(Ok(Err(message))) => Err(ChannelError::Rejected(message)),
            Ok(Err(_)) => Err(ChannelError::Disconnected),
            Err(_) => {
                self.joins.remove(channel);
                Err(ChannelError::Timeout)
            }
        }
    }

    async fn publish(&self, channel: &str, message: SyncMessage) -> Result<(), ChannelError> {
        self.send(RelayFrame::Publish {
            channel: channel.to_string(),
            message,
        })
        .await
    }

    async fn presence(&self, channel: &str) -> Result<Vec<PeerInfo>, ChannelError> {
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id, tx);

        if let Err(e) = self
            .send(RelayFrame::Presence {
                channel: channel.to_string(),
                request_id,
            })
            .await
        {
            self.pending.remove(&request_id);
            return Err(e);
        }

        let peers = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(peers)) => peers,
            Ok(Err(_)) => return Err(ChannelError::Disconnected),
            Err(_) => {
                self.pending.remove(&request_id);
                return Err(ChannelError::Timeout);
            }
        };

        Ok(peers
            .into_iter()
            .filter(|peer| peer.instance != self.instance)
            .collect())
    }
}

async fn write_loop(
    mut sink: SplitSink<Framed<TcpStream, RelayCodec>, RelayFrame>,
    mut outbound: mpsc::Receiver<RelayFrame>,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = sink.send(frame).await {
            tracing::warn!("Failed to write to relay: {}", e);
            break;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop(
    mut stream: SplitStream<Framed<TcpStream, RelayCodec>>,
    subscribers: Subscribers,
    pending: PendingPresence,
    joins: PendingJoins,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(RelayFrame::Delivery {
                channel,
                origin,
                message,
            })) => {
                dispatch(&subscribers, &channel, Delivery { origin, message });
            }
            Some(Ok(RelayFrame::PresenceList {
                request_id, peers, ..
            })) => {
                if let Some((_, waiter)) = pending.remove(&request_id) {
                    let _ = waiter.send(peers);
                }
            }
            Some(Ok(RelayFrame::Joined { channel })) => {
                tracing::debug!("Relay confirmed join of {}", channel);
                if let Some((_, waiters)) = joins.remove(&channel) {
                    for waiter in waiters {
                        let _ = waiter.send(Ok(()));
                    }
                }
            }
            Some(Ok(RelayFrame::Error { message })) => {
                tracing::warn!("Relay reported an error: {}", message);
                // Errors carry no channel; fail every join still in flight
                let channels: Vec<String> = joins.iter().map(|entry| entry.key().clone()).collect();
                for channel in channels {
                    if let Some((_, waiters)) = joins.remove(&channel) {
                        for waiter in waiters {
                            let _ = waiter.send(Err(message.clone()));
                        }
                    }
                }
            }
            Some(Ok(other)) => {
                tracing::debug!("Ignoring unexpected frame from relay: {:?}", other.kind());
            }
            Some(Err(e)) => {
                tracing::warn!("Relay connection error: {}", e);
                break;
            }
            None => {
                tracing::warn!("Relay closed the connection");
                break;
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
    // Dropping the senders wakes every waiter and ends every subscription
    pending.clear();
    joins.clear();
    subscribers.clear();
    cancel.cancel();
}

fn dispatch(subscribers: &Subscribers, channel: &str, delivery: Delivery) {
    let Some(mut senders) = subscribers.get_mut(channel) else {
        tracing::debug!("Delivery for unsubscribed channel {}", channel);
        return;
    };

    senders.retain(|tx| match tx.try_send(delivery.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!("Subscriber on {} is not keeping up; dropping delivery", channel);
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    });
}
