//! Relay listener and per-connection handler
//!
//! Each accepted socket gets its own task. The task reads frames from the
//! viewer and, in the same `select!`, drains the connection's outbound
//! queue, which is where deliveries from other connections land.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use tw_core::config::RelayConfig;
use tw_protocol::{InstanceId, RelayCodec, RelayFrame};

use crate::state::{ConnectionId, RelayState, RoomMember};

/// Relay daemon bound to a socket
pub struct RelayServer {
    listener: TcpListener,
    state: Arc<RelayState>,
    cancel: CancellationToken,
}

impl RelayServer {
    /// Bind to `config.bind_address`
    pub async fn bind(config: RelayConfig, cancel: CancellationToken) -> Result<Self> {
        let listener = TcpListener::bind(&config.bind_address)
            .await
            .with_context(|| format!("Failed to bind to {}", config.bind_address))?;

        Ok(Self {
            listener,
            state: Arc::new(RelayState::new(config)),
            cancel,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared state, for inspection
    pub fn state(&self) -> &Arc<RelayState> {
        &self.state
    }

    /// Accept viewers until the cancellation token fires
    pub async fn run(self) -> Result<()> {
        tracing::info!("Relay listening on {}", self.local_addr()?);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Relay shutting down");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => self.handle_connection(socket, peer_addr),
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let state = Arc::clone(&self.state);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let _ = socket.set_nodelay(true);
            let mut framed = Framed::new(socket, RelayCodec::new());

            let Some(connection) = state.open_connection() else {
                tracing::warn!("Rejecting {}: connection limit reached", peer_addr);
                let _ = framed
                    .send(RelayFrame::Error {
                        message: "relay is full".to_string(),
                    })
                    .await;
                return;
            };

            tracing::info!("Connection {} from {}", connection, peer_addr);
            match serve(framed, connection, &state, cancel).await {
                Ok(()) => tracing::info!("Connection {} from {} closed", connection, peer_addr),
                Err(e) => tracing::warn!(
                    "Connection {} from {} closed with error: {}",
                    connection,
                    peer_addr,
                    e
                ),
            }
            state.close_connection(connection);
        });
    }
}

/// Per-connection state
struct ClientState {
    connection: ConnectionId,
    /// Instance announced by the first join
    instance: Option<InstanceId>,
    outbound: mpsc::Sender<RelayFrame>,
}

async fn serve(
    mut framed: Framed<TcpStream, RelayCodec>,
    connection: ConnectionId,
    state: &RelayState,
    cancel: CancellationToken,
) -> Result<()> {
    let (outbound, mut outbound_rx) = mpsc::channel(state.config.outbound_buffer.max(1));
    let mut client = ClientState {
        connection,
        instance: None,
        outbound,
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            frame = framed.next() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                };
                if let Some(reply) = handle_frame(frame, &mut client, state) {
                    framed.send(reply).await?;
                }
            }

            Some(frame) = outbound_rx.recv() => {
                framed.send(frame).await?;
            }
        }
    }

    Ok(())
}

fn handle_frame(frame: RelayFrame, client: &mut ClientState, state: &RelayState) -> Option<RelayFrame> {
    match frame {
        RelayFrame::Join {
            channel,
            instance,
            label,
        } => {
            client.instance.get_or_insert_with(|| instance.clone());
            state.join(
                &channel,
                RoomMember {
                    connection: client.connection,
                    instance,
                    label,
                    outbound: client.outbound.clone(),
                },
            );
            Some(RelayFrame::Joined { channel })
        }

        RelayFrame::Leave { channel } => {
            state.leave(&channel, client.connection);
            None
        }

        RelayFrame::Publish { channel, message } => {
            let Some(origin) = &client.instance else {
                return Some(RelayFrame::Error {
                    message: "join a channel before publishing".to_string(),
                });
            };
            let delivered = state.publish(&channel, client.connection, origin, &message);
            tracing::debug!(
                "{} from {} on {} delivered to {} connections",
                message.kind(),
                origin.short(),
                channel,
                delivered
            );
            None
        }

        RelayFrame::Presence {
            channel,
            request_id,
        } => {
            let peers = state.presence(&channel);
            Some(RelayFrame::PresenceList {
                channel,
                request_id,
                peers,
            })
        }

        other => Some(RelayFrame::Error {
            message: format!("unexpected {:?} frame from viewer", other.kind()),
        }),
    }
}
