//! WebSocket feed for dashboards
//!
//! Protocol:
//! 1. Server sends `{"type":"ack","message":...}` on connect.
//! 2. Client sends `{"subscribe":{"ownerId":"<uuid>"}}`. The owner id is
//!    the one established by the fronting authentication layer.
//! 3. Server joins the connection to the owner's boat group and forwards
//!    every [`RealtimeEvent`] for that boat until either side closes.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use marinelink_domain::{BoatRepository, OwnerId};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::realtime::{FanoutHub, RealtimeEvent};

/// Control frames that are not boat events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    Ack { message: String },
    Error { message: String },
}

#[derive(Debug, Deserialize)]
struct SubscribeFrame {
    subscribe: SubscribeRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeRequest {
    owner_id: OwnerId,
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub struct FeedServer {
    hub: Arc<FanoutHub>,
    boats: BoatRepository,
    addr: SocketAddr,
}

impl FeedServer {
    pub fn new(addr: SocketAddr, hub: Arc<FanoutHub>, boats: BoatRepository) -> Self {
        Self { hub, boats, addr }
    }

    /// Accept connections until `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("Realtime feed listening on {}", self.addr);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        debug!("New feed connection from {}", peer_addr);
                        let server = Arc::clone(&self);
                        let shutdown = shutdown.clone();

                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, peer_addr, shutdown).await {
                                warn!("Feed connection {} ended with error: {}", peer_addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
                _ = shutdown.changed() => {
                    info!("Realtime feed shutting down");
                    return Ok(());
                }
            }
        }
    }

    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), BoxError> {
        let ws_stream = accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let ack = ControlMessage::Ack {
            message: "Connected to MarineLink realtime feed".to_string(),
        };
        ws_sender.send(Message::Text(serde_json::to_string(&ack)?)).await?;

        // Wait for the subscribe frame
        let owner_id = loop {
            tokio::select! {
                msg = ws_receiver.next() => match msg {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<SubscribeFrame>(&text) {
                        Ok(frame) => break frame.subscribe.owner_id,
                        Err(_) => {
                            let err = ControlMessage::Error {
                                message: "expected {\"subscribe\":{\"ownerId\":...}}".to_string(),
                            };
                            ws_sender.send(Message::Text(serde_json::to_string(&err)?)).await?;
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                },
                _ = shutdown.changed() => return Ok(()),
            }
        };

        let boats = self.boats.clone();
        let boat = tokio::task::spawn_blocking(move || boats.find_by_owner(owner_id)).await??;
        let Some(boat) = boat else {
            let err = ControlMessage::Error {
                message: "no boat for owner".to_string(),
            };
            ws_sender.send(Message::Text(serde_json::to_string(&err)?)).await?;
            ws_sender.send(Message::Close(None)).await?;
            return Ok(());
        };

        let mut events = self.hub.subscribe(boat.id);
        info!(boat_id = %boat.id, peer = %peer_addr, "Dashboard subscribed");

        let joined = ControlMessage::Ack {
            message: format!("subscribed to boat {}", boat.id),
        };
        ws_sender.send(Message::Text(serde_json::to_string(&joined)?)).await?;

        loop {
            tokio::select! {
                msg = ws_receiver.next() => match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client {} disconnected", peer_addr);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Error receiving from {}: {}", peer_addr, e);
                        break;
                    }
                },
                event = events.recv() => match event {
                    Ok(event) => {
                        let json = serde_json::to_string::<RealtimeEvent>(&event)?;
                        if let Err(e) = ws_sender.send(Message::Text(json)).await {
                            warn!("Error sending to {}: {}", peer_addr, e);
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(peer = %peer_addr, skipped, "Slow dashboard dropped events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown.changed() => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }

        Ok(())
    }
}
