//! Chain and mempool gossip between nodes
//!
//! `PeerNetwork` dials and accepts peer sockets, keeps the registry, and
//! reacts to peer messages by syncing the local node. Local blocks and
//! transactions are pushed to every peer by the relay task.

use crate::api::{LedgerService, PeerService};
use crate::core::ChainEvent;
use crate::network::connection::{drive, split_axum, split_tungstenite};
use crate::network::message::Message;
use crate::network::peer::{
    parse_peer_key, peer_key, validate_host, PeerError, PeerHandle, PeerRegistry,
    PEER_CHANNEL_CAPACITY,
};
use crate::node::Node;
use async_trait::async_trait;
use axum::extract::ws::WebSocket;
use futures::future::BoxFuture;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct PeerNetwork {
    registry: Arc<PeerRegistry>,
    node: Arc<Node>,
    listen_port: u16,
}

impl PeerNetwork {
    /// `listen_port` is the REST port peers should dial back on
    pub fn new(node: Arc<Node>, listen_port: u16) -> Self {
        Self {
            registry: Arc::new(PeerRegistry::new()),
            node,
            listen_port,
        }
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Dial `address:port` and start syncing with it
    ///
    /// With `announce`, the other peers are told to connect to it as well.
    fn connect(
        &self,
        address: String,
        port: u16,
        self_port: u16,
        announce: bool,
    ) -> BoxFuture<'static, Result<(), PeerError>> {
        let network = self.clone();
        Box::pin(async move {
            validate_host(&address)?;
            let key = peer_key(&address, port);
            if port == 0 {
                return Err(PeerError::InvalidAddress(key));
            }
            if network.registry.contains(&key).await {
                debug!("Already connected to {}", key);
                return Ok(());
            }

            let url = format!("ws://{}/ws?openPort={}", key, self_port);
            let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| PeerError::ConnectionFailed(format!("{}: {}", key, e)))?;

            let (tx, rx) = mpsc::channel(PEER_CHANNEL_CAPACITY);
            let handle = PeerHandle {
                key: key.clone(),
                tx,
            };
            if !network.registry.register(handle.clone()).await {
                return Ok(());
            }

            let (sink, stream) = split_tungstenite(socket);
            tokio::spawn(drive(network.clone(), handle.clone(), sink, stream, rx));

            if announce {
                network
                    .registry
                    .broadcast_except(Message::NewPeerNotify(key.clone()), Some(&key))
                    .await;
            }
            handle
                .send(Message::NewestBlock(network.node.newest_block().await))
                .await
        })
    }

    async fn reply(&self, key: &str, msg: Message) {
        if let Err(e) = self.registry.send_to(key, msg).await {
            debug!("Reply to {} dropped: {}", key, e);
        }
    }

    /// React to one message from the peer registered as `key`
    pub async fn handle_message(&self, key: &str, msg: Message) {
        match msg {
            Message::NewestBlock(block) => {
                let ours = self.node.newest_block().await;
                let reply = if block.height >= ours.height {
                    Message::AllBlocksRequest
                } else {
                    Message::NewestBlock(ours)
                };
                self.reply(key, reply).await;
            }
            Message::AllBlocksRequest => {
                let blocks = self.node.blocks().await;
                self.reply(key, Message::AllBlocksResponse(blocks)).await;
            }
            Message::AllBlocksResponse(blocks) => match self.node.replace_chain(blocks).await {
                Ok(true) => info!("Synchronized chain from {}", key),
                Ok(false) => debug!("Kept local chain over {}", key),
                Err(e) => warn!("Rejected chain from {}: {}", key, e),
            },
            Message::NewBlockNotify(block) => {
                let height = block.height;
                if let Err(e) = self.node.add_peer_block(block).await {
                    warn!("Rejected block from {}: {}", key, e);
                    // A gap means we fell behind; fetch the whole chain
                    if height > self.node.height().await + 1 {
                        self.reply(key, Message::AllBlocksRequest).await;
                    }
                }
            }
            Message::NewTxNotify(tx) => {
                if let Err(e) = self.node.add_peer_transaction(tx).await {
                    warn!("Rejected transaction from {}: {}", key, e);
                }
            }
            Message::NewPeerNotify(target) => {
                let result = match parse_peer_key(&target) {
                    Ok((address, port)) => self.connect(address, port, self.listen_port, false).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    warn!("Could not reach announced peer {}: {}", target, e);
                }
            }
        }
    }

    /// Push locally appended blocks and submitted transactions to all peers
    pub fn spawn_relay(&self) -> JoinHandle<()> {
        let mut events = self.node.subscribe();
        let registry = self.registry.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ChainEvent::BlockAppended(block)) => {
                        registry.broadcast(Message::NewBlockNotify(block)).await
                    }
                    Ok(ChainEvent::TransactionAdded(tx)) => {
                        registry.broadcast(Message::NewTxNotify(tx)).await
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Relay lagged, {} events not sent to peers", skipped)
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[async_trait]
impl PeerService for PeerNetwork {
    async fn add_peer(&self, address: &str, port: u16, self_port: u16) -> Result<(), PeerError> {
        self.connect(address.to_string(), port, self_port, true).await
    }

    async fn peers(&self) -> Vec<String> {
        self.registry.keys().await
    }

    async fn accept(&self, socket: WebSocket, address: String, port: u16) {
        let (tx, rx) = mpsc::channel(PEER_CHANNEL_CAPACITY);
        let handle = PeerHandle {
            key: peer_key(&address, port),
            tx,
        };
        if !self.registry.register(handle.clone()).await {
            debug!("Dropping duplicate connection from {}", handle.key);
            return;
        }

        let (sink, stream) = split_axum(socket);
        drive(self.clone(), handle, sink, stream, rx).await;
    }
}
