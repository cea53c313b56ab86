//! Peer registry
//!
//! Tracks open peer connections by their `address:port` key and routes
//! outgoing messages to each connection's writer task.

use crate::network::message::Message;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};

/// Messages buffered per peer before senders wait
pub const PEER_CHANNEL_CAPACITY: usize = 100;

/// Peer connection errors
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("Invalid peer address: {0}")]
    InvalidAddress(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Peer disconnected")]
    Disconnected,
}

/// Key a peer is registered under
pub fn peer_key(address: &str, port: u16) -> String {
    format!("{}:{}", address, port)
}

/// Split an `address:port` key
pub fn parse_peer_key(key: &str) -> Result<(String, u16), PeerError> {
    let (address, port) = key
        .rsplit_once(':')
        .ok_or_else(|| PeerError::InvalidAddress(key.to_string()))?;
    let port = port
        .parse()
        .map_err(|_| PeerError::InvalidAddress(key.to_string()))?;
    validate_host(address)?;
    Ok((address.to_string(), port))
}

/// Hosts are names or IPv4 literals; anything else would corrupt the dial URL
pub fn validate_host(address: &str) -> Result<(), PeerError> {
    let well_formed = !address.is_empty()
        && address
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if well_formed {
        Ok(())
    } else {
        Err(PeerError::InvalidAddress(address.to_string()))
    }
}

/// Handle for sending messages to a peer
#[derive(Clone)]
pub struct PeerHandle {
    pub key: String,
    pub tx: mpsc::Sender<Message>,
}

impl PeerHandle {
    pub async fn send(&self, msg: Message) -> Result<(), PeerError> {
        self.tx.send(msg).await.map_err(|_| PeerError::Disconnected)
    }
}

/// Open connections keyed by `address:port`
#[derive(Default)]
pub struct PeerRegistry {
    handles: RwLock<HashMap<String, PeerHandle>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection; returns false if the key is already taken
    pub async fn register(&self, handle: PeerHandle) -> bool {
        let mut handles = self.handles.write().await;
        if handles.contains_key(&handle.key) {
            return false;
        }
        log::info!("Added peer: {}", handle.key);
        handles.insert(handle.key.clone(), handle);
        true
    }

    /// Remove `handle` only if it is still the registered connection for its key
    pub async fn remove_handle(&self, handle: &PeerHandle) -> bool {
        let mut handles = self.handles.write().await;
        let current = handles
            .get(&handle.key)
            .is_some_and(|h| h.tx.same_channel(&handle.tx));
        if current {
            handles.remove(&handle.key);
            log::info!("Removed peer: {}", handle.key);
        }
        current
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.handles.read().await.contains_key(key)
    }

    /// Registered keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.handles.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn count(&self) -> usize {
        self.handles.read().await.len()
    }

    /// Broadcast a message to all peers
    pub async fn broadcast(&self, msg: Message) {
        self.broadcast_except(msg, None).await;
    }

    /// Broadcast a message to all peers except `except`
    pub async fn broadcast_except(&self, msg: Message, except: Option<&str>) {
        let handles: Vec<PeerHandle> = self
            .handles
            .read()
            .await
            .values()
            .filter(|h| Some(h.key.as_str()) != except)
            .cloned()
            .collect();

        for handle in handles {
            if let Err(e) = handle.send(msg.clone()).await {
                log::warn!("Failed to send to {}: {}", handle.key, e);
            }
        }
    }

    /// Send a message to a specific peer
    pub async fn send_to(&self, key: &str, msg: Message) -> Result<(), PeerError> {
        let handle = self.handles.read().await.get(key).cloned();
        match handle {
            Some(handle) => handle.send(msg).await,
            None => Err(PeerError::Disconnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(key: &str) -> (PeerHandle, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(PEER_CHANNEL_CAPACITY);
        (
            PeerHandle {
                key: key.to_string(),
                tx,
            },
            rx,
        )
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let registry = PeerRegistry::new();
        let (first, _rx1) = handle("127.0.0.1:5000");
        let (second, _rx2) = handle("127.0.0.1:5000");

        assert!(registry.register(first.clone()).await);
        assert!(!registry.register(second).await);
        assert_eq!(registry.keys().await, vec!["127.0.0.1:5000".to_string()]);

        registry.remove_handle(&first).await;
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_stale_connection_keeps_replacement() {
        let registry = PeerRegistry::new();
        let (old, _rx1) = handle("127.0.0.1:5000");
        let (new, _rx2) = handle("127.0.0.1:5000");

        registry.register(old.clone()).await;
        assert!(registry.remove_handle(&old).await);
        assert!(registry.register(new.clone()).await);

        // The old connection finishing its teardown late must not evict the new one
        assert!(!registry.remove_handle(&old).await);
        assert!(registry.contains("127.0.0.1:5000").await);
        assert!(registry.remove_handle(&new).await);
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_except() {
        let registry = PeerRegistry::new();
        let (a, mut rx_a) = handle("a:1");
        let (b, mut rx_b) = handle("b:2");
        registry.register(a).await;
        registry.register(b).await;

        registry
            .broadcast_except(Message::AllBlocksRequest, Some("a:1"))
            .await;

        assert!(matches!(rx_b.recv().await, Some(Message::AllBlocksRequest)));
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer() {
        let registry = PeerRegistry::new();
        assert!(matches!(
            registry.send_to("nobody:1", Message::AllBlocksRequest).await,
            Err(PeerError::Disconnected)
        ));
    }

    #[test]
    fn test_parse_peer_key() {
        assert_eq!(
            parse_peer_key("127.0.0.1:4000").unwrap(),
            ("127.0.0.1".to_string(), 4000)
        );
        assert!(parse_peer_key("127.0.0.1").is_err());
        assert!(parse_peer_key("127.0.0.1:99999").is_err());
        assert!(parse_peer_key("bad/host:1").is_err());
        assert!(validate_host("").is_err());
        assert!(validate_host("node-1.local").is_ok());
    }
}
