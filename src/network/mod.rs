//! P2P Networking module
//!
//! Nodes talk over WebSockets: a node dials `ws://host:port/ws?openPort=P`
//! and the remote side registers it under its address and `P`, so either
//! end can be reached again by the rest of the network.
//!
//! # Features
//! - Chain synchronization on connect (longest valid chain wins)
//! - Block and transaction gossip
//! - Peer announcement

pub mod connection;
pub mod gossip;
pub mod message;
pub mod peer;

pub use gossip::PeerNetwork;
pub use message::Message;
pub use peer::{peer_key, PeerError, PeerHandle, PeerRegistry, PEER_CHANNEL_CAPACITY};
