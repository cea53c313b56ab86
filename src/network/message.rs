//! Network message types for P2P communication
//!
//! Every message travels as one JSON text frame of the form
//! `{"kind": "...", "payload": ...}`.

use crate::core::{Block, Transaction};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum Message {
    /// Our current tip, sent when a connection opens
    NewestBlock(Block),

    /// Ask for the full chain
    AllBlocksRequest,

    /// Full chain, newest first
    AllBlocksResponse(Vec<Block>),

    /// A block we just appended
    NewBlockNotify(Block),

    /// A transaction we just accepted from a client
    NewTxNotify(Transaction),

    /// `address:port` of a peer the receiver should connect to
    NewPeerNotify(String),
}

impl Message {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Get message type name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::NewestBlock(_) => "NewestBlock",
            Message::AllBlocksRequest => "AllBlocksRequest",
            Message::AllBlocksResponse(_) => "AllBlocksResponse",
            Message::NewBlockNotify(_) => "NewBlockNotify",
            Message::NewTxNotify(_) => "NewTxNotify",
            Message::NewPeerNotify(_) => "NewPeerNotify",
        }
    }
}
