//! Broadcast channel for local ledger mutations
//!
//! The node publishes here whenever it appends a block or accepts a
//! transaction from a client, and the peer network relays the events.

use crate::core::{Block, Transaction};
use tokio::sync::broadcast;

/// Maximum number of events buffered per subscriber
const EVENT_CAPACITY: usize = 100;

#[derive(Clone, Debug)]
pub enum ChainEvent {
    BlockAppended(Block),
    TransactionAdded(Transaction),
}

#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<ChainEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, event: ChainEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(ChainEvent::TransactionAdded(Transaction::coinbase("a", 1, 1)));
    }

    #[tokio::test]
    async fn test_subscriber_receives_block() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let block = Block::genesis(4);

        bus.publish(ChainEvent::BlockAppended(block.clone()));

        match rx.recv().await.unwrap() {
            ChainEvent::BlockAppended(received) => assert_eq!(received.hash, block.hash),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
