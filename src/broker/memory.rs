use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::{MessageLog, SUBSCRIPTION_BUFFER};
use crate::error::{BridgeError, Result};

#[derive(Default)]
struct Topic {
    records: Vec<Vec<u8>>,
    subscribers: Vec<mpsc::Sender<Vec<u8>>>,
}

#[derive(Default)]
struct State {
    topics: HashMap<String, Topic>,
    disconnected: bool,
}

/// In-process log: every topic keeps its full history and new subscribers
/// replay it from the start. A subscriber that falls a full buffer behind is
/// cut off rather than stalling publishers.
#[derive(Default)]
pub struct MemoryLog {
    state: Mutex<State>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything ever published on `topic`, in order.
    pub async fn records(&self, topic: &str) -> Vec<Vec<u8>> {
        let state = self.state.lock().await;
        state
            .topics
            .get(topic)
            .map(|t| t.records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageLog for MemoryLog {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.disconnected {
            return Err(BridgeError::Broker("log is disconnected".to_string()));
        }

        let entry = state.topics.entry(topic.to_string()).or_default();
        entry.records.push(payload.clone());

        entry
            .subscribers
            .retain(|subscriber| match subscriber.try_send(payload.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!("Dropping lagging subscriber on topic {}", topic);
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            });
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<Vec<u8>>> {
        let mut state = self.state.lock().await;
        if state.disconnected {
            return Err(BridgeError::Broker("log is disconnected".to_string()));
        }

        let entry = state.topics.entry(topic.to_string()).or_default();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER.max(entry.records.len() + 1));
        for record in &entry.records {
            // Capacity covers the whole backlog.
            let _ = tx.try_send(record.clone());
        }
        entry.subscribers.push(tx);
        debug!("Subscribed to in-memory topic {}", topic);
        Ok(rx)
    }

    async fn disconnect(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.disconnected = true;
        for topic in state.topics.values_mut() {
            topic.subscribers.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_backlog_then_live_messages() {
        let log = MemoryLog::new();
        log.publish("telegram_out", b"one".to_vec()).await.unwrap();

        let mut rx = log.subscribe("telegram_out").await.unwrap();
        log.publish("telegram_out", b"two".to_vec()).await.unwrap();
        log.publish("other", b"ignored".to_vec()).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), b"one");
        assert_eq!(rx.recv().await.unwrap(), b"two");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_ends_subscriptions() {
        let log = MemoryLog::new();
        let mut rx = log.subscribe("t").await.unwrap();
        log.disconnect().await.unwrap();

        assert!(rx.recv().await.is_none());
        assert!(log.publish("t", b"late".to_vec()).await.is_err());
        assert!(log.subscribe("t").await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_subscriber_does_not_block_publish() {
        let log = MemoryLog::new();
        let rx = log.subscribe("t").await.unwrap();
        drop(rx);
        log.publish("t", b"x".to_vec()).await.unwrap();
        assert_eq!(log.records("t").await, vec![b"x".to_vec()]);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_is_cut_off_without_blocking() {
        let log = MemoryLog::new();
        let mut slow = log.subscribe("t").await.unwrap();
        let mut fast = log.subscribe("t").await.unwrap();

        for i in 0..=SUBSCRIPTION_BUFFER {
            let publish = log.publish("t", i.to_string().into_bytes());
            tokio::time::timeout(std::time::Duration::from_secs(1), publish)
                .await
                .expect("publish must not wait on subscribers")
                .unwrap();
            if i < SUBSCRIPTION_BUFFER {
                fast.recv().await.unwrap();
            }
        }

        assert_eq!(fast.recv().await.unwrap(), SUBSCRIPTION_BUFFER.to_string().into_bytes());
        let mut received = 0;
        while slow.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, SUBSCRIPTION_BUFFER);
        assert_eq!(log.records("t").await.len(), SUBSCRIPTION_BUFFER + 1);
    }
}
