//! Distributed log seam.
//!
//! When a broker is configured the pipe processes publish to and consume from
//! topics instead of stdin/stdout. Ordering, partitioning and delivery
//! guarantees belong to the log system.

#[cfg(test)]
pub mod memory;

#[cfg(feature = "kafka")]
pub mod kafka;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::BrokerConfig;
use crate::error::Result;

#[cfg(test)]
pub use memory::MemoryLog;

/// Buffer between a subscription and its consumer.
pub const SUBSCRIPTION_BUFFER: usize = 256;

#[async_trait]
pub trait MessageLog: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Messages on `topic` arrive on the returned channel until the log is
    /// disconnected.
    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<Vec<u8>>>;

    async fn disconnect(&self) -> Result<()>;
}

/// Connect to the configured brokers.
pub async fn connect(config: &BrokerConfig) -> Result<Arc<dyn MessageLog>> {
    #[cfg(feature = "kafka")]
    {
        Ok(Arc::new(kafka::KafkaLog::connect(config).await?))
    }

    #[cfg(not(feature = "kafka"))]
    {
        Err(crate::error::BridgeError::InvalidConfig {
            key: crate::config::ENV_KAFKA_BROKERS.to_string(),
            message: format!(
                "brokers {:?} configured but this build has no `kafka` feature",
                config.brokers
            ),
        })
    }
}
