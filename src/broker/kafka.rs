use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rskafka::client::partition::{Compression, OffsetAt, PartitionClient, UnknownTopicHandling};
use rskafka::client::{Client, ClientBuilder};
use rskafka::record::Record;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{MessageLog, SUBSCRIPTION_BUFFER};
use crate::config::BrokerConfig;
use crate::error::{BridgeError, Result};

/// Topics are used as single-partition logs.
const PARTITION: i32 = 0;
const FETCH_MAX_BYTES: i32 = 1_000_000;
const FETCH_MAX_WAIT_MS: i32 = 500;
const RETRY_DELAY: Duration = Duration::from_secs(1);

fn broker_error(e: impl std::fmt::Display) -> BridgeError {
    BridgeError::Broker(e.to_string())
}

/// Kafka-backed [`MessageLog`].
pub struct KafkaLog {
    client: Client,
    partitions: Mutex<HashMap<String, Arc<PartitionClient>>>,
    consumers: Mutex<Vec<JoinHandle<()>>>,
}

impl KafkaLog {
    pub async fn connect(config: &BrokerConfig) -> Result<Self> {
        let client = ClientBuilder::new(config.brokers.clone())
            .build()
            .await
            .map_err(broker_error)?;
        info!("Connected to Kafka brokers {:?}", config.brokers);
        Ok(Self {
            client,
            partitions: Mutex::new(HashMap::new()),
            consumers: Mutex::new(Vec::new()),
        })
    }

    async fn partition(&self, topic: &str) -> Result<Arc<PartitionClient>> {
        let mut partitions = self.partitions.lock().await;
        if let Some(partition) = partitions.get(topic) {
            return Ok(partition.clone());
        }
        let partition = Arc::new(
            self.client
                .partition_client(topic.to_string(), PARTITION, UnknownTopicHandling::Retry)
                .await
                .map_err(broker_error)?,
        );
        partitions.insert(topic.to_string(), partition.clone());
        Ok(partition)
    }
}

#[async_trait]
impl MessageLog for KafkaLog {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let partition = self.partition(topic).await?;
        let record = Record {
            key: None,
            value: Some(payload),
            headers: BTreeMap::new(),
            timestamp: chrono::Utc::now(),
        };
        partition
            .produce(vec![record], Compression::NoCompression)
            .await
            .map_err(broker_error)?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<Vec<u8>>> {
        let partition = self.partition(topic).await?;
        let mut offset = partition
            .get_offset(OffsetAt::Latest)
            .await
            .map_err(broker_error)?;
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let topic = topic.to_string();

        let handle = tokio::spawn(async move {
            loop {
                let records = match partition
                    .fetch_records(offset, 1..FETCH_MAX_BYTES, FETCH_MAX_WAIT_MS)
                    .await
                {
                    Ok((records, _high_watermark)) => records,
                    Err(e) => {
                        warn!("Fetch from topic {} failed: {}", topic, e);
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                };

                for record in records {
                    offset = record.offset + 1;
                    let Some(value) = record.record.value else {
                        continue;
                    };
                    if tx.send(value).await.is_err() {
                        return;
                    }
                }
            }
        });
        self.consumers.lock().await.push(handle);

        Ok(rx)
    }

    async fn disconnect(&self) -> Result<()> {
        for handle in self.consumers.lock().await.drain(..) {
            handle.abort();
        }
        self.partitions.lock().await.clear();
        Ok(())
    }
}
