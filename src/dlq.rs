use std::time::Duration;

use log::error;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};

use crate::errors::{DlqError, ForwarderError, Result};

/// Publishes failure envelopes to the fixed dead-letter topic. A publish
/// failure here is logged and swallowed by the caller; this type just
/// reports `Err` honestly, it never panics or retries.
pub struct DlqPublisher {
    producer: FutureProducer,
    topic: String,
}

impl DlqPublisher {
    pub fn new(bootstrap_servers: &str, topic: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| ForwarderError::Config(format!("failed to create DLQ producer: {e}")))?;

        Ok(DlqPublisher {
            producer,
            topic: topic.to_string(),
        })
    }

    pub async fn publish(&self, envelope_bytes: &[u8], key: Option<&str>) -> std::result::Result<(), DlqError> {
        let send_result = match key {
            Some(k) => {
                let record = FutureRecord::to(&self.topic).payload(envelope_bytes).key(k);
                self.producer.send(record, Duration::from_secs(5)).await
            }
            None => {
                let record: FutureRecord<'_, [u8], [u8]> =
                    FutureRecord::to(&self.topic).payload(envelope_bytes);
                self.producer.send(record, Duration::from_secs(5)).await
            }
        };

        match send_result {
            Ok(_) => Ok(()),
            Err((e, _)) => {
                error!("dlq_publish_failed topic={} error={e}", self.topic);
                Err(DlqError::Kafka(e))
            }
        }
    }
}
