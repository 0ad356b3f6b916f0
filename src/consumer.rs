use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use log::{error, info, warn};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use reqwest::Client;
use tokio::sync::watch;
use tokio::time::interval;

use crate::batcher::Batcher;
use crate::config::Config;
use crate::csv_encoder;
use crate::dlq::DlqPublisher;
use crate::domain::{DeliveryMode, DlqEnvelope, MergedEvent, Topic};
use crate::enrich::Enricher;
use crate::errors::{ForwarderError, Result};
use crate::idempotency::{Decision, IdempotencyStore};
use crate::metrics::Telemetry;
use crate::sender::{CsvSender, JsonSender};

/// Polling period for the idle-stream flush ticker.
const IDLE_FLUSH_CHECK_INTERVAL: Duration = Duration::from_millis(200);

pub struct ConsumerLoop {
    cfg: Config,
    telemetry: Arc<Telemetry>,
    idempotency: IdempotencyStore,
    enricher: Enricher,
    batcher: Option<Batcher>,
    dlq: DlqPublisher,
    json_sender: Option<JsonSender>,
    csv_sender: Option<CsvSender>,
}

impl ConsumerLoop {
    pub async fn new(cfg: Config, telemetry: Arc<Telemetry>) -> Result<Self> {
        let idempotency = IdempotencyStore::connect(&cfg.redis_url, cfg.idemp_ttl_seconds).await;
        let dlq = DlqPublisher::new(&cfg.kafka_bootstrap_servers, &cfg.analytics_dlq_topic)?;

        let client = Client::new();
        let (json_sender, csv_sender, batcher) = match cfg.analytics_mode {
            DeliveryMode::Json => (Some(JsonSender::new(client, cfg.analytics_url.clone())), None, None),
            DeliveryMode::Csv => (
                None,
                Some(CsvSender::new(client, cfg.analytics_url.clone())),
                Some(Batcher::new(cfg.batch_max_size, cfg.flush_interval)),
            ),
        };

        Ok(ConsumerLoop {
            cfg,
            telemetry,
            idempotency,
            enricher: Enricher::new(),
            batcher,
            dlq,
            json_sender,
            csv_sender,
        })
    }

    fn build_consumer(&self) -> Result<StreamConsumer> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.cfg.kafka_bootstrap_servers)
            .set("group.id", &self.cfg.consumer_group)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| ForwarderError::Config(format!("failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[&self.cfg.customer_topic, &self.cfg.inventory_topic])
            .map_err(|e| ForwarderError::Config(format!("failed to subscribe: {e}")))?;

        Ok(consumer)
    }

    fn topic_of(&self, raw: &str) -> Option<Topic> {
        if raw == self.cfg.customer_topic {
            Some(Topic::Customer)
        } else if raw == self.cfg.inventory_topic {
            Some(Topic::Inventory)
        } else {
            None
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let consumer = self.build_consumer()?;
        let mut stream = consumer.stream();
        let mut idle_ticker = interval(IDLE_FLUSH_CHECK_INTERVAL);

        info!(
            "consuming topics={},{} mode={:?} analytics_url={}",
            self.cfg.customer_topic, self.cfg.inventory_topic, self.cfg.analytics_mode, self.cfg.analytics_url
        );

        loop {
            tokio::select! {
                msg = stream.next() => {
                    match msg {
                        Some(Ok(borrowed)) => {
                            let topic = match self.topic_of(borrowed.topic()) {
                                Some(t) => t,
                                None => continue,
                            };
                            let key = borrowed
                                .key()
                                .map(|k| String::from_utf8_lossy(k).into_owned())
                                .unwrap_or_default();
                            let value = borrowed.payload().unwrap_or(&[]).to_vec();
                            self.handle_message(topic, key, value).await;
                        }
                        Some(Err(e)) => {
                            warn!("kafka poll error: {e}");
                        }
                        None => break,
                    }
                }
                _ = idle_ticker.tick() => {
                    self.check_time_flush().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("shutdown signal received, draining");
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn handle_message(&mut self, topic: Topic, key: String, value: Vec<u8>) {
        let decision = self
            .idempotency
            .check_and_mark(topic.as_str(), &key, &value)
            .await;
        if decision == Decision::Skip {
            self.telemetry.dedup_skipped(topic.as_str());
            return;
        }
        self.telemetry.message_received(topic.as_str());

        let payload = serde_json::from_slice(&value).ok();
        let merged = match self.enricher.enrich(topic, &key, payload) {
            Some(m) => m,
            None => return,
        };

        match self.cfg.analytics_mode {
            DeliveryMode::Json => self.deliver_json(topic, &key, merged).await,
            DeliveryMode::Csv => {
                let flushed = self
                    .batcher
                    .as_mut()
                    .expect("batcher present in csv mode")
                    .add(merged);
                if let Some(batch) = flushed {
                    self.dispatch_csv_batch(batch).await;
                }
            }
        }
    }

    async fn deliver_json(&self, topic: Topic, key: &str, merged: MergedEvent) {
        let sender = self.json_sender.as_ref().expect("json sender present in json mode");
        match sender.send(&merged, &self.telemetry).await {
            Ok(()) => {
                info!("analytics_post_ok key={key} topic={}", topic.as_str());
            }
            Err(e) => {
                error!("analytics_post_fail key={key} error={e}");
                let envelope = DlqEnvelope::for_json_failure(e.to_string(), topic.as_str(), key, merged);
                self.publish_dlq(&envelope, Some(key)).await;
            }
        }
    }

    async fn dispatch_csv_batch(&self, batch: Vec<MergedEvent>) {
        let rows = batch.len();
        let payload_csv = csv_encoder::encode(&batch);
        let sender = self.csv_sender.as_ref().expect("csv sender present in csv mode");
        match sender.send(&payload_csv, &self.telemetry).await {
            Ok(()) => {
                self.telemetry.batch_sent(rows);
                info!("analytics_post_ok mode=csv rows={rows}");
            }
            Err(e) => {
                error!("analytics_post_fail mode=csv rows={rows} error={e}");
                let envelope = DlqEnvelope::for_csv_failure(e.to_string(), rows);
                self.publish_dlq(&envelope, None).await;
            }
        }
    }

    async fn publish_dlq(&self, envelope: &DlqEnvelope, key: Option<&str>) {
        let bytes = match serde_json::to_vec(envelope) {
            Ok(b) => b,
            Err(e) => {
                error!("failed to serialize dlq envelope: {e}");
                return;
            }
        };
        match self.dlq.publish(&bytes, key).await {
            Ok(()) => self.telemetry.dlq_published(),
            Err(_) => {
                // dlq.publish already logs; the event is lost, the loop continues.
            }
        }
    }

    async fn check_time_flush(&mut self) {
        if self.cfg.analytics_mode != DeliveryMode::Csv {
            return;
        }
        let flushed = self.batcher.as_mut().and_then(Batcher::check);
        if let Some(batch) = flushed {
            self.dispatch_csv_batch(batch).await;
        }
    }

    async fn shutdown(&mut self) {
        if self.cfg.analytics_mode == DeliveryMode::Csv {
            let forced = self.batcher.as_mut().and_then(|b| b.flush(true));
            if let Some(batch) = forced {
                self.dispatch_csv_batch(batch).await;
            }
        }
        info!("consumer loop stopped");
    }
}
