use thiserror::Error;

/// Startup-time and top-level errors. Per-message data errors never reach
/// this type; they're logged and absorbed where they occur.
#[derive(Error, Debug)]
pub enum ForwarderError {
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ForwarderError>;

/// Failure returned by a sender. Carries enough context to build a DLQ
/// envelope and format the `analytics_http_<status>` error string the
/// downstream DLQ consumer keys off of.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("analytics_http_{0}")]
    Status(u16),

    #[error("{0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum DlqError {
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}
