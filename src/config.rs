use std::env;
use std::time::Duration;

use crate::domain::DeliveryMode;

#[derive(Debug, Clone)]
pub struct Config {
    pub kafka_bootstrap_servers: String,
    pub customer_topic: String,
    pub inventory_topic: String,
    pub analytics_dlq_topic: String,
    pub consumer_group: String,

    pub analytics_url: String,
    pub analytics_mode: DeliveryMode,

    pub batch_max_size: usize,
    pub flush_interval: Duration,

    pub redis_url: String,
    pub idemp_ttl_seconds: u64,

    pub metrics_port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            kafka_bootstrap_servers: env_or("KAFKA_BOOTSTRAP_SERVERS", "localhost:29092"),
            customer_topic: env_or("CUSTOMER_TOPIC", "customer_data"),
            inventory_topic: env_or("INVENTORY_TOPIC", "inventory_data"),
            analytics_dlq_topic: env_or("ANALYTICS_DLQ_TOPIC", "analytics_dlq"),
            consumer_group: env_or("CONSUMER_GROUP", "analytics-consumers"),

            analytics_url: env_or("ANALYTICS_URL", "http://localhost:8000/analytics/data"),
            analytics_mode: DeliveryMode::from_env_str(&env_or("ANALYTICS_MODE", "json")),

            batch_max_size: env_parse_or("BATCH_MAX_SIZE", 50),
            flush_interval: Duration::from_secs_f64(env_parse_or("FLUSH_INTERVAL_SECS", 10.0)),

            redis_url: env_or("REDIS_URL", "redis://localhost:6379/0"),
            idemp_ttl_seconds: env_parse_or("IDEMP_TTL_SECONDS", 86_400),

            metrics_port: env_parse_or("METRICS_PORT", 9108),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Seeds `RUST_LOG` from the source system's `LOG_LEVEL` knob when the
/// former isn't already set, so `env_logger::init()` picks it up.
pub fn seed_log_level() {
    if env::var("RUST_LOG").is_err() {
        if let Ok(level) = env::var("LOG_LEVEL") {
            env::set_var("RUST_LOG", level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_when_env_unset() {
        for key in [
            "KAFKA_BOOTSTRAP_SERVERS",
            "BATCH_MAX_SIZE",
            "FLUSH_INTERVAL_SECS",
            "ANALYTICS_MODE",
            "METRICS_PORT",
        ] {
            env::remove_var(key);
        }
        let cfg = Config::from_env();
        assert_eq!(cfg.batch_max_size, 50);
        assert_eq!(cfg.flush_interval, Duration::from_secs(10));
        assert_eq!(cfg.analytics_mode, DeliveryMode::Json);
        assert_eq!(cfg.metrics_port, 9108);
    }

    #[test]
    fn analytics_mode_reads_csv_case_insensitively() {
        env::set_var("ANALYTICS_MODE", "CSV");
        let cfg = Config::from_env();
        assert_eq!(cfg.analytics_mode, DeliveryMode::Csv);
        env::remove_var("ANALYTICS_MODE");
    }
}
