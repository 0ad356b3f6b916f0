mod batcher;
mod config;
mod consumer;
mod csv_encoder;
mod dlq;
mod domain;
mod enrich;
mod errors;
mod idempotency;
mod metrics;
mod sender;

use std::sync::Arc;

use log::{error, info};
use tokio::sync::watch;

use config::Config;
use consumer::ConsumerLoop;
use errors::{ForwarderError, Result};
use metrics::Telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    config::seed_log_level();
    env_logger::init();

    info!("starting analytics forwarder");

    let cfg = Config::from_env();
    info!(
        "configuration loaded: bootstrap={} customer_topic={} inventory_topic={} mode={:?} batch_max={} flush_interval={:?} metrics_port={}",
        cfg.kafka_bootstrap_servers,
        cfg.customer_topic,
        cfg.inventory_topic,
        cfg.analytics_mode,
        cfg.batch_max_size,
        cfg.flush_interval,
        cfg.metrics_port,
    );

    let telemetry = Arc::new(Telemetry::new()?);
    let metrics_listener = metrics::bind(cfg.metrics_port).await?;
    let consumer_loop = ConsumerLoop::new(cfg, telemetry.clone()).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics_task = tokio::spawn(metrics::run(metrics_listener, telemetry));
    let consumer_task = tokio::spawn(consumer_loop.run(shutdown_rx));

    wait_for_signal().await;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let result = match consumer_task.await {
        Ok(Ok(())) => {
            info!("consumer loop exited cleanly");
            Ok(())
        }
        Ok(Err(e)) => {
            error!("consumer loop exited with error: {e}");
            Err(e)
        }
        Err(e) => {
            error!("consumer task panicked: {e}");
            Err(ForwarderError::Config(format!("consumer task panicked: {e}")))
        }
    };
    metrics_task.abort();

    result
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
