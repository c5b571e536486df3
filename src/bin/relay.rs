// Relay process: forwards topic entries to the configured HTTP sink until stopped.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use waterlevel::*;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let app_config = config::AppConfig::load()?;

    let topic = Arc::new(
        topic::Topic::connect(&app_config.topic.path, app_config.topic.retention_days).await?,
    );
    topic.init().await?;

    let sink = relay::HttpSink::new(
        app_config.relay.url.clone(),
        Duration::from_millis(app_config.relay.request_timeout_ms),
    )?;
    let relay = relay::Relay::start(
        topic.clone(),
        sink,
        app_config.topic.name.clone(),
        app_config.relay.group_id.clone(),
        Duration::from_millis(app_config.relay.poll_interval_ms),
    )
    .await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(relay.run(shutdown_rx));

    signal::shutdown_signal().await;
    tracing::info!("Received shutdown signal");
    let _ = shutdown_tx.send(());
    handle.await?;
    topic.close().await;
    Ok(())
}
