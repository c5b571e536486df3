use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use waterlevel::*;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let app_config = config::AppConfig::load()?;

    // The only fatal runtime path: no candidate device opens.
    let (port_name, source) = match serial::open_first_available(&app_config.device) {
        Ok(found) => found,
        Err(e) => {
            tracing::error!(error = %e, "No valid serial port found. Exiting");
            return Err(e.into());
        }
    };

    let topic = Arc::new(
        topic::Topic::connect(&app_config.topic.path, app_config.topic.retention_days).await?,
    );
    topic.init().await?;

    let stats = Arc::new(stats::PipelineStats::default());
    let window = window::shared();

    let (envelope_tx, envelope_rx) = mpsc::channel(publisher::ENVELOPE_CHANNEL_CAPACITY);
    let publisher_handle = publisher::spawn_publisher(
        envelope_rx,
        publisher::Publisher::new(
            topic.clone(),
            app_config.topic.name.clone(),
            Duration::from_millis(app_config.topic.publish_timeout_ms),
            stats.clone(),
        ),
    );

    let (pipeline_shutdown_tx, pipeline_shutdown_rx) = oneshot::channel();
    let pipeline_handle = pipeline::spawn(
        pipeline::PipelineContext {
            ingestor: ingestor::SampleIngestor::new(
                Box::new(source),
                window.clone(),
                Duration::from_millis(app_config.device.read_timeout_ms),
                stats.clone(),
            ),
            aggregator: aggregator::WindowAggregator::new(
                window.clone(),
                app_config.device.device_id,
            ),
            window: window.clone(),
            envelope_tx,
            stats: stats.clone(),
            shutdown_rx: pipeline_shutdown_rx,
        },
        pipeline::PipelineConfig::from(&app_config.sampling),
    );

    let (maintenance_shutdown_tx, maintenance_shutdown_rx) = oneshot::channel();
    let maintenance_handle = topic::maintenance::spawn(
        topic.clone(),
        topic::maintenance::MaintenanceConfig::from(&app_config.topic),
        maintenance_shutdown_rx,
    );

    let app = routes::app(
        routes::StatusInfo {
            device_id: app_config.device.device_id,
            port: port_name,
            topic: app_config.topic.name.clone(),
        },
        window,
        stats,
    );
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Status API listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = signal::shutdown_signal() => {
            tracing::info!("Received shutdown signal");
        }
    }

    let _ = pipeline_shutdown_tx.send(());
    let _ = maintenance_shutdown_tx.send(());
    // Pipeline exit drops the envelope sender; the publisher then drains and stops.
    if let Err(e) = pipeline_handle.await {
        tracing::warn!(error = %e, "pipeline task ended abnormally");
    }
    if let Err(e) = publisher_handle.await {
        tracing::warn!(error = %e, "publisher task ended abnormally");
    }
    if let Err(e) = maintenance_handle.await {
        tracing::warn!(error = %e, "maintenance task ended abnormally");
    }
    topic.close().await;

    Ok(())
}
