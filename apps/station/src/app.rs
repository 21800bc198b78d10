//! Application orchestrator: wires the feed, the buffer and the exporters.

use std::sync::Arc;
use std::time::Duration;

use groundlink_buffer::{ColumnId, Schema, TelemetryBuffer};
use groundlink_export::{DashboardExporter, JsonFileSink, StoreExporter, open_store_output};
use groundlink_ingest::{BoxedSource, Ingestor, LineDecoder, open_source};
use groundlink_task::{TaskController, TaskGroup};

use crate::config::StationConfig;

/// Upper bound on how long shutdown waits for any one loop.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the station until the feed ends, a loop fails, or Ctrl-C.
pub async fn run(config: StationConfig) -> anyhow::Result<()> {
    let source = open_source(&config.source.path).await?;
    run_with_source(config, source).await
}

async fn run_with_source(config: StationConfig, source: BoxedSource) -> anyhow::Result<()> {
    let schema = Schema::new(config.columns.iter().cloned())?;
    let buffer = Arc::new(TelemetryBuffer::new(config.capacity, schema));
    tracing::info!(
        capacity = buffer.capacity(),
        columns = ?buffer.schema().columns(),
        "telemetry buffer ready"
    );

    // -- Producer --
    let ingestor = Ingestor::new(source, Arc::clone(&buffer))
        .with_decoder(LineDecoder::new(config.source.delimiter));
    let ingest_stats = ingestor.stats();
    let producer = TaskController::new("producer", ingestor);

    // -- Consumers --
    let consumers = build_consumers(&config, &buffer).await?;

    consumers.start_all();
    producer.start();
    tracing::info!(source = %config.source.path, consumers = consumers.len(), "station ready");

    // -- Main loop: wait for the feed to end, an exporter to fail, or shutdown --
    let producer_result = tokio::select! {
        result = producer.join() => {
            tracing::info!("telemetry feed ended");
            result
        }
        failure = consumers.first_failure() => {
            tracing::error!(task = failure.task(), error = %failure, "exporter failed, shutting down");
            producer.stop();
            producer.join_timeout(SHUTDOWN_TIMEOUT).await
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
            producer.stop();
            producer.join_timeout(SHUTDOWN_TIMEOUT).await
        }
    };

    // -- Graceful shutdown: consumers last, so their final pass sees every row --
    consumers.stop_all();
    let consumer_result = tokio::time::timeout(SHUTDOWN_TIMEOUT, consumers.join_all()).await;

    tracing::info!(
        accepted = ingest_stats.accepted(),
        rejected = ingest_stats.rejected(),
        written = buffer.written(),
        "station stopped"
    );

    match consumer_result {
        Ok(result) => result?,
        Err(_) => anyhow::bail!("exporters did not stop within {SHUTDOWN_TIMEOUT:?}"),
    }
    producer_result?;
    Ok(())
}

async fn build_consumers(
    config: &StationConfig,
    buffer: &Arc<TelemetryBuffer>,
) -> anyhow::Result<TaskGroup> {
    let mut group = TaskGroup::new();

    if config.store.enabled {
        let sink = open_store_output(&config.store.output).await?;
        let exporter = StoreExporter::new(
            Arc::clone(buffer),
            sink,
            &config.store.measurement,
            Duration::from_millis(config.store.interval_ms),
        )?
        .with_tag("station", &config.name);
        group.push(Arc::new(TaskController::new("store", exporter)));
    }

    if config.dashboard.enabled {
        let columns = config
            .dashboard
            .columns
            .iter()
            .cloned()
            .map(ColumnId::from)
            .collect();
        let exporter = DashboardExporter::new(
            Arc::clone(buffer),
            JsonFileSink::new(&config.dashboard.output),
            columns,
            Duration::from_millis(config.dashboard.interval_ms),
        )?;
        tracing::info!(output = %config.dashboard.output, "dashboard snapshots enabled");
        group.push(Arc::new(TaskController::new("dashboard", exporter)));
    }

    if group.is_empty() {
        tracing::warn!("store and dashboard both disabled; rows are only buffered");
    }
    Ok(group)
}
