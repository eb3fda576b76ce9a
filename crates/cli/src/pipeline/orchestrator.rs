//! Pipeline orchestrator - owns the connections and the shutdown order.
//!
//! Startup: connect, open the source reader and both sink writers, start the
//! outcome reporter, then the ingestion loop. Shutdown, whatever triggered
//! it: stop and close the source, drain every in-flight delivery, close the
//! writers, close the outcome channel, wait for the reporter.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    BrokerKind, ProcessorBlueprint, QueueReader, RecordDispatcher, TopicName,
};
use dispatcher::{Dispatcher, OutcomeReporter, SinkWriter};
use ingestion::{IngestionLoop, ReadBackoff};
use queue_client::{FileBroker, MemoryBroker, QueueClient};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::PipelineStats;
use crate::error::{CliError, Result};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The processor blueprint
    pub blueprint: ProcessorBlueprint,

    /// Maximum number of records to read (None = unlimited)
    pub max_records: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Commit consumed offsets
    pub commit_offsets: bool,
}

impl PipelineConfig {
    pub fn new(blueprint: ProcessorBlueprint) -> Self {
        Self {
            blueprint,
            max_records: None,
            timeout: None,
            commit_offsets: true,
        }
    }
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run against the broker named in the blueprint
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let broker = &self.config.blueprint.broker;
        match broker.kind {
            BrokerKind::File => {
                let data_dir = broker.data_dir.clone().ok_or_else(|| {
                    CliError::Config(contracts::ContractError::config_validation(
                        "broker.data_dir",
                        "required for the file broker",
                    ))
                })?;
                let client = FileBroker::new(
                    data_dir,
                    broker.follow,
                    Duration::from_millis(broker.poll_interval_ms),
                );
                self.run_with_client(client, shutdown).await
            }
            BrokerKind::Memory => {
                warn!("Memory broker has no external producers; waiting for shutdown");
                self.run_with_client(MemoryBroker::new(), shutdown).await
            }
        }
    }

    /// Run to completion with the given queue client
    ///
    /// Returns `Err` only for failures before ingestion starts. An
    /// unrecoverable source error after that still goes through the orderly
    /// shutdown and is reported in [`PipelineStats::failure`], as is a
    /// panicked ingestion task.
    #[instrument(name = "pipeline_run", skip_all)]
    pub async fn run_with_client<C, F>(self, mut client: C, shutdown: F) -> Result<PipelineStats>
    where
        C: QueueClient,
        F: Future<Output = ()> + Send + 'static,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;
        let source = &blueprint.source;

        info!(
            broker_kind = ?blueprint.broker.kind,
            data_dir = ?blueprint.broker.data_dir,
            "Connecting to broker..."
        );
        client
            .connect()
            .await
            .map_err(|e| CliError::transport("connect to broker", e))?;

        // Replay semantics depend on these, so they are always logged
        info!(
            topic = %source.topic,
            group_id = %source.group_id,
            start_offset = ?source.start_offset,
            commit_offsets = self.config.commit_offsets,
            "Source configured; start offset applies only when the group has no committed offset"
        );

        let mut reader = client
            .reader(source)
            .await
            .map_err(|e| CliError::transport(format!("open source topic '{}'", source.topic), e))?;

        let writers = match open_writers(&client, blueprint).await {
            Ok(writers) => writers,
            Err(e) => {
                if let Err(close_err) = reader.close().await {
                    warn!(error = %close_err, "Failed to close source reader");
                }
                return Err(e);
            }
        };
        let (database, alert) = writers;

        let (dispatcher, outcome_rx) = Dispatcher::new(database, alert, &blueprint.dispatch);
        let dispatcher = Arc::new(dispatcher);
        let reporter = OutcomeReporter::new(outcome_rx).spawn();

        info!(
            database_topic = %blueprint.sinks.database_topic,
            alert_topic = %blueprint.sinks.alert_topic,
            max_in_flight = blueprint.dispatch.max_in_flight,
            "Dispatcher started"
        );

        // Ingestion
        let cancel = CancellationToken::new();
        let ingestion_dispatcher: Arc<dyn RecordDispatcher> = dispatcher.clone();
        let ingestion = IngestionLoop::new(
            reader,
            ingestion_dispatcher,
            cancel.clone(),
            ReadBackoff::new(&blueprint.read_retry),
        )
        .with_max_records(self.config.max_records)
        .with_commit_offsets(self.config.commit_offsets);
        let ingestion_metrics = ingestion.metrics();
        let ingestion_task = tokio::spawn(ingestion.run());

        let trigger = tokio::spawn(shutdown_trigger(
            shutdown,
            self.config.timeout,
            cancel.clone(),
        ));

        info!(max_records = ?self.config.max_records, "Pipeline running");

        // The reader is closed by the time the ingestion task finishes
        let ingestion_result = ingestion_task.await;
        cancel.cancel();
        trigger.abort();

        let mut stats = PipelineStats::default();
        match ingestion_result {
            Ok(Ok(report)) => stats.exit = Some(report.exit),
            Ok(Err(e)) => {
                error!(error = %e, "Source failed, shutting down");
                stats.failure = Some(CliError::from(e));
            }
            Err(e) => {
                error!(error = %e, "Ingestion task failed, shutting down");
                stats.failure = Some(CliError::pipeline_execution(format!(
                    "ingestion task failed: {e}"
                )));
            }
        }

        info!("Shutting down pipeline...");
        let report = dispatcher
            .shutdown(blueprint.shutdown.drain_timeout())
            .await;
        stats
            .shutdown_errors
            .extend(report.errors.iter().map(ToString::to_string));
        stats.sinks = dispatcher.metrics();
        drop(dispatcher);

        stats.outcomes = match reporter.await {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "Outcome reporter task failed");
                stats
                    .shutdown_errors
                    .push(format!("outcome reporter failed: {e}"));
                Default::default()
            }
        };
        stats.ingestion = ingestion_metrics.snapshot();
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            records = stats.ingestion.records_read,
            outcomes = stats.outcomes.total_outcomes,
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

/// Open both sink writers; the alert writer is only tried if the database
/// writer opened
///
/// On failure every writer opened so far is closed before returning.
async fn open_writers<C: QueueClient>(
    client: &C,
    blueprint: &ProcessorBlueprint,
) -> Result<(SinkWriter<C::Writer>, SinkWriter<C::Writer>)> {
    let mut writers = Vec::with_capacity(TopicName::SINKS.len());
    for sink in TopicName::SINKS {
        match open_writer(client, blueprint, sink).await {
            Ok(writer) => writers.push(writer),
            Err(e) => {
                for writer in &writers {
                    if let Err(close_err) = writer.close().await {
                        warn!(sink = %writer.sink(), error = %close_err, "Failed to close sink writer");
                    }
                }
                return Err(e);
            }
        }
    }

    let alert = writers
        .pop()
        .ok_or_else(|| CliError::pipeline_execution("alert writer missing"))?;
    let database = writers
        .pop()
        .ok_or_else(|| CliError::pipeline_execution("database writer missing"))?;
    Ok((database, alert))
}

async fn open_writer<C: QueueClient>(
    client: &C,
    blueprint: &ProcessorBlueprint,
    sink: TopicName,
) -> Result<SinkWriter<C::Writer>> {
    let topic = blueprint
        .sinks
        .topic_for(sink)
        .ok_or_else(|| CliError::pipeline_execution(format!("no topic for sink '{sink}'")))?;
    let writer = client
        .writer(topic)
        .await
        .map_err(|e| CliError::transport(format!("open {sink} topic '{topic}'"), e))?;
    Ok(SinkWriter::new(sink, writer))
}

/// Cancel ingestion on the external shutdown signal or the run timeout
async fn shutdown_trigger<F>(shutdown: F, timeout: Option<Duration>, cancel: CancellationToken)
where
    F: Future<Output = ()> + Send + 'static,
{
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = shutdown => info!("Received shutdown signal, stopping ingestion..."),
        _ = deadline => warn!(?timeout, "Pipeline timed out, stopping ingestion..."),
        _ = cancel.cancelled() => return,
    }
    cancel.cancel();
}
