//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 摄取 → 分类 → 并发投递 → 结果上报 的组件级 e2e 测试
//! - 生命周期管理 (`Pipeline`) 的关闭顺序与退出码测试
//! - 基于文件 broker 的完整运行

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        DispatchConfig, DispatchOutcome, ReadRetryConfig, RecordDispatcher, SeverityTier,
        SourceConfig, TopicName,
    };
    use dispatcher::{Dispatcher, SinkWriter};
    use ingestion::{IngestionLoop, LoopExit, ReadBackoff};
    use queue_client::{FaultConfig, MemoryBroker, QueueClient};
    use tokio_util::sync::CancellationToken;

    /// MemoryBroker -> IngestionLoop -> Dispatcher -> outcome channel
    ///
    /// Publishes `payloads` to a closed source topic, runs ingestion to end
    /// of stream, shuts the dispatcher down and returns every outcome.
    async fn process(
        broker: MemoryBroker,
        payloads: &[&str],
        config: DispatchConfig,
    ) -> Vec<DispatchOutcome> {
        for payload in payloads {
            broker.publish("logs", "", payload.to_string());
        }
        broker.close_topic("logs");

        let mut client = broker.clone();
        client.connect().await.unwrap();
        let reader = client.reader(&SourceConfig::default()).await.unwrap();
        let database = SinkWriter::new(TopicName::Database, client.writer("database").await.unwrap());
        let alert = SinkWriter::new(TopicName::Alert, client.writer("alert").await.unwrap());

        let (dispatcher, mut outcome_rx) = Dispatcher::new(database, alert, &config);
        let dispatcher = Arc::new(dispatcher);
        let collector = tokio::spawn(async move {
            let mut outcomes = Vec::new();
            while let Some(outcome) = outcome_rx.recv().await {
                outcomes.push(outcome);
            }
            outcomes
        });

        let handoff: Arc<dyn RecordDispatcher> = dispatcher.clone();
        let report = IngestionLoop::new(
            reader,
            handoff,
            CancellationToken::new(),
            ReadBackoff::new(&ReadRetryConfig::default()),
        )
        .run()
        .await
        .unwrap();
        assert_eq!(report.exit, LoopExit::EndOfStream);

        let shutdown = dispatcher.shutdown(None).await;
        assert!(shutdown.is_clean(), "{:?}", shutdown.errors);
        collector.await.unwrap()
    }

    fn topics(outcomes: &[DispatchOutcome]) -> Vec<TopicName> {
        let mut topics: Vec<TopicName> = outcomes.iter().map(|o| o.topic).collect();
        topics.sort_by_key(|t| t.as_str());
        topics
    }

    #[tokio::test]
    async fn test_low_severity_yields_one_database_outcome() {
        for level in ["DEBUG", "INFO", "WARN"] {
            let payload = format!(r#"{{"timestamp": 1, "level": "{level}", "message": "m"}}"#);
            let outcomes = process(
                MemoryBroker::new(),
                &[payload.as_str()],
                DispatchConfig::default(),
            )
            .await;

            assert_eq!(outcomes.len(), 1, "level {level}");
            assert_eq!(outcomes[0].topic, TopicName::Database);
        }
    }

    #[tokio::test]
    async fn test_alert_severity_yields_two_outcomes_even_when_writes_fail() {
        let mut faults = FaultConfig::default();
        faults.fail_writes.insert("alert".to_string());
        faults.fail_writes.insert("database".to_string());

        let outcomes = process(
            MemoryBroker::with_faults(faults),
            &[
                r#"{"timestamp": 1, "level": "ERROR", "message": "a"}"#,
                r#"{"timestamp": 2, "level": "FATAL", "message": "b"}"#,
            ],
            DispatchConfig::default(),
        )
        .await;

        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(|o| !o.success));
        for offset in [0, 1] {
            let for_record: Vec<DispatchOutcome> = outcomes
                .iter()
                .filter(|o| o.offset == offset)
                .cloned()
                .collect();
            assert_eq!(topics(&for_record), vec![TopicName::Alert, TopicName::Database]);
        }
    }

    #[tokio::test]
    async fn test_malformed_payload_yields_one_failed_outcome() {
        let outcomes = process(
            MemoryBroker::new(),
            &["not-json"],
            DispatchConfig::default(),
        )
        .await;

        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].success);
        assert_eq!(outcomes[0].topic, TopicName::Unknown);
        assert_eq!(outcomes[0].level, None);
    }

    #[tokio::test]
    async fn test_no_duplicate_outcome_per_record_and_topic() {
        let payloads: Vec<String> = (0..200)
            .map(|i| {
                let level = SeverityTier::ALL[i % SeverityTier::ALL.len()];
                format!(r#"{{"timestamp": {i}, "level": "{level}", "message": "m{i}"}}"#)
            })
            .collect();
        let payloads: Vec<&str> = payloads.iter().map(String::as_str).collect();

        let config = DispatchConfig {
            max_in_flight: 16,
            outcome_buffer: 8,
            ..Default::default()
        };
        let outcomes = process(MemoryBroker::new(), &payloads, config).await;

        // 200 records, 80 of them ERROR or FATAL
        assert_eq!(outcomes.len(), 280);
        let unique: HashSet<(u64, TopicName)> =
            outcomes.iter().map(|o| (o.offset, o.topic)).collect();
        assert_eq!(unique.len(), outcomes.len());
    }

    #[tokio::test]
    async fn test_error_example() {
        let broker = MemoryBroker::new();
        let payload = r#"{"timestamp":1700000000,"level":"ERROR","message":"disk full"}"#;
        let outcomes = process(broker.clone(), &[payload], DispatchConfig::default()).await;

        assert_eq!(topics(&outcomes), vec![TopicName::Alert, TopicName::Database]);
        for outcome in &outcomes {
            assert!(outcome.success);
            assert_eq!(outcome.time, 1700000000.0);
            assert_eq!(outcome.level, Some(SeverityTier::Error));
            assert_eq!(outcome.message, "disk full");
        }
        // forwarded verbatim
        assert_eq!(&broker.messages("alert")[0].1[..], payload.as_bytes());
        assert_eq!(&broker.messages("database")[0].1[..], payload.as_bytes());
    }

    #[tokio::test]
    async fn test_info_example() {
        let broker = MemoryBroker::new();
        let outcomes = process(
            broker.clone(),
            &[r#"{"timestamp":1700000001,"level":"INFO","message":"ok"}"#],
            DispatchConfig::default(),
        )
        .await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].topic, TopicName::Database);
        assert!(outcomes[0].success);
        assert_eq!(outcomes[0].message, "ok");
        assert!(broker.messages("alert").is_empty());
    }

    #[tokio::test]
    async fn test_slow_writer_is_drained_before_close() {
        let mut faults = FaultConfig::default();
        faults
            .write_delay
            .insert("alert".to_string(), Duration::from_millis(150));
        faults
            .write_delay
            .insert("database".to_string(), Duration::from_millis(50));
        let broker = MemoryBroker::with_faults(faults);

        let outcomes = process(
            broker.clone(),
            &[
                r#"{"level": "FATAL", "message": "a"}"#,
                r#"{"level": "INFO", "message": "b"}"#,
                r#"{"level": "ERROR", "message": "c"}"#,
            ],
            DispatchConfig::default(),
        )
        .await;

        assert_eq!(outcomes.len(), 5);
        assert!(outcomes.iter().all(|o| o.success));
        assert_eq!(broker.writes_after_close(), 0);
        assert_eq!(broker.messages("alert").len(), 2);
        assert_eq!(broker.messages("database").len(), 3);
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use std::time::Duration;

    use contracts::{
        BrokerKind, ProcessorBlueprint, QueueError, QueueReader, RawRecord, SourceConfig,
        TopicName,
    };
    use ingestion::LoopExit;
    use log_processor::error::{EXIT_FAILURE, EXIT_TRANSPORT};
    use log_processor::{Pipeline, PipelineConfig};
    use queue_client::{FaultConfig, MemoryBroker, MemoryWriter, QueueClient};
    use tokio::sync::oneshot;

    fn memory_config() -> PipelineConfig {
        let mut blueprint = ProcessorBlueprint::default();
        blueprint.broker.kind = BrokerKind::Memory;
        PipelineConfig::new(blueprint)
    }

    #[tokio::test]
    async fn test_run_to_end_of_stream() {
        let broker = MemoryBroker::new();
        broker.publish("logs", "", r#"{"timestamp": 1, "level": "ERROR", "message": "x"}"#);
        broker.publish("logs", "", r#"{"timestamp": 2, "level": "INFO", "message": "y"}"#);
        broker.publish("logs", "", "{broken");
        broker.close_topic("logs");

        let stats = Pipeline::new(memory_config())
            .run_with_client(broker.clone(), std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.exit, Some(LoopExit::EndOfStream));
        assert_eq!(stats.ingestion.records_read, 3);
        assert_eq!(stats.ingestion.decode_failures, 1);
        assert_eq!(stats.outcomes.total_outcomes, 4);
        assert_eq!(stats.outcomes.topic(TopicName::Database).delivered, 2);
        assert_eq!(stats.outcomes.topic(TopicName::Alert).delivered, 1);
        assert_eq!(stats.delivery_attempts(), 3);
        assert!(stats.shutdown_errors.is_empty());
        assert_eq!(broker.committed_offset("log-processor-group", "logs"), Some(2));
    }

    #[tokio::test]
    async fn test_record_limit_then_resume_from_commit() {
        let broker = MemoryBroker::new();
        for i in 0..4 {
            broker.publish("logs", "", format!(r#"{{"level": "INFO", "message": "{i}"}}"#));
        }
        broker.close_topic("logs");

        let mut config = memory_config();
        config.max_records = Some(2);
        let stats = Pipeline::new(config)
            .run_with_client(broker.clone(), std::future::pending())
            .await
            .unwrap();
        assert_eq!(stats.exit, Some(LoopExit::RecordLimit));
        assert_eq!(broker.messages("database").len(), 2);

        let stats = Pipeline::new(memory_config())
            .run_with_client(broker.clone(), std::future::pending())
            .await
            .unwrap();
        assert_eq!(stats.exit, Some(LoopExit::EndOfStream));
        assert_eq!(stats.ingestion.records_read, 2);
        assert_eq!(broker.messages("database").len(), 4);
    }

    #[tokio::test]
    async fn test_shutdown_signal_drains_slow_deliveries() {
        let mut faults = FaultConfig::default();
        faults
            .write_delay
            .insert("alert".to_string(), Duration::from_millis(200));
        let broker = MemoryBroker::with_faults(faults);
        broker.publish("logs", "", r#"{"level": "FATAL", "message": "boom"}"#);

        let (signal_tx, signal_rx) = oneshot::channel::<()>();
        let run = tokio::spawn(Pipeline::new(memory_config()).run_with_client(
            broker.clone(),
            async move {
                signal_rx.await.ok();
            },
        ));

        // the source topic stays open; only the signal stops the run
        tokio::time::sleep(Duration::from_millis(50)).await;
        signal_tx.send(()).unwrap();

        let stats = run.await.unwrap().unwrap();
        assert_eq!(stats.exit, Some(LoopExit::Cancelled));
        assert_eq!(stats.outcomes.topic(TopicName::Alert).delivered, 1);
        assert_eq!(stats.outcomes.topic(TopicName::Database).delivered, 1);
        assert_eq!(broker.writes_after_close(), 0);
    }

    #[tokio::test]
    async fn test_drain_timeout_aborts_and_reports() {
        let mut faults = FaultConfig::default();
        faults
            .write_delay
            .insert("alert".to_string(), Duration::from_secs(60));
        let broker = MemoryBroker::with_faults(faults);
        broker.publish("logs", "", r#"{"level": "ERROR", "message": "stuck"}"#);
        broker.close_topic("logs");

        let mut config = memory_config();
        config.blueprint.shutdown.drain_timeout_secs = 1;
        let stats = Pipeline::new(config)
            .run_with_client(broker.clone(), std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.shutdown_errors.len(), 1);
        assert!(stats.shutdown_errors[0].contains("drain timeout"));
        assert_eq!(stats.outcomes.topic(TopicName::Alert).failed, 1);
        assert_eq!(stats.outcomes.topic(TopicName::Database).delivered, 1);
        assert_eq!(broker.writes_after_close(), 0);
    }

    #[tokio::test]
    async fn test_fatal_source_error_still_shuts_down_in_order() {
        let broker = MemoryBroker::new();
        broker.publish("logs", "", r#"{"level": "ERROR", "message": "before"}"#);

        let (signal_tx, signal_rx) = oneshot::channel::<()>();
        let run = tokio::spawn(Pipeline::new(memory_config()).run_with_client(
            broker.clone(),
            async move {
                signal_rx.await.ok();
            },
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        broker.inject_read_error(QueueError::connection("broker went away"));

        let stats = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        drop(signal_tx);

        assert_eq!(stats.exit, None);
        let error = stats.failure.as_ref().unwrap();
        assert!(error.to_string().contains("broker went away"));
        assert_eq!(error.exit_code(), EXIT_TRANSPORT);
        assert_eq!(stats.outcomes.total_outcomes, 2);
    }

    /// Memory broker sinks behind a source reader that panics when read
    struct PanickingSource(MemoryBroker);

    struct PanickingReader;

    impl QueueReader for PanickingReader {
        fn topic(&self) -> &str {
            "logs"
        }

        async fn read(&mut self) -> Result<Option<RawRecord>, QueueError> {
            panic!("reader bug")
        }

        async fn commit(&mut self, _offset: u64) -> Result<(), QueueError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), QueueError> {
            Ok(())
        }
    }

    impl QueueClient for PanickingSource {
        type Reader = PanickingReader;
        type Writer = MemoryWriter;

        async fn connect(&mut self) -> queue_client::Result<()> {
            self.0.connect().await
        }

        async fn reader(&self, _source: &SourceConfig) -> queue_client::Result<PanickingReader> {
            Ok(PanickingReader)
        }

        async fn writer(&self, topic: &str) -> queue_client::Result<MemoryWriter> {
            self.0.writer(topic).await
        }
    }

    #[tokio::test]
    async fn test_panicked_ingestion_task_fails_the_run() {
        let broker = MemoryBroker::new();
        let stats = tokio::time::timeout(
            Duration::from_secs(5),
            Pipeline::new(memory_config())
                .run_with_client(PanickingSource(broker.clone()), std::future::pending()),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(stats.exit, None);
        let failure = stats.failure.as_ref().unwrap();
        assert!(failure.to_string().contains("ingestion task failed"));
        assert_eq!(failure.exit_code(), EXIT_FAILURE);
        assert!(stats.shutdown_errors.is_empty());
    }

    #[tokio::test]
    async fn test_alert_open_failure_closes_database_writer() {
        let broker = MemoryBroker::with_faults(FaultConfig {
            fail_open: ["alert".to_string()].into(),
            ..Default::default()
        });

        let err = Pipeline::new(memory_config())
            .run_with_client(broker.clone(), std::future::pending())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), EXIT_TRANSPORT);
        assert!(err.to_string().contains("alert"), "{err}");
        assert_eq!(broker.open_writers(), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_is_transport_error() {
        let broker = MemoryBroker::with_faults(FaultConfig {
            fail_connect: true,
            ..Default::default()
        });

        let err = Pipeline::new(memory_config())
            .run_with_client(broker, std::future::pending())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}

#[cfg(test)]
mod file_broker_tests {
    use std::path::Path;
    use std::time::Duration;

    use contracts::{
        BrokerKind, ProcessorBlueprint, QueueReader, QueueWriter, RawRecord, SourceConfig,
        TopicName,
    };
    use ingestion::LoopExit;
    use log_processor::{Pipeline, PipelineConfig};
    use queue_client::{FileBroker, QueueClient};

    /// Every message of a topic file, read from the beginning
    async fn read_topic(dir: &Path, topic: &str) -> Vec<RawRecord> {
        let mut broker = FileBroker::new(dir, false, Duration::from_millis(10));
        broker.connect().await.unwrap();
        let source = SourceConfig {
            topic: topic.to_string(),
            group_id: format!("inspect-{topic}"),
            ..Default::default()
        };
        let mut reader = broker.reader(&source).await.unwrap();
        let mut records = Vec::new();
        while let Some(record) = reader.read().await.unwrap() {
            records.push(record);
        }
        records
    }

    #[tokio::test]
    async fn test_file_broker_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("logs.jsonl"),
            concat!(
                r#"{"timestamp": 1, "level": "WARN", "message": "slow query"}"#,
                "\n",
                "garbage\n",
            ),
        )
        .unwrap();
        {
            let mut producer = FileBroker::new(dir.path(), false, Duration::from_millis(10));
            producer.connect().await.unwrap();
            let writer = producer.writer("logs").await.unwrap();
            writer
                .write(b"api-1", br#"{"timestamp": 2, "level": "FATAL", "message": "oom"}"#)
                .await
                .unwrap();
            writer.close().await.unwrap();
        }

        let mut blueprint = ProcessorBlueprint::default();
        blueprint.broker.kind = BrokerKind::File;
        blueprint.broker.data_dir = Some(dir.path().to_path_buf());
        blueprint.broker.follow = false;

        let stats = Pipeline::new(PipelineConfig::new(blueprint.clone()))
            .run(std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.exit, Some(LoopExit::EndOfStream));
        assert_eq!(stats.ingestion.records_read, 3);
        assert_eq!(stats.outcomes.decode_failures, 1);
        assert_eq!(stats.outcomes.topic(TopicName::Alert).delivered, 1);

        assert_eq!(read_topic(dir.path(), "database").await.len(), 2);
        let alert = read_topic(dir.path(), "alert").await;
        assert_eq!(alert.len(), 1);
        assert_eq!(alert[0].key.as_ref(), b"api-1");
        assert_eq!(
            alert[0].value.as_ref(),
            br#"{"timestamp": 2, "level": "FATAL", "message": "oom"}"#
        );

        // committed offsets make a second run a no-op
        let stats = Pipeline::new(PipelineConfig::new(blueprint))
            .run(std::future::pending())
            .await
            .unwrap();
        assert_eq!(stats.ingestion.records_read, 0);
    }
}
