//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试（Mock 发送器 + Mock 消息源）
//! - 配置到注册表的全链路

#[cfg(test)]
mod contract_tests {
    use contracts::{AuditRecord, ChannelId, ErrorKind, NotificationMessage, Outcome};
    use std::time::Duration;

    #[test]
    fn test_channel_id_case_folding() {
        assert_eq!(ChannelId::normalize(" email "), ChannelId::normalize("EMAIL"));
    }

    #[test]
    fn test_audit_record_snapshot() {
        let msg = NotificationMessage::new("sms", "+1555", None, "hi").unwrap();
        let record = AuditRecord::failed(&msg, Some("twilio"), "timed out", Duration::ZERO);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["channel"], "SMS");
        assert_eq!(json["recipient"], "+1555");
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["sender"], "twilio");
        assert_eq!(record.outcome, Outcome::Failed);
        assert!(record.error_kind().is_some());
    }

    #[test]
    fn test_blank_fields_rejected_at_construction() {
        let err = NotificationMessage::new("EMAIL", "  ", None, "body").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMessage);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{ErrorKind, Outcome};
    use dispatcher::{
        Dispatcher, DispatcherConfig, DispatcherError, HandleOptions, MockBehavior, MockSender,
        RegistryBuilder,
    };
    use ingestion::{ChannelSource, IngestionConfig, IngestionPipeline, LineSource, MockMessageSource};
    use observability::{
        AggregatingAuditSink, AuditEvent, ChannelAuditSink, MemoryAuditSink, NullAuditSink,
    };

    struct Harness {
        pipeline: Arc<IngestionPipeline>,
        audit: Arc<MemoryAuditSink>,
    }

    fn harness(senders: Vec<MockSender>, timeout: Duration) -> Harness {
        let mut builder = RegistryBuilder::new();
        for sender in senders {
            builder.register(sender).unwrap();
        }
        let audit = MemoryAuditSink::new();
        let dispatcher = Dispatcher::new(
            builder.build(),
            DispatcherConfig {
                delivery_timeout: timeout,
            },
        )
        .with_audit_sink(audit.clone());

        Harness {
            pipeline: Arc::new(IngestionPipeline::new(
                Arc::new(dispatcher),
                IngestionConfig::new(4, 16),
            )),
            audit,
        }
    }

    /// 成功投递：EMAIL -> 总是成功的发送器
    #[tokio::test]
    async fn test_e2e_email_delivered() {
        let email = MockSender::new("email", "EMAIL");
        let h = harness(vec![email.clone()], Duration::from_secs(1));

        let outcome = h
            .pipeline
            .on_message(r#"{"type":"EMAIL","to":"a@b.com","subject":"Hi","body":"hello"}"#)
            .await;
        let record = outcome.record().unwrap();

        assert_eq!(record.channel.as_str(), "EMAIL");
        assert_eq!(record.recipient, "a@b.com");
        assert_eq!(record.outcome, Outcome::Delivered);

        let delivered = email.deliveries();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].subject(), Some("Hi"));
        assert_eq!(delivered[0].body(), "hello");
        assert_eq!(h.audit.records().len(), 1);
    }

    /// 无路由：没有 FAX 发送器
    #[tokio::test]
    async fn test_e2e_fax_unroutable() {
        let email = MockSender::new("email", "EMAIL");
        let h = harness(vec![email.clone()], Duration::from_secs(1));

        let outcome = h
            .pipeline
            .on_message(r#"{"type":"FAX","to":"123","subject":"","body":"x"}"#)
            .await;
        let record = outcome.record().unwrap();

        assert_eq!(record.channel.as_str(), "FAX");
        assert_eq!(record.recipient, "123");
        assert_eq!(record.outcome, Outcome::Unroutable);
        assert_eq!(email.attempts(), 0);
    }

    /// 投递失败后管道仍可用
    #[tokio::test]
    async fn test_e2e_failure_then_pipeline_usable() {
        let email = MockSender::failing("email", "EMAIL", "mailbox full");
        let sms = MockSender::new("sms", "SMS");
        let h = harness(vec![email, sms.clone()], Duration::from_secs(1));

        let failed = h
            .pipeline
            .on_message(r#"{"type":"email","to":"a@b.com","body":"x"}"#)
            .await;
        let record = failed.record().unwrap();
        assert_eq!(record.outcome, Outcome::Failed);
        assert!(!record.reason.as_deref().unwrap_or_default().is_empty());

        let next = h
            .pipeline
            .on_message(r#"{"type":"sms","to":"+1555","body":"y"}"#)
            .await;
        assert_eq!(next.record().unwrap().outcome, Outcome::Delivered);
        assert_eq!(sms.delivered_count(), 1);
    }

    /// 格式错误的 payload 不影响后续消息
    #[tokio::test]
    async fn test_e2e_malformed_then_valid() {
        let email = MockSender::new("email", "EMAIL");
        let h = harness(vec![email.clone()], Duration::from_secs(1));

        let rejected = h.pipeline.on_message("{not json").await;
        assert_eq!(rejected.rejection().unwrap().kind, ErrorKind::MalformedPayload);

        let delivered = h
            .pipeline
            .on_message(r#"{"type":"EMAIL","to":"a@b.com","body":"ok"}"#)
            .await;
        assert_eq!(delivered.record().unwrap().outcome, Outcome::Delivered);

        assert_eq!(h.audit.rejections().len(), 1);
        assert_eq!(h.audit.records().len(), 1);
        assert_eq!(h.pipeline.metrics().snapshot().malformed, 1);
    }

    /// 必填字段为空：一次 InvalidMessage
    #[tokio::test]
    async fn test_e2e_blank_fields_invalid() {
        let email = MockSender::new("email", "EMAIL");
        let h = harness(vec![email.clone()], Duration::from_secs(1));

        let outcome = h
            .pipeline
            .on_message(r#"{"type":"EMAIL","to":"a@b.com","body":"   "}"#)
            .await;
        let rejection = outcome.rejection().unwrap();

        assert_eq!(rejection.kind, ErrorKind::InvalidMessage);
        assert_eq!(rejection.channel.as_deref(), Some("EMAIL"));
        assert_eq!(email.attempts(), 0);
        assert_eq!(h.audit.rejections().len(), 1);
        assert!(h.audit.records().is_empty());
    }

    /// 并发：不同渠道各产生一条正确的审计记录
    #[tokio::test]
    async fn test_e2e_concurrent_distinct_channels() {
        let channels = ["EMAIL", "SMS", "PUSH", "WHATSAPP", "SLACK", "WEBHOOK"];
        let senders: Vec<MockSender> = channels
            .iter()
            .map(|c| {
                MockSender::new(c.to_lowercase(), *c)
                    .with_behavior(MockBehavior::Delay(Duration::from_millis(20)))
            })
            .collect();
        let h = harness(senders.clone(), Duration::from_secs(2));

        let mut tasks = tokio::task::JoinSet::new();
        for (i, channel) in channels.iter().enumerate() {
            let pipeline = Arc::clone(&h.pipeline);
            let raw = serde_json::json!({
                "type": channel,
                "to": format!("user-{i}"),
                "body": format!("body-{i}"),
            })
            .to_string();
            tasks.spawn(async move { pipeline.on_message(&raw).await });
        }

        let mut records = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            records.push(joined.unwrap().record().cloned().unwrap());
        }

        assert_eq!(records.len(), channels.len());
        for (i, channel) in channels.iter().enumerate() {
            let record = records
                .iter()
                .find(|r| r.channel.as_str() == *channel)
                .unwrap();
            assert_eq!(record.outcome, Outcome::Delivered);
            assert_eq!(record.recipient, format!("user-{i}"));
            assert_eq!(senders[i].delivered_count(), 1);
        }
        assert_eq!(h.audit.records().len(), channels.len());
    }

    /// 慢速发送器超时
    #[tokio::test]
    async fn test_e2e_slow_sender_times_out() {
        let slow = MockSender::new("slow", "SMS")
            .with_behavior(MockBehavior::Delay(Duration::from_secs(5)));
        let h = harness(vec![slow.clone()], Duration::from_millis(50));

        let outcome = h
            .pipeline
            .on_message(r#"{"type":"SMS","to":"+1555","body":"late"}"#)
            .await;
        let record = outcome.record().unwrap();

        assert_eq!(record.outcome, Outcome::Failed);
        assert!(record.reason.as_deref().unwrap_or_default().contains("timed out"));
        assert_eq!(slow.delivered_count(), 0);
    }

    /// 发送器崩溃被隔离
    #[tokio::test]
    async fn test_e2e_panicking_sender_contained() {
        let broken = MockSender::new("broken", "PUSH").with_behavior(MockBehavior::Panic);
        let email = MockSender::new("email", "EMAIL");
        let h = harness(vec![broken, email.clone()], Duration::from_secs(1));

        let crashed = h
            .pipeline
            .on_message(r#"{"type":"PUSH","to":"device","body":"x"}"#)
            .await;
        assert_eq!(crashed.record().unwrap().outcome, Outcome::Failed);

        let again = h
            .pipeline
            .on_message(r#"{"type":"PUSH","to":"device","body":"y"}"#)
            .await;
        assert_eq!(again.record().unwrap().outcome, Outcome::Failed);

        let ok = h
            .pipeline
            .on_message(r#"{"type":"EMAIL","to":"a@b.com","body":"z"}"#)
            .await;
        assert_eq!(ok.record().unwrap().outcome, Outcome::Delivered);
        assert_eq!(email.delivered_count(), 1);
    }

    /// 重复渠道在注册时失败
    #[tokio::test]
    async fn test_registry_rejects_case_folded_duplicates() {
        let mut builder = RegistryBuilder::new();
        builder.register(MockSender::new("a", "email")).unwrap();
        let err = builder
            .register(MockSender::new("b", " EMAIL "))
            .err()
            .unwrap();

        assert!(matches!(err, DispatcherError::DuplicateChannel { .. }));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    /// Worker 池：每条 payload 恰好处理一次
    #[tokio::test]
    async fn test_e2e_run_processes_every_payload_once() {
        let email = MockSender::new("email", "EMAIL");
        let sms = MockSender::new("sms", "SMS");
        let h = harness(vec![email.clone(), sms.clone()], Duration::from_secs(1));

        let source = MockMessageSource::generated(40, &["EMAIL", "SMS", "FAX", "sms"]);
        let snapshot = h.pipeline.run(source).await.unwrap();

        assert_eq!(snapshot.received, 40);
        assert_eq!(snapshot.dispatched, 40);
        assert_eq!(snapshot.rejected(), 0);
        assert_eq!(email.delivered_count(), 10);
        assert_eq!(sms.delivered_count(), 20);

        let records = h.audit.records();
        assert_eq!(records.len(), 40);
        let unroutable = records
            .iter()
            .filter(|r| r.outcome == Outcome::Unroutable)
            .count();
        assert_eq!(unroutable, 10);

        let mut recipients: Vec<_> = records.iter().map(|r| r.recipient.clone()).collect();
        recipients.sort();
        recipients.dedup();
        assert_eq!(recipients.len(), 40);
    }

    /// 排队超时的消息之后不会再被投递
    #[tokio::test]
    async fn test_e2e_queued_timeout_never_delivered_late() {
        let slow = MockSender::new("slow", "SMS")
            .with_behavior(MockBehavior::Delay(Duration::from_millis(80)));
        let mut builder = RegistryBuilder::new();
        builder
            .register_with(
                slow.clone(),
                HandleOptions {
                    queue_capacity: 10,
                    max_in_flight: 1,
                },
            )
            .unwrap();
        let audit = MemoryAuditSink::new();
        let dispatcher = Dispatcher::new(
            builder.build(),
            DispatcherConfig {
                delivery_timeout: Duration::from_millis(100),
            },
        )
        .with_audit_sink(audit.clone());
        let pipeline = IngestionPipeline::new(Arc::new(dispatcher), IngestionConfig::new(4, 16));

        tokio::join!(
            pipeline.on_message(r#"{"type":"SMS","to":"+1","body":"a"}"#),
            pipeline.on_message(r#"{"type":"SMS","to":"+2","body":"b"}"#),
            pipeline.on_message(r#"{"type":"SMS","to":"+3","body":"c"}"#),
        );
        tokio::time::sleep(Duration::from_millis(300)).await;

        let records = audit.records();
        assert_eq!(records.len(), 3);
        let delivered = records
            .iter()
            .filter(|r| r.outcome == Outcome::Delivered)
            .count();
        assert!(delivered < 3);
        assert_eq!(slow.delivered_count(), delivered);
    }

    /// 非 UTF-8 行被拒绝，后续行照常处理
    #[tokio::test]
    async fn test_e2e_line_source_skips_unreadable_line() {
        let email = MockSender::new("email", "EMAIL");
        let h = harness(vec![email.clone()], Duration::from_secs(1));

        let input: &[u8] = b"{\"type\":\"EMAIL\",\"to\":\"a@b.com\",\"body\":\"1\"}\n\
                             \xc3\x28 broken\n\
                             {\"type\":\"EMAIL\",\"to\":\"c@d.com\",\"body\":\"2\"}\n";
        let snapshot = h
            .pipeline
            .run(LineSource::new("bytes", input))
            .await
            .unwrap();

        assert_eq!(snapshot.received, 3);
        assert_eq!(snapshot.malformed, 1);
        assert_eq!(email.delivered_count(), 2);
        assert_eq!(h.audit.records().len(), 2);
        let rejections = h.audit.rejections();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].kind, ErrorKind::MalformedPayload);
        assert!(rejections[0].reason.contains("line 2"));
    }

    /// 进程内通道来源 + 通道审计
    #[tokio::test]
    async fn test_e2e_channel_source_with_channel_audit() {
        let email = MockSender::new("email", "EMAIL");
        let mut builder = RegistryBuilder::new();
        builder.register(email.clone()).unwrap();
        let (audit, mut events) = ChannelAuditSink::new();
        let dispatcher = Dispatcher::new(builder.build(), DispatcherConfig::default())
            .with_audit_sink(Arc::new(audit));
        let pipeline = Arc::new(IngestionPipeline::new(
            Arc::new(dispatcher),
            IngestionConfig::new(2, 4),
        ));

        let (tx, source) = ChannelSource::bounded(2);
        let producer = tokio::spawn(async move {
            for payload in [
                r#"{"type":"EMAIL","to":"a@b.com","body":"1"}"#,
                "not json",
                r#"{"type":"FAX","to":"123","body":"2"}"#,
            ] {
                tx.send(payload).await.unwrap();
            }
            tx.close();
        });

        let snapshot = pipeline.run(source).await.unwrap();
        producer.await.unwrap();

        assert_eq!(snapshot.received, 3);
        assert_eq!(snapshot.dispatched, 2);
        assert_eq!(email.delivered_count(), 1);

        let mut outcomes = Vec::new();
        let mut rejected = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                AuditEvent::Dispatch(record) => outcomes.push(record.outcome),
                AuditEvent::Rejected(rejection) => {
                    assert_eq!(rejection.kind, ErrorKind::MalformedPayload);
                    rejected += 1;
                }
            }
        }
        outcomes.sort_by_key(|o| o.as_str());
        assert_eq!(outcomes, vec![Outcome::Delivered, Outcome::Unroutable]);
        assert_eq!(rejected, 1);
    }

    /// 汇总审计：聚合计数并可丢弃下游输出
    #[tokio::test]
    async fn test_e2e_aggregated_summary() {
        let mut builder = RegistryBuilder::new();
        builder.register(MockSender::new("email", "EMAIL")).unwrap();
        let audit = AggregatingAuditSink::new(Arc::new(NullAuditSink));
        let dispatcher = Dispatcher::new(builder.build(), DispatcherConfig::default())
            .with_audit_sink(audit.clone());
        let pipeline = Arc::new(IngestionPipeline::new(
            Arc::new(dispatcher),
            IngestionConfig::new(2, 8),
        ));

        let source = MockMessageSource::new([
            r#"{"type":"EMAIL","to":"a@b.com","body":"1"}"#,
            r#"{"type":"FAX","to":"123","body":"2"}"#,
            "garbage",
            r#"{"type":"","to":"x","body":"3"}"#,
        ]);
        pipeline.run(source).await.unwrap();

        let summary = audit.summary();
        assert_eq!(summary.total_dispatched, 2);
        assert_eq!(summary.totals.delivered, 1);
        assert_eq!(summary.totals.unroutable, 1);
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.invalid, 1);
        assert!(summary.to_string().contains("Dispatch Summary"));
    }
}

#[cfg(test)]
mod config_tests {
    use std::sync::Arc;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::Outcome;
    use dispatcher::{create_dispatcher, create_registry};
    use ingestion::{IngestionConfig, IngestionPipeline, MockMessageSource};

    /// 配置 -> 注册表 -> 分发 -> 文件发件箱
    #[tokio::test]
    async fn test_config_to_file_outbox() {
        let dir = tempfile::tempdir().unwrap();
        let config = format!(
            r#"
            [dispatch]
            delivery_timeout_ms = 1000

            [ingestion]
            workers = 2

            [[senders]]
            name = "mailbox"
            channel = "email"
            kind = "file"
            params = {{ base_path = "{}" }}

            [[senders]]
            name = "console"
            channel = "sms"
            kind = "log"
            "#,
            dir.path().display().to_string().replace('\\', "/")
        );
        let blueprint = ConfigLoader::load_from_str(&config, ConfigFormat::Toml).unwrap();

        let registry = create_registry(&blueprint.senders).await.unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.resolve("Email").is_some());
        assert!(registry.resolve("fax").is_none());
        registry.shutdown().await;

        let dispatcher = Arc::new(create_dispatcher(&blueprint).await.unwrap());
        let pipeline = Arc::new(IngestionPipeline::new(
            Arc::clone(&dispatcher),
            IngestionConfig::from(&blueprint.ingestion),
        ));

        let outcome = pipeline
            .on_message(r#"{"type":"EMAIL","to":"a@b.com","subject":"Hi","body":"hello"}"#)
            .await;
        assert_eq!(outcome.record().unwrap().outcome, Outcome::Delivered);

        pipeline
            .run(MockMessageSource::generated(5, &["email"]))
            .await
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join("email.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 6);
        let first: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(first["sender"], "mailbox");
        assert_eq!(first["message"]["recipient"], "a@b.com");
    }

    #[tokio::test]
    async fn test_config_twilio_without_credentials_fails_registry() {
        let blueprint = ConfigLoader::load_from_str(
            r#"{
                "senders": [{
                    "name": "twilio",
                    "channel": "sms",
                    "kind": "twilio",
                    "params": { "account_sid": "AC1", "auth_token": "t" }
                }]
            }"#,
            ConfigFormat::Json,
        )
        .unwrap();

        let err = create_registry(&blueprint.senders).await.err().unwrap();
        assert!(err.to_string().contains("twilio"));
    }
}
