//! # Observability
//!
//! 可观测性模块：Prometheus 指标 + 审计输出。
//!
//! ## 功能
//!
//! - Prometheus 指标导出
//! - 审计记录输出 (`AuditSink` 实现) 与汇总统计
//!
//! Tracing 订阅器由 CLI 初始化，本模块只产生事件。
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::{AggregatingAuditSink, TracingAuditSink};
//!
//! observability::init_metrics_only(9000)?;
//! let audit = AggregatingAuditSink::new(Arc::new(TracingAuditSink));
//! let dispatcher = dispatcher.with_audit_sink(audit.clone());
//! println!("{}", audit.summary());
//! ```

pub mod audit;
pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;

// Re-exports
pub use crate::audit::{
    AggregatingAuditSink, AuditEvent, ChannelAuditSink, MemoryAuditSink, NullAuditSink,
    TracingAuditSink, AUDIT_TARGET,
};
pub use crate::metrics::{
    record_dispatch, record_payload_received, record_rejection, AuditAggregator, AuditSummary,
    ChannelCounts, RunningStats, StatsSummary,
};

/// 初始化 Prometheus 指标导出
///
/// 在 `0.0.0.0:<port>` 上提供 `/metrics`。Tracing 已由 CLI 初始化。
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}
