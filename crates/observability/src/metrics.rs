//! 路由指标收集模块
//!
//! 基于 AuditRecord / Rejection 记录 Prometheus 指标，并在内存中聚合运行摘要。

use std::collections::BTreeMap;

use contracts::{AuditRecord, Outcome, Rejection};
use metrics::{counter, histogram};

/// 从 AuditRecord 记录指标
///
/// 每次分发尝试结束后调用一次。
pub fn record_dispatch(record: &AuditRecord) {
    counter!(
        "notify_router_dispatch_total",
        "channel" => record.channel.to_string(),
        "outcome" => record.outcome.as_str()
    )
    .increment(1);

    if record.outcome != Outcome::Unroutable {
        histogram!(
            "notify_router_delivery_latency_ms",
            "channel" => record.channel.to_string()
        )
        .record(record.elapsed_ms);
    }
}

/// 记录 payload 接收
pub fn record_payload_received() {
    counter!("notify_router_payloads_received_total").increment(1);
}

/// 记录 payload 被丢弃 (格式错误 / 校验失败)
pub fn record_rejection(rejection: &Rejection) {
    counter!(
        "notify_router_payloads_rejected_total",
        "kind" => rejection.kind.as_str()
    )
    .increment(1);
}

/// 单个渠道的结果计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelCounts {
    pub delivered: u64,
    pub failed: u64,
    pub unroutable: u64,
}

impl ChannelCounts {
    pub fn total(&self) -> u64 {
        self.delivered + self.failed + self.unroutable
    }
}

/// 审计聚合器
///
/// 在内存中聚合审计输出，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct AuditAggregator {
    /// 总分发次数
    pub total_dispatched: u64,

    /// 各结果计数
    pub totals: ChannelCounts,

    /// 格式错误的 payload 数
    pub malformed: u64,

    /// 校验失败的消息数
    pub invalid: u64,

    /// 投递耗时统计 (毫秒，不含 unroutable)
    pub latency_stats: RunningStats,

    /// 各渠道结果计数
    pub per_channel: BTreeMap<String, ChannelCounts>,
}

impl AuditAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新分发统计
    pub fn update(&mut self, record: &AuditRecord) {
        self.total_dispatched += 1;

        let channel = self
            .per_channel
            .entry(record.channel.to_string())
            .or_default();
        match record.outcome {
            Outcome::Delivered => {
                self.totals.delivered += 1;
                channel.delivered += 1;
            }
            Outcome::Failed => {
                self.totals.failed += 1;
                channel.failed += 1;
            }
            Outcome::Unroutable => {
                self.totals.unroutable += 1;
                channel.unroutable += 1;
            }
        }

        if record.outcome != Outcome::Unroutable {
            self.latency_stats.push(record.elapsed_ms);
        }
    }

    /// 更新丢弃统计
    pub fn update_rejection(&mut self, rejection: &Rejection) {
        match rejection.kind {
            contracts::ErrorKind::MalformedPayload => self.malformed += 1,
            _ => self.invalid += 1,
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> AuditSummary {
        AuditSummary {
            total_dispatched: self.total_dispatched,
            totals: self.totals,
            malformed: self.malformed,
            invalid: self.invalid,
            delivery_rate: if self.total_dispatched > 0 {
                self.totals.delivered as f64 / self.total_dispatched as f64 * 100.0
            } else {
                0.0
            },
            latency_ms: StatsSummary::from(&self.latency_stats),
            per_channel: self.per_channel.clone(),
        }
    }
}

/// 审计摘要
#[derive(Debug, Clone, Default)]
pub struct AuditSummary {
    pub total_dispatched: u64,
    pub totals: ChannelCounts,
    pub malformed: u64,
    pub invalid: u64,
    pub delivery_rate: f64,
    pub latency_ms: StatsSummary,
    pub per_channel: BTreeMap<String, ChannelCounts>,
}

impl AuditSummary {
    /// 被丢弃的 payload 总数
    pub fn rejected(&self) -> u64 {
        self.malformed + self.invalid
    }
}

impl std::fmt::Display for AuditSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Summary ===")?;
        writeln!(f, "Dispatched: {}", self.total_dispatched)?;
        writeln!(
            f,
            "Delivered: {} ({:.2}%)",
            self.totals.delivered, self.delivery_rate
        )?;
        writeln!(f, "Failed: {}", self.totals.failed)?;
        writeln!(f, "Unroutable: {}", self.totals.unroutable)?;
        writeln!(
            f,
            "Rejected payloads: {} (malformed={}, invalid={})",
            self.rejected(),
            self.malformed,
            self.invalid
        )?;
        writeln!(f, "Delivery latency (ms): {}", self.latency_ms)?;

        if !self.per_channel.is_empty() {
            writeln!(f, "Per channel:")?;
            for (channel, counts) in &self.per_channel {
                writeln!(
                    f,
                    "  {}: delivered={}, failed={}, unroutable={}",
                    channel, counts.delivered, counts.failed, counts.unroutable
                )?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ErrorKind, NotificationMessage};
    use std::time::Duration;

    fn message(channel: &str) -> NotificationMessage {
        NotificationMessage::new(channel, "to", None, "body").unwrap()
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = AuditAggregator::new();

        aggregator.update(&AuditRecord::delivered(
            &message("email"),
            "smtp",
            Duration::from_millis(4),
        ));
        aggregator.update(&AuditRecord::failed(
            &message("EMAIL"),
            Some("smtp"),
            "boom",
            Duration::from_millis(2),
        ));
        aggregator.update(&AuditRecord::unroutable(&message("fax")));
        aggregator.update_rejection(&Rejection::new(ErrorKind::MalformedPayload, "bad", None));

        assert_eq!(aggregator.total_dispatched, 3);
        assert_eq!(aggregator.totals.delivered, 1);
        assert_eq!(aggregator.totals.failed, 1);
        assert_eq!(aggregator.totals.unroutable, 1);
        assert_eq!(aggregator.malformed, 1);
        assert_eq!(aggregator.invalid, 0);
        assert_eq!(aggregator.per_channel["EMAIL"].total(), 2);
        assert_eq!(aggregator.per_channel["FAX"].unroutable, 1);
        assert_eq!(aggregator.latency_stats.count(), 2);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = AuditAggregator::new();
        aggregator.update(&AuditRecord::delivered(
            &message("sms"),
            "twilio",
            Duration::from_millis(10),
        ));

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Dispatched: 1"));
        assert!(output.contains("100.00%"));
        assert!(output.contains("SMS: delivered=1"));
    }
}
