//! 分发指标收集模块
//!
//! 记录分发器的运行指标，并在消费端聚合消息分布。

use metrics::{counter, gauge};

/// 记录一条消息成功分发到输出通道
pub fn record_message_dispatched(output: usize) {
    counter!(
        "fanout_messages_dispatched_total",
        "output" => output.to_string()
    )
    .increment(1);
}

/// 记录输出通道当前缓冲深度
pub fn record_output_depth(output: usize, depth: usize) {
    gauge!(
        "fanout_output_depth",
        "output" => output.to_string()
    )
    .set(depth as f64);
}

/// 记录无法投递的消息 (消费端已关闭)
pub fn record_message_undeliverable(output: usize) {
    counter!(
        "fanout_undeliverable_total",
        "output" => output.to_string()
    )
    .increment(1);
}

/// 记录一次等待容量 (所有候选输出已满)
pub fn record_capacity_wait() {
    counter!("fanout_capacity_waits_total").increment(1);
}

/// 消费端分布聚合器
///
/// 在内存中聚合每个输出通道收到的消息，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DistributionAggregator {
    /// 各输出通道收到的消息数
    pub received: Vec<u64>,

    /// 各输出通道检测到的乱序次数
    pub order_violations: Vec<u64>,

    /// 消息从产生到被消费的延迟 (毫秒)
    pub latency_stats: RunningStats,
}

impl DistributionAggregator {
    /// 为 `outputs` 个输出通道创建聚合器
    pub fn new(outputs: usize) -> Self {
        Self {
            received: vec![0; outputs],
            order_violations: vec![0; outputs],
            latency_stats: RunningStats::default(),
        }
    }

    /// 记录输出通道 `output` 收到一条消息
    pub fn record(&mut self, output: usize, latency_ms: f64) {
        self.ensure_len(output + 1);
        self.received[output] += 1;
        self.latency_stats.push(latency_ms);
    }

    /// 记录输出通道 `output` 出现乱序
    pub fn record_order_violation(&mut self, output: usize) {
        self.ensure_len(output + 1);
        self.order_violations[output] += 1;
    }

    /// 合并另一个聚合器 (例如各消费者任务各自持有一个)
    pub fn merge(&mut self, other: &DistributionAggregator) {
        self.ensure_len(other.received.len());
        for (i, count) in other.received.iter().enumerate() {
            self.received[i] += count;
        }
        for (i, count) in other.order_violations.iter().enumerate() {
            self.order_violations[i] += count;
        }
        self.latency_stats.merge(&other.latency_stats);
    }

    /// 总消息数
    pub fn total(&self) -> u64 {
        self.received.iter().sum()
    }

    /// 生成摘要报告
    pub fn summary(&self) -> DistributionSummary {
        let total = self.total();
        let outputs = self.received.len();

        let shares = self
            .received
            .iter()
            .map(|&n| {
                if total > 0 {
                    n as f64 / total as f64 * 100.0
                } else {
                    0.0
                }
            })
            .collect();

        // 最大负载 / 平均负载，1.0 表示完全均衡
        let imbalance = if total > 0 && outputs > 0 {
            let mean = total as f64 / outputs as f64;
            self.received.iter().copied().max().unwrap_or(0) as f64 / mean
        } else {
            0.0
        };

        DistributionSummary {
            total,
            received: self.received.clone(),
            shares,
            imbalance,
            order_violations: self.order_violations.iter().sum(),
            latency_ms: StatsSummary::from(&self.latency_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        let outputs = self.received.len();
        *self = Self::new(outputs);
    }

    fn ensure_len(&mut self, len: usize) {
        if len > self.received.len() {
            self.received.resize(len, 0);
            self.order_violations.resize(len, 0);
        }
    }
}

/// 分布摘要
#[derive(Debug, Clone, Default)]
pub struct DistributionSummary {
    pub total: u64,
    pub received: Vec<u64>,
    pub shares: Vec<f64>,
    pub imbalance: f64,
    pub order_violations: u64,
    pub latency_ms: StatsSummary,
}

impl std::fmt::Display for DistributionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Distribution Summary ===")?;
        writeln!(f, "Total messages: {}", self.total)?;
        for (i, (count, share)) in self.received.iter().zip(&self.shares).enumerate() {
            writeln!(f, "  output {}: {} ({:.2}%)", i, count, share)?;
        }
        writeln!(f, "Imbalance (max/mean): {:.3}", self.imbalance)?;
        writeln!(f, "Order violations: {}", self.order_violations)?;
        writeln!(f, "Latency (ms): {}", self.latency_ms)?;
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

    /// 合并两组统计 (Chan 并行算法)
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * other.count as f64 / count as f64;
        let m2 = self.m2
            + other.m2
            + delta * delta * (self.count as f64 * other.count as f64) / count as f64;

        self.count = count;
        self.mean = mean;
        self.m2 = m2;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
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

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        stats.push(1.0);
        stats.push(2.0);
        stats.push(3.0);
        stats.push(4.0);
        stats.push(5.0);

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_running_stats_merge_matches_sequential() {
        let mut left = RunningStats::default();
        let mut right = RunningStats::default();
        let mut all = RunningStats::default();

        for v in [1.0, 2.0, 3.0] {
            left.push(v);
            all.push(v);
        }
        for v in [10.0, 20.0] {
            right.push(v);
            all.push(v);
        }

        left.merge(&right);
        assert_eq!(left.count(), all.count());
        assert!((left.mean() - all.mean()).abs() < 1e-10);
        assert!((left.variance() - all.variance()).abs() < 1e-9);
        assert!((left.max() - 20.0).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_record_and_merge() {
        let mut a = DistributionAggregator::new(2);
        a.record(0, 1.0);
        a.record(0, 3.0);

        let mut b = DistributionAggregator::new(3);
        b.record(2, 2.0);
        b.record_order_violation(2);

        a.merge(&b);
        assert_eq!(a.received, vec![2, 0, 1]);
        assert_eq!(a.total(), 3);

        let summary = a.summary();
        assert_eq!(summary.order_violations, 1);
        assert_eq!(summary.latency_ms.count, 3);
        assert!((summary.latency_ms.mean - 2.0).abs() < 1e-10);
        // max 2 over mean 1
        assert!((summary.imbalance - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = DistributionAggregator::new(2);
        aggregator.record(0, 0.5);
        aggregator.record(1, 0.5);
        aggregator.record(1, 0.5);
        aggregator.record(1, 0.5);

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Total messages: 4"));
        assert!(output.contains("output 1: 3 (75.00%)"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = DistributionAggregator::new(3).summary();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.imbalance, 0.0);
        assert_eq!(format!("{}", summary.latency_ms), "N/A");
    }
}
