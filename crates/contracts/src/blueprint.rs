//! DispatchBlueprint - Config Loader 输出
//!
//! 描述完整的分发配置：输出通道数量、缓冲容量、分发策略、模拟负载。

use serde::{Deserialize, Serialize};

use crate::StrategyConfig;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的分发配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 分发器设置
    pub dispatcher: DispatcherSettings,

    /// 模拟负载 (仅 CLI `run` 使用)
    #[serde(default)]
    pub workload: WorkloadConfig,
}

/// 分发器设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherSettings {
    /// 输出通道数量，必须 >= 1
    pub count: usize,

    /// 每个输出通道的缓冲容量 (0 = 无缓冲)
    #[serde(default)]
    pub channel_buffer_cap: usize,

    /// 分发策略
    #[serde(default)]
    pub strategy: StrategyConfig,
}

impl DispatcherSettings {
    /// Upper bound of messages buffered across all outputs
    pub fn max_in_flight(&self) -> usize {
        self.count.saturating_mul(self.channel_buffer_cap)
    }
}

/// 模拟负载配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// 发送到源通道的消息数量
    #[serde(default = "default_messages")]
    pub messages: u64,

    /// 源通道容量
    #[serde(default = "default_source_capacity")]
    pub source_capacity: usize,

    /// 每个输出消费者的处理延迟 (毫秒)，缺省为 0
    #[serde(default)]
    pub consumer_delays_ms: Vec<u64>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            messages: default_messages(),
            source_capacity: default_source_capacity(),
            consumer_delays_ms: Vec::new(),
        }
    }
}

impl WorkloadConfig {
    /// Delay applied by the consumer of output `index`
    pub fn consumer_delay_ms(&self, index: usize) -> u64 {
        self.consumer_delays_ms.get(index).copied().unwrap_or(0)
    }
}

fn default_messages() -> u64 {
    1000
}

fn default_source_capacity() -> usize {
    64
}
