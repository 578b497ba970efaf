//! # Dispatcher
//!
//! 消息分发模块。
//!
//! 负责：
//! - 消费单个源通道
//! - 按策略把每条消息路由到 N 个输出通道之一
//! - 源通道关闭后关闭所有输出通道
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use dispatcher::{ChannelDispatcher, RoundRobin};
//! use tokio::sync::mpsc;
//!
//! let (tx, rx) = mpsc::channel(16);
//! let dispatcher = ChannelDispatcher::spawn(rx, 2, 4, RoundRobin).unwrap();
//! let mut outputs = dispatcher.into_outputs();
//!
//! tx.send("a").await.unwrap();
//! tx.send("b").await.unwrap();
//! drop(tx);
//!
//! assert_eq!(outputs[0].recv().await, Some("a"));
//! assert_eq!(outputs[1].recv().await, Some("b"));
//! assert_eq!(outputs[0].recv().await, None);
//! # }
//! ```

pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod output;
pub mod strategy;

pub use contracts::{DispatcherSettings, StrategyConfig};
pub use dispatcher::{dispatch_to_channels, ChannelDispatcher};
pub use error::DispatcherError;
pub use metrics::{DispatcherMetrics, MetricsSnapshot, OutputMetrics, OutputSnapshot};
pub use output::{OutputChannel, OutputReceiver};
pub use strategy::{
    build_strategy, from_fn, DispatchStrategy, FirstNotFull, LeastLoaded, MostLoaded,
    RandomSource, Random, RoundRobin, WeightedRandom,
};
