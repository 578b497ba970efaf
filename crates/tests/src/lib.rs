//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 分发器行为性质测试 (不丢失、不重复、顺序、关闭传播、容量)
//! - 配置 -> 分发器 -> 消费者 e2e 测试

#[cfg(test)]
mod contract_tests {
    use contracts::{DispatcherSettings, StrategyConfig};

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_settings_json_snapshot() {
        let settings = DispatcherSettings {
            count: 2,
            channel_buffer_cap: 4,
            strategy: StrategyConfig::WeightedRandom {
                weights: vec![1, 3],
                seed: Some(9),
            },
        };
        let json = config_loader::ConfigLoader::to_json(&contracts::DispatchBlueprint {
            version: contracts::ConfigVersion::V1,
            dispatcher: settings,
            workload: Default::default(),
        })
        .unwrap();

        assert!(json.contains(r#""kind": "weighted_random""#));
        assert!(json.contains(r#""weights": ["#));
        assert!(json.contains(r#""seed": 9"#));
    }
}

#[cfg(test)]
mod property_tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use dispatcher::strategy::rng_from_seed;
    use dispatcher::{
        build_strategy, ChannelDispatcher, DispatchStrategy, FirstNotFull, LeastLoaded,
        MostLoaded, OutputReceiver, Random, RoundRobin, StrategyConfig, WeightedRandom,
    };
    use tokio::sync::mpsc;
    use tokio::time::{sleep, timeout};

    async fn drain<T>(mut output: OutputReceiver<T>) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = output.recv().await {
            items.push(item);
        }
        items
    }

    /// Feed `0..messages` through a dispatcher and collect what each output got
    async fn run_through<S>(messages: u64, count: usize, cap: usize, strategy: S) -> Vec<Vec<u64>>
    where
        S: DispatchStrategy<u64> + 'static,
    {
        let (tx, rx) = mpsc::channel(16);
        let outputs = dispatcher::dispatch_to_channels(rx, count, cap, strategy).unwrap();
        let consumers: Vec<_> = outputs.into_iter().map(|o| tokio::spawn(drain(o))).collect();

        for i in 0..messages {
            tx.send(i).await.unwrap();
        }
        drop(tx);

        let mut results = Vec::new();
        for consumer in consumers {
            let items = timeout(Duration::from_secs(10), consumer)
                .await
                .expect("outputs should close after the source closes")
                .unwrap();
            results.push(items);
        }
        results
    }

    fn assert_exactly_once(results: &[Vec<u64>], messages: u64) {
        let mut seen: Vec<u64> = results.iter().flatten().copied().collect();
        seen.sort_unstable();
        let expected: Vec<u64> = (0..messages).collect();
        assert_eq!(seen, expected);
    }

    fn assert_ordered(results: &[Vec<u64>]) {
        for (i, items) in results.iter().enumerate() {
            assert!(
                items.windows(2).all(|w| w[0] < w[1]),
                "output {i} out of order: {items:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_no_loss_no_duplication_every_strategy() {
        let messages = 500;

        let configs = vec![
            StrategyConfig::RoundRobin,
            StrategyConfig::Random { seed: Some(1) },
            StrategyConfig::WeightedRandom {
                weights: vec![3, 1, 0, 2],
                seed: Some(2),
            },
            StrategyConfig::First,
            StrategyConfig::Least,
            StrategyConfig::Most,
        ];

        for config in configs {
            for cap in [0, 1, 8] {
                let strategy = build_strategy::<u64>(&config, 4).unwrap();
                let results = run_through(messages, 4, cap, strategy).await;
                assert_exactly_once(&results, messages);
                assert_ordered(&results);
            }
        }
    }

    #[tokio::test]
    async fn test_seeded_random_strategies_are_reproducible() {
        let first = run_through(200, 3, 256, Random::new(rng_from_seed(Some(42)))).await;
        let second = run_through(200, 3, 256, Random::new(rng_from_seed(Some(42)))).await;
        assert_eq!(first, second);

        let weighted = || WeightedRandom::new(&[1, 2, 1], rng_from_seed(Some(5))).unwrap();
        let first = run_through(200, 3, 256, weighted()).await;
        let second = run_through(200, 3, 256, weighted()).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_close_propagation() {
        let (tx, rx) = mpsc::channel::<u64>(4);
        let dispatcher = ChannelDispatcher::spawn(rx, 3, 2, RoundRobin).unwrap();
        let (mut outputs, worker) = dispatcher.into_parts();

        tx.send(7).await.unwrap();
        drop(tx);

        let snapshot = timeout(Duration::from_secs(5), worker)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.received_count, 1);

        assert_eq!(outputs[0].recv().await, Some(7));
        for output in outputs.iter_mut() {
            assert_eq!(output.recv().await, None);
            assert!(output.is_closed());
        }
    }

    #[tokio::test]
    async fn test_round_robin_determinism() {
        for n in 1..=6usize {
            let messages = 2 * n as u64;
            let results = run_through(messages, n, 10, RoundRobin).await;
            for (i, items) in results.iter().enumerate() {
                let expected: Vec<u64> = (0..messages).filter(|m| *m as usize % n == i).collect();
                assert_eq!(items, &expected, "n={n} output {i}");
            }
        }
    }

    #[tokio::test]
    async fn test_capacity_respected() {
        let cap = 3;
        let (tx, rx) = mpsc::channel(64);
        let dispatcher = ChannelDispatcher::spawn(rx, 4, cap, FirstNotFull).unwrap();
        let (mut outputs, worker) = dispatcher.into_parts();

        for i in 0..60u64 {
            tx.send(i).await.unwrap();
        }
        drop(tx);

        let mut received = 0;
        while received < 60 {
            for output in outputs.iter() {
                assert!(output.len() <= cap, "output {} over capacity", output.index());
            }

            let before = received;
            for output in outputs.iter_mut() {
                if output.try_recv().is_ok() {
                    received += 1;
                }
            }
            if received == before {
                sleep(Duration::from_millis(1)).await;
            }
        }

        let snapshot = worker.await.unwrap();
        assert_eq!(snapshot.dispatched_total(), 60);
        assert!(snapshot.capacity_waits > 0);
        for output in snapshot.outputs {
            assert!(output.queue_len <= cap);
        }
    }

    #[tokio::test]
    async fn test_least_loaded_fairness() {
        let n = 5;
        let (tx, rx) = mpsc::channel(16);
        let dispatcher = ChannelDispatcher::spawn(rx, n, 4, LeastLoaded).unwrap();
        let (mut outputs, _worker) = dispatcher.into_parts();

        for i in 0..n as u64 {
            tx.send(i).await.unwrap();
        }
        sleep(Duration::from_millis(50)).await;

        for (i, output) in outputs.iter_mut().enumerate() {
            assert_eq!(output.len(), 1, "output {i}");
            assert_eq!(output.try_recv().unwrap(), i as u64);
        }
    }

    #[tokio::test]
    async fn test_most_loaded_piles_onto_one_output() {
        let results = run_through(20, 3, 0, MostLoaded).await;
        // Unbuffered outputs never report load, so everything stays on 0
        assert_eq!(results[0].len(), 20);
        assert!(results[1].is_empty() && results[2].is_empty());
    }

    #[tokio::test]
    async fn test_concrete_scenario() {
        let (tx, rx) = mpsc::channel(8);
        for i in 0..4 {
            tx.send(i).await.unwrap();
        }

        let dispatcher = ChannelDispatcher::spawn(rx, 5, 10, RoundRobin).unwrap();
        let mut outputs = dispatcher.into_outputs();

        sleep(Duration::from_millis(50)).await;
        let mut got: HashMap<usize, Vec<i32>> = HashMap::new();
        for output in outputs.iter_mut() {
            while let Ok(item) = output.try_recv() {
                got.entry(output.index()).or_default().push(item);
            }
        }
        for i in 0..4 {
            assert_eq!(got.get(&i), Some(&vec![i as i32]));
        }
        assert!(!got.contains_key(&4));

        drop(tx);
        for output in outputs.iter_mut() {
            assert_eq!(output.recv().await, None);
        }
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use dispatcher::channel::{channel_to_vec, fan_in, slice_to_channel};
    use dispatcher::{ChannelDispatcher, DispatcherError};
    use observability::DistributionAggregator;
    use tokio::time::timeout;

    const CONFIG: &str = r#"
[dispatcher]
count = 3
channel_buffer_cap = 4

[dispatcher.strategy]
kind = "weighted_random"
weights = [2, 1, 1]
seed = 11

[workload]
messages = 300
source_capacity = 8
"#;

    /// End-to-end test: config -> slice_to_channel -> Dispatcher -> fan_in
    ///
    /// 验证完整的数据流：
    /// 1. 从 TOML 加载并验证配置
    /// 2. 源通道按配置的策略分发到 N 个输出
    /// 3. 合并后的消息与输入完全一致
    #[tokio::test]
    async fn test_e2e_config_to_fan_in() {
        let blueprint = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        let messages = blueprint.workload.messages;

        let source = slice_to_channel(blueprint.workload.source_capacity, 0..messages);
        let dispatcher = ChannelDispatcher::from_settings(source, &blueprint.dispatcher).unwrap();
        let (outputs, worker) = dispatcher.into_parts();

        // OutputReceiver -> plain mpsc so the helper family composes with it
        let upstreams = outputs
            .into_iter()
            .map(|mut output| {
                let (tx, rx) = tokio::sync::mpsc::channel(1);
                tokio::spawn(async move {
                    while let Some(item) = output.recv().await {
                        if tx.send((output.index(), item)).await.is_err() {
                            break;
                        }
                    }
                });
                rx
            })
            .collect();

        let merged = timeout(Duration::from_secs(10), channel_to_vec(fan_in(8, upstreams)))
            .await
            .unwrap();
        let snapshot = worker.await.unwrap();

        let mut aggregator = DistributionAggregator::new(blueprint.dispatcher.count);
        for (output, _) in &merged {
            aggregator.record(*output, 0.0);
        }

        let mut values: Vec<u64> = merged.iter().map(|(_, v)| *v).collect();
        values.sort_unstable();
        assert_eq!(values, (0..messages).collect::<Vec<_>>());

        // Consumer-side counts agree with the dispatcher's own
        assert_eq!(aggregator.received, snapshot.distribution());
        assert_eq!(snapshot.undeliverable_total(), 0);

        // Weight 2 of 4 on output 0
        let summary = aggregator.summary();
        assert!(summary.shares[0] > summary.shares[1]);
        assert!(summary.shares[0] > summary.shares[2]);
    }

    #[tokio::test]
    async fn test_invalid_config_never_reaches_dispatcher() {
        let bad = CONFIG.replace("weights = [2, 1, 1]", "weights = [2, 1]");
        assert!(ConfigLoader::load_from_str(&bad, ConfigFormat::Toml).is_err());

        // Bypassing validation still fails at dispatcher construction
        let mut blueprint = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        blueprint.dispatcher.count = 0;
        assert!(ConfigLoader::validate(&blueprint).is_err());

        let (_tx, rx) = tokio::sync::mpsc::channel::<u64>(1);
        let result = ChannelDispatcher::from_settings(rx, &blueprint.dispatcher);
        assert!(matches!(result, Err(DispatcherError::InvalidCount { count: 0 })));
    }

    #[tokio::test]
    async fn test_dropped_consumer_is_routed_around() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
[dispatcher]
count = 2
channel_buffer_cap = 1
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let source = slice_to_channel(4, 0..10u32);
        let dispatcher = ChannelDispatcher::from_settings(source, &blueprint.dispatcher).unwrap();
        let (mut outputs, worker) = dispatcher.into_parts();

        drop(outputs.remove(1));
        let kept = drain(outputs.remove(0)).await;

        let snapshot = worker.await.unwrap();
        assert_eq!(snapshot.received_count, 10);
        assert_eq!(snapshot.undeliverable_total(), 0);
        assert_eq!(snapshot.outputs[1].dispatched_count, 0);
        assert_eq!(kept, (0..10).collect::<Vec<_>>());
    }

    async fn drain<T>(mut output: dispatcher::OutputReceiver<T>) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = output.recv().await {
            items.push(item);
        }
        items
    }
}
