//! 配置校验模块
//!
//! 校验规则：
//! - count >= 1
//! - weighted_random 的权重数量与 count 一致，且总权重 > 0
//! - source_capacity >= 1
//! - consumer_delays_ms 不超过 count 个

use contracts::{ContractError, DispatchBlueprint, StrategyConfig};

/// 校验 DispatchBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &DispatchBlueprint) -> Result<(), ContractError> {
    validate_count(blueprint)?;
    validate_strategy(blueprint)?;
    validate_workload(blueprint)?;
    Ok(())
}

/// 校验输出通道数量
fn validate_count(blueprint: &DispatchBlueprint) -> Result<(), ContractError> {
    if blueprint.dispatcher.count == 0 {
        return Err(ContractError::config_validation(
            "dispatcher.count",
            "count must be >= 1",
        ));
    }
    Ok(())
}

/// 校验策略参数
fn validate_strategy(blueprint: &DispatchBlueprint) -> Result<(), ContractError> {
    let count = blueprint.dispatcher.count;

    if let StrategyConfig::WeightedRandom { weights, .. } = &blueprint.dispatcher.strategy {
        if weights.len() != count {
            return Err(ContractError::config_validation(
                "dispatcher.strategy.weights",
                format!(
                    "expected {} weights (one per output), got {}",
                    count,
                    weights.len()
                ),
            ));
        }

        let total: u64 = weights.iter().map(|&w| u64::from(w)).sum();
        if total == 0 {
            return Err(ContractError::config_validation(
                "dispatcher.strategy.weights",
                "at least one weight must be > 0",
            ));
        }
    }

    Ok(())
}

/// 校验模拟负载
fn validate_workload(blueprint: &DispatchBlueprint) -> Result<(), ContractError> {
    let workload = &blueprint.workload;

    if workload.source_capacity == 0 {
        return Err(ContractError::config_validation(
            "workload.source_capacity",
            "source_capacity must be >= 1",
        ));
    }

    if workload.consumer_delays_ms.len() > blueprint.dispatcher.count {
        return Err(ContractError::config_validation(
            "workload.consumer_delays_ms",
            format!(
                "{} delays configured for {} outputs",
                workload.consumer_delays_ms.len(),
                blueprint.dispatcher.count
            ),
        ));
    }

    Ok(())
}
