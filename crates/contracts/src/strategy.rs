//! Dispatch strategy contracts that can be shared across crates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy selection as written in configuration files
///
/// ```toml
/// [dispatcher.strategy]
/// kind = "weighted_random"
/// weights = [1, 2, 3]
/// seed = 42
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// `index mod count`, skipping full outputs
    #[default]
    RoundRobin,

    /// Uniformly random output, skipping full outputs
    Random {
        /// Fixed seed for reproducible runs (OS entropy if absent)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<u64>,
    },

    /// Random output drawn from a weighted pool, skipping full outputs
    WeightedRandom {
        /// One weight per output channel
        weights: Vec<u32>,
        /// Fixed seed for reproducible runs (OS entropy if absent)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<u64>,
    },

    /// Lowest-indexed output that is not full
    First,

    /// Output with the fewest buffered messages
    Least,

    /// Output with the most buffered messages among those not full
    Most,
}

impl StrategyConfig {
    /// Stable name used in logs and metric labels
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::Random { .. } => "random",
            Self::WeightedRandom { .. } => "weighted_random",
            Self::First => "first",
            Self::Least => "least",
            Self::Most => "most",
        }
    }

    /// Seed for the random strategies, if any
    pub fn seed(&self) -> Option<u64> {
        match self {
            Self::Random { seed } | Self::WeightedRandom { seed, .. } => *seed,
            _ => None,
        }
    }

    /// Whether the strategy parks the dispatcher while its targets are full
    pub fn waits_for_capacity(&self) -> bool {
        !matches!(self, Self::Least | Self::Most)
    }
}

impl fmt::Display for StrategyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_config_json_tagging() {
        let json = r#"{"kind":"weighted_random","weights":[1,2],"seed":9}"#;
        let config: StrategyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config,
            StrategyConfig::WeightedRandom {
                weights: vec![1, 2],
                seed: Some(9)
            }
        );
        assert_eq!(config.seed(), Some(9));
    }

    #[test]
    fn test_strategy_config_unit_variants() {
        let config: StrategyConfig = serde_json::from_str(r#"{"kind":"least"}"#).unwrap();
        assert_eq!(config, StrategyConfig::Least);
        assert!(!config.waits_for_capacity());
        assert!(StrategyConfig::First.waits_for_capacity());
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(StrategyConfig::default().name(), "round_robin");
        assert_eq!(StrategyConfig::Random { seed: None }.to_string(), "random");
        assert_eq!(StrategyConfig::Most.name(), "most");
    }
}
