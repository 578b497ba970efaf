//! Dispatch strategies - pick the output that receives the next message
//!
//! A strategy answers `Some(index)` with its chosen output, or `None` when
//! every acceptable output is full. Outputs whose consumer is gone are never
//! chosen while a live one exists. On `None` the dispatcher parks until a
//! consumer frees capacity and asks again, so strategies never spin.

use contracts::{ContractError, StrategyConfig};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::DispatcherError;
use crate::output::OutputChannel;

/// Routing policy of a [`ChannelDispatcher`](crate::ChannelDispatcher)
///
/// Only the dispatcher's worker task calls `select`, one message at a time.
pub trait DispatchStrategy<T>: Send {
    /// Pick an output for `msg`, the `index`-th message read from the source.
    ///
    /// The result is reduced modulo the number of outputs.
    fn select(&mut self, msg: &T, index: u64, outputs: &[OutputChannel<T>]) -> Option<usize>;
}

impl<T> DispatchStrategy<T> for Box<dyn DispatchStrategy<T>> {
    fn select(&mut self, msg: &T, index: u64, outputs: &[OutputChannel<T>]) -> Option<usize> {
        (**self).select(msg, index, outputs)
    }
}

/// Strategy backed by a closure, see [`from_fn`]
pub struct FnStrategy<F>(F);

/// Use a closure as a dispatch strategy
///
/// ```
/// use dispatcher::strategy::from_fn;
///
/// // Route even numbers to output 0 and odd ones to output 1.
/// let _parity = from_fn(|msg: &u32, _index, _outputs| Some((*msg % 2) as usize));
/// ```
pub fn from_fn<T, F>(f: F) -> FnStrategy<F>
where
    F: FnMut(&T, u64, &[OutputChannel<T>]) -> Option<usize> + Send,
{
    FnStrategy(f)
}

impl<T, F> DispatchStrategy<T> for FnStrategy<F>
where
    F: FnMut(&T, u64, &[OutputChannel<T>]) -> Option<usize> + Send,
{
    fn select(&mut self, msg: &T, index: u64, outputs: &[OutputChannel<T>]) -> Option<usize> {
        (self.0)(msg, index, outputs)
    }
}

/// Source of randomness for the random strategies
///
/// Implemented for every [`rand::Rng`], so a seeded `StdRng` gives
/// reproducible routing.
pub trait RandomSource: Send {
    /// Uniform integer in `0..upper`; `upper` is never zero.
    fn pick(&mut self, upper: usize) -> usize;

    /// Index drawn from a weighted distribution
    fn pick_weighted(&mut self, dist: &WeightedIndex<u64>) -> usize;
}

impl<R: Rng + Send> RandomSource for R {
    fn pick(&mut self, upper: usize) -> usize {
        self.random_range(0..upper)
    }

    fn pick_weighted(&mut self, dist: &WeightedIndex<u64>) -> usize {
        dist.sample(self)
    }
}

/// Seeded generator when `seed` is set, OS-seeded otherwise
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Indices of outputs that can take a message right now
fn open_outputs<T>(outputs: &[OutputChannel<T>]) -> Vec<usize> {
    outputs
        .iter()
        .filter(|o| o.accepts())
        .map(OutputChannel::index)
        .collect()
}

/// Target used when no output accepts
///
/// Waits (`None`) while some consumer is still alive; once every consumer is
/// gone there is nothing to wait for and `fallback` is returned, which the
/// dispatcher counts as undeliverable.
fn when_none_accepts<T>(outputs: &[OutputChannel<T>], fallback: usize) -> Option<usize> {
    if outputs.iter().all(OutputChannel::is_closed) {
        Some(fallback)
    } else {
        None
    }
}

/// `index mod count`, moving forward past full or closed outputs
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobin;

impl<T> DispatchStrategy<T> for RoundRobin {
    fn select(&mut self, _msg: &T, index: u64, outputs: &[OutputChannel<T>]) -> Option<usize> {
        let count = outputs.len();
        let start = (index % count as u64) as usize;
        (0..count)
            .map(|offset| (start + offset) % count)
            .find(|&i| outputs[i].accepts())
            .or_else(|| when_none_accepts(outputs, start))
    }
}

/// Uniformly random output among those accepting
#[derive(Debug)]
pub struct Random<R> {
    rng: R,
}

impl<R: RandomSource> Random<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<T, R: RandomSource> DispatchStrategy<T> for Random<R> {
    fn select(&mut self, _msg: &T, _index: u64, outputs: &[OutputChannel<T>]) -> Option<usize> {
        let first = self.rng.pick(outputs.len());
        if outputs[first].accepts() {
            return Some(first);
        }

        // Redrawing until an accepting output comes up is uniform over the
        // accepting outputs, so draw from those directly.
        let open = open_outputs(outputs);
        if open.is_empty() {
            when_none_accepts(outputs, first)
        } else {
            Some(open[self.rng.pick(open.len())])
        }
    }
}

/// Random output with probability proportional to its weight
///
/// A draw that lands on an output that cannot take the message is redrawn
/// over the weights of the outputs that can.
#[derive(Debug)]
pub struct WeightedRandom<R> {
    weights: Vec<u64>,
    dist: WeightedIndex<u64>,
    rng: R,
}

impl<R: RandomSource> WeightedRandom<R> {
    /// # Errors
    /// Returns [`DispatcherError::InvalidWeights`] when every weight is zero.
    pub fn new(weights: &[u32], rng: R) -> Result<Self, DispatcherError> {
        let weights: Vec<u64> = weights.iter().map(|&w| u64::from(w)).collect();
        let dist = WeightedIndex::new(&weights).map_err(|e| {
            DispatcherError::invalid_weights(format!("at least one weight must be > 0 ({e})"))
        })?;

        Ok(Self { weights, dist, rng })
    }

    /// Number of outputs the weights were declared for
    pub fn outputs(&self) -> usize {
        self.weights.len()
    }
}

impl<T, R: RandomSource> DispatchStrategy<T> for WeightedRandom<R> {
    fn select(&mut self, _msg: &T, _index: u64, outputs: &[OutputChannel<T>]) -> Option<usize> {
        let count = outputs.len();
        let first = self.rng.pick_weighted(&self.dist) % count;
        if outputs[first].accepts() {
            return Some(first);
        }

        let mut open = vec![0u64; count];
        let mut reachable = false;
        for (i, &weight) in self.weights.iter().enumerate() {
            let output = &outputs[i % count];
            if weight > 0 && !output.is_closed() {
                reachable = true;
                if !output.is_full() {
                    open[i % count] += weight;
                }
            }
        }
        match WeightedIndex::new(&open) {
            Ok(dist) => Some(self.rng.pick_weighted(&dist)),
            // Only zero-weight outputs are alive; waiting would never end.
            Err(_) if !reachable => Some(first),
            Err(_) => None,
        }
    }
}

/// Lowest-indexed output that accepts
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstNotFull;

impl<T> DispatchStrategy<T> for FirstNotFull {
    fn select(&mut self, _msg: &T, _index: u64, outputs: &[OutputChannel<T>]) -> Option<usize> {
        outputs
            .iter()
            .position(OutputChannel::accepts)
            .or_else(|| when_none_accepts(outputs, 0))
    }
}

/// Live output with the fewest buffered messages; ties go to the lowest index
///
/// Never waits: when every live output is full the send itself blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastLoaded;

impl<T> DispatchStrategy<T> for LeastLoaded {
    fn select(&mut self, _msg: &T, _index: u64, outputs: &[OutputChannel<T>]) -> Option<usize> {
        let least = outputs
            .iter()
            .enumerate()
            .filter(|(_, o)| !o.is_closed())
            .min_by_key(|(_, o)| o.len())
            .map(|(i, _)| i);
        Some(least.unwrap_or(0))
    }
}

/// Output with the most buffered messages among those accepting
///
/// Ties go to the lowest index. When none accepts, falls back to the lowest
/// live output (output 0 if all are closed); never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct MostLoaded;

impl<T> DispatchStrategy<T> for MostLoaded {
    fn select(&mut self, _msg: &T, _index: u64, outputs: &[OutputChannel<T>]) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (i, output) in outputs.iter().enumerate() {
            if !output.accepts() {
                continue;
            }
            let len = output.len();
            if best.is_none_or(|(_, best_len)| len > best_len) {
                best = Some((i, len));
            }
        }
        let fallback = || outputs.iter().position(|o| !o.is_closed()).unwrap_or(0);
        Some(best.map_or_else(fallback, |(i, _)| i))
    }
}

/// Build a boxed strategy from its configuration
///
/// # Errors
/// - weighted weights do not match `count`, or are all zero
pub fn build_strategy<T: 'static>(
    config: &StrategyConfig,
    count: usize,
) -> Result<Box<dyn DispatchStrategy<T>>, DispatcherError> {
    let strategy: Box<dyn DispatchStrategy<T>> = match config {
        StrategyConfig::RoundRobin => Box::new(RoundRobin),
        StrategyConfig::Random { seed } => Box::new(Random::new(rng_from_seed(*seed))),
        StrategyConfig::WeightedRandom { weights, seed } => {
            if weights.len() != count {
                return Err(ContractError::strategy_rejected(
                    config.name(),
                    format!("{} weights for {} outputs", weights.len(), count),
                )
                .into());
            }
            Box::new(WeightedRandom::new(weights, rng_from_seed(*seed))?)
        }
        StrategyConfig::First => Box::new(FirstNotFull),
        StrategyConfig::Least => Box::new(LeastLoaded),
        StrategyConfig::Most => Box::new(MostLoaded),
    };
    Ok(strategy)
}
