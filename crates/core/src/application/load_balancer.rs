//! LoadBalancer - picks one worker out of a candidate list
//!
//! The only shared state is the round-robin cursor and the RNG used by the
//! weighted strategy.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::domain::{DomainError, WorkerInfo};

/// Selection strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    /// Cyclic cursor shared across calls
    RoundRobin,
    /// Minimum current_load / max_concurrent
    #[default]
    LeastLoaded,
    /// Random draw weighted by health_score * (1 - load fraction)
    Weighted,
}

impl std::fmt::Display for LoadBalanceStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadBalanceStrategy::RoundRobin => write!(f, "round_robin"),
            LoadBalanceStrategy::LeastLoaded => write!(f, "least_loaded"),
            LoadBalanceStrategy::Weighted => write!(f, "weighted"),
        }
    }
}

impl FromStr for LoadBalanceStrategy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "round_robin" => Ok(LoadBalanceStrategy::RoundRobin),
            "least_loaded" => Ok(LoadBalanceStrategy::LeastLoaded),
            "weighted" => Ok(LoadBalanceStrategy::Weighted),
            other => Err(DomainError::ValidationError(format!(
                "unknown load balance strategy: {}",
                other
            ))),
        }
    }
}

pub struct LoadBalancer {
    strategy: LoadBalanceStrategy,
    cursor: AtomicUsize,
    rng: Mutex<StdRng>,
}

impl LoadBalancer {
    pub fn new(strategy: LoadBalanceStrategy) -> Self {
        Self::with_rng(strategy, StdRng::from_entropy())
    }

    pub fn with_seed(strategy: LoadBalanceStrategy, seed: u64) -> Self {
        Self::with_rng(strategy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(strategy: LoadBalanceStrategy, rng: StdRng) -> Self {
        Self {
            strategy,
            cursor: AtomicUsize::new(0),
            rng: Mutex::new(rng),
        }
    }

    pub fn strategy(&self) -> LoadBalanceStrategy {
        self.strategy
    }

    /// `None` only for an empty candidate list
    pub fn select<'a>(&self, candidates: &[&'a WorkerInfo]) -> Option<&'a WorkerInfo> {
        if candidates.is_empty() {
            return None;
        }

        match self.strategy {
            LoadBalanceStrategy::RoundRobin => {
                let i = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
                Some(candidates[i])
            }
            LoadBalanceStrategy::LeastLoaded => candidates
                .iter()
                .copied()
                .min_by(|a, b| a.load_fraction().total_cmp(&b.load_fraction())),
            LoadBalanceStrategy::Weighted => Some(self.weighted(candidates)),
        }
    }

    fn weighted<'a>(&self, candidates: &[&'a WorkerInfo]) -> &'a WorkerInfo {
        let weights: Vec<f64> = candidates
            .iter()
            .map(|w| (w.health_score * (1.0 - w.load_fraction())).max(0.0))
            .collect();
        let total: f64 = weights.iter().sum();

        // All-zero weights fall back to the first candidate
        if total <= 0.0 {
            return candidates[0];
        }

        let mut roll = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            rng.gen::<f64>() * total
        };
        for (worker, weight) in candidates.iter().zip(&weights) {
            if roll < *weight {
                return *worker;
            }
            roll -= weight;
        }

        // Float rounding can leave a sliver past the last bucket
        candidates
            .iter()
            .zip(&weights)
            .rev()
            .find(|(_, w)| **w > 0.0)
            .map(|(worker, _)| *worker)
            .unwrap_or(candidates[0])
    }
}
