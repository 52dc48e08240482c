//! Thompson sampling over Beta beliefs
//!
//! Each arm keeps a `Beta(alpha, beta)` posterior. A draw is produced from two
//! Gamma samples, `x ~ Gamma(alpha, 1)` and `y ~ Gamma(beta, 1)`, as
//! `x / (x + y)`. The sampler owns its random source so runs can be made
//! reproducible with a seed.

use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};

/// Beta posterior for one arm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThompsonState {
    /// Pseudo-count of successes (> 0)
    pub alpha: f64,
    /// Pseudo-count of failures (> 0)
    pub beta: f64,
}

impl Default for ThompsonState {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 1.0,
        }
    }
}

impl ThompsonState {
    /// Create a posterior, rejecting non-positive parameters
    pub fn new(alpha: f64, beta: f64) -> Result<Self> {
        if !(alpha > 0.0 && beta > 0.0 && alpha.is_finite() && beta.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "alpha and beta must be positive, got alpha={} beta={}",
                alpha, beta
            )));
        }
        Ok(Self { alpha, beta })
    }

    /// Posterior mean `alpha / (alpha + beta)`
    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    /// Posterior variance
    pub fn variance(&self) -> f64 {
        let total = self.alpha + self.beta;
        (self.alpha * self.beta) / (total * total * (total + 1.0))
    }

    /// Posterior standard deviation
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Record one trial
    #[must_use]
    pub fn update(&self, success: bool) -> Self {
        if success {
            Self {
                alpha: self.alpha + 1.0,
                beta: self.beta,
            }
        } else {
            Self {
                alpha: self.alpha,
                beta: self.beta + 1.0,
            }
        }
    }

    /// Uncertainty left in the arm
    pub fn exploration_score(&self) -> f64 {
        self.std_dev()
    }

    /// Expected payoff of the arm
    pub fn exploitation_score(&self) -> f64 {
        self.mean()
    }

    /// Draw one value from the posterior.
    ///
    /// Falls back to the mean if the Gamma parameters are rejected or both
    /// draws underflow to zero.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let (Ok(gx), Ok(gy)) = (Gamma::new(self.alpha, 1.0), Gamma::new(self.beta, 1.0)) else {
            return self.mean();
        };
        let x: f64 = gx.sample(rng);
        let y: f64 = gy.sample(rng);
        let total = x + y;
        if total > 0.0 && total.is_finite() {
            x / total
        } else {
            self.mean()
        }
    }
}

/// Thompson sampler holding its own random source
pub struct ThompsonSampler<R = StdRng> {
    rng: R,
}

impl ThompsonSampler<StdRng> {
    /// Reproducible sampler
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Sampler seeded from OS entropy
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded when `seed` is set, entropy otherwise
    pub fn with_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }
}

impl<R: Rng> ThompsonSampler<R> {
    /// Sampler drawing from `rng`
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Draw one value for a single arm
    pub fn sample(&mut self, state: &ThompsonState) -> f64 {
        state.sample(&mut self.rng)
    }

    /// Index of the arm with the highest draw. Ties keep the first arm seen.
    pub fn select<K>(&mut self, arms: &[(K, ThompsonState)]) -> Result<usize> {
        if arms.is_empty() {
            return Err(Error::InvalidParameter(
                "cannot select from an empty set of arms".to_string(),
            ));
        }

        let mut best = 0;
        let mut best_draw = f64::NEG_INFINITY;
        for (i, (_, state)) in arms.iter().enumerate() {
            let draw = state.sample(&mut self.rng);
            if draw > best_draw {
                best = i;
                best_draw = draw;
            }
        }
        Ok(best)
    }

    /// Arm keys ordered by one draw each, highest first. Ties keep input order.
    pub fn rank<K: Clone>(&mut self, arms: &[(K, ThompsonState)]) -> Vec<(K, f64)> {
        let mut draws: Vec<(K, f64)> = arms
            .iter()
            .map(|(key, state)| (key.clone(), state.sample(&mut self.rng)))
            .collect();
        draws.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        draws
    }
}
