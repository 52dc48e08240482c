//! Bayesian confidence tracking
//!
//! Gaussian conjugate update in precision (inverse variance) form:
//!
//! ```text
//! posterior_variance = 1 / (1 / prior_variance + 1 / observation_variance)
//! posterior_mean     = posterior_variance * (prior_mean / prior_variance
//!                                            + observation / observation_variance)
//! ```
//!
//! The posterior variance is always strictly below both input variances.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Gaussian belief `(mean, variance)`; variance is always > 0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BayesianState {
    /// Belief mean
    pub mean: f64,
    /// Belief variance
    pub variance: f64,
}

impl Default for BayesianState {
    fn default() -> Self {
        Self {
            mean: 0.5,
            variance: 0.04,
        }
    }
}

impl BayesianState {
    /// Create a belief, rejecting non-positive or non-finite variance
    pub fn new(mean: f64, variance: f64) -> Result<Self> {
        if !(variance > 0.0 && variance.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "variance must be positive, got {}",
                variance
            )));
        }
        if !mean.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "mean must be finite, got {}",
                mean
            )));
        }
        Ok(Self { mean, variance })
    }

    /// Posterior after one observation with the given variance
    pub fn update(&self, observation: f64, observation_variance: f64) -> Result<Self> {
        if !(observation_variance > 0.0 && observation_variance.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "observation variance must be positive, got {}",
                observation_variance
            )));
        }
        if !(self.variance > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "prior variance must be positive, got {}",
                self.variance
            )));
        }

        let prior_precision = 1.0 / self.variance;
        let observation_precision = 1.0 / observation_variance;
        let variance = 1.0 / (prior_precision + observation_precision);
        let mean = variance
            * (self.mean * prior_precision + observation * observation_precision);

        Ok(Self { mean, variance })
    }

    /// Posterior after a feedback outcome
    pub fn observe(&self, outcome: Outcome, observation_variance: f64) -> Result<Self> {
        self.update(outcome.observation(), observation_variance)
    }

    /// Standard deviation
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    /// Confidence discounted by uncertainty: `mean * (1 - sqrt(variance))`
    pub fn confidence_score(&self) -> f64 {
        self.mean * (1.0 - self.std_dev())
    }
}

/// Outcome of applying a habit or pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Worked as intended
    Success,
    /// Helped somewhat
    Partial,
    /// Did not help
    Failure,
}

impl Outcome {
    /// Observation value fed into the belief update
    pub fn observation(&self) -> f64 {
        match self {
            Outcome::Success => 0.8,
            Outcome::Partial => 0.5,
            Outcome::Failure => 0.2,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Outcome::Success => "success",
            Outcome::Partial => "partial",
            Outcome::Failure => "failure",
        };
        f.write_str(name)
    }
}

impl FromStr for Outcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Outcome::Success),
            "partial" => Ok(Outcome::Partial),
            "failure" => Ok(Outcome::Failure),
            other => Err(Error::InvalidParameter(format!(
                "invalid feedback '{}': expected success, partial or failure",
                other
            ))),
        }
    }
}
