/*!
# Samples and chains

A [`Sample`] is one node in a Markov chain: the point in parameter space
plus the generation at which it was drawn and the target values evaluated
there (prior, likelihood, negative log-likelihood) and whether the step
that produced it was accepted.

A [`Chain`] is the generation-ordered sequence of samples produced by one
sampler at one temperature.
*/

use std::fmt;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

use crate::linalg::Vector;

/// An ordered sequence of samples, indexed by generation.
pub type Chain = Vec<Sample>;

/// One data point sampled from the target parameter space.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    generation: usize,
    values: Vector,
    likelihood: f64,
    neg_log_likelihood: f64,
    prior: f64,
    accepted: bool,
}

impl Sample {
    /// A zero-valued sample with `n_params` parameters and default
    /// (unevaluated) target values.
    pub fn new(n_params: usize) -> Self {
        Self::from_values(Vector::zeros(n_params))
    }

    /// Wrap a parameter vector into an unevaluated sample.
    pub fn from_values(values: Vector) -> Self {
        Self {
            generation: 0,
            values,
            likelihood: 0.0,
            neg_log_likelihood: f64::NEG_INFINITY,
            prior: 0.0,
            accepted: false,
        }
    }

    /// Reset likelihood, negative log-likelihood, prior and the accepted
    /// flag to their defaults. Values and generation are preserved.
    pub fn reset(&mut self) {
        self.likelihood = 0.0;
        self.neg_log_likelihood = f64::NEG_INFINITY;
        self.prior = 0.0;
        self.accepted = false;
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn set_generation(&mut self, generation: usize) {
        self.generation = generation;
    }

    /// Advance the generation index by one, returning the new value.
    pub fn increment_generation(&mut self) -> usize {
        self.generation += 1;
        self.generation
    }

    pub fn values(&self) -> &Vector {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Vector {
        &mut self.values
    }

    pub fn set_values(&mut self, values: Vector) {
        self.values = values;
    }

    pub fn likelihood(&self) -> f64 {
        self.likelihood
    }

    pub fn set_likelihood(&mut self, value: f64) {
        self.likelihood = value;
    }

    pub fn neg_log_likelihood(&self) -> f64 {
        self.neg_log_likelihood
    }

    pub fn set_neg_log_likelihood(&mut self, value: f64) {
        self.neg_log_likelihood = value;
    }

    pub fn prior(&self) -> f64 {
        self.prior
    }

    pub fn set_prior(&mut self, value: f64) {
        self.prior = value;
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn set_accepted(&mut self, accepted: bool) {
        self.accepted = accepted;
    }
}

impl From<Vec<f64>> for Sample {
    fn from(values: Vec<f64>) -> Self {
        Self::from_values(Vector::from_vec(values))
    }
}

// Arithmetic acts on the parameter values only. Any derived target value
// would be stale afterwards, so it is reset.

impl AddAssign<&Sample> for Sample {
    fn add_assign(&mut self, other: &Sample) {
        self.values += &other.values;
        self.reset();
    }
}

impl SubAssign<&Sample> for Sample {
    fn sub_assign(&mut self, other: &Sample) {
        self.values -= &other.values;
        self.reset();
    }
}

impl MulAssign<f64> for Sample {
    fn mul_assign(&mut self, factor: f64) {
        self.values *= factor;
        self.reset();
    }
}

impl DivAssign<f64> for Sample {
    fn div_assign(&mut self, factor: f64) {
        self.values /= factor;
        self.reset();
    }
}

impl fmt::Display for Sample {
    /// Renders as `[n](v0, v1, …) prior (likelihood, negLogLikelihood)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}, {})",
            crate::linalg::format_vector(&self.values),
            self.prior,
            self.likelihood,
            self.neg_log_likelihood
        )
    }
}
