/*!
# Proposal kernels

A [`Proposal`] generates the next candidate point of a Metropolis-Hastings
chain from the current one and reports the asymmetry ratio
`q(prev|next) / q(next|prev)` of the transition.

The Metropolis core holds one prototype proposal and deep-copies it for
every tempered chain via [`Proposal::clone_boxed`]; each clone caches the
Cholesky factor of its (rescaled) parameter configuration. Proposals never
apply limit reflection themselves; the sampler does that after the
transition.
*/

use rand_distr::{Normal, StudentT};

use crate::linalg::Matrix;
use crate::parameter::ParameterConfig;
use crate::random;
use crate::sample::Sample;

/// Transition kernel contract for Metropolis-Hastings samplers.
pub trait Proposal: Send {
    /// Deep copy, used to give every tempered chain its own kernel.
    fn clone_boxed(&self) -> Box<dyn Proposal>;

    /// Cache whatever the kernel derives from the parameter
    /// configuration (typically the Cholesky factor of its covariance).
    fn update_parameter_config(&mut self, param_config: &ParameterConfig);

    /// Propose a new state: write the candidate point into
    /// `next.values()` and return the asymmetry ratio (1.0 for symmetric
    /// kernels).
    fn transition(&mut self, prev: &Sample, next: &mut Sample) -> f64;
}

impl Clone for Box<dyn Proposal> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

/// Multivariate normal random walk driven by the parameter Cholesky
/// factor.
#[derive(Debug, Clone)]
pub struct ProposalNormal {
    cholesky: Matrix,
}

impl Default for ProposalNormal {
    fn default() -> Self {
        Self::new()
    }
}

impl ProposalNormal {
    pub fn new() -> Self {
        Self {
            cholesky: Matrix::zeros(0, 0),
        }
    }

    pub fn cholesky(&self) -> &Matrix {
        &self.cholesky
    }
}

impl Proposal for ProposalNormal {
    fn clone_boxed(&self) -> Box<dyn Proposal> {
        Box::new(self.clone())
    }

    fn update_parameter_config(&mut self, param_config: &ParameterConfig) {
        self.cholesky = param_config.cholesky_decomp();
    }

    fn transition(&mut self, prev: &Sample, next: &mut Sample) -> f64 {
        debug_assert_eq!(prev.values().len(), self.cholesky.nrows());

        let dist = Normal::new(0.0, 1.0).expect("standard normal");
        next.set_values(random::from_multivariate(&dist, prev.values(), &self.cholesky));

        1.0
    }
}

/// Multivariate Student-T random walk. Heavier tails than
/// [`ProposalNormal`], useful for multimodal targets.
#[derive(Debug, Clone)]
pub struct ProposalStudentT {
    dof: f64,
    cholesky: Matrix,
}

impl ProposalStudentT {
    pub fn new(dof: f64) -> Self {
        Self {
            dof,
            cholesky: Matrix::zeros(0, 0),
        }
    }

    pub fn dof(&self) -> f64 {
        self.dof
    }

    pub fn set_dof(&mut self, dof: f64) {
        self.dof = dof;
    }
}

impl Default for ProposalStudentT {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Proposal for ProposalStudentT {
    fn clone_boxed(&self) -> Box<dyn Proposal> {
        Box::new(self.clone())
    }

    fn update_parameter_config(&mut self, param_config: &ParameterConfig) {
        self.cholesky = param_config.cholesky_decomp();
    }

    fn transition(&mut self, prev: &Sample, next: &mut Sample) -> f64 {
        debug_assert_eq!(prev.values().len(), self.cholesky.nrows());

        let dist = StudentT::new(self.dof).expect("student-t degrees of freedom");
        next.set_values(random::from_multivariate(&dist, prev.values(), &self.cholesky));

        1.0
    }
}
