/*!
# Metropolis-Hastings sampler with parallel tempering

[`MetropolisHastings`] advances one or more logical chain slots. Each
slot expands into one chain per inverse temperature β: the β = 1 "cold"
chain samples the target distribution and is the slot's published result,
while chains with β < 1 sample flattened versions of it with
proportionally widened proposals. After every advancement cycle, adjacent
tempered chains may swap their current samples, letting cold chains
escape local modes.

Every tempered chain owns a rescaled copy of the parameter configuration
and a clone of the prototype proposal, so chains can be advanced on a
rayon worker pool without any locking; only the cycle boundary
synchronizes them.
*/

use log::{debug, info};
use rayon::prelude::*;

use crate::algorithm::{finalize_diagnostics, Algorithm, Sampler};
use crate::error::Result;
use crate::parameter::ParameterConfig;
use crate::proposal::{Proposal, ProposalNormal};
use crate::random;
use crate::sample::{Chain, Sample};
use crate::stats::ChainStatistics;

/// One logical chain slot: a family of tempered chains with their
/// rescaled parameter configurations, proposal clones and swap counters.
struct ChainConfig {
    pt_chains: Vec<Chain>,
    param_configs: Vec<ParameterConfig>,
    proposals: Vec<Box<dyn Proposal>>,
    proposed_swaps: Vec<u64>,
    accepted_swaps: Vec<u64>,
}

/// Metropolis-Hastings sampler over tempered chain sets.
pub struct MetropolisHastings {
    algorithm: Algorithm,
    randomize_start_point: bool,
    betas: Vec<f64>,
    pt_frequency: usize,
    proposal: Box<dyn Proposal>,
    multi_threading: bool,
    n_chain_configs: usize,
    chain_configs: Vec<ChainConfig>,
}

impl Default for MetropolisHastings {
    fn default() -> Self {
        Self::new()
    }
}

impl MetropolisHastings {
    pub fn new() -> Self {
        Self {
            algorithm: Algorithm::default(),
            randomize_start_point: false,
            betas: vec![1.0],
            pt_frequency: 200,
            proposal: Box::new(ProposalNormal::new()),
            multi_threading: true,
            n_chain_configs: 1,
            chain_configs: Vec::new(),
        }
    }

    /// Number of logical chain slots (each expands into one chain per
    /// β). Minimum 1.
    pub fn set_number_of_chains(&mut self, n_chains: usize) {
        self.n_chain_configs = n_chains.max(1);
    }

    /**
    Set the inverse temperatures.

    The cold chain (β = 1) is always present; of the given values only
    those below 1 are kept (they flatten the distribution), sorted in
    decreasing order. Index 0 is therefore always the cold sampled chain.
    */
    pub fn set_betas(&mut self, betas: impl IntoIterator<Item = f64>) {
        self.betas = vec![1.0];
        self.betas.extend(betas.into_iter().filter(|&beta| beta < 1.0));
        self.betas
            .sort_by(|a, b| b.partial_cmp(a).expect("beta values must be comparable"));
    }

    pub fn betas(&self) -> &[f64] {
        &self.betas
    }

    /// Expected number of steps between swap attempts per chain set.
    pub fn set_pt_frequency(&mut self, pt_frequency: usize) {
        self.pt_frequency = pt_frequency;
    }

    /// Replace the prototype proposal (a multivariate normal by
    /// default). It is cloned once per tempered chain at initialization.
    pub fn set_proposal_function(&mut self, proposal: impl Proposal + 'static) {
        self.proposal = Box::new(proposal);
    }

    /// Perturb each chain's start point by one draw from the parameter
    /// covariance.
    pub fn set_randomize_start_point(&mut self, randomize: bool) {
        self.randomize_start_point = randomize;
    }

    /// Advance the tempered chains on the rayon worker pool. Disable for
    /// deterministic sequential iteration.
    pub fn set_multi_threading(&mut self, enable: bool) {
        self.multi_threading = enable;
    }

    pub fn is_multi_threading(&self) -> bool {
        self.multi_threading
    }

    /**
    Metropolis-Hastings acceptance probability for a transition from
    `prev` to `next`:

    `min(1, asymmetry · prior'/prior · exp(β · (nlL - nlL')))`

    A vanishing prior of the proposed state yields 0.
    */
    pub fn mh_ratio(prev: &Sample, next: &Sample, proposal_asymmetry: f64, beta: f64) -> f64 {
        if next.prior() == 0.0 {
            return 0.0;
        }

        (proposal_asymmetry * next.prior() / prev.prior()
            * (beta * (prev.neg_log_likelihood() - next.neg_log_likelihood())).exp())
        .min(1.0)
    }

    /**
    Swap acceptance rate of chain set `i_chain_config`.

    With `i_beta = Some(b)`, the rate of swaps between the chains at β
    index `b` and `b + 1`; with `None`, the pooled rate over all adjacent
    pairs. 0.0 when nothing was proposed yet.
    */
    pub fn swap_acceptance_rate(&self, i_chain_config: usize, i_beta: Option<usize>) -> f64 {
        let Some(chain_config) = self.chain_configs.get(i_chain_config) else {
            return 0.0;
        };

        let (accepted, proposed) = match i_beta {
            Some(i_beta) => {
                if i_beta >= chain_config.accepted_swaps.len() {
                    return 0.0;
                }
                (
                    chain_config.accepted_swaps[i_beta],
                    chain_config.proposed_swaps[i_beta],
                )
            }
            None => (
                chain_config.accepted_swaps.iter().sum(),
                chain_config.proposed_swaps.iter().sum(),
            ),
        };

        if proposed == 0 {
            0.0
        } else {
            accepted as f64 / proposed as f64
        }
    }

    /// All tempered chains of one chain set, coldest first.
    pub fn tempered_chains(&self, i_chain_config: usize) -> &[Chain] {
        &self.chain_configs[i_chain_config].pt_chains
    }
}

/// Advance a single tempered chain by `n_steps`.
fn advance_chain(
    algorithm: &Algorithm,
    param_config: &ParameterConfig,
    proposal: &mut dyn Proposal,
    chain: &mut Chain,
    beta: f64,
    n_steps: usize,
) {
    debug_assert!(!chain.is_empty(), "chain has no starting point");

    for _ in 0..n_steps {
        let previous_state = chain.last().expect("chain has a starting point").clone();

        // prepare the upcoming sample
        let mut next_state = previous_state.clone();
        next_state.increment_generation();
        next_state.reset();

        // propose the next point in the parameter space
        let proposal_asymmetry = proposal.transition(&previous_state, &mut next_state);

        // attempt reflection if limits are exceeded
        param_config.reflect_from_limits(next_state.values_mut().as_mut_slice());

        algorithm.evaluate(&mut next_state);

        let mh_ratio =
            MetropolisHastings::mh_ratio(&previous_state, &next_state, proposal_asymmetry, beta);

        if random::draw_bool(mh_ratio) {
            next_state.set_accepted(true);
            chain.push(next_state);
        } else {
            let mut next_state = previous_state;
            next_state.set_accepted(false);
            next_state.increment_generation();
            chain.push(next_state);
        }
    }
}

/// Attempt one swap between a random adjacent pair of tempered chains.
fn propose_pt_swap(chain_config: &mut ChainConfig, betas: &[f64]) {
    if betas.len() < 2 {
        return;
    }

    // randomly pick 2 adjacent chains
    let colder_index = random::uniform_int(0_usize, betas.len() - 2);
    let warmer_index = colder_index + 1;

    let colder_beta = betas[colder_index];
    let warmer_beta = betas[warmer_index];

    let colder_neg_log_l = chain_config.pt_chains[colder_index]
        .last()
        .expect("chain has samples")
        .neg_log_likelihood();
    let warmer_neg_log_l = chain_config.pt_chains[warmer_index]
        .last()
        .expect("chain has samples")
        .neg_log_likelihood();

    let pt_ratio = (colder_beta * (colder_neg_log_l - warmer_neg_log_l)
        + warmer_beta * (warmer_neg_log_l - colder_neg_log_l))
        .exp()
        .min(1.0);

    chain_config.proposed_swaps[colder_index] += 1;

    if random::draw_bool(pt_ratio) {
        debug!(
            "Tempered chains {} and {} swapped their current samples.",
            colder_index, warmer_index
        );

        let (colder, warmer) = chain_config.pt_chains.split_at_mut(warmer_index);
        std::mem::swap(
            colder[colder_index].last_mut().expect("chain has samples"),
            warmer[0].last_mut().expect("chain has samples"),
        );

        chain_config.accepted_swaps[colder_index] += 1;
    }
}

impl Sampler for MetropolisHastings {
    fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    fn algorithm_mut(&mut self) -> &mut Algorithm {
        &mut self.algorithm
    }

    fn initialize(&mut self) -> Result<()> {
        if self.betas.is_empty() {
            self.betas = vec![1.0];
        }
        let n_betas = self.betas.len();

        let algorithm = &self.algorithm;
        let base_config = algorithm.parameter_config();

        // global start point in parameter space
        let mut start_point = Sample::from_values(base_config.start_values(false));
        algorithm.evaluate(&mut start_point);
        start_point.set_accepted(true);

        let chain_configs: Vec<ChainConfig> = (0..self.n_chain_configs)
            .map(|_| {
                // for each tempered chain, an individually rescaled
                // parameter configuration and its own proposal clone
                let initial_error_scaling = base_config.error_scaling();
                let param_configs: Vec<ParameterConfig> = self
                    .betas
                    .iter()
                    .enumerate()
                    .map(|(i_beta, &beta)| {
                        let mut config = base_config.clone();
                        if i_beta > 0 {
                            config.set_error_scaling(initial_error_scaling / beta.sqrt());
                        }
                        config
                    })
                    .collect();

                let proposals: Vec<Box<dyn Proposal>> = param_configs
                    .iter()
                    .map(|config| {
                        let mut proposal = self.proposal.clone_boxed();
                        proposal.update_parameter_config(config);
                        proposal
                    })
                    .collect();

                let pt_chains: Vec<Chain> = (0..n_betas)
                    .map(|_| {
                        let mut start = start_point.clone();
                        if self.randomize_start_point {
                            start.set_values(base_config.start_values(true));
                            algorithm.evaluate(&mut start);
                            start.set_accepted(true);
                        }

                        let mut chain = Chain::with_capacity(algorithm.total_length() + 1);
                        chain.push(start);
                        chain
                    })
                    .collect();

                ChainConfig {
                    pt_chains,
                    param_configs,
                    proposals,
                    proposed_swaps: vec![0; n_betas - 1],
                    accepted_swaps: vec![0; n_betas - 1],
                }
            })
            .collect();
        self.chain_configs = chain_configs;

        Ok(())
    }

    /**
    Advance every tempered chain of every chain set by `n_steps`.

    With multi-threading enabled, the (chain set × β) cross product is
    mapped onto rayon tasks, each owning exactly one chain's state.
    Afterwards, each chain set independently attempts one sample swap
    between a random adjacent pair of tempered chains with probability
    `n_steps / pt_frequency`.
    */
    fn advance(&mut self, n_steps: usize) {
        let algorithm = &self.algorithm;
        let betas = &self.betas;

        if self.multi_threading {
            self.chain_configs.par_iter_mut().for_each(|chain_config| {
                let ChainConfig {
                    pt_chains,
                    param_configs,
                    proposals,
                    ..
                } = chain_config;
                let param_configs: &[ParameterConfig] = param_configs;

                pt_chains
                    .par_iter_mut()
                    .zip(proposals.par_iter_mut())
                    .enumerate()
                    .for_each(|(i_beta, (chain, proposal))| {
                        advance_chain(
                            algorithm,
                            &param_configs[i_beta],
                            proposal.as_mut(),
                            chain,
                            betas[i_beta],
                            n_steps,
                        );
                    });
            });
        } else {
            for chain_config in &mut self.chain_configs {
                for i_beta in 0..betas.len() {
                    advance_chain(
                        algorithm,
                        &chain_config.param_configs[i_beta],
                        chain_config.proposals[i_beta].as_mut(),
                        &mut chain_config.pt_chains[i_beta],
                        betas[i_beta],
                        n_steps,
                    );
                }
            }
        }

        if betas.len() < 2 {
            return;
        }

        // propose sample swaps between tempered chains in each chain set
        let swap_probability = n_steps as f64 / self.pt_frequency as f64;

        for chain_config in &mut self.chain_configs {
            if random::draw_bool(swap_probability) {
                propose_pt_swap(chain_config, betas);
            }
        }
    }

    fn finalize(&mut self) {
        if self.betas.len() < 2 {
            info!("No parallel tempering.");
        } else {
            for (i_config, chain_config) in self.chain_configs.iter().enumerate() {
                let acc_rates: Vec<f64> = chain_config
                    .pt_chains
                    .iter()
                    .map(|chain| ChainStatistics::new(chain).acc_rate())
                    .collect();
                info!(
                    "Metropolis acceptance rates in chain set {}: {:?}",
                    i_config, acc_rates
                );

                let swap_rates: Vec<f64> = (0..self.betas.len() - 1)
                    .map(|i_beta| self.swap_acceptance_rate(i_config, Some(i_beta)))
                    .collect();
                info!(
                    "PT swap acceptance rates in chain set {}: {:?}",
                    i_config, swap_rates
                );
            }
        }

        finalize_diagnostics(self);
    }

    fn number_of_chains(&self) -> usize {
        self.chain_configs.len()
    }

    /// The cold (β = 1) chain of the given chain set.
    fn chain(&self, index: usize) -> &Chain {
        let chain_config = &self.chain_configs[index];
        debug_assert!(!chain_config.pt_chains.is_empty());

        &chain_config.pt_chains[0]
    }
}
