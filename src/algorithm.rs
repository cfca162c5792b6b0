/*!
# Algorithm base

[`Algorithm`] carries the state every MCMC sampler shares: the parameter
configuration, the target functions (prior, likelihood or negative
log-likelihood), the run length, and the output writers. Concrete
samplers embed it and implement the [`Sampler`] trait, whose provided
[`Sampler::run`] method drives the sampling in cycles: advance all chains
by one cycle, stream the newly appended samples to every writer, log
progress, and finally compute the end-of-run diagnostics.

Target functions are vector-taking callables `Fn(&[f64]) -> f64`. Fixed
arity closures are adapted via [`IntoTargetFn`], which indexes the first
`N` slots of the parameter vector:

```
use tempered_mcmc::algorithm::Algorithm;

let mut algorithm = Algorithm::default();
algorithm.set_likelihood(|x: f64, y: f64| (-0.5 * (x * x + y * y)).exp());
algorithm.set_prior(|v: &[f64]| if v[0] > 0.0 { 1.0 } else { 0.0 });
```
*/

use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};

use crate::error::{Error, Result};
use crate::io::Writer;
use crate::linalg::format_vector;
use crate::parameter::ParameterConfig;
use crate::sample::{Chain, Sample};
use crate::stats::{ChainSetStatistics, ChainStatistics};

/// Type-erased target function over the parameter vector.
pub type TargetFn = Box<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// Marker for the vector-taking [`IntoTargetFn`] impl.
pub struct VectorTarget;

/// Marker for the fixed-arity [`IntoTargetFn`] impls.
pub struct ArityTarget<const N: usize>;

/// Conversion of user callables into [`TargetFn`].
///
/// Implemented for `Fn(&[f64]) -> f64` and for fixed-arity functions of
/// one to eight `f64` arguments, which are applied to the first `N`
/// entries of the parameter vector. The `Marker` parameter only serves to
/// keep the impls coherent; inference picks it up from the callable.
pub trait IntoTargetFn<Marker> {
    fn into_target_fn(self) -> TargetFn;
}

impl<F> IntoTargetFn<VectorTarget> for F
where
    F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
{
    fn into_target_fn(self) -> TargetFn {
        Box::new(self)
    }
}

macro_rules! replace_ty {
    ($idx:tt) => {
        f64
    };
}

macro_rules! impl_into_target_fn {
    ($n:literal => $($idx:tt),+) => {
        impl<F> IntoTargetFn<ArityTarget<$n>> for F
        where
            F: Fn($(replace_ty!($idx)),+) -> f64 + Send + Sync + 'static,
        {
            fn into_target_fn(self) -> TargetFn {
                Box::new(move |v: &[f64]| self($(v[$idx]),+))
            }
        }
    };
}

impl_into_target_fn!(1 => 0);
impl_into_target_fn!(2 => 0, 1);
impl_into_target_fn!(3 => 0, 1, 2);
impl_into_target_fn!(4 => 0, 1, 2, 3);
impl_into_target_fn!(5 => 0, 1, 2, 3, 4);
impl_into_target_fn!(6 => 0, 1, 2, 3, 4, 5);
impl_into_target_fn!(7 => 0, 1, 2, 3, 4, 5, 6);
impl_into_target_fn!(8 => 0, 1, 2, 3, 4, 5, 6, 7);

/// Shared state of MCMC sampling algorithms.
pub struct Algorithm {
    parameter_config: ParameterConfig,
    prior: Option<TargetFn>,
    likelihood: Option<TargetFn>,
    neg_log_likelihood: Option<TargetFn>,
    total_length: usize,
    cycle_length: usize,
    writers: Vec<Box<dyn Writer>>,
}

impl Default for Algorithm {
    fn default() -> Self {
        Self {
            parameter_config: ParameterConfig::new(),
            prior: None,
            likelihood: None,
            neg_log_likelihood: None,
            total_length: 1_000_000,
            cycle_length: 50,
            writers: Vec::new(),
        }
    }
}

impl Algorithm {
    pub fn parameter_config(&self) -> &ParameterConfig {
        &self.parameter_config
    }

    pub fn set_parameter_config(&mut self, param_config: ParameterConfig) {
        self.parameter_config = param_config;
    }

    /// Set the prior. Orthogonal to the likelihood targets.
    pub fn set_prior<M>(&mut self, prior: impl IntoTargetFn<M>) {
        self.prior = Some(prior.into_target_fn());
    }

    /// Set the likelihood target; clears a previously set negative
    /// log-likelihood.
    pub fn set_likelihood<M>(&mut self, likelihood: impl IntoTargetFn<M>) {
        self.likelihood = Some(likelihood.into_target_fn());
        self.neg_log_likelihood = None;
    }

    /// Set the negative log-likelihood target; clears a previously set
    /// likelihood.
    pub fn set_neg_log_likelihood<M>(&mut self, neg_log_likelihood: impl IntoTargetFn<M>) {
        self.likelihood = None;
        self.neg_log_likelihood = Some(neg_log_likelihood.into_target_fn());
    }

    pub fn has_target_function(&self) -> bool {
        self.likelihood.is_some() || self.neg_log_likelihood.is_some()
    }

    pub fn total_length(&self) -> usize {
        self.total_length
    }

    /// Total number of sampling steps per chain.
    pub fn set_total_length(&mut self, length: usize) {
        self.total_length = length;
    }

    pub fn cycle_length(&self) -> usize {
        self.cycle_length
    }

    /// Number of steps between writer fan-outs and swap proposals.
    /// Clamped into `[1, total_length]` when a run starts.
    pub fn set_cycle_length(&mut self, length: usize) {
        self.cycle_length = length;
    }

    /// Attach an output writer. Writers receive every chain's newly
    /// appended samples once per cycle.
    pub fn add_writer(&mut self, writer: impl Writer + 'static) {
        self.writers.push(Box::new(writer));
    }

    /// Evaluate the prior at the given point (1.0 if no prior was set,
    /// 0.0 outside the parameter limits).
    pub fn evaluate_prior(&self, values: &[f64]) -> f64 {
        if !self.parameter_config.is_inside_limits(values) {
            return 0.0;
        }
        match &self.prior {
            Some(prior) => prior(values),
            None => 1.0,
        }
    }

    /// Evaluate the likelihood at the given point.
    pub fn evaluate_likelihood(&self, values: &[f64]) -> f64 {
        debug_assert!(self.has_target_function(), "no target function specified");

        match (&self.likelihood, &self.neg_log_likelihood) {
            (Some(likelihood), _) => likelihood(values),
            (None, Some(neg_log_likelihood)) => (-neg_log_likelihood(values)).exp(),
            (None, None) => 0.0,
        }
    }

    /// Evaluate the negative log-likelihood at the given point.
    pub fn evaluate_neg_log_likelihood(&self, values: &[f64]) -> f64 {
        debug_assert!(self.has_target_function(), "no target function specified");

        match (&self.neg_log_likelihood, &self.likelihood) {
            (Some(neg_log_likelihood), _) => neg_log_likelihood(values),
            (None, Some(likelihood)) => -likelihood(values).ln(),
            (None, None) => f64::INFINITY,
        }
    }

    /**
    Evaluate prior, likelihood and negative log-likelihood at the
    sample's position and update the sample accordingly.

    Returns `false` (leaving the sample in its reset state) if the point
    lies outside the parameter limits or the prior vanishes.
    */
    pub fn evaluate(&self, sample: &mut Sample) -> bool {
        debug_assert!(self.has_target_function(), "no target function specified");

        sample.reset();

        if !self.parameter_config.is_inside_limits(sample.values().as_slice()) {
            return false;
        }

        let prior = match &self.prior {
            Some(prior) => prior(sample.values().as_slice()),
            None => 1.0,
        };
        if prior == 0.0 {
            return false;
        }
        sample.set_prior(prior);

        if let Some(likelihood) = &self.likelihood {
            let value = likelihood(sample.values().as_slice());
            sample.set_likelihood(value);
            sample.set_neg_log_likelihood(-value.ln());
        } else if let Some(neg_log_likelihood) = &self.neg_log_likelihood {
            let value = neg_log_likelihood(sample.values().as_slice());
            sample.set_neg_log_likelihood(value);
            sample.set_likelihood((-value).exp());
        }

        true
    }
}

/// Hooks implemented by concrete samplers on top of [`Algorithm`], plus
/// the provided run loop.
pub trait Sampler {
    fn algorithm(&self) -> &Algorithm;
    fn algorithm_mut(&mut self) -> &mut Algorithm;

    /// Sampler-specific setup, invoked once after the base configuration
    /// has been validated.
    fn initialize(&mut self) -> Result<()>;

    /// Advance every chain by `n_steps`.
    fn advance(&mut self, n_steps: usize);

    /// End-of-run reporting. The default prints the per-chain statistics
    /// and the Gelman-Rubin diagnostic.
    fn finalize(&mut self) {
        finalize_diagnostics(self);
    }

    /// Number of (cold) chains this sampler samples.
    fn number_of_chains(&self) -> usize;

    /// The sampled chain with the given index.
    fn chain(&self, index: usize) -> &Chain;

    /// Statistics over all sampled chains.
    fn statistics(&self) -> ChainSetStatistics<'_> {
        let mut statistics = ChainSetStatistics::new();
        for index in 0..self.number_of_chains() {
            statistics.add_chain(self.chain(index));
        }
        statistics
    }

    /// Run the sampler for its total length.
    fn run(&mut self) -> Result<()>
    where
        Self: Sized,
    {
        run_sampler(self, false)
    }

    /// Like [`Sampler::run`], with a progress bar on the terminal.
    fn run_progress(&mut self) -> Result<()>
    where
        Self: Sized,
    {
        run_sampler(self, true)
    }
}

fn run_sampler<S: Sampler>(sampler: &mut S, show_progress: bool) -> Result<()> {
    {
        let algorithm = sampler.algorithm_mut();

        if !algorithm.has_target_function() {
            return Err(Error::NoTargetFunction);
        }
        if algorithm.parameter_config.is_empty() {
            return Err(Error::EmptyParameterConfig);
        }
        algorithm.parameter_config.validate()?;

        algorithm.cycle_length = algorithm
            .cycle_length
            .clamp(1, algorithm.total_length.max(1));
    }

    sampler.initialize()?;

    let n_chains = sampler.number_of_chains();

    // Writers are taken out of the algorithm for the duration of the run,
    // so the chains can be borrowed while samples are streamed out.
    let mut writers = std::mem::take(&mut sampler.algorithm_mut().writers);
    for writer in &mut writers {
        if let Err(e) = writer.initialize(n_chains, sampler.algorithm().parameter_config()) {
            error!("Writer initialization failed: {e}");
        }
    }

    for i_chain in 0..n_chains {
        if let Some(sample) = sampler.chain(i_chain).last() {
            info!("Chain {} starting point: {}", i_chain, sample);
        }
    }

    let total_length = sampler.algorithm().total_length;
    let cycle_length = sampler.algorithm().cycle_length;
    let n_cycles = total_length / cycle_length;

    let progress = show_progress.then(|| {
        let bar = ProgressBar::new(total_length as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .expect("valid progress template")
                .progress_chars("##-"),
        );
        bar
    });

    // per-chain count of samples already streamed to the writers
    let mut written = vec![0_usize; n_chains];

    for i_cycle in 0..=n_cycles {
        let n_steps = if i_cycle < n_cycles {
            cycle_length
        } else {
            total_length % cycle_length
        };
        if n_steps == 0 {
            continue;
        }

        sampler.advance(n_steps);

        for i_chain in 0..n_chains {
            let chain = sampler.chain(i_chain);
            for writer in &mut writers {
                if let Err(e) = writer.write(i_chain, chain, written[i_chain]) {
                    error!("Writer failed on chain {}: {}", i_chain, e);
                }
            }
            written[i_chain] = chain.len();
        }

        if let Some(bar) = &progress {
            bar.inc(n_steps as u64);
        }

        // intermediate logging in 5% increments
        if n_cycles >= 20 && i_cycle < n_cycles && (i_cycle + 1) % (n_cycles / 20) == 0 {
            let i_step = (i_cycle + 1) * cycle_length;
            for i_chain in 0..n_chains {
                if let Some(sample) = sampler.chain(i_chain).last() {
                    info!(
                        "Chain {}, step {} ({}%): {}",
                        i_chain,
                        i_step,
                        (i_cycle + 1) * 100 / n_cycles,
                        sample
                    );
                }
            }
        }
    }

    if let Some(bar) = &progress {
        bar.finish_with_message("Done!");
    }

    sampler.finalize();

    for writer in &mut writers {
        if let Err(e) = writer.finalize() {
            error!("Writer finalization failed: {e}");
        }
    }
    sampler.algorithm_mut().writers = writers;

    info!("MCMC run finished.");

    Ok(())
}

/// Default end-of-run report: per-chain statistics and, with more than
/// one chain, the Gelman-Rubin diagnostic over the second half of the
/// samples.
pub fn finalize_diagnostics<S: Sampler + ?Sized>(sampler: &S) {
    let n_chains = sampler.number_of_chains();
    let n_params = sampler.algorithm().parameter_config().len();

    for i_chain in 0..n_chains {
        let mut stats = ChainStatistics::new(sampler.chain(i_chain));

        info!("Diagnostics for chain {}:", i_chain);
        info!("  Acceptance rate: {}", stats.acc_rate());
        info!("  Mode: {}", stats.mode());

        let mut mean = stats.mean().clone();
        sampler.algorithm().evaluate(&mut mean);
        info!("  Mean: {}", mean);

        for i_param in 0..n_params {
            let median = stats.median(i_param);
            let interval = stats.confidence_interval(i_param, median, 0.682689);
            info!(
                "  Param {} median: {} (1 sigma interval: {} .. {})",
                i_param, median, interval.0, interval.1
            );
        }

        info!("  Variance: {}", format_vector(stats.variance()));
        info!("  Error: {}", format_vector(stats.error()));
        info!("  Rms: {}", format_vector(stats.rms()));
        info!(
            "  Autocorrelation time: {}",
            format_vector(&stats.autocorrelation_time())
        );
    }

    if n_chains >= 2 {
        let mut statistics = ChainSetStatistics::new();
        for i_chain in 0..n_chains {
            statistics.add_chain(sampler.chain(i_chain));
        }
        statistics.select_percentage_range(0.5, 1.0);
        info!(
            "Gelman-Rubin diagnostic over the 2nd half of samples: R = {}",
            statistics.gelman_rubin()
        );
    }
}
