/*!
# tempered-mcmc

A Markov-chain Monte-Carlo sampling library built around a
Metropolis-Hastings sampler with parallel tempering.

The caller describes the parameter space with a
[`parameter::ParameterConfig`] (per-parameter start values, errors,
limits and a joint correlation matrix), attaches a likelihood or
negative log-likelihood to a [`metropolis::MetropolisHastings`] sampler,
and runs it. Tempered chains advance concurrently on a rayon worker
pool, occasionally swapping their states, and accepted samples stream to
the attached [`io::Writer`]s. After a run, [`stats::ChainStatistics`]
provides moments, autocorrelation and convergence diagnostics over the
sampled chains.

```no_run
use tempered_mcmc::algorithm::Sampler;
use tempered_mcmc::metropolis::MetropolisHastings;
use tempered_mcmc::parameter::{Parameter, ParameterConfig};

let mut config = ParameterConfig::new();
config.set_parameter(0, Parameter::new("x", 0.0, 1.0));

let mut mcmc = MetropolisHastings::new();
mcmc.algorithm_mut().set_parameter_config(config);
mcmc.algorithm_mut()
    .set_likelihood(|x: f64| (-0.5 * x * x).exp());
mcmc.algorithm_mut().set_total_length(10_000);

mcmc.run().unwrap();
println!("sampled {} points", mcmc.chain(0).len());
```
*/

pub mod algorithm;
pub mod error;
pub mod io;
pub mod linalg;
pub mod math;
pub mod metropolis;
pub mod parameter;
pub mod proposal;
pub mod random;
pub mod sample;
pub mod stats;
