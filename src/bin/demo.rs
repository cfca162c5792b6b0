//! A small demo sampling a bivariate normal target with parallel
//! tempering, streaming the chains to text files and printing summary
//! statistics.

use std::error::Error;

use tempered_mcmc::algorithm::Sampler;
use tempered_mcmc::io::TextFileWriter;
use tempered_mcmc::math;
use tempered_mcmc::metropolis::MetropolisHastings;
use tempered_mcmc::parameter::{Parameter, ParameterConfig};
use tempered_mcmc::random;
use tempered_mcmc::stats::ChainStatistics;

/// The example likelihood: a bivariate normal distribution with
/// standard deviations (2, 3) and correlation 0.5.
fn target_function(x1: f64, x2: f64) -> f64 {
    math::bivariate_normal_pdf(x1, x2, 0.0, 0.0, 2.0, 3.0, 0.5)
}

fn main() -> Result<(), Box<dyn Error>> {
    // non-deterministic seed for the random number service
    random::seed(0);

    // the parameter configuration
    let mut param_config = ParameterConfig::new();
    param_config.set_parameter(0, Parameter::new("x1", 0.0, 1.0));
    param_config.set_parameter(1, Parameter::new("x2", 0.0, 1.0));
    param_config.set_error_scaling(5.0);

    let mut mcmc = MetropolisHastings::new();
    mcmc.algorithm_mut().set_parameter_config(param_config);

    // randomize the start points within their specified errors
    mcmc.set_randomize_start_point(true);

    // sample multiple sets of chains in parallel
    mcmc.set_number_of_chains(3);

    // enable parallel tempering with one hotter chain per set
    mcmc.set_betas([1.0, 0.1]);

    mcmc.algorithm_mut().set_likelihood(target_function);
    mcmc.algorithm_mut().set_total_length(100_000);

    mcmc.algorithm_mut()
        .add_writer(TextFileWriter::new(".", "mcmc-demo"));

    println!("Sampling a bivariate normal target with 3 chain sets ...");
    mcmc.run_progress()?;

    for i_chain in 0..mcmc.number_of_chains() {
        let mut stats = ChainStatistics::new(mcmc.chain(i_chain));
        // discard the first half as burn-in
        stats.select_percentage_range(0.5, 1.0);

        let mean = stats.mean().clone();
        let error = stats.error().clone();
        println!(
            "Chain {}: mean = ({:.3}, {:.3}), error = ({:.3}, {:.3}), acceptance = {:.3}",
            i_chain,
            mean.values()[0],
            mean.values()[1],
            error[0],
            error[1],
            stats.acc_rate()
        );
        println!(
            "Chain {}: PT swap acceptance = {:.3}",
            i_chain,
            mcmc.swap_acceptance_rate(i_chain, None)
        );
    }

    println!("Wrote chains to mcmc-demo-XX.txt");

    Ok(())
}
