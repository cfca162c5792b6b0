//! End-to-end tests for parallel tempering: a bivariate normal and a
//! quadratic negative log-likelihood target, sampled with one hot chain
//! per chain set.

use std::sync::Mutex;

use tempered_mcmc::algorithm::Sampler;
use tempered_mcmc::math;
use tempered_mcmc::metropolis::MetropolisHastings;
use tempered_mcmc::parameter::{Parameter, ParameterConfig};
use tempered_mcmc::random;
use tempered_mcmc::stats::ChainStatistics;

use ndarray::{Array2, Axis};
use ndarray_stats::CorrelationExt;

static SEED_LOCK: Mutex<()> = Mutex::new(());

fn two_param_config(error_scaling: f64) -> ParameterConfig {
    let mut config = ParameterConfig::new();
    config.set_parameter(0, Parameter::new("x1", 0.0, 1.0));
    config.set_parameter(1, Parameter::new("x2", 0.0, 1.0));
    config.set_error_scaling(error_scaling);
    config
}

fn chain_as_array(chain: &[tempered_mcmc::sample::Sample]) -> Array2<f64> {
    let mut data = Array2::zeros((chain.len(), 2));
    for (i, sample) in chain.iter().enumerate() {
        data[(i, 0)] = sample.values()[0];
        data[(i, 1)] = sample.values()[1];
    }
    data
}

#[test]
fn bivariate_normal_with_tempering() {
    let _guard = SEED_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    std::thread::spawn(|| {
        random::seed(123);

        let mut mh = MetropolisHastings::new();
        mh.set_multi_threading(false);
        mh.set_number_of_chains(3);
        mh.set_betas([1.0, 0.1]);
        mh.set_pt_frequency(10);
        mh.algorithm_mut()
            .set_parameter_config(two_param_config(5.0));
        mh.algorithm_mut()
            .set_likelihood(|x1: f64, x2: f64| {
                math::bivariate_normal_pdf(x1, x2, 0.0, 0.0, 2.0, 3.0, 0.5)
            });
        mh.algorithm_mut().set_total_length(10_000);

        mh.run().unwrap();

        assert_eq!(mh.number_of_chains(), 3);
        assert_eq!(mh.betas(), &[1.0, 0.1]);

        for i_chain in 0..3 {
            let stacked = chain_as_array(mh.chain(i_chain));
            let mean = stacked.mean_axis(Axis(0)).unwrap();
            let std = stacked.std_axis(Axis(0), 1.0);

            assert!(mean[0].abs() < 0.5, "mean x1 = {} off target", mean[0]);
            assert!(mean[1].abs() < 0.75, "mean x2 = {} off target", mean[1]);
            assert!(
                (1.5..=2.5).contains(&std[0]),
                "std x1 = {} off target",
                std[0]
            );
            assert!(
                (2.25..=3.75).contains(&std[1]),
                "std x2 = {} off target",
                std[1]
            );

            // cov(x1, x2) = rho * sigma1 * sigma2 = 3
            let cov = stacked.t().cov(1.0).unwrap();
            assert!(
                (1.5..=4.5).contains(&cov[(0, 1)]),
                "empirical covariance {} off target",
                cov[(0, 1)]
            );

            // with pt_frequency 10, every 50-step cycle proposes a swap
            let rate = mh.swap_acceptance_rate(i_chain, None);
            assert!(
                (0.02..=0.6).contains(&rate),
                "swap acceptance rate {rate} implausible"
            );
            assert_eq!(rate, mh.swap_acceptance_rate(i_chain, Some(0)));
        }

        // convergence across the three cold chains
        let mut statistics = mh.statistics();
        statistics.select_percentage_range(0.5, 1.0);
        let r = statistics.gelman_rubin();
        assert!(
            (0.8..=1.3).contains(&r),
            "Gelman-Rubin R = {r} signals divergence"
        );
    })
    .join()
    .unwrap();
}

#[test]
fn quadratic_neg_log_likelihood_with_tempering() {
    let _guard = SEED_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    std::thread::spawn(|| {
        random::seed(123);

        let mut mh = MetropolisHastings::new();
        mh.set_multi_threading(false);
        mh.set_number_of_chains(2);
        mh.set_betas([1.0, 0.1]);
        mh.algorithm_mut()
            .set_parameter_config(two_param_config(2.0));
        mh.algorithm_mut()
            .set_neg_log_likelihood(|x: f64, y: f64| 0.5 * (x * x + y * y));
        mh.algorithm_mut().set_total_length(10_000);

        mh.run().unwrap();

        for i_chain in 0..2 {
            let chain = mh.chain(i_chain);
            assert_eq!(chain.len(), 10_001);

            let mut stats = ChainStatistics::new(chain);
            let acc_rate = stats.acc_rate();
            assert!(
                (0.1..=0.5).contains(&acc_rate),
                "acceptance rate {acc_rate} implausible for error scaling 2"
            );

            let mean = stats.mean().clone();
            assert!(mean.values()[0].abs() < 0.3);
            assert!(mean.values()[1].abs() < 0.3);

            let error = stats.error().clone();
            assert!((0.75..=1.25).contains(&error[0]), "error {} off", error[0]);
            assert!((0.75..=1.25).contains(&error[1]), "error {} off", error[1]);
        }
    })
    .join()
    .unwrap();
}

#[test]
fn multi_threaded_advancement_produces_full_chains() {
    let _guard = SEED_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let mut mh = MetropolisHastings::new();
    mh.set_multi_threading(true);
    mh.set_number_of_chains(2);
    mh.set_betas([1.0, 0.5, 0.1]);
    mh.algorithm_mut()
        .set_parameter_config(two_param_config(1.0));
    mh.algorithm_mut()
        .set_neg_log_likelihood(|x: f64, y: f64| 0.5 * (x * x + y * y));
    mh.algorithm_mut().set_total_length(2_000);

    mh.run().unwrap();

    for i_chain in 0..2 {
        let chain = mh.chain(i_chain);
        assert_eq!(chain.len(), 2_001);
        for (generation, sample) in chain.iter().enumerate() {
            assert_eq!(sample.generation(), generation);
            assert!(sample.values().iter().all(|v| v.is_finite()));
        }
    }
}
