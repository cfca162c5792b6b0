//! Configuration errors abort a run before any sampling occurs.

use tempered_mcmc::algorithm::Sampler;
use tempered_mcmc::error::Error;
use tempered_mcmc::metropolis::MetropolisHastings;
use tempered_mcmc::parameter::{Parameter, ParameterConfig};

#[test]
fn run_without_target_function_fails() {
    let mut config = ParameterConfig::new();
    config.set_parameter(0, Parameter::new("x", 0.0, 1.0));

    let mut mh = MetropolisHastings::new();
    mh.algorithm_mut().set_parameter_config(config);

    match mh.run() {
        Err(Error::NoTargetFunction) => {}
        other => panic!("expected NoTargetFunction, got {other:?}"),
    }
    // nothing was sampled
    assert_eq!(mh.number_of_chains(), 0);
}

#[test]
fn run_with_empty_parameter_config_fails() {
    let mut mh = MetropolisHastings::new();
    mh.algorithm_mut().set_likelihood(|_: &[f64]| 1.0);

    match mh.run() {
        Err(Error::EmptyParameterConfig) => {}
        other => panic!("expected EmptyParameterConfig, got {other:?}"),
    }
}

#[test]
fn run_with_start_value_outside_limits_fails() {
    let mut config = ParameterConfig::new();
    config.set_parameter(
        0,
        Parameter::with_limits("x", 3.0, 1.0, Some(-1.0), Some(1.0)),
    );

    let mut mh = MetropolisHastings::new();
    mh.algorithm_mut().set_parameter_config(config);
    mh.algorithm_mut().set_likelihood(|_: &[f64]| 1.0);

    match mh.run() {
        Err(Error::StartValueOutsideLimits { name, start }) => {
            assert_eq!(name, "x");
            assert_eq!(start, 3.0);
        }
        other => panic!("expected StartValueOutsideLimits, got {other:?}"),
    }
}

#[test]
fn run_with_inverted_limits_fails() {
    let mut config = ParameterConfig::new();
    config.set_parameter(
        0,
        Parameter::with_limits("x", 0.0, 1.0, Some(1.0), Some(-1.0)),
    );

    let mut mh = MetropolisHastings::new();
    mh.algorithm_mut().set_parameter_config(config);
    mh.algorithm_mut().set_likelihood(|_: &[f64]| 1.0);

    assert!(matches!(mh.run(), Err(Error::InvalidLimits { .. })));
}
