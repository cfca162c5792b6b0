//! A full sampling run streaming its chains through the text file
//! writer, verifying the files' structure.

use tempered_mcmc::algorithm::Sampler;
use tempered_mcmc::io::TextFileWriter;
use tempered_mcmc::metropolis::MetropolisHastings;
use tempered_mcmc::parameter::{Parameter, ParameterConfig};

fn configured_sampler(total_length: usize) -> MetropolisHastings {
    let mut config = ParameterConfig::new();
    config.set_parameter(0, Parameter::new("x1", 0.0, 1.0));
    config.set_parameter(1, Parameter::new("x2", 0.0, 1.0));

    let mut mh = MetropolisHastings::new();
    mh.set_multi_threading(false);
    mh.algorithm_mut().set_parameter_config(config);
    mh.algorithm_mut()
        .set_neg_log_likelihood(|x: f64, y: f64| 0.5 * (x * x + y * y));
    mh.algorithm_mut().set_total_length(total_length);
    mh
}

#[test]
fn one_file_per_chain_with_header_and_all_samples() {
    let dir = tempfile::tempdir().unwrap();

    let mut mh = configured_sampler(120);
    mh.set_number_of_chains(2);
    mh.algorithm_mut()
        .add_writer(TextFileWriter::new(dir.path(), "run"));

    mh.run().unwrap();

    for i_chain in 0..2 {
        let path = dir.path().join(format!("run-{:02}", i_chain)).with_extension("txt");
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.trim_end().lines().collect();

        // header plus the start sample plus one line per step
        assert_eq!(lines.len(), 1 + 121);
        assert_eq!(
            lines[0],
            "Generation\tParam.0:x1\tParam.1:x2\tnegLogL.\tLikelihood\tPrior"
        );

        // generations are written in order
        for (i, line) in lines[1..].iter().enumerate() {
            let generation: usize = line.split('\t').next().unwrap().parse().unwrap();
            assert_eq!(generation, i);
            assert_eq!(line.split('\t').count(), 6);
        }
    }
}

#[test]
fn total_length_not_divisible_by_cycle_length_writes_the_remainder() {
    let dir = tempfile::tempdir().unwrap();

    // 50-step cycles plus a 7-step remainder cycle
    let mut mh = configured_sampler(107);
    mh.algorithm_mut()
        .add_writer(TextFileWriter::new(dir.path(), "run"));

    mh.run().unwrap();

    let contents = std::fs::read_to_string(dir.path().join("run-00.txt")).unwrap();
    assert_eq!(contents.trim_end().lines().count(), 1 + 108);
}

#[test]
fn combined_file_interleaves_all_chains() {
    let dir = tempfile::tempdir().unwrap();

    let mut mh = configured_sampler(60);
    mh.set_number_of_chains(3);
    let mut writer = TextFileWriter::new(dir.path(), "combined");
    writer.set_combine_chains(true);
    mh.algorithm_mut().add_writer(writer);

    mh.run().unwrap();

    let contents = std::fs::read_to_string(dir.path().join("combined.txt")).unwrap();
    assert_eq!(contents.trim_end().lines().count(), 1 + 3 * 61);
}
