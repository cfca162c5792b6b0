/*!
# Output writers

A [`Writer`] receives every chain's newly appended samples once per
sampling cycle. The run loop calls [`Writer::initialize`] once before the
first cycle, [`Writer::write`] once per chain and cycle, and
[`Writer::finalize`] after the sampler's own finalization. A `write` call
with `start_index == chain.len()` simply has nothing to append.

[`TextFileWriter`] streams samples to tab-separated text files, one line
per sample:

```text
Generation  Param.0:x1  Param.1:x2  negLogL.  Likelihood  Prior
0           0.25        -1.5        1.15625   0.31466...  1
```
*/

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;

use crate::error::Result;
use crate::parameter::ParameterConfig;
use crate::sample::Chain;

/// Sink for sampled chains, driven by the run loop.
///
/// Writers must not fail on normal operation; I/O errors are reported by
/// the run loop and sampling continues.
pub trait Writer: Send + Sync {
    /// Called once before the first cycle.
    fn initialize(&mut self, _number_of_chains: usize, _param_config: &ParameterConfig) -> Result<()> {
        Ok(())
    }

    /// Append the samples `[start_index, chain.len())` of the given
    /// chain.
    fn write(&mut self, chain_index: usize, chain: &Chain, start_index: usize) -> Result<()>;

    /// Called once after the sampler finalized.
    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A writer streaming incoming samples to text files.
///
/// By default each chain goes to its own file, named
/// `<stem><separator><chain index, zero-padded to 2 digits><extension>`;
/// with [`TextFileWriter::set_combine_chains`] a single file interleaves
/// all chains.
pub struct TextFileWriter {
    directory: PathBuf,
    stem: String,
    name_separator: String,
    extension: String,

    precision: usize,
    combine_chains: bool,
    column_separator: u8,

    streams: Vec<csv::Writer<File>>,
}

impl TextFileWriter {
    pub fn new(directory: impl AsRef<Path>, stem: &str) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            stem: stem.to_owned(),
            name_separator: "-".to_owned(),
            extension: ".txt".to_owned(),
            precision: 12,
            combine_chains: false,
            column_separator: b'\t',
            streams: Vec::new(),
        }
    }

    pub fn set_file_name_scheme(
        &mut self,
        directory: impl AsRef<Path>,
        stem: &str,
        name_separator: &str,
        extension: &str,
    ) {
        self.directory = directory.as_ref().to_path_buf();
        self.stem = stem.to_owned();
        self.name_separator = name_separator.to_owned();
        self.extension = extension.to_owned();
    }

    /// Number of decimal digits written for floating point columns.
    pub fn set_precision(&mut self, precision: usize) {
        self.precision = precision;
    }

    /// Interleave all chains into a single file.
    pub fn set_combine_chains(&mut self, combine: bool) {
        self.combine_chains = combine;
    }

    pub fn set_column_separator(&mut self, separator: u8) {
        self.column_separator = separator;
    }

    /// The output path for the given chain (or the combined file when
    /// `chain_index` is `None`).
    pub fn file_path(&self, chain_index: Option<usize>) -> PathBuf {
        let mut file_name = self.stem.clone();
        if let Some(index) = chain_index {
            file_name.push_str(&self.name_separator);
            file_name.push_str(&format!("{:02}", index));
        }
        file_name.push_str(&self.extension);

        self.directory.join(file_name)
    }
}

impl Writer for TextFileWriter {
    fn initialize(&mut self, number_of_chains: usize, param_config: &ParameterConfig) -> Result<()> {
        self.streams.clear();

        if number_of_chains < 1 {
            return Ok(());
        }

        let n_streams = if self.combine_chains {
            1
        } else {
            number_of_chains
        };

        let mut header: Vec<String> = vec!["Generation".to_owned()];
        for (i, param) in param_config.parameters().iter().enumerate() {
            header.push(format!("Param.{}:{}", i, param.name()));
        }
        header.push("negLogL.".to_owned());
        header.push("Likelihood".to_owned());
        header.push("Prior".to_owned());

        for i_stream in 0..n_streams {
            let chain_index = (!self.combine_chains).then_some(i_stream);
            let path = self.file_path(chain_index);

            let mut stream = WriterBuilder::new()
                .delimiter(self.column_separator)
                .from_path(&path)?;
            stream.write_record(&header)?;

            self.streams.push(stream);
        }

        Ok(())
    }

    fn write(&mut self, chain_index: usize, chain: &Chain, start_index: usize) -> Result<()> {
        let stream_index = if self.combine_chains { 0 } else { chain_index };
        let stream = &mut self.streams[stream_index];

        for sample in &chain[start_index..] {
            let mut record: Vec<String> = vec![sample.generation().to_string()];
            for value in sample.values().iter() {
                record.push(format!("{:.*}", self.precision, value));
            }
            record.push(format!("{:.*}", self.precision, sample.neg_log_likelihood()));
            record.push(format!("{:.*}", self.precision, sample.likelihood()));
            record.push(format!("{:.*}", self.precision, sample.prior()));

            stream.write_record(&record)?;
        }

        stream.flush()?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        for stream in &mut self.streams {
            stream.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Parameter;
    use crate::sample::Sample;
    use std::fs;

    fn two_param_config() -> ParameterConfig {
        let mut config = ParameterConfig::new();
        config.set_parameter(0, Parameter::new("x1", 0.0, 1.0));
        config.set_parameter(1, Parameter::new("x2", 0.0, 1.0));
        config
    }

    fn short_chain() -> Chain {
        let mut first = Sample::from(vec![0.25, -1.5]);
        first.set_prior(1.0);
        first.set_likelihood(0.5);
        first.set_neg_log_likelihood(0.6931471805599453);

        let mut second = first.clone();
        second.set_generation(1);
        second.set_values(crate::linalg::Vector::from_vec(vec![0.5, -1.0]));

        vec![first, second]
    }

    #[test]
    fn writes_header_and_one_line_per_sample() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = TextFileWriter::new(dir.path(), "test");
        writer.set_precision(3);

        writer.initialize(2, &two_param_config()).unwrap();
        writer.write(0, &short_chain(), 0).unwrap();

        let contents = fs::read_to_string(dir.path().join("test-00.txt")).unwrap();
        let lines: Vec<&str> = contents.trim_end().lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Generation\tParam.0:x1\tParam.1:x2\tnegLogL.\tLikelihood\tPrior"
        );
        assert_eq!(lines[1], "0\t0.250\t-1.500\t0.693\t0.500\t1.000");
        assert_eq!(lines[2], "1\t0.500\t-1.000\t0.693\t0.500\t1.000");

        // the second chain's file exists and holds only the header
        let contents = fs::read_to_string(dir.path().join("test-01.txt")).unwrap();
        assert_eq!(contents.trim_end().lines().count(), 1);
    }

    #[test]
    fn appends_only_new_samples() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = TextFileWriter::new(dir.path(), "test");

        let chain = short_chain();
        writer.initialize(1, &two_param_config()).unwrap();
        writer.write(0, &chain, 0).unwrap();
        // nothing new to append
        writer.write(0, &chain, chain.len()).unwrap();
        writer.write(0, &chain, 1).unwrap();
        writer.finalize().unwrap();

        let contents = fs::read_to_string(dir.path().join("test-00.txt")).unwrap();
        // header + 2 samples + 1 re-appended sample
        assert_eq!(contents.trim_end().lines().count(), 4);
    }

    #[test]
    fn combined_chains_share_a_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = TextFileWriter::new(dir.path(), "combined");
        writer.set_combine_chains(true);

        writer.initialize(3, &two_param_config()).unwrap();
        writer.write(0, &short_chain(), 0).unwrap();
        writer.write(2, &short_chain(), 0).unwrap();

        let contents = fs::read_to_string(dir.path().join("combined.txt")).unwrap();
        assert_eq!(contents.trim_end().lines().count(), 5);
        assert!(!dir.path().join("combined-00.txt").exists());
    }
}
