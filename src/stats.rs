/*!
# Chain statistics

[`ChainStatistics`] computes statistical moments and diagnostics for a
borrowed [`Chain`] over a selected window of samples. All quantities are
cached and computed only once, unless the cache is cleared with
[`ChainStatistics::reset`] or the window is re-adjusted with
[`ChainStatistics::select_range`].

[`ChainSetStatistics`] aggregates the per-chain statistics of multiple
chains and computes the Gelman-Rubin convergence diagnostic across them.

Statistics never fail on empty windows; they yield zero-valued vectors
and samples instead. One instance must not be shared between threads;
parallel callers give each worker its own instance over the shared chain.
*/

use std::collections::HashMap;

use log::warn;

use crate::linalg::{cholesky_decompose, norm_inf, Matrix, Vector};
use crate::sample::{Chain, Sample};

/// Autocorrelation contributions below this threshold for three
/// consecutive lags truncate the autocorrelation-time series.
const AUTOCORRELATION_THRESHOLD: f64 = 0.01;

/// Cached statistical moments and diagnostics of a single chain.
pub struct ChainStatistics<'a> {
    chain: &'a Chain,
    selected_range: (isize, isize),

    mode: Option<Sample>,
    mean: Option<Sample>,
    median: HashMap<usize, f64>,

    variance: Option<Vector>,
    error: Option<Vector>,
    rms: Option<Vector>,

    covariance: Option<Matrix>,
    correlation: Option<Matrix>,
    cholesky: Option<Matrix>,

    autocorrelation: HashMap<usize, Vector>,
    autocorrelation_time: Option<Vector>,

    acc_rate: Option<f64>,
}

impl<'a> ChainStatistics<'a> {
    /// Statistics over the full chain.
    pub fn new(chain: &'a Chain) -> Self {
        Self {
            chain,
            selected_range: (0, -1),
            mode: None,
            mean: None,
            median: HashMap::new(),
            variance: None,
            error: None,
            rms: None,
            covariance: None,
            correlation: None,
            cholesky: None,
            autocorrelation: HashMap::new(),
            autocorrelation_time: None,
            acc_rate: None,
        }
    }

    pub fn chain(&self) -> &Chain {
        self.chain
    }

    /// Drop all cached quantities.
    pub fn reset(&mut self) {
        self.mode = None;
        self.mean = None;
        self.median.clear();

        self.variance = None;
        self.error = None;
        self.rms = None;

        self.covariance = None;
        self.correlation = None;
        self.cholesky = None;

        self.autocorrelation.clear();
        self.autocorrelation_time = None;

        self.acc_rate = None;
    }

    /// Select the index window `[start, end)` the statistics are
    /// computed over. Negative indices count from the tail of the chain
    /// (-1 meaning "end of chain"). Changing the window clears the cache.
    pub fn select_range(&mut self, start_index: isize, end_index: isize) {
        let old_range = self.selected_range;
        self.selected_range = (start_index, end_index);

        if old_range != self.selected_range {
            self.reset();
        }
    }

    /// Select the window by chain-length fractions in `[0, 1]`.
    pub fn select_percentage_range(&mut self, start: f64, end: f64) {
        let n = self.chain.len() as f64;
        self.select_range((n * start) as isize, ((n - 1.0) * end) as isize);
    }

    /// Resolved `[start, end)` indices of the selected window.
    pub fn indices(&self) -> (usize, usize) {
        let n = self.chain.len() as isize;

        let start = if self.selected_range.0 < 0 {
            n + self.selected_range.0
        } else {
            self.selected_range.0
        };
        let end = if self.selected_range.1 < 0 {
            n + self.selected_range.1 + 1
        } else {
            self.selected_range.1
        };

        let start = start.clamp(0, n) as usize;
        let end = end.clamp(0, n) as usize;

        (start, end.max(start))
    }

    fn window(&self) -> &[Sample] {
        let (start, end) = self.indices();
        &self.chain[start..end]
    }

    pub fn number_of_params(&self) -> usize {
        self.chain.first().map_or(0, |s| s.values().len())
    }

    /// The sample minimizing the negative log-likelihood.
    pub fn mode(&mut self) -> &Sample {
        if self.mode.is_none() {
            let result = self
                .window()
                .iter()
                .min_by(|s1, s2| s1.neg_log_likelihood().total_cmp(&s2.neg_log_likelihood()))
                .cloned()
                .unwrap_or_else(|| Sample::new(self.number_of_params()));

            self.mode = Some(result);
        }

        self.mode.as_ref().expect("cached")
    }

    /// Vector average of the windowed samples (target values reset).
    pub fn mean(&mut self) -> &Sample {
        if self.mean.is_none() {
            let window = self.window();

            let mut result = Sample::new(self.number_of_params());
            if !window.is_empty() {
                for sample in window {
                    result += sample;
                }
                result /= window.len() as f64;
            }

            self.mean = Some(result);
        }

        self.mean.as_ref().expect("cached")
    }

    /// Median of a single parameter, via partial ordering of a value
    /// view. NaN on an empty window.
    pub fn median(&mut self, param_index: usize) -> f64 {
        if let Some(&cached) = self.median.get(&param_index) {
            return cached;
        }

        let window = self.window();

        let result = if window.is_empty() {
            f64::NAN
        } else {
            let mut values: Vec<f64> = window.iter().map(|s| s.values()[param_index]).collect();
            let middle = values.len() / 2;
            let (_, median, _) = values.select_nth_unstable_by(middle, f64::total_cmp);
            *median
        };

        self.median.insert(param_index, result);
        result
    }

    /// Per-parameter sample variance (the unbiased `N - 1` estimator).
    pub fn variance(&mut self) -> &Vector {
        if self.variance.is_none() {
            let mean = self.mean().clone();
            let window = self.window();
            let n = window.len();

            let mut result = Vector::zeros(self.number_of_params());
            if n > 1 {
                for sample in window {
                    for (p, value) in result.iter_mut().enumerate() {
                        let diff = sample.values()[p] - mean.values()[p];
                        *value += diff * diff;
                    }
                }
                result /= (n - 1) as f64;
            }

            self.variance = Some(result);
        }

        self.variance.as_ref().expect("cached")
    }

    /// Per-parameter standard error (square root of the variance).
    pub fn error(&mut self) -> &Vector {
        if self.error.is_none() {
            let mut result = self.variance().clone();
            for value in result.iter_mut() {
                *value = value.sqrt();
            }
            self.error = Some(result);
        }

        self.error.as_ref().expect("cached")
    }

    /// Per-parameter root mean square.
    pub fn rms(&mut self) -> &Vector {
        if self.rms.is_none() {
            let window = self.window();
            let n = window.len();

            let mut result = Vector::zeros(self.number_of_params());
            if n > 0 {
                for sample in window {
                    for (p, value) in result.iter_mut().enumerate() {
                        *value += sample.values()[p] * sample.values()[p];
                    }
                }
                result /= n as f64;
                for value in result.iter_mut() {
                    *value = value.sqrt();
                }
            }

            self.rms = Some(result);
        }

        self.rms.as_ref().expect("cached")
    }

    /// Sample covariance matrix (lower triangle filled).
    pub fn covariance_matrix(&mut self) -> &Matrix {
        if self.covariance.is_none() {
            let mean = self.mean().clone();
            let window = self.window();
            let n = window.len();
            let n_params = self.number_of_params();

            let mut result = Matrix::zeros(n_params, n_params);
            if n > 1 {
                for sample in window {
                    for j in 0..n_params {
                        for k in 0..=j {
                            result[(j, k)] += (sample.values()[j] - mean.values()[j])
                                * (sample.values()[k] - mean.values()[k]);
                        }
                    }
                }
                result /= (n - 1) as f64;
            }

            self.covariance = Some(result);
        }

        self.covariance.as_ref().expect("cached")
    }

    /// Sample correlation matrix (unit diagonal, lower triangle filled).
    pub fn correlation_matrix(&mut self) -> &Matrix {
        if self.correlation.is_none() {
            let n = self.window().len();
            let n_params = self.number_of_params();

            let mut result = Matrix::identity(n_params, n_params);
            if n > 1 {
                let error = self.error().clone();
                let covariance = self.covariance_matrix();

                for j in 1..n_params {
                    for k in 0..j {
                        result[(j, k)] = covariance[(j, k)] / (error[j] * error[k]);
                    }
                }
            }

            self.correlation = Some(result);
        }

        self.correlation.as_ref().expect("cached")
    }

    /// Lower Cholesky factor of the sample covariance. On decomposition
    /// failure a zero matrix is returned and a warning is logged.
    pub fn cholesky_decomposition(&mut self) -> &Matrix {
        if self.cholesky.is_none() {
            let n = self.window().len();
            let n_params = self.number_of_params();

            let mut result = Matrix::zeros(n_params, n_params);
            if n > 1 {
                let covariance = self.covariance_matrix().clone();
                let status = cholesky_decompose(&covariance, &mut result);
                if status != 0 {
                    warn!(
                        "Cholesky decomposition of the sample covariance failed at row {}.",
                        status - 1
                    );
                    result.fill(0.0);
                }
            }

            self.cholesky = Some(result);
        }

        self.cholesky.as_ref().expect("cached")
    }

    /// Per-parameter autocorrelation at the given lag (zero vector for
    /// lags beyond the window).
    pub fn autocorrelation(&mut self, lag: usize) -> Vector {
        if let Some(cached) = self.autocorrelation.get(&lag) {
            return cached.clone();
        }

        let mean = self.mean().clone();
        let variance = self.variance().clone();
        let window = self.window();
        let n = window.len();
        let n_params = self.number_of_params();

        let mut result = Vector::zeros(n_params);
        if lag < n {
            for (sample_t, sample_h) in window.iter().zip(window.iter().skip(lag)) {
                for (p, value) in result.iter_mut().enumerate() {
                    let x_t_diff = sample_t.values()[p] - mean.values()[p];
                    let x_h_diff = sample_h.values()[p] - mean.values()[p];
                    *value += x_t_diff * x_h_diff;
                }
            }

            result /= (n - lag) as f64;

            for (p, value) in result.iter_mut().enumerate() {
                *value /= variance[p];
            }
        }

        self.autocorrelation.insert(lag, result.clone());
        result
    }

    /// Per-parameter integrated autocorrelation time `1 + 2 Σ ρ(lag)`.
    /// The series is truncated once the largest autocorrelation stays
    /// below 0.01 for three consecutive lags.
    pub fn autocorrelation_time(&mut self) -> Vector {
        if let Some(cached) = &self.autocorrelation_time {
            return cached.clone();
        }

        let (start, end) = self.indices();
        let n = end - start;
        let n_params = self.number_of_params();

        let mut sum = Vector::zeros(n_params);
        let mut threshold_maintained = 0;

        for lag in 1..n {
            let ac = self.autocorrelation(lag);
            sum += &ac;

            if norm_inf(&ac) < AUTOCORRELATION_THRESHOLD {
                threshold_maintained += 1;
                if threshold_maintained >= 3 {
                    break;
                }
            } else {
                threshold_maintained = 0;
            }
        }

        let result = Vector::from_element(n_params, 1.0) + 2.0 * sum;
        self.autocorrelation_time = Some(result.clone());
        result
    }

    /// Fraction of accepted samples in the window, not counting the
    /// (always accepted) first one.
    pub fn acc_rate(&mut self) -> f64 {
        if let Some(cached) = self.acc_rate {
            return cached;
        }

        // skip the first element
        let mut accepted = 0_usize;
        let mut total = 0_usize;
        for sample in self.window().iter().skip(1) {
            if sample.is_accepted() {
                accepted += 1;
            }
            total += 1;
        }

        let result = if total == 0 {
            0.0
        } else {
            accepted as f64 / total as f64
        };

        self.acc_rate = Some(result);
        result
    }

    /**
    Confidence interval of a single parameter around `central_value`.

    The windowed samples are sorted by the parameter; starting from the
    sample matching the central value (the middle one by position if
    several match), neighbors are gathered alternately to the left and
    right (stopping at the respective end) until `⌊N · level⌋` samples
    are collected. Returns the left-most and right-most gathered value.
    */
    pub fn confidence_interval(
        &mut self,
        param_index: usize,
        central_value: f64,
        level: f64,
    ) -> (f64, f64) {
        let window = self.window();
        if window.is_empty() {
            return (0.0, 0.0);
        }

        let mut sorted: Vec<f64> = window.iter().map(|s| s.values()[param_index]).collect();
        sorted.sort_by(f64::total_cmp);

        let first_match = sorted.partition_point(|&v| v < central_value);
        let match_count = sorted[first_match..].partition_point(|&v| v <= central_value);
        let center = if match_count > 1 {
            first_match + match_count / 2
        } else {
            first_match.min(sorted.len() - 1)
        };

        let to_gather = (sorted.len() as f64 * level) as usize;
        let back = sorted.len() - 1;

        let (mut lower, mut upper) = (center, center);
        for i in 0..to_gather {
            if (lower == 0 || i % 2 == 1) && upper != back {
                upper += 1;
            } else if (upper == back || i % 2 == 0) && lower != 0 {
                lower -= 1;
            }
        }

        (sorted[lower], sorted[upper])
    }
}

/// Statistics over a set of chains sampled from the same target.
#[derive(Default)]
pub struct ChainSetStatistics<'a> {
    single_chain_stats: Vec<ChainStatistics<'a>>,
    gelman_rubin: Option<f64>,
}

impl<'a> ChainSetStatistics<'a> {
    pub fn new() -> Self {
        Self {
            single_chain_stats: Vec::new(),
            gelman_rubin: None,
        }
    }

    pub fn add_chain(&mut self, chain: &'a Chain) -> &mut ChainStatistics<'a> {
        self.single_chain_stats.push(ChainStatistics::new(chain));
        self.gelman_rubin = None;

        self.single_chain_stats.last_mut().expect("just added")
    }

    pub fn chain_stats(&mut self, index: usize) -> &mut ChainStatistics<'a> {
        &mut self.single_chain_stats[index]
    }

    pub fn len(&self) -> usize {
        self.single_chain_stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.single_chain_stats.is_empty()
    }

    pub fn clear(&mut self) {
        self.single_chain_stats.clear();
        self.gelman_rubin = None;
    }

    pub fn reset(&mut self) {
        for stats in &mut self.single_chain_stats {
            stats.reset();
        }
        self.gelman_rubin = None;
    }

    /// Apply the same index window to every chain.
    pub fn select_range(&mut self, start_index: isize, end_index: isize) {
        for stats in &mut self.single_chain_stats {
            stats.select_range(start_index, end_index);
        }
        self.gelman_rubin = None;
    }

    /// Apply the same fractional window to every chain.
    pub fn select_percentage_range(&mut self, start: f64, end: f64) {
        for stats in &mut self.single_chain_stats {
            stats.select_percentage_range(start, end);
        }
        self.gelman_rubin = None;
    }

    /**
    The Gelman-Rubin convergence diagnostic over all aggregated chains.

    Compares the between-chain and within-chain variances of every
    parameter and returns the largest potential scale reduction factor;
    values near 1 indicate convergence. Yields 0.0 with fewer than 2
    chains or fewer than 10 samples per chain.
    */
    pub fn gelman_rubin(&mut self) -> f64 {
        if let Some(cached) = self.gelman_rubin {
            return cached;
        }

        let n_chains = self.single_chain_stats.len();
        if n_chains < 2 {
            return 0.0;
        }

        let (start, end) = self.single_chain_stats[0].indices();
        let n = end - start;

        let shortest_chain = self
            .single_chain_stats
            .iter()
            .map(|stats| stats.chain().len())
            .min()
            .unwrap_or(0);
        if shortest_chain < 10 {
            return 0.0;
        }

        let d = self.single_chain_stats[0].number_of_params();

        let mut chain_means = Vec::with_capacity(n_chains);
        let mut chain_variances = Vec::with_capacity(n_chains);
        let mut global_mean = Sample::new(d);

        for stats in &mut self.single_chain_stats {
            let mean = stats.mean().clone();
            global_mean += &mean;
            chain_means.push(mean);
            chain_variances.push(stats.variance().clone());
        }

        global_mean /= n_chains as f64;

        let mut r = Vector::zeros(d);

        for j in 0..d {
            // variance between chains
            let mut b = 0.0;
            // variance within chains
            let mut w = 0.0;

            for i in 0..n_chains {
                let mean_diff = chain_means[i].values()[j] - global_mean.values()[j];
                b += mean_diff * mean_diff;
                w += chain_variances[i][j];
            }
            b /= (n_chains - 1) as f64;
            w /= n_chains as f64;

            let v = ((n - 1) as f64 / n as f64) * w + b + b / n_chains as f64;
            r[j] = v / w;
        }

        let result = norm_inf(&r);
        self.gelman_rubin = Some(result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample(values: Vec<f64>, neg_log_l: f64, accepted: bool) -> Sample {
        let mut s = Sample::from(values);
        s.set_neg_log_likelihood(neg_log_l);
        s.set_prior(1.0);
        s.set_accepted(accepted);
        s
    }

    fn test_chain() -> Chain {
        vec![
            sample(vec![1.0, 10.0], 3.0, true),
            sample(vec![2.0, 20.0], 1.0, true),
            sample(vec![3.0, 30.0], 2.0, false),
            sample(vec![4.0, 40.0], 4.0, true),
        ]
    }

    #[test]
    fn empty_window_yields_zero_valued_statistics() {
        let chain = Chain::new();
        let mut stats = ChainStatistics::new(&chain);

        assert_eq!(stats.mean().values().len(), 0);
        assert_eq!(stats.variance().len(), 0);
        assert_eq!(stats.rms().len(), 0);
        assert_eq!(stats.acc_rate(), 0.0);
        assert_eq!(stats.confidence_interval(0, 0.0, 0.68), (0.0, 0.0));
    }

    #[test]
    fn moments_over_the_full_chain() {
        let chain = test_chain();
        let mut stats = ChainStatistics::new(&chain);

        assert_eq!(stats.mean().values().as_slice(), &[2.5, 25.0]);
        // target values of the mean are reset by the sample arithmetic
        assert_eq!(stats.mean().likelihood(), 0.0);

        let variance = stats.variance().clone();
        assert_abs_diff_eq!(variance[0], 5.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(variance[1], 500.0 / 3.0, epsilon = 1e-12);

        let error = stats.error().clone();
        assert_abs_diff_eq!(error[0], (5.0_f64 / 3.0).sqrt(), epsilon = 1e-12);

        let rms = stats.rms().clone();
        assert_abs_diff_eq!(rms[0], (30.0_f64 / 4.0).sqrt(), epsilon = 1e-12);

        // minimum negative log-likelihood marks the mode
        assert_eq!(stats.mode().values().as_slice(), &[2.0, 20.0]);

        // three of four samples counted, first skipped, two accepted
        assert_abs_diff_eq!(stats.acc_rate(), 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn median_uses_partial_ordering() {
        let chain = test_chain();
        let mut stats = ChainStatistics::new(&chain);

        // even sample count: the upper-middle element
        assert_eq!(stats.median(0), 3.0);
        assert_eq!(stats.median(1), 30.0);
    }

    #[test]
    fn window_selection_supports_negative_indices() {
        let chain = test_chain();

        let mut stats = ChainStatistics::new(&chain);
        stats.select_range(1, -1);
        assert_eq!(stats.indices(), (1, 4));
        assert_eq!(stats.mean().values().as_slice(), &[3.0, 30.0]);

        stats.select_range(-2, -1);
        assert_eq!(stats.indices(), (2, 4));
        assert_eq!(stats.mean().values().as_slice(), &[3.5, 35.0]);

        stats.select_range(0, 2);
        assert_eq!(stats.indices(), (0, 2));
        assert_eq!(stats.mean().values().as_slice(), &[1.5, 15.0]);
    }

    #[test]
    fn changing_the_window_invalidates_the_cache() {
        let chain = test_chain();
        let mut stats = ChainStatistics::new(&chain);

        assert_eq!(stats.mean().values()[0], 2.5);
        stats.select_range(0, 2);
        assert_eq!(stats.mean().values()[0], 1.5);
    }

    #[test]
    fn covariance_correlation_and_cholesky() {
        // the two components are perfectly linearly dependent
        let chain = test_chain();
        let mut stats = ChainStatistics::new(&chain);

        let covariance = stats.covariance_matrix().clone();
        assert_abs_diff_eq!(covariance[(0, 0)], 5.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(covariance[(1, 0)], 50.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(covariance[(1, 1)], 500.0 / 3.0, epsilon = 1e-12);

        let correlation = stats.correlation_matrix().clone();
        assert_abs_diff_eq!(correlation[(1, 0)], 1.0, epsilon = 1e-12);
        assert_eq!(correlation[(0, 0)], 1.0);

        // the singular covariance degrades to a zero matrix
        let cholesky = stats.cholesky_decomposition();
        assert!(cholesky.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn autocorrelation_of_lag_zero_is_n_minus_one_over_n() {
        let chain = test_chain();
        let mut stats = ChainStatistics::new(&chain);

        let ac = stats.autocorrelation(0);
        assert_abs_diff_eq!(ac[0], 3.0 / 4.0, epsilon = 1e-12);

        // beyond the window: zero
        let ac = stats.autocorrelation(10);
        assert_eq!(ac[0], 0.0);
    }

    #[test]
    fn autocorrelation_time_stays_finite() {
        let values = [0.3, -1.2, 0.7, 0.1, -0.9, 1.5, -0.4, 0.8, -1.1, 0.2];
        let chain: Chain = values
            .iter()
            .cycle()
            .take(200)
            .map(|&v| sample(vec![v], 0.0, true))
            .collect();

        let mut stats = ChainStatistics::new(&chain);
        let time = stats.autocorrelation_time();
        assert!(time[0].is_finite());
    }

    #[test]
    fn confidence_interval_gathers_around_the_center() {
        let chain: Chain = (1..=9)
            .map(|v| sample(vec![v as f64], 0.0, true))
            .collect();
        let mut stats = ChainStatistics::new(&chain);

        // 9 values 1..9, center 5, level covering 4 samples: two on each side
        let (lower, upper) = stats.confidence_interval(0, 5.0, 4.0 / 9.0);
        assert_eq!(lower, 3.0);
        assert_eq!(upper, 7.0);

        // center at the minimum: everything gathers to the right
        let (lower, upper) = stats.confidence_interval(0, 1.0, 4.0 / 9.0);
        assert_eq!(lower, 1.0);
        assert_eq!(upper, 5.0);
    }

    #[test]
    fn gelman_rubin_guards() {
        let chain = test_chain();

        let mut set = ChainSetStatistics::new();
        set.add_chain(&chain);
        // single chain
        assert_eq!(set.gelman_rubin(), 0.0);

        // two chains but fewer than 10 samples each
        let mut set = ChainSetStatistics::new();
        set.add_chain(&chain);
        set.add_chain(&chain);
        assert_eq!(set.gelman_rubin(), 0.0);
    }

    #[test]
    fn gelman_rubin_of_identical_chains_is_near_one() {
        let chain: Chain = (0..40)
            .map(|i| sample(vec![(i % 7) as f64], 0.0, true))
            .collect();

        let mut set = ChainSetStatistics::new();
        set.add_chain(&chain);
        set.add_chain(&chain);

        let r = set.gelman_rubin();
        // identical chains: B = 0, so R = (N - 1) / N
        assert_abs_diff_eq!(r, 39.0 / 40.0, epsilon = 1e-12);
    }
}
