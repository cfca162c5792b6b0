/*!
# Parameter model

[`Parameter`] describes one dimension of the target parameter space: its
name, start value, absolute error (the proposal scale hint), optional
lower/upper limits and whether it is held fixed.

[`ParameterConfig`] is the ordered collection of parameters together with
a global error scaling and a unit lower triangular correlation matrix.
From those it derives the error vector, the covariance matrix and its
Cholesky factor, which drive the multivariate proposal kernels and the
randomized start points.
*/

use log::error;

use crate::error::{Error, Result};
use crate::linalg::{cholesky_decompose, Matrix, Vector};
use crate::random;

/// A single dimension of the sampled parameter space.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    start_value: f64,
    absolute_error: f64,
    lower_limit: Option<f64>,
    upper_limit: Option<f64>,
    fixed: bool,
}

impl Parameter {
    /// An unbounded, non-fixed parameter.
    pub fn new(name: &str, start_value: f64, absolute_error: f64) -> Self {
        Self::with_limits(name, start_value, absolute_error, None, None)
    }

    /// A parameter with optional lower/upper limits.
    ///
    /// Non-finite limits are canonicalized to "unbounded on that side".
    /// Limit consistency is checked by [`Parameter::validate`] when a run
    /// starts.
    pub fn with_limits(
        name: &str,
        start_value: f64,
        absolute_error: f64,
        lower_limit: Option<f64>,
        upper_limit: Option<f64>,
    ) -> Self {
        Self {
            name: name.to_owned(),
            start_value,
            absolute_error: absolute_error.abs(),
            lower_limit: lower_limit.filter(|l| l.is_finite()),
            upper_limit: upper_limit.filter(|l| l.is_finite()),
            fixed: false,
        }
    }

    /// A parameter pinned to its start value (zero error).
    pub fn fixed_parameter(name: &str, start_value: f64) -> Self {
        let mut param = Self::new(name, start_value, 0.0);
        param.fixed = true;
        param
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_owned();
    }

    pub fn start_value(&self) -> f64 {
        self.start_value
    }

    pub fn set_start_value(&mut self, start_value: f64) {
        self.start_value = start_value;
    }

    pub fn absolute_error(&self) -> f64 {
        self.absolute_error
    }

    pub fn set_absolute_error(&mut self, absolute_error: f64) {
        self.absolute_error = absolute_error.abs();
    }

    /// Set the absolute error as a fraction of the start value.
    pub fn set_relative_error(&mut self, relative_error: f64) {
        self.set_absolute_error(relative_error * self.start_value);
    }

    pub fn lower_limit(&self) -> Option<f64> {
        self.lower_limit
    }

    pub fn set_lower_limit(&mut self, limit: Option<f64>) {
        self.lower_limit = limit.filter(|l| l.is_finite());
    }

    pub fn upper_limit(&self) -> Option<f64> {
        self.upper_limit
    }

    pub fn set_upper_limit(&mut self, limit: Option<f64>) {
        self.upper_limit = limit.filter(|l| l.is_finite());
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn set_fixed(&mut self, fixed: bool) {
        self.fixed = fixed;
    }

    /// Check limit consistency and the start value's containment.
    pub fn validate(&self) -> Result<()> {
        if let (Some(lower), Some(upper)) = (self.lower_limit, self.upper_limit) {
            if lower > upper {
                return Err(Error::InvalidLimits {
                    name: self.name.clone(),
                    lower,
                    upper,
                });
            }
        }

        if !self.is_inside_limits(self.start_value) {
            return Err(Error::StartValueOutsideLimits {
                name: self.name.clone(),
                start: self.start_value,
            });
        }

        Ok(())
    }

    pub fn is_inside_limits(&self, value: f64) -> bool {
        self.lower_limit.map_or(true, |l| value >= l)
            && self.upper_limit.map_or(true, |u| value <= u)
    }

    /// Clamp `value` into the limit interval.
    pub fn constrain_to_limits(&self, value: &mut f64) {
        if let Some(lower) = self.lower_limit {
            if *value < lower {
                *value = lower;
                return;
            }
        }
        if let Some(upper) = self.upper_limit {
            if *value > upper {
                *value = upper;
            }
        }
    }

    /// Mirror `value` around the limit it crossed.
    ///
    /// Returns `false` if the reflected value then exceeds the opposite
    /// limit (`value` is left at the reflected position).
    pub fn reflect_from_limits(&self, value: &mut f64) -> bool {
        if let Some(lower) = self.lower_limit {
            if *value < lower {
                *value = 2.0 * lower - *value;
                return !self.upper_limit.is_some_and(|u| *value > u);
            }
        }
        if let Some(upper) = self.upper_limit {
            if *value > upper {
                *value = 2.0 * upper - *value;
                return !self.lower_limit.is_some_and(|l| *value < l);
            }
        }
        true
    }
}

/// The ordered set of parameters spanning the target space.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterConfig {
    parameters: Vec<Parameter>,
    error_scaling: f64,
    correlations: Matrix,
}

impl Default for ParameterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterConfig {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
            error_scaling: 1.0,
            correlations: Matrix::zeros(0, 0),
        }
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn parameter(&self, index: usize) -> &Parameter {
        &self.parameters[index]
    }

    pub fn parameter_mut(&mut self, index: usize) -> &mut Parameter {
        &mut self.parameters[index]
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Place `param` at `index`, growing the configuration if necessary.
    ///
    /// Gaps opened by growing are padded with fixed zero-value
    /// placeholders, and the correlation matrix is grown alongside.
    pub fn set_parameter(&mut self, index: usize, param: Parameter) {
        if self.parameters.len() <= index {
            self.parameters
                .resize(index + 1, Parameter::fixed_parameter("", 0.0));
            self.set_correlation(index, index, 1.0);
        }
        self.parameters[index] = param;
    }

    pub fn error_scaling(&self) -> f64 {
        self.error_scaling
    }

    pub fn set_error_scaling(&mut self, scaling: f64) {
        self.error_scaling = scaling;
    }

    /// Set the correlation coefficient between two parameters.
    ///
    /// Indices are canonicalized to the lower triangle and `correlation`
    /// is clamped into [-1, +1]. Setting the diagonal only grows the
    /// matrix (the diagonal is fixed at 1).
    pub fn set_correlation(&mut self, p1: usize, p2: usize, correlation: f64) {
        let (p1, p2) = if p1 < p2 { (p2, p1) } else { (p1, p2) };

        let current_size = self.correlations.nrows();
        let min_size = p1 + 1;

        if current_size < min_size {
            let mut grown = Matrix::zeros(min_size, min_size);
            grown
                .view_mut((0, 0), (current_size, current_size))
                .copy_from(&self.correlations);
            for i in current_size..min_size {
                grown[(i, i)] = 1.0;
            }
            self.correlations = grown;
        }

        if p1 == p2 {
            return;
        }

        self.correlations[(p1, p2)] = correlation.clamp(-1.0, 1.0);
    }

    /// Correlation coefficient between two parameters (1 on the diagonal,
    /// 0 where never set).
    pub fn correlation(&self, p1: usize, p2: usize) -> f64 {
        if p1 == p2 {
            return 1.0;
        }
        let (p1, p2) = if p1 < p2 { (p2, p1) } else { (p1, p2) };
        if p1 >= self.correlations.nrows() {
            return 0.0;
        }
        self.correlations[(p1, p2)]
    }

    /// Scaled per-parameter errors.
    pub fn errors(&self) -> Vector {
        Vector::from_iterator(
            self.parameters.len(),
            self.parameters
                .iter()
                .map(|p| self.error_scaling * p.absolute_error()),
        )
    }

    /// Start values; when `randomized`, perturbed by one multivariate
    /// normal draw with the configuration's covariance and clamped to the
    /// limits.
    pub fn start_values(&self, randomized: bool) -> Vector {
        let mut start = Vector::from_iterator(
            self.parameters.len(),
            self.parameters.iter().map(|p| p.start_value()),
        );

        if randomized {
            let dist = rand_distr::Normal::new(0.0, 1.0).expect("standard normal");
            start = random::from_multivariate(&dist, &start, &self.cholesky_decomp());
        }

        self.constrain_to_limits(start.as_mut_slice());

        start
    }

    /// Covariance matrix `Σ_ij = C_ij · E_i · E_j` over the scaled errors
    /// (lower triangle filled).
    pub fn covariance_matrix(&self) -> Matrix {
        let n = self.parameters.len();
        let errors = self.errors();

        let mut result = Matrix::zeros(n, n);
        for i in 0..n {
            for j in 0..=i {
                result[(i, j)] = self.correlation(i, j) * errors[i] * errors[j];
            }
        }

        result
    }

    /// Lower Cholesky factor of the covariance matrix.
    ///
    /// If the decomposition fails, the factor degrades to a diagonal of
    /// the scaled errors and a warning is logged.
    pub fn cholesky_decomp(&self) -> Matrix {
        let cov = self.covariance_matrix();

        let mut result = Matrix::zeros(cov.nrows(), cov.ncols());
        let status = cholesky_decompose(&cov, &mut result);
        if status != 0 {
            error!(
                "Cholesky decomposition of covariance matrix failed at row {}.",
                status - 1
            );

            result.fill(0.0);
            for (i, error) in self.errors().iter().enumerate() {
                result[(i, i)] = *error;
            }
        }

        result
    }

    /// Validate every parameter; surfaced as a configuration error before
    /// sampling starts.
    pub fn validate(&self) -> Result<()> {
        for param in &self.parameters {
            param.validate()?;
        }
        Ok(())
    }

    pub fn is_inside_limits(&self, point: &[f64]) -> bool {
        debug_assert_eq!(point.len(), self.parameters.len());

        self.parameters
            .iter()
            .zip(point.iter())
            .all(|(param, &value)| param.is_inside_limits(value))
    }

    pub fn constrain_to_limits(&self, point: &mut [f64]) {
        debug_assert_eq!(point.len(), self.parameters.len());

        for (param, value) in self.parameters.iter().zip(point.iter_mut()) {
            param.constrain_to_limits(value);
        }
    }

    /// Element-wise reflection; returns `true` when any component
    /// reflection succeeded.
    pub fn reflect_from_limits(&self, point: &mut [f64]) -> bool {
        debug_assert_eq!(point.len(), self.parameters.len());

        let mut reflection_successful = false;
        for (param, value) in self.parameters.iter().zip(point.iter_mut()) {
            if param.reflect_from_limits(value) {
                reflection_successful = true;
            }
        }

        reflection_successful
    }
}

impl std::ops::Index<usize> for ParameterConfig {
    type Output = Parameter;

    fn index(&self, index: usize) -> &Parameter {
        &self.parameters[index]
    }
}

impl std::ops::IndexMut<usize> for ParameterConfig {
    fn index_mut(&mut self, index: usize) -> &mut Parameter {
        &mut self.parameters[index]
    }
}
