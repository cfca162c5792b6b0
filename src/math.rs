//! Probability densities used as demo and test targets.

use std::f64::consts::PI;

/// Normal (Gaussian) probability density.
pub fn normal_pdf(x: f64, mean: f64, sigma: f64) -> f64 {
    let z = (x - mean) / sigma;
    (-0.5 * z * z).exp() / (sigma * (2.0 * PI).sqrt())
}

/// Bivariate normal probability density with correlation `corr`.
pub fn bivariate_normal_pdf(
    x1: f64,
    x2: f64,
    mean1: f64,
    mean2: f64,
    sigma1: f64,
    sigma2: f64,
    corr: f64,
) -> f64 {
    let z1 = (x1 - mean1) / sigma1;
    let z2 = (x2 - mean2) / sigma2;
    let one_minus_r2 = 1.0 - corr * corr;

    let norm = 2.0 * PI * sigma1 * sigma2 * one_minus_r2.sqrt();
    let exponent = -(z1 * z1 - 2.0 * corr * z1 * z2 + z2 * z2) / (2.0 * one_minus_r2);

    exponent.exp() / norm
}
