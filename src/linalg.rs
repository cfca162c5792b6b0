//! Dense vector/matrix aliases and the Cholesky routine used by the
//! parameter model, the proposal kernels and the chain statistics.

use nalgebra as na;

/// Dense column vector of `f64`.
pub type Vector = na::DVector<f64>;

/// Dense square matrix of `f64`. Lower-triangular matrices are stored
/// densely; producers only fill the lower triangle.
pub type Matrix = na::DMatrix<f64>;

/// Infinity norm (largest absolute element) of a vector, 0 when empty.
pub fn norm_inf(v: &Vector) -> f64 {
    v.iter().fold(0.0, |acc: f64, x| acc.max(x.abs()))
}

/// Render a vector for log output as `[n](v0, v1, …)`.
pub fn format_vector(v: &Vector) -> String {
    use std::fmt::Write;

    let mut out = format!("[{}](", v.len());
    for (i, value) in v.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}", value);
    }
    out.push(')');
    out
}

/**
Decompose a symmetric positive definite matrix `a` into the product
`L · Lᵀ` of a lower triangular matrix with its transpose.

Only the lower triangle of `a` is accessed. `l` is resized and zeroed
before the decomposition.

Returns 0 on success. If the decomposition fails on a non-positive pivot,
returns `1 + k` where `k` is the failing row; `l` is then only partially
filled and must not be used.
*/
pub fn cholesky_decompose(a: &Matrix, l: &mut Matrix) -> usize {
    debug_assert_eq!(a.nrows(), a.ncols(), "cholesky input must be square");

    let n = a.nrows();
    if l.nrows() != n || l.ncols() != n {
        *l = Matrix::zeros(n, n);
    } else {
        l.fill(0.0);
    }

    for k in 0..n {
        let mut q = a[(k, k)];
        for j in 0..k {
            q -= l[(k, j)] * l[(k, j)];
        }

        if q <= 0.0 {
            return 1 + k;
        }

        let l_kk = q.sqrt();
        l[(k, k)] = l_kk;

        for i in (k + 1)..n {
            let mut s = a[(i, k)];
            for j in 0..k {
                s -= l[(i, j)] * l[(k, j)];
            }
            l[(i, k)] = s / l_kk;
        }
    }

    0
}
