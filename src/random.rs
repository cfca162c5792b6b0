/*!
# Thread-local random number service

Every thread owns one Mersenne Twister (MT19937) engine, allocated on the
thread's first draw. A process-wide atomic counter supplies the engine
seeds: [`seed`] stores the initial counter value, and each new engine is
constructed with the current counter value before incrementing it. Engines
that already exist keep their state when [`seed`] is called again, so
deterministic runs seed first and then sample from a fresh thread.

All draws go through the calling thread's engine without synchronization;
the only shared state is the increment-only seed counter.
*/

use std::cell::RefCell;
use std::sync::atomic::{AtomicU32, Ordering};

use rand::distributions::uniform::SampleUniform;
use rand::distributions::WeightedIndex;
use rand::{Rng, RngCore};
use rand_distr::{Distribution, Exp, Normal, Poisson, StudentT};
use rand_mt::Mt19937GenRand32;

use crate::linalg::{Matrix, Vector};

static SEED_COUNTER: AtomicU32 = AtomicU32::new(0);

thread_local! {
    static ENGINE: RefCell<Mt19937GenRand32> = RefCell::new(Mt19937GenRand32::new(
        SEED_COUNTER.fetch_add(1, Ordering::SeqCst),
    ));
}

/// Set the initial value of the global seed counter.
///
/// For `seed = 0`, a non-deterministic value is drawn from the operating
/// system. Threads that have already sampled keep their current engines.
pub fn seed(seed: u32) {
    let value = if seed == 0 {
        rand::rngs::OsRng.next_u32()
    } else {
        seed
    };
    SEED_COUNTER.store(value, Ordering::SeqCst);
}

/// Run `f` with mutable access to the calling thread's engine.
///
/// This is the escape hatch for drawing from distribution objects the
/// service has no named helper for.
pub fn with_engine<T>(f: impl FnOnce(&mut Mt19937GenRand32) -> T) -> T {
    ENGINE.with(|engine| f(&mut engine.borrow_mut()))
}

/// Uniform draw from `[min, max)`.
pub fn uniform(min: f64, max: f64) -> f64 {
    if !(min < max) {
        return min;
    }
    with_engine(|rng| rng.gen_range(min..max))
}

/// Uniform draw with explicit bound inclusion on either side.
pub fn uniform_in(min: f64, max: f64, min_included: bool, max_included: bool) -> f64 {
    if !(min < max) {
        return min;
    }
    let lo = if min_included { min } else { min.next_up() };
    with_engine(|rng| {
        if max_included {
            rng.gen_range(lo..=max)
        } else {
            rng.gen_range(lo..max)
        }
    })
}

/// Uniform integer draw from `[min, max]`, both bounds included.
pub fn uniform_int<T>(min: T, max: T) -> T
where
    T: SampleUniform + PartialOrd + Copy,
{
    with_engine(|rng| rng.gen_range(min..=max))
}

/// Returns `true` with the given probability.
///
/// A uniform `[0, 1)` draw is compared against `probability`, so any
/// `probability <= 0` yields `false` and any `probability >= 1` yields
/// `true`.
pub fn draw_bool(probability: f64) -> bool {
    uniform(0.0, 1.0) < probability
}

/// Draw from a normal distribution.
pub fn normal(mean: f64, sigma: f64) -> f64 {
    let dist = Normal::new(mean, sigma).expect("normal distribution parameters");
    with_engine(|rng| dist.sample(rng))
}

/// Draw from a Student-T distribution with `dof` degrees of freedom.
pub fn student_t(dof: f64) -> f64 {
    let dist = StudentT::new(dof).expect("student-t degrees of freedom");
    with_engine(|rng| dist.sample(rng))
}

/// Draw from an exponential distribution according to `exp(-t/tau)`.
pub fn exponential(tau: f64) -> f64 {
    let dist = Exp::new(1.0 / tau).expect("exponential rate");
    with_engine(|rng| dist.sample(rng))
}

/// Draw an integer from a Poisson distribution.
pub fn poisson_int(mean: f64) -> u64 {
    let dist = Poisson::new(mean).expect("poisson mean");
    with_engine(|rng| dist.sample(rng)) as u64
}

/// Draw a float from a Poisson distribution.
///
/// For means too large for the integer sampler, the draw is substituted
/// by `normal(mean, sqrt(mean))`.
pub fn poisson(mean: f64) -> f64 {
    if mean > u64::MAX as f64 / 2.0 {
        normal(mean, mean.sqrt())
    } else {
        let dist = Poisson::new(mean).expect("poisson mean");
        with_engine(|rng| dist.sample(rng))
    }
}

/// Produce an index in `[0, weights.len())` with probability proportional
/// to the corresponding weight.
pub fn discrete(weights: &[f64]) -> usize {
    let dist = WeightedIndex::new(weights.iter().copied()).expect("discrete weights");
    with_engine(|rng| dist.sample(rng))
}

/**
Draw from a multivariate distribution with correlations.

`cholesky` is the lower triangular Cholesky factor `L` of the target
covariance matrix; its diagonal elements correspond to the individual
standard deviations. With `noise` a vector of i.i.d. draws from `dist`,
the result is `mean + L · noise` (so the sample covariance of repeated
standard-normal draws converges to `L · Lᵀ`).
*/
pub fn from_multivariate<D>(dist: &D, mean: &Vector, cholesky: &Matrix) -> Vector
where
    D: Distribution<f64>,
{
    debug_assert_eq!(mean.len(), cholesky.nrows());

    let noise = with_engine(|rng| {
        Vector::from_iterator(mean.len(), (0..mean.len()).map(|_| dist.sample(rng)))
    });

    mean + cholesky * noise
}

/// Draw from a multivariate distribution without correlations.
///
/// `sigma` holds the per-component standard deviations.
pub fn from_multivariate_diag<D>(dist: &D, mean: &Vector, sigma: &Vector) -> Vector
where
    D: Distribution<f64>,
{
    debug_assert_eq!(mean.len(), sigma.len());

    let noise = with_engine(|rng| {
        Vector::from_iterator(mean.len(), (0..mean.len()).map(|_| dist.sample(rng)))
    });

    mean + sigma.component_mul(&noise)
}
