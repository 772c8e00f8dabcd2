//! Explicit ODE integrators.
//!
//! An [`Integrator`] advances a state `[f64; N]` from `t_span.0` to `t_span.1`
//! given the right-hand side `f(t, y)`. The span is cut into evenly spaced
//! sample points and the solver lands exactly on each one; only the state at
//! the end of the span is returned.

use libm::{fabs, pow, sqrt};

/// Number of evenly spaced sample points used per integration span by default.
pub const DEFAULT_SAMPLE_COUNT: usize = 100;

/// A numerical ODE solver.
pub trait Integrator {
    /// Integrates `dynamics` over `t_span` starting from `initial` and returns
    /// the state at `t_span.1`.
    ///
    /// # Arguments
    ///
    /// * `dynamics`: Right-hand side `f(t, y)` of the system `dy/dt = f(t, y)`.
    /// * `t_span`: `(t_start, t_end)`. An empty or reversed span returns `initial` unchanged.
    /// * `initial`: State at `t_start`.
    /// * `sample_count`: Evenly spaced points across the span, endpoints included.
    ///   Values below 2 are treated as 2.
    fn integrate<F, const N: usize>(
        &self,
        dynamics: F,
        t_span: (f64, f64),
        initial: [f64; N],
        sample_count: usize,
    ) -> [f64; N]
    where
        F: Fn(f64, &[f64; N]) -> [f64; N];
}

/// Consecutive `(t_a, t_b)` intervals between evenly spaced sample points.
/// The last interval ends exactly on `t_span.1`.
fn sample_intervals(t_span: (f64, f64), sample_count: usize) -> impl Iterator<Item = (f64, f64)> {
    let (t_start, t_end) = t_span;
    let intervals = sample_count.max(2) - 1;
    let span = t_end - t_start;
    let at = move |i: usize| {
        if i == intervals {
            t_end
        } else {
            t_start + span * (i as f64) / (intervals as f64)
        }
    };
    (0..intervals).map(move |i| (at(i), at(i + 1)))
}

/// `y + h * sum(c_i * k_i)`.
fn combine<const N: usize>(y: &[f64; N], h: f64, terms: &[(f64, &[f64; N])]) -> [f64; N] {
    let mut out = *y;
    for i in 0..N {
        let mut acc = 0.0;
        for (c, k) in terms {
            acc += c * k[i];
        }
        out[i] += h * acc;
    }
    out
}

/// Classical fixed-step fourth-order Runge-Kutta.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rk4 {
    /// Number of equal RK4 steps taken between two consecutive sample points.
    pub steps_per_sample: usize,
}

impl Rk4 {
    /// Construct a fixed-step integrator taking `steps_per_sample` steps
    /// between sample points (at least one).
    pub const fn new(steps_per_sample: usize) -> Self {
        Rk4 { steps_per_sample }
    }

    fn step<F, const N: usize>(dynamics: &F, t: f64, y: &[f64; N], h: f64) -> [f64; N]
    where
        F: Fn(f64, &[f64; N]) -> [f64; N],
    {
        let t_mid = t + 0.5 * h;
        let k1 = dynamics(t, y);
        let k2 = dynamics(t_mid, &combine(y, 0.5 * h, &[(1.0, &k1)]));
        let k3 = dynamics(t_mid, &combine(y, 0.5 * h, &[(1.0, &k2)]));
        let k4 = dynamics(t + h, &combine(y, h, &[(1.0, &k3)]));
        const ONE_BY_SIX: f64 = 1.0 / 6.0;
        const ONE_BY_THREE: f64 = 1.0 / 3.0;
        combine(
            y,
            h,
            &[(ONE_BY_SIX, &k1), (ONE_BY_THREE, &k2), (ONE_BY_THREE, &k3), (ONE_BY_SIX, &k4)],
        )
    }
}

impl Default for Rk4 {
    fn default() -> Self {
        Rk4::new(4)
    }
}

impl Integrator for Rk4 {
    fn integrate<F, const N: usize>(
        &self,
        dynamics: F,
        t_span: (f64, f64),
        initial: [f64; N],
        sample_count: usize,
    ) -> [f64; N]
    where
        F: Fn(f64, &[f64; N]) -> [f64; N],
    {
        // Also catches NaN endpoints.
        if !(t_span.1 > t_span.0) {
            return initial;
        }
        let steps = self.steps_per_sample.max(1);
        let mut y = initial;
        for (t_a, t_b) in sample_intervals(t_span, sample_count) {
            let h = (t_b - t_a) / (steps as f64);
            for i in 0..steps {
                let t = t_a + h * (i as f64);
                y = Self::step(&dynamics, t, &y, h);
            }
        }
        y
    }
}

// Dormand-Prince 5(4) tableau.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// Difference between the 5th and embedded 4th order weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// Adaptive Dormand-Prince 5(4) integrator.
///
/// Steps are accepted when the RMS of the embedded error estimate, scaled by
/// `atol + rtol * |y|`, is at most one. A non-finite error estimate accepts
/// the step as-is so that NaN and infinity propagate instead of stalling the
/// solver. The step budget applies to each sample interval on its own: once
/// `max_steps` attempts are spent, the rest of that interval is covered in one
/// step without error control and the next interval starts with a fresh budget.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dopri5 {
    /// Relative tolerance.
    pub rtol: f64,
    /// Absolute tolerance.
    pub atol: f64,
    /// Step attempts allowed per sample interval before error control is dropped.
    pub max_steps: usize,
}

impl Dopri5 {
    /// Construct an adaptive integrator with the given tolerances.
    pub const fn new(rtol: f64, atol: f64) -> Self {
        Dopri5 {
            rtol,
            atol,
            max_steps: 10_000,
        }
    }

    /// Set the per-interval step attempt budget.
    pub const fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    fn error_norm<const N: usize>(&self, y: &[f64; N], y_new: &[f64; N], err: &[f64; N]) -> f64 {
        let mut sum = 0.0;
        for i in 0..N {
            let scale = self.atol + self.rtol * fabs(y[i]).max(fabs(y_new[i]));
            let e = err[i] / scale;
            sum += e * e;
        }
        sqrt(sum / (N as f64))
    }

    /// One trial step. Returns the 5th order solution and the scaled error norm.
    fn step<F, const N: usize>(&self, dynamics: &F, t: f64, y: &[f64; N], h: f64) -> ([f64; N], f64)
    where
        F: Fn(f64, &[f64; N]) -> [f64; N],
    {
        let k1 = dynamics(t, y);
        let k2 = dynamics(t + C2 * h, &combine(y, h, &[(A21, &k1)]));
        let k3 = dynamics(t + C3 * h, &combine(y, h, &[(A31, &k1), (A32, &k2)]));
        let k4 = dynamics(
            t + C4 * h,
            &combine(y, h, &[(A41, &k1), (A42, &k2), (A43, &k3)]),
        );
        let k5 = dynamics(
            t + C5 * h,
            &combine(y, h, &[(A51, &k1), (A52, &k2), (A53, &k3), (A54, &k4)]),
        );
        let k6 = dynamics(
            t + h,
            &combine(y, h, &[(A61, &k1), (A62, &k2), (A63, &k3), (A64, &k4), (A65, &k5)]),
        );
        let y_new = combine(y, h, &[(B1, &k1), (B3, &k3), (B4, &k4), (B5, &k5), (B6, &k6)]);
        let k7 = dynamics(t + h, &y_new);

        let mut err = [0.0; N];
        for i in 0..N {
            err[i] = h
                * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
        }
        let norm = self.error_norm(y, &y_new, &err);
        (y_new, norm)
    }
}

impl Default for Dopri5 {
    fn default() -> Self {
        Dopri5::new(1e-9, 1e-12)
    }
}

impl Integrator for Dopri5 {
    fn integrate<F, const N: usize>(
        &self,
        dynamics: F,
        t_span: (f64, f64),
        initial: [f64; N],
        sample_count: usize,
    ) -> [f64; N]
    where
        F: Fn(f64, &[f64; N]) -> [f64; N],
    {
        if !(t_span.1 > t_span.0) {
            return initial;
        }

        let mut y = initial;
        let mut h_carry = f64::INFINITY;

        for (t_a, t_b) in sample_intervals(t_span, sample_count) {
            let mut t = t_a;
            let mut h = h_carry.min(t_b - t_a);
            let mut attempts = 0usize;
            while t < t_b {
                let remaining = t_b - t;
                let out_of_budget = attempts >= self.max_steps;
                let last = out_of_budget || h >= remaining;
                let step = if last { remaining } else { h };
                let (y_new, err) = self.step(&dynamics, t, &y, step);
                attempts += 1;

                if err <= 1.0 || !err.is_finite() || out_of_budget {
                    y = y_new;
                    t = if last { t_b } else { t + step };
                    // Only a controlled step may set the size carried forward.
                    if err.is_finite() && !out_of_budget {
                        let factor = if err == 0.0 {
                            MAX_FACTOR
                        } else {
                            (SAFETY * pow(err, -0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
                        };
                        h = step * factor;
                        h_carry = h;
                    }
                } else {
                    h = step * (SAFETY * pow(err, -0.2)).clamp(MIN_FACTOR, 1.0);
                }
            }
        }
        y
    }
}
