//! Selection of the sample from the points of a trajectory.
//!
//! Both strategies work with log weights: the multinomial strategy uses
//! the boltzmann weight of every point, slice sampling gives each point
//! weight one if it lies inside the slice and zero otherwise. Combining
//! two pieces of a trajectory then always picks the candidate of a piece
//! with probability proportional to its summed weight.

use std::fmt::Debug;

use rand::Rng;

use crate::math::logaddexp;

pub trait ResamplingStrategy {
    /// A value drawn once per transition, before the trajectory is built.
    type Auxiliary: Copy + Debug;

    fn draw_auxiliary<R: Rng + ?Sized>(&self, rng: &mut R) -> Self::Auxiliary;

    /// Log selection weight of a point with energy error `h - H0`.
    fn leaf_log_weight(&self, auxiliary: Self::Auxiliary, energy_error: f64) -> f64;

    /// Whether a point with energy error `h - H0` allows the trajectory
    /// to keep growing.
    fn leaf_valid(
        &self,
        auxiliary: Self::Auxiliary,
        energy_error: f64,
        max_energy_error: f64,
    ) -> bool;
}

/// Multinomial sampling, every point is weighted by `exp(H0 - h)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Multinomial;

impl ResamplingStrategy for Multinomial {
    type Auxiliary = ();

    fn draw_auxiliary<R: Rng + ?Sized>(&self, _rng: &mut R) {}

    fn leaf_log_weight(&self, _auxiliary: (), energy_error: f64) -> f64 {
        -energy_error
    }

    fn leaf_valid(&self, _auxiliary: (), energy_error: f64, max_energy_error: f64) -> bool {
        energy_error <= max_energy_error
    }
}

/// Slice sampling with the auxiliary variable `log u`, `u ~ U(0, 1)`.
///
/// A point counts if `log u + h - H0 < 0`. Growth stops once a point falls
/// more than `max_energy_error` below the slice.
#[derive(Debug, Clone, Copy, Default)]
pub struct Slice;

impl ResamplingStrategy for Slice {
    type Auxiliary = f64;

    fn draw_auxiliary<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.random::<f64>().ln()
    }

    fn leaf_log_weight(&self, log_u: f64, energy_error: f64) -> f64 {
        if log_u + energy_error < 0. {
            0.
        } else {
            f64::NEG_INFINITY
        }
    }

    fn leaf_valid(&self, log_u: f64, energy_error: f64, max_energy_error: f64) -> bool {
        log_u + energy_error < max_energy_error
    }
}

/// How the candidate of a freshly built subtree competes with the running
/// sample of the trajectory in the doubling loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProgressiveSampling {
    /// Replace with probability `w_new / (w_old + w_new)`.
    #[default]
    Uniform,
    /// Replace with probability `min(1, w_new / w_old)`, which favours
    /// points far from the start of the trajectory.
    Biased,
}

impl ProgressiveSampling {
    pub(crate) fn log_accept_probability(self, log_weight_old: f64, log_weight_new: f64) -> f64 {
        match self {
            ProgressiveSampling::Uniform => {
                log_weight_new - logaddexp(log_weight_old, log_weight_new)
            }
            ProgressiveSampling::Biased => {
                let diff = log_weight_new - log_weight_old;
                if diff > 0. {
                    0.
                } else {
                    diff
                }
            }
        }
    }
}

/// Draw exactly one uniform number and accept with probability
/// `exp(log_accept_probability)`. Undefined probabilities reject.
pub(crate) fn accept<R: Rng + ?Sized>(rng: &mut R, log_accept_probability: f64) -> bool {
    let u: f64 = rng.random();
    u < log_accept_probability.exp()
}
