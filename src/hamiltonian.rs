use std::{fmt::Debug, sync::Arc};

use rand_distr::{Distribution, StandardUniform};

use crate::{math::vector_dot, model::LogpError, point::PhaseSpacePoint};

/// Details about a divergence that might have occured during sampling
///
/// There are two reasons why we might observe a divergence:
/// - The integration error of the Hamiltonian is larger than
///   a cutoff value or nan.
/// - The logp function caused a recoverable error (eg if an ODE solver
///   failed)
#[derive(Debug, Clone, Default)]
pub struct DivergenceInfo {
    pub start_momentum: Option<Box<[f64]>>,
    pub start_location: Option<Box<[f64]>>,
    pub end_location: Option<Box<[f64]>>,
    pub energy_error: Option<f64>,
    pub start_idx_in_trajectory: Option<i64>,
    pub end_idx_in_trajectory: Option<i64>,
    pub logp_function_error: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn sign(self) -> i64 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

impl Distribution<Direction> for StandardUniform {
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Direction {
        if rng.random::<bool>() {
            Direction::Forward
        } else {
            Direction::Backward
        }
    }
}

/// The hamiltonian defined by the potential energy and the kinetic energy
pub trait Hamiltonian {
    /// Errors that happen during logp evaluation
    type LogpError: LogpError + Debug + Send + Sync + 'static;

    /// The dimension of the hamiltonian (position only).
    fn dim(&self) -> usize;

    /// Evaluate the potential energy and its gradient at the position
    /// of `point`.
    fn update_potential_gradient(
        &mut self,
        point: &mut PhaseSpacePoint,
    ) -> Result<(), Self::LogpError>;

    /// Recompute the velocity and kinetic energy after the momentum changed.
    fn update_momentum_terms(&self, point: &mut PhaseSpacePoint);

    /// Draw a new momentum, and update the velocity and kinetic energy.
    fn resample_momentum<R: rand::Rng + ?Sized>(&self, point: &mut PhaseSpacePoint, rng: &mut R);

    /// The total energy (potential + kinetic)
    fn total_energy(&self, point: &PhaseSpacePoint) -> f64 {
        point.energy()
    }

    /// The quantity conjugate to the momentum that enters the
    /// generalized no-u-turn criterion (`dτ/dp`).
    fn conjugate_quantity<'a>(&self, point: &'a PhaseSpacePoint) -> &'a [f64] {
        &point.velocity
    }

    /// Time derivative of the virial `G = p · q`, the quantity averaged by
    /// the exhaustion criterion.
    fn dg_dt(&self, point: &PhaseSpacePoint) -> f64 {
        vector_dot(&point.momentum, self.conjugate_quantity(point))
            - vector_dot(&point.position, &point.gradient)
    }

    /// The values that are reported for a sample at `point`.
    fn expand_position(&mut self, point: &PhaseSpacePoint) -> Result<Box<[f64]>, Self::LogpError>;
}
