use crate::math::{axpy, axpy_out};

/// A point in phase space.
///
/// Points are plain values. The integrator produces a fresh point for every
/// step and the trajectory builder clones a point whenever an endpoint or a
/// candidate has to outlive the call that produced it, so no two parts of a
/// trajectory ever share mutable state.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSpacePoint {
    pub position: Box<[f64]>,
    pub momentum: Box<[f64]>,
    /// The derivative of the kinetic energy with respect to the momentum.
    ///
    /// Kept in sync with `momentum` by [`crate::Hamiltonian::update_momentum_terms`].
    pub velocity: Box<[f64]>,
    /// Gradient of the potential energy, i.e. the negative gradient of the
    /// log density.
    pub gradient: Box<[f64]>,
    pub potential_energy: f64,
    pub kinetic_energy: f64,
    /// Number of signed leapfrog steps between this point and the
    /// initial point of the current trajectory.
    pub index_in_trajectory: i64,
}

impl PhaseSpacePoint {
    pub fn new(dim: usize) -> Self {
        PhaseSpacePoint {
            position: vec![0f64; dim].into(),
            momentum: vec![0f64; dim].into(),
            velocity: vec![0f64; dim].into(),
            gradient: vec![0f64; dim].into(),
            potential_energy: 0f64,
            kinetic_energy: 0f64,
            index_in_trajectory: 0,
        }
    }

    /// A point at `position` with zero momentum. Energies and gradient
    /// still have to be filled in by the hamiltonian.
    pub fn at_position(position: &[f64]) -> Self {
        let mut point = Self::new(position.len());
        point.position.copy_from_slice(position);
        point
    }

    pub fn dim(&self) -> usize {
        self.position.len()
    }

    pub fn logp(&self) -> f64 {
        -self.potential_energy
    }

    /// The total energy (potential + kinetic)
    pub fn energy(&self) -> f64 {
        self.potential_energy + self.kinetic_energy
    }

    pub(crate) fn first_momentum_halfstep(&self, out: &mut Self, epsilon: f64) {
        axpy_out(&self.gradient, &self.momentum, -epsilon / 2., &mut out.momentum);
    }

    pub(crate) fn position_step(&self, out: &mut Self, epsilon: f64) {
        axpy_out(&out.velocity, &self.position, epsilon, &mut out.position);
    }

    pub(crate) fn second_momentum_halfstep(&mut self, epsilon: f64) {
        axpy(&self.gradient, &mut self.momentum, -epsilon / 2.);
    }
}
