use crate::{hamiltonian::Hamiltonian, point::PhaseSpacePoint};

/// A time reversible numerical integrator of hamiltonian dynamics.
pub trait Integrator<H: Hamiltonian> {
    /// Advance `start` by a single step of signed size `epsilon`.
    ///
    /// Errors of the log density propagate unchanged, the caller decides
    /// whether they count as a divergence.
    fn step(
        &mut self,
        hamiltonian: &mut H,
        start: &PhaseSpacePoint,
        epsilon: f64,
    ) -> Result<PhaseSpacePoint, H::LogpError>;
}

/// The explicit leapfrog (velocity verlet) scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct Leapfrog;

impl<H: Hamiltonian> Integrator<H> for Leapfrog {
    fn step(
        &mut self,
        hamiltonian: &mut H,
        start: &PhaseSpacePoint,
        epsilon: f64,
    ) -> Result<PhaseSpacePoint, H::LogpError> {
        let mut out = start.clone();

        start.first_momentum_halfstep(&mut out, epsilon);
        hamiltonian.update_momentum_terms(&mut out);

        start.position_step(&mut out, epsilon);
        hamiltonian.update_potential_gradient(&mut out)?;

        out.second_momentum_halfstep(epsilon);
        hamiltonian.update_momentum_terms(&mut out);

        Ok(out)
    }
}
