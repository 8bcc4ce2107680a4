use crate::{
    hamiltonian::Hamiltonian, mass_matrix::MassMatrix, model::CpuLogpFunc,
    point::PhaseSpacePoint,
};

/// A hamiltonian with a position independent kinetic energy
/// `p · M⁻¹ p / 2` and the negative log density as potential.
#[derive(Debug)]
pub struct EuclideanHamiltonian<F: CpuLogpFunc, Mass: MassMatrix> {
    logp: F,
    pub(crate) mass_matrix: Mass,
}

impl<F: CpuLogpFunc, Mass: MassMatrix> EuclideanHamiltonian<F, Mass> {
    pub fn new(logp: F, mass_matrix: Mass) -> Self {
        EuclideanHamiltonian { logp, mass_matrix }
    }

    pub fn mass_matrix(&self) -> &Mass {
        &self.mass_matrix
    }

    pub fn mass_matrix_mut(&mut self) -> &mut Mass {
        &mut self.mass_matrix
    }

    pub fn logp_func(&self) -> &F {
        &self.logp
    }
}

impl<F: CpuLogpFunc, Mass: MassMatrix> Hamiltonian for EuclideanHamiltonian<F, Mass> {
    type LogpError = F::LogpError;

    fn dim(&self) -> usize {
        self.logp.dim()
    }

    fn update_potential_gradient(
        &mut self,
        point: &mut PhaseSpacePoint,
    ) -> Result<(), F::LogpError> {
        let logp = self.logp.logp(&point.position, &mut point.gradient)?;
        point.gradient.iter_mut().for_each(|g| *g = -*g);
        point.potential_energy = -logp;
        Ok(())
    }

    fn update_momentum_terms(&self, point: &mut PhaseSpacePoint) {
        self.mass_matrix.update_velocity(point);
        self.mass_matrix.update_kinetic_energy(point);
    }

    fn resample_momentum<R: rand::Rng + ?Sized>(&self, point: &mut PhaseSpacePoint, rng: &mut R) {
        self.mass_matrix.randomize_momentum(point, rng);
        self.update_momentum_terms(point);
    }

    fn expand_position(&mut self, point: &PhaseSpacePoint) -> Result<Box<[f64]>, F::LogpError> {
        self.logp.expand_vector(&point.position)
    }
}
