use itertools::izip;
use multiversion::multiversion;
use rand_distr::StandardNormal;

use crate::{
    math::{multiply, vector_dot},
    nuts::{NutsError, Result},
    point::PhaseSpacePoint,
};

/// The kinetic energy metric of a euclidean hamiltonian.
pub trait MassMatrix {
    fn update_velocity(&self, point: &mut PhaseSpacePoint);
    fn update_kinetic_energy(&self, point: &mut PhaseSpacePoint);
    fn randomize_momentum<R: rand::Rng + ?Sized>(&self, point: &mut PhaseSpacePoint, rng: &mut R);
}

/// A diagonal mass matrix, stored as its inverse (the variance of the
/// posterior in each coordinate).
#[derive(Debug, Clone)]
pub struct DiagMassMatrix {
    inv_stds: Box<[f64]>,
    variance: Box<[f64]>,
}

impl DiagMassMatrix {
    /// The unit metric.
    pub fn identity(ndim: usize) -> Self {
        Self {
            inv_stds: vec![1f64; ndim].into(),
            variance: vec![1f64; ndim].into(),
        }
    }

    pub fn new(variance: &[f64]) -> Result<Self> {
        let mut mass_matrix = Self::identity(variance.len());
        mass_matrix.update_diag(variance.iter().copied())?;
        Ok(mass_matrix)
    }

    /// Replace the diagonal of the inverse mass matrix.
    ///
    /// Every value has to be finite and positive, otherwise the
    /// mass matrix is left unchanged.
    pub fn update_diag(&mut self, new_variance: impl Iterator<Item = f64>) -> Result<()> {
        let new_variance: Box<[f64]> = new_variance.collect();
        if new_variance.len() != self.variance.len() {
            return Err(NutsError::DimensionMismatch {
                expected: self.variance.len(),
                found: new_variance.len(),
            });
        }
        if let Some(&bad) = new_variance.iter().find(|x| !(x.is_finite() && **x > 0f64)) {
            return Err(NutsError::InvalidSetting {
                name: "mass_matrix",
                value: bad,
            });
        }
        update_diag(&mut self.variance, &mut self.inv_stds, &new_variance);
        Ok(())
    }

    pub fn variance(&self) -> &[f64] {
        &self.variance
    }
}

#[multiversion(targets("x86_64+avx+avx2+fma", "arm+neon"))]
fn update_diag(variance_out: &mut [f64], inv_std_out: &mut [f64], new_variance: &[f64]) {
    izip!(variance_out, inv_std_out, new_variance).for_each(|(var, inv_std, &x)| {
        *var = x;
        *inv_std = (1. / x).sqrt();
    });
}

impl MassMatrix for DiagMassMatrix {
    fn update_velocity(&self, point: &mut PhaseSpacePoint) {
        multiply(&self.variance, &point.momentum, &mut point.velocity);
    }

    fn update_kinetic_energy(&self, point: &mut PhaseSpacePoint) {
        point.kinetic_energy = 0.5 * vector_dot(&point.momentum, &point.velocity);
    }

    fn randomize_momentum<R: rand::Rng + ?Sized>(&self, point: &mut PhaseSpacePoint, rng: &mut R) {
        point
            .momentum
            .iter_mut()
            .zip(self.inv_stds.iter())
            .for_each(|(p, &s)| {
                let norm: f64 = rng.sample(StandardNormal);
                *p = s * norm;
            });
    }
}
