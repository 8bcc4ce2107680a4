//! Termination criteria for the trajectory.
//!
//! A criterion summarizes every piece of the trajectory in an accumulator.
//! Accumulators of adjacent pieces are merged while the tree is built, and
//! the criterion decides from the outermost points of a piece and its
//! accumulator whether that piece may keep growing.

use std::fmt::Debug;

use crate::{
    hamiltonian::Hamiltonian,
    math::{axpy, logaddexp, scalar_prods, scalar_prods_of_diff},
    point::PhaseSpacePoint,
};

pub trait TerminationCriterion {
    type Accumulator: Clone + Debug;

    /// The accumulator of a trajectory consisting of `point` only.
    ///
    /// `log_weight` is the boltzmann weight `H0 - h` of the point.
    fn leaf<H: Hamiltonian>(
        &self,
        hamiltonian: &H,
        point: &PhaseSpacePoint,
        log_weight: f64,
    ) -> Self::Accumulator;

    /// Combine the accumulators of two adjacent pieces of a trajectory.
    fn merge(&self, left: Self::Accumulator, right: &Self::Accumulator) -> Self::Accumulator;

    /// Return `false` if the trajectory between `leftmost` and `rightmost`
    /// (in integration time order) should stop growing.
    fn keep_going<H: Hamiltonian>(
        &self,
        hamiltonian: &H,
        leftmost: &PhaseSpacePoint,
        rightmost: &PhaseSpacePoint,
        accumulated: &Self::Accumulator,
    ) -> bool;
}

/// The generalized no-u-turn criterion.
///
/// The accumulator is the sum `ρ` of all momenta of the trajectory. The
/// trajectory turned if `ρ` points against the conjugate quantity `p♯`
/// at either end.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneralizedUTurn;

impl TerminationCriterion for GeneralizedUTurn {
    type Accumulator = Box<[f64]>;

    fn leaf<H: Hamiltonian>(
        &self,
        _hamiltonian: &H,
        point: &PhaseSpacePoint,
        _log_weight: f64,
    ) -> Box<[f64]> {
        point.momentum.clone()
    }

    fn merge(&self, mut left: Box<[f64]>, right: &Box<[f64]>) -> Box<[f64]> {
        axpy(right, &mut left, 1.);
        left
    }

    fn keep_going<H: Hamiltonian>(
        &self,
        hamiltonian: &H,
        leftmost: &PhaseSpacePoint,
        rightmost: &PhaseSpacePoint,
        rho: &Box<[f64]>,
    ) -> bool {
        let (turn_right, turn_left) = scalar_prods(
            rho,
            hamiltonian.conjugate_quantity(rightmost),
            hamiltonian.conjugate_quantity(leftmost),
        );
        (turn_right > 0.) & (turn_left > 0.)
    }
}

/// The classic no-u-turn criterion: the trajectory turned once the
/// momentum at either end points against the displacement between the ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanUTurn;

impl TerminationCriterion for EuclideanUTurn {
    type Accumulator = ();

    fn leaf<H: Hamiltonian>(&self, _hamiltonian: &H, _point: &PhaseSpacePoint, _log_weight: f64) {}

    fn merge(&self, _left: (), _right: &()) {}

    fn keep_going<H: Hamiltonian>(
        &self,
        _hamiltonian: &H,
        leftmost: &PhaseSpacePoint,
        rightmost: &PhaseSpacePoint,
        _accumulated: &(),
    ) -> bool {
        let (turn_left, turn_right) = scalar_prods_of_diff(
            &rightmost.position,
            &leftmost.position,
            &leftmost.momentum,
            &rightmost.momentum,
        );
        (turn_left > 0.) & (turn_right > 0.)
    }
}

/// Exhaustive termination.
///
/// Stops once the boltzmann weighted average of `dG/dt` over the
/// trajectory has dropped below `x_delta` in magnitude.
#[derive(Debug, Clone, Copy)]
pub struct Exhaustion {
    pub x_delta: f64,
}

impl Default for Exhaustion {
    fn default() -> Self {
        Exhaustion { x_delta: 0.1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirialAverage {
    pub log_weight: f64,
    pub average: f64,
}

impl TerminationCriterion for Exhaustion {
    type Accumulator = VirialAverage;

    fn leaf<H: Hamiltonian>(
        &self,
        hamiltonian: &H,
        point: &PhaseSpacePoint,
        log_weight: f64,
    ) -> VirialAverage {
        VirialAverage {
            log_weight,
            average: hamiltonian.dg_dt(point),
        }
    }

    fn merge(&self, left: VirialAverage, right: &VirialAverage) -> VirialAverage {
        let log_weight = logaddexp(left.log_weight, right.log_weight);
        if log_weight == f64::NEG_INFINITY {
            return VirialAverage {
                log_weight,
                average: 0.5 * (left.average + right.average),
            };
        }
        let average = (left.log_weight - log_weight).exp() * left.average
            + (right.log_weight - log_weight).exp() * right.average;
        VirialAverage {
            log_weight,
            average,
        }
    }

    fn keep_going<H: Hamiltonian>(
        &self,
        _hamiltonian: &H,
        _leftmost: &PhaseSpacePoint,
        _rightmost: &PhaseSpacePoint,
        accumulated: &VirialAverage,
    ) -> bool {
        accumulated.average.abs() > self.x_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        euclidean_hamiltonian::EuclideanHamiltonian, mass_matrix::DiagMassMatrix,
        model::test_logps::NormalLogp,
    };
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    fn hamiltonian() -> EuclideanHamiltonian<NormalLogp, DiagMassMatrix> {
        EuclideanHamiltonian::new(NormalLogp { dim: 1, mu: 0. }, DiagMassMatrix::identity(1))
    }

    fn point(
        hamiltonian: &EuclideanHamiltonian<NormalLogp, DiagMassMatrix>,
        q: f64,
        p: f64,
    ) -> PhaseSpacePoint {
        let mut point = PhaseSpacePoint::at_position(&[q]);
        point.momentum[0] = p;
        point.gradient[0] = q;
        hamiltonian.update_momentum_terms(&mut point);
        point
    }

    #[test]
    fn generalized_uturn() {
        let h = hamiltonian();
        let criterion = GeneralizedUTurn;

        let left = point(&h, 0., 1.);
        let right = point(&h, 1., 0.5);
        let rho = criterion.merge(criterion.leaf(&h, &left, 0.), &criterion.leaf(&h, &right, 0.));
        assert_eq!(&rho[..], &[1.5]);
        assert!(criterion.keep_going(&h, &left, &right, &rho));

        let turned = point(&h, 1., -2.);
        let rho = criterion.merge(criterion.leaf(&h, &left, 0.), &criterion.leaf(&h, &turned, 0.));
        assert!(!criterion.keep_going(&h, &left, &turned, &rho));
    }

    #[test]
    fn euclidean_uturn() {
        let h = hamiltonian();
        let criterion = EuclideanUTurn;

        let left = point(&h, 0., 1.);
        assert!(criterion.keep_going(&h, &left, &point(&h, 1., 1.), &()));
        assert!(!criterion.keep_going(&h, &left, &point(&h, 1., -1.), &()));
        assert!(!criterion.keep_going(&h, &point(&h, 0., -1.), &point(&h, 1., 1.), &()));
    }

    #[test]
    fn exhaustion_average() {
        let h = hamiltonian();
        let criterion = Exhaustion { x_delta: 0.5 };

        // dG/dt = p² - q²
        let a = criterion.leaf(&h, &point(&h, 0., 1.), 0.);
        let b = criterion.leaf(&h, &point(&h, 1., 0.), 2f64.ln());
        assert_abs_diff_eq!(a.average, 1.);
        assert_abs_diff_eq!(b.average, -1.);

        let merged = criterion.merge(a, &b);
        assert_abs_diff_eq!(merged.log_weight, 3f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(merged.average, (1. - 2.) / 3., epsilon = 1e-12);

        let p = point(&h, 0., 0.);
        assert!(criterion.keep_going(&h, &p, &p, &a));
        assert!(!criterion.keep_going(&h, &p, &p, &merged));

        let lost = VirialAverage {
            log_weight: f64::NEG_INFINITY,
            average: 3.,
        };
        let merged = criterion.merge(lost, &lost);
        assert_eq!(merged.average, 3.);
    }
}
