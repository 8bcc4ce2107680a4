use rand::Rng;

use crate::{
    criterion::{EuclideanUTurn, Exhaustion, GeneralizedUTurn, TerminationCriterion},
    euclidean_hamiltonian::EuclideanHamiltonian,
    hamiltonian::{DivergenceInfo, Hamiltonian},
    integrator::{Integrator, Leapfrog},
    mass_matrix::DiagMassMatrix,
    math::logaddexp,
    model::CpuLogpFunc,
    nuts::{draw, Collector, NutsError, NutsOptions, Result, Termination, WeightedPoint},
    point::PhaseSpacePoint,
    resampling::{Multinomial, ProgressiveSampling, ResamplingStrategy, Slice},
    stepsize::{check_jitter, check_step_size},
};

/// Per transition diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diagnostics {
    pub depth: u64,
    pub leapfrog_steps: u64,
    pub divergent: bool,
    /// Total energy at the selected point.
    pub energy: f64,
    pub acceptance_statistic: f64,
    pub step_size: f64,
    pub termination: Termination,
}

/// The result of one transition.
#[derive(Debug, Clone)]
pub struct Sample {
    /// The position as reported by [`CpuLogpFunc::expand_vector`].
    pub position: Box<[f64]>,
    pub log_density: f64,
    pub index_in_trajectory: i64,
    pub diagnostics: Diagnostics,
    pub divergence_info: Option<DivergenceInfo>,
    /// Points of the trajectory with their selection log weights, if the
    /// sampler stores trajectories.
    pub trajectory: Option<Vec<WeightedPoint>>,
}

impl Sample {
    /// Rao-Blackwellized estimate of the expectation of `func` over the
    /// unconstrained positions of the stored trajectory.
    ///
    /// Returns `None` if the trajectory was not stored.
    pub fn expectation<F: FnMut(&[f64]) -> f64>(&self, mut func: F) -> Option<f64> {
        let trajectory = self.trajectory.as_ref()?;
        let total = trajectory
            .iter()
            .fold(f64::NEG_INFINITY, |acc, point| logaddexp(acc, point.log_weight));
        let estimate = trajectory
            .iter()
            .filter(|point| point.log_weight > f64::NEG_INFINITY)
            .map(|point| (point.log_weight - total).exp() * func(&point.point.position))
            .sum();
        Some(estimate)
    }
}

/// A No-U-Turn sampler for a single chain.
///
/// The sampler owns its hamiltonian, the random number generator and the
/// current point of the chain. The strategy for ending a trajectory and for
/// picking a point from it are chosen by the type parameters.
pub struct NutsSampler<H, I, T, S, R, C = ()>
where
    H: Hamiltonian,
    I: Integrator<H>,
    T: TerminationCriterion,
    S: ResamplingStrategy,
    R: Rng,
    C: Collector,
{
    hamiltonian: H,
    integrator: I,
    criterion: T,
    resampling: S,
    rng: R,
    collector: C,
    options: NutsOptions,
    point: Option<PhaseSpacePoint>,
    last: Option<Diagnostics>,
}

/// Multinomial sampling with the generalized no-u-turn criterion.
pub type DiagNuts<F, R> = NutsSampler<
    EuclideanHamiltonian<F, DiagMassMatrix>,
    Leapfrog,
    GeneralizedUTurn,
    Multinomial,
    R,
>;

/// Slice sampling with the classic no-u-turn criterion.
pub type DiagSliceNuts<F, R> =
    NutsSampler<EuclideanHamiltonian<F, DiagMassMatrix>, Leapfrog, EuclideanUTurn, Slice, R>;

/// Exhaustive hamiltonian monte carlo with multinomial sampling.
pub type DiagXhmc<F, R> =
    NutsSampler<EuclideanHamiltonian<F, DiagMassMatrix>, Leapfrog, Exhaustion, Multinomial, R>;

/// Create a sampler with a unit mass matrix, multinomial sampling and the
/// generalized no-u-turn criterion.
pub fn new_sampler<F: CpuLogpFunc, R: Rng>(
    logp: F,
    options: NutsOptions,
    rng: R,
) -> Result<DiagNuts<F, R>> {
    let mass_matrix = DiagMassMatrix::identity(logp.dim());
    let hamiltonian = EuclideanHamiltonian::new(logp, mass_matrix);
    NutsSampler::new(
        hamiltonian,
        Leapfrog,
        GeneralizedUTurn,
        Multinomial,
        options,
        rng,
    )
}

impl<H, I, T, S, R> NutsSampler<H, I, T, S, R>
where
    H: Hamiltonian,
    I: Integrator<H>,
    T: TerminationCriterion,
    S: ResamplingStrategy,
    R: Rng,
{
    pub fn new(
        hamiltonian: H,
        integrator: I,
        criterion: T,
        resampling: S,
        options: NutsOptions,
        rng: R,
    ) -> Result<Self> {
        options.validate()?;
        Ok(NutsSampler {
            hamiltonian,
            integrator,
            criterion,
            resampling,
            rng,
            collector: (),
            options,
            point: None,
            last: None,
        })
    }
}

impl<H, I, T, S, R, C> NutsSampler<H, I, T, S, R, C>
where
    H: Hamiltonian,
    I: Integrator<H>,
    T: TerminationCriterion,
    S: ResamplingStrategy,
    R: Rng,
    C: Collector,
{
    /// Replace the collector that observes every trajectory.
    pub fn with_collector<C2: Collector>(self, collector: C2) -> NutsSampler<H, I, T, S, R, C2> {
        NutsSampler {
            hamiltonian: self.hamiltonian,
            integrator: self.integrator,
            criterion: self.criterion,
            resampling: self.resampling,
            rng: self.rng,
            collector,
            options: self.options,
            point: self.point,
            last: self.last,
        }
    }

    /// Move the chain to `position`.
    pub fn set_position(&mut self, position: &[f64]) -> Result<()> {
        let dim = self.hamiltonian.dim();
        if position.len() != dim {
            return Err(NutsError::DimensionMismatch {
                expected: dim,
                found: position.len(),
            });
        }
        let mut point = PhaseSpacePoint::at_position(position);
        self.hamiltonian
            .update_potential_gradient(&mut point)
            .map_err(|e| NutsError::LogpFailure(Box::new(e)))?;
        if !point.potential_energy.is_finite() || !point.gradient.iter().all(|x| x.is_finite()) {
            return Err(NutsError::BadInitGrad());
        }
        self.hamiltonian.update_momentum_terms(&mut point);
        self.point = Some(point);
        Ok(())
    }

    /// The unconstrained position of the chain.
    pub fn position(&self) -> Option<&[f64]> {
        self.point.as_ref().map(|point| &point.position[..])
    }

    /// Perform one MCMC iteration.
    ///
    /// Divergences end the trajectory but are not errors. An unrecoverable
    /// error of the log density is returned and leaves the chain where it
    /// was.
    pub fn transition(&mut self) -> Result<Sample> {
        let init = self.point.as_ref().ok_or(NutsError::NotInitialized())?;
        let (point, info) = draw(
            init,
            &mut self.rng,
            &mut self.hamiltonian,
            &mut self.integrator,
            &self.criterion,
            &self.resampling,
            &self.options,
            &mut self.collector,
        )?;
        let position = self
            .hamiltonian
            .expand_position(&point)
            .map_err(|e| NutsError::LogpFailure(Box::new(e)))?;

        let diagnostics = Diagnostics {
            depth: info.depth,
            leapfrog_steps: info.leapfrog_steps,
            divergent: info.diverging(),
            energy: self.hamiltonian.total_energy(&point),
            acceptance_statistic: info.acceptance_statistic,
            step_size: info.step_size,
            termination: info.termination,
        };
        let sample = Sample {
            position,
            log_density: point.logp(),
            index_in_trajectory: point.index_in_trajectory,
            diagnostics,
            divergence_info: info.divergence_info,
            trajectory: info.trajectory,
        };

        self.point = Some(point);
        self.last = Some(diagnostics);
        Ok(sample)
    }

    pub fn set_max_depth(&mut self, max_depth: u64) -> Result<()> {
        if max_depth == 0 {
            return Err(NutsError::InvalidSetting {
                name: "max_depth",
                value: 0.,
            });
        }
        self.options.max_depth = max_depth;
        Ok(())
    }

    pub fn max_depth(&self) -> u64 {
        self.options.max_depth
    }

    pub fn set_max_energy_error(&mut self, max_energy_error: f64) -> Result<()> {
        if !(max_energy_error > 0.) {
            return Err(NutsError::InvalidSetting {
                name: "max_energy_error",
                value: max_energy_error,
            });
        }
        self.options.max_energy_error = max_energy_error;
        Ok(())
    }

    pub fn max_energy_error(&self) -> f64 {
        self.options.max_energy_error
    }

    pub fn set_step_size(&mut self, step_size: f64) -> Result<()> {
        check_step_size(step_size)?;
        self.options.step_size.step_size = step_size;
        Ok(())
    }

    pub fn step_size(&self) -> f64 {
        self.options.step_size.step_size
    }

    pub fn set_step_size_jitter(&mut self, jitter: f64) -> Result<()> {
        check_jitter(jitter)?;
        self.options.step_size.jitter = jitter;
        Ok(())
    }

    pub fn step_size_jitter(&self) -> f64 {
        self.options.step_size.jitter
    }

    pub fn set_progressive(&mut self, progressive: ProgressiveSampling) {
        self.options.progressive = progressive;
    }

    pub fn set_store_trajectory(&mut self, store_trajectory: bool) {
        self.options.store_trajectory = store_trajectory;
    }

    pub fn options(&self) -> &NutsOptions {
        &self.options
    }

    pub fn hamiltonian(&self) -> &H {
        &self.hamiltonian
    }

    pub fn hamiltonian_mut(&mut self) -> &mut H {
        &mut self.hamiltonian
    }

    pub fn collector(&self) -> &C {
        &self.collector
    }

    /// Diagnostics of the last transition.
    pub fn last_diagnostics(&self) -> Option<&Diagnostics> {
        self.last.as_ref()
    }

    pub fn depth(&self) -> u64 {
        self.last.map_or(0, |last| last.depth)
    }

    pub fn leapfrog_steps(&self) -> u64 {
        self.last.map_or(0, |last| last.leapfrog_steps)
    }

    pub fn divergent(&self) -> bool {
        self.last.is_some_and(|last| last.divergent)
    }

    pub fn energy(&self) -> Option<f64> {
        self.last.map(|last| last.energy)
    }
}
