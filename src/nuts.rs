use std::{fmt::Debug, sync::Arc};

use rand::Rng;
use thiserror::Error;

use crate::{
    criterion::TerminationCriterion,
    hamiltonian::{Direction, DivergenceInfo, Hamiltonian},
    integrator::Integrator,
    math::logaddexp,
    model::LogpError,
    point::PhaseSpacePoint,
    resampling::{accept, ProgressiveSampling, ResamplingStrategy},
    stepsize::StepSizeSettings,
};

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum NutsError {
    #[error("Logp function returned error: {0}")]
    LogpFailure(Box<dyn std::error::Error + Send + Sync>),

    #[error("Could not initialize state because of bad initial gradient.")]
    BadInitGrad(),

    #[error("Invalid value {value} for setting {name}")]
    InvalidSetting { name: &'static str, value: f64 },

    #[error("Expected a vector of length {expected} but got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("The sampler has no position yet")]
    NotInitialized(),
}

pub type Result<T> = std::result::Result<T, NutsError>;

/// Callbacks for various events during a Nuts sampling step.
///
/// Collectors can compute statistics like the mean acceptance rate
/// or collect data for mass matrix adaptation.
pub trait Collector {
    /// Called after every integrator step. `end` is missing if the
    /// log density could not be evaluated.
    fn register_leapfrog(
        &mut self,
        _start: &PhaseSpacePoint,
        _end: Option<&PhaseSpacePoint>,
        _divergence_info: Option<&DivergenceInfo>,
    ) {
    }
    fn register_draw(&mut self, _point: &PhaseSpacePoint, _info: &SampleInfo) {}
    fn register_init(&mut self, _point: &PhaseSpacePoint, _options: &NutsOptions) {}
}

impl Collector for () {}

#[derive(Debug, Clone, Copy)]
pub struct NutsOptions {
    /// The maximum tree depth during sampling. The number of leapfrog steps
    /// is smaller than 2 ^ max_depth.
    pub max_depth: u64,
    /// If the energy error is larger than this threshold we treat the leapfrog
    /// step as a divergence.
    pub max_energy_error: f64,
    pub step_size: StepSizeSettings,
    pub progressive: ProgressiveSampling,
    /// Keep every point of the final trajectory together with its weight.
    pub store_trajectory: bool,
    /// Store start and end locations of divergences.
    pub store_divergences: bool,
}

impl Default for NutsOptions {
    fn default() -> Self {
        NutsOptions {
            max_depth: 10,
            max_energy_error: 1000f64,
            step_size: StepSizeSettings::default(),
            progressive: ProgressiveSampling::default(),
            store_trajectory: false,
            store_divergences: true,
        }
    }
}

impl NutsOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(NutsError::InvalidSetting {
                name: "max_depth",
                value: 0.,
            });
        }
        if !(self.max_energy_error > 0.) {
            return Err(NutsError::InvalidSetting {
                name: "max_energy_error",
                value: self.max_energy_error,
            });
        }
        self.step_size.validate()
    }
}

/// A point of the trajectory with its log selection weight.
#[derive(Debug, Clone)]
pub struct WeightedPoint {
    pub point: PhaseSpacePoint,
    pub log_weight: f64,
}

/// Why the trajectory stopped growing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The termination criterion fired, either on the whole trajectory or
    /// inside the last subtree.
    Terminated,
    /// A leapfrog step of the last subtree diverged.
    Diverged,
    MaxDepthReached,
}

/// Information about a draw, exported as part of the sampler stats
#[derive(Debug, Clone)]
pub struct SampleInfo {
    /// The depth of the trajectory that this point was sampled from
    pub depth: u64,
    /// Number of integrator steps, including those of a rejected subtree.
    pub leapfrog_steps: u64,
    /// Mean metropolis acceptance probability over all integrator steps.
    pub acceptance_statistic: f64,
    /// More detailed information about a divergence that might have
    /// occured in the trajectory.
    pub divergence_info: Option<DivergenceInfo>,
    pub termination: Termination,
    pub step_size: f64,
    pub initial_energy: f64,
    /// Every point of the accepted trajectory, if `store_trajectory` is set.
    pub trajectory: Option<Vec<WeightedPoint>>,
}

impl SampleInfo {
    pub fn diverging(&self) -> bool {
        self.divergence_info.is_some()
    }

    pub fn reached_maxdepth(&self) -> bool {
        self.termination == Termination::MaxDepthReached
    }
}

/// The result of building one subtree.
///
/// If `valid` is false the subtree was abandoned and only the step counts,
/// the metropolis sum and the divergence fields carry meaning.
#[derive(Debug)]
pub(crate) struct SubtreeResult<A> {
    pub valid: bool,
    pub divergent: bool,
    pub candidate: PhaseSpacePoint,
    /// The point of the subtree that is earliest in integration time.
    pub leftmost: PhaseSpacePoint,
    pub rightmost: PhaseSpacePoint,
    /// The termination criterion accumulated over exactly this subtree.
    pub accumulated: A,
    /// Log of the summed selection weights of the subtree.
    pub log_weight: f64,
    pub leapfrog_steps: u64,
    pub sum_metropolis_prob: f64,
    pub divergence_info: Option<DivergenceInfo>,
    pub leaves: Vec<WeightedPoint>,
}

impl<A> SubtreeResult<A> {
    /// The end the next subtree continues from.
    fn far_end(&self, direction: Direction) -> &PhaseSpacePoint {
        match direction {
            Direction::Forward => &self.rightmost,
            Direction::Backward => &self.leftmost,
        }
    }
}

/// Everything the recursion needs besides its arguments.
///
/// The builder exclusively borrows the random number generator; it is
/// consumed in recursion order, first half before second half, with one
/// draw per merge of two valid halves.
pub(crate) struct TreeBuilder<'a, H, I, T, S, R, C>
where
    H: Hamiltonian,
    I: Integrator<H>,
    T: TerminationCriterion,
    S: ResamplingStrategy,
    R: Rng + ?Sized,
    C: Collector,
{
    pub(crate) hamiltonian: &'a mut H,
    pub(crate) integrator: &'a mut I,
    pub(crate) criterion: &'a T,
    pub(crate) resampling: &'a S,
    pub(crate) rng: &'a mut R,
    pub(crate) collector: &'a mut C,
    pub(crate) auxiliary: S::Auxiliary,
    pub(crate) initial_energy: f64,
    pub(crate) step_size: f64,
    pub(crate) max_energy_error: f64,
    pub(crate) store_trajectory: bool,
    pub(crate) store_divergences: bool,
}

impl<H, I, T, S, R, C> TreeBuilder<'_, H, I, T, S, R, C>
where
    H: Hamiltonian,
    I: Integrator<H>,
    T: TerminationCriterion,
    S: ResamplingStrategy,
    R: Rng + ?Sized,
    C: Collector,
{
    /// Build a subtree with `2^height` leaves, continuing the trajectory
    /// from `start` in `direction`.
    pub(crate) fn build_tree(
        &mut self,
        height: u64,
        direction: Direction,
        start: &PhaseSpacePoint,
    ) -> Result<SubtreeResult<T::Accumulator>> {
        if height == 0 {
            return self.build_leaf(direction, start);
        }

        let first = self.build_tree(height - 1, direction, start)?;
        if !first.valid {
            return Ok(first);
        }
        let second = self.build_tree(height - 1, direction, first.far_end(direction))?;

        Ok(self.merge(first, second, direction))
    }

    fn merge(
        &mut self,
        first: SubtreeResult<T::Accumulator>,
        second: SubtreeResult<T::Accumulator>,
        direction: Direction,
    ) -> SubtreeResult<T::Accumulator> {
        let leapfrog_steps = first.leapfrog_steps + second.leapfrog_steps;
        let sum_metropolis_prob = first.sum_metropolis_prob + second.sum_metropolis_prob;

        if !second.valid {
            return SubtreeResult {
                leapfrog_steps,
                sum_metropolis_prob,
                ..second
            };
        }

        let log_weight = logaddexp(first.log_weight, second.log_weight);
        let candidate = if accept(self.rng, second.log_weight - log_weight) {
            second.candidate
        } else {
            first.candidate
        };

        let (leftmost, rightmost) = match direction {
            Direction::Forward => (first.leftmost, second.rightmost),
            Direction::Backward => (second.leftmost, first.rightmost),
        };

        let accumulated = self.criterion.merge(first.accumulated, &second.accumulated);
        let valid = self
            .criterion
            .keep_going(&*self.hamiltonian, &leftmost, &rightmost, &accumulated);

        let mut leaves = first.leaves;
        leaves.extend(second.leaves);

        SubtreeResult {
            valid,
            divergent: false,
            candidate,
            leftmost,
            rightmost,
            accumulated,
            log_weight,
            leapfrog_steps,
            sum_metropolis_prob,
            divergence_info: None,
            leaves,
        }
    }

    fn build_leaf(
        &mut self,
        direction: Direction,
        start: &PhaseSpacePoint,
    ) -> Result<SubtreeResult<T::Accumulator>> {
        let sign = direction.sign();
        let epsilon = (sign as f64) * self.step_size;

        let mut end = match self.integrator.step(self.hamiltonian, start, epsilon) {
            Ok(end) => end,
            Err(logp_error) => {
                if !logp_error.is_recoverable() {
                    return Err(NutsError::LogpFailure(Box::new(logp_error)));
                }
                let mut info = self.divergence_info(start, None, None);
                info.logp_function_error = Some(Arc::new(logp_error));
                self.collector.register_leapfrog(start, None, Some(&info));
                return Ok(self.diverged_leaf(start, info, 0.));
            }
        };
        end.index_in_trajectory = start.index_in_trajectory + sign;

        let mut energy = self.hamiltonian.total_energy(&end);
        if !energy.is_finite() {
            energy = f64::INFINITY;
        }
        let energy_error = energy - self.initial_energy;

        if energy_error > self.max_energy_error {
            let info = self.divergence_info(start, Some(&end), Some(energy_error));
            self.collector
                .register_leapfrog(start, Some(&end), Some(&info));
            let metropolis_prob = (-energy_error).min(0.).exp();
            return Ok(self.diverged_leaf(&end, info, metropolis_prob));
        }
        self.collector.register_leapfrog(start, Some(&end), None);

        let log_boltzmann = -energy_error;
        let valid = self
            .resampling
            .leaf_valid(self.auxiliary, energy_error, self.max_energy_error);
        let log_weight = self.resampling.leaf_log_weight(self.auxiliary, energy_error);
        let accumulated = self.criterion.leaf(&*self.hamiltonian, &end, log_boltzmann);

        let leaves = if self.store_trajectory {
            vec![WeightedPoint {
                point: end.clone(),
                log_weight,
            }]
        } else {
            vec![]
        };

        Ok(SubtreeResult {
            valid,
            divergent: false,
            candidate: end.clone(),
            leftmost: end.clone(),
            rightmost: end,
            accumulated,
            log_weight,
            leapfrog_steps: 1,
            sum_metropolis_prob: log_boltzmann.min(0.).exp(),
            divergence_info: None,
            leaves,
        })
    }

    fn diverged_leaf(
        &self,
        point: &PhaseSpacePoint,
        info: DivergenceInfo,
        metropolis_prob: f64,
    ) -> SubtreeResult<T::Accumulator> {
        SubtreeResult {
            valid: false,
            divergent: true,
            candidate: point.clone(),
            leftmost: point.clone(),
            rightmost: point.clone(),
            accumulated: self
                .criterion
                .leaf(&*self.hamiltonian, point, f64::NEG_INFINITY),
            log_weight: f64::NEG_INFINITY,
            leapfrog_steps: 1,
            sum_metropolis_prob: metropolis_prob,
            divergence_info: Some(info),
            leaves: vec![],
        }
    }

    fn divergence_info(
        &self,
        start: &PhaseSpacePoint,
        end: Option<&PhaseSpacePoint>,
        energy_error: Option<f64>,
    ) -> DivergenceInfo {
        if !self.store_divergences {
            return DivergenceInfo {
                energy_error,
                ..Default::default()
            };
        }
        DivergenceInfo {
            start_momentum: Some(start.momentum.clone()),
            start_location: Some(start.position.clone()),
            end_location: end.map(|end| end.position.clone()),
            energy_error,
            start_idx_in_trajectory: Some(start.index_in_trajectory),
            end_idx_in_trajectory: end.map(|end| end.index_in_trajectory),
            logp_function_error: None,
        }
    }
}

/// The state of the doubling loop between two extensions.
#[derive(Debug)]
pub(crate) struct TrajectoryState<A> {
    pub leftmost: PhaseSpacePoint,
    pub rightmost: PhaseSpacePoint,
    /// The running candidate for the next draw.
    pub sample: PhaseSpacePoint,
    pub depth: u64,
    pub log_weight: f64,
    pub accumulated: A,
    pub initial_energy: f64,
    pub leapfrog_steps: u64,
    pub sum_metropolis_prob: f64,
    pub divergence_info: Option<DivergenceInfo>,
    pub trajectory: Vec<WeightedPoint>,
}

pub(crate) enum ExtendResult<A> {
    /// The extension succeeded and the termination criterion
    /// was not reached.
    Growing(TrajectoryState<A>),
    /// The extension was rejected or the trajectory turned.
    Terminated(TrajectoryState<A>),
    /// A divergence happend during tree extension.
    Diverged(TrajectoryState<A>),
}

impl<A: Clone + Debug> TrajectoryState<A> {
    fn new<T: TerminationCriterion<Accumulator = A>, H: Hamiltonian>(
        init: PhaseSpacePoint,
        initial_energy: f64,
        criterion: &T,
        hamiltonian: &H,
        store_trajectory: bool,
    ) -> Self {
        let accumulated = criterion.leaf(hamiltonian, &init, 0.);
        let trajectory = if store_trajectory {
            vec![WeightedPoint {
                point: init.clone(),
                log_weight: 0.,
            }]
        } else {
            vec![]
        };
        TrajectoryState {
            leftmost: init.clone(),
            rightmost: init.clone(),
            sample: init,
            depth: 0,
            log_weight: 0.,
            accumulated,
            initial_energy,
            leapfrog_steps: 0,
            sum_metropolis_prob: 0.,
            divergence_info: None,
            trajectory,
        }
    }

    fn extend<H, I, T, S, R, C>(
        mut self,
        builder: &mut TreeBuilder<'_, H, I, T, S, R, C>,
        direction: Direction,
        progressive: ProgressiveSampling,
    ) -> Result<ExtendResult<A>>
    where
        H: Hamiltonian,
        I: Integrator<H>,
        T: TerminationCriterion<Accumulator = A>,
        S: ResamplingStrategy,
        R: Rng + ?Sized,
        C: Collector,
    {
        let start = match direction {
            Direction::Forward => &self.rightmost,
            Direction::Backward => &self.leftmost,
        };
        let subtree = builder.build_tree(self.depth, direction, start)?;

        self.leapfrog_steps += subtree.leapfrog_steps;
        self.sum_metropolis_prob += subtree.sum_metropolis_prob;

        if !subtree.valid {
            if subtree.divergent {
                self.divergence_info = subtree.divergence_info;
                return Ok(ExtendResult::Diverged(self));
            }
            return Ok(ExtendResult::Terminated(self));
        }

        match direction {
            Direction::Forward => self.rightmost = subtree.rightmost,
            Direction::Backward => self.leftmost = subtree.leftmost,
        }

        let log_accept = progressive.log_accept_probability(self.log_weight, subtree.log_weight);
        if accept(builder.rng, log_accept) {
            self.sample = subtree.candidate;
        }
        self.log_weight = logaddexp(self.log_weight, subtree.log_weight);
        self.accumulated = builder
            .criterion
            .merge(self.accumulated, &subtree.accumulated);
        self.trajectory.extend(subtree.leaves);
        self.depth += 1;

        if builder.criterion.keep_going(
            &*builder.hamiltonian,
            &self.leftmost,
            &self.rightmost,
            &self.accumulated,
        ) {
            Ok(ExtendResult::Growing(self))
        } else {
            Ok(ExtendResult::Terminated(self))
        }
    }

    fn info(self, termination: Termination, step_size: f64) -> (PhaseSpacePoint, SampleInfo) {
        let acceptance_statistic = if self.leapfrog_steps == 0 {
            0.
        } else {
            self.sum_metropolis_prob / self.leapfrog_steps as f64
        };
        let trajectory = if self.trajectory.is_empty() {
            None
        } else {
            Some(self.trajectory)
        };
        let info = SampleInfo {
            depth: self.depth,
            leapfrog_steps: self.leapfrog_steps,
            acceptance_statistic,
            divergence_info: self.divergence_info,
            termination,
            step_size,
            initial_energy: self.initial_energy,
            trajectory,
        };
        (self.sample, info)
    }
}

/// Run one NUTS transition starting at `init`.
///
/// `init` itself is never modified, so an unrecoverable logp error leaves
/// the caller's state as it was.
#[allow(clippy::too_many_arguments)]
pub(crate) fn draw<H, I, T, S, R, C>(
    init: &PhaseSpacePoint,
    rng: &mut R,
    hamiltonian: &mut H,
    integrator: &mut I,
    criterion: &T,
    resampling: &S,
    options: &NutsOptions,
    collector: &mut C,
) -> Result<(PhaseSpacePoint, SampleInfo)>
where
    H: Hamiltonian,
    I: Integrator<H>,
    T: TerminationCriterion,
    S: ResamplingStrategy,
    R: Rng + ?Sized,
    C: Collector,
{
    let step_size = options.step_size.sample(rng);

    let mut init = init.clone();
    hamiltonian.resample_momentum(&mut init, rng);
    init.index_in_trajectory = 0;
    collector.register_init(&init, options);

    let initial_energy = hamiltonian.total_energy(&init);
    let auxiliary = resampling.draw_auxiliary(rng);

    let mut tree = TrajectoryState::new(
        init,
        initial_energy,
        criterion,
        &*hamiltonian,
        options.store_trajectory,
    );
    let mut builder = TreeBuilder {
        hamiltonian,
        integrator,
        criterion,
        resampling,
        rng,
        collector,
        auxiliary,
        initial_energy,
        step_size,
        max_energy_error: options.max_energy_error,
        store_trajectory: options.store_trajectory,
        store_divergences: options.store_divergences,
    };

    let termination = loop {
        if tree.depth >= options.max_depth {
            break Termination::MaxDepthReached;
        }
        let direction: Direction = builder.rng.random();
        match tree.extend(&mut builder, direction, options.progressive)? {
            ExtendResult::Growing(next) => tree = next,
            ExtendResult::Terminated(next) => {
                tree = next;
                break Termination::Terminated;
            }
            ExtendResult::Diverged(next) => {
                tree = next;
                break Termination::Diverged;
            }
        }
    };

    let (point, info) = tree.info(termination, step_size);
    builder.collector.register_draw(&point, &info);
    Ok((point, info))
}
