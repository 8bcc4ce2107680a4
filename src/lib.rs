//! The recursive trajectory builder of the No-U-Turn sampler.
//!
//! A [`NutsSampler`] draws one MCMC sample per [`NutsSampler::transition`]:
//! it resamples the momentum, then doubles a trajectory of leapfrog steps
//! in random directions until the termination criterion fires, a subtree
//! diverges or the maximum depth is reached. The sample is selected from the
//! trajectory with multinomial or slice sampling.
//!
//! ```
//! use nuts_tree::{new_sampler, CpuLogpFunc, LogpError, NutsOptions};
//! use rand::SeedableRng;
//! use thiserror::Error;
//!
//! struct StdNormal;
//!
//! #[derive(Debug, Error)]
//! enum StdNormalError {}
//!
//! impl LogpError for StdNormalError {
//!     fn is_recoverable(&self) -> bool {
//!         false
//!     }
//! }
//!
//! impl CpuLogpFunc for StdNormal {
//!     type LogpError = StdNormalError;
//!
//!     fn dim(&self) -> usize {
//!         2
//!     }
//!
//!     fn logp(&mut self, position: &[f64], gradient: &mut [f64]) -> Result<f64, StdNormalError> {
//!         let mut logp = 0.;
//!         for (x, grad) in position.iter().zip(gradient.iter_mut()) {
//!             logp -= x * x / 2.;
//!             *grad = -x;
//!         }
//!         Ok(logp)
//!     }
//! }
//!
//! let rng = rand::rngs::StdRng::seed_from_u64(42);
//! let mut sampler = new_sampler(StdNormal, NutsOptions::default(), rng).unwrap();
//! sampler.set_step_size(0.5).unwrap();
//! sampler.set_position(&[1., -1.]).unwrap();
//! for _ in 0..10 {
//!     let sample = sampler.transition().unwrap();
//!     assert_eq!(sample.position.len(), 2);
//! }
//! ```

pub(crate) mod chains;
pub(crate) mod criterion;
pub(crate) mod euclidean_hamiltonian;
pub(crate) mod hamiltonian;
pub(crate) mod integrator;
pub(crate) mod mass_matrix;
pub(crate) mod math;
pub(crate) mod model;
pub(crate) mod nuts;
pub(crate) mod point;
pub(crate) mod resampling;
pub(crate) mod sampler;
pub(crate) mod stepsize;

pub use chains::{chain_rng, sample_parallel, sample_sequentially, ChainSettings};
pub use criterion::{
    EuclideanUTurn, Exhaustion, GeneralizedUTurn, TerminationCriterion, VirialAverage,
};
pub use euclidean_hamiltonian::EuclideanHamiltonian;
pub use hamiltonian::{Direction, DivergenceInfo, Hamiltonian};
pub use integrator::{Integrator, Leapfrog};
pub use mass_matrix::{DiagMassMatrix, MassMatrix};
pub use math::logaddexp;
pub use model::{CpuLogpFunc, LogpError};
pub use nuts::{
    Collector, NutsError, NutsOptions, Result, SampleInfo, Termination, WeightedPoint,
};
pub use point::PhaseSpacePoint;
pub use resampling::{Multinomial, ProgressiveSampling, ResamplingStrategy, Slice};
pub use sampler::{
    new_sampler, Diagnostics, DiagNuts, DiagSliceNuts, DiagXhmc, NutsSampler, Sample,
};
pub use stepsize::StepSizeSettings;
