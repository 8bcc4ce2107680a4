//! The target density the sampler draws from.
//!
//! The model is a black box to the trajectory builder: it only ever sees
//! log density values and gradients produced through [`CpuLogpFunc`].

use std::fmt::Debug;

/// Errors that happen when we evaluate the logp and gradient function
pub trait LogpError: std::error::Error {
    /// Unrecoverable errors during logp computation stop sampling,
    /// recoverable errors are seen as divergences.
    fn is_recoverable(&self) -> bool;
}

/// An unnormalized log density with gradient on an unconstrained space.
pub trait CpuLogpFunc {
    type LogpError: Debug + Send + Sync + LogpError + 'static;

    /// The dimension of the unconstrained parameter space.
    fn dim(&self) -> usize;

    /// Compute the log density at `position` and write its gradient
    /// (with respect to `position`) into `gradient`.
    fn logp(&mut self, position: &[f64], gradient: &mut [f64]) -> Result<f64, Self::LogpError>;

    /// Map an unconstrained position to the values reported in a sample.
    ///
    /// Models with constrained parameters override this to apply their
    /// transformations. The default reports the unconstrained position.
    fn expand_vector(&mut self, position: &[f64]) -> Result<Box<[f64]>, Self::LogpError> {
        Ok(position.into())
    }
}

impl<F: CpuLogpFunc + ?Sized> CpuLogpFunc for &mut F {
    type LogpError = F::LogpError;

    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn logp(&mut self, position: &[f64], gradient: &mut [f64]) -> Result<f64, Self::LogpError> {
        (**self).logp(position, gradient)
    }

    fn expand_vector(&mut self, position: &[f64]) -> Result<Box<[f64]>, Self::LogpError> {
        (**self).expand_vector(position)
    }
}

#[cfg(test)]
pub(crate) mod test_logps {
    use thiserror::Error;

    use super::{CpuLogpFunc, LogpError};

    /// Independent normal distributions with a shared mean and unit variance.
    #[derive(Clone, Debug)]
    pub struct NormalLogp {
        pub dim: usize,
        pub mu: f64,
    }

    #[derive(Error, Debug)]
    pub enum NormalLogpError {}

    impl LogpError for NormalLogpError {
        fn is_recoverable(&self) -> bool {
            false
        }
    }

    impl CpuLogpFunc for NormalLogp {
        type LogpError = NormalLogpError;

        fn dim(&self) -> usize {
            self.dim
        }

        fn logp(&mut self, position: &[f64], gradient: &mut [f64]) -> Result<f64, NormalLogpError> {
            let n = position.len();
            assert!(gradient.len() == n);

            let mut logp = 0f64;
            for (p, g) in position.iter().zip(gradient.iter_mut()) {
                let val = self.mu - p;
                logp -= val * val / 2.;
                *g = val;
            }
            Ok(logp)
        }
    }
}
