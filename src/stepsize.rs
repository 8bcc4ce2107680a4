use rand::Rng;

use crate::nuts::{NutsError, Result};

/// Nominal integrator step size and its per transition jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepSizeSettings {
    pub step_size: f64,
    /// Relative amount of uniform jitter in `[0, 1)`. Each transition uses
    /// `step_size * (1 + jitter * (2u - 1))` with `u ~ U(0, 1)`.
    pub jitter: f64,
}

impl Default for StepSizeSettings {
    fn default() -> StepSizeSettings {
        StepSizeSettings {
            step_size: 1.,
            jitter: 0.,
        }
    }
}

impl StepSizeSettings {
    pub fn validate(&self) -> Result<()> {
        check_step_size(self.step_size)?;
        check_jitter(self.jitter)
    }

    /// The step size of one transition.
    ///
    /// Consumes a single uniform draw if jitter is enabled and none otherwise.
    pub(crate) fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.jitter > 0. {
            let u: f64 = rng.random();
            self.step_size * (1. + self.jitter * (2. * u - 1.))
        } else {
            self.step_size
        }
    }
}

pub(crate) fn check_step_size(step_size: f64) -> Result<()> {
    if step_size.is_finite() && step_size > 0. {
        Ok(())
    } else {
        Err(NutsError::InvalidSetting {
            name: "step_size",
            value: step_size,
        })
    }
}

pub(crate) fn check_jitter(jitter: f64) -> Result<()> {
    if (0. ..1.).contains(&jitter) {
        Ok(())
    } else {
        Err(NutsError::InvalidSetting {
            name: "step_size_jitter",
            value: jitter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn no_jitter_uses_no_randomness() {
        let settings = StepSizeSettings {
            step_size: 0.3,
            jitter: 0.,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut reference = rng.clone();
        assert_eq!(settings.sample(&mut rng), 0.3);
        assert_eq!(rng.random::<u64>(), reference.random::<u64>());
    }

    #[test]
    fn jitter_stays_in_range() {
        let settings = StepSizeSettings {
            step_size: 0.5,
            jitter: 0.2,
        };
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            let eps = settings.sample(&mut rng);
            assert!((0.4..=0.6).contains(&eps));
        }
    }

    #[test]
    fn invalid_values() {
        assert!(check_step_size(0.).is_err());
        assert!(check_step_size(-1.).is_err());
        assert!(check_step_size(f64::NAN).is_err());
        assert!(check_step_size(f64::INFINITY).is_err());
        assert!(check_step_size(1e-3).is_ok());
        assert!(check_jitter(1.5).is_err());
        assert!(check_jitter(-0.1).is_err());
        assert!(check_jitter(f64::NAN).is_err());
        assert!(check_jitter(1.).is_err());
        assert!(check_jitter(0.99).is_ok());
        assert!(check_jitter(0.).is_ok());
    }
}
