//! RMSProp optimizer implementation
//!
//! Keeps a decaying average of squared gradients and divides each update by
//! its square root:
//!
//! ```text
//! av      = decay * av + (1 - decay) * g²
//! params -= learning_rate * g / (sqrt(av) + epsilon)
//! ```
//!
//! The average starts at one rather than zero, so the first steps are not
//! inflated by a near-zero denominator.

use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};
use crate::optimizers::{check_step_args, Optimizer};

pub(crate) fn check_decay(decay: f64) -> Result<()> {
    if !(0.0..1.0).contains(&decay) {
        return Err(NetError::invalid(format!("decay must be in [0, 1), got {}", decay)));
    }
    Ok(())
}

pub(crate) fn check_epsilon(epsilon: f64) -> Result<()> {
    if !(epsilon > 0.0 && epsilon.is_finite()) {
        return Err(NetError::invalid(format!(
            "epsilon must be positive, got {}",
            epsilon
        )));
    }
    Ok(())
}

/// RMSProp optimiser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RmsProp {
    num_params: usize,
    decay: f64,
    epsilon: f64,
    av_squared_grads: Vec<f64>,
}

impl RmsProp {
    pub fn new(num_params: usize, decay: f64, epsilon: f64) -> Result<Self> {
        check_decay(decay)?;
        check_epsilon(epsilon)?;
        Ok(Self {
            num_params,
            decay,
            epsilon,
            av_squared_grads: vec![1.0; num_params],
        })
    }

    /// Start from an explicit running average.
    pub fn with_av_squared_grads(decay: f64, epsilon: f64, av_squared_grads: Vec<f64>) -> Result<Self> {
        check_decay(decay)?;
        check_epsilon(epsilon)?;
        Ok(Self {
            num_params: av_squared_grads.len(),
            decay,
            epsilon,
            av_squared_grads,
        })
    }

    pub fn decay(&self) -> f64 {
        self.decay
    }

    pub fn set_decay(&mut self, decay: f64) -> Result<()> {
        check_decay(decay)?;
        self.decay = decay;
        Ok(())
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f64) -> Result<()> {
        check_epsilon(epsilon)?;
        self.epsilon = epsilon;
        Ok(())
    }

    pub fn av_squared_grads(&self) -> &[f64] {
        &self.av_squared_grads
    }
}

impl Optimizer for RmsProp {
    fn num_params(&self) -> usize {
        self.num_params
    }

    fn pre_step(&mut self, params: &mut [f64], _learning_rate: f64) -> Result<()> {
        crate::error::check_len("params", params.len(), self.num_params)
    }

    fn step(&mut self, params: &mut [f64], gradients: &[f64], learning_rate: f64) -> Result<()> {
        check_step_args(self.num_params, params, gradients)?;
        let (decay, epsilon) = (self.decay, self.epsilon);
        for ((param, av), &g) in params
            .iter_mut()
            .zip(self.av_squared_grads.iter_mut())
            .zip(gradients)
        {
            *av = decay * *av + (1.0 - decay) * g * g;
            *param -= learning_rate * g / (av.sqrt() + epsilon);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.av_squared_grads.fill(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parameter_validation() {
        assert!(RmsProp::new(2, 0.9, 1e-6).is_ok());
        assert!(RmsProp::new(2, 1.0, 1e-6).is_err());
        assert!(RmsProp::new(2, 0.9, 0.0).is_err());
        assert!(RmsProp::new(2, 0.9, f64::NAN).is_err());
    }

    #[test]
    fn test_starts_with_ones() {
        let rms = RmsProp::new(3, 0.9, 1e-6).unwrap();
        assert_eq!(rms.av_squared_grads(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_single_step() {
        let mut rms = RmsProp::new(1, 0.9, 1e-6).unwrap();
        let mut params = vec![1.0];
        rms.step(&mut params, &[2.0], 0.1).unwrap();

        let av = 0.9 + 0.1 * 4.0;
        assert_relative_eq!(rms.av_squared_grads()[0], av, epsilon = 1e-15);
        assert_relative_eq!(params[0], 1.0 - 0.1 * 2.0 / (av.sqrt() + 1e-6), epsilon = 1e-15);
    }

    #[test]
    fn test_pre_step_is_noop_and_reset_restores_ones() {
        let mut rms = RmsProp::new(2, 0.5, 1e-6).unwrap();
        let mut params = vec![0.3, 0.4];
        rms.pre_step(&mut params, 1.0).unwrap();
        assert_eq!(params, vec![0.3, 0.4]);

        rms.step(&mut params, &[0.5, -0.5], 0.1).unwrap();
        assert_ne!(rms.av_squared_grads(), &[1.0, 1.0]);
        rms.reset();
        assert_eq!(rms.av_squared_grads(), &[1.0, 1.0]);
    }
}
