//! Nesterov accelerated gradient (NAG)
//!
//! `pre_step` moves the parameters to the look-ahead point
//! `params + momentum * velocity` so the gradient is evaluated there. `step`
//! then updates the velocity and moves the parameters so that, net of the
//! look-ahead, they advance by the new velocity:
//!
//! ```text
//! v_new   = momentum * v - learning_rate * g
//! params += v_new - momentum * v
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{check_len, NetError, Result};
use crate::optimizers::{check_step_args, Optimizer};

pub(crate) fn check_momentum(momentum: f64) -> Result<()> {
    if !(0.0..1.0).contains(&momentum) {
        return Err(NetError::invalid(format!(
            "momentum must be in [0, 1), got {}",
            momentum
        )));
    }
    Ok(())
}

/// Nesterov momentum optimiser with a per-parameter velocity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nag {
    num_params: usize,
    momentum: f64,
    param_update_velocity: Vec<f64>,
}

impl Nag {
    /// Velocity starts at zero.
    pub fn new(num_params: usize, momentum: f64) -> Result<Self> {
        check_momentum(momentum)?;
        Ok(Self {
            num_params,
            momentum,
            param_update_velocity: vec![0.0; num_params],
        })
    }

    /// Start from an explicit velocity.
    pub fn with_velocity(momentum: f64, velocity: Vec<f64>) -> Result<Self> {
        check_momentum(momentum)?;
        Ok(Self {
            num_params: velocity.len(),
            momentum,
            param_update_velocity: velocity,
        })
    }

    pub fn momentum(&self) -> f64 {
        self.momentum
    }

    pub fn set_momentum(&mut self, momentum: f64) -> Result<()> {
        check_momentum(momentum)?;
        self.momentum = momentum;
        Ok(())
    }

    pub fn param_update_velocity(&self) -> &[f64] {
        &self.param_update_velocity
    }
}

impl Optimizer for Nag {
    fn num_params(&self) -> usize {
        self.num_params
    }

    fn pre_step(&mut self, params: &mut [f64], _learning_rate: f64) -> Result<()> {
        check_len("params", params.len(), self.num_params)?;
        for (param, v) in params.iter_mut().zip(&self.param_update_velocity) {
            *param += self.momentum * v;
        }
        Ok(())
    }

    fn step(&mut self, params: &mut [f64], gradients: &[f64], learning_rate: f64) -> Result<()> {
        check_step_args(self.num_params, params, gradients)?;
        let momentum = self.momentum;
        for ((param, v), g) in params
            .iter_mut()
            .zip(self.param_update_velocity.iter_mut())
            .zip(gradients)
        {
            let v_new = momentum * *v - learning_rate * g;
            *param += v_new - momentum * *v;
            *v = v_new;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.param_update_velocity.fill(0.0);
    }
}
