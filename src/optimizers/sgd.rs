//! Stochastic Gradient Descent (SGD) optimizer implementation
//!
//! This module provides a vanilla SGD optimizer that performs the basic
//! gradient descent update: `parameter = parameter - learning_rate * gradient`

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::optimizers::{check_step_args, Optimizer};

/// Stochastic Gradient Descent optimizer.
///
/// Implements the basic gradient descent update rule without momentum or
/// adaptive learning rates:
///
/// `w = w - η * ∇L/∂w`
///
/// where w is the parameter, η (eta) is the learning rate, and ∇L/∂w is the gradient.
///
/// # Example
///
/// ```
/// use neural_mbgd::optimizers::{Optimizer, Sgd};
///
/// let mut optimizer = Sgd::new(3);
/// let mut params = vec![1.0, 2.0, 3.0];
///
/// optimizer.step(&mut params, &[0.1, 0.2, 0.3], 0.1).unwrap();
/// assert!((params[0] - 0.99).abs() < 1e-12);
/// assert!((params[2] - 2.97).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sgd {
    num_params: usize,
}

impl Sgd {
    pub fn new(num_params: usize) -> Self {
        Self { num_params }
    }
}

impl Optimizer for Sgd {
    fn num_params(&self) -> usize {
        self.num_params
    }

    /// SGD has no look-ahead; params are only length-checked.
    fn pre_step(&mut self, params: &mut [f64], _learning_rate: f64) -> Result<()> {
        crate::error::check_len("params", params.len(), self.num_params)
    }

    fn step(&mut self, params: &mut [f64], gradients: &[f64], learning_rate: f64) -> Result<()> {
        check_step_args(self.num_params, params, gradients)?;

        for (param, grad) in params.iter_mut().zip(gradients.iter()) {
            *param -= learning_rate * grad;
        }
        Ok(())
    }

    fn reset(&mut self) {
        // Vanilla SGD has no state to reset
    }
}
