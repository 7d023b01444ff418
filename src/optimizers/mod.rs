//! Gradient-descent optimisers for layer weight updates
//!
//! This module provides the Optimizer trait and the three update rules a
//! [`crate::learn::BPLayer`] can own:
//!
//! - SGD: `params -= learning_rate * gradients`
//! - NAG: Nesterov momentum, with a look-ahead shift in `pre_step`
//! - RMSProp: gradients scaled by a running average of their squares
//!
//! Each optimiser is sized at construction to a flat parameter count and
//! rejects parameter or gradient slices of any other length.
//!
//! # Example
//!
//! ```
//! use neural_mbgd::optimizers::{Nag, Optimizer};
//!
//! let mut optimizer = Nag::new(2, 0.9).unwrap();
//! let mut params = vec![1.0, -1.0];
//!
//! optimizer.pre_step(&mut params, 0.1).unwrap();
//! optimizer.step(&mut params, &[0.5, -0.5], 0.1).unwrap();
//! assert!((params[0] - 0.95).abs() < 1e-12);
//! ```

pub mod nag;
pub mod rmsprop;
pub mod sgd;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{check_len, NetError, Result};
use crate::learn::MetaParams;

pub use nag::Nag;
pub use rmsprop::RmsProp;
pub use sgd::Sgd;

/// Core trait for gradient-descent optimisers.
///
/// The caller drives each update in two phases:
///
/// 1. `pre_step` before gradients are evaluated (NAG moves the parameters to
///    the look-ahead point, the others do nothing)
/// 2. `step` with the gradients evaluated at the current parameters
///
/// Internal state (velocity, running averages) is owned exclusively by the
/// optimiser and carried from one call to the next.
pub trait Optimizer {
    /// Number of scalar parameters this optimiser was sized for.
    fn num_params(&self) -> usize;

    /// Adjust parameters before the gradient is evaluated.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `params.len() != num_params()`.
    fn pre_step(&mut self, params: &mut [f64], learning_rate: f64) -> Result<()>;

    /// Apply one update using `gradients`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if either slice length differs from `num_params()`.
    fn step(&mut self, params: &mut [f64], gradients: &[f64], learning_rate: f64) -> Result<()>;

    /// Return internal state to its initial value.
    fn reset(&mut self);
}

pub(crate) fn check_step_args(num_params: usize, params: &[f64], gradients: &[f64]) -> Result<()> {
    check_len("params", params.len(), num_params)?;
    check_len("gradients", gradients.len(), num_params)
}

/// Tag naming one of the supported optimisers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientDescentType {
    #[default]
    Sgd,
    Nag,
    RmsProp,
}

impl GradientDescentType {
    pub fn label(self) -> &'static str {
        match self {
            GradientDescentType::Sgd => "sgd",
            GradientDescentType::Nag => "nag",
            GradientDescentType::RmsProp => "rmsprop",
        }
    }
}

impl fmt::Display for GradientDescentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GradientDescentType {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sgd" => Ok(GradientDescentType::Sgd),
            "nag" => Ok(GradientDescentType::Nag),
            "rmsprop" => Ok(GradientDescentType::RmsProp),
            other => Err(NetError::invalid(format!(
                "Invalid gradient descent type '{}'. Must be one of: sgd, nag, rmsprop",
                other
            ))),
        }
    }
}

/// Closed set of optimisers a layer trainer can own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GradientDescent {
    Sgd(Sgd),
    Nag(Nag),
    RmsProp(RmsProp),
}

impl GradientDescent {
    /// Build the optimiser selected by `params.gradient_descent_type`.
    pub fn from_meta_params(num_params: usize, params: &MetaParams) -> Result<Self> {
        Ok(match params.gradient_descent_type {
            GradientDescentType::Sgd => GradientDescent::Sgd(Sgd::new(num_params)),
            GradientDescentType::Nag => GradientDescent::Nag(Nag::new(num_params, params.momentum)?),
            GradientDescentType::RmsProp => GradientDescent::RmsProp(RmsProp::new(
                num_params,
                params.decay,
                params.epsilon,
            )?),
        })
    }

    pub fn gradient_descent_type(&self) -> GradientDescentType {
        match self {
            GradientDescent::Sgd(_) => GradientDescentType::Sgd,
            GradientDescent::Nag(_) => GradientDescentType::Nag,
            GradientDescent::RmsProp(_) => GradientDescentType::RmsProp,
        }
    }

    fn inner(&self) -> &dyn Optimizer {
        match self {
            GradientDescent::Sgd(o) => o,
            GradientDescent::Nag(o) => o,
            GradientDescent::RmsProp(o) => o,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Optimizer {
        match self {
            GradientDescent::Sgd(o) => o,
            GradientDescent::Nag(o) => o,
            GradientDescent::RmsProp(o) => o,
        }
    }

    /// Update momentum (NAG only; ignored by the others).
    pub fn set_momentum(&mut self, momentum: f64) -> Result<()> {
        if let GradientDescent::Nag(nag) = self {
            nag.set_momentum(momentum)?;
        }
        Ok(())
    }

    /// Update decay (RMSProp only; ignored by the others).
    pub fn set_decay(&mut self, decay: f64) -> Result<()> {
        if let GradientDescent::RmsProp(rms) = self {
            rms.set_decay(decay)?;
        }
        Ok(())
    }

    /// Update epsilon (RMSProp only; ignored by the others).
    pub fn set_epsilon(&mut self, epsilon: f64) -> Result<()> {
        if let GradientDescent::RmsProp(rms) = self {
            rms.set_epsilon(epsilon)?;
        }
        Ok(())
    }

    /// Checks that internal state has `num_params` entries, e.g. after
    /// deserialising.
    pub fn validate(&self) -> Result<()> {
        match self {
            GradientDescent::Sgd(_) => Ok(()),
            GradientDescent::Nag(o) => {
                check_len("param_update_velocity", o.param_update_velocity().len(), o.num_params())?;
                nag::check_momentum(o.momentum())
            }
            GradientDescent::RmsProp(o) => {
                check_len("av_squared_grads", o.av_squared_grads().len(), o.num_params())?;
                rmsprop::check_decay(o.decay())?;
                rmsprop::check_epsilon(o.epsilon())
            }
        }
    }
}

impl Optimizer for GradientDescent {
    fn num_params(&self) -> usize {
        self.inner().num_params()
    }

    fn pre_step(&mut self, params: &mut [f64], learning_rate: f64) -> Result<()> {
        self.inner_mut().pre_step(params, learning_rate)
    }

    fn step(&mut self, params: &mut [f64], gradients: &[f64], learning_rate: f64) -> Result<()> {
        self.inner_mut().step(params, gradients, learning_rate)
    }

    fn reset(&mut self) {
        self.inner_mut().reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_labels() {
        for t in [
            GradientDescentType::Sgd,
            GradientDescentType::Nag,
            GradientDescentType::RmsProp,
        ] {
            assert_eq!(t.label().parse::<GradientDescentType>().unwrap(), t);
        }
        assert!("adam".parse::<GradientDescentType>().is_err());
    }

    #[test]
    fn test_from_meta_params_selects_type() {
        let mut params = MetaParams::default();
        params.gradient_descent_type = GradientDescentType::RmsProp;
        let gd = GradientDescent::from_meta_params(6, &params).unwrap();
        assert_eq!(gd.gradient_descent_type(), GradientDescentType::RmsProp);
        assert_eq!(gd.num_params(), 6);
    }

    #[test]
    fn test_serde_tagged_by_type() {
        let gd = GradientDescent::Nag(Nag::new(2, 0.5).unwrap());
        let json = serde_json::to_string(&gd).unwrap();
        assert!(json.contains("\"type\":\"nag\""));
        let back: GradientDescent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, gd);
    }

    #[test]
    fn test_validate_catches_bad_state() {
        let json = r#"{"type":"rmsprop","num_params":3,"decay":0.9,"epsilon":1e-6,"av_squared_grads":[1.0]}"#;
        let gd: GradientDescent = serde_json::from_str(json).unwrap();
        assert!(gd.validate().is_err());
    }
}
