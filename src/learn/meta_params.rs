//! Hyperparameters shared by every layer trainer

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NetError, Result};
use crate::optimizers::{nag, rmsprop, GradientDescentType};

/// Full set of training hyperparameters for a [`super::BPLayer`].
///
/// Defaults: learning rate 0.01, no weight decay, max-norm disabled, SGD,
/// momentum 0.9, decay 0.9, epsilon 1e-6. Momentum is only read by NAG and
/// decay/epsilon only by RMSProp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaParams {
    pub learning_rate: f64,
    pub weight_decay: f64,
    /// Ceiling on each unit's incoming weight norm; 0 disables clipping
    pub max_norm: f64,
    #[serde(rename = "gradient_descent")]
    pub gradient_descent_type: GradientDescentType,
    pub momentum: f64,
    pub decay: f64,
    pub epsilon: f64,
}

impl Default for MetaParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            weight_decay: 0.0,
            max_norm: 0.0,
            gradient_descent_type: GradientDescentType::Sgd,
            momentum: 0.9,
            decay: 0.9,
            epsilon: 1e-6,
        }
    }
}

pub(crate) fn check_learning_rate(learning_rate: f64) -> Result<()> {
    if !(learning_rate > 0.0 && learning_rate.is_finite()) {
        return Err(NetError::invalid(format!(
            "learning_rate must be positive, got {}",
            learning_rate
        )));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if !(value >= 0.0 && value.is_finite()) {
        return Err(NetError::invalid(format!(
            "{} must be non-negative, got {}",
            name, value
        )));
    }
    Ok(())
}

impl MetaParams {
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_gradient_descent(mut self, gradient_descent_type: GradientDescentType) -> Self {
        self.gradient_descent_type = gradient_descent_type;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn with_max_norm(mut self, max_norm: f64) -> Self {
        self.max_norm = max_norm;
        self
    }

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_learning_rate(self.learning_rate)?;
        check_non_negative("weight_decay", self.weight_decay)?;
        check_non_negative("max_norm", self.max_norm)?;
        nag::check_momentum(self.momentum)?;
        rmsprop::check_decay(self.decay)?;
        rmsprop::check_epsilon(self.epsilon)
    }
}

/// Partial hyperparameter change broadcast by `set_meta_params`.
///
/// `None` fields are left as they are. The optimiser type cannot be changed
/// this way since it would discard optimiser state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetaParamsUpdate {
    pub learning_rate: Option<f64>,
    pub weight_decay: Option<f64>,
    pub max_norm: Option<f64>,
    pub momentum: Option<f64>,
    pub decay: Option<f64>,
    pub epsilon: Option<f64>,
}

impl MetaParamsUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(lr) = self.learning_rate {
            check_learning_rate(lr)?;
        }
        if let Some(wd) = self.weight_decay {
            check_non_negative("weight_decay", wd)?;
        }
        if let Some(max_norm) = self.max_norm {
            check_non_negative("max_norm", max_norm)?;
        }
        if let Some(momentum) = self.momentum {
            nag::check_momentum(momentum)?;
        }
        if let Some(decay) = self.decay {
            rmsprop::check_decay(decay)?;
        }
        if let Some(epsilon) = self.epsilon {
            rmsprop::check_epsilon(epsilon)?;
        }
        debug!(update = ?self, "meta params validated");
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
