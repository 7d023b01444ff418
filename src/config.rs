//! Configuration structures for training
//!
//! This module parses training hyperparameters from JSON files and turns them
//! into [`MetaParams`] for new trainers or a [`MetaParamsUpdate`] for running ones.

use std::fs;
use std::str::FromStr;

use serde::Deserialize;
use tracing::info;

use crate::error::{NetError, Result};
use crate::learn::{MetaParams, MetaParamsUpdate};
use crate::objective::Objective;
use crate::optimizers::GradientDescentType;

/// Training configuration, every field optional.
///
/// Missing fields fall back to [`MetaParams::default`] when building full
/// parameters, and are left unchanged when applied as an update.
///
/// - **sgd**: uses `learning_rate` only
/// - **nag**: also reads `momentum`
/// - **rmsprop**: also reads `decay` and `epsilon`
///
/// # Example
///
/// ```json
/// {
///   "gradient_descent": "nag",
///   "learning_rate": 0.05,
///   "momentum": 0.9,
///   "weight_decay": 0.001,
///   "max_norm": 1.5,
///   "objective": "mse",
///   "batch_size": 4
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingConfig {
    /// Step size for every optimiser
    pub learning_rate: Option<f64>,

    /// L2 coefficient applied to non-bias weights
    pub weight_decay: Option<f64>,

    /// Ceiling on each unit's incoming weight norm (0 disables)
    pub max_norm: Option<f64>,

    /// Optimiser: "sgd", "nag" or "rmsprop"
    pub gradient_descent: Option<String>,

    /// Momentum for NAG, in [0, 1)
    pub momentum: Option<f64>,

    /// Squared-gradient decay for RMSProp, in [0, 1)
    pub decay: Option<f64>,

    /// Denominator offset for RMSProp
    pub epsilon: Option<f64>,

    /// Objective: "mse", "logloss" or "mlogloss"
    pub objective: Option<String>,

    /// Examples per batch
    pub batch_size: Option<usize>,
}

/// Loads a training configuration from a JSON file.
///
/// Reads the file at `path`, deserializes it into a `TrainingConfig` and
/// validates every field that is present.
///
/// # Examples
///
/// ```no_run
/// use neural_mbgd::config::load_config;
///
/// let cfg = load_config("config/xor_nag.json").unwrap();
/// let params = cfg.meta_params().unwrap();
/// ```
pub fn load_config(path: &str) -> Result<TrainingConfig> {
    let contents = fs::read_to_string(path)?;
    let config: TrainingConfig = serde_json::from_str(&contents)?;
    validate_config(&config)?;
    info!(path, "loaded training config");
    Ok(config)
}

fn validate_config(config: &TrainingConfig) -> Result<()> {
    config.meta_params()?;

    if let Some(ref objective) = config.objective {
        Objective::from_str(objective)?;
    }

    if config.batch_size == Some(0) {
        return Err(NetError::invalid("batch_size must be 1 or more"));
    }

    Ok(())
}

impl TrainingConfig {
    /// Full hyperparameters with defaults for missing fields.
    pub fn meta_params(&self) -> Result<MetaParams> {
        let defaults = MetaParams::default();
        let gradient_descent_type = match self.gradient_descent {
            Some(ref name) => GradientDescentType::from_str(name)?,
            None => defaults.gradient_descent_type,
        };
        let params = MetaParams {
            learning_rate: self.learning_rate.unwrap_or(defaults.learning_rate),
            weight_decay: self.weight_decay.unwrap_or(defaults.weight_decay),
            max_norm: self.max_norm.unwrap_or(defaults.max_norm),
            gradient_descent_type,
            momentum: self.momentum.unwrap_or(defaults.momentum),
            decay: self.decay.unwrap_or(defaults.decay),
            epsilon: self.epsilon.unwrap_or(defaults.epsilon),
        };
        params.validate()?;
        Ok(params)
    }

    /// Only the fields present, for `set_meta_params` on existing trainers.
    pub fn meta_params_update(&self) -> Result<MetaParamsUpdate> {
        let update = MetaParamsUpdate {
            learning_rate: self.learning_rate,
            weight_decay: self.weight_decay,
            max_norm: self.max_norm,
            momentum: self.momentum,
            decay: self.decay,
            epsilon: self.epsilon,
        };
        update.validate()?;
        Ok(update)
    }

    /// Configured objective, defaulting to mean squared error.
    pub fn objective(&self) -> Result<Objective> {
        match self.objective {
            Some(ref name) => Objective::from_str(name),
            None => Ok(Objective::MeanSquaredError),
        }
    }

    /// Configured batch size, defaulting to 1.
    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(1)
    }
}
