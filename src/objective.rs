//! Objective (loss) functions and gradients at the pre-activation
//!
//! Losses are summed over the output vector. Predictions are clamped to at
//! least [`ETA`] before any logarithm or division, so the log losses stay finite
//! at saturated outputs.
//!
//! Besides `delta_loss` (gradient w.r.t. the prediction) every objective has a
//! fused `*_de_dz` function per transfer, giving the gradient w.r.t. the
//! pre-activation directly. Where the plain chain rule would divide by a
//! near-zero output and multiply it back again (log losses on sigmoid or
//! softmax), the fused form is the simplified analytic expression.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{check_len, NetError, Result};
use crate::transfer::Transfer;

/// Lower bound applied to predictions inside logarithms and divisions.
pub const ETA: f64 = 1e-15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Objective {
    #[serde(rename = "mse")]
    MeanSquaredError,
    #[serde(rename = "logloss")]
    LogLoss,
    #[serde(rename = "mlogloss")]
    MulticlassLogLoss,
}

fn check_pair(prediction: &[f64], target: &[f64]) -> Result<()> {
    check_len("target", target.len(), prediction.len())
}

impl Objective {
    pub const ALL: [Objective; 3] = [
        Objective::MeanSquaredError,
        Objective::LogLoss,
        Objective::MulticlassLogLoss,
    ];

    /// Short tag used in config files and persisted records.
    pub fn label(self) -> &'static str {
        match self {
            Objective::MeanSquaredError => "mse",
            Objective::LogLoss => "logloss",
            Objective::MulticlassLogLoss => "mlogloss",
        }
    }

    fn unsupported(self, transfer: Transfer) -> NetError {
        NetError::UnsupportedCombination {
            objective: self.label(),
            transfer: transfer.label(),
        }
    }

    /// Loss for one example, summed over output units.
    pub fn loss(self, prediction: &[f64], target: &[f64]) -> Result<f64> {
        check_pair(prediction, target)?;
        let pairs = prediction.iter().zip(target);
        let loss = match self {
            Objective::MeanSquaredError => {
                0.5 * pairs.map(|(&p, &t)| (p - t) * (p - t)).sum::<f64>()
            }
            Objective::LogLoss => -pairs
                .map(|(&p, &t)| t * p.max(ETA).ln() + (1.0 - t) * (1.0 - p).max(ETA).ln())
                .sum::<f64>(),
            Objective::MulticlassLogLoss => -pairs
                .filter(|&(_, &t)| t > 0.0)
                .map(|(&p, &t)| t * p.max(ETA).ln())
                .sum::<f64>(),
        };
        Ok(loss)
    }

    /// Gradient of the loss w.r.t. each prediction.
    ///
    /// For MulticlassLogLoss the entry is exactly `0.0` wherever the target is
    /// zero or negative, whatever the prediction. Such entries contribute
    /// nothing to [`Objective::loss`] either.
    ///
    /// # Arguments
    /// * `prediction` - Output of the layer, one value per unit
    /// * `target` - Desired output, same length as `prediction`
    pub fn delta_loss(self, prediction: &[f64], target: &[f64]) -> Result<Vec<f64>> {
        check_pair(prediction, target)?;
        let pairs = prediction.iter().zip(target);
        let delta = match self {
            Objective::MeanSquaredError => pairs.map(|(&p, &t)| p - t).collect(),
            Objective::LogLoss => pairs
                .map(|(&p, &t)| (1.0 - t) / (1.0 - p).max(ETA) - t / p.max(ETA))
                .collect(),
            Objective::MulticlassLogLoss => pairs
                .map(|(&p, &t)| if t > 0.0 { -t / p.max(ETA) } else { 0.0 })
                .collect(),
        };
        Ok(delta)
    }

    fn chained(self, transfer: Transfer, prediction: &[f64], target: &[f64]) -> Result<Vec<f64>> {
        let delta = self.delta_loss(prediction, target)?;
        Ok(transfer.chain(prediction, &delta))
    }

    /// `de_dz` for a sigmoid output layer.
    ///
    /// LogLoss cancels the sigmoid derivative and gives `p - t`, which stays
    /// finite for saturated outputs. MSE and MulticlassLogLoss chain their
    /// delta through `y(1 - y)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use neural_mbgd::objective::Objective;
    ///
    /// let d = Objective::LogLoss.sigmoid_de_dz(&[0.8, 0.1], &[1.0, 0.0]).unwrap();
    /// assert!((d[0] + 0.2).abs() < 1e-12);
    /// assert!((d[1] - 0.1).abs() < 1e-12);
    /// ```
    pub fn sigmoid_de_dz(self, prediction: &[f64], target: &[f64]) -> Result<Vec<f64>> {
        match self {
            Objective::LogLoss => {
                check_pair(prediction, target)?;
                Ok(prediction.iter().zip(target).map(|(&p, &t)| p - t).collect())
            }
            Objective::MeanSquaredError | Objective::MulticlassLogLoss => {
                self.chained(Transfer::Sigmoid, prediction, target)
            }
        }
    }

    /// `de_dz` for a tanh output layer. Only MSE is defined, since tanh outputs
    /// are not probabilities.
    pub fn tanh_de_dz(self, prediction: &[f64], target: &[f64]) -> Result<Vec<f64>> {
        match self {
            Objective::MeanSquaredError => self.chained(Transfer::TanH, prediction, target),
            _ => Err(self.unsupported(Transfer::TanH)),
        }
    }

    /// `de_dz` for a ReLU output layer (MSE only).
    pub fn relu_de_dz(self, prediction: &[f64], target: &[f64]) -> Result<Vec<f64>> {
        match self {
            Objective::MeanSquaredError => self.chained(Transfer::ReLU, prediction, target),
            _ => Err(self.unsupported(Transfer::ReLU)),
        }
    }

    /// `de_dz` for a linear output layer: the MSE delta `p - t` unchanged.
    pub fn linear_de_dz(self, prediction: &[f64], target: &[f64]) -> Result<Vec<f64>> {
        match self {
            Objective::MeanSquaredError => self.delta_loss(prediction, target),
            _ => Err(self.unsupported(Transfer::Linear)),
        }
    }

    /// `de_dz` for a softmax output layer.
    ///
    /// MulticlassLogLoss reduces to `p * Σt - t` over the positive targets,
    /// which is `p - t` for a one-hot target. The other objectives go through
    /// the softmax Jacobian.
    pub fn softmax_de_dz(self, prediction: &[f64], target: &[f64]) -> Result<Vec<f64>> {
        match self {
            Objective::MulticlassLogLoss => {
                check_pair(prediction, target)?;
                let total: f64 = target.iter().filter(|&&t| t > 0.0).sum();
                Ok(prediction
                    .iter()
                    .zip(target)
                    .map(|(&p, &t)| p * total - t.max(0.0))
                    .collect())
            }
            Objective::MeanSquaredError | Objective::LogLoss => {
                self.chained(Transfer::Softmax, prediction, target)
            }
        }
    }

    /// Gradient of the loss w.r.t. the pre-activation of an output layer using
    /// `transfer`. `prediction` is the layer's output.
    pub fn de_dz(self, transfer: Transfer, prediction: &[f64], target: &[f64]) -> Result<Vec<f64>> {
        match transfer {
            Transfer::Sigmoid => self.sigmoid_de_dz(prediction, target),
            Transfer::TanH => self.tanh_de_dz(prediction, target),
            Transfer::ReLU => self.relu_de_dz(prediction, target),
            Transfer::Linear => self.linear_de_dz(prediction, target),
            Transfer::Softmax => self.softmax_de_dz(prediction, target),
        }
    }

    /// True if [`Objective::de_dz`] has a rule for this transfer.
    pub fn supports(self, transfer: Transfer) -> bool {
        match self {
            Objective::MeanSquaredError => true,
            Objective::LogLoss | Objective::MulticlassLogLoss => {
                matches!(transfer, Transfer::Sigmoid | Transfer::Softmax)
            }
        }
    }
}

/// Name-based dispatcher, e.g. `de_dz("mlogloss", "softmax", &p, &t)`.
///
/// Unknown names fail with `InvalidArgument`; known pairs without a rule fail
/// with `UnsupportedCombination`.
pub fn de_dz(
    objective_name: &str,
    transfer_name: &str,
    prediction: &[f64],
    target: &[f64],
) -> Result<Vec<f64>> {
    let objective: Objective = objective_name.parse()?;
    let transfer: Transfer = transfer_name.parse()?;
    objective.de_dz(transfer, prediction, target)
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Objective {
    type Err = NetError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Objective::ALL
            .iter()
            .copied()
            .find(|o| o.label() == s)
            .ok_or_else(|| {
                NetError::invalid(format!(
                    "Invalid objective '{}'. Must be one of: mse, logloss, mlogloss",
                    s
                ))
            })
    }
}
