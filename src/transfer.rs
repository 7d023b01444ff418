//! Transfer (activation) functions
//!
//! The set of transfer functions is closed, so it is an enum matched at each call
//! site. Each variant provides:
//! - Sigmoid: `y = 1 / (1 + e^-x)`, `dy/dx = y(1 - y)`
//! - TanH: `y = 2 / (1 + e^-2x) - 1`, `dy/dx = 1 - y²`
//! - ReLU: `y = max(0, x)`, `dy/dx = 1` for `x > 0` else `0`
//! - Linear: `y = x`, `dy/dx = 1`
//! - Softmax: joint over the whole vector, `y = exp(z - max z) / Σ exp(z - max z)`
//!
//! The ReLU derivative at exactly zero is taken as 0.
//!
//! Softmax has no meaningful single-unit form. Its scalar functions behave like
//! a one-element softmax (`apply` is 1, derivatives are 0); the full derivative
//! is the Jacobian returned by [`Transfer::softmax_jacobian`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NetError;
use crate::tensor::Tensor;

/// Activation applied to a layer's pre-activation values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transfer {
    Sigmoid,
    TanH,
    ReLU,
    Linear,
    Softmax,
}

/// Sigmoid activation function.
///
/// Returns the sigmoid of the input: 1 / (1 + exp(-x))
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Sigmoid derivative assuming y = sigmoid(x).
pub fn sigmoid_derivative_at(y: f64) -> f64 {
    y * (1.0 - y)
}

fn tanh(x: f64) -> f64 {
    2.0 / (1.0 + (-2.0 * x).exp()) - 1.0
}

/// Softmax applied in place. Uses max-subtraction so large logits do not overflow.
pub fn softmax_inplace(values: &mut [f64]) {
    if values.is_empty() {
        return;
    }
    let max_value = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut sum = 0.0;
    for value in values.iter_mut() {
        *value = (*value - max_value).exp();
        sum += *value;
    }

    let inv_sum = 1.0 / sum;
    for value in values.iter_mut() {
        *value *= inv_sum;
    }
}

impl Transfer {
    pub const ALL: [Transfer; 5] = [
        Transfer::Sigmoid,
        Transfer::TanH,
        Transfer::ReLU,
        Transfer::Linear,
        Transfer::Softmax,
    ];

    /// Short lowercase name, as used in configuration and persisted records.
    pub fn label(self) -> &'static str {
        match self {
            Transfer::Sigmoid => "sigmoid",
            Transfer::TanH => "tanh",
            Transfer::ReLU => "relu",
            Transfer::Linear => "linear",
            Transfer::Softmax => "softmax",
        }
    }

    /// True if the activation couples all units (only Softmax).
    pub fn is_joint(self) -> bool {
        matches!(self, Transfer::Softmax)
    }

    /// Value of the function at `x`.
    ///
    /// # Examples
    ///
    /// ```
    /// use neural_mbgd::transfer::Transfer;
    ///
    /// assert_eq!(Transfer::ReLU.apply(-2.0), 0.0);
    /// assert_eq!(Transfer::Sigmoid.apply(0.0), 0.5);
    /// ```
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Transfer::Sigmoid => sigmoid(x),
            Transfer::TanH => tanh(x),
            Transfer::ReLU => x.max(0.0),
            Transfer::Linear => x,
            Transfer::Softmax => 1.0,
        }
    }

    /// Derivative `dy/dx` at input `x`.
    pub fn derivative(self, x: f64) -> f64 {
        match self {
            Transfer::Sigmoid => sigmoid_derivative_at(sigmoid(x)),
            Transfer::TanH => {
                let y = tanh(x);
                1.0 - y * y
            }
            Transfer::ReLU => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Transfer::Linear => 1.0,
            Transfer::Softmax => 0.0,
        }
    }

    /// Derivative expressed in terms of the function's own output `y`.
    pub fn derivative_at(self, y: f64) -> f64 {
        match self {
            Transfer::Sigmoid => sigmoid_derivative_at(y),
            Transfer::TanH => 1.0 - y * y,
            Transfer::ReLU => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Transfer::Linear => 1.0,
            Transfer::Softmax => 0.0,
        }
    }

    /// Applies the function to a whole vector in place (jointly for Softmax).
    pub fn bulk_apply_inplace(self, values: &mut [f64]) {
        match self {
            Transfer::Softmax => softmax_inplace(values),
            Transfer::Linear => {}
            _ => values.iter_mut().for_each(|v| *v = self.apply(*v)),
        }
    }

    /// Applies the function to a copy of `values`.
    ///
    /// # Arguments
    /// * `values` - Pre-activations of a whole layer; Softmax normalises over
    ///   all of them
    pub fn bulk_apply(self, values: &[f64]) -> Vec<f64> {
        let mut out = values.to_vec();
        self.bulk_apply_inplace(&mut out);
        out
    }

    /// Derivatives at outputs `y`: shape `[n]` for elementwise functions, the
    /// `[n, n]` Jacobian for Softmax.
    pub fn bulk_derivative_at(self, y: &[f64]) -> Tensor {
        match self {
            Transfer::Softmax => Self::softmax_jacobian(y),
            _ => Tensor::vector(&y.iter().map(|&v| self.derivative_at(v)).collect::<Vec<_>>()),
        }
    }

    /// Softmax Jacobian at output `y`: `J[k, i] = y_i * (δ_ki - y_k)`.
    pub fn softmax_jacobian(y: &[f64]) -> Tensor {
        let n = y.len();
        let mut jacobian = Tensor::zeros(&[n, n]);
        for k in 0..n {
            let row = jacobian.row_mut(k);
            for i in 0..n {
                let delta = if i == k { 1.0 } else { 0.0 };
                row[i] = y[i] * (delta - y[k]);
            }
        }
        jacobian
    }

    /// Chain rule from output gradient `de_dy` to pre-activation gradient, given
    /// outputs `y`. Elementwise for all but Softmax, which uses the Jacobian
    /// product `de_dz_i = y_i * (de_dy_i - Σ_k de_dy_k * y_k)`.
    ///
    /// # Panics
    ///
    /// Panics if `y` and `de_dy` differ in length.
    pub fn chain(self, y: &[f64], de_dy: &[f64]) -> Vec<f64> {
        assert_eq!(y.len(), de_dy.len(), "outputs and gradients must have the same length");
        match self {
            Transfer::Softmax => {
                let weighted: f64 = y.iter().zip(de_dy).map(|(&yk, &dk)| yk * dk).sum();
                y.iter()
                    .zip(de_dy)
                    .map(|(&yi, &di)| yi * (di - weighted))
                    .collect()
            }
            _ => y
                .iter()
                .zip(de_dy)
                .map(|(&yi, &di)| di * self.derivative_at(yi))
                .collect(),
        }
    }
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Transfer {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Transfer::ALL
            .iter()
            .copied()
            .find(|t| t.label() == s)
            .ok_or_else(|| {
                NetError::invalid(format!(
                    "Invalid transfer function '{}'. Must be one of: sigmoid, tanh, relu, linear, softmax",
                    s
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_labels_round_trip() {
        for t in Transfer::ALL {
            assert_eq!(t.label().parse::<Transfer>().unwrap(), t);
        }
        assert!(matches!(
            "swish".parse::<Transfer>(),
            Err(NetError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_serde_uses_labels() {
        assert_eq!(serde_json::to_string(&Transfer::TanH).unwrap(), "\"tanh\"");
        assert_eq!(
            serde_json::from_str::<Transfer>("\"relu\"").unwrap(),
            Transfer::ReLU
        );
    }

    #[test]
    fn test_tanh_matches_std() {
        for &x in &[-3.0, -0.5, 0.0, 0.25, 2.0] {
            assert_relative_eq!(Transfer::TanH.apply(x), f64::tanh(x), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_relu_derivative_at_zero_is_zero() {
        assert_eq!(Transfer::ReLU.derivative(0.0), 0.0);
        assert_eq!(Transfer::ReLU.derivative_at(0.0), 0.0);
        assert_eq!(Transfer::ReLU.derivative(1e-9), 1.0);
    }

    #[test]
    fn test_softmax_scalar_functions() {
        assert_eq!(Transfer::Softmax.apply(3.0), 1.0);
        assert_eq!(Transfer::Softmax.derivative(3.0), 0.0);
        assert_eq!(Transfer::Softmax.derivative_at(0.3), 0.0);
    }

    #[test]
    fn test_softmax_large_values_stable() {
        let y = Transfer::Softmax.bulk_apply(&[1000.0, 1001.0, 1002.0]);
        assert!(y.iter().all(|v| v.is_finite()));
        assert_relative_eq!(y.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(y[2] > y[1] && y[1] > y[0]);
    }

    #[test]
    fn test_chain_softmax_matches_jacobian() {
        let y = Transfer::Softmax.bulk_apply(&[0.2, -0.4, 1.1]);
        let de_dy = [0.3, -1.2, 0.5];
        let jacobian = Transfer::softmax_jacobian(&y);
        let chained = Transfer::Softmax.chain(&y, &de_dy);
        for i in 0..3 {
            let expected: f64 = (0..3).map(|k| de_dy[k] * jacobian[[k, i]]).sum();
            assert_relative_eq!(chained[i], expected, epsilon = 1e-12);
        }
    }
}
