//! Feed-forward (fully connected) layer
//!
//! A [`Layer`] performs `output = transfer(input × W + b)`. The weight matrix and
//! the bias vector share one tensor of shape `[num_inputs + 1, num_outputs]`:
//! row `i < num_inputs` holds the weights from input `i`, the last row holds the
//! biases.

use std::str::FromStr;

use crate::error::{check_len, NetError, Result};
use crate::tensor::Tensor;
use crate::transfer::Transfer;
use crate::utils::SeededRng;

/// Fully connected layer with a transfer function.
///
/// The layer holds no gradient state. Training reads its weights and writes
/// them back through [`crate::learn::BPLayer`].
///
/// # Example
///
/// ```
/// use neural_mbgd::layers::Layer;
/// use neural_mbgd::tensor::Tensor;
/// use neural_mbgd::transfer::Transfer;
///
/// // 2 inputs + bias row, 1 output
/// let weights = Tensor::from_vec(vec![3, 1], vec![0.5, -0.25, 0.1]).unwrap();
/// let layer = Layer::from_weights(weights, Transfer::Linear).unwrap();
/// let out = layer.forward(&[2.0, 4.0]).unwrap();
/// assert!((out[0] - 0.1).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    num_inputs: usize,
    num_outputs: usize,
    weights: Tensor,
    transfer: Transfer,
}

fn check_sizes(num_inputs: usize, num_outputs: usize) -> Result<()> {
    if num_inputs < 1 {
        return Err(NetError::invalid("Input size must be 1 or more"));
    }
    if num_outputs < 1 {
        return Err(NetError::invalid("Output size must be 1 or more"));
    }
    Ok(())
}

impl Layer {
    /// Create a layer with all weights set to zero.
    pub fn new(num_inputs: usize, num_outputs: usize, transfer: Transfer) -> Result<Self> {
        check_sizes(num_inputs, num_outputs)?;
        Ok(Self {
            num_inputs,
            num_outputs,
            weights: Tensor::zeros(&[num_inputs + 1, num_outputs]),
            transfer,
        })
    }

    /// Create a layer with Xavier-initialised weights, see [`Layer::init_weights`].
    pub fn new_random(
        num_inputs: usize,
        num_outputs: usize,
        transfer: Transfer,
        rng: &mut SeededRng,
    ) -> Result<Self> {
        let mut layer = Self::new(num_inputs, num_outputs, transfer)?;
        layer.init_weights(rng);
        Ok(layer)
    }

    /// Like [`Layer::new`] but resolves the transfer function by name.
    pub fn from_label(num_inputs: usize, num_outputs: usize, transfer: &str) -> Result<Self> {
        let transfer = Transfer::from_str(transfer)?;
        Self::new(num_inputs, num_outputs, transfer)
    }

    /// Wrap an existing weight tensor of shape `[num_inputs + 1, num_outputs]`.
    pub fn from_weights(weights: Tensor, transfer: Transfer) -> Result<Self> {
        if weights.rank() != 2 {
            return Err(NetError::invalid(format!(
                "Weights must be rank 2, got rank {}",
                weights.rank()
            )));
        }
        let (rows, cols) = (weights.shape()[0], weights.shape()[1]);
        if rows < 2 {
            return Err(NetError::invalid(
                "Weights first dimension must be at least 2 (one input plus bias)",
            ));
        }
        check_sizes(rows - 1, cols)?;
        Ok(Self {
            num_inputs: rows - 1,
            num_outputs: cols,
            weights,
            transfer,
        })
    }

    /// Xavier/Glorot uniform initialisation.
    ///
    /// Weight rows are drawn from `[-limit, limit)` where
    /// `limit = sqrt(6 / (num_inputs + num_outputs))`. The bias row is zeroed.
    pub fn init_weights(&mut self, rng: &mut SeededRng) {
        let limit = (6.0 / (self.num_inputs + self.num_outputs) as f64).sqrt();
        for i in 0..self.num_inputs {
            for value in self.weights.row_mut(i) {
                *value = rng.gen_range(-limit, limit);
            }
        }
        self.weights.row_mut(self.num_inputs).fill(0.0);
    }

    /// Weight rows drawn from `N(0, std_dev)`, bias row zeroed.
    pub fn init_weights_normal(&mut self, rng: &mut SeededRng, std_dev: f64) {
        for i in 0..self.num_inputs {
            for value in self.weights.row_mut(i) {
                *value = rng.normal(0.0, std_dev);
            }
        }
        self.weights.row_mut(self.num_inputs).fill(0.0);
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    pub fn transfer(&self) -> Transfer {
        self.transfer
    }

    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut Tensor {
        &mut self.weights
    }

    /// Replace the weights. The new tensor must have the same shape.
    pub fn set_weights(&mut self, weights: Tensor) -> Result<()> {
        if weights.shape() != self.weights.shape() {
            return Err(NetError::invalid(format!(
                "Weights shape {:?} does not match layer shape {:?}",
                weights.shape(),
                self.weights.shape()
            )));
        }
        self.weights = weights;
        Ok(())
    }

    /// Number of trainable parameters, biases included.
    pub fn parameter_count(&self) -> usize {
        self.weights.len()
    }

    /// Pre-activation values `z_j = Σ_i w[i,j] * input[i] + w[num_inputs, j]`.
    pub fn preactivation(&self, input: &[f64]) -> Result<Vec<f64>> {
        check_len("input", input.len(), self.num_inputs)?;
        let mut z = self.weights.row(self.num_inputs).to_vec();
        for (i, &x) in input.iter().enumerate() {
            for (zj, &w) in z.iter_mut().zip(self.weights.row(i)) {
                *zj += w * x;
            }
        }
        Ok(z)
    }

    /// Forward pass writing into a caller-owned buffer of `num_outputs` values.
    pub fn forward_into(&self, input: &[f64], output: &mut [f64]) -> Result<()> {
        check_len("output buffer", output.len(), self.num_outputs)?;
        let z = self.preactivation(input)?;
        output.copy_from_slice(&z);
        self.transfer.bulk_apply_inplace(output);
        Ok(())
    }

    /// Forward pass returning a freshly allocated output.
    ///
    /// Takes `&self` and allocates per call, so concurrent readers are fine as
    /// long as nothing is writing the weights.
    pub fn forward(&self, input: &[f64]) -> Result<Vec<f64>> {
        let mut output = self.preactivation(input)?;
        self.transfer.bulk_apply_inplace(&mut output);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_layer_creation() {
        let layer = Layer::new(10, 5, Transfer::Sigmoid).unwrap();

        assert_eq!(layer.num_inputs(), 10);
        assert_eq!(layer.num_outputs(), 5);
        assert_eq!(layer.weights().shape(), &[11, 5]);
        assert_eq!(layer.parameter_count(), 10 * 5 + 5);
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        assert!(matches!(
            Layer::new(0, 5, Transfer::Sigmoid),
            Err(NetError::InvalidArgument(_))
        ));
        assert!(matches!(
            Layer::new(3, 0, Transfer::Sigmoid),
            Err(NetError::InvalidArgument(_))
        ));
        assert!(matches!(
            Layer::from_label(3, 2, "sinc"),
            Err(NetError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_from_weights_shape_checks() {
        let w = Tensor::zeros(&[1, 4]);
        assert!(Layer::from_weights(w, Transfer::Linear).is_err());

        let w = Tensor::zeros(&[3, 2, 1]);
        assert!(Layer::from_weights(w, Transfer::Linear).is_err());

        let w = Tensor::zeros(&[4, 2]);
        let layer = Layer::from_weights(w, Transfer::Linear).unwrap();
        assert_eq!(layer.num_inputs(), 3);
        assert_eq!(layer.num_outputs(), 2);
    }

    #[test]
    fn test_xavier_initialization() {
        let mut rng = SeededRng::new(42);
        let layer = Layer::new_random(100, 50, Transfer::ReLU, &mut rng).unwrap();

        let limit = (6.0f64 / 150.0).sqrt();
        for i in 0..100 {
            for &weight in layer.weights().row(i) {
                assert!(weight >= -limit && weight < limit);
            }
        }
        assert!(layer.weights().row(100).iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_deterministic_initialization() {
        let mut rng1 = SeededRng::new(42);
        let layer1 = Layer::new_random(10, 5, Transfer::TanH, &mut rng1).unwrap();

        let mut rng2 = SeededRng::new(42);
        let layer2 = Layer::new_random(10, 5, Transfer::TanH, &mut rng2).unwrap();

        assert_eq!(layer1, layer2);
    }

    #[test]
    fn test_forward_uses_bias_row() {
        let w = Tensor::from_rows(&[vec![1.0, 2.0], vec![-1.0, 0.5], vec![0.25, -0.75]]).unwrap();
        let layer = Layer::from_weights(w, Transfer::Linear).unwrap();
        let out = layer.forward(&[3.0, 2.0]).unwrap();
        assert_relative_eq!(out[0], 3.0 - 2.0 + 0.25);
        assert_relative_eq!(out[1], 6.0 + 1.0 - 0.75);
    }

    #[test]
    fn test_forward_softmax_sums_to_one() {
        let mut rng = SeededRng::new(3);
        let layer = Layer::new_random(4, 3, Transfer::Softmax, &mut rng).unwrap();
        let out = layer.forward(&[0.1, -0.3, 0.8, 1.5]).unwrap();
        assert_relative_eq!(out.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_forward_rejects_wrong_input_length() {
        let layer = Layer::new(3, 2, Transfer::Sigmoid).unwrap();
        assert!(layer.forward(&[1.0, 2.0]).is_err());
        let mut out = [0.0; 3];
        assert!(layer.forward_into(&[1.0, 2.0, 3.0], &mut out).is_err());
    }
}
