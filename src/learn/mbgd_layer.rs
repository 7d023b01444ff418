//! Per-layer backpropagation trainer
//!
//! A [`BPLayer`] pairs with one [`Layer`] and owns the gradient accumulators for
//! it along with the optimiser that applies them. It never owns the layer: each
//! call borrows the layer it trains.
//!
//! Batch lifecycle:
//!
//! ```text
//! Idle --start_batch--> Accumulating --backprop_*(...)*--> Accumulating --finish_batch--> Idle
//! ```
//!
//! Backprop calls made while Idle fail with `NotStarted`.

use tracing::trace;

use crate::error::{check_len, NetError, Result};
use crate::layers::Layer;
use crate::objective::Objective;
use crate::optimizers::{GradientDescent, GradientDescentType, Optimizer};
use crate::tensor::Tensor;

use super::meta_params::{check_learning_rate, MetaParams, MetaParamsUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchState {
    Idle,
    Accumulating,
}

/// Gradient accumulators and optimiser for one layer.
///
/// * `de_dz` - gradient w.r.t. the layer's pre-activation, `[num_outputs]`
/// * `de_da` - gradient w.r.t. the layer's inputs, `[num_inputs]`, handed to
///   the layer below
/// * `de_dw` - weight gradient summed over the batch, same shape as the weights
///
/// Cloning deep-copies the optimiser state.
#[derive(Debug, Clone, PartialEq)]
pub struct BPLayer {
    num_inputs: usize,
    num_outputs: usize,
    de_dz: Tensor,
    de_da: Tensor,
    de_dw: Tensor,
    learning_rate: f64,
    weight_decay: f64,
    max_norm: f64,
    optimiser: GradientDescent,
    state: BatchState,
}

impl BPLayer {
    /// Create a trainer for a `num_inputs` → `num_outputs` layer, with the
    /// optimiser chosen by `params.gradient_descent_type`.
    pub fn new(num_inputs: usize, num_outputs: usize, params: &MetaParams) -> Result<Self> {
        check_layer_sizes(num_inputs, num_outputs)?;
        params.validate()?;
        let optimiser = GradientDescent::from_meta_params((num_inputs + 1) * num_outputs, params)?;
        Self::with_optimiser(num_inputs, num_outputs, params, optimiser)
    }

    /// Create a trainer sized to `layer`.
    pub fn from_layer(layer: &Layer, params: &MetaParams) -> Result<Self> {
        Self::new(layer.num_inputs(), layer.num_outputs(), params)
    }

    /// Create a trainer around an existing optimiser. The optimiser must be
    /// sized to `(num_inputs + 1) * num_outputs` parameters. Its type wins over
    /// `params.gradient_descent_type`.
    pub fn with_optimiser(
        num_inputs: usize,
        num_outputs: usize,
        params: &MetaParams,
        optimiser: GradientDescent,
    ) -> Result<Self> {
        check_layer_sizes(num_inputs, num_outputs)?;
        params.validate()?;
        Self::check_optimiser(num_inputs, num_outputs, &optimiser)?;
        Ok(Self {
            num_inputs,
            num_outputs,
            de_dz: Tensor::zeros(&[num_outputs]),
            de_da: Tensor::zeros(&[num_inputs]),
            de_dw: Tensor::zeros(&[num_inputs + 1, num_outputs]),
            learning_rate: params.learning_rate,
            weight_decay: params.weight_decay,
            max_norm: params.max_norm,
            optimiser,
            state: BatchState::Idle,
        })
    }

    /// Reassemble a trainer from stored parts, checking every tensor shape
    /// against the declared sizes. `batch_started` restores a trainer saved
    /// between `start_batch` and `finish_batch`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        num_inputs: usize,
        num_outputs: usize,
        de_dz: Tensor,
        de_da: Tensor,
        de_dw: Tensor,
        learning_rate: f64,
        weight_decay: f64,
        max_norm: f64,
        optimiser: GradientDescent,
        batch_started: bool,
    ) -> Result<Self> {
        check_layer_sizes(num_inputs, num_outputs)?;
        check_shape("de_dz", &de_dz, &[num_outputs])?;
        check_shape("de_da", &de_da, &[num_inputs])?;
        check_shape("de_dw", &de_dw, &[num_inputs + 1, num_outputs])?;
        let params = MetaParams {
            learning_rate,
            weight_decay,
            max_norm,
            ..MetaParams::default()
        };
        params.validate()?;
        Self::check_optimiser(num_inputs, num_outputs, &optimiser)?;
        Ok(Self {
            num_inputs,
            num_outputs,
            de_dz,
            de_da,
            de_dw,
            learning_rate,
            weight_decay,
            max_norm,
            optimiser,
            state: if batch_started {
                BatchState::Accumulating
            } else {
                BatchState::Idle
            },
        })
    }

    fn check_optimiser(num_inputs: usize, num_outputs: usize, optimiser: &GradientDescent) -> Result<()> {
        optimiser.validate()?;
        check_len(
            "optimiser parameter count",
            optimiser.num_params(),
            (num_inputs + 1) * num_outputs,
        )
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    pub fn de_dz(&self) -> &Tensor {
        &self.de_dz
    }

    pub fn de_da(&self) -> &Tensor {
        &self.de_da
    }

    pub fn de_dw(&self) -> &Tensor {
        &self.de_dw
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn weight_decay(&self) -> f64 {
        self.weight_decay
    }

    pub fn max_norm(&self) -> f64 {
        self.max_norm
    }

    pub fn gradient_descent(&self) -> &GradientDescent {
        &self.optimiser
    }

    pub fn gradient_descent_type(&self) -> GradientDescentType {
        self.optimiser.gradient_descent_type()
    }

    pub fn is_batch_started(&self) -> bool {
        self.state == BatchState::Accumulating
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) -> Result<()> {
        check_learning_rate(learning_rate)?;
        self.learning_rate = learning_rate;
        Ok(())
    }

    /// Apply a partial hyperparameter change. Accumulators and optimiser state
    /// are untouched. Nothing changes if any value is out of range.
    pub fn set_meta_params(&mut self, update: &MetaParamsUpdate) -> Result<()> {
        update.validate()?;
        if let Some(lr) = update.learning_rate {
            self.learning_rate = lr;
        }
        if let Some(wd) = update.weight_decay {
            self.weight_decay = wd;
        }
        if let Some(max_norm) = update.max_norm {
            self.max_norm = max_norm;
        }
        if let Some(momentum) = update.momentum {
            self.optimiser.set_momentum(momentum)?;
        }
        if let Some(decay) = update.decay {
            self.optimiser.set_decay(decay)?;
        }
        if let Some(epsilon) = update.epsilon {
            self.optimiser.set_epsilon(epsilon)?;
        }
        Ok(())
    }

    /// Zero NAG velocity or set RMSProp averages back to one.
    pub fn reset_optimiser_state(&mut self) {
        self.optimiser.reset();
    }

    fn check_layer(&self, layer: &Layer) -> Result<()> {
        if layer.num_inputs() != self.num_inputs || layer.num_outputs() != self.num_outputs {
            return Err(NetError::invalid(format!(
                "layer is {}x{} but trainer expects {}x{}",
                layer.num_inputs(),
                layer.num_outputs(),
                self.num_inputs,
                self.num_outputs
            )));
        }
        Ok(())
    }

    fn ensure_started(&self, operation: &str) -> Result<()> {
        if self.state != BatchState::Accumulating {
            return Err(NetError::NotStarted(format!(
                "{} called before start_batch",
                operation
            )));
        }
        Ok(())
    }

    /// Open a batch: zero `de_dw` and give the optimiser its pre-step on the
    /// layer weights (NAG look-ahead).
    ///
    /// Optimiser state is not reset here; it is created fresh with the trainer
    /// and persists across batches. Calling this on an open batch discards the
    /// accumulated gradient but does not repeat the pre-step.
    pub fn start_batch(&mut self, layer: &mut Layer) -> Result<()> {
        self.check_layer(layer)?;
        if self.state == BatchState::Idle {
            self.optimiser
                .pre_step(layer.weights_mut().as_mut_slice(), self.learning_rate)?;
        }
        self.de_dw.fill(0.0);
        self.state = BatchState::Accumulating;
        Ok(())
    }

    /// Accumulate gradients for the output layer of a network from one example.
    ///
    /// `output` is `layer`'s forward output for `input`. `de_dz` comes from the
    /// objective's fused rule for the layer's transfer function.
    pub fn backprop_for_output_layer(
        &mut self,
        layer: &Layer,
        input: &[f64],
        output: &[f64],
        target: &[f64],
        objective: Objective,
    ) -> Result<()> {
        self.ensure_started("backprop_for_output_layer")?;
        self.check_layer(layer)?;
        check_len("input", input.len(), self.num_inputs)?;
        check_len("output", output.len(), self.num_outputs)?;
        check_len("target", target.len(), self.num_outputs)?;

        let de_dz = objective.de_dz(layer.transfer(), output, target)?;
        self.accumulate(layer, input, &de_dz);
        Ok(())
    }

    /// [`BPLayer::backprop_for_output_layer`] with the objective given by name.
    pub fn backprop_for_output_layer_by_name(
        &mut self,
        layer: &Layer,
        input: &[f64],
        output: &[f64],
        target: &[f64],
        objective_name: &str,
    ) -> Result<()> {
        let objective: Objective = objective_name.parse()?;
        self.backprop_for_output_layer(layer, input, output, target, objective)
    }

    /// Accumulate gradients for a hidden layer from the `de_da` of the layer
    /// above it.
    pub fn backprop_for_mid_layer(
        &mut self,
        layer: &Layer,
        input: &[f64],
        output: &[f64],
        upstream_de_da: &[f64],
    ) -> Result<()> {
        self.ensure_started("backprop_for_mid_layer")?;
        self.check_layer(layer)?;
        check_len("input", input.len(), self.num_inputs)?;
        check_len("output", output.len(), self.num_outputs)?;
        check_len("upstream de_da", upstream_de_da.len(), self.num_outputs)?;

        let de_dz = layer.transfer().chain(output, upstream_de_da);
        self.accumulate(layer, input, &de_dz);
        Ok(())
    }

    fn accumulate(&mut self, layer: &Layer, input: &[f64], de_dz: &[f64]) {
        self.de_dz.as_mut_slice().copy_from_slice(de_dz);

        let weights = layer.weights();
        for (i, de_da) in self.de_da.as_mut_slice().iter_mut().enumerate() {
            *de_da = weights
                .row(i)
                .iter()
                .zip(de_dz)
                .map(|(&w, &d)| w * d)
                .sum();
        }

        for (i, &x) in input.iter().enumerate() {
            for (g, &d) in self.de_dw.row_mut(i).iter_mut().zip(de_dz) {
                *g += d * x;
            }
        }
        for (g, &d) in self.de_dw.row_mut(self.num_inputs).iter_mut().zip(de_dz) {
            *g += d;
        }
    }

    /// Close the batch: add weight decay to the weight rows of `de_dw`, let the
    /// optimiser update the layer weights, then clip each unit's incoming
    /// weights to `max_norm`. Bias row is exempt from decay and clipping.
    pub fn finish_batch(&mut self, layer: &mut Layer) -> Result<()> {
        self.ensure_started("finish_batch")?;
        self.check_layer(layer)?;

        if self.weight_decay > 0.0 {
            let weights = layer.weights();
            for i in 0..self.num_inputs {
                for (g, &w) in self.de_dw.row_mut(i).iter_mut().zip(weights.row(i)) {
                    *g += self.weight_decay * w;
                }
            }
        }

        self.optimiser.step(
            layer.weights_mut().as_mut_slice(),
            self.de_dw.as_slice(),
            self.learning_rate,
        )?;

        if self.max_norm > 0.0 {
            self.apply_max_norm(layer.weights_mut());
        }

        self.state = BatchState::Idle;
        Ok(())
    }

    fn apply_max_norm(&self, weights: &mut Tensor) {
        let max_norm_sq = self.max_norm * self.max_norm;
        for j in 0..self.num_outputs {
            let norm_sq: f64 = (0..self.num_inputs).map(|i| weights[[i, j]].powi(2)).sum();
            if norm_sq > max_norm_sq {
                let factor = self.max_norm / norm_sq.sqrt();
                trace!(unit = j, norm = norm_sq.sqrt(), "max-norm clipping");
                for i in 0..self.num_inputs {
                    weights[[i, j]] *= factor;
                }
            }
        }
    }
}

fn check_layer_sizes(num_inputs: usize, num_outputs: usize) -> Result<()> {
    if num_inputs < 1 || num_outputs < 1 {
        return Err(NetError::invalid(format!(
            "layer sizes must be 1 or more, got {}x{}",
            num_inputs, num_outputs
        )));
    }
    Ok(())
}

fn check_shape(name: &str, tensor: &Tensor, expected: &[usize]) -> Result<()> {
    if tensor.shape() != expected {
        return Err(NetError::invalid(format!(
            "{} has shape {:?}, expected {:?}",
            name,
            tensor.shape(),
            expected
        )));
    }
    Ok(())
}
