//! Ordered stack of layers
//!
//! Layer `i + 1` consumes the output of layer `i`; connection is adjacency in
//! the vector, so there are no links to maintain and no cycles to detect.
//! `run` keeps every layer's output so training can read the activations back.

use crate::dataset::MemoryDataset;
use crate::error::{NetError, Result};
use crate::layers::Layer;
use crate::objective::Objective;
use crate::transfer::Transfer;
use crate::utils::SeededRng;

/// Feed-forward network of one or more layers.
#[derive(Debug, Clone, PartialEq)]
pub struct NnModel {
    layers: Vec<Layer>,
    activations: Vec<Vec<f64>>,
}

/// Fails unless every layer's output count matches the next layer's input count.
pub(crate) fn check_adjacent(sizes: &[(usize, usize)]) -> Result<()> {
    if sizes.is_empty() {
        return Err(NetError::invalid("a network needs at least one layer"));
    }
    for (i, pair) in sizes.windows(2).enumerate() {
        if pair[0].1 != pair[1].0 {
            return Err(NetError::invalid(format!(
                "layer {} has {} outputs but layer {} has {} inputs",
                i,
                pair[0].1,
                i + 1,
                pair[1].0
            )));
        }
    }
    Ok(())
}

impl NnModel {
    pub fn new(layers: Vec<Layer>) -> Result<Self> {
        let sizes: Vec<_> = layers
            .iter()
            .map(|l| (l.num_inputs(), l.num_outputs()))
            .collect();
        check_adjacent(&sizes)?;
        let activations = layers.iter().map(|l| vec![0.0; l.num_outputs()]).collect();
        Ok(Self {
            layers,
            activations,
        })
    }

    /// Build randomly initialised layers of the given widths and transfers.
    ///
    /// ```
    /// use neural_mbgd::model::NnModel;
    /// use neural_mbgd::transfer::Transfer;
    /// use neural_mbgd::utils::SeededRng;
    ///
    /// let mut rng = SeededRng::new(1);
    /// let model = NnModel::build(
    ///     2,
    ///     &[(4, Transfer::TanH), (1, Transfer::Sigmoid)],
    ///     &mut rng,
    /// )
    /// .unwrap();
    /// assert_eq!(model.num_layers(), 2);
    /// ```
    pub fn build(num_inputs: usize, layers: &[(usize, Transfer)], rng: &mut SeededRng) -> Result<Self> {
        let mut built = Vec::with_capacity(layers.len());
        let mut fan_in = num_inputs;
        for &(units, transfer) in layers {
            built.push(Layer::new_random(fan_in, units, transfer, rng)?);
            fan_in = units;
        }
        Self::new(built)
    }

    /// Redraw every layer's weights from a normal distribution and scale them
    /// by `mult`.
    ///
    /// Each layer uses `std_dev = sqrt(2 / (num_inputs + num_outputs))`, so
    /// `mult = 1.0` gives Glorot-normal weights. Bias rows are zeroed. Returns
    /// `self` so a call can be chained after construction.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `mult` is not finite; no weights change.
    pub fn init_weights(&mut self, rng: &mut SeededRng, mult: f64) -> Result<&mut Self> {
        if !mult.is_finite() {
            return Err(NetError::invalid(format!(
                "weight multiplier must be finite, got {}",
                mult
            )));
        }
        for layer in &mut self.layers {
            let std_dev = (2.0 / (layer.num_inputs() + layer.num_outputs()) as f64).sqrt();
            layer.init_weights_normal(rng, std_dev);
            layer.weights_mut().scale(mult);
        }
        Ok(self)
    }

    pub fn num_inputs(&self) -> usize {
        self.layers[0].num_inputs()
    }

    pub fn num_outputs(&self) -> usize {
        self.layers[self.layers.len() - 1].num_outputs()
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// # Panics
    ///
    /// Panics if `index >= num_layers()`.
    pub fn layer(&self, index: usize) -> &Layer {
        &self.layers[index]
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    /// Forward pass through all layers; returns the last layer's output.
    pub fn run(&mut self, input: &[f64]) -> Result<&[f64]> {
        for i in 0..self.layers.len() {
            let (done, rest) = self.activations.split_at_mut(i);
            let layer_input = match done.last() {
                Some(prev) => prev.as_slice(),
                None => input,
            };
            self.layers[i].forward_into(layer_input, &mut rest[0])?;
        }
        Ok(self.output())
    }

    /// Output of layer `index` from the most recent `run`.
    pub fn activation(&self, index: usize) -> &[f64] {
        &self.activations[index]
    }

    /// Output of the last layer from the most recent `run`.
    pub fn output(&self) -> &[f64] {
        &self.activations[self.activations.len() - 1]
    }

    /// Loss for a single example.
    pub fn loss(&mut self, input: &[f64], target: &[f64], objective: Objective) -> Result<f64> {
        self.run(input)?;
        objective.loss(self.output(), target)
    }

    /// Mean loss over every example of `data`, ignoring its cursor.
    pub fn mean_loss(&mut self, data: &MemoryDataset, objective: Objective) -> Result<f64> {
        let mut total = 0.0;
        let mut count = 0usize;
        while let Some((input, target)) = data.example(count) {
            total += self.loss(input, target, objective)?;
            count += 1;
        }
        Ok(total / count as f64)
    }
}
