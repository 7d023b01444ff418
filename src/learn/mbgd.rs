//! Mini-batch gradient descent over a whole network
//!
//! [`Mbgd`] holds one [`BPLayer`] per layer of an [`NnModel`], index-aligned.
//! A batch runs forward and backward for each example, summing gradients in
//! every trainer, and then applies all updates at once.

use tracing::{debug, info, warn};

use crate::dataset::Dataset;
use crate::error::{check_len, NetError, Result};
use crate::model::{check_adjacent, NnModel};
use crate::objective::Objective;

use super::mbgd_layer::BPLayer;
use super::meta_params::{MetaParams, MetaParamsUpdate};

/// Mini-batch trainer for an [`NnModel`].
///
/// # Example
///
/// ```
/// use neural_mbgd::dataset::MemoryDataset;
/// use neural_mbgd::learn::{Mbgd, MetaParams};
/// use neural_mbgd::model::NnModel;
/// use neural_mbgd::objective::Objective;
/// use neural_mbgd::transfer::Transfer;
/// use neural_mbgd::utils::SeededRng;
///
/// let mut rng = SeededRng::new(7);
/// let mut model = NnModel::build(1, &[(1, Transfer::Linear)], &mut rng).unwrap();
/// let mut data = MemoryDataset::from_examples(&[vec![1.0], vec![2.0]], &[vec![2.0], vec![4.0]]).unwrap();
///
/// let mut mbgd = Mbgd::from_nn_model(&model, &MetaParams::default().with_learning_rate(0.05)).unwrap();
/// let loss = mbgd
///     .train_one_batch(&mut model, &mut data, Objective::MeanSquaredError, 2)
///     .unwrap();
/// assert!(loss > 0.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Mbgd {
    layers: Vec<BPLayer>,
}

impl Mbgd {
    /// Wrap trainers for consecutive layers. Adjacent sizes must agree.
    pub fn new(layers: Vec<BPLayer>) -> Result<Self> {
        let sizes: Vec<_> = layers
            .iter()
            .map(|l| (l.num_inputs(), l.num_outputs()))
            .collect();
        check_adjacent(&sizes)?;
        Ok(Self { layers })
    }

    /// One trainer per model layer, all sharing `params`.
    pub fn from_nn_model(model: &NnModel, params: &MetaParams) -> Result<Self> {
        let layers = model
            .layers()
            .iter()
            .map(|layer| BPLayer::from_layer(layer, params))
            .collect::<Result<Vec<_>>>()?;
        Self::new(layers)
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

    pub fn layers(&self) -> &[BPLayer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&BPLayer> {
        self.layers.get(index)
    }

    /// Broadcast a hyperparameter change to every layer. Accumulators and
    /// optimiser state are kept.
    pub fn set_meta_params(&mut self, update: &MetaParamsUpdate) -> Result<()> {
        update.validate()?;
        for layer in &mut self.layers {
            layer.set_meta_params(update)?;
        }
        debug!(layers = self.layers.len(), "meta params updated");
        Ok(())
    }

    /// Zero every layer's optimiser state (velocity or squared-gradient average).
    pub fn reset_optimiser_state(&mut self) {
        for layer in &mut self.layers {
            layer.reset_optimiser_state();
        }
    }

    fn check_model(&self, model: &NnModel) -> Result<()> {
        check_len("model layer count", model.num_layers(), self.layers.len())?;
        for (i, (bp, layer)) in self.layers.iter().zip(model.layers()).enumerate() {
            if bp.num_inputs() != layer.num_inputs() || bp.num_outputs() != layer.num_outputs() {
                return Err(NetError::invalid(format!(
                    "model layer {} is {}x{} but trainer {} is {}x{}",
                    i,
                    layer.num_inputs(),
                    layer.num_outputs(),
                    i,
                    bp.num_inputs(),
                    bp.num_outputs()
                )));
            }
        }
        Ok(())
    }

    /// Copy the next `batch_size` examples out of `dataset`, checking each
    /// one's length. The cursor is only advanced past examples that pass.
    fn read_batch(
        &self,
        dataset: &mut dyn Dataset,
        batch_size: usize,
    ) -> Result<Vec<(Vec<f64>, Vec<f64>)>> {
        let mut batch = Vec::with_capacity(batch_size);
        for index in 0..batch_size {
            let input = dataset.current_input();
            let target = dataset.current_target();
            if input.len() != self.num_inputs() || target.len() != self.num_outputs() {
                return Err(NetError::invalid(format!(
                    "example {} of the batch has {} inputs and {} targets, expected {} and {}",
                    index,
                    input.len(),
                    target.len(),
                    self.num_inputs(),
                    self.num_outputs()
                )));
            }
            batch.push((input.to_vec(), target.to_vec()));
            dataset.advance();
        }
        Ok(batch)
    }

    /// Train on the next `batch_size` examples of `dataset` and return the mean
    /// loss over those examples (measured before the update).
    ///
    /// Everything that can be rejected is checked before any weight moves:
    /// model and dataset shapes, batch size, whether `objective` has a gradient
    /// rule for the output layer's transfer, and the length of every example in
    /// the batch. The batch is read from `dataset` before the first
    /// `start_batch`, so a rejected call leaves the model and trainers unchanged.
    /// If an example has the wrong length, the dataset cursor stays on that
    /// example.
    pub fn train_one_batch(
        &mut self,
        model: &mut NnModel,
        dataset: &mut dyn Dataset,
        objective: Objective,
        batch_size: usize,
    ) -> Result<f64> {
        if batch_size < 1 {
            return Err(NetError::invalid("batch_size must be 1 or more"));
        }
        self.check_model(model)?;
        check_len("dataset inputs", dataset.num_inputs(), self.num_inputs())?;
        check_len("dataset targets", dataset.num_outputs(), self.num_outputs())?;
        let last = self.layers.len() - 1;
        let output_transfer = model.layer(last).transfer();
        if !objective.supports(output_transfer) {
            return Err(NetError::UnsupportedCombination {
                objective: objective.label(),
                transfer: output_transfer.label(),
            });
        }

        let batch = self.read_batch(dataset, batch_size)?;

        for (bp, layer) in self.layers.iter_mut().zip(model.layers_mut()) {
            bp.start_batch(layer)?;
        }

        let mut total_loss = 0.0;
        for (input, target) in &batch {
            model.run(input)?;
            total_loss += objective.loss(model.output(), target)?;

            let output_input = if last == 0 {
                input.as_slice()
            } else {
                model.activation(last - 1)
            };
            self.layers[last].backprop_for_output_layer(
                model.layer(last),
                output_input,
                model.activation(last),
                target,
                objective,
            )?;

            for l in (0..last).rev() {
                let layer_input = if l == 0 {
                    input.as_slice()
                } else {
                    model.activation(l - 1)
                };
                let (lower, upper) = self.layers.split_at_mut(l + 1);
                lower[l].backprop_for_mid_layer(
                    model.layer(l),
                    layer_input,
                    model.activation(l),
                    upper[0].de_da().as_slice(),
                )?;
            }
        }

        for (bp, layer) in self.layers.iter_mut().zip(model.layers_mut()) {
            bp.finish_batch(layer)?;
        }

        let mean_loss = total_loss / batch_size as f64;
        if !mean_loss.is_finite() {
            warn!(loss = mean_loss, "training loss is not finite");
        }
        Ok(mean_loss)
    }

    /// Run `num_batches` consecutive batches, returning the mean loss of the
    /// last one. `num_batches` must be 1 or more.
    pub fn train(
        &mut self,
        model: &mut NnModel,
        dataset: &mut dyn Dataset,
        objective: Objective,
        batch_size: usize,
        num_batches: usize,
    ) -> Result<f64> {
        if num_batches < 1 {
            return Err(NetError::invalid("num_batches must be 1 or more"));
        }
        let mut loss = f64::NAN;
        for batch in 0..num_batches {
            loss = self.train_one_batch(model, dataset, objective, batch_size)?;
            debug!(batch, loss, "batch complete");
        }
        info!(num_batches, batch_size, loss, "training complete");
        Ok(loss)
    }
}
