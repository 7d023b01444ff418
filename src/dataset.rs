//! Example sources for training
//!
//! Training pulls examples through the [`Dataset`] cursor: read the current
//! input and target, then `advance`. [`MemoryDataset`] keeps all examples in two
//! rank-2 tensors and walks them in order, or in a shuffled order that is
//! redrawn from its own [`SeededRng`] each time it wraps around.

use tracing::trace;

use crate::error::{NetError, Result};
use crate::tensor::Tensor;
use crate::utils::SeededRng;

/// Cyclic cursor over training examples.
pub trait Dataset {
    fn num_examples(&self) -> usize;

    fn num_inputs(&self) -> usize;

    fn num_outputs(&self) -> usize;

    /// Input vector of the current example, `num_inputs()` long.
    fn current_input(&self) -> &[f64];

    /// Target vector of the current example, `num_outputs()` long.
    fn current_target(&self) -> &[f64];

    /// Move to the next example, wrapping to the start after the last.
    fn advance(&mut self);
}

/// In-memory examples, one per row of `inputs` and `targets`.
#[derive(Debug, Clone)]
pub struct MemoryDataset {
    inputs: Tensor,
    targets: Tensor,
    order: Vec<usize>,
    pos: usize,
    rng: Option<SeededRng>,
}

impl MemoryDataset {
    /// Examples visited in row order.
    pub fn new(inputs: Tensor, targets: Tensor) -> Result<Self> {
        if inputs.rank() != 2 || targets.rank() != 2 {
            return Err(NetError::invalid("inputs and targets must be rank 2"));
        }
        let rows = inputs.shape()[0];
        if rows == 0 || targets.shape()[0] != rows {
            return Err(NetError::invalid(format!(
                "need the same non-zero number of input and target rows, got {} and {}",
                rows,
                targets.shape()[0]
            )));
        }
        if inputs.shape()[1] == 0 || targets.shape()[1] == 0 {
            return Err(NetError::invalid("examples must have at least one value"));
        }
        Ok(Self {
            inputs,
            targets,
            order: (0..rows).collect(),
            pos: 0,
            rng: None,
        })
    }

    /// Build from row vectors.
    pub fn from_examples(inputs: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<Self> {
        Self::new(Tensor::from_rows(inputs)?, Tensor::from_rows(targets)?)
    }

    /// Examples visited in a random order, reshuffled on every pass.
    pub fn shuffled(inputs: Tensor, targets: Tensor, rng: SeededRng) -> Result<Self> {
        let mut dataset = Self::new(inputs, targets)?;
        let mut rng = rng;
        rng.shuffle(&mut dataset.order);
        dataset.rng = Some(rng);
        Ok(dataset)
    }

    /// Example by row index, independent of the cursor.
    pub fn example(&self, index: usize) -> Option<(&[f64], &[f64])> {
        if index >= self.num_examples() {
            return None;
        }
        Some((self.inputs.row(index), self.targets.row(index)))
    }

    /// Row indices in current visiting order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Position of the cursor within the current pass.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Dataset for MemoryDataset {
    fn num_examples(&self) -> usize {
        self.inputs.shape()[0]
    }

    fn num_inputs(&self) -> usize {
        self.inputs.shape()[1]
    }

    fn num_outputs(&self) -> usize {
        self.targets.shape()[1]
    }

    fn current_input(&self) -> &[f64] {
        self.inputs.row(self.order[self.pos])
    }

    fn current_target(&self) -> &[f64] {
        self.targets.row(self.order[self.pos])
    }

    fn advance(&mut self) {
        self.pos += 1;
        if self.pos == self.order.len() {
            self.pos = 0;
            if let Some(rng) = self.rng.as_mut() {
                rng.shuffle(&mut self.order);
                trace!(examples = self.order.len(), "dataset reshuffled");
            }
        }
    }
}
