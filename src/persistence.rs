//! Saving and restoring layers, trainers and networks
//!
//! Objects are converted to plain-data [`Record`]s (shapes, values,
//! hyperparameters and a kind tag) and written as JSON. Floats round-trip
//! bit-exactly, so a restored network computes the same outputs and a restored
//! trainer continues along the same trajectory.
//!
//! ```
//! use neural_mbgd::layers::Layer;
//! use neural_mbgd::persistence::{from_json, to_json};
//! use neural_mbgd::transfer::Transfer;
//! use neural_mbgd::utils::SeededRng;
//!
//! let mut rng = SeededRng::new(3);
//! let layer = Layer::new_random(3, 2, Transfer::TanH, &mut rng).unwrap();
//! let json = to_json(&layer).unwrap();
//! let restored: Layer = from_json(&json).unwrap();
//! assert_eq!(restored, layer);
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};
use crate::layers::Layer;
use crate::learn::{BPLayer, Mbgd};
use crate::model::NnModel;
use crate::optimizers::GradientDescent;
use crate::tensor::Tensor;
use crate::transfer::Transfer;

/// A layer's transfer function and weights (bias row last).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub transfer: Transfer,
    pub weights: Tensor,
}

/// A trainer's hyperparameters, accumulators, optimiser state and whether a
/// batch was open when it was saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BPLayerRecord {
    pub num_inputs: usize,
    pub num_outputs: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub max_norm: f64,
    pub de_dz: Tensor,
    pub de_da: Tensor,
    pub de_dw: Tensor,
    pub gradient_descent: GradientDescent,
    /// True if saved between `start_batch` and `finish_batch`
    #[serde(default)]
    pub batch_started: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NnModelRecord {
    pub layers: Vec<LayerRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MbgdRecord {
    pub layers: Vec<BPLayerRecord>,
}

/// Any persisted object, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Layer(LayerRecord),
    BpLayer(BPLayerRecord),
    NnModel(NnModelRecord),
    Mbgd(MbgdRecord),
}

impl Record {
    pub fn kind(&self) -> &'static str {
        match self {
            Record::Layer(_) => "layer",
            Record::BpLayer(_) => "bp_layer",
            Record::NnModel(_) => "nn_model",
            Record::Mbgd(_) => "mbgd",
        }
    }
}

fn wrong_kind(expected: &str, record: &Record) -> NetError {
    NetError::Type(format!(
        "expected a {} record, found {}",
        expected,
        record.kind()
    ))
}

/// Conversion to and from a [`Record`].
pub trait Persist: Sized {
    fn to_record(&self) -> Record;

    /// # Errors
    ///
    /// `Type` if the record holds a different kind of object, `InvalidArgument`
    /// if its contents are inconsistent.
    fn from_record(record: Record) -> Result<Self>;
}

impl From<&Layer> for LayerRecord {
    fn from(layer: &Layer) -> Self {
        Self {
            transfer: layer.transfer(),
            weights: layer.weights().clone(),
        }
    }
}

impl TryFrom<LayerRecord> for Layer {
    type Error = NetError;

    fn try_from(record: LayerRecord) -> Result<Self> {
        Layer::from_weights(record.weights, record.transfer)
    }
}

impl From<&BPLayer> for BPLayerRecord {
    fn from(bp: &BPLayer) -> Self {
        Self {
            num_inputs: bp.num_inputs(),
            num_outputs: bp.num_outputs(),
            learning_rate: bp.learning_rate(),
            weight_decay: bp.weight_decay(),
            max_norm: bp.max_norm(),
            de_dz: bp.de_dz().clone(),
            de_da: bp.de_da().clone(),
            de_dw: bp.de_dw().clone(),
            gradient_descent: bp.gradient_descent().clone(),
            batch_started: bp.is_batch_started(),
        }
    }
}

impl TryFrom<BPLayerRecord> for BPLayer {
    type Error = NetError;

    fn try_from(r: BPLayerRecord) -> Result<Self> {
        BPLayer::from_parts(
            r.num_inputs,
            r.num_outputs,
            r.de_dz,
            r.de_da,
            r.de_dw,
            r.learning_rate,
            r.weight_decay,
            r.max_norm,
            r.gradient_descent,
            r.batch_started,
        )
    }
}

impl Persist for Layer {
    fn to_record(&self) -> Record {
        Record::Layer(self.into())
    }

    fn from_record(record: Record) -> Result<Self> {
        match record {
            Record::Layer(r) => r.try_into(),
            other => Err(wrong_kind("layer", &other)),
        }
    }
}

impl Persist for BPLayer {
    fn to_record(&self) -> Record {
        Record::BpLayer(self.into())
    }

    fn from_record(record: Record) -> Result<Self> {
        match record {
            Record::BpLayer(r) => r.try_into(),
            other => Err(wrong_kind("bp_layer", &other)),
        }
    }
}

impl Persist for NnModel {
    fn to_record(&self) -> Record {
        Record::NnModel(NnModelRecord {
            layers: self.layers().iter().map(LayerRecord::from).collect(),
        })
    }

    fn from_record(record: Record) -> Result<Self> {
        match record {
            Record::NnModel(r) => {
                let layers = r
                    .layers
                    .into_iter()
                    .map(Layer::try_from)
                    .collect::<Result<Vec<_>>>()?;
                NnModel::new(layers)
            }
            other => Err(wrong_kind("nn_model", &other)),
        }
    }
}

impl Persist for Mbgd {
    fn to_record(&self) -> Record {
        Record::Mbgd(MbgdRecord {
            layers: self.layers().iter().map(BPLayerRecord::from).collect(),
        })
    }

    fn from_record(record: Record) -> Result<Self> {
        match record {
            Record::Mbgd(r) => {
                let layers = r
                    .layers
                    .into_iter()
                    .map(BPLayer::try_from)
                    .collect::<Result<Vec<_>>>()?;
                Mbgd::new(layers)
            }
            other => Err(wrong_kind("mbgd", &other)),
        }
    }
}

pub fn to_json<T: Persist>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(&value.to_record())?)
}

pub fn from_json<T: Persist>(json: &str) -> Result<T> {
    let record: Record = serde_json::from_str(json)?;
    T::from_record(record)
}

/// Write `value` as JSON to `path`.
pub fn save<T: Persist>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    fs::write(path, to_json(value)?)?;
    Ok(())
}

/// Read an object previously written by [`save`].
pub fn load<T: Persist>(path: impl AsRef<Path>) -> Result<T> {
    let contents = fs::read_to_string(path)?;
    from_json(&contents)
}
