//! Training: per-layer backprop trainers and mini-batch gradient descent
//!
//! - `BPLayer`: gradient accumulators plus optimiser for one layer
//! - `Mbgd`: one `BPLayer` per layer of an `NnModel`, driven batch by batch
//! - `MetaParams` / `MetaParamsUpdate`: hyperparameters shared by both

pub mod mbgd;
pub mod mbgd_layer;
pub mod meta_params;

pub use mbgd::Mbgd;
pub use mbgd_layer::BPLayer;
pub use meta_params::{MetaParams, MetaParamsUpdate};
