//! Feed-forward neural network training library
//!
//! Layers, pluggable transfer and objective functions, backpropagation and
//! mini-batch gradient descent with SGD, Nesterov momentum or RMSProp, plus
//! weight decay and max-norm regularisation.
//!
//! # Modules
//!
//! - `tensor`: dense `f64` array used for weights and gradients
//! - `transfer`: activation functions (sigmoid, tanh, relu, linear, softmax)
//! - `objective`: loss functions and their gradients at the pre-activation
//! - `layers`: the feed-forward `Layer`
//! - `model`: `NnModel`, an ordered stack of layers
//! - `optimizers`: Optimizer trait and SGD/NAG/RMSProp
//! - `learn`: per-layer backprop trainer (`BPLayer`) and `Mbgd`
//! - `dataset`: example sources for training
//! - `persistence`: JSON records for layers, trainers and networks
//! - `config`: training configuration files
//! - `utils`: seeded random source
//! - `error`: `NetError` and `Result`

pub mod config;
pub mod dataset;
pub mod error;
pub mod layers;
pub mod learn;
pub mod model;
pub mod objective;
pub mod optimizers;
pub mod persistence;
pub mod tensor;
pub mod transfer;
pub mod utils;

pub use error::{NetError, Result};
