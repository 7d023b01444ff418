//! Layer types for neural networks
//!
//! A network here is a stack of fully connected layers; see [`Layer`].

pub mod feed_forward;

pub use feed_forward::Layer;
