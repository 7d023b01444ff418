//! Shared utilities
//!
//! Currently the seeded random source used for weight initialisation and
//! dataset shuffling.

pub mod rng;

pub use rng::SeededRng;
