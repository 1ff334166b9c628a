//! Data models

pub mod dataset;
pub mod predictor;

pub use dataset::*;
pub use predictor::*;
