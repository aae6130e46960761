//! Shared data structures

pub mod detection;
pub mod prediction;

pub use detection::{AlertEvent, DetectionRecord};
pub use prediction::{Prediction, ScoreRequest};
