//! Network-Intrusion Classification Pipeline Library
//!
//! A small pipeline over labeled network-flow datasets: feature
//! preparation, model training, a scoring HTTP endpoint, and a replay
//! monitor. The feature contract in [`features`] is the load-bearing
//! piece — a flow scored at serving time must be transformed exactly as
//! training rows were.

pub mod config;
pub mod eval;
pub mod features;
pub mod metrics;
pub mod model;
pub mod monitor;
pub mod registry;
pub mod server;
pub mod trainer;
pub mod types;

pub use config::AppConfig;
pub use model::bundle::ModelBundle;
pub use model::scorer::Scorer;
pub use types::{Prediction, ScoreRequest};
