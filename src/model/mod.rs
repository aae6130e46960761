//! Model training, persistence, and scoring components

pub mod bundle;
pub mod forest;
pub mod scorer;

pub use bundle::ModelBundle;
pub use forest::{ForestParams, RandomForest};
pub use scorer::Scorer;
