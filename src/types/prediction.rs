//! Scoring request/response wire types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Body of `POST /predict`: one flow's feature values by name.
///
/// The mapping is unordered and may be a subset or superset of the
/// trained feature list; the scorer reconciles it against the bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub features: HashMap<String, f64>,
}

/// Response of `POST /predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub prediction: String,
    /// Maximum class probability, rounded to 4 decimal places.
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_shape() {
        let request: ScoreRequest =
            serde_json::from_str(r#"{"features": {"Flow Duration": 120.0}}"#).unwrap();
        assert_eq!(request.features.get("Flow Duration"), Some(&120.0));
    }

    #[test]
    fn prediction_wire_shape() {
        let prediction = Prediction {
            prediction: "DDoS".to_string(),
            confidence: 0.97,
        };
        let json = serde_json::to_value(&prediction).unwrap();
        assert_eq!(json["prediction"], "DDoS");
        assert_eq!(json["confidence"], 0.97);
    }
}
