//! Detection outcome and alert data structures

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Prediction;

/// One row of the append-only detection log
/// (`timestamp,prediction,confidence`). Never mutated after append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Wall-clock time of the scoring call, `HH:MM:SS`.
    pub timestamp: String,
    pub prediction: String,
    pub confidence: f64,
}

impl DetectionRecord {
    /// Build a record for a prediction received just now.
    pub fn now(prediction: &Prediction) -> Self {
        Self {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            prediction: prediction.prediction.clone(),
            confidence: prediction.confidence,
        }
    }
}

/// High-confidence attack alert raised by the monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Unique alert identifier
    pub alert_id: String,
    /// Predicted attack label that triggered the alert
    pub prediction: String,
    /// Confidence score that exceeded the alert threshold
    pub confidence: f64,
    /// Alert generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl AlertEvent {
    pub fn new(prediction: String, confidence: f64) -> Self {
        Self {
            alert_id: uuid::Uuid::new_v4().to_string(),
            prediction,
            confidence,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_copies_prediction_fields() {
        let prediction = Prediction {
            prediction: "DDoS".to_string(),
            confidence: 0.95,
        };
        let record = DetectionRecord::now(&prediction);
        assert_eq!(record.prediction, "DDoS");
        assert_eq!(record.confidence, 0.95);
        assert!(!record.timestamp.is_empty());
    }

    #[test]
    fn alert_ids_are_unique() {
        let a = AlertEvent::new("DDoS".to_string(), 0.99);
        let b = AlertEvent::new("DDoS".to_string(), 0.99);
        assert_ne!(a.alert_id, b.alert_id);
    }
}
