//! Auxiliary win classifier.
//!
//! A frozen, externally trained model that maps
//! `[league id, home price, away price, confidence]` to a win probability.
//! It is detected once at startup; when absent the recommendation engine
//! simply skips the nudge.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Price used for a side with no usable quote.
pub const DEFAULT_FEATURE_PRICE: f64 = 1.50;

/// Input to the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierFeatures {
    pub league: String,
    pub home_price: f64,
    pub away_price: f64,
    /// Confidence on the 0–100 scale.
    pub confidence: f64,
}

impl ClassifierFeatures {
    pub fn new(league: &str, home_price: Option<f64>, away_price: Option<f64>, confidence: f64) -> Self {
        Self {
            league: league.to_string(),
            home_price: home_price.unwrap_or(DEFAULT_FEATURE_PRICE),
            away_price: away_price.unwrap_or(DEFAULT_FEATURE_PRICE),
            confidence,
        }
    }
}

/// A frozen model returning a win probability in `[0, 1]`.
#[cfg_attr(test, mockall::automock)]
pub trait WinClassifier: Send + Sync {
    fn win_probability(&self, features: &ClassifierFeatures) -> f64;
}

/// Confidence adjustment for a classifier estimate: +10 above 75%, −15 below 30%.
pub fn confidence_nudge(probability: f64) -> f64 {
    if probability > 0.75 {
        10.0
    } else if probability < 0.30 {
        -15.0
    } else {
        0.0
    }
}

/// Logistic-regression artifact stored as JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticClassifier {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    /// League codes in encoder order; unknown leagues encode as 0.
    #[serde(default)]
    pub league_codes: Vec<String>,
}

impl LogisticClassifier {
    pub fn from_json(json: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(json).context("Invalid classifier JSON")?;
        if model.coefficients.len() != 4 {
            bail!("Classifier expects 4 coefficients, found {}", model.coefficients.len());
        }
        if !model.intercept.is_finite() || model.coefficients.iter().any(|c| !c.is_finite()) {
            bail!("Classifier weights must be finite");
        }
        Ok(model)
    }

    fn league_id(&self, league: &str) -> f64 {
        self.league_codes
            .iter()
            .position(|c| c == league)
            .unwrap_or(0) as f64
    }
}

impl WinClassifier for LogisticClassifier {
    fn win_probability(&self, features: &ClassifierFeatures) -> f64 {
        let x = [
            self.league_id(&features.league),
            features.home_price,
            features.away_price,
            features.confidence,
        ];
        let z = self.intercept
            + self
                .coefficients
                .iter()
                .zip(x)
                .map(|(w, v)| w * v)
                .sum::<f64>();
        1.0 / (1.0 + (-z).exp())
    }
}

/// Capability detection: load the artifact, or report it absent.
pub fn detect_classifier(path: &str) -> Option<Arc<dyn WinClassifier>> {
    if !Path::new(path).exists() {
        debug!(path, "No classifier artifact, confidence nudge disabled");
        return None;
    }
    let loaded = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {path}"))
        .and_then(|json| LogisticClassifier::from_json(&json));
    match loaded {
        Ok(model) => {
            info!(path, leagues = model.league_codes.len(), "Classifier loaded");
            Some(Arc::new(model))
        }
        Err(e) => {
            warn!(path, error = %e, "Classifier unusable, confidence nudge disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"{
        "intercept": -4.0,
        "coefficients": [0.0, 0.0, 0.0, 0.06],
        "league_codes": ["eng.1", "esp.1"]
    }"#;

    #[test]
    fn test_logistic_prediction() {
        let model = LogisticClassifier::from_json(MODEL).unwrap();
        // z = -4 + 0.06 * 100 = 2.0
        let p = model.win_probability(&ClassifierFeatures::new("eng.1", Some(1.4), Some(6.0), 100.0));
        assert!((p - 1.0 / (1.0 + (-2.0f64).exp())).abs() < 1e-12);
        let p = model.win_probability(&ClassifierFeatures::new("eng.1", None, None, 0.0));
        assert!(p < 0.30);
    }

    #[test]
    fn test_league_encoding() {
        let model = LogisticClassifier::from_json(
            r#"{"intercept": 0.0, "coefficients": [1.0, 0.0, 0.0, 0.0], "league_codes": ["eng.1", "esp.1"]}"#,
        )
        .unwrap();
        assert_eq!(model.league_id("esp.1"), 1.0);
        assert_eq!(model.league_id("tur.1"), 0.0);
    }

    #[test]
    fn test_rejects_wrong_shape() {
        assert!(LogisticClassifier::from_json(r#"{"intercept": 0.0, "coefficients": [1.0]}"#).is_err());
        assert!(LogisticClassifier::from_json("not json").is_err());
    }

    #[test]
    fn test_default_feature_prices() {
        let f = ClassifierFeatures::new("nba", None, Some(2.2), 70.0);
        assert_eq!(f.home_price, DEFAULT_FEATURE_PRICE);
        assert_eq!(f.away_price, 2.2);
    }

    #[test]
    fn test_nudge_bands() {
        assert_eq!(confidence_nudge(0.80), 10.0);
        assert_eq!(confidence_nudge(0.75), 0.0);
        assert_eq!(confidence_nudge(0.50), 0.0);
        assert_eq!(confidence_nudge(0.29), -15.0);
    }

    #[test]
    fn test_detect_missing_artifact() {
        assert!(detect_classifier("/tmp/matchcast_no_classifier.json").is_none());
    }

    #[test]
    fn test_detect_from_file() {
        let mut path = std::env::temp_dir();
        path.push(format!("matchcast_clf_{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, MODEL).unwrap();
        let clf = detect_classifier(path.to_str().unwrap()).unwrap();
        let p = clf.win_probability(&ClassifierFeatures::new("eng.1", None, None, 50.0));
        assert!((0.0..=1.0).contains(&p));
        std::fs::remove_file(&path).unwrap();
    }
}
