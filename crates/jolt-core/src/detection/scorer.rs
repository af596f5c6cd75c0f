//! Black-box accident scorers.
//!
//! A scorer maps the two planar axes to a score in `0.0..=1.0`. The shape is
//! fixed (1x2 in, 1x1 out); the classifier does not care what is inside.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub trait Scorer: Send + Sync {
    fn score(&self, x: f32, y: f32) -> f32;
}

/// Logistic regression over `[x, y]`.
///
/// Model files are JSON: `{"weights": [w_x, w_y], "bias": b}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticScorer {
    pub weights: [f32; 2],
    pub bias: f32,
}

impl LogisticScorer {
    pub fn new(weights: [f32; 2], bias: f32) -> Self {
        Self { weights, bias }
    }

    /// Load a model file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if any
    /// parameter is not finite.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        let scorer: LogisticScorer = serde_json::from_str(&content)?;
        if !scorer.weights.iter().all(|w| w.is_finite()) || !scorer.bias.is_finite() {
            return Err(CoreError::Custom(
                "model parameters must be finite".to_string(),
            ));
        }
        Ok(scorer)
    }
}

impl Scorer for LogisticScorer {
    fn score(&self, x: f32, y: f32) -> f32 {
        let z = self.weights[0] * x + self.weights[1] * y + self.bias;
        1.0 / (1.0 + (-z).exp())
    }
}

/// Adapter for closures, mostly used to pin a score in tests.
pub struct FnScorer<F>(pub F);

impl<F> Scorer for FnScorer<F>
where
    F: Fn(f32, f32) -> f32 + Send + Sync,
{
    fn score(&self, x: f32, y: f32) -> f32 {
        (self.0)(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn logistic_is_half_at_zero() {
        let scorer = LogisticScorer::new([0.0, 0.0], 0.0);
        assert!((scorer.score(12.0, 12.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn logistic_rises_with_weighted_input() {
        let scorer = LogisticScorer::new([0.4, 0.4], -8.0);
        assert!(scorer.score(1.0, 1.0) < 0.5);
        assert!(scorer.score(15.0, 15.0) > 0.5);
    }

    #[test]
    fn load_reads_json_model() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"weights": [0.5, 0.25], "bias": -1.0}}"#).unwrap();
        let scorer = LogisticScorer::load(file.path()).unwrap();
        assert_eq!(scorer, LogisticScorer::new([0.5, 0.25], -1.0));
    }

    #[test]
    fn load_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not a model").unwrap();
        assert!(LogisticScorer::load(file.path()).is_err());
    }

    #[test]
    fn load_fails_for_missing_file() {
        assert!(LogisticScorer::load(Path::new("/nonexistent/model.json")).is_err());
    }
}
