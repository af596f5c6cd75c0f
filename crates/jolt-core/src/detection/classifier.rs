//! Conjunctive-gate classifier.
//!
//! A sample is an accident only when the scorer says so *and* the planar
//! magnitude is physically plausible for an impact. Either side alone can veto.

use super::scorer::Scorer;
use super::{AccidentClassifier, ClassificationResult, ClassifierStatus, SensorSample};

/// Minimum score for the model side of the gate.
pub const SCORE_THRESHOLD: f32 = 0.5;
/// Planar magnitude (m/s²) that must be exceeded for the physical side.
pub const MAGNITUDE_THRESHOLD: f32 = 15.0;

pub struct MotionClassifier {
    scorer: Result<Box<dyn Scorer>, String>,
    score_threshold: f32,
    magnitude_threshold: f32,
}

impl MotionClassifier {
    pub fn new(scorer: Box<dyn Scorer>) -> Self {
        Self::from_load_result(Ok(scorer))
    }

    /// A classifier whose model never loaded. Every sample is reported normal.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::from_load_result(Err(reason.into()))
    }

    pub fn from_load_result(scorer: Result<Box<dyn Scorer>, String>) -> Self {
        if let Err(reason) = &scorer {
            tracing::warn!(%reason, "accident model unavailable, classifier fails closed");
        }
        Self {
            scorer,
            score_threshold: SCORE_THRESHOLD,
            magnitude_threshold: MAGNITUDE_THRESHOLD,
        }
    }

    pub fn with_thresholds(mut self, score_threshold: f32, magnitude_threshold: f32) -> Self {
        self.score_threshold = score_threshold;
        self.magnitude_threshold = magnitude_threshold;
        self
    }
}

impl AccidentClassifier for MotionClassifier {
    fn name(&self) -> &str {
        "conjunctive"
    }

    fn classify(&mut self, sample: &SensorSample) -> ClassificationResult {
        let magnitude = sample.planar_magnitude();
        let Ok(scorer) = &self.scorer else {
            return ClassificationResult::normal(magnitude);
        };

        let score = scorer.score(sample.x, sample.y);
        // NaN from a broken model must not leak out as confidence.
        let confidence = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let is_accident = confidence >= self.score_threshold
            && magnitude.is_finite()
            && magnitude > self.magnitude_threshold;

        tracing::trace!(
            x = sample.x,
            y = sample.y,
            magnitude,
            score,
            is_accident,
            "classified sample"
        );

        ClassificationResult {
            is_accident,
            confidence,
            magnitude,
        }
    }

    fn status(&self) -> ClassifierStatus {
        match &self.scorer {
            Ok(_) => ClassifierStatus::Ready,
            Err(reason) => ClassifierStatus::Unavailable {
                reason: reason.clone(),
            },
        }
    }
}
