//! Accident detection.
//!
//! Two independent strategies sit behind [`AccidentClassifier`]:
//!
//! - [`MotionClassifier`]: a scorer (model) and a planar magnitude threshold
//!   must both agree before a sample counts as an accident.
//! - [`ShakeDetector`]: a delta heuristic with a debounce window, no model
//!   required.
//!
//! The escalation session consumes whichever one the configuration selects.

mod classifier;
mod scorer;
mod shake;

pub use classifier::{MotionClassifier, MAGNITUDE_THRESHOLD, SCORE_THRESHOLD};
pub use scorer::{FnScorer, LogisticScorer, Scorer};
pub use shake::{ShakeDetector, SHAKE_THRESHOLD, TIME_THRESHOLD_MS};

use serde::{Deserialize, Serialize};

use crate::storage::DetectionConfig;

/// One accelerometer reading.
///
/// `timestamp_ms` is monotonic: milliseconds since the sensor source started.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(rename = "t")]
    pub timestamp_ms: u64,
}

impl SensorSample {
    pub fn new(x: f32, y: f32, z: f32, timestamp_ms: u64) -> Self {
        Self {
            x,
            y,
            z,
            timestamp_ms,
        }
    }

    /// Two-axis norm. Ignores `z` so gravity tilt does not inflate it.
    pub fn planar_magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub is_accident: bool,
    /// Always within `0.0..=1.0`.
    pub confidence: f32,
    pub magnitude: f32,
}

impl ClassificationResult {
    pub fn normal(magnitude: f32) -> Self {
        Self {
            is_accident: false,
            confidence: 0.0,
            magnitude,
        }
    }
}

/// Whether a classifier can actually produce positive results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassifierStatus {
    Ready,
    /// The model failed to load; the classifier reports every sample as normal.
    Unavailable { reason: String },
}

impl ClassifierStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ClassifierStatus::Ready)
    }
}

/// A pluggable accident classification strategy.
///
/// Implementations may keep per-session state (`&mut self`), and must never
/// panic on a sample: failure modes are reported through [`status`].
///
/// [`status`]: AccidentClassifier::status
pub trait AccidentClassifier: Send {
    /// Short identifier used in logs and events.
    fn name(&self) -> &str;

    fn classify(&mut self, sample: &SensorSample) -> ClassificationResult;

    fn status(&self) -> ClassifierStatus {
        ClassifierStatus::Ready
    }
}

/// Which strategy the monitoring session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStrategy {
    /// Model score AND planar magnitude.
    #[default]
    Conjunctive,
    /// Delta heuristic with debounce.
    Shake,
}

/// Build the configured classifier.
///
/// For the conjunctive strategy the scorer is loaded from `model_path`; a
/// missing path or a load failure yields an unavailable classifier rather
/// than an error.
pub fn classifier_from_config(config: &DetectionConfig) -> Box<dyn AccidentClassifier> {
    match config.strategy {
        DetectionStrategy::Shake => Box::new(ShakeDetector::with_thresholds(
            config.shake_threshold,
            config.shake_interval_ms,
        )),
        DetectionStrategy::Conjunctive => {
            let scorer = match config.model_path.as_deref() {
                Some(path) => LogisticScorer::load(path)
                    .map(|s| Box::new(s) as Box<dyn Scorer>)
                    .map_err(|e| format!("failed to load model from {}: {e}", path.display())),
                None => Err("no model configured".to_string()),
            };
            Box::new(
                MotionClassifier::from_load_result(scorer)
                    .with_thresholds(config.score_threshold, config.magnitude_threshold),
            )
        }
    }
}
