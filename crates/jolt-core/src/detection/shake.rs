//! Delta-based shake heuristic with debounce.
//!
//! Compares each sample against the previous one and triggers on a large
//! jump in acceleration. A single jolt usually spans several samples, so
//! triggers closer together than the debounce window are dropped.

use super::{AccidentClassifier, ClassificationResult, SensorSample};

/// Minimum 3-axis delta between consecutive samples.
pub const SHAKE_THRESHOLD: f32 = 8.0;
/// Debounce window between accepted triggers.
pub const TIME_THRESHOLD_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct ShakeDetector {
    threshold: f32,
    interval_ms: u64,
    last: Option<(f32, f32, f32)>,
    last_trigger_ms: Option<u64>,
    last_delta: f32,
}

impl Default for ShakeDetector {
    fn default() -> Self {
        Self::with_thresholds(SHAKE_THRESHOLD, TIME_THRESHOLD_MS)
    }
}

impl ShakeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(threshold: f32, interval_ms: u64) -> Self {
        Self {
            threshold,
            interval_ms,
            last: None,
            last_trigger_ms: None,
            last_delta: 0.0,
        }
    }

    /// Feed one sample. Returns `true` when it is an accepted trigger.
    ///
    /// The first sample only primes the detector: there is nothing to diff
    /// against yet.
    ///
    /// Non-finite readings are dropped without touching the stored previous
    /// sample, so a glitch cannot trigger now or poison the next delta.
    pub fn on_sample(&mut self, sample: &SensorSample) -> bool {
        let current = (sample.x, sample.y, sample.z);
        if !(current.0.is_finite() && current.1.is_finite() && current.2.is_finite()) {
            tracing::debug!(?current, "ignoring non-finite reading");
            self.last_delta = 0.0;
            return false;
        }
        let Some((lx, ly, lz)) = self.last.replace(current) else {
            self.last_delta = 0.0;
            return false;
        };

        let (dx, dy, dz) = (sample.x - lx, sample.y - ly, sample.z - lz);
        let delta = (dx * dx + dy * dy + dz * dz).sqrt();
        self.last_delta = delta;

        if delta.is_nan() || delta <= self.threshold {
            return false;
        }

        let debounced = match self.last_trigger_ms {
            Some(last) => sample.timestamp_ms.saturating_sub(last) <= self.interval_ms,
            None => false,
        };
        if debounced {
            tracing::trace!(delta, "shake suppressed by debounce window");
            return false;
        }

        self.last_trigger_ms = Some(sample.timestamp_ms);
        true
    }

    /// Delta computed for the most recent sample.
    pub fn last_delta(&self) -> f32 {
        self.last_delta
    }
}

impl AccidentClassifier for ShakeDetector {
    fn name(&self) -> &str {
        "shake"
    }

    fn classify(&mut self, sample: &SensorSample) -> ClassificationResult {
        let is_accident = self.on_sample(sample);
        let delta = self.last_delta;
        let confidence = if is_accident {
            1.0
        } else {
            (delta / self.threshold).clamp(0.0, 1.0)
        };
        ClassificationResult {
            is_accident,
            confidence,
            magnitude: delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f32, t: u64) -> SensorSample {
        SensorSample::new(x, 0.0, 9.8, t)
    }

    #[test]
    fn first_sample_only_primes() {
        let mut detector = ShakeDetector::new();
        assert!(!detector.on_sample(&at(50.0, 0)));
    }

    #[test]
    fn large_delta_triggers() {
        let mut detector = ShakeDetector::new();
        detector.on_sample(&at(0.0, 0));
        assert!(detector.on_sample(&at(10.0, 20)));
        assert!((detector.last_delta() - 10.0).abs() < 1e-5);
    }

    #[test]
    fn small_delta_does_not_trigger() {
        let mut detector = ShakeDetector::new();
        detector.on_sample(&at(0.0, 0));
        assert!(!detector.on_sample(&at(8.0, 20)));
    }

    #[test]
    fn two_jolts_within_window_trigger_once() {
        let mut detector = ShakeDetector::new();
        detector.on_sample(&at(0.0, 0));
        let triggers = [at(10.0, 100), at(-10.0, 300), at(10.0, 600)]
            .iter()
            .filter(|s| detector.on_sample(s))
            .count();
        assert_eq!(triggers, 1);
    }

    #[test]
    fn nan_reading_never_triggers() {
        let mut detector = ShakeDetector::new();
        detector.on_sample(&at(0.0, 0));
        assert!(!detector.on_sample(&at(f32::NAN, 100)));
        assert!(!detector.on_sample(&at(0.0, 1_000)));
        assert_eq!(detector.last_delta(), 0.0);
    }

    #[test]
    fn infinite_reading_is_dropped_and_detection_resumes() {
        let mut detector = ShakeDetector::new();
        detector.on_sample(&at(0.0, 0));
        assert!(!detector.on_sample(&at(f32::INFINITY, 100)));
        assert!(!detector.on_sample(&SensorSample::new(0.0, f32::NEG_INFINITY, 9.8, 200)));
        // Still diffed against the last finite reading.
        assert!(detector.on_sample(&at(10.0, 300)));
    }

    #[test]
    fn classify_non_finite_reports_calm() {
        let mut detector = ShakeDetector::new();
        detector.classify(&at(0.0, 0));
        let result = detector.classify(&SensorSample::new(f32::NAN, f32::NAN, f32::NAN, 10));
        assert!(!result.is_accident);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn jolt_after_window_triggers_again() {
        let mut detector = ShakeDetector::new();
        detector.on_sample(&at(0.0, 0));
        assert!(detector.on_sample(&at(10.0, 100)));
        assert!(detector.on_sample(&at(-10.0, 601)));
    }

    #[test]
    fn suppressed_trigger_does_not_extend_window() {
        let mut detector = ShakeDetector::new();
        detector.on_sample(&at(0.0, 0));
        assert!(detector.on_sample(&at(10.0, 100)));
        assert!(!detector.on_sample(&at(-10.0, 500)));
        // 601ms after the accepted trigger, only 101ms after the suppressed one.
        assert!(detector.on_sample(&at(10.0, 701)));
    }

    #[test]
    fn classify_reports_delta_as_magnitude() {
        let mut detector = ShakeDetector::new();
        detector.classify(&at(0.0, 0));
        let result = detector.classify(&at(4.0, 10));
        assert!(!result.is_accident);
        assert!((result.magnitude - 4.0).abs() < 1e-5);
        assert!((result.confidence - 0.5).abs() < 1e-5);
    }
}
