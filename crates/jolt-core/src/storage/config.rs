//! TOML-based application configuration.
//!
//! Holds the tunables for:
//! - Detection strategy and thresholds
//! - Countdown length and alarm ramp
//! - Who gets notified and what they receive
//!
//! Configuration is stored at `<data dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::detection::{
    DetectionStrategy, MAGNITUDE_THRESHOLD, SCORE_THRESHOLD, SHAKE_THRESHOLD, TIME_THRESHOLD_MS,
};
use crate::error::ConfigError;
use crate::escalation::{DEFAULT_COUNTDOWN_SECS, MIN_VOLUME};
use crate::notify::{NotifyMode, DEFAULT_MESSAGE};

/// Detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default)]
    pub strategy: DetectionStrategy,
    #[serde(default = "default_magnitude_threshold")]
    pub magnitude_threshold: f32,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    #[serde(default = "default_shake_threshold")]
    pub shake_threshold: f32,
    #[serde(default = "default_shake_interval_ms")]
    pub shake_interval_ms: u64,
    /// Logistic model JSON. Without one the conjunctive strategy cannot fire.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
}

/// Countdown and alarm configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationConfig {
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u8,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_min_volume")]
    pub min_volume: f32,
}

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub mode: NotifyMode,
    #[serde(default = "default_message")]
    pub message: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data dir>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

fn default_magnitude_threshold() -> f32 {
    MAGNITUDE_THRESHOLD
}
fn default_score_threshold() -> f32 {
    SCORE_THRESHOLD
}
fn default_shake_threshold() -> f32 {
    SHAKE_THRESHOLD
}
fn default_shake_interval_ms() -> u64 {
    TIME_THRESHOLD_MS
}
fn default_countdown_secs() -> u8 {
    DEFAULT_COUNTDOWN_SECS
}
fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_min_volume() -> f32 {
    MIN_VOLUME
}
fn default_message() -> String {
    DEFAULT_MESSAGE.into()
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            strategy: DetectionStrategy::default(),
            magnitude_threshold: MAGNITUDE_THRESHOLD,
            score_threshold: SCORE_THRESHOLD,
            shake_threshold: SHAKE_THRESHOLD,
            shake_interval_ms: TIME_THRESHOLD_MS,
            model_path: None,
        }
    }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            countdown_secs: DEFAULT_COUNTDOWN_SECS,
            tick_interval_ms: default_tick_interval_ms(),
            min_volume: MIN_VOLUME,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            mode: NotifyMode::default(),
            message: default_message(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let (parent, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        for part in parent.into_iter().flat_map(|p| p.split('.')) {
            current = current.get_mut(part).ok_or_else(unknown)?;
        }
        let obj = current.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(leaf).ok_or_else(unknown)?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            serde_json::Value::Number(_) => {
                if let Ok(n) = value.parse::<u64>() {
                    serde_json::Value::Number(n.into())
                } else {
                    value
                        .parse::<f64>()
                        .ok()
                        .and_then(serde_json::Number::from_f64)
                        .map(serde_json::Value::Number)
                        .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                }
            }
            serde_json::Value::Object(_) => {
                return Err(invalid("cannot replace a whole section".into()));
            }
            // Unset optionals accept "none" to stay unset.
            serde_json::Value::Null if value.eq_ignore_ascii_case("none") => {
                serde_json::Value::Null
            }
            _ => serde_json::Value::String(value.into()),
        };

        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    /// Path of the config file inside the data directory.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults on first run.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed,
    /// or if the default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit file, writing defaults if it does not exist.
    ///
    /// # Errors
    /// See [`Config::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let load_failed = |message: String| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message,
        };
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| load_failed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(load_failed(e.to_string())),
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// All leaf keys in dot-path form, with their values.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    /// Set a config value by dot-separated key. The change is validated but
    /// not saved.
    ///
    /// # Errors
    /// Returns an error if the key is unknown or the value does not fit.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated = match Self::cleared_optional(&json, key, value) {
            Some(cleared) => cleared,
            None => serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?,
        };
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// `"none"` unsets an optional key whatever it held before. Returns
    /// `None` for other values and for keys that cannot be unset.
    fn cleared_optional(json: &serde_json::Value, key: &str, value: &str) -> Option<Config> {
        if !value.eq_ignore_ascii_case("none") {
            return None;
        }
        let mut cleared = json.clone();
        *cleared.pointer_mut(&format!("/{}", key.replace('.', "/")))? = serde_json::Value::Null;
        serde_json::from_value(cleared).ok()
    }

    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let check = |ok: bool, key: &str, message: &str| {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: message.to_string(),
                })
            }
        };
        let d = &self.detection;
        check(
            d.magnitude_threshold.is_finite() && d.magnitude_threshold >= 0.0,
            "detection.magnitude_threshold",
            "must be a non-negative number",
        )?;
        check(
            (0.0..=1.0).contains(&d.score_threshold),
            "detection.score_threshold",
            "must be between 0 and 1",
        )?;
        check(
            d.shake_threshold.is_finite() && d.shake_threshold > 0.0,
            "detection.shake_threshold",
            "must be positive",
        )?;
        check(
            self.escalation.countdown_secs >= 1,
            "escalation.countdown_secs",
            "must be at least 1",
        )?;
        check(
            self.escalation.tick_interval_ms >= 1,
            "escalation.tick_interval_ms",
            "must be at least 1",
        )?;
        check(
            (0.0..=1.0).contains(&self.escalation.min_volume),
            "escalation.min_volume",
            "must be between 0 and 1",
        )?;
        check(
            !self.notify.message.trim().is_empty(),
            "notify.message",
            "cannot be empty",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_default_values() {
        let cfg = Config::default();
        assert_eq!(cfg.detection.strategy, DetectionStrategy::Conjunctive);
        assert_eq!(cfg.detection.magnitude_threshold, 15.0);
        assert_eq!(cfg.detection.score_threshold, 0.5);
        assert_eq!(cfg.detection.shake_threshold, 8.0);
        assert_eq!(cfg.detection.shake_interval_ms, 500);
        assert_eq!(cfg.escalation.countdown_secs, 15);
        assert_eq!(cfg.escalation.tick_interval_ms, 1000);
        assert_eq!(cfg.notify.mode, NotifyMode::MessageAll);
        assert_eq!(cfg.notify.message, DEFAULT_MESSAGE);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: Config = toml::from_str("[escalation]\ncountdown_secs = 5\n").unwrap();
        assert_eq!(cfg.escalation.countdown_secs, 5);
        assert_eq!(cfg.escalation.tick_interval_ms, 1000);
        assert_eq!(cfg.detection, DetectionConfig::default());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("escalation.countdown_secs").as_deref(), Some("15"));
        assert_eq!(cfg.get("detection.strategy").as_deref(), Some("conjunctive"));
        assert_eq!(cfg.get("notify.mode").as_deref(), Some("message_all"));
        assert!(cfg.get("escalation.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.set("escalation.countdown_secs", "30").unwrap();
        cfg.set("detection.strategy", "shake").unwrap();
        cfg.set("detection.magnitude_threshold", "12.5").unwrap();
        cfg.set("notify.mode", "dial_primary").unwrap();
        assert_eq!(cfg.escalation.countdown_secs, 30);
        assert_eq!(cfg.detection.strategy, DetectionStrategy::Shake);
        assert_eq!(cfg.detection.magnitude_threshold, 12.5);
        assert_eq!(cfg.notify.mode, NotifyMode::DialPrimary);
    }

    #[test]
    fn set_optional_path() {
        let mut cfg = Config::default();
        cfg.set("detection.model_path", "/tmp/model.json").unwrap();
        assert_eq!(
            cfg.detection.model_path.as_deref(),
            Some(Path::new("/tmp/model.json"))
        );
    }

    #[test]
    fn set_none_clears_optional_path() {
        let mut cfg = Config::default();
        cfg.set("detection.model_path", "/tmp/model.json").unwrap();
        cfg.set("detection.model_path", "none").unwrap();
        assert_eq!(cfg.detection.model_path, None);

        cfg.set("detection.model_path", "NONE").unwrap();
        assert_eq!(cfg.detection.model_path, None);
        assert_eq!(cfg.get("detection.model_path").as_deref(), Some("null"));
    }

    #[test]
    fn set_none_on_required_string_is_literal() {
        let mut cfg = Config::default();
        cfg.set("notify.message", "none").unwrap();
        assert_eq!(cfg.notify.message, "none");
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("escalation.nonexistent_key", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.set("nope.countdown_secs", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn set_rejects_invalid_values_and_leaves_config_untouched() {
        let mut cfg = Config::default();
        assert!(cfg.set("escalation.countdown_secs", "soon").is_err());
        assert!(cfg.set("escalation.countdown_secs", "0").is_err());
        assert!(cfg.set("escalation.countdown_secs", "300").is_err());
        assert!(cfg.set("detection.strategy", "vibes").is_err());
        assert!(cfg.set("detection.score_threshold", "1.5").is_err());
        assert!(cfg.set("escalation", "{}").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn entries_lists_every_leaf() {
        let keys: Vec<String> = Config::default().entries().into_iter().map(|(k, _)| k).collect();
        assert!(keys.contains(&"detection.shake_interval_ms".to_string()));
        assert!(keys.contains(&"escalation.min_volume".to_string()));
        assert!(keys.contains(&"notify.message".to_string()));
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg, Config::default());

        let mut changed = cfg.clone();
        changed.set("escalation.countdown_secs", "9").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().escalation.countdown_secs, 9);
    }

    #[test]
    fn load_from_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "escalation = 3").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
