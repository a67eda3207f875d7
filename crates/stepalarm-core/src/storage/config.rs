//! TOML-based configuration.
//!
//! Stores:
//! - Step and blink detector tuning
//! - Tone, vibration and the chosen alarm clip
//! - Engine timeouts and the default goal
//!
//! Configuration is stored at `~/.config/stepalarm/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::alert::{AlertConfig, ToneHandle};
use crate::detect::{BlinkDetectorConfig, DetectorConfig, MotionDetectorConfig};
use crate::engine::EngineConfig;
use crate::error::ConfigError;
use crate::sensing::Modality;

/// Alert configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSection {
    #[serde(default = "default_beep_frequency_hz")]
    pub beep_frequency_hz: u32,
    #[serde(default = "default_beep_on_ms")]
    pub beep_on_ms: u64,
    #[serde(default = "default_beep_off_ms")]
    pub beep_off_ms: u64,
    #[serde(default = "default_true")]
    pub vibration: bool,
    #[serde(default = "default_vibration_pattern")]
    pub vibration_pattern: Vec<u64>,
    #[serde(default = "default_vibration_repeat_ms")]
    pub vibration_repeat_ms: u64,
    /// Reference to the chosen alarm clip (URI or file path).
    /// Unset or empty plays the synthesized tone.
    #[serde(default)]
    pub custom_tone: Option<String>,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_wake_hold_max_ms")]
    pub wake_hold_max_ms: u64,
    #[serde(default = "default_sensor_silence_ms")]
    pub sensor_silence_ms: u64,
    /// Keep ringing after the goal until dismissed.
    #[serde(default)]
    pub require_acknowledge: bool,
    #[serde(default = "default_goal")]
    pub default_goal: u32,
    #[serde(default = "default_modality")]
    pub default_modality: Modality,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/stepalarm/config.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub motion: MotionDetectorConfig,
    #[serde(default)]
    pub blink: BlinkDetectorConfig,
    #[serde(default)]
    pub alert: AlertSection,
    #[serde(default)]
    pub engine: EngineSection,
}

// Default functions
fn default_beep_frequency_hz() -> u32 {
    600
}
fn default_beep_on_ms() -> u64 {
    800
}
fn default_beep_off_ms() -> u64 {
    500
}
fn default_true() -> bool {
    true
}
fn default_vibration_pattern() -> Vec<u64> {
    vec![100, 50, 100]
}
fn default_vibration_repeat_ms() -> u64 {
    300
}
fn default_wake_hold_max_ms() -> u64 {
    10 * 60 * 1000
}
fn default_sensor_silence_ms() -> u64 {
    5_000
}
fn default_goal() -> u32 {
    20
}
fn default_modality() -> Modality {
    Modality::Step
}

impl Default for AlertSection {
    fn default() -> Self {
        Self {
            beep_frequency_hz: default_beep_frequency_hz(),
            beep_on_ms: default_beep_on_ms(),
            beep_off_ms: default_beep_off_ms(),
            vibration: true,
            vibration_pattern: default_vibration_pattern(),
            vibration_repeat_ms: default_vibration_repeat_ms(),
            custom_tone: None,
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            wake_hold_max_ms: default_wake_hold_max_ms(),
            sensor_silence_ms: default_sensor_silence_ms(),
            require_acknowledge: false,
            default_goal: default_goal(),
            default_modality: default_modality(),
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

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the config directory, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            Ok(cfg)
        }
    }

    /// Load from an explicit file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };
        let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Persist to the config directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
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

    /// Every leaf key with its value, in file order.
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

    /// Change one value in memory. The result is validated; on error the
    /// config is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Reject values the detectors and the alert cadence cannot work with.
    ///
    /// # Errors
    ///
    /// Names the first offending key.
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

        check(self.motion.threshold > 0.0, "motion.threshold", "must be positive")?;
        check(
            self.motion.release_ratio > 0.0 && self.motion.release_ratio <= 1.0,
            "motion.release_ratio",
            "must be in (0, 1]",
        )?;
        check(
            self.motion.max_magnitude > self.motion.threshold,
            "motion.max_magnitude",
            "must exceed motion.threshold",
        )?;
        check(
            self.blink.dark_floor < self.blink.bright_ceiling,
            "blink.dark_floor",
            "must be below blink.bright_ceiling",
        )?;
        check(
            self.blink.min_samples <= self.blink.window_len,
            "blink.min_samples",
            "must not exceed blink.window_len",
        )?;
        check(
            self.alert.beep_on_ms > 0 && self.alert.beep_off_ms > 0,
            "alert.beep_on_ms",
            "tone durations must be positive",
        )?;
        check(
            self.alert.vibration_repeat_ms > 0,
            "alert.vibration_repeat_ms",
            "must be positive",
        )?;
        check(self.engine.default_goal > 0, "engine.default_goal", "must be at least 1")?;
        Ok(())
    }

    /// Engine settings derived from this config.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            detectors: DetectorConfig {
                motion: self.motion.clone(),
                blink: self.blink.clone(),
            },
            alert: AlertConfig {
                beep_frequency_hz: self.alert.beep_frequency_hz,
                beep_on_ms: self.alert.beep_on_ms,
                beep_off_ms: self.alert.beep_off_ms,
                vibration_enabled: self.alert.vibration,
                vibration_pattern: self.alert.vibration_pattern.clone(),
                vibration_repeat_ms: self.alert.vibration_repeat_ms,
            },
            wake_hold_max_ms: self.engine.wake_hold_max_ms,
            sensor_silence_ms: self.engine.sensor_silence_ms,
            require_acknowledge: self.engine.require_acknowledge,
        }
    }

    /// The chosen clip, if one is configured.
    pub fn tone_handle(&self) -> Option<ToneHandle> {
        self.alert
            .custom_tone
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToneHandle::new)
    }
}
