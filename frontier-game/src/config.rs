//! Host-loop and persistence tuning.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{OFFLINE_CAP_SEC, OFFLINE_STEP_SEC};
use crate::store::STORAGE_KEY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config JSON is malformed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} is out of range (got {value})")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("storage key must not be empty")]
    EmptyStorageKey,
}

/// How a host drives the simulation between frames and saves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    #[serde(default = "HostConfig::default_sub_step_sec")]
    pub sub_step_sec: f64,
    #[serde(default = "HostConfig::default_max_frame_delta_sec")]
    pub max_frame_delta_sec: f64,
    #[serde(default = "HostConfig::default_max_steps_per_frame")]
    pub max_steps_per_frame: u32,
    #[serde(default = "HostConfig::default_autosave_interval_sec")]
    pub autosave_interval_sec: f64,
    #[serde(default = "HostConfig::default_offline_cap_sec")]
    pub offline_cap_sec: f64,
    #[serde(default = "HostConfig::default_offline_step_sec")]
    pub offline_step_sec: f64,
    /// Catch-ups shorter than this are not reported in the player log.
    #[serde(default = "HostConfig::default_offline_log_threshold_sec")]
    pub offline_log_threshold_sec: f64,
    #[serde(default = "HostConfig::default_storage_key")]
    pub storage_key: String,
}

impl HostConfig {
    const fn default_sub_step_sec() -> f64 {
        0.1
    }

    const fn default_max_frame_delta_sec() -> f64 {
        0.5
    }

    const fn default_max_steps_per_frame() -> u32 {
        20
    }

    const fn default_autosave_interval_sec() -> f64 {
        5.0
    }

    const fn default_offline_cap_sec() -> f64 {
        OFFLINE_CAP_SEC
    }

    const fn default_offline_step_sec() -> f64 {
        OFFLINE_STEP_SEC
    }

    const fn default_offline_log_threshold_sec() -> f64 {
        10.0
    }

    fn default_storage_key() -> String {
        STORAGE_KEY.to_string()
    }

    /// Parse and validate a config document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or an out-of-range value.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns the first field found outside its accepted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |field: &'static str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange { field, value })
            }
        };
        positive("subStepSec", self.sub_step_sec)?;
        if self.sub_step_sec > 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "subStepSec",
                value: self.sub_step_sec,
            });
        }
        positive("maxFrameDeltaSec", self.max_frame_delta_sec)?;
        positive("autosaveIntervalSec", self.autosave_interval_sec)?;
        positive("offlineStepSec", self.offline_step_sec)?;
        if self.offline_step_sec > 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "offlineStepSec",
                value: self.offline_step_sec,
            });
        }
        if self.max_steps_per_frame == 0 {
            return Err(ConfigError::OutOfRange {
                field: "maxStepsPerFrame",
                value: 0.0,
            });
        }
        if !self.offline_cap_sec.is_finite() || self.offline_cap_sec < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "offlineCapSec",
                value: self.offline_cap_sec,
            });
        }
        if self.offline_log_threshold_sec.is_nan() || self.offline_log_threshold_sec < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "offlineLogThresholdSec",
                value: self.offline_log_threshold_sec,
            });
        }
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::EmptyStorageKey);
        }
        Ok(())
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            sub_step_sec: Self::default_sub_step_sec(),
            max_frame_delta_sec: Self::default_max_frame_delta_sec(),
            max_steps_per_frame: Self::default_max_steps_per_frame(),
            autosave_interval_sec: Self::default_autosave_interval_sec(),
            offline_cap_sec: Self::default_offline_cap_sec(),
            offline_step_sec: Self::default_offline_step_sec(),
            offline_log_threshold_sec: Self::default_offline_log_threshold_sec(),
            storage_key: Self::default_storage_key(),
        }
    }
}
