//! # Profiling Configuration
//!
//! Which frames are sampled and at what granularity. Loaded from a JSON file
//! named by `PRISM_PROFILE_CONFIG`, or built in code:
//!
//! ```json
//! {
//!   "frame_mode": "periodic",
//!   "periodic_min_frame": 100,
//!   "periodic_frame": 600,
//!   "sample_workloads": true,
//!   "sample_frames": false,
//!   "trap": { "poll_interval_us": 250, "settle_delay_ms": 5 },
//!   "counters": ["gpu_cycles", "shader_busy"]
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use prism_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Environment variable holding the configuration file path
pub const CONFIG_ENV: &str = "PRISM_PROFILE_CONFIG";

/// How frames of interest are selected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameMode {
    /// No frame is of interest
    #[default]
    Disabled,
    /// Frames listed in `frame_list`
    FrameList,
    /// Every `periodic_frame`-th frame from `periodic_min_frame` on
    Periodic,
}

/// Trap protocol timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrapConfig {
    /// Sleep between device-to-host status polls
    pub poll_interval_us: u64,
    /// Quiescence delay after the device parks, before sampling
    pub settle_delay_ms: u64,
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self {
            poll_interval_us: 250,
            settle_delay_ms: 5,
        }
    }
}

impl TrapConfig {
    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    /// Settle delay as a duration
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Profiling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Frame selection mode
    pub frame_mode: FrameMode,
    /// Frames of interest in `frame_list` mode
    pub frame_list: Vec<u64>,
    /// First frame considered in `periodic` mode
    pub periodic_min_frame: u64,
    /// Period in `periodic` mode
    pub periodic_frame: u64,
    /// Sample every workload of a frame of interest
    pub sample_workloads: bool,
    /// Sample whole frames of interest
    pub sample_frames: bool,
    /// Trap timing
    pub trap: TrapConfig,
    /// Counters to report; empty reports every counter
    pub counters: Vec<String>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            frame_mode: FrameMode::Disabled,
            frame_list: Vec::new(),
            periodic_min_frame: 0,
            periodic_frame: 600,
            sample_workloads: true,
            sample_frames: false,
            trap: TrapConfig::default(),
            counters: Vec::new(),
        }
    }
}

impl ProfileConfig {
    // =========================================================================
    // Loading
    // =========================================================================

    /// Load from the file named by [`CONFIG_ENV`]
    ///
    /// Falls back to the defaults (profiling disabled) when the variable is
    /// unset or the file cannot be used.
    pub fn from_env() -> Self {
        let Some(path) = std::env::var_os(CONFIG_ENV) else {
            log::debug!("Config: {} not set, profiling disabled", CONFIG_ENV);
            return Self::default();
        };

        match Self::from_path(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!(
                    "Config: {} ({}), using defaults",
                    err,
                    Path::new(&path).display()
                );
                Self::default()
            }
        }
    }

    /// Load from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|err| {
            log::debug!("Config: cannot read {}: {}", path.as_ref().display(), err);
            Error::ConfigUnreadable
        })?;
        Self::from_json(&text)
    }

    /// Parse from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).map_err(|err| {
            log::debug!("Config: parse error: {}", err);
            Error::ConfigInvalid
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check field consistency
    pub fn validate(&self) -> Result<()> {
        if self.frame_mode == FrameMode::Periodic && self.periodic_frame == 0 {
            log::debug!("Config: periodic mode needs a non-zero period");
            return Err(Error::ConfigInvalid);
        }
        Ok(())
    }

    // =========================================================================
    // Builder
    // =========================================================================

    /// Select the listed frames
    pub fn with_frame_list(mut self, frames: impl IntoIterator<Item = u64>) -> Self {
        self.frame_mode = FrameMode::FrameList;
        self.frame_list = frames.into_iter().collect();
        self
    }

    /// Select every `period`-th frame from `min_frame` on
    pub fn with_periodic(mut self, min_frame: u64, period: u64) -> Self {
        self.frame_mode = FrameMode::Periodic;
        self.periodic_min_frame = min_frame;
        self.periodic_frame = period;
        self
    }

    /// Toggle per-workload sampling
    pub fn with_sample_workloads(mut self, enabled: bool) -> Self {
        self.sample_workloads = enabled;
        self
    }

    /// Toggle whole-frame sampling
    pub fn with_sample_frames(mut self, enabled: bool) -> Self {
        self.sample_frames = enabled;
        self
    }

    /// Override trap timing
    pub fn with_trap_timing(mut self, poll_interval: Duration, settle_delay: Duration) -> Self {
        self.trap = TrapConfig {
            poll_interval_us: poll_interval.as_micros() as u64,
            settle_delay_ms: settle_delay.as_millis() as u64,
        };
        self
    }

    /// Report only the named counters
    pub fn with_counters<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.counters = names.into_iter().map(Into::into).collect();
        self
    }

    // =========================================================================
    // Predicates
    // =========================================================================

    /// Check if frame `index` is selected for sampling
    pub fn is_frame_of_interest(&self, index: u64) -> bool {
        match self.frame_mode {
            FrameMode::Disabled => false,
            FrameMode::FrameList => self.frame_list.contains(&index),
            FrameMode::Periodic => {
                self.periodic_frame != 0
                    && index >= self.periodic_min_frame
                    && (index - self.periodic_min_frame) % self.periodic_frame == 0
            }
        }
    }

    /// Workload or frame sampling is enabled
    pub fn sample_any(&self) -> bool {
        self.sample_workloads || self.sample_frames
    }

    /// Profiling can produce data at all
    pub fn is_active(&self) -> bool {
        self.frame_mode != FrameMode::Disabled && self.sample_any()
    }
}
