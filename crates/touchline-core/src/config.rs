//! Configuration loading and typed config structures for a Touchline session.
//!
//! The canonical configuration lives in `touchline-config.yaml` at the
//! project root. Every field has a default, so an empty or missing file
//! yields a runnable deaf-mode session at the standard cadence
//! (per-frame physics, 1 s emotion, 50 ms fusion).

use std::path::Path;

use serde::Deserialize;
use touchline_types::EmotionThresholds;

use crate::fusion::EmotionWeights;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The emotion weights do not sum to 1.0.
    #[error("emotion weights must sum to 1.0 (got {sum})")]
    InvalidWeights {
        /// The actual sum of the three weights.
        sum: f64,
    },

    /// A single emotion weight is outside `[0, 1]`.
    #[error("emotion weight `{axis}` must be within [0, 1] (got {value})")]
    WeightOutOfRange {
        /// The offending axis name.
        axis: &'static str,
        /// The configured value.
        value: f64,
    },

    /// A tick interval was configured as zero.
    #[error("interval `{name}` must be greater than zero")]
    ZeroInterval {
        /// The offending interval name.
        name: &'static str,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `touchline-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TouchlineConfig {
    /// Mode, seed, and clock cadence.
    #[serde(default)]
    pub session: SessionConfig,

    /// Fusion weighting.
    #[serde(default)]
    pub fusion: FusionConfig,

    /// Emotion alert thresholds.
    #[serde(default)]
    pub emotion: EmotionConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TouchlineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `TOUCHLINE_MODE` overrides `session.mode`
    /// - `TOUCHLINE_SEED` overrides `session.seed`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.session.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.session.apply_env_overrides();
        Ok(config)
    }

    /// Check the numeric preconditions the simulation relies on.
    ///
    /// The mode string is not checked here; it is validated when the
    /// session is initialized.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroInterval`], [`ConfigError::WeightOutOfRange`],
    /// or [`ConfigError::InvalidWeights`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session.validate()?;
        self.fusion.emotion_weights.validate()
    }
}

/// Session mode, seed, and clock cadence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Accessibility mode: `deaf` or `blind`.
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Random seed for reproducibility. When absent a seed is drawn at
    /// session creation and logged.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Milliseconds between physics/detection frames.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Milliseconds between emotion estimates.
    #[serde(default = "default_emotion_interval_ms")]
    pub emotion_interval_ms: u64,

    /// Milliseconds between fusion publishes.
    #[serde(default = "default_fusion_interval_ms")]
    pub fusion_interval_ms: u64,

    /// Fusion calibration time before the first publish (0 = none).
    #[serde(default)]
    pub warmup_ms: u64,

    /// Wall-clock seconds the engine binary runs before stopping
    /// (0 = until interrupted).
    #[serde(default)]
    pub max_real_time_seconds: u64,
}

impl SessionConfig {
    /// Override mode and seed with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var("TOUCHLINE_MODE").ok(),
            std::env::var("TOUCHLINE_SEED").ok(),
        );
    }

    /// Apply already-read override values. A seed that is not an unsigned
    /// integer is ignored.
    pub fn apply_overrides(&mut self, mode: Option<String>, seed: Option<String>) {
        if let Some(mode) = mode {
            self.mode = mode;
        }
        if let Some(seed) = seed.and_then(|raw| raw.trim().parse::<u64>().ok()) {
            self.seed = Some(seed);
        }
    }

    /// Reject zero intervals.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroInterval`] naming the first zero interval.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval {
                name: "frame_interval_ms",
            });
        }
        if self.emotion_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval {
                name: "emotion_interval_ms",
            });
        }
        if self.fusion_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval {
                name: "fusion_interval_ms",
            });
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            seed: None,
            frame_interval_ms: default_frame_interval_ms(),
            emotion_interval_ms: default_emotion_interval_ms(),
            fusion_interval_ms: default_fusion_interval_ms(),
            warmup_ms: 0,
            max_real_time_seconds: 0,
        }
    }
}

/// Fusion weighting.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FusionConfig {
    /// Weights applied to each emotion axis. Must sum to 1.0.
    #[serde(default)]
    pub emotion_weights: EmotionWeights,
}

/// Emotion alert thresholds.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EmotionConfig {
    /// Level above which each axis is reported as elevated.
    #[serde(default)]
    pub thresholds: EmotionThresholds,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_mode() -> String {
    "deaf".to_owned()
}

const fn default_frame_interval_ms() -> u64 {
    16
}

const fn default_emotion_interval_ms() -> u64 {
    1000
}

const fn default_fusion_interval_ms() -> u64 {
    50
}

fn default_log_level() -> String {
    "info".to_owned()
}
