//! Synthetic emotion estimation.
//!
//! Each axis follows its own slow wave plus a small uniform jitter:
//!
//! | Axis       | Baseline | Amplitude | Wave            |
//! |------------|----------|-----------|-----------------|
//! | excitement | 0.5      | 0.3       | `sin(0.10 t)`   |
//! | focus      | 0.6      | 0.2       | `cos(0.07 t)`   |
//! | stress     | 0.3      | 0.2       | `sin(0.15 t)`   |
//!
//! `t` is wall-clock seconds. The estimate ignores the match entirely; the
//! headset and the camera are independent sensors. Successive samples are not
//! smoothed.

use chrono::Utc;
use rand::Rng;
use rand::rngs::StdRng;
use touchline_types::EmotionState;

/// Upper bound of the uniform jitter added to every axis.
pub const EMOTION_NOISE: f64 = 0.1;

/// Peak-to-peak range of the jitter on the raw signal trace.
pub const SIGNAL_NOISE: f64 = 5.0;

/// Trigonometric shape of an axis wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wave {
    /// `sin(frequency * t)`.
    Sine,
    /// `cos(frequency * t)`.
    Cosine,
}

/// `baseline + amplitude * wave(frequency * t)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisWave {
    /// Resting level.
    pub baseline: f64,
    /// Swing around the baseline.
    pub amplitude: f64,
    /// Angular frequency in radians per second.
    pub frequency: f64,
    /// Sine or cosine.
    pub wave: Wave,
}

impl AxisWave {
    /// Noise-free value at time `t`.
    pub fn at(&self, t: f64) -> f64 {
        let phase = self.frequency * t;
        let shape = match self.wave {
            Wave::Sine => phase.sin(),
            Wave::Cosine => phase.cos(),
        };
        self.amplitude.mul_add(shape, self.baseline)
    }
}

/// Excitement wave.
pub const EXCITEMENT_WAVE: AxisWave = AxisWave {
    baseline: 0.5,
    amplitude: 0.3,
    frequency: 0.1,
    wave: Wave::Sine,
};

/// Focus wave.
pub const FOCUS_WAVE: AxisWave = AxisWave {
    baseline: 0.6,
    amplitude: 0.2,
    frequency: 0.07,
    wave: Wave::Cosine,
};

/// Stress wave.
pub const STRESS_WAVE: AxisWave = AxisWave {
    baseline: 0.3,
    amplitude: 0.2,
    frequency: 0.15,
    wave: Wave::Sine,
};

/// Raw brain-signal sample: four band-limited sines plus `noise`.
///
/// The bands approximate delta, theta, alpha and beta activity.
pub fn brainwave_sample(t: f64, noise: f64) -> f64 {
    let delta = (0.5 * t).sin() * 20.0;
    let theta = (1.5 * t).sin() * 15.0;
    let alpha = (2.5 * t).sin() * 10.0;
    let beta = (5.0 * t).sin() * 5.0;
    delta + theta + alpha + beta + noise
}

/// Current wall-clock time in fractional seconds since the Unix epoch.
#[allow(clippy::cast_precision_loss)]
pub fn wall_clock_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Produces [`EmotionState`] samples and the raw signal trace.
#[derive(Debug, Clone)]
pub struct EmotionEstimator {
    rng: StdRng,
    latest: EmotionState,
}

impl EmotionEstimator {
    /// Create an estimator. The latest value starts at all zeros.
    pub fn new(rng: StdRng) -> Self {
        Self {
            rng,
            latest: EmotionState::default(),
        }
    }

    /// Compute a fresh estimate for time `now_seconds` and remember it.
    ///
    /// Every axis is clamped into `[0, 1]`.
    pub fn sample(&mut self, now_seconds: f64) -> EmotionState {
        let excitement = EXCITEMENT_WAVE.at(now_seconds) + self.rng.random::<f64>() * EMOTION_NOISE;
        let focus = FOCUS_WAVE.at(now_seconds) + self.rng.random::<f64>() * EMOTION_NOISE;
        let stress = STRESS_WAVE.at(now_seconds) + self.rng.random::<f64>() * EMOTION_NOISE;
        self.latest = EmotionState::clamped(excitement, focus, stress);
        self.latest
    }

    /// Raw signal at time `t`, with jitter in `[-2.5, 2.5)`.
    pub fn signal(&mut self, t: f64) -> f64 {
        let noise = (self.rng.random::<f64>() - 0.5) * SIGNAL_NOISE;
        brainwave_sample(t, noise)
    }

    /// Most recent estimate.
    pub const fn latest(&self) -> EmotionState {
        self.latest
    }
}
