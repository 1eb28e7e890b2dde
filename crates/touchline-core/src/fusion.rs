//! Fusion of the tracking and emotion streams into one mode-specific output.
//!
//! The [`FusionEngine`] never owns its inputs. It holds `watch` receivers for
//! the latest committed [`BallState`] and [`EmotionState`] and reads them on
//! every fusion tick, so producers are never blocked and the output may lag
//! the producers by up to one fusion period.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --start(mode)--> Calibrating --progress reaches 100--> Active
//!   ^                                                            |
//!   +----------------------------stop()--------------------------+
//! ```
//!
//! Calibration is skipped entirely when no warm-up is configured.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use touchline_types::{
    BallState, BlindOutput, DeafOutput, EmotionState, FusionOutput, Mode, Vector2,
};
use tracing::{debug, info};

use crate::config::ConfigError;

/// Allowed deviation of the weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

/// Errors raised by the fusion engine.
#[derive(Debug, thiserror::Error)]
pub enum FusionError {
    /// The requested mode is neither `deaf` nor `blind`.
    #[error("invalid fusion mode `{mode}` (expected `deaf` or `blind`)")]
    InvalidMode {
        /// The rejected mode string.
        mode: String,
    },

    /// The engine was started before both input streams were wired.
    #[error("fusion engine started before ball and emotion inputs were wired")]
    NotReady,
}

/// Parse a mode string. Surrounding whitespace and case are ignored.
///
/// # Errors
///
/// Returns [`FusionError::InvalidMode`] for anything but `deaf` or `blind`.
pub fn parse_mode(raw: &str) -> Result<Mode, FusionError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "deaf" => Ok(Mode::Deaf),
        "blind" => Ok(Mode::Blind),
        _ => Err(FusionError::InvalidMode {
            mode: raw.to_owned(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Weights and factors
// ---------------------------------------------------------------------------

/// Relative contribution of each emotion axis to the fusion output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionWeights {
    /// Weight of the excitement axis.
    #[serde(default = "default_excitement_weight")]
    pub excitement: f64,
    /// Weight of the focus axis.
    #[serde(default = "default_focus_weight")]
    pub focus: f64,
    /// Weight of the stress axis.
    #[serde(default = "default_stress_weight")]
    pub stress: f64,
}

impl Default for EmotionWeights {
    fn default() -> Self {
        Self {
            excitement: default_excitement_weight(),
            focus: default_focus_weight(),
            stress: default_stress_weight(),
        }
    }
}

const fn default_excitement_weight() -> f64 {
    0.4
}

const fn default_focus_weight() -> f64 {
    0.3
}

const fn default_stress_weight() -> f64 {
    0.3
}

impl EmotionWeights {
    /// Check that every weight is in `[0, 1]` and that they sum to 1.0
    /// within [`WEIGHT_SUM_TOLERANCE`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WeightOutOfRange`] for the first weight outside
    /// `[0, 1]`, otherwise [`ConfigError::InvalidWeights`] if the sum is off.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (axis, value) in [
            ("excitement", self.excitement),
            ("focus", self.focus),
            ("stress", self.stress),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::WeightOutOfRange { axis, value });
            }
        }
        let sum = self.excitement + self.focus + self.stress;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::InvalidWeights { sum });
        }
        Ok(())
    }

    /// Weight an emotion reading.
    pub fn factors(&self, emotion: &EmotionState) -> EmotionFactors {
        EmotionFactors {
            excitement: emotion.excitement * self.excitement,
            focus: emotion.focus * self.focus,
            stress: emotion.stress * self.stress,
        }
    }
}

/// Weighted emotion axes for one fusion tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionFactors {
    /// Weighted excitement.
    pub excitement: f64,
    /// Weighted focus.
    pub focus: f64,
    /// Weighted stress.
    pub stress: f64,
}

impl EmotionFactors {
    /// Emotional intensity shared by both projections.
    pub fn intensity(&self) -> f64 {
        self.excitement + self.focus
    }

    /// Deaf-mode velocity multiplier.
    ///
    /// Zero or negative when stress dominates; that freezes or flips the
    /// arrow and is passed through unchanged.
    pub fn speed_scale(&self) -> f64 {
        1.0 + self.excitement - self.stress
    }
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// Directional projection: velocity scaled by the emotional speed factor.
pub fn project_deaf(ball: &BallState, factors: &EmotionFactors) -> DeafOutput {
    DeafOutput {
        position: ball.position,
        velocity: ball.velocity * factors.speed_scale(),
        emotional_intensity: factors.intensity(),
    }
}

/// Spatial-audio projection relative to the center spot.
pub fn project_blind(ball: &BallState, factors: &EmotionFactors) -> BlindOutput {
    let offset = ball.position - Vector2::CENTER;
    let distance = offset.length();
    BlindOutput {
        position: ball.position,
        velocity: ball.velocity,
        distance,
        angle: offset.angle(),
        volume: 0.5f64.mul_add(-distance, 1.0),
        pitch: 0.5f64.mul_add(factors.excitement, 1.0),
        emotional_intensity: factors.intensity(),
    }
}

/// Project for the given mode. Deterministic in its inputs.
pub fn project(mode: Mode, ball: &BallState, factors: &EmotionFactors) -> FusionOutput {
    match mode {
        Mode::Deaf => FusionOutput::Deaf(project_deaf(ball, factors)),
        Mode::Blind => FusionOutput::Blind(project_blind(ball, factors)),
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Lifecycle state of the [`FusionEngine`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FusionState {
    /// Not publishing.
    Idle,
    /// Warming up; nothing is published until `progress` reaches 100.
    Calibrating {
        /// Warm-up progress in percent.
        progress: f64,
    },
    /// Publishing one output per tick.
    Active,
}

/// Combines the latest ball and emotion values into a [`FusionOutput`].
#[derive(Debug)]
pub struct FusionEngine {
    weights: EmotionWeights,
    /// Ticks spent calibrating before the first publish; zero means none.
    warmup_ticks: u32,
    calibrated_ticks: u32,
    state: FusionState,
    mode: Option<Mode>,
    ball: Option<watch::Receiver<BallState>>,
    emotion: Option<watch::Receiver<EmotionState>>,
    latest: Option<FusionOutput>,
}

impl FusionEngine {
    /// Create an idle, unwired engine without warm-up.
    pub const fn new(weights: EmotionWeights) -> Self {
        Self {
            weights,
            warmup_ticks: 0,
            calibrated_ticks: 0,
            state: FusionState::Idle,
            mode: None,
            ball: None,
            emotion: None,
            latest: None,
        }
    }

    /// Require a warm-up of `warmup` before the first publish, given that
    /// [`tick`](Self::tick) runs every `period`.
    #[must_use]
    pub fn with_warmup(mut self, warmup: Duration, period: Duration) -> Self {
        let ticks = if period.is_zero() {
            0
        } else {
            warmup.as_millis().div_ceil(period.as_millis())
        };
        self.warmup_ticks = u32::try_from(ticks).unwrap_or(u32::MAX);
        self
    }

    /// Connect the input streams.
    pub fn wire(
        &mut self,
        ball: watch::Receiver<BallState>,
        emotion: watch::Receiver<EmotionState>,
    ) {
        self.ball = Some(ball);
        self.emotion = Some(emotion);
    }

    /// Whether both inputs are wired.
    pub const fn is_ready(&self) -> bool {
        self.ball.is_some() && self.emotion.is_some()
    }

    /// Parse `mode` and start publishing.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::InvalidMode`] if the mode is not recognized
    /// (checked first), or [`FusionError::NotReady`] if the inputs are not
    /// wired. On error the engine state is unchanged.
    pub fn start(&mut self, mode: &str) -> Result<Mode, FusionError> {
        let mode = parse_mode(mode)?;
        self.start_mode(mode)?;
        Ok(mode)
    }

    /// Start publishing in an already-parsed mode.
    ///
    /// Starting a running engine only switches the mode.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::NotReady`] if the inputs are not wired.
    pub fn start_mode(&mut self, mode: Mode) -> Result<(), FusionError> {
        if !self.is_ready() {
            return Err(FusionError::NotReady);
        }
        self.mode = Some(mode);
        if self.state == FusionState::Idle {
            self.calibrated_ticks = 0;
            self.state = if self.warmup_ticks > 0 {
                FusionState::Calibrating { progress: 0.0 }
            } else {
                FusionState::Active
            };
            info!(mode = %mode, state = ?self.state, "Fusion engine started");
        }
        Ok(())
    }

    /// Stop publishing. Returns whether the engine was running.
    ///
    /// The last output stays readable through [`latest`](Self::latest).
    pub fn stop(&mut self) -> bool {
        if self.state == FusionState::Idle {
            return false;
        }
        self.state = FusionState::Idle;
        info!("Fusion engine stopped");
        true
    }

    /// Run one fusion tick. Returns the output to publish, if any.
    pub fn tick(&mut self) -> Option<FusionOutput> {
        match self.state {
            FusionState::Idle => None,
            FusionState::Calibrating { .. } => {
                self.calibrated_ticks = self.calibrated_ticks.saturating_add(1);
                self.state = if self.calibrated_ticks >= self.warmup_ticks {
                    info!(ticks = self.calibrated_ticks, "Fusion calibration complete");
                    FusionState::Active
                } else {
                    FusionState::Calibrating {
                        progress: f64::from(self.calibrated_ticks) / f64::from(self.warmup_ticks)
                            * 100.0,
                    }
                };
                None
            }
            FusionState::Active => {
                let mode = self.mode?;
                let ball = *self.ball.as_ref()?.borrow();
                let emotion = *self.emotion.as_ref()?.borrow();
                let factors = self.weights.factors(&emotion);
                let output = project(mode, &ball, &factors);
                debug!(
                    mode = %mode,
                    intensity = output.emotional_intensity(),
                    "Fusion output computed"
                );
                self.latest = Some(output);
                Some(output)
            }
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> FusionState {
        self.state
    }

    /// Warm-up progress in percent: 0 when idle, 100 when active.
    pub const fn progress(&self) -> f64 {
        match self.state {
            FusionState::Idle => 0.0,
            FusionState::Calibrating { progress } => progress,
            FusionState::Active => 100.0,
        }
    }

    /// Most recently published output.
    pub const fn latest(&self) -> Option<FusionOutput> {
        self.latest
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn wired(ball: BallState, emotion: EmotionState) -> (FusionEngine, watch::Sender<BallState>) {
        let (ball_tx, ball_rx) = watch::channel(ball);
        let (_emotion_tx, emotion_rx) = watch::channel(emotion);
        let mut engine = FusionEngine::new(EmotionWeights::default());
        engine.wire(ball_rx, emotion_rx);
        (engine, ball_tx)
    }

    fn ball_at(x: f64, y: f64) -> BallState {
        BallState {
            position: Vector2::new(x, y),
            velocity: Vector2::new(0.004, -0.002),
        }
    }

    #[test]
    fn parse_mode_accepts_known_modes() {
        assert_eq!(parse_mode("deaf").unwrap(), Mode::Deaf);
        assert_eq!(parse_mode(" Blind ").unwrap(), Mode::Blind);
        let err = parse_mode("x").unwrap_err();
        assert!(matches!(err, FusionError::InvalidMode { ref mode } if mode == "x"));
    }

    #[test]
    fn intensity_is_weighted_excitement_plus_focus() {
        let factors = EmotionWeights::default().factors(&EmotionState::clamped(1.0, 1.0, 0.5));
        assert!((factors.intensity() - 0.7).abs() < EPS);

        for (x, y) in [(0.1, 0.9), (0.5, 0.5), (0.95, 0.05)] {
            let out = project(Mode::Deaf, &ball_at(x, y), &factors);
            assert!((out.emotional_intensity() - 0.7).abs() < EPS);
        }
    }

    #[test]
    fn blind_projection_is_relative_to_center() {
        let factors = EmotionWeights::default().factors(&EmotionState::clamped(0.5, 0.5, 0.5));
        let out = project_blind(&ball_at(0.75, 0.5), &factors);
        assert!((out.distance - 0.25).abs() < EPS);
        assert!(out.angle.abs() < EPS);
        assert!((out.volume - 0.875).abs() < EPS);
        assert!((out.pitch - 1.1).abs() < EPS);
        assert_eq!(out.velocity, ball_at(0.75, 0.5).velocity);

        let again = project_blind(&ball_at(0.75, 0.5), &factors);
        assert_eq!(out, again);
    }

    #[test]
    fn deaf_projection_scales_velocity() {
        let factors = EmotionWeights::default().factors(&EmotionState::clamped(1.0, 0.0, 0.0));
        let out = project_deaf(&ball_at(0.5, 0.5), &factors);
        assert!((out.velocity.x - 0.004 * 1.4).abs() < EPS);
        assert!((out.velocity.y + 0.002 * 1.4).abs() < EPS);
    }

    #[test]
    fn stress_can_invert_deaf_velocity() {
        let weights = EmotionWeights {
            excitement: 0.0,
            focus: 0.0,
            stress: 1.0,
        };
        let mut factors = weights.factors(&EmotionState::clamped(0.0, 0.0, 1.0));
        factors.stress = 1.5;
        let out = project_deaf(&ball_at(0.5, 0.5), &factors);
        assert!(out.velocity.x < 0.0);
    }

    #[test]
    fn weight_validation() {
        assert!(EmotionWeights::default().validate().is_ok());
        let out_of_range = EmotionWeights {
            excitement: 1.2,
            focus: -0.1,
            stress: -0.1,
        };
        assert!(matches!(
            out_of_range.validate(),
            Err(ConfigError::WeightOutOfRange {
                axis: "excitement",
                ..
            })
        ));
        let close_enough = EmotionWeights {
            excitement: 0.3334,
            focus: 0.3333,
            stress: 0.3333,
        };
        assert!(close_enough.validate().is_ok());
    }

    #[test]
    fn start_requires_wired_inputs() {
        let mut engine = FusionEngine::new(EmotionWeights::default());
        assert!(matches!(engine.start("deaf"), Err(FusionError::NotReady)));
        assert_eq!(engine.state(), FusionState::Idle);
    }

    #[test]
    fn invalid_mode_is_reported_before_readiness() {
        let mut engine = FusionEngine::new(EmotionWeights::default());
        assert!(matches!(
            engine.start("x"),
            Err(FusionError::InvalidMode { .. })
        ));
    }

    #[test]
    fn invalid_mode_publishes_nothing() {
        let (mut engine, _ball_tx) = wired(ball_at(0.5, 0.5), EmotionState::default());
        assert!(engine.start("x").is_err());
        assert_eq!(engine.state(), FusionState::Idle);
        for _ in 0..10 {
            assert!(engine.tick().is_none());
        }
        assert!(engine.latest().is_none());
    }

    #[test]
    fn modes_are_exclusive() {
        for (raw, expected) in [("deaf", Mode::Deaf), ("blind", Mode::Blind)] {
            let (mut engine, _ball_tx) = wired(ball_at(0.3, 0.7), EmotionState::default());
            assert_eq!(engine.start(raw).unwrap(), expected);
            for _ in 0..25 {
                assert_eq!(engine.tick().unwrap().mode(), expected);
            }
        }
    }

    #[test]
    fn tick_reads_latest_ball() {
        let (mut engine, ball_tx) = wired(ball_at(0.5, 0.5), EmotionState::default());
        engine.start("blind").unwrap();
        assert!(engine.tick().unwrap().position().distance(Vector2::CENTER) < EPS);

        ball_tx.send(ball_at(0.75, 0.5)).unwrap();
        let FusionOutput::Blind(out) = engine.tick().unwrap() else {
            panic!("expected blind output");
        };
        assert!((out.distance - 0.25).abs() < EPS);
    }

    #[test]
    fn stop_is_idempotent() {
        let (mut engine, _ball_tx) = wired(ball_at(0.5, 0.5), EmotionState::default());
        engine.start("deaf").unwrap();
        assert!(engine.tick().is_some());

        assert!(engine.stop());
        assert!(!engine.stop());
        assert!(engine.tick().is_none());
        assert!(engine.latest().is_some());
    }

    #[test]
    fn warmup_delays_first_publish() {
        let (engine, _ball_tx) = wired(ball_at(0.5, 0.5), EmotionState::default());
        let mut engine =
            engine.with_warmup(Duration::from_millis(500), Duration::from_millis(50));
        engine.start("deaf").unwrap();
        assert!(matches!(engine.state(), FusionState::Calibrating { .. }));

        for _ in 0..10 {
            assert!(engine.tick().is_none());
        }
        assert_eq!(engine.state(), FusionState::Active);
        assert!((engine.progress() - 100.0).abs() < EPS);
        assert!(engine.tick().is_some());
    }
}
