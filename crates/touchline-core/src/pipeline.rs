//! The per-session stage graph and its three tick handlers.
//!
//! A [`Pipeline`] owns every producer of one session. Each tick handler runs
//! to completion before the next tick is taken, so the stages never observe
//! each other mid-update:
//!
//! - **Frame**: physics advances, then detection reads the post-physics
//!   state of the same frame. The ball is committed to the fusion input
//!   channel and a goal, if any, is published.
//! - **Emotion**: a fresh estimate is committed to the fusion input channel.
//! - **Fusion**: the engine reads the last committed ball and emotion values
//!   and, when active, publishes a [`FeedEvent`].
//!
//! Every handler ends by committing a new [`SessionSnapshot`] to the hub.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::time::Instant;
use touchline_types::{
    BallState, EmotionState, EmotionThresholds, FeedEvent, Mode, SessionId, SessionSnapshot,
    Vector2,
};
use tracing::{debug, info};

use crate::clock::{ClockSet, ClockTick, MatchClock};
use crate::config::TouchlineConfig;
use crate::detection::DetectionSimulator;
use crate::emotion::{EmotionEstimator, wall_clock_seconds};
use crate::fusion::{FusionEngine, FusionError};
use crate::hub::{FeedHub, SessionEvent};
use crate::physics::{NOMINAL_STEP, PhysicsParams, PhysicsSimulator};

/// All mutable state of one session.
#[derive(Debug)]
pub struct Pipeline {
    session_id: SessionId,
    mode: Option<Mode>,
    physics: PhysicsSimulator,
    emotion: EmotionEstimator,
    detection: DetectionSimulator,
    fusion: FusionEngine,
    thresholds: EmotionThresholds,
    tracked_ball: Option<Vector2>,
    ball_tx: watch::Sender<BallState>,
    emotion_tx: watch::Sender<EmotionState>,
    match_clock: MatchClock,
    signal: f64,
}

impl Pipeline {
    /// Build the stages from configuration.
    ///
    /// `seed` feeds one master generator that seeds each stage, so a seed
    /// reproduces the whole session.
    pub fn new(session_id: SessionId, config: &TouchlineConfig, clocks: &ClockSet, seed: u64) -> Self {
        let mut master = StdRng::seed_from_u64(seed);
        let physics = PhysicsSimulator::new(PhysicsParams::default(), fork(&mut master));
        Self::with_physics(session_id, config, clocks, physics, &mut master)
    }

    /// Build the stages around an existing physics simulator.
    pub fn with_physics(
        session_id: SessionId,
        config: &TouchlineConfig,
        clocks: &ClockSet,
        physics: PhysicsSimulator,
        master: &mut StdRng,
    ) -> Self {
        let (ball_tx, _) = watch::channel(physics.ball());
        let (emotion_tx, _) = watch::channel(EmotionState::default());
        let fusion = FusionEngine::new(config.fusion.emotion_weights).with_warmup(
            Duration::from_millis(config.session.warmup_ms),
            clocks.fusion_period(),
        );
        Self {
            session_id,
            mode: None,
            physics,
            emotion: EmotionEstimator::new(fork(master)),
            detection: DetectionSimulator::new(fork(master), Instant::now()),
            fusion,
            thresholds: config.emotion.thresholds,
            tracked_ball: None,
            ball_tx,
            emotion_tx,
            match_clock: MatchClock::new(clocks.frame_period()),
            signal: 0.0,
        }
    }

    /// Select the mode and connect the fusion engine to both producers.
    pub fn initialize(&mut self, mode: Mode) {
        self.mode = Some(mode);
        self.fusion
            .wire(self.ball_tx.subscribe(), self.emotion_tx.subscribe());
    }

    /// Start the fusion engine in the configured mode.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::NotReady`] if [`initialize`](Self::initialize)
    /// has not been called.
    pub fn start_fusion(&mut self) -> Result<Mode, FusionError> {
        let mode = self.mode.ok_or(FusionError::NotReady)?;
        self.fusion.start_mode(mode)?;
        Ok(mode)
    }

    /// Stop the fusion engine. Returns whether it was running.
    pub fn stop_fusion(&mut self) -> bool {
        self.fusion.stop()
    }

    /// Open a fresh fps window at `now`.
    pub fn restart_clock(&mut self, now: Instant) {
        self.detection.restart_window(now);
    }

    /// Run the handler for one tick.
    pub fn handle(&mut self, tick: ClockTick, hub: &FeedHub) {
        match tick {
            ClockTick::Frame => self.frame_tick(hub),
            ClockTick::Emotion => self.emotion_tick(hub),
            ClockTick::Fusion => self.fusion_tick(hub),
        }
    }

    /// Physics, then detection on the same frame.
    pub fn frame_tick(&mut self, hub: &FeedHub) {
        let outcome = self.physics.advance(NOMINAL_STEP);
        self.match_clock.advance();

        // Detection counts frames seen before this one.
        let ball = self.physics.ball();
        let result = self.detection.detect(
            &ball,
            self.physics.players(),
            outcome.frame.saturating_sub(1),
            Instant::now(),
        );
        self.physics.mark_detected(&result.players);
        if result.ball.is_some() {
            self.tracked_ball = result.ball;
        }
        self.ball_tx.send_replace(ball);
        self.signal = self.emotion.signal(wall_clock_seconds());

        if let Some(goal) = outcome.goal {
            hub.publish(&SessionEvent::Goal(goal));
        }
        hub.commit(self.snapshot());
    }

    /// Fresh emotion estimate.
    pub fn emotion_tick(&mut self, hub: &FeedHub) {
        let emotion = self.emotion.sample(wall_clock_seconds());
        self.emotion_tx.send_replace(emotion);
        let elevated = emotion.elevated(&self.thresholds);
        debug!(
            excitement = emotion.excitement,
            focus = emotion.focus,
            stress = emotion.stress,
            elevated = elevated.any(),
            "Emotion sampled"
        );
        hub.commit(self.snapshot());
    }

    /// Fusion publish, if the engine is active.
    pub fn fusion_tick(&mut self, hub: &FeedHub) {
        if let Some(event) = self.feed_event() {
            hub.publish(&SessionEvent::Feed(Arc::new(event)));
        }
        hub.commit(self.snapshot());
    }

    fn feed_event(&mut self) -> Option<FeedEvent> {
        let fusion = self.fusion.tick()?;
        Some(FeedEvent {
            session_id: self.session_id,
            frame: self.physics.frame(),
            ball: self.physics.ball(),
            players: self.physics.players().to_vec(),
            detection: self.detection.latest(),
            fusion,
            score: self.physics.score(),
            match_time: self.match_clock.formatted(),
            timestamp: Utc::now(),
        })
    }

    /// Composite of the latest committed state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            mode: self.mode,
            frame: self.physics.frame(),
            ball: self.physics.ball(),
            players: self.physics.players().to_vec(),
            detection: self.detection.latest(),
            tracked_ball: self.tracked_ball,
            emotion: self.emotion.latest(),
            signal: self.signal,
            fusion: self.fusion.latest(),
            fusion_progress: self.fusion.progress(),
            score: self.physics.score(),
            match_seconds: self.match_clock.elapsed_seconds(),
            match_time: self.match_clock.formatted(),
            timestamp: Utc::now(),
        }
    }

    /// Log the final state.
    pub fn log_summary(&self) {
        let score = self.physics.score();
        info!(
            session_id = %self.session_id,
            frames = self.physics.frame(),
            match_time = %self.match_clock.formatted(),
            team_a = score.team_a,
            team_b = score.team_b,
            last_fusion = ?self.fusion.latest(),
            "Session summary"
        );
    }
}

fn fork(master: &mut StdRng) -> StdRng {
    StdRng::seed_from_u64(master.random())
}
