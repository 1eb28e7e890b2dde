//! Simulated object detection over the current physics state.
//!
//! Every frame the detector flips one biased coin for the ball and one per
//! player. The bias drifts slowly with the frame count so detection quality
//! visibly rises and falls over a match:
//!
//! ```text
//! p(frame) = 0.8 + 0.1 * sin(0.01 * frame)
//! ```
//!
//! Throughput is reported as frames per second, measured over windows of at
//! least one second.

use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;
use tokio::time::Instant;
use touchline_types::{BallState, DetectionSnapshot, PlayerState, Vector2};

/// Chance that the field lines are mapped on a given frame.
pub const FIELD_MAPPED_CHANCE: f64 = 0.9;

/// Minimum length of an fps measurement window.
pub const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Detection probability for a frame. Always within `[0.7, 0.9]`.
#[allow(clippy::cast_precision_loss)]
pub fn detection_probability(frame: u64) -> f64 {
    (0.01 * frame as f64).sin().mul_add(0.1, 0.8)
}

/// Frames-per-second meter with windowed resets.
#[derive(Debug, Clone)]
pub struct FpsMeter {
    window_start: Instant,
    frames: u32,
    fps: f64,
}

impl FpsMeter {
    /// Start a meter whose first window opens at `now`.
    pub const fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Count a frame at `now`. Returns the rate of the last closed window
    /// (0 until the first window closes).
    pub fn record(&mut self, now: Instant) -> f64 {
        self.frames = self.frames.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= FPS_WINDOW {
            self.fps = (f64::from(self.frames) / elapsed.as_secs_f64()).round();
            self.frames = 0;
            self.window_start = now;
        }
        self.fps
    }

    /// Rate of the last closed window.
    pub const fn fps(&self) -> f64 {
        self.fps
    }
}

/// Outcome of one detection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// Aggregate counts handed to subscribers.
    pub snapshot: DetectionSnapshot,
    /// Where the ball was seen, if it was.
    pub ball: Option<Vector2>,
    /// Per-player detection flags, in the order the players were given.
    pub players: Vec<bool>,
}

/// Stochastic stand-in for a video tracker.
#[derive(Debug, Clone)]
pub struct DetectionSimulator {
    rng: StdRng,
    meter: FpsMeter,
    latest: DetectionSnapshot,
}

impl DetectionSimulator {
    /// Create a detector whose fps window opens at `now`.
    pub fn new(rng: StdRng, now: Instant) -> Self {
        Self {
            rng,
            meter: FpsMeter::new(now),
            latest: DetectionSnapshot::default(),
        }
    }

    /// Run one pass over the post-physics state of frame `frame_count`.
    pub fn detect(
        &mut self,
        ball: &BallState,
        players: &[PlayerState],
        frame_count: u64,
        now: Instant,
    ) -> DetectionResult {
        let p = detection_probability(frame_count);
        let flags: Vec<bool> = players
            .iter()
            .map(|_| self.rng.random::<f64>() < p)
            .collect();
        let ball_seen = self.rng.random::<f64>() < p;
        let field_mapped = self.rng.random::<f64>() < FIELD_MAPPED_CHANCE;
        let detected = flags.iter().filter(|&&seen| seen).count();

        self.latest = DetectionSnapshot {
            ball_detected: ball_seen,
            detected_player_count: u8::try_from(detected).unwrap_or(u8::MAX),
            fps: self.meter.record(now),
            field_mapped,
        };
        DetectionResult {
            snapshot: self.latest,
            ball: ball_seen.then_some(ball.position),
            players: flags,
        }
    }

    /// Open a fresh fps window at `now`.
    pub const fn restart_window(&mut self, now: Instant) {
        self.meter = FpsMeter::new(now);
    }

    /// Aggregates of the most recent pass.
    pub const fn latest(&self) -> DetectionSnapshot {
        self.latest
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::physics::spawn_players;

    #[test]
    fn probability_curve_stays_in_band() {
        assert!((detection_probability(0) - 0.8).abs() < 1e-12);
        for frame in (0..100_000).step_by(7) {
            let p = detection_probability(frame);
            assert!((0.7 - 1e-12..=0.9 + 1e-12).contains(&p));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fps_is_measured_per_window() {
        let mut meter = FpsMeter::new(Instant::now());
        for _ in 0..49 {
            tokio::time::advance(Duration::from_millis(20)).await;
            assert!(meter.record(Instant::now()).abs() < 1e-12);
        }
        // The 50th frame lands at exactly 1000 ms and closes the window.
        tokio::time::advance(Duration::from_millis(20)).await;
        assert!((meter.record(Instant::now()) - 50.0).abs() < 1e-12);
        assert!((meter.fps() - 50.0).abs() < 1e-12);
    }

    #[tokio::test(start_paused = true)]
    async fn detect_counts_flagged_players() {
        let mut rng = StdRng::seed_from_u64(4);
        let players = spawn_players(&mut rng);
        let ball = BallState::default();
        let mut detector = DetectionSimulator::new(StdRng::seed_from_u64(5), Instant::now());

        let mut total = 0_usize;
        for frame in 0..200 {
            let result = detector.detect(&ball, &players, frame, Instant::now());
            assert_eq!(result.players.len(), players.len());
            let flagged = result.players.iter().filter(|&&d| d).count();
            assert_eq!(usize::from(result.snapshot.detected_player_count), flagged);
            assert_eq!(result.ball.is_some(), result.snapshot.ball_detected);
            assert_eq!(detector.latest(), result.snapshot);
            total = total.saturating_add(flagged);
        }
        // Around 80% of 22 * 200.
        assert!((3000..=4000).contains(&total), "total = {total}");
    }
}
