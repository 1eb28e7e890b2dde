//! The clock set: three independently paced tick streams on one task.
//!
//! A session is driven by three periodic streams:
//!
//! - **Frame** -- render-synchronized physics and detection cadence
//!   (16 ms by default, roughly one display frame).
//! - **Emotion** -- the 1 Hz emotion estimate.
//! - **Fusion** -- the 50 ms fusion publish.
//!
//! [`ClockSet`] holds the periods and is cheap to copy. [`ClockSet::start`]
//! arms a fresh set of [`Tickers`]; dropping them stops all three streams at
//! once. [`Tickers::next`] is a cooperative scheduler: it waits for whichever
//! stream is due and reports it, so handlers for different streams never
//! overlap. When several streams are due together the frame stream wins,
//! then emotion, then fusion.
//!
//! [`MatchClock`] converts frame counts into the match time shown to users.

use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};
use touchline_types::format_match_time;

use crate::config::SessionConfig;

/// Errors that can occur when building a clock set.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// One of the periods is zero.
    #[error("clock `{name}` has a zero period")]
    ZeroPeriod {
        /// Name of the offending stream.
        name: &'static str,
    },
}

/// Which stream fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockTick {
    /// Physics + detection frame.
    Frame,
    /// Emotion estimate.
    Emotion,
    /// Fusion publish.
    Fusion,
}

/// Periods of the three tick streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSet {
    frame: Duration,
    emotion: Duration,
    fusion: Duration,
}

impl ClockSet {
    /// Build a clock set from explicit periods.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::ZeroPeriod`] if any period is zero.
    pub fn new(frame: Duration, emotion: Duration, fusion: Duration) -> Result<Self, ClockError> {
        for (name, period) in [("frame", frame), ("emotion", emotion), ("fusion", fusion)] {
            if period.is_zero() {
                return Err(ClockError::ZeroPeriod { name });
            }
        }
        Ok(Self {
            frame,
            emotion,
            fusion,
        })
    }

    /// Build a clock set from the session section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::ZeroPeriod`] if any configured interval is zero.
    pub fn from_config(config: &SessionConfig) -> Result<Self, ClockError> {
        Self::new(
            Duration::from_millis(config.frame_interval_ms),
            Duration::from_millis(config.emotion_interval_ms),
            Duration::from_millis(config.fusion_interval_ms),
        )
    }

    /// Period of the frame stream.
    pub const fn frame_period(&self) -> Duration {
        self.frame
    }

    /// Period of the emotion stream.
    pub const fn emotion_period(&self) -> Duration {
        self.emotion
    }

    /// Period of the fusion stream.
    pub const fn fusion_period(&self) -> Duration {
        self.fusion
    }

    /// Arm all three streams. Each fires immediately once, then on its period.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Tickers {
        Tickers {
            frame: arm(self.frame),
            emotion: arm(self.emotion),
            fusion: arm(self.fusion),
        }
    }
}

/// A late tick is dropped rather than replayed in a burst.
fn arm(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Armed tick streams. Dropping this value stops every stream.
#[derive(Debug)]
pub struct Tickers {
    frame: Interval,
    emotion: Interval,
    fusion: Interval,
}

impl Tickers {
    /// Wait for the next due stream.
    ///
    /// Cancel safe: if the returned future is dropped before completing,
    /// no tick is lost.
    pub async fn next(&mut self) -> ClockTick {
        tokio::select! {
            biased;
            _ = self.frame.tick() => ClockTick::Frame,
            _ = self.emotion.tick() => ClockTick::Emotion,
            _ = self.fusion.tick() => ClockTick::Fusion,
        }
    }
}

/// Match time derived from the number of frames played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchClock {
    frame_period: Duration,
    frames: u64,
}

impl MatchClock {
    /// Create a match clock at kick-off.
    pub const fn new(frame_period: Duration) -> Self {
        Self {
            frame_period,
            frames: 0,
        }
    }

    /// Count one played frame.
    pub const fn advance(&mut self) {
        self.frames = self.frames.saturating_add(1);
    }

    /// Elapsed match time in whole seconds.
    pub fn elapsed_seconds(&self) -> u64 {
        let period_ms = u64::try_from(self.frame_period.as_millis()).unwrap_or(u64::MAX);
        self.frames
            .saturating_mul(period_ms)
            .checked_div(1000)
            .unwrap_or(0)
    }

    /// Elapsed match time as `m:ss`.
    pub fn formatted(&self) -> String {
        format_match_time(self.elapsed_seconds())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn default_clocks() -> ClockSet {
        ClockSet::from_config(&SessionConfig::default()).unwrap()
    }

    #[test]
    fn clock_set_reads_config() {
        let clocks = default_clocks();
        assert_eq!(clocks.frame_period(), Duration::from_millis(16));
        assert_eq!(clocks.emotion_period(), Duration::from_millis(1000));
        assert_eq!(clocks.fusion_period(), Duration::from_millis(50));
    }

    #[test]
    fn zero_period_is_rejected() {
        let result = ClockSet::new(
            Duration::from_millis(16),
            Duration::ZERO,
            Duration::from_millis(50),
        );
        assert!(matches!(result, Err(ClockError::ZeroPeriod { name: "emotion" })));
    }

    #[tokio::test(start_paused = true)]
    async fn first_ticks_fire_in_priority_order() {
        let mut tickers = default_clocks().start();
        assert_eq!(tickers.next().await, ClockTick::Frame);
        assert_eq!(tickers.next().await, ClockTick::Emotion);
        assert_eq!(tickers.next().await, ClockTick::Fusion);
    }

    #[tokio::test(start_paused = true)]
    async fn streams_fire_at_their_own_rates() {
        let mut tickers = default_clocks().start();
        let start = tokio::time::Instant::now();
        let mut frames = 0_u32;
        let mut emotions = 0_u32;
        let mut fusions = 0_u32;

        while start.elapsed() < Duration::from_millis(1000) {
            match tickers.next().await {
                ClockTick::Frame => frames = frames.saturating_add(1),
                ClockTick::Emotion => emotions = emotions.saturating_add(1),
                ClockTick::Fusion => fusions = fusions.saturating_add(1),
            }
        }

        // Frame every 16 ms, fusion every 50 ms. Emotion fires at t = 0 and
        // may fire once more at t = 1000 as the event that ends the loop.
        assert!((62..=64).contains(&frames), "frames = {frames}");
        assert!((20..=21).contains(&fusions), "fusions = {fusions}");
        assert!((1..=2).contains(&emotions), "emotions = {emotions}");
    }

    #[test]
    fn match_clock_counts_frame_time() {
        let mut clock = MatchClock::new(Duration::from_millis(16));
        for _ in 0..(60 * 125) {
            clock.advance();
        }
        // 7500 frames * 16 ms = 120 s
        assert_eq!(clock.elapsed_seconds(), 120);
        assert_eq!(clock.formatted(), "2:00");
    }
}
