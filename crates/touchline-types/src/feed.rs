//! Composite snapshots handed to rendering and announcement collaborators.
//!
//! Both types are immutable once built: the session constructs a fresh value
//! for every publish and consumers receive shared references to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::Mode;
use crate::fusion::FusionOutput;
use crate::ids::SessionId;
use crate::structs::{
    BallState, DetectionSnapshot, EmotionState, PlayerState, Scoreboard, Vector2,
};

/// One publish on the subscription feed, emitted on every fusion tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FeedEvent {
    /// Session that produced the event.
    pub session_id: SessionId,
    /// Physics frame the ball and player state belong to.
    pub frame: u64,
    /// Last committed ball state.
    pub ball: BallState,
    /// Last committed player states, ordered by id.
    pub players: Vec<PlayerState>,
    /// Last detection pass.
    pub detection: DetectionSnapshot,
    /// Fusion projection computed on this tick.
    pub fusion: FusionOutput,
    /// Current score.
    pub score: Scoreboard,
    /// Match clock formatted as `m:ss`.
    pub match_time: String,
    /// Wall-clock publish time.
    pub timestamp: DateTime<Utc>,
}

/// Latest composite state of a session, readable at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SessionSnapshot {
    /// Session that owns this state.
    pub session_id: SessionId,
    /// Configured accessibility mode, if the session was initialized.
    pub mode: Option<Mode>,
    /// Number of physics frames run so far.
    pub frame: u64,
    /// Ball state after the latest frame.
    pub ball: BallState,
    /// Player states after the latest frame, ordered by id.
    pub players: Vec<PlayerState>,
    /// Latest detection pass.
    pub detection: DetectionSnapshot,
    /// Where the tracker last saw the ball; `None` until the first sighting.
    pub tracked_ball: Option<Vector2>,
    /// Latest emotion estimate.
    pub emotion: EmotionState,
    /// Latest raw brain-signal sample (microvolt-like units).
    pub signal: f64,
    /// Latest fusion output; `None` until the first fusion tick publishes.
    pub fusion: Option<FusionOutput>,
    /// Fusion warm-up progress in percent.
    pub fusion_progress: f64,
    /// Current score.
    pub score: Scoreboard,
    /// Elapsed match time in whole seconds.
    pub match_seconds: u64,
    /// Match clock formatted as `m:ss`.
    pub match_time: String,
    /// When this snapshot was committed.
    pub timestamp: DateTime<Utc>,
}

/// Format whole seconds as a match clock (`m:ss`).
pub fn format_match_time(seconds: u64) -> String {
    let minutes = seconds.checked_div(60).unwrap_or(0);
    let secs = seconds.checked_rem(60).unwrap_or(0);
    format!("{minutes}:{secs:02}")
}
