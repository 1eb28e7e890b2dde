//! Core value structs: field geometry, tracked entities, emotion vectors,
//! detection aggregates, and the scoreboard.
//!
//! All positions are normalized field coordinates in `[0, 1]`, with the
//! origin at the top-left corner. The presentation layer rescales them to
//! percentages or pixels.

use core::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::Team;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A 2D vector in normalized field coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Vector2 {
    /// Horizontal component (0 = left touchline, 1 = right touchline).
    pub x: f64,
    /// Vertical component (0 = top of the field, 1 = bottom).
    pub y: f64,
}

impl Vector2 {
    /// The zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// The center spot of the field.
    pub const CENTER: Self = Self { x: 0.5, y: 0.5 };

    /// Create a vector from its components.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean length.
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Euclidean distance to another point.
    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    /// Angle of the vector in radians, in `-PI..=PI`.
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Whether both components are finite and inside `[min, max]`.
    pub fn within(self, min: f64, max: f64) -> bool {
        (min..=max).contains(&self.x) && (min..=max).contains(&self.y)
    }
}

impl Add for Vector2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector2 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

// ---------------------------------------------------------------------------
// Tracked entities
// ---------------------------------------------------------------------------

/// Position and per-tick velocity of the ball.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BallState {
    /// Current position, always inside the playable area after a tick.
    pub position: Vector2,
    /// Displacement applied per nominal physics step.
    pub velocity: Vector2,
}

/// One of the 22 simulated players.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PlayerState {
    /// Stable id in `0..22`. Ids below 11 belong to team A.
    pub id: u8,
    /// Side the player belongs to.
    pub team: Team,
    /// Current position.
    pub position: Vector2,
    /// Displacement applied per nominal physics step.
    pub velocity: Vector2,
    /// Whether the tracker picked this player up on the latest frame.
    pub detected: bool,
}

// ---------------------------------------------------------------------------
// Emotion
// ---------------------------------------------------------------------------

/// Three-axis emotion estimate. Every axis is in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EmotionState {
    /// Arousal toward the action on the pitch.
    pub excitement: f64,
    /// Sustained attention.
    pub focus: f64,
    /// Tension or discomfort.
    pub stress: f64,
}

impl EmotionState {
    /// Build a state, clamping every axis into `[0, 1]`.
    ///
    /// Non-finite inputs collapse to 0.
    pub fn clamped(excitement: f64, focus: f64, stress: f64) -> Self {
        Self {
            excitement: clamp_unit(excitement),
            focus: clamp_unit(focus),
            stress: clamp_unit(stress),
        }
    }

    /// Which axes are strictly above their alert thresholds.
    pub fn elevated(&self, thresholds: &EmotionThresholds) -> EmotionFlags {
        EmotionFlags {
            excitement: self.excitement > thresholds.excitement,
            focus: self.focus > thresholds.focus,
            stress: self.stress > thresholds.stress,
        }
    }
}

/// Alert thresholds per emotion axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EmotionThresholds {
    /// Excitement level considered elevated.
    pub excitement: f64,
    /// Focus level considered elevated.
    pub focus: f64,
    /// Stress level considered elevated.
    pub stress: f64,
}

impl Default for EmotionThresholds {
    fn default() -> Self {
        Self {
            excitement: 0.6,
            focus: 0.7,
            stress: 0.4,
        }
    }
}

/// Per-axis result of comparing an [`EmotionState`] to its thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[allow(clippy::struct_excessive_bools)]
pub struct EmotionFlags {
    /// Excitement above threshold.
    pub excitement: bool,
    /// Focus above threshold.
    pub focus: bool,
    /// Stress above threshold.
    pub stress: bool,
}

impl EmotionFlags {
    /// Whether any axis is elevated.
    pub const fn any(&self) -> bool {
        self.excitement || self.focus || self.stress
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Aggregate result of one simulated detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DetectionSnapshot {
    /// Whether the ball was found on this frame.
    pub ball_detected: bool,
    /// Number of players found on this frame (0 to 22).
    pub detected_player_count: u8,
    /// Frames per second measured over the last completed window.
    pub fps: f64,
    /// Whether the field lines were mapped on this frame.
    pub field_mapped: bool,
}

// ---------------------------------------------------------------------------
// Score
// ---------------------------------------------------------------------------

/// Running goal tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Scoreboard {
    /// Goals scored by team A (home).
    pub team_a: u32,
    /// Goals scored by team B (away).
    pub team_b: u32,
}

impl Scoreboard {
    /// Record a goal for `team`, saturating at `u32::MAX`.
    pub const fn record(&mut self, team: Team) {
        match team {
            Team::A => self.team_a = self.team_a.saturating_add(1),
            Team::B => self.team_b = self.team_b.saturating_add(1),
        }
    }

    /// Goals for a given team.
    pub const fn goals(&self, team: Team) -> u32 {
        match team {
            Team::A => self.team_a,
            Team::B => self.team_b,
        }
    }
}

/// Discrete event emitted when the stochastic scoring rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GoalEvent {
    /// Team credited with the goal.
    pub scoring_team: Team,
    /// Score after the goal was recorded.
    pub score: Scoreboard,
    /// Physics frame on which the goal happened.
    pub frame: u64,
}

impl GoalEvent {
    /// Text handed to the voice announcer.
    pub fn announcement(&self) -> String {
        format!("Goal for {} team!", self.scoring_team.side_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn vector_distance_from_center() {
        let p = Vector2::new(0.75, 0.5);
        assert!((p.distance(Vector2::CENTER) - 0.25).abs() < EPS);
        assert!((p - Vector2::CENTER).angle().abs() < EPS);
    }

    #[test]
    fn vector_arithmetic() {
        let v = Vector2::new(0.1, -0.2) * 2.0 + Vector2::new(0.3, 0.4);
        assert!((v.x - 0.5).abs() < EPS);
        assert!(v.y.abs() < EPS);
    }

    #[test]
    fn within_is_inclusive() {
        assert!(Vector2::new(0.05, 0.95).within(0.05, 0.95));
        assert!(!Vector2::new(0.049, 0.5).within(0.05, 0.95));
        assert!(!Vector2::new(f64::NAN, 0.5).within(0.05, 0.95));
    }

    #[test]
    fn emotion_clamps_every_axis() {
        let e = EmotionState::clamped(1.4, -0.3, f64::NAN);
        assert!((e.excitement - 1.0).abs() < EPS);
        assert!(e.focus.abs() < EPS);
        assert!(e.stress.abs() < EPS);
    }

    #[test]
    fn elevated_uses_strict_comparison() {
        let thresholds = EmotionThresholds::default();
        let e = EmotionState::clamped(0.6, 0.71, 0.1);
        let flags = e.elevated(&thresholds);
        assert!(!flags.excitement);
        assert!(flags.focus);
        assert!(!flags.stress);
        assert!(flags.any());
    }

    #[test]
    fn scoreboard_records_goals() {
        let mut score = Scoreboard::default();
        score.record(Team::B);
        score.record(Team::B);
        score.record(Team::A);
        assert_eq!(score.goals(Team::A), 1);
        assert_eq!(score.goals(Team::B), 2);
    }

    #[test]
    fn goal_announcement_names_the_side() {
        let event = GoalEvent {
            scoring_team: Team::B,
            score: Scoreboard { team_a: 0, team_b: 1 },
            frame: 12,
        };
        assert_eq!(event.announcement(), "Goal for away team!");
    }
}
