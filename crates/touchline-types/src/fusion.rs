//! Mode-specific fusion projections.
//!
//! A [`FusionOutput`] is replaced wholesale on every fusion tick; consumers
//! only ever care about the latest one.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Direction, Mode};
use crate::structs::Vector2;

/// Directional projection for the visual (deaf) presentation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DeafOutput {
    /// Ball position.
    pub position: Vector2,
    /// Ball velocity scaled by the emotional speed factor.
    pub velocity: Vector2,
    /// Weighted excitement plus weighted focus.
    pub emotional_intensity: f64,
}

impl DeafOutput {
    /// Four-way arrow direction for the scaled velocity.
    pub fn direction(&self) -> Direction {
        Direction::from_degrees(self.velocity.angle().to_degrees())
    }
}

/// Spatial-audio projection for the blind presentation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BlindOutput {
    /// Ball position.
    pub position: Vector2,
    /// Ball velocity, unmodified.
    pub velocity: Vector2,
    /// Distance from the center spot.
    pub distance: f64,
    /// Bearing from the center spot in radians, `-PI..=PI`.
    pub angle: f64,
    /// Playback volume, louder near the center.
    pub volume: f64,
    /// Playback pitch multiplier, rising with excitement.
    pub pitch: f64,
    /// Weighted excitement plus weighted focus.
    pub emotional_intensity: f64,
}

/// Output of one fusion tick, tagged by the mode that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "mode", rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum FusionOutput {
    /// Produced while running in [`Mode::Deaf`].
    Deaf(DeafOutput),
    /// Produced while running in [`Mode::Blind`].
    Blind(BlindOutput),
}

impl FusionOutput {
    /// Mode this output was projected for.
    pub const fn mode(&self) -> Mode {
        match self {
            Self::Deaf(_) => Mode::Deaf,
            Self::Blind(_) => Mode::Blind,
        }
    }

    /// Ball position carried by either projection.
    pub const fn position(&self) -> Vector2 {
        match self {
            Self::Deaf(out) => out.position,
            Self::Blind(out) => out.position,
        }
    }

    /// Emotional intensity carried by either projection.
    pub const fn emotional_intensity(&self) -> f64 {
        match self {
            Self::Deaf(out) => out.emotional_intensity,
            Self::Blind(out) => out.emotional_intensity,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn output_is_tagged_by_mode() {
        let out = FusionOutput::Blind(BlindOutput {
            position: Vector2::new(0.75, 0.5),
            velocity: Vector2::ZERO,
            distance: 0.25,
            angle: 0.0,
            volume: 0.875,
            pitch: 1.0,
            emotional_intensity: 0.5,
        });
        let json: serde_json::Value = serde_json::to_value(out).unwrap();
        assert_eq!(json["mode"], "blind");
        assert_eq!(json["volume"], 0.875);
        assert_eq!(out.mode(), Mode::Blind);
    }

    #[test]
    fn deaf_direction_follows_velocity() {
        let out = DeafOutput {
            position: Vector2::CENTER,
            velocity: Vector2::new(-0.004, 0.001),
            emotional_intensity: 0.0,
        };
        assert_eq!(out.direction(), Direction::Left);

        let down = DeafOutput {
            velocity: Vector2::new(0.0, 0.003),
            ..out
        };
        assert_eq!(down.direction(), Direction::Down);
    }
}
