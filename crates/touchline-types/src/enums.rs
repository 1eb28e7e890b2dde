//! Enumeration types for the Touchline feed.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

/// One of the two sides on the pitch.
///
/// Team A is the home side and starts in the left half of the field; team B
/// is the away side and starts in the right half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Team {
    /// Home side (player ids 0 through 10).
    A,
    /// Away side (player ids 11 through 21).
    B,
}

impl Team {
    /// Number of players fielded by each team.
    pub const SQUAD_SIZE: u8 = 11;

    /// Team a player belongs to, derived from its id.
    pub const fn for_player(id: u8) -> Self {
        if id < Self::SQUAD_SIZE { Self::A } else { Self::B }
    }

    /// Spoken name used in announcements.
    pub const fn side_name(self) -> &'static str {
        match self {
            Self::A => "home",
            Self::B => "away",
        }
    }
}

// ---------------------------------------------------------------------------
// Accessibility mode
// ---------------------------------------------------------------------------

/// Accessibility presentation variant selecting which fusion projection is
/// computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Mode {
    /// Visual/directional feed for deaf and hard-of-hearing users.
    Deaf,
    /// Spatial-audio feed for blind and low-vision users.
    Blind,
}

impl Mode {
    /// Wire name of the mode (`"deaf"` or `"blind"`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deaf => "deaf",
            Self::Blind => "blind",
        }
    }
}

impl core::fmt::Display for Mode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Direction indicator
// ---------------------------------------------------------------------------

/// Coarse four-way direction shown by the deaf-mode arrow.
///
/// Field coordinates grow downward on the y axis, so a positive y velocity
/// points [`Direction::Down`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Direction {
    /// Toward the right touchline (away goal).
    Right,
    /// Toward the left touchline (home goal).
    Left,
    /// Toward the top of the field.
    Up,
    /// Toward the bottom of the field.
    Down,
}

impl Direction {
    /// Quantize a velocity angle in degrees (as returned by `atan2`).
    pub fn from_degrees(degrees: f64) -> Self {
        if degrees.abs() <= 45.0 {
            Self::Right
        } else if degrees.abs() >= 135.0 {
            Self::Left
        } else if degrees > 45.0 && degrees < 135.0 {
            Self::Down
        } else {
            Self::Up
        }
    }
}
