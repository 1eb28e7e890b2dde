//! Shared type definitions for the Touchline sensor-fusion feed.
//!
//! This crate is the single source of truth for every value that crosses
//! the boundary between the simulation core and its collaborators
//! (rendering, audio, announcements). Types flow downstream to `TypeScript`
//! via `ts-rs` for the presentation layer.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers (session identity)
//! - [`enums`] -- Teams, accessibility modes, arrow directions
//! - [`structs`] -- Geometry, ball/player/emotion/detection state, score
//! - [`fusion`] -- Mode-specific fusion projections
//! - [`feed`] -- Composite feed events and session snapshots

pub mod enums;
pub mod feed;
pub mod fusion;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{Direction, Mode, Team};
pub use feed::{FeedEvent, SessionSnapshot, format_match_time};
pub use fusion::{BlindOutput, DeafOutput, FusionOutput};
pub use ids::SessionId;
pub use structs::{
    BallState, DetectionSnapshot, EmotionFlags, EmotionState, EmotionThresholds, GoalEvent,
    PlayerState, Scoreboard, Vector2,
};
