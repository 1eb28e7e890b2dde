//! Clocks, producers, and fusion for the Touchline simulation.
//!
//! A session runs three independently paced tick streams on one task: a
//! per-frame physics and detection stream, a 1 Hz emotion stream, and a
//! 50 ms fusion stream that combines the latest values of the other two
//! into a mode-specific feed.
//!
//! # Modules
//!
//! - [`clock`] -- The three tick streams and the match clock.
//! - [`config`] -- Configuration loading from `touchline-config.yaml` into
//!   strongly-typed structs.
//! - [`physics`] -- Ball and player motion, reflection, attraction, and the
//!   goal rule.
//! - [`emotion`] -- Synthetic three-axis emotion estimate and raw signal.
//! - [`detection`] -- Stochastic detection and fps measurement.
//! - [`fusion`] -- [`FusionEngine`] and the deaf/blind projections.
//! - [`hub`] -- Callback, broadcast, and snapshot surfaces.
//! - [`pipeline`] -- Per-session stage graph and tick handlers.
//! - [`runner`] -- The driver task.
//! - [`session`] -- [`SimulationSession`], the composition root.
//!
//! [`FusionEngine`]: fusion::FusionEngine
//! [`SimulationSession`]: session::SimulationSession

pub mod clock;
pub mod config;
pub mod detection;
pub mod emotion;
pub mod fusion;
pub mod hub;
pub mod physics;
pub mod pipeline;
pub mod runner;
pub mod session;
