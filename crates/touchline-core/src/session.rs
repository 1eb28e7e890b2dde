//! The composition root for one simulated match.
//!
//! [`SimulationSession`] owns a [`Pipeline`] and a [`FeedHub`] and moves the
//! pipeline onto a driver task while running:
//!
//! ```text
//! new --initialize(mode)--> Ready --start()--> Running --stop()--> Ready
//! ```
//!
//! Sessions share nothing, so any number of them can run side by side.
//! `start` and `stop` are idempotent. After `stop` returns no further event
//! is delivered and the last snapshot stays readable. A `stop` future that
//! is dropped before completing leaves the session stopping; the next
//! `stop` finishes the job.

use std::sync::Arc;

use rand::Rng;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use touchline_types::{Mode, SessionId, SessionSnapshot};
use tracing::{debug, info, warn};

use crate::clock::{ClockError, ClockSet};
use crate::config::{ConfigError, TouchlineConfig};
use crate::fusion::{FusionError, parse_mode};
use crate::hub::{FeedHub, SessionEvent, Subscription};
use crate::pipeline::Pipeline;
use crate::runner::{DriveResult, drive};

/// Errors raised by [`SimulationSession`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The configuration failed validation.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },

    /// The fusion stage rejected the request.
    #[error("fusion error: {source}")]
    Fusion {
        /// The underlying fusion error.
        #[from]
        source: FusionError,
    },

    /// The clock periods are unusable.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// The mode cannot change while the session is running.
    #[error("session is running; stop it before re-initializing")]
    AlreadyRunning,

    /// An earlier `stop` was cancelled before the driver was joined.
    #[error("session is still stopping; call stop again to finish")]
    StopPending,

    /// `start` was called outside a Tokio runtime.
    #[error("no Tokio runtime available to drive the session")]
    NoRuntime,

    /// The driver task panicked or was cancelled.
    #[error("session driver failed: {message}")]
    DriverFailed {
        /// Description of the failure.
        message: String,
    },
}

struct Running {
    handle: JoinHandle<DriveResult>,
    shutdown: Arc<Notify>,
    /// Set once shutdown was requested.
    stopping: bool,
}

/// One independently clocked simulation with its subscribers.
pub struct SimulationSession {
    id: SessionId,
    seed: u64,
    clocks: ClockSet,
    hub: FeedHub,
    /// `None` while the driver task owns it, or after the driver failed.
    pipeline: Option<Pipeline>,
    running: Option<Running>,
}

impl core::fmt::Debug for SimulationSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulationSession")
            .field("id", &self.id)
            .field("seed", &self.seed)
            .field("running", &self.is_running())
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}

impl SimulationSession {
    /// Validate `config` and build an idle session.
    ///
    /// When the configuration carries no seed one is drawn and logged so the
    /// run can be reproduced.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if validation fails or
    /// [`SessionError::Clock`] if a period is zero.
    pub fn new(config: &TouchlineConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let clocks = ClockSet::from_config(&config.session)?;
        let seed = config.session.seed.unwrap_or_else(|| rand::rng().random());
        let id = SessionId::new();
        let pipeline = Pipeline::new(id, config, &clocks, seed);
        let hub = FeedHub::new(pipeline.snapshot());
        info!(session_id = %id, seed, "Session created");
        Ok(Self {
            id,
            seed,
            clocks,
            hub,
            pipeline: Some(pipeline),
            running: None,
        })
    }

    /// Session identity.
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Seed the session's generators were derived from.
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Mode selected by [`initialize`](Self::initialize), if any.
    pub fn mode(&self) -> Option<Mode> {
        self.hub.snapshot().mode
    }

    /// Whether the driver task is running.
    pub const fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Select the accessibility mode and wire the fusion inputs.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Fusion`] with [`FusionError::InvalidMode`] for
    /// an unknown mode, [`SessionError::AlreadyRunning`] while running, or
    /// [`SessionError::DriverFailed`] if an earlier run lost the pipeline.
    pub fn initialize(&mut self, mode: &str) -> Result<Mode, SessionError> {
        let mode = parse_mode(mode)?;
        if self.running.is_some() {
            return Err(SessionError::AlreadyRunning);
        }
        let pipeline = self.pipeline_mut()?;
        pipeline.initialize(mode);
        let snapshot = pipeline.snapshot();
        self.hub.reset(snapshot);
        info!(session_id = %self.id, mode = %mode, "Session initialized");
        Ok(mode)
    }

    /// Start all three clocks. A no-op while already running.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Fusion`] with [`FusionError::NotReady`] before
    /// [`initialize`](Self::initialize), [`SessionError::NoRuntime`] outside
    /// a Tokio runtime, or [`SessionError::StopPending`] if a cancelled
    /// [`stop`](Self::stop) has not been completed.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if let Some(running) = &self.running {
            if running.stopping {
                return Err(SessionError::StopPending);
            }
            debug!(session_id = %self.id, "Session already running");
            return Ok(());
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        let mode = self.pipeline_mut()?.start_fusion()?;
        let Some(pipeline) = self.pipeline.take() else {
            return Err(lost_pipeline());
        };

        let shutdown = Arc::new(Notify::new());
        self.hub.open();
        let handle = runtime.spawn(drive(
            pipeline,
            self.clocks,
            self.hub.clone(),
            Arc::clone(&shutdown),
        ));
        self.running = Some(Running {
            handle,
            shutdown,
            stopping: false,
        });
        info!(session_id = %self.id, mode = %mode, "Session started");
        Ok(())
    }

    /// Halt all three clocks and wait for the driver to hand back the
    /// pipeline. A no-op when not running.
    ///
    /// Nothing is published once this is called, even before it returns.
    /// Cancel-safe: the driver handle stays with the session until it has
    /// been joined.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DriverFailed`] if the driver task panicked.
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        let Some(running) = self.running.as_mut() else {
            debug!(session_id = %self.id, "Session already stopped");
            return Ok(());
        };
        if !running.stopping {
            self.hub.close();
            running.shutdown.notify_one();
            running.stopping = true;
        }

        let joined = (&mut running.handle).await;
        self.running = None;
        let DriveResult {
            mut pipeline,
            ticks,
        } = joined.map_err(|err| SessionError::DriverFailed {
            message: err.to_string(),
        })?;
        pipeline.stop_fusion();
        self.hub.reset(pipeline.snapshot());
        pipeline.log_summary();
        self.pipeline = Some(pipeline);
        info!(
            session_id = %self.id,
            frames = ticks.frames,
            fusions = ticks.fusions,
            "Session stopped"
        );
        Ok(())
    }

    /// Register a callback for feed and goal events.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.hub.subscribe(callback)
    }

    /// A broadcast receiver for feed and goal events.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.hub.events()
    }

    /// The latest composite state.
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.hub.snapshot()
    }

    fn pipeline_mut(&mut self) -> Result<&mut Pipeline, SessionError> {
        self.pipeline.as_mut().ok_or_else(lost_pipeline)
    }
}

fn lost_pipeline() -> SessionError {
    SessionError::DriverFailed {
        message: "pipeline was lost by an earlier run".to_owned(),
    }
}

impl Drop for SimulationSession {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            warn!(session_id = %self.id, "Session dropped while running; stopping driver");
            self.hub.close();
            running.shutdown.notify_one();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config() -> TouchlineConfig {
        let mut config = TouchlineConfig::default();
        config.session.seed = Some(21);
        config
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = config();
        config.fusion.emotion_weights.stress = 0.9;
        assert!(matches!(
            SimulationSession::new(&config),
            Err(SessionError::Config { .. })
        ));
    }

    #[test]
    fn initialize_rejects_unknown_mode() {
        let mut session = SimulationSession::new(&config()).unwrap();
        let err = session.initialize("x").unwrap_err();
        assert!(matches!(
            err,
            SessionError::Fusion {
                source: FusionError::InvalidMode { .. }
            }
        ));
        assert_eq!(session.mode(), None);
    }

    #[tokio::test]
    async fn start_before_initialize_is_not_ready() {
        let mut session = SimulationSession::new(&config()).unwrap();
        assert!(matches!(
            session.start(),
            Err(SessionError::Fusion {
                source: FusionError::NotReady
            })
        ));
        assert!(!session.is_running());
    }

    #[test]
    fn start_outside_runtime_fails() {
        let mut session = SimulationSession::new(&config()).unwrap();
        session.initialize("deaf").unwrap();
        assert!(matches!(session.start(), Err(SessionError::NoRuntime)));
    }

    #[tokio::test(start_paused = true)]
    async fn cannot_reinitialize_while_running() {
        let mut session = SimulationSession::new(&config()).unwrap();
        session.initialize("deaf").unwrap();
        session.start().unwrap();
        assert!(matches!(
            session.initialize("blind"),
            Err(SessionError::AlreadyRunning)
        ));
        session.stop().await.unwrap();
        assert_eq!(session.initialize("blind").unwrap(), Mode::Blind);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_stop_can_be_finished_and_restarted() {
        let mut session = SimulationSession::new(&config()).unwrap();
        session.initialize("deaf").unwrap();
        session.start().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let cut_short = tokio::time::timeout(Duration::ZERO, session.stop()).await;
        assert!(cut_short.is_err());
        assert!(matches!(session.start(), Err(SessionError::StopPending)));

        session.stop().await.unwrap();
        assert!(!session.is_running());
        assert!(session.snapshot().fusion_progress.abs() < f64::EPSILON);

        let frame = session.snapshot().frame;
        assert_eq!(session.initialize("blind").unwrap(), Mode::Blind);
        session.start().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        session.stop().await.unwrap();
        assert!(session.snapshot().frame > frame);
    }

    #[test]
    fn seed_is_taken_from_config() {
        let session = SimulationSession::new(&config()).unwrap();
        assert_eq!(session.seed(), 21);
        assert_eq!(session.snapshot().session_id, session.id());
    }
}
