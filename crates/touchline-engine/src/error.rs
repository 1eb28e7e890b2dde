//! Error types for the engine binary.

/// Top-level error for the engine binary.
///
/// Wraps every failure mode of startup and the session run so `main` can
/// propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: touchline_core::config::ConfigError,
    },

    /// The session rejected a lifecycle call.
    #[error("session error: {source}")]
    Session {
        /// The underlying session error.
        #[from]
        source: touchline_core::session::SessionError,
    },

    /// Waiting for the interrupt signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
