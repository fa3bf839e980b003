//! Engine error taxonomy.
//!
//! Source-level failures (device open/read) are recovered locally by the
//! reconnection loop and never appear here; this enum covers the failures
//! that abort startup or bring the daemon down.

use openhotas_device_types::Role;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid configuration. Fatal at startup; at reload the previous
    /// state is retained instead.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A device marked required could not be opened at startup.
    #[error("required {role} device unavailable: {source}")]
    RequiredSourceUnavailable {
        role: Role,
        #[source]
        source: std::io::Error,
    },

    /// The synthetic uinput device could not be created.
    #[error("failed to create virtual device: {0}")]
    OutputCreate(#[source] std::io::Error),

    /// Writes to the virtual device kept failing; the contract cannot be
    /// upheld any longer.
    #[error("virtual device broken after {failures} consecutive write failures: {source}")]
    OutputBroken {
        failures: u32,
        #[source]
        source: std::io::Error,
    },

    /// The readiness wait itself failed (not EINTR, which is absorbed).
    #[error("event wait failed: {0}")]
    Poll(#[source] std::io::Error),

    /// Signal handler installation failed.
    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
