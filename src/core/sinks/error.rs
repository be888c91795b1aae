use std::io;

use thiserror::Error;

/// Failures of an output sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The output could not be opened at start-up.
    #[error("Failed to open {target}: {source}")]
    Open {
        target: String,
        #[source]
        source: io::Error,
    },

    /// Writing a frame or row failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The device does not match what the panel needs.
    #[error("Unsupported panel device: {0}")]
    Unsupported(String),

    /// `present` was called after teardown.
    #[error("Sink was already released")]
    Released,
}
