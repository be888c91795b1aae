//! Detaching from the controlling terminal.
//!
//! Must run before the async runtime is built: only the calling thread
//! survives `fork`.

use std::{
    fs::{File, OpenOptions},
    io,
};

use daemonize::Daemonize;
use thiserror::Error;

const DEV_NULL: &str = "/dev/null";

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Failed to open /dev/null for stdio: {0}")]
    Stdio(#[source] io::Error),

    #[error("{0}")]
    Start(#[from] daemonize::Error),
}

/// Forks into the background. The parent exits with status 0; the child
/// returns in a new session with `/` as working directory and stdio
/// pointing at `/dev/null`. Open descriptors are inherited.
pub fn daemonize() -> Result<(), DaemonError> {
    detached()?.start()?;
    Ok(())
}

fn detached() -> Result<Daemonize<()>, DaemonError> {
    Ok(Daemonize::new()
        .working_directory("/")
        .stdout(null_device()?)
        .stderr(null_device()?))
}

fn null_device() -> Result<File, DaemonError> {
    OpenOptions::new()
        .write(true)
        .open(DEV_NULL)
        .map_err(DaemonError::Stdio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_builder_opens_null_device() {
        assert!(detached().is_ok());
    }

    #[test]
    fn test_stdio_error_display() {
        let err = DaemonError::Stdio(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(err.to_string().starts_with("Failed to open /dev/null for stdio: "));
    }
}
