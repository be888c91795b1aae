//! CSV log sink.
//!
//! One row per successful fetch; failed cycles are skipped and only logged.
//! Each row is flushed immediately so the file can be tailed and survives
//! an abrupt power loss with at most one row missing.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use super::{error::SinkError, traits::Sink};
use crate::core::{
    lifecycle::Release,
    telemetry::{FetchError, FetchOutcome, Fix},
};

pub const CSV_HEADER: &str = "timestamp,latitude,longitude,speed,elevation,course,age";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats one row. Missing fields become empty cells.
pub fn format_row(timestamp: &DateTime<Local>, fix: &Fix<'_>) -> String {
    let cell = |value: Option<&str>| value.unwrap_or("").to_string();
    [
        timestamp.format(TIMESTAMP_FORMAT).to_string(),
        cell(fix.latitude),
        cell(fix.longitude),
        cell(fix.speed),
        cell(fix.elevation),
        cell(fix.course),
        cell(fix.age),
    ]
    .join(",")
}

pub struct CsvSink<W: Write = File> {
    writer: Option<W>,
    target: PathBuf,
    rows: u64,
}

impl CsvSink<File> {
    /// Opens `path` for appending. The header is written when the file did
    /// not exist before.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        let existed = path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| SinkError::Open {
                target: path.display().to_string(),
                source,
            })?;

        let mut sink = Self::from_writer(file, path);
        if !existed {
            sink.write_line(CSV_HEADER)?;
            debug!(path = %path.display(), "Created CSV log with header");
        }
        Ok(sink)
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(writer: W, target: &Path) -> Self {
        Self {
            writer: Some(writer),
            target: target.to_path_buf(),
            rows: 0,
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rows written since opening.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::Released)?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }

    /// Appends a row stamped with `timestamp`.
    pub fn write_fix(&mut self, timestamp: &DateTime<Local>, fix: &Fix<'_>) -> Result<(), SinkError> {
        self.write_line(&format_row(timestamp, fix))?;
        self.rows += 1;
        Ok(())
    }

    /// Hands back the writer, used by tests to inspect output.
    pub fn into_inner(mut self) -> Option<W> {
        self.writer.take()
    }
}

impl<W: Write> Sink for CsvSink<W> {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn present(&mut self, outcome: &FetchOutcome<'_>) -> Result<(), SinkError> {
        match outcome {
            Ok(snapshot) => {
                if let Some(status) = snapshot.warning() {
                    warn!("Service reported {} alongside its data", status);
                }
                self.write_fix(&Local::now(), &snapshot.fix())?;
                debug!(rows = self.rows, "Logged GPS fix");
            }
            Err(FetchError::Timeout(after)) => {
                warn!("No GPS reply within {:?}, skipping this cycle", after)
            }
            Err(e) => info!("Skipping this cycle: {}", e),
        }
        Ok(())
    }
}

impl<W: Write> Release for CsvSink<W> {
    fn label(&self) -> &'static str {
        "csv log"
    }

    fn release(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}
