use super::error::SinkError;
use crate::core::telemetry::FetchOutcome;

/// Consumer of fetch outcomes.
///
/// A sink gets every outcome, successful or not, and decides how to show
/// it: a row, a skipped row, a message on screen or a fallback frame.
pub trait Sink {
    fn name(&self) -> &'static str;

    fn present(&mut self, outcome: &FetchOutcome<'_>) -> Result<(), SinkError>;
}
