pub mod dispatcher;
pub mod lifecycle;
pub mod sinks;
pub mod telemetry;
