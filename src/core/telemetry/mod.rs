//! Telemetry acquisition: resolve the service, fetch one reply within a
//! bound and expose it as a typed snapshot.

pub mod attributes;
pub mod bus;
pub mod error;
pub mod fetch;
pub mod resolver;
pub mod snapshot;

pub use attributes::{AttrValue, AttributeBuffer};
pub use bus::{Bus, BusEvent};
pub use error::FetchError;
pub use fetch::{FetchPolicy, TelemetryClient};
pub use resolver::{resolve, ServiceHandle};
pub use snapshot::{compass_point, knots, parse_number, Fix, Hemisphere, Snapshot};

/// Result of one fetch: the fresh snapshot or the reason there is none.
pub type FetchOutcome<'a> = Result<Snapshot<'a>, FetchError>;
