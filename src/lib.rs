//! gps-monitor: GPS telemetry over OpenWrt ubus.
//!
//! The monitor asks the `gps` ubus service for its latest fix and shows the
//! result on an interactive terminal dashboard, appends it to a CSV log, or
//! draws it on a small framebuffer panel. The bus protocol itself lives in
//! the `gps-monitor-ubus` crate.
//!
//! ## Modules
//!
//! * `config` — TOML configuration with `validator` checks and defaults.
//!
//! * `core` — Runtime components:
//!   - Telemetry acquisition (service resolution, bounded fetch, snapshots)
//!   - Output sinks (CSV, terminal, panel)
//!   - Mode loops and lifecycle with ordered teardown
//!
//! * `logger` — `tracing` subscriber set-up: console output in compact,
//!   pretty or JSON form and optional systemd journald integration.
//!
//! * `cli` and `daemon` — flags of the `gps-monitor` binary and detaching
//!   for background logging.

pub mod cli;
pub mod config;
pub mod core;
pub mod daemon;
pub mod logger;
