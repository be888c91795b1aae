//! Mode loops.
//!
//! Every mode runs the same cycle: fetch one snapshot, hand the outcome to
//! the mode's sink, then wait for the next tick. Waiting happens in short
//! granules so a cleared running flag is noticed quickly; teardown then
//! releases the sink before the bus connection.

use std::{fmt, io::Write, time::Duration};

use ratatui::backend::Backend;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use super::{
    lifecycle::{Lifecycle, Release, RunningFlag},
    sinks::{
        panel::{PanelDevice, PanelSink},
        CsvSink, Sink, TerminalSink,
    },
    telemetry::{Bus, TelemetryClient},
};

/// Granule of the logging pause.
pub const LOGGING_GRANULE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    Interactive,
    Logging,
    PanelDisplay,
}

impl RuntimeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeMode::Interactive => "interactive",
            RuntimeMode::Logging => "logging",
            RuntimeMode::PanelDisplay => "panel",
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sleeps `period` in `granule` steps, returning early once `flag` is cleared.
pub async fn pace(flag: &RunningFlag, period: Duration, granule: Duration) {
    let deadline = Instant::now() + period;
    while flag.is_running() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        sleep(granule.min(deadline - now)).await;
    }
}

/// Everything a mode loop owns besides its sink.
pub struct RuntimeContext<B: Bus> {
    mode: RuntimeMode,
    client: TelemetryClient<B>,
    lifecycle: Lifecycle,
}

impl<B: Bus> RuntimeContext<B> {
    pub fn new(mode: RuntimeMode, client: TelemetryClient<B>, lifecycle: Lifecycle) -> Self {
        Self {
            mode,
            client,
            lifecycle,
        }
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn client(&self) -> &TelemetryClient<B> {
        &self.client
    }

    /// Fetches and presents until a stop is requested or `quit` returns
    /// true, pausing `period` between cycles. Releases `sink`, then the bus.
    async fn drive<S, Q>(&mut self, sink: &mut S, period: Duration, granule: Duration, mut quit: Q)
    where
        S: Sink + Release,
        Q: FnMut() -> bool,
    {
        self.lifecycle.start();
        let flag = self.lifecycle.running_flag();
        info!(mode = %self.mode, sink = sink.name(), "Mode loop started");

        let mut cycles: u64 = 0;
        while self.lifecycle.is_running() {
            {
                let outcome = self.client.fetch().await;
                if let Err(e) = sink.present(&outcome) {
                    error!("Failed to present on {}: {}", sink.name(), e);
                }
            }
            cycles += 1;

            if quit() {
                info!("Quit requested from the terminal");
                self.lifecycle.request_stop();
                break;
            }
            pace(&flag, period, granule).await;
        }

        debug!(cycles, "Mode loop finished, tearing down");
        let mut resources: [&mut dyn Release; 2] = [sink, &mut self.client];
        self.lifecycle.stop(&mut resources);
        info!(mode = %self.mode, "Stopped");
    }

    /// Logging mode: one CSV row per successful fetch every `interval`.
    pub async fn run_logging<W: Write>(&mut self, mut sink: CsvSink<W>, interval: Duration) {
        info!(
            "Logging GPS data to {} every {}s",
            sink.target().display(),
            interval.as_secs()
        );
        self.drive(&mut sink, interval, LOGGING_GRANULE, || false)
            .await;
    }

    /// Panel mode: one frame every `refresh`.
    pub async fn run_panel<D: PanelDevice>(&mut self, mut sink: PanelSink<D>, refresh: Duration) {
        info!("Refreshing panel every {:?}", refresh);
        self.drive(&mut sink, refresh, refresh, || false).await;
    }

    /// Interactive mode: redraw every `tick`; `poll_quit` is asked after each
    /// redraw whether the user pressed a quit key.
    pub async fn run_interactive<T, Q>(&mut self, mut sink: TerminalSink<T>, tick: Duration, mut poll_quit: Q)
    where
        T: Backend,
        Q: FnMut() -> std::io::Result<bool>,
    {
        self.drive(&mut sink, tick, tick, || match poll_quit() {
            Ok(quit) => quit,
            Err(e) => {
                warn!("Failed to read terminal input: {}", e);
                false
            }
        })
        .await;
    }
}
