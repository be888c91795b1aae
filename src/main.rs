use std::{io, process::ExitCode};

use clap::Parser;
use gps_monitor::{
    cli::Cli,
    config::{Config, ConfigError},
    core::{
        dispatcher::{RuntimeContext, RuntimeMode},
        lifecycle::{spawn_signal_listener, Lifecycle},
        sinks::{
            panel::FramebufferDevice, terminal::poll_quit, CsvSink, PanelSink, SinkError,
            TerminalSink,
        },
        telemetry::{FetchPolicy, TelemetryClient},
    },
    daemon::{daemonize, DaemonError},
    logger::{LoggerError, LoggerManager},
    print_error, print_info,
};
use gps_monitor_ubus::{BusError, Handshake};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to set up logging: {0}")]
    Logger(#[from] LoggerError),

    #[error("Failed to connect to ubus: {0}")]
    Bus(#[from] BusError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("Failed to daemonize: {0}")]
    Daemon(#[from] DaemonError),

    #[error("Failed to start the runtime: {0}")]
    Runtime(#[source] io::Error),
}

/// Output opened before the runtime exists. The terminal is opened last,
/// inside the runtime, so no failure path leaves it in raw mode.
enum ModeOutput {
    Csv(CsvSink),
    Panel(PanelSink<FramebufferDevice>),
    Terminal,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = Config::new()?;
    cli.apply_to(&mut config);
    let config = config.validated()?;
    let mode = cli.mode();

    let logger = LoggerManager::new(config.logger.clone())?
        .suppress_console(mode == RuntimeMode::Interactive);
    if logger.init()? {
        info!("Starting gps-monitor version {}...", env!("CARGO_PKG_VERSION"));
        info!("Log level: {}", config.logger.level);
    }
    debug!("{:#?}", config.telemetry);

    let socket = config.telemetry.resolved_socket_path();
    let handshake = Handshake::connect(&socket, config.telemetry.timeout())?;
    info!(
        socket = %socket.display(),
        client_id = handshake.local_id(),
        "Connected to ubus"
    );

    let output = match mode {
        RuntimeMode::Logging => {
            let sink = CsvSink::open(&config.logging.output)?;
            print_info!("GPS Logger started");
            print_info!("Logging to: {}", config.logging.output.display());
            print_info!("Interval: {} seconds", config.logging.interval_secs);
            if cli.daemon {
                daemonize()?;
            } else {
                print_info!("Press Ctrl+C to stop");
            }
            ModeOutput::Csv(sink)
        }
        RuntimeMode::PanelDisplay => ModeOutput::Panel(PanelSink::open(&config.panel)?),
        RuntimeMode::Interactive => ModeOutput::Terminal,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;

    runtime.block_on(async move {
        let connection = handshake.into_connection()?;
        let client = TelemetryClient::new(connection, FetchPolicy::from(&config.telemetry));
        let lifecycle = Lifecycle::new();
        let signals = match spawn_signal_listener(lifecycle.running_flag()) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Signal handlers not installed: {}", e);
                None
            }
        };

        let mut ctx = RuntimeContext::new(mode, client, lifecycle);
        match output {
            ModeOutput::Csv(sink) => ctx.run_logging(sink, config.logging.interval()).await,
            ModeOutput::Panel(sink) => ctx.run_panel(sink, config.panel.refresh()).await,
            ModeOutput::Terminal => {
                let sink = TerminalSink::open()?;
                ctx.run_interactive(sink, config.interactive.tick(), poll_quit)
                    .await
            }
        }

        if let Some(handle) = signals {
            handle.abort();
        }
        Ok::<_, AppError>(())
    })
}
