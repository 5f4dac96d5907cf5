//! `zwave` command line entry point.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use zwave_controller::telemetry::describe_metrics;
use zwave_controller::Controller;
use zwave_runner::{
    load_config, spawn_event_printer, BridgeExit, ConfigOverrides, EventFormat, RunnerResult, SerialBridge,
};

/// Drive a Z-Wave controller stick exposed over TCP.
#[derive(Parser, Debug)]
#[command(name = "zwave", version, about)]
struct Cli {
    /// Address of the serial forwarder the stick is attached to.
    #[arg(long, default_value = "127.0.0.1:4001")]
    connect: String,

    /// YAML controller configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip IdentifyNode/RequestNodeInfo for nodes found at startup.
    #[arg(long)]
    no_interview: bool,

    /// Do not negotiate command class versions automatically.
    #[arg(long)]
    no_negotiate: bool,

    /// Print events as JSON lines.
    #[arg(long)]
    json: bool,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Poll interval in milliseconds.
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            interview_nodes: self.no_interview.then_some(false),
            auto_negotiate_versions: self.no_negotiate.then_some(false),
        }
    }
}

async fn run(cli: Cli) -> RunnerResult<BridgeExit> {
    let config = load_config(cli.config.as_deref(), &cli.overrides())?;
    describe_metrics();

    let mut controller = Controller::new(config);
    let format = if cli.json { EventFormat::Json } else { EventFormat::Text };
    let printer = spawn_event_printer(controller.subscribe(), format)?;
    controller.initialize();

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let shutdown_tx = Mutex::new(Some(shutdown_tx));
    ctrlc::set_handler(move || {
        if let Some(tx) = shutdown_tx.lock().ok().and_then(|mut guard| guard.take()) {
            let _ = tx.send(());
        }
    })?;

    let stream = SerialBridge::connect(&cli.connect).await?;
    let mut bridge = SerialBridge::new(controller, Duration::from_millis(cli.tick_ms.max(1)));
    let exit = bridge.run(stream, shutdown_rx).await?;

    // Dropping the controller closes the event channel.
    drop(bridge);
    if let Ok(printed) = printer.join() {
        info!("{} events printed", printed);
    }
    Ok(exit)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match run(cli).await {
        Ok(exit) => {
            info!("Stopped: {:?}", exit);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
