//! mdns-repeater CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use tracing::{error, info};

use mdns_repeater::{
    open_ingress, CaptureStream, MdnsRepeater, RepeaterConfig, RepeaterContext, Result,
    TracingReporter,
};

/// mDNS repeater - relays filtered mDNS packets from one interface to others.
#[derive(Parser, Debug)]
#[command(name = mdns_repeater::PACKAGE)]
#[command(version)]
#[command(about = "A filtering mDNS repeater")]
#[command(
    long_about = "Captures mDNS packets on one interface, removes link-local records and replays them on other interfaces with the original sender address."
)]
struct Args {
    /// Interface to capture mDNS traffic on.
    #[arg(long = "receiveInterface", alias = "receive-interface")]
    receive_interface: Option<String>,

    /// Comma-separated interfaces to relay to (e.g., 'eth1,wlan0').
    #[arg(long = "sendInterfaces", alias = "send-interfaces")]
    send_interfaces: Option<String>,

    /// Log every processed message in detail.
    #[arg(long)]
    debug: bool,

    /// Path to YAML configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

async fn run(config: RepeaterConfig) -> Result<()> {
    config.validate()?;

    let context = RepeaterContext::open(&config)?;
    let source = open_ingress(&config.receive_interface, &config.capture)?;
    let stream = CaptureStream::spawn(source, config.capture.queue_depth);

    let repeater = MdnsRepeater::new(context, Arc::new(TracingReporter));
    repeater.run(stream).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let file_config = args
        .config
        .as_deref()
        .map(RepeaterConfig::from_yaml_file)
        .transpose();

    let debug = args.debug || matches!(&file_config, Ok(Some(c)) if c.debug);
    init_tracing(if debug { "debug" } else { args.log_level.as_str() });

    let file_config = match file_config {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            error!("Failed to load configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let config = file_config.with_cli(
        args.receive_interface.as_deref(),
        args.send_interfaces.as_deref(),
        args.debug,
    );

    if !config.has_interfaces() {
        eprintln!("error: both --receiveInterface and --sendInterfaces are required\n");
        eprintln!("{}", Args::command().render_usage());
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => {
            info!("Stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
