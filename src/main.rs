use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use log::{LevelFilter, error, info, warn};

mod board;
mod config;
mod connectivity;
mod delivery;
mod error;
mod manager;
mod messages;
mod mode;
mod sampler;
mod server;
mod tracker;

#[cfg(test)]
mod testing;

use config::{AppConfig, ModeSetting};
use connectivity::{Monitor, RouteLink};
use delivery::{DeliveryClient, HttpTransport, LogIndicator};
use manager::Manager;
use tracker::{PresenceState, StateTracker};

#[derive(Parser, Debug)]
#[command(version, about = "Reports ultrasonic presence edges to a collector")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, env = "PRESENCE_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Overrides the configured sampler mode
    #[arg(long, value_enum)]
    mode: Option<ModeSetting>,
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::formatted_timed_builder()
        .filter_level(LevelFilter::Info)
        .parse_env("RUST_LOG")
        .init();

    let cli = Cli::parse();
    let contents = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("reading {}", cli.config.display()))?;
    let config = AppConfig::from_toml(&contents)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let collector = &config.collector;
    let base_url = collector.base_url();
    info!("Collector: {}", base_url);

    let state = PresenceState::new(false);
    let listener = server::bind(config.server().addr())
        .await
        .context("binding status server")?;
    let status_server = tokio::spawn(server::serve(listener, state.clone()));

    let network = config.network();
    let mut monitor = Monitor::new(
        RouteLink::new(&collector.host, collector.port(), network.recheck()),
        network.association_attempts(),
        network.association_poll(),
    );
    if let Err(err) = monitor.ensure_connected().await {
        warn!("Starting without a link: {}", err);
    }

    let mode = mode::resolve(
        cli.mode.unwrap_or(config.mode()),
        &base_url,
        collector.request_timeout(),
        config.fallback_mode(),
    )
    .await;
    let sampler = board::build_sampler(mode, &config);

    let transport = HttpTransport::new(&base_url, collector.request_timeout())?;
    let delivery = DeliveryClient::new(
        transport,
        LogIndicator,
        collector.max_retries(),
        collector.retry_delay(),
        config.indicator().pulse(),
    );

    let cycle = config.cycle();
    let manager = Manager::new(
        sampler,
        StateTracker::new(state),
        monitor,
        delivery,
        cycle.poll_interval(),
        cycle.disconnected_backoff(),
    );

    manager
        .run_loop(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for Ctrl-C: {}", err);
                std::future::pending::<()>().await;
            }
        })
        .await;

    status_server.abort();
    Ok(())
}
