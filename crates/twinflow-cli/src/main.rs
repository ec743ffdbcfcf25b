//! `twinflow-cli` – TwinFlow demo entry point.
//!
//! Wires the control core to the in-process simulated platform:
//!
//! 1. Loads `~/.twinflow/config.toml` (defaults apply when absent).
//! 2. Discovers the simulated temperature feeds and starts one
//!    [`ConditionWatcher`] per feed inside a [`ControlLoop`].
//! 3. Routes actuation to a radiator sink that prints every confirmed
//!    switch, and tails the control bus for feed losses and send failures.
//! 4. Intercepts **Ctrl-C** to request cooperative shutdown; the loop exits
//!    without sending a final off command.

mod config;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use colored::Colorize;
use tracing::warn;

use twinflow_control::{ControlLoop, ControlLoopConfig, FeedSpec};
use twinflow_platform::sim::{RampPublisher, StaticDiscovery};
use twinflow_platform::{Discovery, InputSender};
use twinflow_types::{ActuatorCommand, ControlPayload, FeedHandle, InputHandle, TwinError};

/// Actuator sink for the demo: the "radiator twin" on the receiving end of
/// the input channel.
struct RadiatorSink;

#[async_trait]
impl InputSender for RadiatorSink {
    async fn send_input(
        &self,
        _input: &InputHandle,
        command: ActuatorCommand,
    ) -> Result<(), TwinError> {
        match command {
            ActuatorCommand::On => println!("{}", "The radiator turns ON".red().bold()),
            ActuatorCommand::Off => println!("{}", "The radiator turns OFF".blue().bold()),
        }
        Ok(())
    }
}

fn init_tracing() {
    // Initialise tracing-subscriber using RUST_LOG (defaults to "info").
    // Set TWINFLOW_LOG_FORMAT=json to emit newline-delimited JSON logs
    // suitable for log aggregators.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("TWINFLOW_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }
}

fn print_banner(cfg: &config::Config) {
    println!("{}", "TwinFlow – feed-aggregation control loop".bold());
    println!(
        "  {} simulated feed(s), policy {}, predicate {}",
        cfg.feed_count,
        cfg.policy.to_string().cyan(),
        cfg.predicate().to_string().cyan()
    );
    println!("  Press Ctrl-C to stop.\n");
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cfg = match config::load() {
        Ok(Some(cfg)) => cfg,
        Ok(None) => {
            let cfg = config::Config::default();
            if let Err(e) = config::save(&cfg) {
                warn!("could not write default config: {e}");
            }
            cfg
        }
        Err(e) => {
            eprintln!("{}", format!("Configuration error: {e}").red());
            std::process::exit(1);
        }
    };

    print_banner(&cfg);

    // The demo's feed set; a real deployment would resolve this through the
    // platform's metadata search instead.
    let feeds: Vec<FeedHandle> = (0..cfg.feed_count)
        .map(|i| FeedHandle::new(format!("did:twin:sim-sensor-{i}"), "", "temperature"))
        .collect();
    let discovery = StaticDiscovery::new(feeds);
    let discovered = match discovery.discover().await {
        Ok(feeds) => feeds,
        Err(e) => {
            eprintln!("{}", format!("Discovery failed: {e}").red());
            std::process::exit(1);
        }
    };

    let specs: Vec<FeedSpec> = discovered
        .into_iter()
        .map(|handle| FeedSpec {
            handle,
            label: cfg.value_label.clone(),
            predicate: cfg.predicate(),
        })
        .collect();

    let mut loop_config = ControlLoopConfig::new(
        cfg.policy,
        InputHandle::new("did:twin:sim-radiator", "radiator_switch"),
    );
    loop_config.tick_interval = Duration::from_millis(cfg.tick_interval_ms);
    loop_config.send_timeout = Duration::from_millis(cfg.send_timeout_ms);
    loop_config.stale_after = Duration::from_millis(cfg.stale_after_ms);

    let control = ControlLoop::new(specs, loop_config, Arc::new(RadiatorSink));

    // Operator surface: tail the control bus for anything that affects
    // actuation correctness.
    let mut events = control.bus().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.payload {
                ControlPayload::FeedLost { feed } => {
                    println!("{}", format!("⚠ feed lost: {feed}").yellow());
                }
                ControlPayload::SendFailed { input, details } => {
                    println!("{}", format!("⚠ send to {input} failed: {details}").yellow());
                }
                _ => {}
            }
        }
    });

    // Ctrl-C requests cooperative shutdown; watchers stop and the loop
    // exits without a final off command.
    let shutdown = control.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        println!("\n{}", "Ctrl-C received – shutting down…".yellow().bold());
        shutdown.signal();
    }) {
        eprintln!("{}", format!("Failed to install Ctrl-C handler: {e}").red());
        std::process::exit(1);
    }

    let subscriber = Arc::new(RampPublisher::new(
        cfg.value_label.clone(),
        cfg.sim_low,
        cfg.sim_high,
        Duration::from_millis(cfg.sim_period_ms),
    ));

    match control.run(subscriber).await {
        Ok(()) => println!("{}", "TwinFlow stopped.".green()),
        Err(e) => {
            eprintln!("{}", format!("Control loop failed: {e}").red());
            std::process::exit(1);
        }
    }
}
