//! ratha-nav - autonomous navigation daemon for a small wheeled vehicle.
//!
//! Reads a 360° range sensor on one serial port and a chassis controller on
//! another, and drives the obstacle-avoidance control loop at ~20 Hz.

use std::env;

use ratha_nav::app::App;
use ratha_nav::config::NavConfig;
use ratha_nav::control::PilotIo;
use ratha_nav::drivers::chassis_serial::ChassisBus;
use ratha_nav::drivers::range_serial::SerialRangeSensor;
use ratha_nav::drivers::NullCamera;
use ratha_nav::error::Result;
use ratha_nav::telemetry::NullSink;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `ratha-nav <path>` (positional)
/// - `ratha-nav --config <path>` (flag-based)
/// - `ratha-nav -c <path>` (short flag)
///
/// Defaults to `/etc/rathanav.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/rathanav.toml".to_string()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("ratha-nav v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = parse_config_path();
    log::info!("Using config: {}", config_path);
    let config = NavConfig::from_file(&config_path)?;

    let transport = SerialRangeSensor::new(&config.hardware.range_port, config.hardware.range_baud);

    let chassis = ChassisBus::open(&config.hardware.chassis_port, config.hardware.chassis_baud)?;
    let io = PilotIo {
        steering: Box::new(chassis.steering()),
        drive: Box::new(chassis.drive()),
        rear: Box::new(chassis.rear_range()),
        speed: Box::new(chassis.speed_sensor()),
        battery: Box::new(chassis.battery()),
        camera: Box::new(NullCamera),
        // Replaced by the channel sink when the app wires telemetry.
        telemetry: Box::new(NullSink),
    };

    let mut app = App::new(&config, Box::new(transport), io)?;
    app.run()
}
