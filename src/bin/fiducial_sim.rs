//! Runs the fiducial core against a simulated four-wheel vehicle.
//!
//! One tag sits ahead of the vehicle; the camera model reports it while it is
//! inside the field of view. The loop ticks at the configured cycle period until
//! the mission completes, `--duration` runs out, or Ctrl-C is pressed.
//!
//! Usage:
//!   cargo run --bin fiducial_sim -- --tag 23 --mode mission --log-level debug

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use fiducial_core::common::{
    normalize_degrees, CycleInput, Detection, TelemetrySink, WheelPowers, INCHES_PER_METER,
};
use fiducial_core::config::CoreConfig;
use fiducial_core::control::WheelActuator;
use fiducial_core::error::ActuatorError;
use fiducial_core::mission::Phase;
use fiducial_core::perception::localization::{TagFieldMap, TagSpacePose};
use fiducial_core::{BehaviorMode, FiducialCore};
use nalgebra::{Rotation2, Vector2, Vector3};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Forward/lateral speed at full wheel power, inches per second
const FULL_POWER_SPEED_IN: f64 = 90.0;
/// Yaw rate at full turn power, degrees per second
const FULL_POWER_YAW_DEG: f64 = 200.0;
/// Half of the camera's horizontal field of view, degrees
const HALF_FOV_DEG: f64 = 35.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Mission,
    Follow,
}

impl From<Mode> for BehaviorMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mission => BehaviorMode::Mission,
            Mode::Follow => BehaviorMode::Follow,
        }
    }
}

/// Fiducial mission controller on a simulated vehicle
#[derive(Parser)]
#[command(name = "fiducial_sim", about = "Drive a simulated vehicle with the fiducial core")]
struct Args {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Top-level behavior
    #[arg(long, value_enum, default_value_t = Mode::Mission)]
    mode: Mode,

    /// Id of the tag placed in front of the vehicle
    #[arg(long, default_value_t = 21)]
    tag: i32,

    /// Stop after this many seconds
    #[arg(long, default_value_t = 60.0)]
    duration: f64,

    /// Run without an inertial sensor (dead-reckoned heading)
    #[arg(long)]
    no_imu: bool,

    /// Log filter, e.g. "info" or "fiducial_core=debug"
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Planar vehicle and a single tag, field frame in inches, yaw counter-clockwise
#[derive(Debug)]
struct SimVehicle {
    position: Vector2<f64>,
    heading_deg: f64,
    tag_id: i32,
    tag_position: Vector2<f64>,
    powers: WheelPowers,
}

impl SimVehicle {
    fn new(tag_id: i32) -> Self {
        SimVehicle {
            position: Vector2::zeros(),
            heading_deg: 0.0,
            tag_id,
            tag_position: Vector2::new(72.0, 6.0),
            powers: WheelPowers::ZERO,
        }
    }

    /// Integrate the last applied wheel powers over `dt` seconds
    fn advance(&mut self, dt: f64) {
        let p = self.powers;
        let drive = (p.front_left + p.front_right + p.back_left + p.back_right) / 4.0;
        let turn = (p.front_right + p.back_right - p.front_left - p.back_left) / 4.0;
        let strafe = (p.back_left + p.front_right - p.front_left - p.back_right) / 4.0;

        let heading = Rotation2::new(self.heading_deg.to_radians());
        let forward = heading * Vector2::x();
        let right = heading * Vector2::new(0.0, -1.0);
        self.position += (forward * drive + right * strafe) * FULL_POWER_SPEED_IN * dt;
        self.heading_deg += turn * FULL_POWER_YAW_DEG * dt;
    }

    /// What the camera sees, if the tag is in front and inside the field of view
    fn detection(&self) -> Option<Detection> {
        let local = Rotation2::new(-self.heading_deg.to_radians())
            * (self.tag_position - self.position);
        if local.x <= 0.0 {
            return None;
        }
        let bearing_deg = (-local.y).atan2(local.x).to_degrees();
        if bearing_deg.abs() > HALF_FOV_DEG {
            return None;
        }
        Some(Detection {
            tag_id: self.tag_id,
            bearing_deg,
            elevation_deg: 0.0,
            position: Vector3::new(-local.y, 0.0, local.x) / INCHES_PER_METER,
        })
    }

    /// Inertial yaw as the sensor reports it, wrapped to ±180
    fn imu_reading(&self) -> f64 {
        normalize_degrees(self.heading_deg)
    }
}

struct SimActuator<'a> {
    vehicle: &'a mut SimVehicle,
}

impl WheelActuator for SimActuator<'_> {
    fn set_powers(&mut self, powers: WheelPowers) -> std::result::Result<(), ActuatorError> {
        self.vehicle.powers = powers;
        Ok(())
    }
}

/// Collects one cycle of telemetry and logs it as a single line
#[derive(Default)]
struct LogTelemetry {
    fields: Vec<String>,
}

impl TelemetrySink for LogTelemetry {
    fn add_data(&mut self, key: &str, value: String) {
        self.fields.push(format!("{}={}", key, value));
    }

    fn update(&mut self) {
        debug!(target: "telemetry", "{}", self.fields.join(" "));
        self.fields.clear();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&args.log_level)
                .with_context(|| format!("invalid --log-level {:?}", args.log_level))?,
        )
        .init();

    let config = match &args.config {
        Some(path) => CoreConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => CoreConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(run(args, config))
}

async fn run(args: Args, config: CoreConfig) -> Result<()> {
    let period = Duration::from_millis(config.timing.cycle_period_ms);
    let dt = period.as_secs_f64();

    let mut core = FiducialCore::new(config, args.mode.into(), !args.no_imu)
        .context("failed to create fiducial core")?;
    core.init().context("failed to initialize fiducial core")?;

    let mut vehicle = SimVehicle::new(args.tag);
    let mut telemetry = LogTelemetry::default();
    let field_map = TagFieldMap::default();

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(tag = args.tag, mode = ?args.mode, imu = !args.no_imu, "starting simulation");

    let mut cycle: u64 = 0;
    let mut stop_requested = false;
    loop {
        tokio::select! {
            result = &mut ctrl_c, if !stop_requested => {
                result.context("failed to listen for Ctrl-C")?;
                info!("stop requested");
                stop_requested = true;
            }
            _ = ticker.tick() => {
                let elapsed = cycle as f64 * dt;
                cycle += 1;

                let mut input = CycleInput::at(elapsed).with_detection(vehicle.detection());
                if !args.no_imu {
                    input = input.with_heading(vehicle.imu_reading());
                }
                input.stop_requested = stop_requested;

                let output = core.step(
                    &input,
                    &mut SimActuator { vehicle: &mut vehicle },
                    &mut telemetry,
                )?;
                vehicle.advance(dt);

                if let Some(detection) = input.detections.first() {
                    // rough: treats the tag as facing straight back at the camera
                    let robot = TagSpacePose {
                        position: -detection.position,
                        yaw_deg: 180.0 - detection.bearing_deg,
                    };
                    if let Some(pose) = field_map.localize(detection.tag_id, &robot) {
                        debug!(x = pose.x_in, y = pose.y_in, heading = pose.heading_deg, "field pose");
                    }
                }

                if stop_requested {
                    break;
                }
                let complete = core
                    .mission()
                    .map_or(false, |mission| mission.current_phase() == Phase::Complete);
                if complete || elapsed >= args.duration {
                    info!(phase = %output.status.phase, elapsed, "ending run");
                    stop_requested = true;
                }
            }
        }
    }

    info!(
        x = vehicle.position.x,
        y = vehicle.position.y,
        heading = vehicle.heading_deg,
        transitions = ?core.mission().map(|m| m.transition_count()),
        "simulation finished"
    );
    core.shutdown().context("failed to shut down fiducial core")?;
    Ok(())
}
