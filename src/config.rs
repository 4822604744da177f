//! Configuration for the ratha-nav daemon.
//!
//! Loaded from a TOML file. Every tuning constant used by the pipeline
//! (tables, thresholds, kernel sizes, footprint dimensions) lives here and
//! is immutable after startup; components take what they need at
//! construction time. The source hardware went through three tuning
//! generations with drifting constants — `track_defaults()` is the canonical
//! set, and alternate generations are expressible as alternate TOML files.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NavConfig {
    pub hardware: HardwareConfig,
    pub acquisition: AcquisitionConfig,
    pub footprint: FootprintConfig,
    pub filter: FilterConfig,
    pub steering: SteeringConfig,
    pub speed: SpeedConfig,
    pub recovery: RecoveryConfig,
    pub stall: StallConfig,
    pub control: ControlConfig,
    pub logging: LoggingConfig,
}

/// Hardware configuration (serial ports).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HardwareConfig {
    /// 360° range sensor serial port
    pub range_port: String,
    /// Range sensor baud rate
    pub range_baud: u32,
    /// Chassis controller serial port (drive, steering, status)
    pub chassis_port: String,
    /// Chassis controller baud rate
    pub chassis_baud: u32,
}

/// Range acquisition loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcquisitionConfig {
    /// Sensor mounting offset: degrees to rotate raw readings so slot 0 is
    /// vehicle forward
    pub heading_offset_deg: i32,
    /// Field of view kept after masking (degrees, centered on forward)
    pub fov_deg: u32,
    /// Readings older than this are invalidated (milliseconds)
    pub timeout_ms: u64,
    /// Input-buffer resets attempted before reconnecting the transport
    pub max_input_resets: u32,
    /// Delay before reopening the transport after persistent errors (ms)
    pub reconnect_backoff_ms: u64,
}

/// Vehicle footprint dimensions (meters, from the rotation center).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FootprintConfig {
    /// Half-width of the body
    pub half_width_m: f32,
    /// Distance from rotation center to the front edge
    pub front_half_length_m: f32,
    /// Distance from rotation center to the rear edge
    pub rear_half_length_m: f32,
}

/// Directional filter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterConfig {
    /// Output window width (degrees); normally equals acquisition fov
    pub window_deg: u32,
    /// Heading treated as window center (degrees, 0 = forward)
    pub forward_deg: i32,
    /// Smoothing kernel length (degrees, odd)
    pub kernel_deg: u32,
    /// Half-width of the boosted central kernel band (degrees)
    pub center_band_deg: u32,
    /// Weight multiplier inside the central band
    pub center_boost: f32,
}

/// Steering law configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SteeringConfig {
    /// Piecewise-linear anchors: absolute target angle (degrees)
    pub table_angles_deg: Vec<f32>,
    /// Piecewise-linear anchors: steering magnitude at each angle
    pub table_steering: Vec<f32>,
    /// Clearance below which a side counts as blocked (meters)
    pub min_safe_m: f32,
    /// Maximum offset scanned to each side of the target (degrees)
    pub max_scan_deg: i32,
    /// Correction per residual scan degree when one side is blocked
    pub avoid_scale: f32,
}

/// Which speed policy drives the speed law.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedPolicy {
    /// Exponential decay in |steering| gated by frontal clearance (default)
    AngleDecay,
    /// Weighted blend of an angle table and a distance table
    Blended,
}

/// Speed law configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpeedConfig {
    pub policy: SpeedPolicy,
    /// Maximum forward speed (m/s)
    pub max_speed: f32,
    /// Minimum commanded speed when moving (m/s, blended policy floor)
    pub min_speed: f32,
    /// Decay constant per degree of steering (angle-decay policy)
    pub decay_per_deg: f32,
    /// Frontal clearance at or below which speed is forced to zero (m)
    pub stop_m: f32,
    /// Frontal clearance above which speed is not distance-limited (m)
    pub slow_m: f32,
    /// Half-width of the forward-looking clearance cone (degrees)
    pub cone_half_deg: i32,
    /// Blend weight on the angle term (blended policy, 0..=1)
    pub blend: f32,
    /// Blended policy: |steering| anchors and speeds
    pub angle_table_deg: Vec<f32>,
    pub angle_table_speed: Vec<f32>,
    /// Blended policy: clearance anchors and speeds
    pub distance_table_m: Vec<f32>,
    pub distance_table_speed: Vec<f32>,
    /// Blended policy: absolute clearance below which speed is zero (m)
    pub hard_stop_m: f32,
}

/// Recovery maneuver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecoveryConfig {
    /// Rear clearance required to start the maneuver (m)
    pub min_safe_m: f32,
    /// Mean side-band clearance required for turning (m)
    pub turning_space_m: f32,
    /// Rear distance at which reversing stops (m). Keep this below half of
    /// `min_safe_m`, otherwise the slow creep band between the two never
    /// engages and reversing goes from full speed straight to the stop.
    pub rear_stop_m: f32,
    /// Hard wall-clock bound on the reversing phase (ms)
    pub max_reverse_ms: u64,
    /// Dwell at zero speed between reversing and advancing (ms)
    pub pause_ms: u64,
    /// Duration of the advancing phase (ms)
    pub advance_ms: u64,
    /// Reverse speed (m/s, commanded negative)
    pub reverse_speed: f32,
    /// Forward speed during the advancing phase (m/s)
    pub advance_speed: f32,
    /// Cruise speed set when straightening out (m/s)
    pub cruise_speed: f32,
    /// Steering magnitude used while turning (law units)
    pub turn_steering: f32,
    /// Left clearance band scanned for side choice (degrees, inclusive)
    pub left_band_from_deg: i32,
    pub left_band_to_deg: i32,
    /// Right clearance band scanned for side choice (degrees, inclusive)
    pub right_band_from_deg: i32,
    pub right_band_to_deg: i32,
}

/// Stall detector configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StallConfig {
    /// Measured speed below this counts as stopped (m/s)
    pub stopped_mps: f32,
    /// Continuous divergence duration that signals a collision (ms)
    pub stall_ms: u64,
    /// Reverse pulse issued by the control loop on a stall trip (ms)
    pub pulse_ms: u64,
    /// Reverse pulse speed (m/s, commanded negative)
    pub pulse_speed: f32,
}

/// Control loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlConfig {
    /// Control cycle period (ms); ~20 Hz by default
    pub cycle_ms: u64,
    /// Telemetry queue capacity (records dropped beyond this)
    pub telemetry_queue: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl NavConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: NavConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Canonical parameter set for the bounded test track.
    pub fn track_defaults() -> Self {
        Self {
            hardware: HardwareConfig {
                range_port: "/dev/ttyUSB0".to_string(),
                range_baud: 115200,
                chassis_port: "/dev/ttyS1".to_string(),
                chassis_baud: 115200,
            },
            acquisition: AcquisitionConfig {
                heading_offset_deg: 90,
                fov_deg: 180,
                timeout_ms: 400,
                max_input_resets: 3,
                reconnect_backoff_ms: 500,
            },
            footprint: FootprintConfig {
                half_width_m: 0.09,
                front_half_length_m: 0.13,
                rear_half_length_m: 0.11,
            },
            filter: FilterConfig {
                window_deg: 180,
                forward_deg: 0,
                kernel_deg: 21,
                center_band_deg: 3,
                center_boost: 3.0,
            },
            steering: SteeringConfig {
                table_angles_deg: vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0],
                table_steering: vec![0.0, 6.0, 12.0, 20.0, 28.0, 34.0],
                min_safe_m: 0.45,
                max_scan_deg: 30,
                avoid_scale: 0.8,
            },
            speed: SpeedConfig {
                policy: SpeedPolicy::AngleDecay,
                max_speed: 1.6,
                min_speed: 0.3,
                decay_per_deg: 0.035,
                stop_m: 0.25,
                slow_m: 1.2,
                cone_half_deg: 15,
                blend: 0.6,
                angle_table_deg: vec![0.0, 10.0, 25.0, 50.0],
                angle_table_speed: vec![1.6, 1.2, 0.7, 0.3],
                distance_table_m: vec![0.3, 0.8, 1.5, 3.0],
                distance_table_speed: vec![0.3, 0.8, 1.3, 1.6],
                hard_stop_m: 0.2,
            },
            recovery: RecoveryConfig {
                min_safe_m: 0.3,
                turning_space_m: 0.4,
                rear_stop_m: 0.1,
                max_reverse_ms: 2500,
                pause_ms: 300,
                advance_ms: 1200,
                reverse_speed: 0.4,
                advance_speed: 0.5,
                cruise_speed: 0.6,
                turn_steering: 30.0,
                left_band_from_deg: 280,
                left_band_to_deg: 340,
                right_band_from_deg: 20,
                right_band_to_deg: 80,
            },
            stall: StallConfig {
                stopped_mps: 0.05,
                stall_ms: 800,
                pulse_ms: 400,
                pulse_speed: 0.4,
            },
            control: ControlConfig {
                cycle_ms: 50,
                telemetry_queue: 256,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    /// Reject malformed configurations at startup.
    ///
    /// Contract violations here are the only fatal error class: everything
    /// downstream assumes monotone tables and in-range windows.
    pub fn validate(&self) -> Result<()> {
        fn check_table(name: &str, xs: &[f32], ys: &[f32]) -> Result<()> {
            if xs.len() < 2 || xs.len() != ys.len() {
                return Err(Error::InvalidParameter(format!(
                    "{name}: table needs >= 2 anchors and equal lengths (got {} / {})",
                    xs.len(),
                    ys.len()
                )));
            }
            if !xs.windows(2).all(|w| w[0] < w[1]) {
                return Err(Error::InvalidParameter(format!(
                    "{name}: anchor abscissae must be strictly increasing"
                )));
            }
            Ok(())
        }

        check_table(
            "steering",
            &self.steering.table_angles_deg,
            &self.steering.table_steering,
        )?;
        check_table(
            "speed.angle_table",
            &self.speed.angle_table_deg,
            &self.speed.angle_table_speed,
        )?;
        check_table(
            "speed.distance_table",
            &self.speed.distance_table_m,
            &self.speed.distance_table_speed,
        )?;

        if self.acquisition.fov_deg == 0 || self.acquisition.fov_deg > 360 {
            return Err(Error::InvalidParameter(format!(
                "acquisition.fov_deg must be in 1..=360, got {}",
                self.acquisition.fov_deg
            )));
        }
        if self.filter.window_deg == 0 || self.filter.window_deg > 360 {
            return Err(Error::InvalidParameter(format!(
                "filter.window_deg must be in 1..=360, got {}",
                self.filter.window_deg
            )));
        }
        if self.filter.kernel_deg == 0 || self.filter.kernel_deg % 2 == 0 {
            return Err(Error::InvalidParameter(format!(
                "filter.kernel_deg must be odd and positive, got {}",
                self.filter.kernel_deg
            )));
        }
        if self.filter.center_boost < 1.0 {
            return Err(Error::InvalidParameter(
                "filter.center_boost must be >= 1.0".to_string(),
            ));
        }
        if 2 * self.filter.center_band_deg + 1 >= self.filter.kernel_deg {
            return Err(Error::InvalidParameter(format!(
                "filter.center_band_deg ({}) covers the whole {}-degree kernel; \
                 the boosted band must be narrower than the kernel",
                self.filter.center_band_deg, self.filter.kernel_deg
            )));
        }
        if self.footprint.half_width_m <= 0.0
            || self.footprint.front_half_length_m <= 0.0
            || self.footprint.rear_half_length_m <= 0.0
        {
            return Err(Error::InvalidParameter(
                "footprint dimensions must be positive".to_string(),
            ));
        }
        if self.speed.stop_m >= self.speed.slow_m {
            return Err(Error::InvalidParameter(format!(
                "speed.stop_m ({}) must be below speed.slow_m ({})",
                self.speed.stop_m, self.speed.slow_m
            )));
        }
        if !(0.0..=1.0).contains(&self.speed.blend) {
            return Err(Error::InvalidParameter(
                "speed.blend must be in [0, 1]".to_string(),
            ));
        }
        if self.speed.min_speed > self.speed.max_speed {
            return Err(Error::InvalidParameter(
                "speed.min_speed must not exceed speed.max_speed".to_string(),
            ));
        }
        if self.steering.max_scan_deg <= 0 {
            return Err(Error::InvalidParameter(
                "steering.max_scan_deg must be positive".to_string(),
            ));
        }
        if self.control.cycle_ms == 0 {
            return Err(Error::InvalidParameter(
                "control.cycle_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for NavConfig {
    fn default() -> Self {
        Self::track_defaults()
    }
}
