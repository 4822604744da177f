//! Collaborator interfaces consumed by the navigation core.
//!
//! Everything the core touches outside its own process — sensors, actuators,
//! camera cues — sits behind one of these traits. Hardware bindings and the
//! mocks used by the test suite both implement them.

pub mod chassis_serial;
pub mod mock;
pub mod range_serial;

use crate::error::Result;

/// One range return from the 360° sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangePacket {
    /// Signal quality reported by the sensor.
    pub quality: u8,
    /// Measurement heading in sensor frame (degrees).
    pub angle_deg: f32,
    /// Measured distance in millimeters.
    pub distance_mm: f32,
}

/// Batched range-sensor transport.
///
/// `stop` and `disconnect` must be idempotent and safe to call during error
/// unwinding; the acquisition loop calls them on every exit path.
pub trait RangeTransport: Send {
    /// Open the underlying connection.
    fn connect(&mut self) -> Result<()>;

    /// Start the measurement stream.
    fn start(&mut self) -> Result<()>;

    /// Read the next batch of packets. May block on transport I/O only.
    fn read_batch(&mut self) -> Result<Vec<RangePacket>>;

    /// Discard any partially-read input after a framing error.
    fn reset_input(&mut self) -> Result<()>;

    /// Stop the measurement stream.
    fn stop(&mut self) -> Result<()>;

    /// Close the underlying connection.
    fn disconnect(&mut self) -> Result<()>;
}

/// Steering servo output, in steering-law units.
pub trait SteeringActuator: Send {
    fn set_steering(&mut self, value: f32) -> Result<()>;

    /// Return to neutral.
    fn stop(&mut self) -> Result<()>;
}

/// Drive motor output in m/s; negative values command reverse.
pub trait DriveActuator: Send {
    fn set_speed(&mut self, mps: f32) -> Result<()>;

    /// Cut drive output.
    fn stop(&mut self) -> Result<()>;
}

/// Rear-facing ultrasonic sensor.
///
/// `None` means the sensor has no valid reading; it is never conflated with
/// a zero distance.
pub trait RearRangeSensor: Send {
    fn distance_m(&mut self) -> Result<Option<f32>>;
}

/// Measured vehicle speed (m/s).
pub trait SpeedSensor: Send {
    fn speed_mps(&mut self) -> Result<f32>;
}

/// Battery voltage telemetry.
pub trait BatterySensor: Send {
    fn voltage(&mut self) -> Result<f32>;
}

/// Horizontal positions of the two track-boundary colors in the forward
/// camera frame. A cue the detector could not find is `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryCues {
    pub left_x: Option<f32>,
    pub right_x: Option<f32>,
}

/// Forward camera cue extraction.
pub trait ForwardCamera: Send {
    fn boundary_cues(&mut self) -> Result<BoundaryCues>;
}

/// Camera stand-in for builds without a vision frontend. Both cues read
/// `None`, so the orientation check never fires.
#[derive(Default)]
pub struct NullCamera;

impl ForwardCamera for NullCamera {
    fn boundary_cues(&mut self) -> Result<BoundaryCues> {
        Ok(BoundaryCues::default())
    }
}
