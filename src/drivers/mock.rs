//! Mock collaborators for hardware-free testing.
//!
//! Every mock is a cheap clone around shared interior state so a test can
//! keep one handle for inspection while the component under test owns the
//! other.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    BatterySensor, BoundaryCues, DriveActuator, ForwardCamera, RangePacket, RangeTransport,
    RearRangeSensor, SpeedSensor, SteeringActuator,
};
use crate::error::{Error, Result};

/// Scripted range transport: pops pre-loaded batches, then yields empties.
#[derive(Clone, Default)]
pub struct MockRangeTransport {
    inner: Arc<Mutex<MockRangeInner>>,
}

#[derive(Default)]
struct MockRangeInner {
    batches: VecDeque<Result<Vec<RangePacket>>>,
    connected: bool,
    started: bool,
    input_resets: u32,
    disconnects: u32,
}

impl MockRangeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a batch to be returned by `read_batch`.
    pub fn push_batch(&self, batch: Vec<RangePacket>) {
        self.inner.lock().batches.push_back(Ok(batch));
    }

    /// Queue a framing error.
    pub fn push_error(&self) {
        self.inner
            .lock()
            .batches
            .push_back(Err(Error::InvalidPacket("scripted framing error".into())));
    }

    pub fn input_resets(&self) -> u32 {
        self.inner.lock().input_resets
    }

    pub fn disconnects(&self) -> u32 {
        self.inner.lock().disconnects
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }
}

impl RangeTransport for MockRangeTransport {
    fn connect(&mut self) -> Result<()> {
        self.inner.lock().connected = true;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.inner.lock().started = true;
        Ok(())
    }

    fn read_batch(&mut self) -> Result<Vec<RangePacket>> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(Error::NotConnected);
        }
        inner.batches.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn reset_input(&mut self) -> Result<()> {
        self.inner.lock().input_resets += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.inner.lock().started = false;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.connected {
            inner.disconnects += 1;
        }
        inner.connected = false;
        Ok(())
    }
}

/// Recording steering actuator.
#[derive(Clone, Default)]
pub struct MockSteering {
    inner: Arc<Mutex<Vec<f32>>>,
}

impl MockSteering {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<f32> {
        self.inner.lock().last().copied()
    }

    pub fn history(&self) -> Vec<f32> {
        self.inner.lock().clone()
    }
}

impl SteeringActuator for MockSteering {
    fn set_steering(&mut self, value: f32) -> Result<()> {
        self.inner.lock().push(value);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.inner.lock().push(0.0);
        Ok(())
    }
}

/// Recording drive actuator.
#[derive(Clone, Default)]
pub struct MockDrive {
    inner: Arc<Mutex<Vec<f32>>>,
}

impl MockDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<f32> {
        self.inner.lock().last().copied()
    }

    pub fn history(&self) -> Vec<f32> {
        self.inner.lock().clone()
    }

    pub fn command_count(&self) -> usize {
        self.inner.lock().len()
    }
}

impl DriveActuator for MockDrive {
    fn set_speed(&mut self, mps: f32) -> Result<()> {
        self.inner.lock().push(mps);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.inner.lock().push(0.0);
        Ok(())
    }
}

/// Rear sensor yielding a scripted sequence; the last value repeats.
#[derive(Clone, Default)]
pub struct MockRearSensor {
    inner: Arc<Mutex<VecDeque<Option<f32>>>>,
}

impl MockRearSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reading(reading: Option<f32>) -> Self {
        let sensor = Self::default();
        sensor.push(reading);
        sensor
    }

    pub fn push(&self, reading: Option<f32>) {
        self.inner.lock().push_back(reading);
    }
}

impl RearRangeSensor for MockRearSensor {
    fn distance_m(&mut self) -> Result<Option<f32>> {
        let mut inner = self.inner.lock();
        if inner.len() > 1 {
            Ok(inner.pop_front().unwrap_or(None))
        } else {
            Ok(inner.front().copied().unwrap_or(None))
        }
    }
}

/// Settable speed sensor.
#[derive(Clone)]
pub struct MockSpeedSensor {
    value: Arc<Mutex<f32>>,
}

impl MockSpeedSensor {
    pub fn new(initial: f32) -> Self {
        Self {
            value: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn set(&self, mps: f32) {
        *self.value.lock() = mps;
    }
}

impl SpeedSensor for MockSpeedSensor {
    fn speed_mps(&mut self) -> Result<f32> {
        Ok(*self.value.lock())
    }
}

/// Fixed-voltage battery.
#[derive(Clone)]
pub struct MockBattery {
    voltage: f32,
}

impl MockBattery {
    pub fn new(voltage: f32) -> Self {
        Self { voltage }
    }
}

impl BatterySensor for MockBattery {
    fn voltage(&mut self) -> Result<f32> {
        Ok(self.voltage)
    }
}

/// Settable camera cues.
#[derive(Clone, Default)]
pub struct MockCamera {
    cues: Arc<Mutex<BoundaryCues>>,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_cues(&self, left_x: Option<f32>, right_x: Option<f32>) {
        *self.cues.lock() = BoundaryCues { left_x, right_x };
    }
}

impl ForwardCamera for MockCamera {
    fn boundary_cues(&mut self) -> Result<BoundaryCues> {
        Ok(*self.cues.lock())
    }
}
