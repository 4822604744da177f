//! The control loop: perception snapshot in, actuator commands out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::NavConfig;
use crate::control::steering::SteeringLaw;
use crate::control::speed::SpeedLaw;
use crate::core::snapshot::SharedPerceptionState;
use crate::drivers::{
    BatterySensor, DriveActuator, ForwardCamera, RearRangeSensor, SpeedSensor, SteeringActuator,
};
use crate::error::Result;
use crate::perception::{DirectionalFilter, FootprintProfile};
use crate::safety::{ManeuverOutcome, OrientationGuard, RecoveryManeuver, StallDetector};
use crate::telemetry::{TelemetryRecord, TelemetrySink};

/// All collaborator endpoints the control loop drives.
pub struct PilotIo {
    pub steering: Box<dyn SteeringActuator>,
    pub drive: Box<dyn DriveActuator>,
    pub rear: Box<dyn RearRangeSensor>,
    pub speed: Box<dyn SpeedSensor>,
    pub battery: Box<dyn BatterySensor>,
    pub camera: Box<dyn ForwardCamera>,
    pub telemetry: Box<dyn TelemetrySink>,
}

/// What a single control cycle did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// No new snapshot since the last cycle.
    NoData,
    /// Stall tripped; a reverse pulse was issued instead of normal control.
    StallPulse,
    /// Vehicle was reversed; the recovery maneuver ran.
    Maneuver(ManeuverOutcome),
    /// Normal steering/speed computation.
    Drive {
        target_deg: i32,
        steering: f32,
        speed: f32,
    },
}

/// Ties the pipeline together once per cycle.
pub struct Pilot {
    perception: Arc<SharedPerceptionState>,
    footprint: FootprintProfile,
    filter: DirectionalFilter,
    steering_law: SteeringLaw,
    speed_law: SpeedLaw,
    guard: OrientationGuard,
    recovery: RecoveryManeuver,
    stall: StallDetector,
    io: PilotIo,
    cycle_period: Duration,
    pulse: Duration,
    pulse_speed: f32,
    cruise_speed: f32,
    last_seq: u64,
    last_speed_cmd: f32,
}

impl Pilot {
    pub fn new(
        config: &NavConfig,
        perception: Arc<SharedPerceptionState>,
        io: PilotIo,
    ) -> Result<Self> {
        Ok(Self {
            perception,
            footprint: FootprintProfile::new(&config.footprint),
            filter: DirectionalFilter::new(&config.filter),
            steering_law: SteeringLaw::new(&config.steering)?,
            speed_law: SpeedLaw::new(&config.speed)?,
            guard: OrientationGuard::new(),
            recovery: RecoveryManeuver::new(config.recovery.clone()),
            stall: StallDetector::new(&config.stall),
            io,
            cycle_period: Duration::from_millis(config.control.cycle_ms),
            pulse: Duration::from_millis(config.stall.pulse_ms),
            pulse_speed: config.stall.pulse_speed,
            cruise_speed: config.recovery.cruise_speed,
            last_seq: 0,
            last_speed_cmd: 0.0,
        })
    }

    /// Run cycles at the configured cadence until shutdown, then command
    /// the actuators to neutral.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        log::info!(
            "Pilot: control loop starting, {} ms cadence",
            self.cycle_period.as_millis()
        );

        while !shutdown.load(Ordering::Relaxed) {
            let started = Instant::now();
            if let Err(e) = self.cycle(shutdown) {
                // Collaborator hiccups degrade the cycle, not the loop.
                log::warn!("Pilot: cycle error: {e}");
            }
            let elapsed = started.elapsed();
            if elapsed < self.cycle_period {
                std::thread::sleep(self.cycle_period - elapsed);
            }
        }

        self.io.drive.stop()?;
        self.io.steering.stop()?;
        log::info!("Pilot: actuators neutralized, control loop exiting");
        Ok(())
    }

    /// Execute one control cycle.
    pub fn cycle(&mut self, shutdown: &AtomicBool) -> Result<CycleOutcome> {
        let started = Instant::now();

        let snapshot = match self.perception.latest_after(self.last_seq) {
            Some(s) => s,
            None => {
                log::trace!("Pilot: no new snapshot, skipping cycle");
                return Ok(CycleOutcome::NoData);
            }
        };
        self.last_seq = snapshot.seq;

        let measured = self.io.speed.speed_mps()?;
        if self.stall.update(self.last_speed_cmd, measured, started) {
            log::warn!("Pilot: stall detected, issuing reverse pulse");
            self.io.drive.set_speed(-self.pulse_speed)?;
            std::thread::sleep(self.pulse);
            self.io.drive.set_speed(0.0)?;
            self.last_speed_cmd = 0.0;
            return Ok(CycleOutcome::StallPulse);
        }

        let cues = self.io.camera.boundary_cues()?;
        if self.guard.is_reversed(&cues) {
            log::info!("Pilot: orientation reversed, starting recovery maneuver");
            let outcome = self.recovery.execute(
                &snapshot.field,
                self.io.rear.as_mut(),
                self.io.steering.as_mut(),
                self.io.drive.as_mut(),
                &self.perception,
                shutdown,
            )?;
            self.last_speed_cmd = match outcome {
                ManeuverOutcome::Completed { .. } => self.cruise_speed,
                ManeuverOutcome::Aborted(_) => 0.0,
            };
            return Ok(CycleOutcome::Maneuver(outcome));
        }

        let shrunk = self.footprint.shrink(&snapshot.field);
        let window = self.filter.apply(&shrunk);
        let decision = self.steering_law.compute(&window, &shrunk);
        let speed = self.speed_law.compute(decision.steering, &shrunk);

        self.io.steering.set_steering(decision.steering)?;
        self.io.drive.set_speed(speed)?;
        self.last_speed_cmd = speed;

        let battery_v = self.io.battery.voltage()?;
        self.io.telemetry.record(TelemetryRecord {
            at: started,
            target_deg: decision.target_deg,
            steering: decision.steering,
            speed_cmd: speed,
            measured_mps: measured,
            battery_v,
            loop_latency: started.elapsed(),
        });
        log::debug!(
            "Pilot: target={}deg steer={:.1} speed={:.2}m/s",
            decision.target_deg,
            decision.steering,
            speed
        );

        Ok(CycleOutcome::Drive {
            target_deg: decision.target_deg,
            steering: decision.steering,
            speed,
        })
    }
}
