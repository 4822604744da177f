//! U-turn recovery maneuver.
//!
//! Executed when the vehicle is reversed or stuck: back up toward the more
//! open side, pause, pull forward with mirrored steering, straighten out.
//! Every phase has a hard wall-clock bound so the maneuver terminates even
//! with the rear sensor unavailable, and safety inputs are re-checked on
//! every tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::RecoveryConfig;
use crate::core::field::AngularDistanceField;
use crate::core::snapshot::SharedPerceptionState;
use crate::drivers::{DriveActuator, RearRangeSensor, SteeringActuator};
use crate::error::Result;

/// Phase poll interval.
const TICK: Duration = Duration::from_millis(20);

/// Maneuver lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManeuverState {
    Idle,
    Reversing,
    Pausing,
    Advancing,
    Straightening,
    Aborted,
    Completed,
}

/// Side the maneuver turns toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnSide {
    Left,
    Right,
}

/// Why a maneuver did not run to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// A maneuver is already executing; concurrent invocations are rejected.
    AlreadyRunning,
    /// Rear clearance at entry was below the minimum safe distance.
    RearBlocked,
    /// Neither side band offers enough room to turn.
    NoTurningSpace,
    /// Cooperative shutdown was requested mid-maneuver.
    ShutdownRequested,
}

/// Result of one maneuver invocation. Failure is an outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManeuverOutcome {
    Completed { side: TurnSide },
    Aborted(AbortReason),
}

/// Multi-phase reverse/advance state machine.
pub struct RecoveryManeuver {
    config: RecoveryConfig,
    in_progress: AtomicBool,
    state: Mutex<ManeuverState>,
}

impl RecoveryManeuver {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            in_progress: AtomicBool::new(false),
            state: Mutex::new(ManeuverState::Idle),
        }
    }

    /// Current phase, observable from other threads.
    pub fn state(&self) -> ManeuverState {
        *self.state.lock()
    }

    /// Pick the turn side by comparing mean clearance in the two side bands.
    pub fn choose_side(&self, field: &AngularDistanceField) -> TurnSide {
        let left = field.band_mean(
            self.config.left_band_from_deg,
            self.config.left_band_to_deg,
        );
        let right = field.band_mean(
            self.config.right_band_from_deg,
            self.config.right_band_to_deg,
        );
        if left >= right {
            TurnSide::Left
        } else {
            TurnSide::Right
        }
    }

    /// Run the maneuver to a terminal state.
    ///
    /// Preconditions are checked before any drive command is issued; a
    /// failed precondition aborts with no motion. An unavailable rear
    /// sensor is treated as clear (the wall-clock bounds still apply).
    pub fn execute(
        &self,
        field: &AngularDistanceField,
        rear: &mut dyn RearRangeSensor,
        steering: &mut dyn SteeringActuator,
        drive: &mut dyn DriveActuator,
        perception: &SharedPerceptionState,
        shutdown: &AtomicBool,
    ) -> Result<ManeuverOutcome> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("Recovery: invocation rejected, maneuver already running");
            return Ok(ManeuverOutcome::Aborted(AbortReason::AlreadyRunning));
        }
        let result = self.run_phases(field, rear, steering, drive, perception, shutdown);
        *self.state.lock() = ManeuverState::Idle;
        self.in_progress.store(false, Ordering::Release);
        result
    }

    fn run_phases(
        &self,
        field: &AngularDistanceField,
        rear: &mut dyn RearRangeSensor,
        steering: &mut dyn SteeringActuator,
        drive: &mut dyn DriveActuator,
        perception: &SharedPerceptionState,
        shutdown: &AtomicBool,
    ) -> Result<ManeuverOutcome> {
        let cfg = &self.config;

        // Entry preconditions, evaluated before any motion.
        if let Some(d) = rear.distance_m()? {
            if d < cfg.min_safe_m {
                log::warn!(
                    "Recovery: aborted at entry, rear clearance {:.2} m below safe {:.2} m",
                    d,
                    cfg.min_safe_m
                );
                *self.state.lock() = ManeuverState::Aborted;
                return Ok(ManeuverOutcome::Aborted(AbortReason::RearBlocked));
            }
        }

        let left_mean = field.band_mean(cfg.left_band_from_deg, cfg.left_band_to_deg);
        let right_mean = field.band_mean(cfg.right_band_from_deg, cfg.right_band_to_deg);
        if left_mean < cfg.turning_space_m && right_mean < cfg.turning_space_m {
            log::warn!(
                "Recovery: aborted at entry, no turning space (left {:.2} m, right {:.2} m)",
                left_mean,
                right_mean
            );
            *self.state.lock() = ManeuverState::Aborted;
            return Ok(ManeuverOutcome::Aborted(AbortReason::NoTurningSpace));
        }

        let side = if left_mean >= right_mean {
            TurnSide::Left
        } else {
            TurnSide::Right
        };
        // Clockwise-positive steering: turning left means steering negative.
        let turn_steer = match side {
            TurnSide::Left => -cfg.turn_steering,
            TurnSide::Right => cfg.turn_steering,
        };
        log::info!(
            "Recovery: reversing toward {:?} (left {:.2} m, right {:.2} m)",
            side,
            left_mean,
            right_mean
        );

        // Reversing: back up until the rear stop distance or the hard bound.
        *self.state.lock() = ManeuverState::Reversing;
        steering.set_steering(turn_steer)?;
        drive.set_speed(-cfg.reverse_speed)?;
        let reverse_deadline = Instant::now() + Duration::from_millis(cfg.max_reverse_ms);
        loop {
            if shutdown.load(Ordering::Relaxed) {
                return self.abort_moving(steering, drive);
            }
            match rear.distance_m()? {
                Some(d) if d <= cfg.rear_stop_m => {
                    log::debug!("Recovery: rear stop at {:.2} m", d);
                    break;
                }
                Some(d) if d < cfg.min_safe_m / 2.0 => {
                    // Creep the last stretch rather than aborting.
                    drive.set_speed(-cfg.reverse_speed * 0.5)?;
                }
                _ => {}
            }
            if Instant::now() >= reverse_deadline {
                log::debug!("Recovery: reverse timed out after {} ms", cfg.max_reverse_ms);
                break;
            }
            std::thread::sleep(TICK);
        }

        // Pausing: settle at zero speed before changing direction.
        *self.state.lock() = ManeuverState::Pausing;
        drive.set_speed(0.0)?;
        let pause_deadline = Instant::now() + Duration::from_millis(cfg.pause_ms);
        while Instant::now() < pause_deadline {
            if shutdown.load(Ordering::Relaxed) {
                return self.abort_moving(steering, drive);
            }
            std::thread::sleep(TICK);
        }

        // Advancing: pull forward with mirrored steering.
        *self.state.lock() = ManeuverState::Advancing;
        steering.set_steering(-turn_steer)?;
        drive.set_speed(cfg.advance_speed)?;
        let advance_deadline = Instant::now() + Duration::from_millis(cfg.advance_ms);
        while Instant::now() < advance_deadline {
            if shutdown.load(Ordering::Relaxed) {
                return self.abort_moving(steering, drive);
            }
            // Quick forward scan: slow down near obstacles, keep moving.
            if let Some(snapshot) = perception.latest() {
                if snapshot.field.cone_min(0, 15) < cfg.min_safe_m {
                    drive.set_speed(cfg.advance_speed * 0.5)?;
                }
            }
            std::thread::sleep(TICK);
        }

        // Straightening: neutral steering, nominal cruise.
        *self.state.lock() = ManeuverState::Straightening;
        steering.set_steering(0.0)?;
        drive.set_speed(cfg.cruise_speed)?;

        *self.state.lock() = ManeuverState::Completed;
        log::info!("Recovery: maneuver completed, turned {:?}", side);
        Ok(ManeuverOutcome::Completed { side })
    }

    fn abort_moving(
        &self,
        steering: &mut dyn SteeringActuator,
        drive: &mut dyn DriveActuator,
    ) -> Result<ManeuverOutcome> {
        drive.stop()?;
        steering.stop()?;
        *self.state.lock() = ManeuverState::Aborted;
        log::info!("Recovery: aborted by shutdown request");
        Ok(ManeuverOutcome::Aborted(AbortReason::ShutdownRequested))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::mock::{MockDrive, MockRearSensor, MockSteering};

    fn fast_config() -> RecoveryConfig {
        let mut config = crate::config::NavConfig::track_defaults().recovery;
        config.max_reverse_ms = 80;
        config.pause_ms = 20;
        config.advance_ms = 40;
        config
    }

    fn open_field() -> AngularDistanceField {
        AngularDistanceField::filled(3.0)
    }

    #[test]
    fn test_rear_blocked_entry_issues_no_commands() {
        let maneuver = RecoveryManeuver::new(fast_config());
        let mut rear = MockRearSensor::with_reading(Some(0.2));
        let mut steering = MockSteering::new();
        let mut drive = MockDrive::new();
        let perception = SharedPerceptionState::new();
        let shutdown = AtomicBool::new(false);

        let outcome = maneuver
            .execute(
                &open_field(),
                &mut rear,
                &mut steering,
                &mut drive,
                &perception,
                &shutdown,
            )
            .unwrap();

        assert_eq!(outcome, ManeuverOutcome::Aborted(AbortReason::RearBlocked));
        assert_eq!(drive.command_count(), 0);
        assert!(steering.history().is_empty());
        assert_eq!(maneuver.state(), ManeuverState::Idle);
    }

    #[test]
    fn test_no_turning_space_aborts() {
        let maneuver = RecoveryManeuver::new(fast_config());
        let mut rear = MockRearSensor::with_reading(Some(2.0));
        let mut steering = MockSteering::new();
        let mut drive = MockDrive::new();
        let perception = SharedPerceptionState::new();
        let shutdown = AtomicBool::new(false);

        let outcome = maneuver
            .execute(
                &AngularDistanceField::filled(0.1),
                &mut rear,
                &mut steering,
                &mut drive,
                &perception,
                &shutdown,
            )
            .unwrap();

        assert_eq!(
            outcome,
            ManeuverOutcome::Aborted(AbortReason::NoTurningSpace)
        );
        assert_eq!(drive.command_count(), 0);
    }

    #[test]
    fn test_chooses_more_open_side() {
        let maneuver = RecoveryManeuver::new(fast_config());
        let mut field = AngularDistanceField::new();
        let config = fast_config();
        for deg in config.left_band_from_deg..=config.left_band_to_deg {
            field.set(deg, 2.0);
        }
        for deg in config.right_band_from_deg..=config.right_band_to_deg {
            field.set(deg, 0.5);
        }
        assert_eq!(maneuver.choose_side(&field), TurnSide::Left);
    }

    #[test]
    fn test_full_sequence_reverses_then_advances() {
        let maneuver = RecoveryManeuver::new(fast_config());
        let mut rear = MockRearSensor::with_reading(Some(2.0));
        let mut steering = MockSteering::new();
        let mut drive = MockDrive::new();
        let perception = SharedPerceptionState::new();
        let shutdown = AtomicBool::new(false);

        let outcome = maneuver
            .execute(
                &open_field(),
                &mut rear,
                &mut steering,
                &mut drive,
                &perception,
                &shutdown,
            )
            .unwrap();

        assert!(matches!(outcome, ManeuverOutcome::Completed { .. }));
        let history = drive.history();
        assert!(history[0] < 0.0, "starts reversing: {history:?}");
        assert!(history.contains(&0.0), "pauses at zero: {history:?}");
        assert!(
            *history.last().unwrap() > 0.0,
            "ends at cruise: {history:?}"
        );
        // Advancing steering mirrors the reversing steering.
        let steer = steering.history();
        assert_eq!(steer[0], -steer[1]);
        assert_eq!(*steer.last().unwrap(), 0.0);
        assert_eq!(maneuver.state(), ManeuverState::Idle);
    }

    #[test]
    fn test_rear_stop_ends_reversing_early() {
        let maneuver = RecoveryManeuver::new(fast_config());
        let rear = MockRearSensor::new();
        rear.push(Some(2.0)); // entry check
        rear.push(Some(0.05)); // at rear stop distance
        let mut rear_handle = rear;
        let mut steering = MockSteering::new();
        let mut drive = MockDrive::new();
        let perception = SharedPerceptionState::new();
        let shutdown = AtomicBool::new(false);

        let started = Instant::now();
        let outcome = maneuver
            .execute(
                &open_field(),
                &mut rear_handle,
                &mut steering,
                &mut drive,
                &perception,
                &shutdown,
            )
            .unwrap();

        assert!(matches!(outcome, ManeuverOutcome::Completed { .. }));
        // Reversing exited on the rear reading, well before its 80 ms bound.
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn test_reversing_creeps_before_rear_stop() {
        let maneuver = RecoveryManeuver::new(fast_config());
        let config = fast_config();
        let rear = MockRearSensor::new();
        rear.push(Some(2.0)); // entry check
        rear.push(Some(0.13)); // inside the creep band, above the stop
        rear.push(Some(0.08)); // at rear stop distance
        let mut rear_handle = rear;
        let mut steering = MockSteering::new();
        let mut drive = MockDrive::new();
        let perception = SharedPerceptionState::new();
        let shutdown = AtomicBool::new(false);

        let outcome = maneuver
            .execute(
                &open_field(),
                &mut rear_handle,
                &mut steering,
                &mut drive,
                &perception,
                &shutdown,
            )
            .unwrap();

        assert!(matches!(outcome, ManeuverOutcome::Completed { .. }));
        let history = drive.history();
        assert_eq!(history[0], -config.reverse_speed);
        assert!(
            history.contains(&(-config.reverse_speed * 0.5)),
            "no creep speed issued: {history:?}"
        );
    }

    #[test]
    fn test_concurrent_invocation_rejected() {
        let maneuver = std::sync::Arc::new(RecoveryManeuver::new({
            let mut config = fast_config();
            config.max_reverse_ms = 300;
            config
        }));
        let shutdown = std::sync::Arc::new(AtomicBool::new(false));

        let first = {
            let maneuver = std::sync::Arc::clone(&maneuver);
            let shutdown = std::sync::Arc::clone(&shutdown);
            std::thread::spawn(move || {
                let mut rear = MockRearSensor::with_reading(Some(5.0));
                let mut steering = MockSteering::new();
                let mut drive = MockDrive::new();
                let perception = SharedPerceptionState::new();
                maneuver
                    .execute(
                        &AngularDistanceField::filled(3.0),
                        &mut rear,
                        &mut steering,
                        &mut drive,
                        &perception,
                        &shutdown,
                    )
                    .unwrap()
            })
        };

        std::thread::sleep(Duration::from_millis(60));
        let mut rear = MockRearSensor::with_reading(Some(5.0));
        let mut steering = MockSteering::new();
        let mut drive = MockDrive::new();
        let perception = SharedPerceptionState::new();
        let second = maneuver
            .execute(
                &AngularDistanceField::filled(3.0),
                &mut rear,
                &mut steering,
                &mut drive,
                &perception,
                &shutdown,
            )
            .unwrap();

        assert_eq!(
            second,
            ManeuverOutcome::Aborted(AbortReason::AlreadyRunning)
        );
        assert!(matches!(
            first.join().unwrap(),
            ManeuverOutcome::Completed { .. }
        ));
    }
}
