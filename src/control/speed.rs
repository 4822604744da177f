//! Speed law: steering magnitude + frontal clearance -> bounded speed.
//!
//! Two policies survive from the source hardware's tuning generations. The
//! angle-decay policy is canonical; the blended table policy is kept
//! selectable because one generation raced noticeably smoother with it on
//! wide tracks. Both shed speed monotonically as steering grows or
//! clearance shrinks.

use crate::config::{SpeedConfig, SpeedPolicy};
use crate::control::table::PiecewiseTable;
use crate::core::field::AngularDistanceField;
use crate::error::Result;

/// Computes the commanded forward speed each cycle.
#[derive(Debug)]
pub struct SpeedLaw {
    policy: SpeedPolicy,
    max_speed: f32,
    min_speed: f32,
    decay_per_deg: f32,
    stop_m: f32,
    slow_m: f32,
    cone_half_deg: i32,
    blend: f32,
    angle_table: PiecewiseTable,
    distance_table: PiecewiseTable,
    hard_stop_m: f32,
}

impl SpeedLaw {
    pub fn new(config: &SpeedConfig) -> Result<Self> {
        Ok(Self {
            policy: config.policy,
            max_speed: config.max_speed,
            min_speed: config.min_speed,
            decay_per_deg: config.decay_per_deg,
            stop_m: config.stop_m,
            slow_m: config.slow_m,
            cone_half_deg: config.cone_half_deg,
            blend: config.blend,
            angle_table: PiecewiseTable::new(
                config.angle_table_deg.clone(),
                config.angle_table_speed.clone(),
            )?,
            distance_table: PiecewiseTable::new(
                config.distance_table_m.clone(),
                config.distance_table_speed.clone(),
            )?,
            hard_stop_m: config.hard_stop_m,
        })
    }

    /// Commanded speed for the current steering and shrunk field.
    ///
    /// Unknown slots inside the forward cone count as zero clearance, so
    /// total sensor loss degrades to a stop rather than blind motion.
    pub fn compute(&self, steering: f32, shrunk: &AngularDistanceField) -> f32 {
        let clearance = shrunk.cone_min(0, self.cone_half_deg);
        match self.policy {
            SpeedPolicy::AngleDecay => self.angle_decay(steering, clearance),
            SpeedPolicy::Blended => self.blended(steering, clearance),
        }
    }

    fn angle_decay(&self, steering: f32, clearance: f32) -> f32 {
        let base = self.max_speed * (-self.decay_per_deg * steering.abs()).exp();
        if clearance <= self.stop_m {
            0.0
        } else if clearance < self.slow_m {
            base * (clearance - self.stop_m) / (self.slow_m - self.stop_m)
        } else {
            base
        }
    }

    fn blended(&self, steering: f32, clearance: f32) -> f32 {
        if clearance < self.hard_stop_m {
            return 0.0;
        }
        let by_angle = self.angle_table.lookup(steering.abs());
        let by_distance = self.distance_table.lookup(clearance);
        let speed = self.blend * by_angle + (1.0 - self.blend) * by_distance;
        speed.clamp(self.min_speed, self.max_speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NavConfig;

    fn law(policy: SpeedPolicy) -> SpeedLaw {
        let mut config = NavConfig::track_defaults().speed;
        config.policy = policy;
        SpeedLaw::new(&config).unwrap()
    }

    #[test]
    fn test_all_zero_field_stops() {
        let field = AngularDistanceField::new();
        assert_eq!(law(SpeedPolicy::AngleDecay).compute(0.0, &field), 0.0);
        assert_eq!(law(SpeedPolicy::Blended).compute(0.0, &field), 0.0);
    }

    #[test]
    fn test_open_field_full_speed_straight() {
        let field = AngularDistanceField::filled(5.0);
        let speed = law(SpeedPolicy::AngleDecay).compute(0.0, &field);
        assert!((speed - 1.6).abs() < 1e-5);
    }

    #[test]
    fn test_monotone_in_steering() {
        let field = AngularDistanceField::filled(5.0);
        for policy in [SpeedPolicy::AngleDecay, SpeedPolicy::Blended] {
            let law = law(policy);
            let mut prev = f32::MAX;
            for steer in [0.0f32, 5.0, 10.0, 20.0, 34.0] {
                let speed = law.compute(steer, &field);
                assert!(speed <= prev + 1e-6, "{policy:?} not monotone at {steer}");
                prev = speed;
            }
        }
    }

    #[test]
    fn test_monotone_in_clearance() {
        for policy in [SpeedPolicy::AngleDecay, SpeedPolicy::Blended] {
            let law = law(policy);
            let mut prev = 0.0f32;
            for clearance in [0.1f32, 0.3, 0.6, 1.0, 2.0, 4.0] {
                let field = AngularDistanceField::filled(clearance);
                let speed = law.compute(0.0, &field);
                assert!(speed >= prev - 1e-6, "{policy:?} not monotone at {clearance}");
                prev = speed;
            }
        }
    }

    #[test]
    fn test_bounded_output() {
        let config = NavConfig::track_defaults().speed;
        for policy in [SpeedPolicy::AngleDecay, SpeedPolicy::Blended] {
            let law = law(policy);
            for clearance in [0.0f32, 0.2, 0.5, 1.0, 10.0] {
                let field = AngularDistanceField::filled(clearance);
                for steer in [0.0f32, 10.0, 34.0, 90.0] {
                    let speed = law.compute(steer, &field);
                    assert!(
                        speed == 0.0
                            || (speed >= 0.0 && speed <= config.max_speed + 1e-6),
                        "{policy:?} out of bounds: {speed}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_stop_distance_gate() {
        let law = law(SpeedPolicy::AngleDecay);
        let field = AngularDistanceField::filled(0.2);
        assert_eq!(law.compute(0.0, &field), 0.0);

        let field = AngularDistanceField::filled(0.6);
        let gated = law.compute(0.0, &field);
        assert!(gated > 0.0 && gated < 1.6);
    }
}
