//! Steering law: filtered window -> bounded steering command.

use crate::config::SteeringConfig;
use crate::control::table::PiecewiseTable;
use crate::core::field::AngularDistanceField;
use crate::error::Result;
use crate::perception::FilteredWindow;

/// Outcome of one steering computation.
#[derive(Debug, Clone, Copy)]
pub struct SteeringDecision {
    /// Heading of the most open filtered slot (degrees from forward).
    pub target_deg: i32,
    /// Target after corner-avoidance correction, wrapped to (-180, 180].
    pub corrected_deg: f32,
    /// Bounded steering command in law units (sign follows heading).
    pub steering: f32,
}

/// Converts a target direction plus corner-avoidance into steering.
#[derive(Debug)]
pub struct SteeringLaw {
    table: PiecewiseTable,
    min_safe_m: f32,
    max_scan_deg: i32,
    avoid_scale: f32,
}

impl SteeringLaw {
    pub fn new(config: &SteeringConfig) -> Result<Self> {
        Ok(Self {
            table: PiecewiseTable::new(
                config.table_angles_deg.clone(),
                config.table_steering.clone(),
            )?,
            min_safe_m: config.min_safe_m,
            max_scan_deg: config.max_scan_deg,
            avoid_scale: config.avoid_scale,
        })
    }

    /// Compute steering from the filtered window and the shrunk field.
    ///
    /// The window picks the target; the correction scan runs on the
    /// unfiltered shrunk field so a sharp corner is not smoothed away.
    pub fn compute(
        &self,
        window: &FilteredWindow,
        shrunk: &AngularDistanceField,
    ) -> SteeringDecision {
        let target_deg = most_open_heading(window);
        let correction = self.corner_correction(target_deg, shrunk);
        let corrected_deg = wrap_half(target_deg as f32 + correction);

        let magnitude = self.table.lookup(corrected_deg.abs());
        let steering = magnitude.copysign(corrected_deg);

        SteeringDecision {
            target_deg,
            corrected_deg,
            steering,
        }
    }

    /// Table lookup with sign reapplied (testing hook for odd symmetry).
    pub fn steer_for_angle(&self, angle_deg: f32) -> f32 {
        self.table.lookup(angle_deg.abs()).copysign(angle_deg)
    }

    /// Scan outward from the target and bias away from the side that drops
    /// below the safe distance first. Equal trigger offsets cancel out —
    /// preserved source behavior, see DESIGN.md.
    fn corner_correction(&self, target_deg: i32, shrunk: &AngularDistanceField) -> f32 {
        let mut left_trigger: Option<i32> = None;
        let mut right_trigger: Option<i32> = None;

        for off in 1..=self.max_scan_deg {
            if left_trigger.is_none() && shrunk.at(target_deg - off) < self.min_safe_m {
                left_trigger = Some(off);
            }
            if right_trigger.is_none() && shrunk.at(target_deg + off) < self.min_safe_m {
                right_trigger = Some(off);
            }
            if left_trigger.is_some() && right_trigger.is_some() {
                break;
            }
        }

        match (left_trigger, right_trigger) {
            (Some(l), Some(r)) if l == r => 0.0,
            (Some(l), Some(r)) if l < r => self.avoid_scale * (self.max_scan_deg - l) as f32,
            (Some(_), Some(r)) => -self.avoid_scale * (self.max_scan_deg - r) as f32,
            (Some(l), None) => self.avoid_scale * (self.max_scan_deg - l) as f32,
            (None, Some(r)) => -self.avoid_scale * (self.max_scan_deg - r) as f32,
            (None, None) => 0.0,
        }
    }
}

/// A side heading must be this much deeper than the more central candidate
/// to displace it. The footprint shrink leaves sideways slots slightly
/// deeper than forward on open ground (the body is narrower than it is
/// long), and that spread must not read as a turn command.
const CENTER_HOLD_M: f32 = 0.15;

/// Heading of the most open filtered slot, biased toward the window center:
/// candidates are visited center-out and only win by a clear margin, so a
/// flat or near-flat window steers straight.
fn most_open_heading(window: &FilteredWindow) -> i32 {
    let mut order: Vec<usize> = (0..window.angles.len()).collect();
    order.sort_by_key(|&i| (window.angles[i].abs(), window.angles[i]));

    let mut best_idx = order[0];
    for &i in &order[1..] {
        if window.distances[i] > window.distances[best_idx] + CENTER_HOLD_M {
            best_idx = i;
        }
    }
    window.angles[best_idx]
}

/// Wrap an angle into (-180, 180].
fn wrap_half(deg: f32) -> f32 {
    let mut a = deg % 360.0;
    if a <= -180.0 {
        a += 360.0;
    } else if a > 180.0 {
        a -= 360.0;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NavConfig;

    fn law() -> SteeringLaw {
        SteeringLaw::new(&NavConfig::track_defaults().steering).unwrap()
    }

    fn flat_window(value: f32) -> FilteredWindow {
        FilteredWindow {
            distances: vec![value; 180],
            angles: (-90..90).collect(),
        }
    }

    #[test]
    fn test_odd_symmetry() {
        let law = law();
        for x in [0.0f32, 5.0, 15.0, 33.0, 49.0, 80.0] {
            assert!(
                (law.steer_for_angle(-x) + law.steer_for_angle(x)).abs() < 1e-5,
                "not odd at {x}"
            );
        }
    }

    #[test]
    fn test_flat_window_steers_straight() {
        let law = law();
        let shrunk = AngularDistanceField::filled(3.0);
        let decision = law.compute(&flat_window(2.0), &shrunk);
        assert_eq!(decision.target_deg, 0);
        assert_eq!(decision.steering, 0.0);
    }

    #[test]
    fn test_all_zero_window_is_neutral() {
        let law = law();
        let shrunk = AngularDistanceField::new();
        let decision = law.compute(&flat_window(0.0), &shrunk);
        assert_eq!(decision.target_deg, 0);
        // Zero field triggers both avoidance sides at the same offset,
        // which cancels: the command stays centered.
        assert_eq!(decision.steering, 0.0);
    }

    #[test]
    fn test_slightly_deeper_side_does_not_displace_center() {
        let law = law();
        let shrunk = AngularDistanceField::filled(3.0);
        let mut window = flat_window(2.0);
        // Spread on the order of the footprint asymmetry, not a real gap.
        for (i, &angle) in window.angles.clone().iter().enumerate() {
            if angle.abs() > 60 {
                window.distances[i] = 2.05;
            }
        }
        let decision = law.compute(&window, &shrunk);
        assert_eq!(decision.target_deg, 0);
        assert_eq!(decision.steering, 0.0);
    }

    #[test]
    fn test_clearly_deeper_side_wins() {
        let law = law();
        let shrunk = AngularDistanceField::filled(3.0);
        let mut window = flat_window(1.0);
        let idx = window.angles.iter().position(|&a| a == 40).unwrap();
        window.distances[idx] = 3.0;
        let decision = law.compute(&window, &shrunk);
        assert_eq!(decision.target_deg, 40);
        assert!(decision.steering > 0.0);
    }

    #[test]
    fn test_biases_away_from_blocked_side() {
        let law = law();
        let mut shrunk = AngularDistanceField::filled(3.0);
        // Wall close on the left of the target heading.
        for deg in -20..=-3 {
            shrunk.set(deg, 0.2);
        }
        let decision = law.compute(&flat_window(2.0), &shrunk);
        assert!(decision.corrected_deg > 0.0);
        assert!(decision.steering > 0.0);
    }

    #[test]
    fn test_symmetric_walls_cancel() {
        let law = law();
        let mut shrunk = AngularDistanceField::filled(3.0);
        shrunk.set(-5, 0.1);
        shrunk.set(5, 0.1);
        let decision = law.compute(&flat_window(2.0), &shrunk);
        assert_eq!(decision.corrected_deg, 0.0);
    }
}
