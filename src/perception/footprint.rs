//! Vehicle footprint profile and clearance shrinking.
//!
//! Raw range readings measure distance from the sensor center; what the
//! control laws need is distance from the vehicle body. The profile is the
//! per-heading distance from the rotation center to the rectangular body
//! boundary, computed once at startup and subtracted from live readings.

use crate::config::FootprintConfig;
use crate::core::field::{AngularDistanceField, DEGREES};

/// Per-degree distance from the rotation center to the body boundary.
#[derive(Debug, Clone)]
pub struct FootprintProfile {
    profile: AngularDistanceField,
}

impl FootprintProfile {
    /// Compute the profile for a rectangle `[-w, w] x [-rear, front]`,
    /// heading 0 pointing at the front edge, clockwise positive.
    ///
    /// For each integer degree the ray from the center is intersected with
    /// the rectangle boundary; the minimal positive exit parameter is the
    /// profile value. A degenerate heading (no finite exit) records 0.
    pub fn new(config: &FootprintConfig) -> Self {
        let w = config.half_width_m;
        let front = config.front_half_length_m;
        let rear = config.rear_half_length_m;

        let mut profile = AngularDistanceField::new();
        for deg in 0..DEGREES {
            let theta = (deg as f32).to_radians();
            // Clockwise-positive heading: x grows to the right of forward.
            let dx = theta.sin();
            let dy = theta.cos();

            let t_side = if dx.abs() > f32::EPSILON {
                w / dx.abs()
            } else {
                f32::INFINITY
            };
            let t_cap = if dy > f32::EPSILON {
                front / dy
            } else if dy < -f32::EPSILON {
                rear / -dy
            } else {
                f32::INFINITY
            };

            let t = t_side.min(t_cap);
            if t.is_finite() && t > 0.0 {
                profile.set(deg as i32, t);
            }
        }

        Self { profile }
    }

    /// Profile value at a heading.
    pub fn at(&self, degree: i32) -> f32 {
        self.profile.at(degree)
    }

    /// Subtract the profile from a live field, elementwise.
    ///
    /// Unknown slots (0) stay unknown, and the result clamps at zero; a
    /// reading inside the body never wraps into a large positive clearance.
    pub fn shrink(&self, field: &AngularDistanceField) -> AngularDistanceField {
        let mut out = AngularDistanceField::new();
        for deg in 0..DEGREES as i32 {
            let raw = field.at(deg);
            if raw > 0.0 {
                out.set(deg, (raw - self.profile.at(deg)).max(0.0));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_config() -> FootprintConfig {
        FootprintConfig {
            half_width_m: 0.1,
            front_half_length_m: 0.1,
            rear_half_length_m: 0.1,
        }
    }

    #[test]
    fn test_cardinal_headings() {
        let profile = FootprintProfile::new(&square_config());
        assert!((profile.at(0) - 0.1).abs() < 1e-5);
        assert!((profile.at(90) - 0.1).abs() < 1e-5);
        assert!((profile.at(180) - 0.1).abs() < 1e-5);
        assert!((profile.at(270) - 0.1).abs() < 1e-5);
        // Diagonal reaches the corner.
        let corner = (0.1f32 * 0.1 * 2.0).sqrt();
        assert!((profile.at(45) - corner).abs() < 1e-4);
    }

    #[test]
    fn test_left_right_symmetry() {
        let profile = FootprintProfile::new(&square_config());
        for deg in 1..180 {
            assert!(
                (profile.at(deg) - profile.at(360 - deg)).abs() < 1e-4,
                "asymmetric at {deg}"
            );
        }
    }

    #[test]
    fn test_front_rear_asymmetry() {
        let config = FootprintConfig {
            half_width_m: 0.1,
            front_half_length_m: 0.2,
            rear_half_length_m: 0.1,
        };
        let profile = FootprintProfile::new(&config);
        assert!((profile.at(0) - 0.2).abs() < 1e-5);
        assert!((profile.at(180) - 0.1).abs() < 1e-5);
        assert!(profile.at(10) > profile.at(170));
    }

    #[test]
    fn test_shrink_never_negative_or_fabricated() {
        let profile = FootprintProfile::new(&square_config());
        let mut field = AngularDistanceField::new();
        field.set(0, 0.05); // inside the body
        field.set(90, 2.0);
        // slot 180 stays unknown

        let shrunk = profile.shrink(&field);
        assert_eq!(shrunk.at(0), 0.0);
        assert!((shrunk.at(90) - 1.9).abs() < 1e-5);
        assert_eq!(shrunk.at(180), 0.0);
        for deg in 0..DEGREES as i32 {
            assert!(shrunk.at(deg) >= 0.0);
        }
    }
}
