//! Orientation-reversal detection from forward camera cues.
//!
//! The track boundaries are painted in two colors, one per side. When the
//! vehicle faces the right way the left-boundary color sits left of the
//! right-boundary color in the camera frame; if their horizontal order is
//! swapped, the vehicle is pointed backward.

use crate::drivers::BoundaryCues;

/// Coarse backward-facing detector.
#[derive(Debug, Default)]
pub struct OrientationGuard;

impl OrientationGuard {
    pub fn new() -> Self {
        Self
    }

    /// True only when both cues are present and their order is swapped.
    ///
    /// A missing cue means "not reversed": losing the camera must not
    /// trigger a U-turn.
    pub fn is_reversed(&self, cues: &BoundaryCues) -> bool {
        match (cues.left_x, cues.right_x) {
            (Some(left), Some(right)) => left > right,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nominal_order_is_not_reversed() {
        let guard = OrientationGuard::new();
        let cues = BoundaryCues {
            left_x: Some(80.0),
            right_x: Some(240.0),
        };
        assert!(!guard.is_reversed(&cues));
    }

    #[test]
    fn test_swapped_order_is_reversed() {
        let guard = OrientationGuard::new();
        let cues = BoundaryCues {
            left_x: Some(240.0),
            right_x: Some(80.0),
        };
        assert!(guard.is_reversed(&cues));
    }

    #[test]
    fn test_missing_cue_fails_safe() {
        let guard = OrientationGuard::new();
        assert!(!guard.is_reversed(&BoundaryCues {
            left_x: None,
            right_x: Some(100.0),
        }));
        assert!(!guard.is_reversed(&BoundaryCues {
            left_x: Some(100.0),
            right_x: None,
        }));
        assert!(!guard.is_reversed(&BoundaryCues::default()));
    }
}
