//! Degree-indexed distance field shared by perception and control.

/// Number of heading slots in a full revolution.
pub const DEGREES: usize = 360;

/// A 360-slot field of distances in meters, indexed by integer heading
/// degree, clockwise from vehicle forward.
///
/// Slot value `0.0` is the sentinel for "unknown/expired" and never a real
/// reading. All accessors are wrap-aware: any `i32` degree maps onto
/// `[0, 359]`, so callers never do their own modulo arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub struct AngularDistanceField {
    slots: [f32; DEGREES],
}

impl AngularDistanceField {
    /// Create a field with all slots unknown.
    pub fn new() -> Self {
        Self {
            slots: [0.0; DEGREES],
        }
    }

    /// Create a field with every slot set to `value`.
    pub fn filled(value: f32) -> Self {
        Self {
            slots: [value; DEGREES],
        }
    }

    /// Create a field from a raw slot array.
    pub fn from_slots(slots: [f32; DEGREES]) -> Self {
        Self { slots }
    }

    /// Normalize any degree value onto `[0, 359]`.
    pub fn wrap(degree: i32) -> usize {
        degree.rem_euclid(DEGREES as i32) as usize
    }

    /// Distance at a heading, wrap-aware.
    pub fn at(&self, degree: i32) -> f32 {
        self.slots[Self::wrap(degree)]
    }

    /// Set the distance at a heading, wrap-aware.
    pub fn set(&mut self, degree: i32, value: f32) {
        self.slots[Self::wrap(degree)] = value;
    }

    /// Circular distance in degrees between two headings (0..=180).
    pub fn circular_distance(a: i32, b: i32) -> i32 {
        let d = (Self::wrap(a) as i32 - Self::wrap(b) as i32).abs();
        d.min(DEGREES as i32 - d)
    }

    /// Field rotated so that `self.at(offset)` lands at index 0.
    pub fn rotated(&self, offset: i32) -> Self {
        let mut out = [0.0; DEGREES];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.at(i as i32 + offset);
        }
        Self { slots: out }
    }

    /// Mean distance over an inclusive degree band, counting unknown slots
    /// as zero clearance.
    pub fn band_mean(&self, from: i32, to: i32) -> f32 {
        let span = Self::wrap(to - from) as i32;
        let count = span + 1;
        let mut sum = 0.0;
        for d in 0..count {
            sum += self.at(from + d);
        }
        sum / count as f32
    }

    /// Minimum distance over the cone `[-half_width, +half_width]` around a
    /// heading. Unknown slots count as zero clearance (fail safe).
    pub fn cone_min(&self, center: i32, half_width: i32) -> f32 {
        let mut min = f32::MAX;
        for d in -half_width..=half_width {
            min = min.min(self.at(center + d));
        }
        if min == f32::MAX { 0.0 } else { min }
    }

    /// Raw slot view.
    pub fn slots(&self) -> &[f32; DEGREES] {
        &self.slots
    }
}

impl Default for AngularDistanceField {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_indexing() {
        let mut field = AngularDistanceField::new();
        field.set(-1, 1.5);
        assert_eq!(field.at(359), 1.5);
        assert_eq!(field.at(-361), 1.5);
        field.set(720, 2.5);
        assert_eq!(field.at(0), 2.5);
    }

    #[test]
    fn test_circular_distance() {
        assert_eq!(AngularDistanceField::circular_distance(0, 359), 1);
        assert_eq!(AngularDistanceField::circular_distance(0, 180), 180);
        assert_eq!(AngularDistanceField::circular_distance(10, 350), 20);
        assert_eq!(AngularDistanceField::circular_distance(90, 90), 0);
    }

    #[test]
    fn test_rotated() {
        let mut field = AngularDistanceField::new();
        field.set(10, 3.0);
        let rotated = field.rotated(10);
        assert_eq!(rotated.at(0), 3.0);
        assert_eq!(rotated.at(10), 0.0);
    }

    #[test]
    fn test_band_mean_wraps() {
        let mut field = AngularDistanceField::new();
        field.set(359, 2.0);
        field.set(0, 4.0);
        // Band [359, 0] spans the wrap boundary.
        assert!((field.band_mean(359, 0) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_cone_min_counts_unknown_as_zero() {
        let mut field = AngularDistanceField::filled(3.0);
        field.set(2, 0.0);
        assert_eq!(field.cone_min(0, 5), 0.0);
        assert_eq!(field.cone_min(180, 5), 3.0);
    }
}
