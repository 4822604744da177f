//! Directional smoothing filter for target-gap selection.
//!
//! Picking the single farthest reading is unstable: two symmetric gaps make
//! the target flip side to side. The filter convolves the shrunk field with
//! a kernel whose central band is boosted, so straight-ahead openings win
//! over equally-deep openings off to the side, then cuts the result down to
//! the forward field-of-view window.

use crate::config::FilterConfig;
use crate::core::field::{AngularDistanceField, DEGREES};

/// Filter output: distances and their headings relative to forward,
/// aligned index-for-index.
#[derive(Debug, Clone)]
pub struct FilteredWindow {
    /// Smoothed clearance per window slot (meters).
    pub distances: Vec<f32>,
    /// Heading of each slot relative to forward (degrees, clockwise).
    pub angles: Vec<i32>,
}

/// Forward-biased smoothing filter.
#[derive(Debug, Clone)]
pub struct DirectionalFilter {
    kernel: Vec<f32>,
    window_deg: usize,
    forward_deg: i32,
}

impl DirectionalFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            kernel: build_kernel(
                config.kernel_deg as usize,
                config.center_band_deg as usize,
                config.center_boost,
            ),
            window_deg: config.window_deg as usize,
            forward_deg: config.forward_deg,
        }
    }

    /// Smooth the field and truncate to the field-of-view window.
    ///
    /// The output always has exactly `window_deg` slots; angles run from
    /// `-window/2` up to `window/2` (exclusive), clockwise positive.
    /// Kernel taps beyond the window edges read zero, so edge headings are
    /// attenuated even when the input was never field-of-view masked.
    pub fn apply(&self, field: &AngularDistanceField) -> FilteredWindow {
        // Re-center so the configured forward heading sits at index 180 of
        // the working buffer, putting the whole window in contiguous slots.
        let center = (DEGREES / 2) as i32;
        let recentered = field.rotated(self.forward_deg - center);

        let half_kernel = (self.kernel.len() / 2) as i32;
        let half_window = (self.window_deg / 2) as i32;
        let window_lo = center - half_window;
        let window_hi = center + self.window_deg as i32 - half_window;

        let mut distances = Vec::with_capacity(self.window_deg);
        let mut angles = Vec::with_capacity(self.window_deg);

        for rel in -half_window..(self.window_deg as i32 - half_window) {
            let i = center + rel;
            let mut acc = 0.0;
            for (k, weight) in self.kernel.iter().enumerate() {
                let j = i + k as i32 - half_kernel;
                if (window_lo..window_hi).contains(&j) {
                    acc += weight * recentered.at(j);
                }
            }
            distances.push(acc);
            angles.push(rel);
        }

        FilteredWindow { distances, angles }
    }

    /// Kernel weights (testing hook).
    pub fn kernel(&self) -> &[f32] {
        &self.kernel
    }
}

/// Uniform kernel with a boosted central band, normalized to sum 1.
fn build_kernel(length: usize, band_half_deg: usize, boost: f32) -> Vec<f32> {
    let half = length / 2;
    let mut kernel: Vec<f32> = (0..length)
        .map(|i| {
            let offset = (i as i32 - half as i32).unsigned_abs() as usize;
            if offset <= band_half_deg { boost } else { 1.0 }
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NavConfig;

    fn filter() -> DirectionalFilter {
        DirectionalFilter::new(&NavConfig::track_defaults().filter)
    }

    #[test]
    fn test_kernel_sums_to_one() {
        let f = filter();
        let sum: f32 = f.kernel().iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_kernel_center_boosted() {
        let f = filter();
        let kernel = f.kernel();
        let mid = kernel.len() / 2;
        assert!(kernel[mid] > kernel[0]);
        assert!((kernel[0] - kernel[kernel.len() - 1]).abs() < 1e-7);
    }

    #[test]
    fn test_output_length_matches_window() {
        let f = filter();
        let window = f.apply(&AngularDistanceField::filled(2.0));
        assert_eq!(window.distances.len(), 180);
        assert_eq!(window.angles.len(), 180);
        assert_eq!(window.angles[0], -90);
        assert_eq!(*window.angles.last().unwrap(), 89);
    }

    #[test]
    fn test_uniform_field_stays_flat_in_center() {
        let f = filter();
        let window = f.apply(&AngularDistanceField::filled(2.0));
        // Away from the zero-padded edges the smoothed value is unchanged.
        let center = window.distances.len() / 2;
        assert!((window.distances[center] - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_unmasked_field_edges_attenuated() {
        // No field-of-view mask upstream: the window edges must still be
        // attenuated so a hard-over heading never looks artificially open.
        let f = filter();
        let window = f.apply(&AngularDistanceField::filled(2.0));
        let center = window.distances.len() / 2;
        assert!(window.distances[0] < window.distances[center]);
        assert!(*window.distances.last().unwrap() < window.distances[center]);
    }

    #[test]
    fn test_dip_suppresses_forward() {
        let mut field = AngularDistanceField::filled(3.0);
        field.set(0, 0.3);
        let f = filter();
        let window = f.apply(&field);
        let center = window.distances.len() / 2;
        // The forward slot averages in the dip; slots whose kernel misses it
        // keep the full clearance.
        assert!(window.distances[center] < window.distances[center + 30]);
    }
}
