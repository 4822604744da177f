//! Piecewise-linear lookup tables for the control laws.

use crate::error::{Error, Result};

/// Monotone piecewise-linear interpolation table.
///
/// Lookup finds the first anchor whose abscissa exceeds the input and
/// interpolates against the previous one; inputs beyond the table clamp to
/// the end values.
#[derive(Debug, Clone)]
pub struct PiecewiseTable {
    xs: Vec<f32>,
    ys: Vec<f32>,
}

impl PiecewiseTable {
    /// Build from anchor pairs. Abscissae must be strictly increasing;
    /// `NavConfig::validate` enforces this at startup, so a violation here
    /// is a programming error surfaced as `InvalidParameter`.
    pub fn new(xs: Vec<f32>, ys: Vec<f32>) -> Result<Self> {
        if xs.len() < 2 || xs.len() != ys.len() {
            return Err(Error::InvalidParameter(
                "piecewise table needs >= 2 anchors of equal length".to_string(),
            ));
        }
        if !xs.windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::InvalidParameter(
                "piecewise table abscissae must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { xs, ys })
    }

    pub fn lookup(&self, x: f32) -> f32 {
        if x <= self.xs[0] {
            return self.ys[0];
        }
        for i in 1..self.xs.len() {
            if self.xs[i] > x {
                let t = (x - self.xs[i - 1]) / (self.xs[i] - self.xs[i - 1]);
                return self.ys[i - 1] + t * (self.ys[i] - self.ys[i - 1]);
            }
        }
        *self.ys.last().expect("table is non-empty")
    }
}
