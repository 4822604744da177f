//! Perception stages between the raw field and the control laws.

pub mod filter;
pub mod footprint;

pub use filter::{DirectionalFilter, FilteredWindow};
pub use footprint::FootprintProfile;
