//! Core value types shared across the pipeline.

pub mod field;
pub mod snapshot;

pub use field::{AngularDistanceField, DEGREES};
pub use snapshot::{PerceptionSnapshot, SharedPerceptionState};
