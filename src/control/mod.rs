//! Steering and speed laws, and the control loop that applies them.

pub mod pilot;
pub mod speed;
pub mod steering;
pub mod table;

pub use pilot::{CycleOutcome, Pilot, PilotIo};
pub use speed::SpeedLaw;
pub use steering::{SteeringDecision, SteeringLaw};
pub use table::PiecewiseTable;
