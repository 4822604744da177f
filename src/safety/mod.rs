//! Safety monitors and the recovery maneuver.

pub mod orientation;
pub mod recovery;
pub mod stall;

pub use orientation::OrientationGuard;
pub use recovery::{AbortReason, ManeuverOutcome, ManeuverState, RecoveryManeuver, TurnSide};
pub use stall::StallDetector;
