//! ratha-nav - autonomous navigation core for a small wheeled vehicle.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  app / main                         │  ← Daemon
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌──────────────────────┐   ┌──────────────────────────┐
//! │     acquisition/     │   │        control/          │  ← Loops
//! │  (range ingest loop) │   │ (pilot, steering, speed) │
//! └──────────────────────┘   └──────────────────────────┘
//!            │                           │
//! ┌─────────────────────────────────────────────────────┐
//! │              perception/   safety/                  │  ← Pipeline stages
//! │   (footprint, filter, recovery, stall, guard)       │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │          core/   drivers/   transport/              │  ← Foundation
//! │  (field, snapshot, device traits, serial links)     │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! The acquisition thread publishes immutable perception snapshots; the
//! control thread consumes the latest snapshot each ~20 Hz cycle and
//! commands the steering and drive actuators. All tuning lives in
//! [`config::NavConfig`].

pub mod acquisition;
pub mod app;
pub mod config;
pub mod control;
pub mod core;
pub mod drivers;
pub mod error;
pub mod perception;
pub mod safety;
pub mod telemetry;
pub mod transport;

pub use crate::config::NavConfig;
pub use crate::control::{CycleOutcome, Pilot, PilotIo};
pub use crate::core::field::{AngularDistanceField, DEGREES};
pub use crate::core::snapshot::{PerceptionSnapshot, SharedPerceptionState};
pub use crate::error::{Error, Result};
