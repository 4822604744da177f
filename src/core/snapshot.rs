//! Single-slot snapshot exchange between acquisition and control.
//!
//! The acquisition loop is the only writer; the control loop (and any
//! diagnostic reader) may read concurrently. Every read returns a complete,
//! fully-formed snapshot. The monotone sequence number lets readers detect
//! "no new data since the one I already processed" without comparing fields.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::core::field::AngularDistanceField;

/// One immutable publication of the perception field.
#[derive(Debug, Clone)]
pub struct PerceptionSnapshot {
    /// The field, already heading-aligned, gap-filled and masked.
    pub field: AngularDistanceField,
    /// When the acquisition loop published this field.
    pub captured_at: Instant,
    /// Monotone publication counter, starting at 1.
    pub seq: u64,
}

/// Concurrency-safe single-slot store for the latest snapshot.
///
/// Snapshots are superseded, never mutated: the writer swaps in a new
/// `Arc<PerceptionSnapshot>` and readers keep whatever they already cloned.
#[derive(Debug, Default)]
pub struct SharedPerceptionState {
    slot: Mutex<Option<Arc<PerceptionSnapshot>>>,
}

impl SharedPerceptionState {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Publish a new field. Called only by the acquisition loop.
    pub fn publish(&self, field: AngularDistanceField, captured_at: Instant) {
        let mut slot = self.slot.lock();
        let seq = slot.as_ref().map_or(0, |s| s.seq) + 1;
        *slot = Some(Arc::new(PerceptionSnapshot {
            field,
            captured_at,
            seq,
        }));
    }

    /// Latest snapshot, if anything has been published yet.
    pub fn latest(&self) -> Option<Arc<PerceptionSnapshot>> {
        self.slot.lock().clone()
    }

    /// Latest snapshot only if it is newer than `seq`.
    ///
    /// Returning `None` here is the normal "no new data" case, not an error.
    pub fn latest_after(&self, seq: u64) -> Option<Arc<PerceptionSnapshot>> {
        let slot = self.slot.lock();
        match slot.as_ref() {
            Some(s) if s.seq > seq => Some(Arc::clone(s)),
            _ => None,
        }
    }
}
