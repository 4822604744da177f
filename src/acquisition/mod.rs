//! Range acquisition loop.
//!
//! Runs on its own thread, faster than the control loop: ingests packet
//! batches from the range transport, maintains a rolling per-degree buffer,
//! applies heading alignment, gap filling, field-of-view and timeout masks,
//! and publishes immutable snapshots into the shared perception state.
//!
//! Transport faults never leave this module: framing errors get a bounded
//! number of input-buffer resets, then a stop/disconnect/reconnect cycle
//! with backoff. The control loop only ever sees a stale or zeroed field.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::AcquisitionConfig;
use crate::core::field::{AngularDistanceField, DEGREES};
use crate::core::snapshot::SharedPerceptionState;
use crate::drivers::{RangePacket, RangeTransport};
use crate::error::Result;

/// Sleep when the transport had nothing buffered.
const IDLE_SLEEP: Duration = Duration::from_millis(5);

/// Shared batch/error counters for the statistics log.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionStats {
    batches: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
}

impl AcquisitionStats {
    /// (batches processed, transport errors).
    pub fn get(&self) -> (u64, u64) {
        (
            self.batches.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed),
        )
    }
}

/// The acquisition loop and its rolling per-degree buffer.
pub struct RangeAcquisition {
    transport: Box<dyn RangeTransport>,
    perception: Arc<SharedPerceptionState>,
    config: AcquisitionConfig,
    /// Latest distance per sensor-frame degree (meters, 0 = no return).
    distances: [f32; DEGREES],
    /// Last-write time per sensor-frame degree.
    stamps: [Option<Instant>; DEGREES],
    stats: AcquisitionStats,
}

impl RangeAcquisition {
    pub fn new(
        transport: Box<dyn RangeTransport>,
        perception: Arc<SharedPerceptionState>,
        config: AcquisitionConfig,
    ) -> Self {
        Self {
            transport,
            perception,
            config,
            distances: [0.0; DEGREES],
            stamps: [None; DEGREES],
            stats: AcquisitionStats::default(),
        }
    }

    /// Handle to the batch/error counters.
    pub fn stats(&self) -> AcquisitionStats {
        self.stats.clone()
    }

    /// Run until the shutdown flag is set.
    ///
    /// The transport is stopped and disconnected before this returns, on
    /// every path including errors.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        let result = self
            .transport
            .connect()
            .and_then(|_| self.transport.start())
            .and_then(|_| self.run_inner(shutdown));
        self.release();
        result
    }

    fn run_inner(&mut self, shutdown: &AtomicBool) -> Result<()> {
        let mut resets = 0u32;

        while !shutdown.load(Ordering::Relaxed) {
            match self.transport.read_batch() {
                Ok(batch) => {
                    resets = 0;
                    let now = Instant::now();
                    let idle = batch.is_empty();
                    self.ingest(&batch, now);
                    let field = self.compose(now);
                    self.perception.publish(field, now);
                    self.stats.batches.fetch_add(1, Ordering::Relaxed);
                    if idle {
                        std::thread::sleep(IDLE_SLEEP);
                    }
                }
                Err(e) => {
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    log::warn!("Acquisition: transport error: {e}");

                    if resets < self.config.max_input_resets
                        && self.transport.reset_input().is_ok()
                    {
                        resets += 1;
                        continue;
                    }

                    // Persistent fault: tear the connection down and reopen
                    // after a backoff.
                    let _ = self.transport.stop();
                    let _ = self.transport.disconnect();
                    log::warn!(
                        "Acquisition: reconnecting after {} ms backoff",
                        self.config.reconnect_backoff_ms
                    );
                    self.sleep_checked(
                        Duration::from_millis(self.config.reconnect_backoff_ms),
                        shutdown,
                    );
                    if shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    match self.transport.connect().and_then(|_| self.transport.start()) {
                        Ok(()) => {
                            resets = 0;
                            log::info!("Acquisition: transport reconnected");
                        }
                        Err(e) => {
                            // Next read_batch fails and we land back here.
                            resets = self.config.max_input_resets;
                            log::error!("Acquisition: reconnect failed: {e}");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Sleep in short ticks so a shutdown request interrupts the backoff.
    fn sleep_checked(&self, duration: Duration, shutdown: &AtomicBool) {
        let deadline = Instant::now() + duration;
        while !shutdown.load(Ordering::Relaxed) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(remaining.min(IDLE_SLEEP));
        }
    }

    /// Stop acquisition hardware, exactly once per run, errors logged.
    fn release(&mut self) {
        if let Err(e) = self.transport.stop() {
            log::error!("Acquisition: stop failed during release: {e}");
        }
        if let Err(e) = self.transport.disconnect() {
            log::error!("Acquisition: disconnect failed during release: {e}");
        }
        log::info!("Acquisition: transport released");
    }

    /// Write a packet batch into the sensor-frame rolling buffer.
    fn ingest(&mut self, batch: &[RangePacket], now: Instant) {
        for packet in batch {
            let idx = AngularDistanceField::wrap(packet.angle_deg.round() as i32);
            self.distances[idx] = packet.distance_mm / 1000.0;
            self.stamps[idx] = Some(now);
        }
    }

    /// Build the published field: heading-align, gap-fill, mask.
    fn compose(&mut self, now: Instant) -> AngularDistanceField {
        let offset = self.config.heading_offset_deg;
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let half_fov = (self.config.fov_deg / 2) as i32;

        // Heading alignment: slot 0 of the output is vehicle forward.
        let mut field = AngularDistanceField::new();
        for i in 0..DEGREES as i32 {
            let sensor_idx = AngularDistanceField::wrap(i + offset);
            field.set(i, self.distances[sensor_idx]);
        }

        // Gap fill: propagate the nearest prior non-zero slot forward.
        // Index 0 is deliberately never filled across the wrap. The fill can
        // smear a stale reading across degrees after a long dropout; kept
        // as-is, see DESIGN.md.
        for i in 1..DEGREES as i32 {
            if field.at(i) == 0.0 {
                field.set(i, field.at(i - 1));
            }
        }

        // Field-of-view mask.
        for i in 0..DEGREES as i32 {
            if AngularDistanceField::circular_distance(i, 0) > half_fov {
                field.set(i, 0.0);
            }
        }

        // Timeout mask: expire slots whose own reading is too old. Slots
        // that were never written (gap-filled) have no age to expire.
        for i in 0..DEGREES as i32 {
            let sensor_idx = AngularDistanceField::wrap(i + offset);
            if let Some(stamp) = self.stamps[sensor_idx] {
                if now.duration_since(stamp) > timeout {
                    field.set(i, 0.0);
                    self.stamps[sensor_idx] = None;
                }
            }
        }

        field
    }
}
