//! Telemetry fan-out.
//!
//! The control loop pushes one record per cycle into a bounded channel;
//! records are dropped when the consumer falls behind. A slow or broken
//! sink can never block or crash the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// One control-cycle summary.
#[derive(Debug, Clone)]
pub struct TelemetryRecord {
    /// Cycle start time.
    pub at: Instant,
    /// Chosen target heading (degrees from forward).
    pub target_deg: i32,
    /// Commanded steering (law units).
    pub steering: f32,
    /// Commanded speed (m/s).
    pub speed_cmd: f32,
    /// Measured vehicle speed (m/s).
    pub measured_mps: f32,
    /// Battery voltage.
    pub battery_v: f32,
    /// Control cycle latency.
    pub loop_latency: Duration,
}

/// Structured log-record consumer. Implementations must never block.
pub trait TelemetrySink: Send {
    fn record(&mut self, record: TelemetryRecord);
}

/// Sink writing into a bounded channel with drop-on-full semantics.
pub struct ChannelSink {
    tx: Sender<TelemetryRecord>,
    dropped: u64,
}

impl ChannelSink {
    /// Create a sink and its receiving end.
    pub fn new(capacity: usize) -> (Self, Receiver<TelemetryRecord>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx, dropped: 0 }, rx)
    }
}

impl TelemetrySink for ChannelSink {
    fn record(&mut self, record: TelemetryRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                if self.dropped % 100 == 1 {
                    log::debug!("Telemetry: queue full, {} records dropped", self.dropped);
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                // Consumer gone; keep driving.
            }
        }
    }
}

/// Sink that discards everything (tests, headless runs).
#[derive(Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn record(&mut self, _record: TelemetryRecord) {}
}

/// Spawn the consumer thread that drains records into the log.
pub fn spawn_logger(
    rx: Receiver<TelemetryRecord>,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("telemetry".to_string())
        .spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                match rx.recv_timeout(Duration::from_millis(200)) {
                    Ok(record) => {
                        log::debug!(
                            "Telemetry: target={}deg steer={:.1} speed={:.2}m/s measured={:.2}m/s battery={:.1}V latency={:.1}ms",
                            record.target_deg,
                            record.steering,
                            record.speed_cmd,
                            record.measured_mps,
                            record.battery_v,
                            record.loop_latency.as_secs_f32() * 1000.0
                        );
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                }
            }
            log::debug!("Telemetry: consumer thread exiting");
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TelemetryRecord {
        TelemetryRecord {
            at: Instant::now(),
            target_deg: 5,
            steering: 3.0,
            speed_cmd: 1.0,
            measured_mps: 0.9,
            battery_v: 7.4,
            loop_latency: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let (mut sink, rx) = ChannelSink::new(2);
        for _ in 0..10 {
            sink.record(record());
        }
        // Only the capacity survived; the rest were dropped silently.
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn test_disconnected_consumer_is_harmless() {
        let (mut sink, rx) = ChannelSink::new(2);
        drop(rx);
        sink.record(record());
        sink.record(record());
    }
}
