//! Application orchestration for the ratha-nav daemon.
//!
//! Owns the worker threads (acquisition, control, telemetry), the shutdown
//! flag and the signal handler, and logs periodic statistics. Shutdown is
//! ordered: the control thread neutralizes the actuators before the
//! acquisition thread releases the range transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use log::{error, info};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use crate::acquisition::{AcquisitionStats, RangeAcquisition};
use crate::config::NavConfig;
use crate::control::{Pilot, PilotIo};
use crate::core::snapshot::SharedPerceptionState;
use crate::drivers::RangeTransport;
use crate::error::{Error, Result};
use crate::telemetry::{self, ChannelSink, TelemetryRecord};

/// Statistics logging interval.
const STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Main application structure that wires the pipeline together.
pub struct App {
    shutdown: Arc<AtomicBool>,
    acquisition: Option<RangeAcquisition>,
    stats: AcquisitionStats,
    pilot: Option<Pilot>,
    telemetry_rx: Option<Receiver<TelemetryRecord>>,
}

impl App {
    /// Wire up the shared perception state, the telemetry channel and both
    /// loop objects. No thread is started here.
    pub fn new(
        config: &NavConfig,
        transport: Box<dyn RangeTransport>,
        mut io: PilotIo,
    ) -> Result<Self> {
        info!("Initializing ratha-nav");

        let perception = Arc::new(SharedPerceptionState::new());
        let (sink, telemetry_rx) = ChannelSink::new(config.control.telemetry_queue);
        io.telemetry = Box::new(sink);

        let acquisition = RangeAcquisition::new(
            transport,
            Arc::clone(&perception),
            config.acquisition.clone(),
        );
        let stats = acquisition.stats();
        let pilot = Pilot::new(config, perception, io)?;

        Ok(Self {
            shutdown: Arc::new(AtomicBool::new(false)),
            acquisition: Some(acquisition),
            stats,
            pilot: Some(pilot),
            telemetry_rx: Some(telemetry_rx),
        })
    }

    /// External handle on the shutdown flag (tests, embedding).
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Request shutdown; `run` returns after the threads drain.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Start all threads and block until shutdown. Consumes the loop
    /// objects; `run` can only be called once.
    pub fn run(&mut self) -> Result<()> {
        let mut acquisition = self
            .acquisition
            .take()
            .ok_or_else(|| Error::Other("App::run called twice".to_string()))?;
        let mut pilot = self
            .pilot
            .take()
            .ok_or_else(|| Error::Other("App::run called twice".to_string()))?;
        let telemetry_rx = self
            .telemetry_rx
            .take()
            .ok_or_else(|| Error::Other("App::run called twice".to_string()))?;

        self.setup_signal_handler();

        let flag = Arc::clone(&self.shutdown);
        let acquisition_handle = std::thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || {
                if let Err(e) = acquisition.run(&flag) {
                    error!("Acquisition: thread exited with error: {e}");
                }
            })?;

        let telemetry_handle = telemetry::spawn_logger(telemetry_rx, Arc::clone(&self.shutdown))?;

        let flag = Arc::clone(&self.shutdown);
        let control_handle = std::thread::Builder::new()
            .name("control".to_string())
            .spawn(move || {
                if let Err(e) = pilot.run(&flag) {
                    error!("Pilot: thread exited with error: {e}");
                }
            })?;

        info!("ratha-nav running. Press Ctrl-C to stop.");
        let mut last_stats = Instant::now();
        while !self.shutdown.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(100));

            if last_stats.elapsed() >= STATS_INTERVAL {
                self.log_statistics();
                last_stats = Instant::now();
            }
        }

        info!("Shutdown signal received, stopping threads...");
        // Control first: actuators reach neutral while the transport is
        // still up, then acquisition releases the transport.
        if control_handle.join().is_err() {
            error!("App: control thread panicked");
        }
        if acquisition_handle.join().is_err() {
            error!("App: acquisition thread panicked");
        }
        if telemetry_handle.join().is_err() {
            error!("App: telemetry thread panicked");
        }

        info!("ratha-nav stopped");
        Ok(())
    }

    /// Setup signal handler for graceful shutdown.
    fn setup_signal_handler(&self) {
        let shutdown = Arc::clone(&self.shutdown);

        std::thread::Builder::new()
            .name("signal-handler".to_string())
            .spawn(move || {
                let mut signals =
                    Signals::new([SIGINT, SIGTERM]).expect("Failed to register signal handlers");

                if let Some(sig) = signals.forever().next() {
                    info!("Received signal {:?}, initiating shutdown...", sig);
                    shutdown.store(true, Ordering::Relaxed);
                }
            })
            .expect("Failed to spawn signal handler thread");
    }

    fn log_statistics(&self) {
        let (batches, errors) = self.stats.get();
        let error_rate = if batches > 0 {
            (errors as f32 / batches as f32) * 100.0
        } else {
            0.0
        };
        info!(
            "Acquisition: Batches={} Errors={} Loss={:.1}%",
            batches, errors, error_rate
        );
    }
}
