/***
 * The station: owns the sensor, the current snapshot and the observers.
 *
 *  Only the sampling cycle writes the current snapshot, and it does so by
 *  swapping in a new `Arc<Snapshot>`. Readers clone the `Arc` under a read
 *  lock held for that clone alone.
 */

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use log::{debug, info, trace, warn};

use crate::measurements::{MeasurementState, Snapshot};
use crate::observer::{Observer, ObserverRegistry, SubscribeError, SubscriptionId};
use crate::sensor::{RawSensor, SensorError};


/// Minimum delay between the end of one cycle and the start of the next.
pub const SAMPLE_PERIOD: Duration = Duration::from_millis(1000);

pub struct Station<S> {
    // held for a whole cycle, so cycles never overlap
    sensor: Mutex<S>,
    current: RwLock<Arc<Snapshot>>,
    observers: ObserverRegistry,
    skipped: AtomicU64,
}

impl<S: RawSensor> Station<S> {
    /// Build a station and prime it with one synchronous read.
    ///
    /// If the prime read fails the zero-valued state is installed instead.
    pub fn new(sensor: S) -> Self {
        Self::with_initial(sensor, MeasurementState::default())
    }

    /// Like [`Station::new`], with `initial` installed if the prime read fails.
    pub fn with_initial(mut sensor: S, initial: MeasurementState) -> Self {
        let measurement = match read_measurement(&mut sensor) {
            Ok(measurement) => measurement,
            Err(err) => {
                warn!("prime read failed, starting from the initial state: {err}");
                initial
            }
        };

        Self {
            sensor: Mutex::new(sensor),
            current: RwLock::new(Arc::new(Snapshot::new(0, measurement))),
            observers: ObserverRegistry::new(),
            skipped: AtomicU64::new(0),
        }
    }

    /// The most recently installed snapshot.
    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn subscribe<O: Observer>(
        &self,
        name: &str,
        observer: O,
    ) -> Result<SubscriptionId, SubscribeError> {
        self.observers.subscribe(name, observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Cycles dropped because the sensor failed.
    pub fn skipped_cycles(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Run one sampling cycle: read, derive, install, publish.
    ///
    /// On a sensor failure nothing is installed or published and the previous
    /// snapshot stays current.
    pub fn sample_once(&self) -> Result<Arc<Snapshot>, SensorError> {
        let mut sensor = self.sensor.lock().unwrap_or_else(PoisonError::into_inner);

        let measurement = match read_measurement(&mut *sensor) {
            Ok(measurement) => measurement,
            Err(err) => {
                let skipped = self.skipped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("skipping cycle, sensor read failed ({skipped} skipped so far): {err}");
                return Err(err);
            }
        };

        let cycle = self.current().cycle() + 1;
        let snapshot = Arc::new(Snapshot::new(cycle, measurement));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&snapshot);
        debug!(
            "cycle {cycle}: {:.2} K, {:.2} inHg",
            measurement.kelvin(),
            measurement.pressure_inches()
        );

        self.observers.publish(&snapshot);

        Ok(snapshot)
    }
}

impl<S: RawSensor + 'static> Station<S> {
    /// Spawn the sampling thread. It waits [`SAMPLE_PERIOD`], samples, and
    /// repeats until [`Sampler::stop`] is called.
    pub fn start(self: &Arc<Self>) -> anyhow::Result<Sampler> {
        let stop = Arc::new(AtomicBool::new(false));
        let station = Arc::clone(self);
        let stopping = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("sampler".into())
            .spawn(move || station.run(&stopping))
            .context("could not start the sampling thread")?;
        info!("sampling every {} ms", SAMPLE_PERIOD.as_millis());

        Ok(Sampler { stop, handle })
    }

    fn run(&self, stop: &AtomicBool) {
        while wait_period(stop) {
            // failures are logged by sample_once; the next cycle retries
            let _ = self.sample_once();
        }
        debug!("sampling loop stopped");
    }
}

/// Handle to a running sampling thread.
///
/// Dropping it detaches the thread, which then samples for the rest of the
/// process.
pub struct Sampler {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Sampler {
    /// Ask the loop to stop and wait for it. A cycle already in progress
    /// completes first.
    pub fn stop(self) -> anyhow::Result<()> {
        self.stop.store(true, Ordering::Release);
        self.handle.thread().unpark();
        self.handle
            .join()
            .map_err(|_| anyhow!("sampling thread panicked"))
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Sleep one period. Returns `false` if asked to stop.
fn wait_period(stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + SAMPLE_PERIOD;
    loop {
        if stop.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::park_timeout(deadline - now);
        if Instant::now() < deadline && !stop.load(Ordering::Acquire) {
            trace!("sampler woke early, waiting out the period");
        }
    }
}

fn read_measurement<S: RawSensor + ?Sized>(sensor: &mut S) -> Result<MeasurementState, SensorError> {
    let raw = sensor.reading()?;
    let pressure = sensor.pressure()?;

    Ok(MeasurementState::new(raw, pressure))
}
