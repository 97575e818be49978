//! Fixed-rate acquisition loop
//!
//! A session runs through four phases:
//!
//! 1. **Cold start** - a few reads are taken and discarded while the sensor's
//!    output settles. Failures here are logged and ignored.
//! 2. **Sampling** - every tick first checks the duration bound and the
//!    operator stop sources, then reads one sample, converts it, and hands it
//!    to the sink. A failed read ends sampling immediately; it is not retried.
//! 3. **Draining** - the sink is always finished, whatever ended sampling, so
//!    buffered readings reach storage.
//! 4. **Terminated** - the caller gets a [`Session`] with the summary and the
//!    fault, if any.

use crate::adxl345::{Accelerometer, Reading};
use crate::clock::{clamp_frequency, SampleClock, FREQ_DEFAULT};
use crate::control::StopSource;
use crate::error::{Adxl345Error, Result};
use std::fmt;
use std::time::Duration;

/// Discarded reads before sampling starts
pub const COLD_START_SAMPLES: usize = 2;
/// Pause between discarded reads
pub const COLD_START_DELAY: Duration = Duration::from_millis(100);

/// Where readings go
pub trait SampleSink {
    /// Take one reading
    fn accept(&mut self, reading: Reading) -> Result<()>;

    /// Called exactly once when sampling ends, with the sampling duration in seconds
    fn finish(&mut self, elapsed: f64) -> Result<()>;
}

impl<S: SampleSink + ?Sized> SampleSink for &mut S {
    fn accept(&mut self, reading: Reading) -> Result<()> {
        (**self).accept(reading)
    }

    fn finish(&mut self, elapsed: f64) -> Result<()> {
        (**self).finish(elapsed)
    }
}

/// How ticks are spaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// One read per sample period on the accumulated schedule
    Fixed,
    /// Read as fast as the bus allows (for later resampling)
    Unpaced,
}

/// Why sampling ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Ctrl+C / SIGINT
    Interrupt,
    /// Operator pressed `q`
    Keypress,
    /// Configured run duration reached
    DurationElapsed,
    /// A data read failed on the bus
    ReadFault,
    /// A reading could not be written out
    StorageFault,
}

impl StopReason {
    /// True when a bus or storage failure ended sampling
    pub fn is_fault(self) -> bool {
        matches!(self, StopReason::ReadFault | StopReason::StorageFault)
    }
}

/// Acquisition settings
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    /// Sampling frequency in Hz; [`Acquisition::new`] clamps it into range
    pub frequency: f64,
    /// Stop automatically after this long
    pub duration: Option<Duration>,
    /// Reads discarded before sampling
    pub cold_start_samples: usize,
    /// Pause after each discarded read
    pub cold_start_delay: Duration,
    /// Fixed-rate or as fast as possible
    pub pacing: Pacing,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            frequency: FREQ_DEFAULT,
            duration: None,
            cold_start_samples: COLD_START_SAMPLES,
            cold_start_delay: COLD_START_DELAY,
            pacing: Pacing::Fixed,
        }
    }
}

impl AcquisitionConfig {
    /// Default settings at `frequency`, clamped into the supported range
    pub fn with_frequency(frequency: f64) -> Self {
        Self {
            frequency: clamp_with_warning(frequency),
            ..Self::default()
        }
    }
}

fn clamp_with_warning(frequency: f64) -> f64 {
    let clamped = clamp_frequency(frequency);
    if clamped != frequency {
        log::warn!("Frequency {} Hz out of range, using {} Hz", frequency, clamped);
    }
    clamped
}

/// Sample count and timing of a finished session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub samples: u64,
    /// Seconds from first tick to the end of sampling
    pub elapsed: f64,
}

impl Summary {
    /// Effective sample rate in Hz
    pub fn rate(&self) -> f64 {
        if self.elapsed > 0.0 {
            self.samples as f64 / self.elapsed
        } else {
            0.0
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Captured {} samples in {:.2} seconds ({:.1} Hz)",
            self.samples,
            self.elapsed,
            self.rate()
        )
    }
}

/// Result of one acquisition run
#[derive(Debug)]
pub struct Session {
    pub summary: Summary,
    pub stop: StopReason,
    /// The fault that ended the run (or broke draining), if any
    pub error: Option<Adxl345Error>,
}

impl Session {
    /// `Ok(summary)` for a graceful stop, the fault otherwise
    pub fn into_result(self) -> Result<Summary> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.summary),
        }
    }
}

/// Acquisition loop runner
pub struct Acquisition {
    config: AcquisitionConfig,
}

impl Acquisition {
    /// Create a runner; the frequency is clamped to `[FREQ_MIN, FREQ_MAX]`
    pub fn new(mut config: AcquisitionConfig) -> Self {
        config.frequency = clamp_with_warning(config.frequency);
        Self { config }
    }

    /// Settings in effect, after clamping
    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Run one session to completion
    ///
    /// # Arguments
    /// * `device` - Sample source
    /// * `stops` - Operator stop sources, polled once per tick
    /// * `sink` - Receives every reading, then `finish` once
    ///
    /// Never returns early: the sink is finished on every exit path.
    pub fn run<D, C, S>(&self, device: &mut D, stops: &mut C, sink: &mut S) -> Session
    where
        D: Accelerometer + ?Sized,
        C: StopSource + ?Sized,
        S: SampleSink + ?Sized,
    {
        self.cold_start(device);

        let mut clock = SampleClock::start(self.config.frequency);
        let limit = self.config.duration.map(|d| d.as_secs_f64());
        let mut samples = 0u64;

        let (mut stop, mut error) = loop {
            if limit.is_some_and(|limit| clock.elapsed() >= limit) {
                break (StopReason::DurationElapsed, None);
            }
            if let Some(reason) = stops.poll_stop() {
                break (reason, None);
            }

            let raw = match device.read_sample() {
                Ok(raw) => raw,
                Err(e) => {
                    log::error!("Read failed after {} samples: {}", samples, e);
                    break (StopReason::ReadFault, Some(e));
                }
            };

            let reading = Reading::from_raw(clock.elapsed(), raw);
            if let Err(e) = sink.accept(reading) {
                log::error!("Output failed after {} samples: {}", samples, e);
                break (StopReason::StorageFault, Some(e));
            }
            samples += 1;

            if self.config.pacing == Pacing::Fixed {
                clock.advance();
                clock.wait_until_due();
            }
        };

        let elapsed = clock.elapsed();
        log::debug!("Sampling stopped ({:?}), draining", stop);

        if let Err(e) = sink.finish(elapsed) {
            log::error!("Failed to flush output: {}", e);
            if error.is_none() {
                stop = StopReason::StorageFault;
                error = Some(e);
            }
        }

        Session {
            summary: Summary { samples, elapsed },
            stop,
            error,
        }
    }

    fn cold_start<D: Accelerometer + ?Sized>(&self, device: &mut D) {
        for i in 0..self.config.cold_start_samples {
            if let Err(e) = device.read_sample() {
                log::warn!("Cold-start read {} failed (ignored): {}", i + 1, e);
            }
            std::thread::sleep(self.config.cold_start_delay);
        }
    }
}
