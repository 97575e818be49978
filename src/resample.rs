//! Nearest-neighbour resampling onto a uniform time grid
//!
//! An unpaced capture is recorded as fast as the bus allows, so its
//! timestamps are irregular. [`resample`] maps it onto the grid
//! `i / frequency` for `i in 0..target_count`, taking for every grid point
//! the capture sample closest in time.

use crate::acquisition::SampleSink;
use crate::adxl345::Reading;
use crate::clock::clamp_frequency;
use crate::csv_format::BufferedWriter;
use crate::error::Result;
use std::io::Write;

/// Number of grid points a capture of `elapsed` seconds supports at `frequency`
pub fn target_count(elapsed: f64, frequency: f64) -> usize {
    let count = (elapsed * frequency).floor();
    if count.is_finite() && count > 0.0 {
        count as usize
    } else {
        0
    }
}

/// Outcome of a resampling pass
#[derive(Debug, Clone, PartialEq)]
pub struct Resampled {
    pub readings: Vec<Reading>,
    /// Grid points that reused the sample already taken by the previous point
    pub repeated: usize,
}

/// Resample `capture` onto `target_count` points spaced `1 / frequency` apart
///
/// The capture must be ordered by non-decreasing timestamp. The search for
/// each grid point resumes from the previous match and moves forward only
/// while the time error does not grow, so the total cost is linear in
/// `capture.len() + target_count`. When several samples are equally close
/// the earliest one wins. Output readings carry the grid timestamp.
pub fn resample(capture: &[Reading], frequency: f64, target_count: usize) -> Resampled {
    if capture.is_empty() || target_count == 0 {
        return Resampled {
            readings: Vec::new(),
            repeated: 0,
        };
    }

    let period = 1.0 / frequency;
    let mut readings = Vec::with_capacity(target_count);
    let mut repeated = 0;
    let mut j = 0;
    let mut last_match = None;

    for i in 0..target_count {
        let target = i as f64 * period;
        let error = |k: usize| (capture[k].timestamp - target).abs();

        let mut best = j;
        let mut k = j;
        while k + 1 < capture.len() {
            let next = error(k + 1);
            if next > error(k) {
                break;
            }
            k += 1;
            if next < error(best) {
                best = k;
            }
        }
        j = best;

        if last_match == Some(j) {
            repeated += 1;
        }
        last_match = Some(j);
        readings.push(capture[j].at(target));
    }

    Resampled { readings, repeated }
}

/// Full linear nearest-neighbour search, first minimum wins
pub fn nearest_index(capture: &[Reading], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (k, r) in capture.iter().enumerate() {
        let error = (r.timestamp - target).abs();
        match best {
            Some((_, e)) if error >= e => {}
            _ => best = Some((k, error)),
        }
    }
    best.map(|(k, _)| k)
}

/// Sink that holds the whole capture and writes its resampled form on finish
pub struct ResamplingSink<W: Write> {
    capture: Vec<Reading>,
    frequency: f64,
    writer: BufferedWriter<W>,
}

impl<W: Write> ResamplingSink<W> {
    /// Resample onto `frequency` (clamped into the supported range) and write to `writer`
    pub fn new(writer: BufferedWriter<W>, frequency: f64) -> Self {
        Self {
            capture: Vec::new(),
            frequency: clamp_frequency(frequency),
            writer,
        }
    }

    /// Raw readings captured so far
    pub fn captured(&self) -> usize {
        self.capture.len()
    }

    /// Grid frequency in Hz
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn writer(&self) -> &BufferedWriter<W> {
        &self.writer
    }

    pub fn into_writer(self) -> BufferedWriter<W> {
        self.writer
    }
}

impl<W: Write> SampleSink for ResamplingSink<W> {
    fn accept(&mut self, reading: Reading) -> Result<()> {
        self.capture.push(reading);
        Ok(())
    }

    /// Resample against the actual capture duration, then write and flush
    fn finish(&mut self, elapsed: f64) -> Result<()> {
        let count = target_count(elapsed, self.frequency);
        let capture = std::mem::take(&mut self.capture);
        let resampled = resample(&capture, self.frequency, count);

        log::info!(
            "Resampled {} raw readings to {} points at {} Hz",
            capture.len(),
            resampled.readings.len(),
            self.frequency
        );
        if resampled.repeated > 0 {
            log::warn!(
                "Capture was sparser than {} Hz: {} of {} points reuse the previous sample",
                self.frequency,
                resampled.repeated,
                resampled.readings.len()
            );
        }

        self.writer.append_batch(&resampled.readings)?;
        self.writer.finalize()
    }
}
