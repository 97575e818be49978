//! CSV output for captured readings
//!
//! Provides the buffered file writer used in save mode, the console sink used
//! in live mode, and a reader for loading a saved capture back.

use crate::acquisition::SampleSink;
use crate::adxl345::Reading;
use crate::error::{Adxl345Error, Result};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

/// Header row of every capture file
pub const CSV_HEADER: &str = "time,x,y,z";

/// Rows held in memory before a write is issued
pub const DEFAULT_CAPACITY: usize = 1000;

/// Buffered CSV writer for sensor data collection
///
/// Readings are held in a fixed-capacity buffer and written out in one
/// `write_all` per full buffer, so the number of write calls is
/// `samples / capacity` rather than one per sample. The buffer is cleared
/// only after its rows were written successfully.
///
/// A failed write may have left part of the buffer in the file, so the
/// writer stops there: later `append` and `finalize` calls return an error
/// and nothing is written again.
pub struct BufferedWriter<W: Write> {
    inner: W,
    buffer: Vec<Reading>,
    capacity: usize,
    rows: String,
    sample_count: usize,
    flush_count: usize,
    failed: bool,
}

impl BufferedWriter<File> {
    /// Create (truncate) a CSV file and write the header
    ///
    /// # Arguments
    /// * `path` - File path
    /// * `capacity` - Rows buffered between writes
    pub fn create<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(file, capacity)
    }
}

impl<W: Write> BufferedWriter<W> {
    /// Wrap any writer; the header is written and flushed immediately
    pub fn new(mut inner: W, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Adxl345Error::InvalidParameter(
                "Buffer capacity must be at least 1".to_string(),
            ));
        }

        inner.write_all(format!("{}\n", CSV_HEADER).as_bytes())?;
        inner.flush()?;

        Ok(Self {
            inner,
            buffer: Vec::with_capacity(capacity),
            capacity,
            rows: String::new(),
            sample_count: 0,
            flush_count: 0,
            failed: false,
        })
    }

    /// Append a single reading, writing the buffer out when it fills
    pub fn append(&mut self, reading: Reading) -> Result<()> {
        self.ensure_usable()?;
        self.buffer.push(reading);
        self.sample_count += 1;

        if self.buffer.len() >= self.capacity {
            self.flush_buffer()?;
        }
        Ok(())
    }

    /// Append a batch of readings
    pub fn append_batch(&mut self, readings: &[Reading]) -> Result<()> {
        for reading in readings {
            self.append(*reading)?;
        }
        Ok(())
    }

    /// Write out whatever is left in the buffer and flush the underlying writer
    pub fn finalize(&mut self) -> Result<()> {
        self.ensure_usable()?;
        if !self.buffer.is_empty() {
            self.flush_buffer()?;
        }
        self.inner.flush()?;
        Ok(())
    }

    fn flush_buffer(&mut self) -> Result<()> {
        self.rows.clear();
        for r in &self.buffer {
            // Writing into a String cannot fail
            let _ = writeln!(
                self.rows,
                "{:.6},{:.6},{:.6},{:.6}",
                r.timestamp, r.x, r.y, r.z
            );
        }

        let written = self
            .inner
            .write_all(self.rows.as_bytes())
            .and_then(|()| self.inner.flush());
        if let Err(e) = written {
            self.failed = true;
            return Err(e.into());
        }

        log::debug!("Flushed {} rows ({} total)", self.buffer.len(), self.sample_count);
        self.buffer.clear();
        self.flush_count += 1;
        Ok(())
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.failed {
            return Err(Adxl345Error::Storage(io::Error::new(
                io::ErrorKind::Other,
                "output stopped after an earlier write failure",
            )));
        }
        Ok(())
    }

    /// Readings currently held in memory
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Rows held before a write is issued
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once a write has failed; the writer accepts nothing after that
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Get total number of readings appended
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Number of buffer writes issued so far
    pub fn flush_count(&self) -> usize {
        self.flush_count
    }

    /// Unwrap the underlying writer (does not flush)
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> SampleSink for BufferedWriter<W> {
    fn accept(&mut self, reading: Reading) -> Result<()> {
        self.append(reading)
    }

    fn finish(&mut self, _elapsed: f64) -> Result<()> {
        self.finalize()
    }
}

/// Live-mode sink printing one line per reading
pub struct ConsoleSink<W: Write> {
    out: W,
    line_ending: &'static str,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            line_ending: "\n",
        }
    }

    /// Use `\r\n` while the terminal is in raw mode
    pub fn raw_terminal(mut self, raw: bool) -> Self {
        self.line_ending = if raw { "\r\n" } else { "\n" };
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SampleSink for ConsoleSink<W> {
    fn accept(&mut self, r: Reading) -> Result<()> {
        write!(
            self.out,
            "time = {:.3}, x = {:.3}, y = {:.3}, z = {:.3}{}",
            r.timestamp, r.x, r.y, r.z, self.line_ending
        )?;
        self.out.flush()?;
        Ok(())
    }

    fn finish(&mut self, _elapsed: f64) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Read a capture back from CSV text
pub fn read_capture<R: BufRead>(reader: R) -> Result<Vec<Reading>> {
    let mut lines = reader.lines();

    let header = lines.next().transpose()?;
    if header.as_deref().map(str::trim_end) != Some(CSV_HEADER) {
        return Err(invalid_data("missing 'time,x,y,z' header".to_string()));
    }

    let mut readings = Vec::new();
    for (i, line) in lines.enumerate() {
        let line = line?;
        let fields: Vec<&str> = line.trim_end().split(',').collect();
        if fields.len() != 4 {
            return Err(invalid_data(format!(
                "row {}: expected 4 fields, got {}",
                i + 1,
                fields.len()
            )));
        }

        let mut values = [0.0f64; 4];
        for (value, field) in values.iter_mut().zip(&fields) {
            *value = field
                .parse()
                .map_err(|e| invalid_data(format!("row {}: '{}': {}", i + 1, field, e)))?;
        }

        readings.push(Reading {
            timestamp: values[0],
            x: values[1],
            y: values[2],
            z: values[3],
        });
    }

    Ok(readings)
}

/// Open a capture file and read all of it
pub fn read_capture_file<P: AsRef<Path>>(path: P) -> Result<Vec<Reading>> {
    let file = File::open(path)?;
    read_capture(BufReader::new(file))
}

fn invalid_data(msg: String) -> Adxl345Error {
    Adxl345Error::Storage(io::Error::new(io::ErrorKind::InvalidData, msg))
}
