//! ADXL345 accelerometer acquisition library
//!
//! Polls an ADXL345 over I2C or SPI at a fixed rate and either prints each
//! reading or saves the capture to CSV. A single acquisition loop drives
//! every mode; what happens to the readings is decided by the sink.
//!
//! # Quick Start
//!
//! ## Live Readings
//! ```no_run
//! use adxl345_logger::{bus, Acquisition, AcquisitionConfig, Adxl345, ConsoleSink, InterruptFlag};
//!
//! let mut sensor = Adxl345::new(bus::open_i2c("/dev/i2c-1", bus::I2C_ADDRESS_DEFAULT)?)?;
//! let mut stop = InterruptFlag::install()?;
//!
//! let session = Acquisition::new(AcquisitionConfig::with_frequency(100.0))
//!     .run(&mut sensor, &mut stop, &mut ConsoleSink::stdout());
//! println!("{}", session.summary);
//! # Ok::<(), adxl345_logger::Adxl345Error>(())
//! ```
//!
//! ## Buffered Capture to CSV
//! ```no_run
//! use adxl345_logger::{bus, Acquisition, AcquisitionConfig, Adxl345, BufferedWriter, InterruptFlag};
//! use std::time::Duration;
//!
//! let mut sensor = Adxl345::new(bus::open_spi("/dev/spidev0.0", bus::SPI_SPEED_DEFAULT)?)?;
//! let mut writer = BufferedWriter::create("capture.csv", 1000)?;
//! let mut stop = InterruptFlag::install()?;
//!
//! let config = AcquisitionConfig {
//!     duration: Some(Duration::from_secs(10)),
//!     ..AcquisitionConfig::with_frequency(1000.0)
//! };
//! let summary = Acquisition::new(config)
//!     .run(&mut sensor, &mut stop, &mut writer)
//!     .into_result()?;
//! println!("{} ({} rows written)", summary, writer.sample_count());
//! # Ok::<(), adxl345_logger::Adxl345Error>(())
//! ```
//!
//! ## Unpaced Capture Resampled to a Uniform Grid
//! ```no_run
//! use adxl345_logger::{bus, Acquisition, AcquisitionConfig, Adxl345, BufferedWriter};
//! use adxl345_logger::{InterruptFlag, Pacing, ResamplingSink};
//!
//! let mut sensor = Adxl345::new(bus::open_i2c("/dev/i2c-1", bus::I2C_ADDRESS_DEFAULT)?)?;
//! let writer = BufferedWriter::create("uniform.csv", 1000)?;
//! let mut sink = ResamplingSink::new(writer, 500.0);
//! let mut stop = InterruptFlag::install()?;
//!
//! let config = AcquisitionConfig {
//!     pacing: Pacing::Unpaced,
//!     ..AcquisitionConfig::with_frequency(500.0)
//! };
//! Acquisition::new(config).run(&mut sensor, &mut stop, &mut sink).into_result()?;
//! # Ok::<(), adxl345_logger::Adxl345Error>(())
//! ```

pub mod acquisition;
pub mod adxl345;
pub mod bus;
pub mod clock;
pub mod control;
pub mod csv_format;
pub mod error;
pub mod logger;
pub mod resample;

// Re-export public API
pub use acquisition::{
    Acquisition, AcquisitionConfig, Pacing, SampleSink, Session, StopReason, Summary,
};
pub use adxl345::{Accelerometer, Adxl345, RawSample, Reading, CONVERSION_FACTOR};
pub use bus::{I2cBus, RegisterBus, SpiBus};
pub use clock::{clamp_frequency, SampleClock, FREQ_DEFAULT, FREQ_MAX, FREQ_MIN};
pub use control::{InterruptFlag, KeyboardStop, OperatorControls, StopSource};
pub use csv_format::{read_capture, read_capture_file, BufferedWriter, ConsoleSink};
pub use error::{Adxl345Error, Result};
pub use resample::{resample, target_count, ResamplingSink};
