//! Error types for the ADXL345 acquisition pipeline

use thiserror::Error;

/// Error type for ADXL345 operations
#[derive(Error, Debug)]
pub enum Adxl345Error {
    /// The bus device node could not be opened or configured
    #[error("Failed to open bus: {0}")]
    BusOpen(String),

    /// DEVID register did not hold the ADXL345 identity byte
    #[error("ADXL345 not found: expected ID 0xE5, got 0x{0:02X}")]
    DeviceNotFound(u8),

    /// A setup register write did not complete
    #[error("Configuration write to register 0x{register:02X} failed: {reason}")]
    ConfigurationFailure { register: u8, reason: String },

    /// Bus error while reading data registers
    #[error("Bus read error: {0}")]
    ReadFailure(String),

    /// Output file could not be opened or written
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Interrupt handler or keyboard polling could not be set up
    #[error("Operator control error: {0}")]
    Control(String),
}

/// Result type for ADXL345 operations
pub type Result<T> = std::result::Result<T, Adxl345Error>;
