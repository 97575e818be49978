//! ADXL345 sensor driver over a generic register bus

use crate::bus::RegisterBus;
use crate::error::{Adxl345Error, Result};

// ADXL345 Register addresses
pub const REG_DEVID: u8 = 0x00;
pub const REG_BW_RATE: u8 = 0x2C;
pub const REG_POWER_CTL: u8 = 0x2D;
pub const REG_DATA_FORMAT: u8 = 0x31;
pub const REG_DATAX0: u8 = 0x32;

// Expected DEVID value
pub const DEVID_VALUE: u8 = 0xE5;

const BW_RATE_3200HZ: u8 = 0x0F;
const DATA_FORMAT_FULL_RES_16G: u8 = 0x0B; // FULL_RES | range ±16g
const POWER_CTL_MEASURE: u8 = 0x08;

/// Setup sequence written once after the identity check
pub const CONFIG_SEQUENCE: [(u8, u8); 3] = [
    (REG_BW_RATE, BW_RATE_3200HZ),
    (REG_DATA_FORMAT, DATA_FORMAT_FULL_RES_16G),
    (REG_POWER_CTL, POWER_CTL_MEASURE),
];

/// Raw count to g: full-scale span (2 * 16g) over the 13-bit resolution
pub const CONVERSION_FACTOR: f64 = 2.0 * 16.0 / 8192.0;

/// One raw 3-axis reading in device counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub axis_x: i16,
    pub axis_y: i16,
    pub axis_z: i16,
}

impl RawSample {
    /// Decode the six DATAX0..DATAZ1 bytes (little-endian pairs)
    pub fn from_le_bytes(data: [u8; 6]) -> Self {
        Self {
            axis_x: i16::from_le_bytes([data[0], data[1]]),
            axis_y: i16::from_le_bytes([data[2], data[3]]),
            axis_z: i16::from_le_bytes([data[4], data[5]]),
        }
    }
}

/// Converted sample in g, stamped with seconds since acquisition start
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub timestamp: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Reading {
    pub fn from_raw(timestamp: f64, raw: RawSample) -> Self {
        Self {
            timestamp,
            x: raw.axis_x as f64 * CONVERSION_FACTOR,
            y: raw.axis_y as f64 * CONVERSION_FACTOR,
            z: raw.axis_z as f64 * CONVERSION_FACTOR,
        }
    }

    /// Same acceleration values re-stamped at another instant
    pub fn at(&self, timestamp: f64) -> Self {
        Self { timestamp, ..*self }
    }
}

/// Anything the acquisition loop can pull raw samples from
pub trait Accelerometer {
    fn read_sample(&mut self) -> Result<RawSample>;
}

impl<A: Accelerometer + ?Sized> Accelerometer for &mut A {
    fn read_sample(&mut self) -> Result<RawSample> {
        (**self).read_sample()
    }
}

/// ADXL345 sensor interface
pub struct Adxl345<B> {
    bus: B,
}

impl<B: RegisterBus> Adxl345<B> {
    /// Verify the device identity and apply the measurement configuration
    ///
    /// # Returns
    /// * `Ok(Adxl345)` - Sensor found and measuring
    /// * `Err(Adxl345Error::DeviceNotFound)` - DEVID did not read back 0xE5
    /// * `Err(Adxl345Error::ConfigurationFailure)` - A setup write failed
    pub fn new(bus: B) -> Result<Self> {
        let mut sensor = Self { bus };
        sensor.check_identity()?;
        sensor.bus.configure(&CONFIG_SEQUENCE)?;
        log::info!("ADXL345 configured (3200 Hz ODR, full resolution, ±16g)");
        Ok(sensor)
    }

    fn check_identity(&mut self) -> Result<()> {
        let mut id = [0u8; 1];
        self.bus.read_registers(REG_DEVID, &mut id)?;
        if id[0] != DEVID_VALUE {
            return Err(Adxl345Error::DeviceNotFound(id[0]));
        }
        log::info!("ADXL345 found (DEVID = 0x{:02X})", id[0]);
        Ok(())
    }

    /// Give back the bus
    pub fn release(self) -> B {
        self.bus
    }
}

impl<B: RegisterBus> Accelerometer for Adxl345<B> {
    /// Burst-read all three axes in one transaction
    fn read_sample(&mut self) -> Result<RawSample> {
        let mut data = [0u8; 6];
        self.bus.read_registers(REG_DATAX0, &mut data)?;
        Ok(RawSample::from_le_bytes(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeBus {
        registers: [u8; 0x40],
        writes: Vec<(u8, u8)>,
    }

    impl FakeBus {
        fn with_id(id: u8) -> Self {
            let mut registers = [0u8; 0x40];
            registers[REG_DEVID as usize] = id;
            Self {
                registers,
                writes: Vec::new(),
            }
        }
    }

    impl RegisterBus for FakeBus {
        fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
            self.writes.push((register, value));
            self.registers[register as usize] = value;
            Ok(())
        }

        fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> Result<()> {
            let start = start as usize;
            buf.copy_from_slice(&self.registers[start..start + buf.len()]);
            Ok(())
        }
    }

    #[test]
    fn test_conversion_extremes() {
        let max = Reading::from_raw(
            0.0,
            RawSample { axis_x: 32767, axis_y: -32768, axis_z: 0 },
        );
        assert!((max.x - 15.9995).abs() < 1e-3);
        assert!((max.y + 16.0).abs() < 1e-9);
        assert_eq!(max.z, 0.0);
    }

    #[test]
    fn test_decode_little_endian_pairs() {
        let raw = RawSample::from_le_bytes([0x64, 0x00, 0xFF, 0xFF, 0x00, 0x80]);
        assert_eq!(raw, RawSample { axis_x: 100, axis_y: -1, axis_z: -32768 });
    }

    #[test]
    fn test_init_writes_config_sequence_in_order() {
        let sensor = Adxl345::new(FakeBus::with_id(DEVID_VALUE)).unwrap();
        let bus = sensor.release();
        assert_eq!(bus.writes, CONFIG_SEQUENCE.to_vec());
    }

    #[test]
    fn test_wrong_id_is_device_not_found() {
        match Adxl345::new(FakeBus::with_id(0x00)) {
            Err(Adxl345Error::DeviceNotFound(0x00)) => {}
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("expected DeviceNotFound"),
        }
    }

    #[test]
    fn test_read_sample_from_data_registers() {
        let mut bus = FakeBus::with_id(DEVID_VALUE);
        bus.registers[0x32..0x38].copy_from_slice(&[0x64, 0x00, 0x00, 0x00, 0x9C, 0xFF]);
        let mut sensor = Adxl345::new(bus).unwrap();
        let raw = sensor.read_sample().unwrap();
        assert_eq!(raw, RawSample { axis_x: 100, axis_y: 0, axis_z: -100 });
    }
}
