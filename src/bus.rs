//! Register-level bus transports for the ADXL345
//!
//! The sensor is reachable over either I2C or 4-wire SPI. Both transports are
//! written against the `embedded-hal` 1.0 traits so any HAL (or a test double)
//! can drive them; `open_i2c` / `open_spi` build the Linux userspace variants.

use crate::error::{Adxl345Error, Result};
use embedded_hal::i2c::I2c;
use embedded_hal::spi::SpiDevice;
use linux_embedded_hal::spidev::{SpiModeFlags, Spidev, SpidevOptions};
use linux_embedded_hal::{I2cdev, SpidevDevice};
use std::path::Path;

/// Default 7-bit I2C address (ALT ADDRESS pin low)
pub const I2C_ADDRESS_DEFAULT: u8 = 0x53;
/// Alternate 7-bit I2C address (ALT ADDRESS pin high)
pub const I2C_ADDRESS_ALT: u8 = 0x1D;

/// Default SPI clock in Hz
pub const SPI_SPEED_DEFAULT: u32 = 2_000_000;

// SPI address byte flags
const SPI_READ_BIT: u8 = 0x80;
const SPI_MULTI_BIT: u8 = 0x40;

// The ADXL345 register file ends at 0x39, so no burst is longer than this
const MAX_BURST: usize = 64;

/// Register read/write access to the sensor
pub trait RegisterBus {
    /// Write a single byte to a register
    fn write_register(&mut self, register: u8, value: u8) -> Result<()>;

    /// Read `buf.len()` consecutive registers starting at `start`
    fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> Result<()>;

    /// Apply an ordered list of `(register, value)` writes, stopping at the first failure
    fn configure(&mut self, writes: &[(u8, u8)]) -> Result<()> {
        for &(register, value) in writes {
            self.write_register(register, value)?;
        }
        Ok(())
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        (**self).write_register(register, value)
    }

    fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> Result<()> {
        (**self).read_registers(start, buf)
    }
}

/// ADXL345 on an I2C bus
pub struct I2cBus<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> I2cBus<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Give back the underlying I2C peripheral
    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> RegisterBus for I2cBus<I> {
    fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|e| Adxl345Error::ConfigurationFailure {
                register,
                reason: format!("{:?}", e),
            })
    }

    fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> Result<()> {
        // Register pointer write followed by a repeated-START read
        self.i2c
            .write_read(self.address, &[start], buf)
            .map_err(|e| {
                Adxl345Error::ReadFailure(format!(
                    "I2C read of {} bytes at 0x{:02X}: {:?}",
                    buf.len(),
                    start,
                    e
                ))
            })
    }
}

/// ADXL345 on a 4-wire SPI bus (mode 3)
pub struct SpiBus<S> {
    spi: S,
    frame: Vec<u8>,
}

impl<S: SpiDevice> SpiBus<S> {
    pub fn new(spi: S) -> Self {
        Self {
            spi,
            frame: Vec::with_capacity(MAX_BURST + 1),
        }
    }

    /// Give back the underlying SPI device
    pub fn release(self) -> S {
        self.spi
    }
}

impl<S: SpiDevice> RegisterBus for SpiBus<S> {
    fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        self.spi
            .write(&[register, value])
            .map_err(|e| Adxl345Error::ConfigurationFailure {
                register,
                reason: format!("{:?}", e),
            })
    }

    fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() || buf.len() > MAX_BURST {
            return Err(Adxl345Error::InvalidParameter(format!(
                "SPI burst length must be 1-{}, got {}",
                MAX_BURST,
                buf.len()
            )));
        }

        let mut address = start | SPI_READ_BIT;
        if buf.len() > 1 {
            address |= SPI_MULTI_BIT;
        }

        // Address byte, then one clocked-out byte per register
        self.frame.clear();
        self.frame.push(address);
        self.frame.resize(buf.len() + 1, 0);

        self.spi.transfer_in_place(&mut self.frame).map_err(|e| {
            Adxl345Error::ReadFailure(format!(
                "SPI read of {} bytes at 0x{:02X}: {:?}",
                buf.len(),
                start,
                e
            ))
        })?;

        buf.copy_from_slice(&self.frame[1..]);
        Ok(())
    }
}

/// Open a Linux I2C character device (e.g. `/dev/i2c-1`)
pub fn open_i2c<P: AsRef<Path>>(path: P, address: u8) -> Result<I2cBus<I2cdev>> {
    let path = path.as_ref();
    let i2c = I2cdev::new(path)
        .map_err(|e| Adxl345Error::BusOpen(format!("{}: {}", path.display(), e)))?;
    Ok(I2cBus::new(i2c, address))
}

/// Open and configure a Linux spidev node (e.g. `/dev/spidev0.0`) in SPI mode 3
pub fn open_spi<P: AsRef<Path>>(path: P, speed_hz: u32) -> Result<SpiBus<SpidevDevice>> {
    let path = path.as_ref();
    let mut spidev = Spidev::open(path)
        .map_err(|e| Adxl345Error::BusOpen(format!("{}: {}", path.display(), e)))?;

    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(speed_hz)
        .mode(SpiModeFlags::SPI_MODE_3)
        .build();
    spidev
        .configure(&options)
        .map_err(|e| Adxl345Error::BusOpen(format!("{}: {}", path.display(), e)))?;

    Ok(SpiBus::new(SpidevDevice(spidev)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};
    use embedded_hal::spi::{self, Operation as SpiOperation};
    use std::convert::Infallible;

    /// I2C double backed by a flat register file
    struct FakeI2c {
        registers: [u8; 0x40],
        pointer: usize,
        writes: Vec<(u8, Vec<u8>)>,
        fail: bool,
    }

    impl FakeI2c {
        fn new() -> Self {
            Self {
                registers: [0; 0x40],
                pointer: 0,
                writes: Vec::new(),
                fail: false,
            }
        }
    }

    impl ErrorType for FakeI2c {
        type Error = ErrorKind;
    }

    impl I2c for FakeI2c {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> std::result::Result<(), Self::Error> {
            if self.fail {
                return Err(ErrorKind::Bus);
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        self.writes.push((address, bytes.to_vec()));
                        self.pointer = bytes[0] as usize;
                        for (i, b) in bytes[1..].iter().enumerate() {
                            self.registers[self.pointer + i] = *b;
                        }
                    }
                    Operation::Read(buf) => {
                        for (i, b) in buf.iter_mut().enumerate() {
                            *b = self.registers[self.pointer + i];
                        }
                    }
                }
            }
            Ok(())
        }
    }

    /// SPI double that answers reads with an incrementing byte pattern
    struct FakeSpi {
        frames: Vec<Vec<u8>>,
    }

    impl spi::ErrorType for FakeSpi {
        type Error = Infallible;
    }

    impl SpiDevice for FakeSpi {
        fn transaction(
            &mut self,
            operations: &mut [SpiOperation<'_, u8>],
        ) -> std::result::Result<(), Self::Error> {
            for op in operations {
                match op {
                    SpiOperation::Write(bytes) => self.frames.push(bytes.to_vec()),
                    SpiOperation::TransferInPlace(buf) => {
                        self.frames.push(buf.to_vec());
                        for (i, b) in buf.iter_mut().enumerate().skip(1) {
                            *b = i as u8 * 0x11;
                        }
                    }
                    _ => {}
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_i2c_write_uses_address_and_pair() {
        let mut bus = I2cBus::new(FakeI2c::new(), I2C_ADDRESS_DEFAULT);
        bus.write_register(0x2D, 0x08).unwrap();
        let fake = bus.release();
        assert_eq!(fake.writes, vec![(0x53, vec![0x2D, 0x08])]);
        assert_eq!(fake.registers[0x2D], 0x08);
    }

    #[test]
    fn test_i2c_burst_read() {
        let mut fake = FakeI2c::new();
        fake.registers[0x32..0x38].copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        let mut bus = I2cBus::new(fake, I2C_ADDRESS_ALT);
        let mut buf = [0u8; 6];
        bus.read_registers(0x32, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_i2c_errors_map_to_taxonomy() {
        let mut fake = FakeI2c::new();
        fake.fail = true;
        let mut bus = I2cBus::new(fake, I2C_ADDRESS_DEFAULT);

        let err = bus.write_register(0x31, 0x0B).unwrap_err();
        assert!(matches!(err, Adxl345Error::ConfigurationFailure { register: 0x31, .. }));

        let mut buf = [0u8; 6];
        let err = bus.read_registers(0x32, &mut buf).unwrap_err();
        assert!(matches!(err, Adxl345Error::ReadFailure(_)));
    }

    #[test]
    fn test_configure_stops_at_first_failure() {
        struct Flaky {
            written: Vec<u8>,
        }
        impl RegisterBus for Flaky {
            fn write_register(&mut self, register: u8, _value: u8) -> Result<()> {
                if register == 0x31 {
                    return Err(Adxl345Error::ConfigurationFailure {
                        register,
                        reason: "nack".into(),
                    });
                }
                self.written.push(register);
                Ok(())
            }
            fn read_registers(&mut self, _start: u8, _buf: &mut [u8]) -> Result<()> {
                Ok(())
            }
        }

        let mut bus = Flaky { written: Vec::new() };
        let result = bus.configure(&[(0x2C, 0x0F), (0x31, 0x0B), (0x2D, 0x08)]);
        assert!(result.is_err());
        assert_eq!(bus.written, vec![0x2C]);
    }

    #[test]
    fn test_spi_read_sets_read_and_multi_bits() {
        let mut bus = SpiBus::new(FakeSpi { frames: Vec::new() });
        let mut buf = [0u8; 6];
        bus.read_registers(0x32, &mut buf).unwrap();
        assert_eq!(buf, [0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);

        let mut single = [0u8; 1];
        bus.read_registers(0x00, &mut single).unwrap();

        let fake = bus.release();
        assert_eq!(fake.frames[0][0], 0x32 | 0x80 | 0x40);
        assert_eq!(fake.frames[0].len(), 7);
        assert_eq!(fake.frames[1][0], 0x80);
    }

    #[test]
    fn test_spi_write_is_plain_pair() {
        let mut bus = SpiBus::new(FakeSpi { frames: Vec::new() });
        bus.write_register(0x2C, 0x0F).unwrap();
        assert_eq!(bus.release().frames, vec![vec![0x2C, 0x0F]]);
    }

    #[test]
    fn test_spi_rejects_oversized_burst() {
        let mut bus = SpiBus::new(FakeSpi { frames: Vec::new() });
        let mut buf = [0u8; MAX_BURST + 1];
        assert!(matches!(
            bus.read_registers(0x00, &mut buf),
            Err(Adxl345Error::InvalidParameter(_))
        ));
    }
}
