//! ADXL345 reader - live display or buffered capture to CSV
//!
//! Usage:
//!   adxl345-reader --freq 100
//!   adxl345-reader --save data.csv --freq 1000 --duration 60
//!   adxl345-reader --bus spi --save data.csv --freq 3200 --resample

use adxl345_logger::bus::{self, RegisterBus};
use adxl345_logger::csv_format::DEFAULT_CAPACITY;
use adxl345_logger::logger::init_logger;
use adxl345_logger::{
    Acquisition, AcquisitionConfig, Adxl345, Adxl345Error, BufferedWriter, ConsoleSink,
    InterruptFlag, KeyboardStop, OperatorControls, Pacing, ResamplingSink, SampleSink, Session,
    FREQ_DEFAULT,
};
use clap::{Parser, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BusKind {
    I2c,
    Spi,
}

#[derive(Parser, Debug)]
#[command(name = "adxl345-reader", version)]
#[command(about = "Read ADXL345 accelerometer data over I2C or SPI", long_about = None)]
struct Args {
    /// Save data to this CSV file instead of printing it
    #[arg(short, long)]
    save: Option<PathBuf>,

    /// Sampling rate in Hz (clamped to 1-3200)
    #[arg(short, long, default_value_t = FREQ_DEFAULT)]
    freq: f64,

    /// Stop after this many seconds (runs until Q / Ctrl+C if omitted)
    #[arg(short, long)]
    duration: Option<f64>,

    /// Bus the sensor is wired to
    #[arg(short, long, value_enum, default_value_t = BusKind::I2c)]
    bus: BusKind,

    /// Bus device node (default: /dev/i2c-1 or /dev/spidev0.0)
    #[arg(long)]
    device: Option<PathBuf>,

    /// I2C address (0x53, or 0x1D with ALT ADDRESS high)
    #[arg(long, value_parser = parse_address, default_value = "0x53")]
    address: u8,

    /// SPI clock in Hz
    #[arg(long, default_value_t = bus::SPI_SPEED_DEFAULT)]
    spi_speed: u32,

    /// Capture as fast as the bus allows, then resample to --freq (requires --save)
    #[arg(long)]
    resample: bool,

    /// Readings buffered in memory between file writes
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    buffer: usize,
}

fn parse_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid I2C address '{}': {}", s, e))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let args = Args::parse();

    if args.resample && args.save.is_none() {
        return Err(Box::new(Adxl345Error::InvalidParameter(
            "--resample requires --save".to_string(),
        )));
    }

    let duration = args
        .duration
        .map(|secs| {
            Duration::try_from_secs_f64(secs).map_err(|_| {
                Adxl345Error::InvalidParameter(format!("invalid duration: {} s", secs))
            })
        })
        .transpose()?;

    let config = AcquisitionConfig {
        duration,
        pacing: if args.resample { Pacing::Unpaced } else { Pacing::Fixed },
        ..AcquisitionConfig::with_frequency(args.freq)
    };

    // Installed before the bus is opened so an early Ctrl+C is not lost
    let interrupt = InterruptFlag::install()?;

    match args.bus {
        BusKind::I2c => {
            let path = args.device.clone().unwrap_or_else(|| PathBuf::from("/dev/i2c-1"));
            log::info!("Opening {} (I2C address 0x{:02X})", path.display(), args.address);
            let bus = bus::open_i2c(&path, args.address)?;
            acquire(bus, &args, config, interrupt)
        }
        BusKind::Spi => {
            let path = args.device.clone().unwrap_or_else(|| PathBuf::from("/dev/spidev0.0"));
            log::info!("Opening {} (SPI mode 3, {} Hz)", path.display(), args.spi_speed);
            let bus = bus::open_spi(&path, args.spi_speed)?;
            acquire(bus, &args, config, interrupt)
        }
    }
}

/// Identify and configure the sensor, then run one session in the chosen mode
fn acquire<B: RegisterBus>(
    bus: B,
    args: &Args,
    config: AcquisitionConfig,
    interrupt: InterruptFlag,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sensor = match Adxl345::new(bus) {
        Ok(s) => s,
        Err(Adxl345Error::DeviceNotFound(id)) => {
            eprintln!("Error: ADXL345 not found (ID = 0x{:02X})", id);
            eprintln!("Please check:");
            eprintln!("  1. Wiring and the selected bus / device node");
            eprintln!("  2. I2C address (SDO/ALT ADDRESS pin) or SPI chip select");
            eprintln!("  3. Sensor supply voltage");
            return Err(Box::new(Adxl345Error::DeviceNotFound(id)));
        }
        Err(e) => return Err(Box::new(e)),
    };

    let acquisition = Acquisition::new(config);
    let frequency = acquisition.config().frequency;

    match &args.save {
        None => {
            let session = run_interactive(&acquisition, &mut sensor, interrupt, |raw| {
                Box::new(ConsoleSink::stdout().raw_terminal(raw))
            })?;
            println!("{}", session.summary);
            session.into_result()?;
        }
        Some(path) => {
            let writer = BufferedWriter::create(path, args.buffer)?;
            log::info!("Saving to {} at {} Hz", path.display(), frequency);

            let (session, rows) = if args.resample {
                let mut sink = ResamplingSink::new(writer, frequency);
                let session = run_interactive(&acquisition, &mut sensor, interrupt, |_| {
                    Box::new(&mut sink)
                })?;
                log::info!("Raw capture: {}", session.summary);
                (session, sink.writer().sample_count())
            } else {
                let mut sink = writer;
                let session =
                    run_interactive(&acquisition, &mut sensor, interrupt, |_| Box::new(&mut sink))?;
                (session, sink.sample_count())
            };

            let elapsed = session.summary.elapsed;
            println!(
                "Saved {} samples in {:.2} seconds ({:.1} Hz) to {}",
                rows,
                elapsed,
                if elapsed > 0.0 { rows as f64 / elapsed } else { 0.0 },
                path.display()
            );
            session.into_result()?;
        }
    }

    Ok(())
}

/// Run a session with Ctrl+C and, on a terminal, `q` as stop controls
///
/// Raw mode is released before returning so the caller prints normally.
fn run_interactive<'s, B, F>(
    acquisition: &Acquisition,
    sensor: &mut Adxl345<B>,
    interrupt: InterruptFlag,
    make_sink: F,
) -> Result<Session, Adxl345Error>
where
    B: RegisterBus,
    F: FnOnce(bool) -> Box<dyn SampleSink + 's>,
{
    println!("Press Q to stop");
    let keyboard = if std::io::stdin().is_terminal() {
        Some(KeyboardStop::enable()?)
    } else {
        None
    };

    let mut controls = OperatorControls::new(interrupt, keyboard);
    let mut sink = make_sink(controls.raw_terminal());

    let session = acquisition.run(sensor, &mut controls, &mut *sink);
    drop(controls);

    if let Some(e) = &session.error {
        log::error!("Session ended with a fault: {}", e);
    }
    Ok(session)
}
