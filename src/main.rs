// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

use bno08x_shtp::{
    interface::{i2c::DEFAULT_ADDRESS, ShtpTransport},
    BNO08x, SensorEvent, SensorReportId,
};
use clap::{Parser, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use log::{error, info, warn};
use std::{
    f32::consts::PI,
    process,
    num::ParseIntError,
    sync::mpsc,
    time::{Duration, Instant},
};

const RAD_TO_DEG: f32 = 180f32 / PI;

fn quaternion_to_euler(qr: f32, qi: f32, qj: f32, qk: f32) -> [f32; 3] {
    let sqr = qr * qr;
    let sqi = qi * qi;
    let sqj = qj * qj;
    let sqk = qk * qk;

    let yaw = (2.0 * (qi * qj + qk * qr)).atan2(sqi - sqj - sqk + sqr) * RAD_TO_DEG;
    let pitch = (-2.0 * (qi * qk - qj * qr) / (sqi + sqj + sqk + sqr)).asin() * RAD_TO_DEG;
    let roll = (2.0 * (qj * qk + qi * qr)).atan2(-sqi - sqj + sqk + sqr) * RAD_TO_DEG;

    [yaw, pitch, roll]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Bus {
    Spi,
    I2c,
}

/// Accepts `0x4A` as well as `74`
fn parse_address(s: &str) -> Result<u8, ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Report {
    Accelerometer,
    LinearAcceleration,
    Gravity,
    Gyroscope,
    Magnetometer,
    RotationVector,
    GameRotationVector,
    GeomagneticRotationVector,
    GyroIntegratedRotationVector,
    Tap,
    StepCounter,
    Stability,
    Activity,
}

impl From<Report> for SensorReportId {
    fn from(report: Report) -> Self {
        match report {
            Report::Accelerometer => SensorReportId::Accelerometer,
            Report::LinearAcceleration => SensorReportId::LinearAcceleration,
            Report::Gravity => SensorReportId::Gravity,
            Report::Gyroscope => SensorReportId::Gyroscope,
            Report::Magnetometer => SensorReportId::MagneticField,
            Report::RotationVector => SensorReportId::RotationVector,
            Report::GameRotationVector => SensorReportId::GameRotationVector,
            Report::GeomagneticRotationVector => SensorReportId::GeomagneticRotationVector,
            Report::GyroIntegratedRotationVector => SensorReportId::GyroIntegratedRotationVector,
            Report::Tap => SensorReportId::TapDetector,
            Report::StepCounter => SensorReportId::StepCounter,
            Report::Stability => SensorReportId::StabilityClassifier,
            Report::Activity => SensorReportId::PersonalActivityClassifier,
        }
    }
}

/// Stream one BNO08x sensor report over SPI or I2C.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Bus the hub is attached to
    #[arg(short, long, value_enum, default_value_t = Bus::Spi)]
    bus: Bus,
    /// SPI device, or I2C bus with `--bus i2c` (default /dev/i2c-1)
    #[arg(short, long)]
    device: Option<String>,
    /// I2C address of the hub
    #[arg(short, long, value_parser = parse_address, default_value_t = DEFAULT_ADDRESS)]
    address: u8,
    /// GPIO line name of the interrupt pin. Pass an empty name to run I2C
    /// without one.
    #[arg(long, default_value = "IMU_INT")]
    int_pin: String,
    /// GPIO line name of the reset pin (SPI only)
    #[arg(long, default_value = "IMU_RST")]
    rst_pin: String,
    /// Report to enable
    #[arg(short, long, value_enum, default_value_t = Report::RotationVector)]
    report: Report,
    /// Report interval in milliseconds
    #[arg(short, long, default_value_t = 50)]
    interval: u64,
    /// Run motion engine calibration, waiting at most this many milliseconds
    /// for the device to accept it
    #[arg(long)]
    calibrate: Option<u64>,
    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<u64>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn print_event(event: &SensorEvent) {
    match event {
        SensorEvent::Vector(v) => {
            let [yaw, pitch, roll] = quaternion_to_euler(v.quat_real, v.x, v.y, v.z);
            println!(
                "{:>12} {:?} yaw {:7.2} pitch {:7.2} roll {:7.2}",
                v.timestamp, v.event_type, yaw, pitch, roll
            );
        }
        SensorEvent::Data(d) => println!(
            "{:>12} {:?} {:9.4} {:9.4} {:9.4} (status {})",
            d.timestamp, d.event_type, d.x, d.y, d.z, d.status
        ),
        SensorEvent::GyroIntegratedRv(g) => println!(
            "{:>12} GyroIntegratedRv {:?} {:?}",
            g.timestamp, g.quaternion, g.angular_velocity
        ),
        SensorEvent::StepCounter(s) => println!("{:>12} steps {}", s.timestamp, s.steps),
        SensorEvent::Tap(t) => println!(
            "{:>12} tap 0x{:02X}{}",
            t.timestamp,
            t.flags,
            if t.is_double_tap() { " double" } else { "" }
        ),
        SensorEvent::Stability(s) => println!("{:>12} {:?}", s.timestamp, s.stability),
        SensorEvent::Activity(a) => println!(
            "{:>12} {:?} ({}%)",
            a.timestamp,
            a.most_likely,
            a.confidence(a.most_likely)
        ),
        SensorEvent::Unhandled { report, .. } => warn!("unhandled report {:?}", report),
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.bus {
        Bus::Spi => {
            let device = cli.device.as_deref().unwrap_or("/dev/spidev1.0");
            stream(
                BNO08x::new_spi_from_symbol(device, &cli.int_pin, &cli.rst_pin)?,
                &cli,
            )
        }
        Bus::I2c => {
            let device = cli.device.as_deref().unwrap_or("/dev/i2c-1");
            info!("I2C {} address 0x{:02X}", device, cli.address);
            if cli.int_pin.is_empty() {
                stream(BNO08x::new_i2c(device, cli.address)?, &cli)
            } else {
                stream(
                    BNO08x::new_i2c_from_symbol(device, cli.address, &cli.int_pin)?,
                    &cli,
                )
            }
        }
    }
}

fn stream<T>(imu: BNO08x<T>, cli: &Cli) -> Result<(), Box<dyn std::error::Error>>
where
    T: ShtpTransport + Send + 'static,
    T::Error: 'static,
{
    let (tx, rx) = mpsc::channel();
    imu.add_listener("stdout", move |event: &SensorEvent| {
        let _ = tx.send(event.clone());
    });

    if !imu.init()? {
        return Err("device did not answer the product id request".into());
    }
    if let Some(product_id) = imu.product_id() {
        info!(
            "BNO08x firmware {}.{}.{} build {}, reset cause {}",
            product_id.sw_version_major,
            product_id.sw_version_minor,
            product_id.sw_version_patch,
            product_id.sw_build_number,
            product_id.reset_cause
        );
    }

    let report = SensorReportId::from(cli.report);
    if !imu.start(report, Duration::from_millis(cli.interval))? {
        return Err(format!("{:?} was not enabled", report).into());
    }

    if let Some(timeout) = cli.calibrate {
        let handle = imu.calibrate(Duration::from_millis(timeout))?;
        match handle.join() {
            Ok(true) => info!("calibration started"),
            _ => warn!("calibration command was not sent"),
        }
    }

    let deadline = cli
        .duration
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    loop {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(event) => print_event(&event),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if !imu.is_active() {
                    return Err("report reader stopped".into());
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    if imu.was_reset() {
        warn!("device reset while streaming, reason {}", imu.reset_reason());
    }
    imu.stop()?;
    imu.shutdown();
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .parse_default_env()
        .init();

    if let Err(e) = run(cli) {
        error!("{}", e);
        process::exit(1);
    }
}
