// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Constants for the BNO08x sensor hub transport protocol.
//!
//! This module contains the closed code spaces used on the wire: SHTP
//! channels, control report IDs, sensor report IDs and command IDs. Every
//! table resolves unknown codes to a catch-all variant instead of failing, so
//! reports from newer firmware never abort decoding.

use num_enum::{FromPrimitive, IntoPrimitive};

/// Buffer sizes
pub const PACKET_SEND_BUF_LEN: usize = 256;
pub const PACKET_RECV_BUF_LEN: usize = 2048;
pub const NUM_CHANNELS: usize = 6;

/// Size of the SHTP header: length LSB, length MSB, channel, sequence number
pub const SHTP_HEADER_SIZE: usize = 4;

/// Write byte clocked out while polling for a handshake response
pub const RECEIVE_WRITE_BYTE: u8 = 0xFF;
/// Write byte clocked out by the continuous report reader
pub const RECEIVE_WRITE_BYTE_CONTINUAL: u8 = 0x00;

/// Microseconds per tick of the 14-bit report delay field
pub const REPORT_DELAY_TICK_US: u64 = 100;

// =============================================================================
// SHTP Communication Channels
// =============================================================================

/// The BNO08x multiplexes six logical channels over one bus connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum Channel {
    /// SHTP command channel (advertisement, error list)
    Command = 0,
    /// Executable channel (reset, sleep, wake)
    Executable = 1,
    /// Sensor hub control channel
    Control = 2,
    /// Input sensor reports (non-wake, not gyroRV)
    Reports = 3,
    /// Wake input sensor reports
    WakeReports = 4,
    /// Gyro rotation vector
    Gyro = 5,
    /// Any channel number outside 0..=5
    #[num_enum(catch_all)]
    None(u8),
}

impl Channel {
    /// Numeric code of the channel, -1 for the `None` sentinel
    pub fn code(self) -> i16 {
        match self {
            Channel::None(_) => -1,
            known => u8::from(known) as i16,
        }
    }

    /// Index into per-channel tables such as sequence counters
    pub fn index(self) -> Option<usize> {
        match self {
            Channel::None(_) => None,
            known => Some(u8::from(known) as usize),
        }
    }
}

/// A report code together with the channel that carries it.
pub trait ShtpReportId: Copy {
    /// Wire code, written as body[0]
    fn id(self) -> u8;
    /// Owning channel
    fn channel(self) -> Channel;
}

// =============================================================================
// Control Channel Reports (SH-2)
// =============================================================================

/// Reports exchanged on the sensor hub control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum ControlReportId {
    /// Advertisement response, sent on the command channel
    Advertisement = 0x00,
    FlushCompleted = 0xEF,
    ForceSensorFlush = 0xF0,
    CommandResponse = 0xF1,
    CommandRequest = 0xF2,
    FrsReadResponse = 0xF3,
    FrsReadRequest = 0xF4,
    FrsWriteResponse = 0xF5,
    FrsWriteDataRequest = 0xF6,
    FrsWriteRequest = 0xF7,
    ProductIdResponse = 0xF8,
    ProductIdRequest = 0xF9,
    BaseTimestamp = 0xFB,
    GetFeatureResponse = 0xFC,
    SetFeatureCommand = 0xFD,
    GetFeatureRequest = 0xFE,
    #[num_enum(catch_all)]
    None(u8),
}

impl ShtpReportId for ControlReportId {
    fn id(self) -> u8 {
        self.into()
    }

    fn channel(self) -> Channel {
        match self {
            ControlReportId::Advertisement => Channel::Command,
            _ => Channel::Control,
        }
    }
}

// =============================================================================
// Sensor Report IDs (from SH2 Reference Manual)
// =============================================================================

/// Input reports delivered on the sensor report channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum SensorReportId {
    /// Accelerometer (m/s^2 including gravity): Q point 8
    Accelerometer = 0x01,
    /// Gyroscope calibrated (rad/s): Q point 9
    Gyroscope = 0x02,
    /// Magnetic field calibrated (uTesla): Q point 4
    MagneticField = 0x03,
    /// Linear acceleration (m/s^2 minus gravity): Q point 8
    LinearAcceleration = 0x04,
    /// Unit quaternion rotation vector with heading accuracy (radians), all
    /// fields Q point 14
    RotationVector = 0x05,
    /// Gravity vector: Q point 8
    Gravity = 0x06,
    /// Gyroscope uncalibrated (rad/s): Q point 9
    GyroUncalibrated = 0x07,
    /// Game rotation vector: Q point 14
    GameRotationVector = 0x08,
    /// Geomagnetic rotation vector with heading accuracy: Q point 14
    GeomagneticRotationVector = 0x09,
    Pressure = 0x0A,
    AmbientLight = 0x0B,
    Humidity = 0x0C,
    Proximity = 0x0D,
    Temperature = 0x0E,
    MagneticFieldUncalibrated = 0x0F,
    TapDetector = 0x10,
    StepCounter = 0x11,
    SignificantMotion = 0x12,
    StabilityClassifier = 0x13,
    RawAccelerometer = 0x14,
    RawGyroscope = 0x15,
    RawMagnetometer = 0x16,
    StepDetector = 0x18,
    ShakeDetector = 0x19,
    FlipDetector = 0x1A,
    PickupDetector = 0x1B,
    StabilityDetector = 0x1C,
    PersonalActivityClassifier = 0x1E,
    SleepDetector = 0x1F,
    TiltDetector = 0x20,
    PocketDetector = 0x21,
    CircleDetector = 0x22,
    HeartRateMonitor = 0x23,
    ArvrStabilizedRotationVector = 0x28,
    ArvrStabilizedGameRotationVector = 0x29,
    GyroIntegratedRotationVector = 0x2A,
    IzroMotionRequest = 0x2B,
    /// Marker preceding every batch of input reports
    BaseTimestamp = 0xFB,
    #[num_enum(catch_all)]
    None(u8),
}

impl SensorReportId {
    pub fn is_none(self) -> bool {
        matches!(self, SensorReportId::None(_))
    }
}

impl ShtpReportId for SensorReportId {
    fn id(self) -> u8 {
        self.into()
    }

    fn channel(self) -> Channel {
        Channel::Reports
    }
}

// =============================================================================
// Command IDs (body[2] of COMMAND_REQUEST / COMMAND_RESPONSE)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum CommandId {
    Errors = 1,
    Counter = 2,
    Tare = 3,
    Initialize = 4,
    /// Save dynamic calibration data
    Dcd = 6,
    MeCalibrate = 7,
    DcdPeriodSave = 9,
    Oscillator = 10,
    /// Clear dynamic calibration data and reset
    ClearDcd = 11,
    #[num_enum(catch_all)]
    None(u8),
}

// =============================================================================
// Executable/Device Channel Commands
// =============================================================================

/// Reset command
pub const EXECUTABLE_DEVICE_CMD_RESET: u8 = 1;
/// Wake (on) command
pub const EXECUTABLE_DEVICE_CMD_ON: u8 = 2;
/// Sleep command
pub const EXECUTABLE_DEVICE_CMD_SLEEP: u8 = 3;
/// Reset complete response
pub const EXECUTABLE_DEVICE_RESP_RESET_COMPLETE: u8 = 1;

// =============================================================================
// Command Channel Responses
// =============================================================================

/// Advertisement response
pub const CMD_RESP_ADVERTISEMENT: u8 = 0;
/// Error list response
pub const CMD_RESP_ERROR_LIST: u8 = 1;

// =============================================================================
// Tare and Calibration Sub-commands
// =============================================================================

pub const TARE_NOW: u8 = 0;
pub const TARE_PERSIST: u8 = 1;
pub const TARE_SET_REORIENTATION: u8 = 2;

/// Tare axes bitmask
pub const TARE_AXIS_X: u8 = 0x01;
pub const TARE_AXIS_Y: u8 = 0x02;
pub const TARE_AXIS_Z: u8 = 0x04;
pub const TARE_AXIS_ALL: u8 = TARE_AXIS_X | TARE_AXIS_Y | TARE_AXIS_Z;

/// Rotation vector used as the tare reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(u8)]
pub enum TareBasis {
    RotationVector = 0,
    GamingRotationVector = 1,
    GeomagneticRotationVector = 2,
}

/// Body length of every COMMAND_REQUEST
pub const COMMAND_REQUEST_LEN: usize = 12;
/// Body length of a SET_FEATURE command
pub const SET_FEATURE_LEN: usize = 17;

// =============================================================================
// Q-Point Tables for Fixed-Point Conversion
// =============================================================================

/// Q point of the gyro-integrated rotation vector angular velocity
pub const Q_POINT_ANGULAR_VELOCITY: u8 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_codes() {
        assert_eq!(Channel::from(0), Channel::Command);
        assert_eq!(Channel::from(1), Channel::Executable);
        assert_eq!(Channel::from(2), Channel::Control);
        assert_eq!(Channel::from(3), Channel::Reports);
        assert_eq!(Channel::from(4), Channel::WakeReports);
        assert_eq!(Channel::from(5), Channel::Gyro);
        assert_eq!(Channel::from(6), Channel::None(6));
        assert_eq!(Channel::None(9).code(), -1);
        assert_eq!(Channel::Gyro.code(), 5);
        assert_eq!(Channel::Reports.index(), Some(3));
        assert_eq!(Channel::None(200).index(), None);
    }

    #[test]
    fn test_sensor_report_lookup() {
        assert_eq!(SensorReportId::from(0x01), SensorReportId::Accelerometer);
        assert_eq!(SensorReportId::from(0x05), SensorReportId::RotationVector);
        assert_eq!(SensorReportId::from(0x10), SensorReportId::TapDetector);
        assert_eq!(SensorReportId::from(0x11), SensorReportId::StepCounter);
        assert_eq!(SensorReportId::from(0x13), SensorReportId::StabilityClassifier);
        assert_eq!(
            SensorReportId::from(0x1E),
            SensorReportId::PersonalActivityClassifier
        );
        assert_eq!(
            SensorReportId::from(0x2A),
            SensorReportId::GyroIntegratedRotationVector
        );
        assert_eq!(SensorReportId::from(0xFB), SensorReportId::BaseTimestamp);
    }

    #[test]
    fn test_unknown_codes_resolve_to_none() {
        assert!(SensorReportId::from(0xFF).is_none());
        assert!(SensorReportId::from(0x17).is_none());
        assert_eq!(ControlReportId::from(0x42), ControlReportId::None(0x42));
        assert_eq!(CommandId::from(5), CommandId::None(5));
    }

    #[test]
    fn test_report_channels() {
        assert_eq!(SensorReportId::Accelerometer.channel(), Channel::Reports);
        assert_eq!(SensorReportId::from(0xEE).channel(), Channel::Reports);
        assert_eq!(ControlReportId::ProductIdResponse.channel(), Channel::Control);
        assert_eq!(ControlReportId::Advertisement.channel(), Channel::Command);
        assert_eq!(ControlReportId::GetFeatureResponse.id(), 0xFC);
    }

    #[test]
    fn test_command_ids() {
        assert_eq!(u8::from(CommandId::MeCalibrate), 7);
        assert_eq!(u8::from(CommandId::ClearDcd), 11);
        assert_eq!(CommandId::from(6), CommandId::Dcd);
    }

    #[test]
    fn test_buffer_sizes() {
        assert!(PACKET_RECV_BUF_LEN > PACKET_SEND_BUF_LEN);
        assert!(SET_FEATURE_LEN + SHTP_HEADER_SIZE < PACKET_SEND_BUF_LEN);
    }
}
