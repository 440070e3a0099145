// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sensor report decoding for the BNO08x driver.
//!
//! Input reports arrive on the sensor report channel with a common layout:
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0 | BASE_TIMESTAMP marker (0xFB) |
//! | 1..=4 | Base timestamp delta, little endian |
//! | 5 | Sensor report id |
//! | 6 | Report sequence number |
//! | 7 | Status: accuracy in bits 1:0, delay high bits in 7:2 |
//! | 8 | Delay low byte |
//! | 9.. | Report specific data |

use crate::{
    constants::{SensorReportId, Q_POINT_ANGULAR_VELOCITY},
    convert::{accuracy, base_timestamp, delay_micros, q_i16_to_f32},
    error::ReportError,
    events::{
        Activity, ActivityClassifierEvent, DataEvent3f, DataEventType, GyroIntegratedRvEvent,
        SensorEvent, Stability, StabilityClassifierEvent, StepCounterEvent, TapDetectorEvent,
        VectorEvent, ACTIVITY_CONFIDENCE_COUNT,
    },
};
use log::{debug, trace};

/// Bytes in front of the report specific data
pub const REPORT_HEADER_LEN: usize = 9;

/// Common fields of an input report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportHeader {
    pub timestamp: u64,
    pub report: SensorReportId,
    pub sequence: u8,
    pub status: u8,
    pub delay: u8,
}

impl ReportHeader {
    pub fn parse(body: &[u8]) -> Result<Self, ReportError> {
        if body.len() < REPORT_HEADER_LEN {
            return Err(ReportError::TooShort {
                len: body.len(),
                needed: REPORT_HEADER_LEN,
            });
        }
        if SensorReportId::from(body[0]) != SensorReportId::BaseTimestamp {
            return Err(ReportError::MissingTimestamp(body[0]));
        }
        Ok(Self {
            timestamp: base_timestamp(body[1], body[2], body[3], body[4]),
            report: SensorReportId::from(body[5]),
            sequence: body[6],
            status: body[7],
            delay: body[8],
        })
    }

    pub fn accuracy(&self) -> u8 {
        accuracy(self.status)
    }

    /// Report delay in microseconds
    pub fn delay_micros(&self) -> u64 {
        delay_micros(self.status, self.delay)
    }
}

/// Bounds-checked little-endian cursor over a report body
pub struct ReportParser<'a> {
    msg: &'a [u8],
    cursor: usize,
}

impl<'a> ReportParser<'a> {
    pub fn new(msg: &'a [u8], cursor: usize) -> Self {
        Self { msg, cursor }
    }

    pub fn remaining(&self) -> usize {
        self.msg.len().saturating_sub(self.cursor)
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.msg.get(self.cursor..self.cursor + N)?;
        self.cursor += N;
        bytes.try_into().ok()
    }

    #[inline]
    pub fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|b| b[0])
    }

    #[inline]
    pub fn read_i16(&mut self) -> Option<i16> {
        self.take::<2>().map(i16::from_le_bytes)
    }

    #[inline]
    pub fn read_u16(&mut self) -> Option<u16> {
        self.take::<2>().map(u16::from_le_bytes)
    }

    #[inline]
    pub fn read_u32(&mut self) -> Option<u32> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    /// Three Q-format values scaled to `f32`
    fn read_vec3(&mut self, q: u8) -> Option<[f32; 3]> {
        Some([
            q_i16_to_f32(self.read_i16()?, q),
            q_i16_to_f32(self.read_i16()?, q),
            q_i16_to_f32(self.read_i16()?, q),
        ])
    }
}

/// Decoder for one report layout. `None` means the payload was truncated.
pub type Decoder = fn(&ReportHeader, &mut ReportParser) -> Option<SensorEvent>;

/// Event type of the reports decoded as a plain three-axis reading
fn three_axis_type(report: SensorReportId) -> Option<DataEventType> {
    let event_type = match report {
        SensorReportId::Accelerometer => DataEventType::Accelerometer,
        SensorReportId::LinearAcceleration => DataEventType::AccelerometerLinear,
        SensorReportId::RawAccelerometer => DataEventType::AccelerometerRaw,
        SensorReportId::Gravity => DataEventType::Gravity,
        SensorReportId::Gyroscope => DataEventType::Gyroscope,
        SensorReportId::GyroUncalibrated => DataEventType::GyroscopeUncalibrated,
        SensorReportId::RawGyroscope => DataEventType::GyroscopeRaw,
        SensorReportId::MagneticField => DataEventType::Magnetometer,
        SensorReportId::MagneticFieldUncalibrated => DataEventType::MagnetometerUncalibrated,
        SensorReportId::RawMagnetometer => DataEventType::MagnetometerRaw,
        _ => return None,
    };
    Some(event_type)
}

fn vector_type(report: SensorReportId) -> Option<DataEventType> {
    let event_type = match report {
        SensorReportId::RotationVector => DataEventType::VectorRotation,
        SensorReportId::GameRotationVector => DataEventType::VectorGame,
        SensorReportId::GeomagneticRotationVector => DataEventType::VectorGeomagnetic,
        SensorReportId::ArvrStabilizedRotationVector => DataEventType::VectorArvrStabilized,
        SensorReportId::ArvrStabilizedGameRotationVector => {
            DataEventType::VectorArvrGameStabilized
        }
        _ => return None,
    };
    Some(event_type)
}

fn decode_three_axis(header: &ReportHeader, parser: &mut ReportParser) -> Option<SensorEvent> {
    let event_type = three_axis_type(header.report)?;
    let [x, y, z] = parser.read_vec3(event_type.q_point())?;
    Some(SensorEvent::Data(DataEvent3f {
        event_type,
        status: header.accuracy(),
        timestamp: header.timestamp,
        x,
        y,
        z,
    }))
}

fn decode_vector(header: &ReportHeader, parser: &mut ReportParser) -> Option<SensorEvent> {
    let event_type = vector_type(header.report)?;
    let q = event_type.q_point();
    let [x, y, z] = parser.read_vec3(q)?;
    let quat_real = q_i16_to_f32(parser.read_i16()?, q);
    let radian_accuracy = match event_type.accuracy_q_point() {
        Some(q_acc) => parser.read_i16().map(|raw| q_i16_to_f32(raw, q_acc)),
        None => None,
    };
    Some(SensorEvent::Vector(VectorEvent {
        event_type,
        status: header.accuracy(),
        timestamp: header.timestamp,
        x,
        y,
        z,
        quat_real,
        radian_accuracy,
    }))
}

fn decode_tap(header: &ReportHeader, parser: &mut ReportParser) -> Option<SensorEvent> {
    Some(SensorEvent::Tap(TapDetectorEvent {
        status: header.accuracy(),
        timestamp: header.timestamp,
        flags: parser.read_u8()?,
    }))
}

fn decode_stability(header: &ReportHeader, parser: &mut ReportParser) -> Option<SensorEvent> {
    Some(SensorEvent::Stability(StabilityClassifierEvent {
        status: header.accuracy(),
        timestamp: header.timestamp,
        stability: Stability::from(parser.read_u8()?),
    }))
}

fn decode_activity(header: &ReportHeader, parser: &mut ReportParser) -> Option<SensorEvent> {
    let page = parser.read_u8()?;
    let most_likely = Activity::from(parser.read_u8()?);
    let mut confidences = [0u8; ACTIVITY_CONFIDENCE_COUNT];
    for slot in confidences.iter_mut() {
        match parser.read_u8() {
            Some(value) => *slot = value,
            None => break,
        }
    }
    Some(SensorEvent::Activity(ActivityClassifierEvent {
        status: header.accuracy(),
        timestamp: header.timestamp,
        page,
        most_likely,
        confidences,
    }))
}

fn decode_step_counter(header: &ReportHeader, parser: &mut ReportParser) -> Option<SensorEvent> {
    let steps = parser.read_u16()?;
    let latency = parser.read_u32()?;
    Some(SensorEvent::StepCounter(StepCounterEvent {
        status: header.accuracy(),
        timestamp: header.timestamp,
        steps,
        latency,
    }))
}

fn decode_gyro_integrated_rv(
    header: &ReportHeader,
    parser: &mut ReportParser,
) -> Option<SensorEvent> {
    let q = DataEventType::GyroIntegratedRv.q_point();
    let [i, j, k] = parser.read_vec3(q)?;
    let real = q_i16_to_f32(parser.read_i16()?, q);
    let angular_velocity = parser.read_vec3(Q_POINT_ANGULAR_VELOCITY)?;
    Some(SensorEvent::GyroIntegratedRv(GyroIntegratedRvEvent {
        status: header.accuracy(),
        timestamp: header.timestamp,
        quaternion: [i, j, k, real],
        angular_velocity,
    }))
}

/// Dispatch table from report id to decoder
pub fn decoder_for(report: SensorReportId) -> Option<Decoder> {
    if three_axis_type(report).is_some() {
        return Some(decode_three_axis);
    }
    if vector_type(report).is_some() {
        return Some(decode_vector);
    }
    let decoder: Decoder = match report {
        SensorReportId::TapDetector => decode_tap,
        SensorReportId::StabilityClassifier => decode_stability,
        SensorReportId::PersonalActivityClassifier => decode_activity,
        SensorReportId::StepCounter => decode_step_counter,
        SensorReportId::GyroIntegratedRotationVector => decode_gyro_integrated_rv,
        _ => return None,
    };
    Some(decoder)
}

/// Decode the body of a sensor report channel packet.
///
/// Returns the parsed header alongside the event so the caller can use the
/// report delay. Reports without a decoder and truncated payloads yield
/// [`SensorEvent::Unhandled`].
pub fn decode_input_report(body: &[u8]) -> Result<(ReportHeader, SensorEvent), ReportError> {
    let header = ReportHeader::parse(body)?;
    let unhandled = SensorEvent::Unhandled {
        report: header.report,
        timestamp: header.timestamp,
    };

    let Some(decoder) = decoder_for(header.report) else {
        debug!("no decoder for report {:?}", header.report);
        return Ok((header, unhandled));
    };

    let mut parser = ReportParser::new(body, REPORT_HEADER_LEN);
    match decoder(&header, &mut parser) {
        Some(event) => {
            trace!("decoded {:?}", event);
            Ok((header, event))
        }
        None => {
            debug!(
                "truncated {:?} report, {} data bytes",
                header.report,
                body.len() - REPORT_HEADER_LEN
            );
            Ok((header, unhandled))
        }
    }
}

/// Decode a report body to an event, never failing. Bodies that are not
/// input reports decode to an unhandled event with timestamp 0.
pub fn decode_sensor_report(body: &[u8]) -> SensorEvent {
    match decode_input_report(body) {
        Ok((_, event)) => event,
        Err(e) => {
            debug!("not an input report: {}", e);
            SensorEvent::Unhandled {
                report: SensorReportId::from(body.first().copied().unwrap_or(0)),
                timestamp: 0,
            }
        }
    }
}
