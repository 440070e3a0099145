// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Decoded sensor events and the listener interface.

use crate::constants::SensorReportId;
use num_enum::{FromPrimitive, IntoPrimitive};

/// Event kind of a decoded report together with the Q point used to scale
/// its fixed-point fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataEventType {
    Accelerometer,
    AccelerometerLinear,
    AccelerometerRaw,
    Gravity,
    Gyroscope,
    GyroscopeUncalibrated,
    GyroscopeRaw,
    Magnetometer,
    MagnetometerUncalibrated,
    MagnetometerRaw,
    VectorRotation,
    VectorGame,
    VectorGeomagnetic,
    VectorArvrStabilized,
    VectorArvrGameStabilized,
    GyroIntegratedRv,
    TapDetector,
    StepCounter,
    StabilityClassifier,
    ActivityClassifier,
}

impl DataEventType {
    pub fn q_point(self) -> u8 {
        match self {
            DataEventType::Accelerometer
            | DataEventType::AccelerometerLinear
            | DataEventType::Gravity => 8,
            DataEventType::Gyroscope | DataEventType::GyroscopeUncalibrated => 9,
            DataEventType::Magnetometer | DataEventType::MagnetometerUncalibrated => 4,
            DataEventType::VectorRotation
            | DataEventType::VectorGame
            | DataEventType::VectorGeomagnetic
            | DataEventType::VectorArvrStabilized
            | DataEventType::VectorArvrGameStabilized
            | DataEventType::GyroIntegratedRv => 14,
            _ => 0,
        }
    }

    /// Q point of the heading accuracy field, for rotation vectors that
    /// carry one. It shares the quaternion's scale.
    pub fn accuracy_q_point(self) -> Option<u8> {
        match self {
            DataEventType::VectorRotation
            | DataEventType::VectorGeomagnetic
            | DataEventType::VectorArvrStabilized => Some(self.q_point()),
            _ => None,
        }
    }

    /// Sensor report that produces this event type
    pub fn report_id(self) -> SensorReportId {
        match self {
            DataEventType::Accelerometer => SensorReportId::Accelerometer,
            DataEventType::AccelerometerLinear => SensorReportId::LinearAcceleration,
            DataEventType::AccelerometerRaw => SensorReportId::RawAccelerometer,
            DataEventType::Gravity => SensorReportId::Gravity,
            DataEventType::Gyroscope => SensorReportId::Gyroscope,
            DataEventType::GyroscopeUncalibrated => SensorReportId::GyroUncalibrated,
            DataEventType::GyroscopeRaw => SensorReportId::RawGyroscope,
            DataEventType::Magnetometer => SensorReportId::MagneticField,
            DataEventType::MagnetometerUncalibrated => SensorReportId::MagneticFieldUncalibrated,
            DataEventType::MagnetometerRaw => SensorReportId::RawMagnetometer,
            DataEventType::VectorRotation => SensorReportId::RotationVector,
            DataEventType::VectorGame => SensorReportId::GameRotationVector,
            DataEventType::VectorGeomagnetic => SensorReportId::GeomagneticRotationVector,
            DataEventType::VectorArvrStabilized => SensorReportId::ArvrStabilizedRotationVector,
            DataEventType::VectorArvrGameStabilized => {
                SensorReportId::ArvrStabilizedGameRotationVector
            }
            DataEventType::GyroIntegratedRv => SensorReportId::GyroIntegratedRotationVector,
            DataEventType::TapDetector => SensorReportId::TapDetector,
            DataEventType::StepCounter => SensorReportId::StepCounter,
            DataEventType::StabilityClassifier => SensorReportId::StabilityClassifier,
            DataEventType::ActivityClassifier => SensorReportId::PersonalActivityClassifier,
        }
    }
}

/// Generic three-axis reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataEvent3f {
    pub event_type: DataEventType,
    /// Accuracy, 0 (unreliable) to 3 (high)
    pub status: u8,
    pub timestamp: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Rotation vector: quaternion i, j, k as x, y, z plus the real part
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorEvent {
    pub event_type: DataEventType,
    pub status: u8,
    pub timestamp: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub quat_real: f32,
    /// Heading accuracy estimate in radians
    pub radian_accuracy: Option<f32>,
}

impl VectorEvent {
    /// Quaternion as [i, j, k, real]
    pub fn quaternion(&self) -> [f32; 4] {
        [self.x, self.y, self.z, self.quat_real]
    }
}

pub const TAP_X: u8 = 0x01;
pub const TAP_X_POSITIVE: u8 = 0x02;
pub const TAP_Y: u8 = 0x04;
pub const TAP_Y_POSITIVE: u8 = 0x08;
pub const TAP_Z: u8 = 0x10;
pub const TAP_Z_POSITIVE: u8 = 0x20;
pub const TAP_DOUBLE: u8 = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapDetectorEvent {
    pub status: u8,
    pub timestamp: u64,
    pub flags: u8,
}

impl TapDetectorEvent {
    pub fn is_tap_x(&self) -> bool {
        self.flags & TAP_X != 0
    }

    pub fn is_tap_x_positive(&self) -> bool {
        self.flags & TAP_X_POSITIVE != 0
    }

    pub fn is_tap_y(&self) -> bool {
        self.flags & TAP_Y != 0
    }

    pub fn is_tap_y_positive(&self) -> bool {
        self.flags & TAP_Y_POSITIVE != 0
    }

    pub fn is_tap_z(&self) -> bool {
        self.flags & TAP_Z != 0
    }

    pub fn is_tap_z_positive(&self) -> bool {
        self.flags & TAP_Z_POSITIVE != 0
    }

    pub fn is_double_tap(&self) -> bool {
        self.flags & TAP_DOUBLE != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum Stability {
    OnTable = 1,
    Stationary = 2,
    Stable = 3,
    Motion = 4,
    #[num_enum(catch_all)]
    Unknown(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityClassifierEvent {
    pub status: u8,
    pub timestamp: u64,
    pub stability: Stability,
}

/// Number of confidence slots in an activity classifier report
pub const ACTIVITY_CONFIDENCE_COUNT: usize = 10;

/// Activity codes; a code doubles as the index of its confidence slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum Activity {
    InVehicle = 1,
    OnBicycle = 2,
    OnFoot = 3,
    Still = 4,
    Tilting = 5,
    Walking = 6,
    Running = 7,
    OnStairs = 8,
    #[num_enum(catch_all)]
    Unknown(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityClassifierEvent {
    pub status: u8,
    pub timestamp: u64,
    /// Page number (bits 6:0) and end-of-sequence flag (bit 7)
    pub page: u8,
    pub most_likely: Activity,
    /// Confidence 0-100 per activity code
    pub confidences: [u8; ACTIVITY_CONFIDENCE_COUNT],
}

impl ActivityClassifierEvent {
    pub fn confidence(&self, activity: Activity) -> u8 {
        let index = u8::from(activity) as usize;
        self.confidences.get(index).copied().unwrap_or(0)
    }

    pub fn is_last_page(&self) -> bool {
        self.page & 0x80 != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepCounterEvent {
    pub status: u8,
    pub timestamp: u64,
    pub steps: u16,
    /// Detection latency in microseconds
    pub latency: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GyroIntegratedRvEvent {
    pub status: u8,
    pub timestamp: u64,
    /// Quaternion [i, j, k, real]
    pub quaternion: [f32; 4],
    /// Angular velocity [x, y, z] in rad/s
    pub angular_velocity: [f32; 3],
}

/// One decoded input report.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    Data(DataEvent3f),
    Vector(VectorEvent),
    Tap(TapDetectorEvent),
    Stability(StabilityClassifierEvent),
    Activity(ActivityClassifierEvent),
    StepCounter(StepCounterEvent),
    GyroIntegratedRv(GyroIntegratedRvEvent),
    /// Report the decoder has no layout for, or a truncated payload
    Unhandled { report: SensorReportId, timestamp: u64 },
}

impl SensorEvent {
    pub fn timestamp(&self) -> u64 {
        match self {
            SensorEvent::Data(e) => e.timestamp,
            SensorEvent::Vector(e) => e.timestamp,
            SensorEvent::Tap(e) => e.timestamp,
            SensorEvent::Stability(e) => e.timestamp,
            SensorEvent::Activity(e) => e.timestamp,
            SensorEvent::StepCounter(e) => e.timestamp,
            SensorEvent::GyroIntegratedRv(e) => e.timestamp,
            SensorEvent::Unhandled { timestamp, .. } => *timestamp,
        }
    }

    /// Accuracy/status bits, `None` for unhandled reports
    pub fn status(&self) -> Option<u8> {
        match self {
            SensorEvent::Data(e) => Some(e.status),
            SensorEvent::Vector(e) => Some(e.status),
            SensorEvent::Tap(e) => Some(e.status),
            SensorEvent::Stability(e) => Some(e.status),
            SensorEvent::Activity(e) => Some(e.status),
            SensorEvent::StepCounter(e) => Some(e.status),
            SensorEvent::GyroIntegratedRv(e) => Some(e.status),
            SensorEvent::Unhandled { .. } => None,
        }
    }

    pub fn event_type(&self) -> Option<DataEventType> {
        match self {
            SensorEvent::Data(e) => Some(e.event_type),
            SensorEvent::Vector(e) => Some(e.event_type),
            SensorEvent::Tap(_) => Some(DataEventType::TapDetector),
            SensorEvent::Stability(_) => Some(DataEventType::StabilityClassifier),
            SensorEvent::Activity(_) => Some(DataEventType::ActivityClassifier),
            SensorEvent::StepCounter(_) => Some(DataEventType::StepCounter),
            SensorEvent::GyroIntegratedRv(_) => Some(DataEventType::GyroIntegratedRv),
            SensorEvent::Unhandled { .. } => None,
        }
    }

    pub fn is_handled(&self) -> bool {
        !matches!(self, SensorEvent::Unhandled { .. })
    }
}

/// Receives decoded events on the reader thread. Implementations should hand
/// work off quickly; the next packet is not read until `on_event` returns.
pub trait SensorListener: Send + Sync {
    fn on_event(&self, event: &SensorEvent);
}

impl<F> SensorListener for F
where
    F: Fn(&SensorEvent) + Send + Sync,
{
    fn on_event(&self, event: &SensorEvent) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_q_points() {
        assert_eq!(DataEventType::Accelerometer.q_point(), 8);
        assert_eq!(DataEventType::Gyroscope.q_point(), 9);
        assert_eq!(DataEventType::Magnetometer.q_point(), 4);
        assert_eq!(DataEventType::AccelerometerRaw.q_point(), 0);
        assert_eq!(DataEventType::GyroIntegratedRv.q_point(), 14);
        assert_eq!(DataEventType::VectorRotation.accuracy_q_point(), Some(14));
        assert_eq!(DataEventType::VectorGeomagnetic.accuracy_q_point(), Some(14));
        assert_eq!(DataEventType::VectorGame.accuracy_q_point(), None);
    }

    #[test]
    fn test_tap_flags() {
        let tap = TapDetectorEvent {
            status: 3,
            timestamp: 0,
            flags: TAP_Z | TAP_Z_POSITIVE | TAP_DOUBLE,
        };
        assert!(tap.is_tap_z());
        assert!(tap.is_tap_z_positive());
        assert!(tap.is_double_tap());
        assert!(!tap.is_tap_x());
        assert!(!tap.is_tap_y_positive());
    }

    #[test]
    fn test_classifier_codes() {
        assert_eq!(Stability::from(1), Stability::OnTable);
        assert_eq!(Stability::from(4), Stability::Motion);
        assert_eq!(Stability::from(0), Stability::Unknown(0));
        assert_eq!(Stability::from(9), Stability::Unknown(9));
        assert_eq!(Activity::from(8), Activity::OnStairs);
        assert_eq!(Activity::from(42), Activity::Unknown(42));
    }

    #[test]
    fn test_activity_confidence() {
        let mut confidences = [0u8; ACTIVITY_CONFIDENCE_COUNT];
        confidences[6] = 80;
        confidences[4] = 15;
        let event = ActivityClassifierEvent {
            status: 2,
            timestamp: 10,
            page: 0x80,
            most_likely: Activity::Walking,
            confidences,
        };
        assert_eq!(event.confidence(Activity::Walking), 80);
        assert_eq!(event.confidence(Activity::Still), 15);
        assert_eq!(event.confidence(Activity::Unknown(200)), 0);
        assert!(event.is_last_page());
    }

    #[test]
    fn test_closure_listener() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let count = AtomicUsize::new(0);
        let listener = |_: &SensorEvent| {
            count.fetch_add(1, Ordering::SeqCst);
        };
        let event = SensorEvent::Unhandled {
            report: SensorReportId::Pressure,
            timestamp: 5,
        };
        listener.on_event(&event);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(event.timestamp(), 5);
        assert!(!event.is_handled());
    }
}
