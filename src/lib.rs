// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sensor Hub Transport Protocol (SHTP) driver for the BNO08x IMU family.
//!
//! [`BNO08x`] brings the hub from reset to streaming over any
//! [`interface::ShtpTransport`] and decodes input reports into
//! [`SensorEvent`]s for the registered listeners.

pub mod config;
pub mod constants;
pub mod convert;
pub mod driver;
pub mod error;
pub mod events;
pub mod interface;
pub mod operation;
pub mod packet;
pub mod reports;

pub use config::DriverConfig;
pub use constants::{Channel, CommandId, ControlReportId, SensorReportId, TareBasis};
pub use driver::{ProductId, BNO08x};
pub use error::{DriverError, InterfaceError, ReportError};
pub use events::{DataEventType, SensorEvent, SensorListener};
pub use packet::{ShtpPacketRequest, ShtpPacketResponse};
