// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Errors in this crate

use std::fmt::Debug;
use thiserror::Error;

/// Errors returned by driver operations.
///
/// A handshake that does not converge is not an error: those operations
/// return `Ok(false)`. `Transport` means the bus itself failed, which usually
/// points at wiring or a missing device.
#[derive(Debug, Error)]
pub enum DriverError<E: Debug> {
    /// Transport I/O failure
    #[error("transport error: {0:?}")]
    Transport(E),
    /// The driver was shut down
    #[error("driver has been shut down")]
    Closed,
    /// A zero report period was requested
    #[error("report period must be greater than zero")]
    InvalidReportPeriod,
    /// A background thread could not be started
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Errors of the SPI and I2C transports
#[derive(Debug, Error)]
pub enum InterfaceError<CommE: Debug, PinE: Debug> {
    /// Sensor communication error
    #[error("bus error: {0:?}")]
    Comm(CommE),
    /// Pin setting error
    #[error("pin error: {0:?}")]
    Pin(PinE),
    /// The sensor is not responding
    #[error("sensor did not signal ready")]
    SensorUnresponsive,
    /// The transport was closed
    #[error("transport is closed")]
    Closed,
}

/// Reasons a packet body is not a decodable input report
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReportError {
    #[error("input report of {len} bytes, need at least {needed}")]
    TooShort { len: usize, needed: usize },
    #[error("expected base timestamp marker, found 0x{0:02X}")]
    MissingTimestamp(u8),
}
