// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Physical transports for the SHTP driver.
//!
//! The driver only talks to a [`ShtpTransport`]; SPI, I2C and the scripted
//! mock used by the tests all implement it.

use crate::packet::{ShtpPacketRequest, ShtpPacketResponse};
use std::fmt::Debug;

pub mod delay;
pub mod gpio;
pub mod i2c;
pub mod mock;
pub mod spi;
pub mod spidev;

pub use i2c::I2cTransport;
pub use mock::MockTransport;
pub use spi::{SpiControlLines, SpiTransport};

/// Byte-level SHTP transport.
///
/// Implementations are not required to be safe for concurrent use; the
/// driver serializes every call.
pub trait ShtpTransport {
    /// Error type of the underlying bus or pins
    type Error: Debug;

    /// Hardware bring-up such as a reset pulse. Called once by
    /// `BNO08x::init`.
    fn setup(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Write one whole packet. Returns false when the device did not accept
    /// it.
    fn send_packet(&mut self, request: &ShtpPacketRequest) -> Result<bool, Self::Error>;

    /// Read one packet. Returns [`ShtpPacketResponse::empty`] when nothing is
    /// queued; never blocks indefinitely. With `delay` set the transport may
    /// pace itself by the last sensor report delay. `write_byte` is clocked
    /// out on full-duplex buses while reading.
    fn receive_packet(
        &mut self,
        delay: bool,
        write_byte: u8,
    ) -> Result<ShtpPacketResponse, Self::Error>;

    /// Poll the hardware ready signal with an internal timeout
    fn wait_for_device(&mut self) -> Result<bool, Self::Error>;

    /// Read pacing hint in microseconds
    fn set_sensor_report_delay(&mut self, micros: u64);

    /// Release the bus. Calling it again has no effect.
    fn close(&mut self);
}
