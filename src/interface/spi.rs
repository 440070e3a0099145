// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

use super::{
    delay::{Delay, StdDelay},
    gpio::{InputPin, OutputPin},
    spidev::{Transfer, Write},
    ShtpTransport,
};
use crate::{
    constants::{PACKET_RECV_BUF_LEN, SHTP_HEADER_SIZE},
    error::InterfaceError,
    packet::{parse_header_length, ShtpPacketRequest, ShtpPacketResponse},
};
use log::{debug, trace, warn};
use std::fmt::Debug;

/// HINTN polls made by `wait_for_device`
const HINTN_POLLS: usize = 255;
/// Pause between HINTN polls
const HINTN_POLL_US: u64 = 100;
/// Longest wait for HINTN after a reset pulse
const WAKE_TIMEOUT_MS: u32 = 200;

/// Encapsulates all the lines required to operate this sensor
/// - SCK: clock line from master
/// - MISO: Data input from the sensor to the master
/// - MOSI: Output from the master to the sensor
/// - CSN: chip select, driven by the spidev kernel driver
/// - HINTN: Hardware Interrupt. Sensor uses this to indicate it had data available for read
/// - RSTN: Reset the device
pub struct SpiControlLines<SPI, IN, RSTN> {
    pub spi: SPI,    // the spidev read/write
    pub hintn: IN,   // interrupt, IMU_INT
    pub reset: RSTN, // reset, IMU_RST
}

/// This combines the SPI peripheral and associated control pins
pub struct SpiTransport<SPI, IN, RSTN, D = StdDelay> {
    spi: SPI,
    hintn: IN,
    reset: RSTN,
    delay: D,
    report_delay_us: u64,
    received_packet_count: usize,
    closed: bool,
}

impl<SPI, IN, RSTN> SpiTransport<SPI, IN, RSTN, StdDelay> {
    pub fn new(lines: SpiControlLines<SPI, IN, RSTN>) -> Self {
        Self::with_delay(lines, StdDelay)
    }
}

impl<SPI, IN, RSTN, D> SpiTransport<SPI, IN, RSTN, D> {
    pub fn with_delay(lines: SpiControlLines<SPI, IN, RSTN>, delay: D) -> Self {
        Self {
            spi: lines.spi,
            hintn: lines.hintn,
            reset: lines.reset,
            delay,
            report_delay_us: 0,
            received_packet_count: 0,
            closed: false,
        }
    }

    pub fn received_packet_count(&self) -> usize {
        self.received_packet_count
    }

    pub fn report_delay(&self) -> u64 {
        self.report_delay_us
    }
}

impl<SPI, IN, RSTN, D, CommE, PinE> SpiTransport<SPI, IN, RSTN, D>
where
    SPI: Write<Error = CommE> + Transfer<Error = CommE>,
    IN: InputPin<Error = PinE>,
    RSTN: OutputPin<Error = PinE>,
    D: Delay,
    CommE: Debug,
    PinE: Debug,
{
    /// Is the sensor indicating it has data available
    /// "In SPI and I2C mode the HOST_INTN signal is used by the BNO080 to
    /// indicate to the application processor that the BNO080 needs attention."
    fn hintn_signaled(&self) -> bool {
        self.hintn.is_low().unwrap_or(false)
    }

    /// Wait for sensor to be ready.
    /// After reset this can take around 120 ms
    fn wait_for_sensor_awake(&mut self, max_ms: u32) -> bool {
        for _ in 0..max_ms {
            if self.hintn_signaled() {
                return true;
            }
            self.delay.delay_ms(1);
        }
        false
    }
}

impl<SPI, IN, RSTN, D, CommE, PinE> ShtpTransport for SpiTransport<SPI, IN, RSTN, D>
where
    SPI: Write<Error = CommE> + Transfer<Error = CommE>,
    IN: InputPin<Error = PinE>,
    RSTN: OutputPin<Error = PinE>,
    D: Delay,
    CommE: Debug,
    PinE: Debug,
{
    type Error = InterfaceError<CommE, PinE>;

    fn setup(&mut self) -> Result<(), Self::Error> {
        if self.closed {
            return Err(InterfaceError::Closed);
        }
        // Note: This assumes that WAK/PS0 is set to high already
        self.reset.set_high().map_err(InterfaceError::Pin)?;

        trace!("reset cycle... ");
        self.reset.set_low().map_err(InterfaceError::Pin)?;
        self.delay.delay_ms(2);
        self.reset.set_high().map_err(InterfaceError::Pin)?;

        // wait for sensor to set hintn pin after reset
        if !self.wait_for_sensor_awake(WAKE_TIMEOUT_MS) {
            debug!("sensor not ready");
            return Err(InterfaceError::SensorUnresponsive);
        }
        Ok(())
    }

    fn send_packet(&mut self, request: &ShtpPacketRequest) -> Result<bool, Self::Error> {
        if self.closed {
            return Err(InterfaceError::Closed);
        }
        trace!("send {:?}", request);
        self.spi
            .write(&request.to_bytes())
            .map_err(InterfaceError::Comm)?;
        Ok(true)
    }

    fn receive_packet(
        &mut self,
        delay: bool,
        write_byte: u8,
    ) -> Result<ShtpPacketResponse, Self::Error> {
        if self.closed {
            return Err(InterfaceError::Closed);
        }
        // Note: HINTN cannot always be used to detect data ready.
        // As soon as host selects CSN, HINTN resets
        if !self.hintn_signaled() {
            return Ok(ShtpPacketResponse::empty());
        }
        if delay && self.report_delay_us > 0 {
            self.delay.delay_us(self.report_delay_us);
        }

        // check how long the message to read is
        let mut header = [write_byte; SHTP_HEADER_SIZE];
        self.spi
            .transfer(&mut header)
            .map_err(InterfaceError::Comm)?;
        let mut packet_len = parse_header_length(&header);
        if packet_len <= SHTP_HEADER_SIZE {
            return Ok(ShtpPacketResponse::empty());
        }
        if packet_len > PACKET_RECV_BUF_LEN {
            warn!(
                "packet of {} bytes truncated to {}",
                packet_len, PACKET_RECV_BUF_LEN
            );
            packet_len = PACKET_RECV_BUF_LEN;
        }

        // the hub sends the header again ahead of the cargo
        let mut packet = vec![write_byte; packet_len];
        self.spi
            .transfer(&mut packet)
            .map_err(InterfaceError::Comm)?;
        self.received_packet_count += 1;
        Ok(ShtpPacketResponse::from_bytes(&packet))
    }

    fn wait_for_device(&mut self) -> Result<bool, Self::Error> {
        if self.closed {
            return Err(InterfaceError::Closed);
        }
        for _ in 0..HINTN_POLLS {
            if self.hintn_signaled() {
                return Ok(true);
            }
            self.delay.delay_us(HINTN_POLL_US);
        }
        trace!("no hintn??");
        Ok(false)
    }

    fn set_sensor_report_delay(&mut self, micros: u64) {
        self.report_delay_us = micros;
    }

    fn close(&mut self) {
        if !self.closed {
            trace!("spi closed after {} packets", self.received_packet_count);
            self.closed = true;
        }
    }
}
