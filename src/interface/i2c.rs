// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

use super::{
    delay::{Delay, StdDelay},
    gpio::{InputPin, NoPin},
    ShtpTransport,
};
use crate::{
    constants::SHTP_HEADER_SIZE,
    error::InterfaceError,
    packet::{parse_header_length, ShtpPacketRequest, ShtpPacketResponse},
};
use embedded_hal::i2c::I2c;
use log::{trace, warn};
use std::fmt::Debug;

/// Default address, SA0 high
pub const DEFAULT_ADDRESS: u8 = 0x4B;
/// Address with SA0 low
pub const ALTERNATE_ADDRESS: u8 = 0x4A;
/// Largest single read transaction. The hub splits longer packets into
/// continuation reads.
pub const MAX_READ_LEN: usize = 256;
/// Wait used in place of an interrupt line
const NO_INTERRUPT_WAIT_US: u64 = 500;
/// Interrupt polls made by `wait_for_device`
const INTERRUPT_POLLS: usize = 255;
const INTERRUPT_POLL_US: u64 = 100;

/// SHTP over I2C with an optional HINTN line
pub struct I2cTransport<BUS, IN = NoPin, D = StdDelay> {
    bus: BUS,
    address: u8,
    interrupt: Option<IN>,
    delay: D,
    report_delay_us: u64,
    closed: bool,
}

impl<BUS> I2cTransport<BUS, NoPin, StdDelay> {
    pub fn new(bus: BUS, address: u8) -> Self {
        Self::with_parts(bus, address, None, StdDelay)
    }
}

impl<BUS, IN> I2cTransport<BUS, IN, StdDelay> {
    pub fn with_interrupt(bus: BUS, address: u8, interrupt: IN) -> Self {
        Self::with_parts(bus, address, Some(interrupt), StdDelay)
    }
}

impl<BUS, IN, D> I2cTransport<BUS, IN, D> {
    pub fn with_parts(bus: BUS, address: u8, interrupt: Option<IN>, delay: D) -> Self {
        Self {
            bus,
            address,
            interrupt,
            delay,
            report_delay_us: 0,
            closed: false,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }
}

impl<BUS, IN, D> I2cTransport<BUS, IN, D>
where
    IN: InputPin,
{
    /// Interrupt asserted, or true when there is no line to ask
    fn interrupt_signaled(&self) -> bool {
        match &self.interrupt {
            Some(pin) => pin.is_low().unwrap_or(false),
            None => true,
        }
    }
}

impl<BUS, IN, D, PinE> ShtpTransport for I2cTransport<BUS, IN, D>
where
    BUS: I2c,
    IN: InputPin<Error = PinE>,
    D: Delay,
    PinE: Debug,
{
    type Error = InterfaceError<BUS::Error, PinE>;

    fn send_packet(&mut self, request: &ShtpPacketRequest) -> Result<bool, Self::Error> {
        if self.closed {
            return Err(InterfaceError::Closed);
        }
        trace!("send {:?}", request);
        self.bus
            .write(self.address, &request.to_bytes())
            .map_err(InterfaceError::Comm)?;
        Ok(true)
    }

    fn receive_packet(
        &mut self,
        delay: bool,
        _write_byte: u8,
    ) -> Result<ShtpPacketResponse, Self::Error> {
        if self.closed {
            return Err(InterfaceError::Closed);
        }
        if !self.interrupt_signaled() {
            return Ok(ShtpPacketResponse::empty());
        }
        if delay && self.report_delay_us > 0 {
            self.delay.delay_us(self.report_delay_us);
        }

        let mut header = [0u8; SHTP_HEADER_SIZE];
        self.bus
            .read(self.address, &mut header)
            .map_err(InterfaceError::Comm)?;
        let mut packet_len = parse_header_length(&header);
        if packet_len <= SHTP_HEADER_SIZE {
            return Ok(ShtpPacketResponse::empty());
        }
        if packet_len > MAX_READ_LEN {
            warn!("packet of {} bytes truncated to {}", packet_len, MAX_READ_LEN);
            packet_len = MAX_READ_LEN;
        }

        // every read transaction starts with a fresh header
        let mut packet = vec![0u8; packet_len];
        self.bus
            .read(self.address, &mut packet)
            .map_err(InterfaceError::Comm)?;
        Ok(ShtpPacketResponse::from_bytes(&packet))
    }

    fn wait_for_device(&mut self) -> Result<bool, Self::Error> {
        if self.closed {
            return Err(InterfaceError::Closed);
        }
        if self.interrupt.is_none() {
            self.delay.delay_us(NO_INTERRUPT_WAIT_US);
            return Ok(true);
        }
        for _ in 0..INTERRUPT_POLLS {
            if self.interrupt_signaled() {
                return Ok(true);
            }
            self.delay.delay_us(INTERRUPT_POLL_US);
        }
        Ok(false)
    }

    fn set_sensor_report_delay(&mut self, micros: u64) {
        self.report_delay_us = micros;
    }

    fn close(&mut self) {
        if !self.closed {
            trace!("i2c 0x{:02X} closed", self.address);
            self.closed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constants::Channel, interface::delay::NoDelay};
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation, SevenBitAddress};
    use std::collections::VecDeque;

    #[derive(Debug)]
    struct FakeBusError;

    impl embedded_hal::i2c::Error for FakeBusError {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    #[derive(Default)]
    struct FakeBus {
        reads: VecDeque<Vec<u8>>,
        writes: Vec<(u8, Vec<u8>)>,
        read_addresses: Vec<u8>,
    }

    impl ErrorType for FakeBus {
        type Error = FakeBusError;
    }

    impl I2c for FakeBus {
        fn transaction(
            &mut self,
            address: SevenBitAddress,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            for op in operations {
                match op {
                    Operation::Read(buf) => {
                        self.read_addresses.push(address);
                        let data = self.reads.pop_front().ok_or(FakeBusError)?;
                        let n = data.len().min(buf.len());
                        buf[..n].copy_from_slice(&data[..n]);
                    }
                    Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
                }
            }
            Ok(())
        }
    }

    struct Line(bool);

    impl InputPin for Line {
        type Error = ();
        fn is_high(&self) -> Result<bool, ()> {
            Ok(self.0)
        }
    }

    fn transport(bus: FakeBus) -> I2cTransport<FakeBus, NoPin, NoDelay> {
        I2cTransport::with_parts(bus, DEFAULT_ADDRESS, None, NoDelay)
    }

    #[test]
    fn test_addresses() {
        assert_eq!(DEFAULT_ADDRESS, 0x4B);
        assert_eq!(ALTERNATE_ADDRESS, 0x4A);
        let i2c = I2cTransport::new(FakeBus::default(), ALTERNATE_ADDRESS);
        assert_eq!(i2c.address(), 0x4A);
    }

    #[test]
    fn test_send_writes_whole_packet() {
        let mut i2c = transport(FakeBus::default());
        let request = ShtpPacketRequest::with_body(Channel::Control, 1, &[0xF9, 0]);
        assert!(i2c.send_packet(&request).unwrap());
        assert_eq!(
            i2c.bus.writes,
            vec![(0x4B, vec![0x06, 0x00, 0x02, 0x01, 0xF9, 0x00])]
        );
    }

    #[test]
    fn test_receive_reads_header_then_packet() {
        let mut bus = FakeBus::default();
        bus.reads.push_back(vec![0x06, 0x00, 0x02, 0x09]);
        bus.reads.push_back(vec![0x06, 0x00, 0x02, 0x09, 0xF8, 0x04]);
        let mut i2c = transport(bus);
        let response = i2c.receive_packet(true, 0).unwrap();
        assert_eq!(response.channel(), Channel::Control);
        assert_eq!(response.sequence(), 9);
        assert_eq!(response.body(), &[0xF8, 0x04]);
        assert_eq!(i2c.bus.read_addresses, vec![0x4B, 0x4B]);
    }

    #[test]
    fn test_receive_empty_header() {
        let mut bus = FakeBus::default();
        bus.reads.push_back(vec![0, 0, 0, 0]);
        let mut i2c = transport(bus);
        assert!(!i2c.receive_packet(false, 0).unwrap().data_available());
        assert!(i2c.bus.reads.is_empty());
    }

    #[test]
    fn test_oversized_packet_is_truncated() {
        let mut bus = FakeBus::default();
        bus.reads.push_back(vec![0x00, 0x04, 0x03, 0x00]);
        let mut packet = vec![0x00, 0x04, 0x03, 0x00];
        packet.resize(MAX_READ_LEN, 0xAA);
        bus.reads.push_back(packet);
        let mut i2c = transport(bus);
        let response = i2c.receive_packet(false, 0).unwrap();
        assert_eq!(response.body_size(), MAX_READ_LEN - SHTP_HEADER_SIZE);
        assert!(!response.is_well_formed());
    }

    #[test]
    fn test_interrupt_line_gates_reads() {
        let mut i2c =
            I2cTransport::with_parts(FakeBus::default(), 0x4B, Some(Line(true)), NoDelay);
        assert!(!i2c.receive_packet(false, 0).unwrap().data_available());
        assert!(!i2c.wait_for_device().unwrap());
        assert!(i2c.bus.read_addresses.is_empty());

        i2c.interrupt = Some(Line(false));
        assert!(i2c.wait_for_device().unwrap());
    }

    #[test]
    fn test_without_interrupt_always_ready() {
        let mut i2c = transport(FakeBus::default());
        assert!(i2c.wait_for_device().unwrap());
    }

    #[test]
    fn test_no_pin_interrupt_reads() {
        let mut bus = FakeBus::default();
        bus.reads.push_back(vec![0x05, 0x00, 0x01, 0x00]);
        bus.reads.push_back(vec![0x05, 0x00, 0x01, 0x00, 0x01]);
        let mut i2c = I2cTransport::with_parts(bus, DEFAULT_ADDRESS, Some(NoPin), NoDelay);
        assert!(i2c.wait_for_device().unwrap());
        let response = i2c.receive_packet(false, 0).unwrap();
        assert_eq!(response.channel(), Channel::Executable);
        assert_eq!(response.body(), &[0x01]);
    }

    #[test]
    fn test_bus_error_propagates() {
        let mut i2c = transport(FakeBus::default());
        assert!(matches!(
            i2c.receive_packet(false, 0),
            Err(InterfaceError::Comm(FakeBusError))
        ));
        i2c.close();
        assert!(matches!(i2c.wait_for_device(), Err(InterfaceError::Closed)));
    }
}
