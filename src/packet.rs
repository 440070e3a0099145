// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! SHTP packet codec.
//!
//! Every SHTP packet starts with a 4-byte header:
//!
//! | Byte | Meaning |
//! |------|---------|
//! | 0 | Length LSB |
//! | 1 | Length MSB, bit 7 is the continuation flag |
//! | 2 | Channel |
//! | 3 | Sequence number |
//!
//! The length covers the header itself, so an empty body has length 4.

use crate::constants::{Channel, SHTP_HEADER_SIZE};
use crate::convert::to_hex_string;
use std::fmt;

/// Continuation flag carried in bit 7 of the length MSB
pub const CONTINUATION_FLAG: u8 = 0x80;

/// Packet length from the two header length bytes with the continuation
/// flag masked off.
pub fn parse_length(msb: u8, lsb: u8) -> u16 {
    (((msb & !CONTINUATION_FLAG) as u16) << 8) | lsb as u16
}

/// Parse the total packet length out of a raw header
pub fn parse_header_length(header: &[u8]) -> usize {
    if header.len() < SHTP_HEADER_SIZE {
        return 0;
    }
    parse_length(header[1], header[0]) as usize
}

/// Outbound packet: header followed by a fixed-size body.
#[derive(Clone, PartialEq, Eq)]
pub struct ShtpPacketRequest {
    header: [u8; SHTP_HEADER_SIZE],
    body: Vec<u8>,
    sequence: u8,
}

impl ShtpPacketRequest {
    /// Allocate a zero-filled body of `body_size` bytes
    pub fn new(body_size: usize, sequence: u8) -> Self {
        Self {
            header: [0; SHTP_HEADER_SIZE],
            body: vec![0; body_size],
            sequence,
        }
    }

    /// Build a request whose body is a copy of `body`, with the header
    /// already written for `channel`.
    pub fn with_body(channel: Channel, sequence: u8, body: &[u8]) -> Self {
        let mut request = Self::new(body.len(), sequence);
        request.body.copy_from_slice(body);
        request.set_header(channel);
        request
    }

    /// Write the header for the current body length. The continuation flag
    /// is always clear since whole packets are sent.
    pub fn set_header(&mut self, channel: Channel) {
        let length = (self.body.len() + SHTP_HEADER_SIZE) as u16;
        self.header = [
            (length & 0xFF) as u8,
            ((length >> 8) as u8) & !CONTINUATION_FLAG,
            u8::from(channel),
            self.sequence,
        ];
    }

    /// Copy `data` into the body starting at `offset`. Bytes past the end of
    /// the body are dropped.
    pub fn add_body(&mut self, offset: usize, data: &[u8]) {
        if offset >= self.body.len() {
            return;
        }
        let end = (offset + data.len()).min(self.body.len());
        self.body[offset..end].copy_from_slice(&data[..end - offset]);
    }

    pub fn header(&self) -> &[u8; SHTP_HEADER_SIZE] {
        &self.header
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    pub fn channel(&self) -> Channel {
        Channel::from(self.header[2])
    }

    /// Total length in bytes, header included
    pub fn len(&self) -> usize {
        self.body.len() + SHTP_HEADER_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Header and body as one contiguous buffer ready for the bus
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len());
        bytes.extend_from_slice(&self.header);
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

impl fmt::Debug for ShtpPacketRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ShtpPacketRequest {{ header: {}, body: {} }}",
            to_hex_string(&self.header),
            to_hex_string(&self.body)
        )
    }
}

/// Inbound packet. An empty body means nothing was queued on the device.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ShtpPacketResponse {
    header: [u8; SHTP_HEADER_SIZE],
    body: Vec<u8>,
}

impl ShtpPacketResponse {
    /// The "nothing available" response
    pub fn empty() -> Self {
        Self::default()
    }

    /// Copy header and body out of transport-owned buffers. Header bytes
    /// past the fourth are ignored; a short header is zero padded.
    pub fn from_parts(header: &[u8], body: &[u8]) -> Self {
        let mut own_header = [0u8; SHTP_HEADER_SIZE];
        let n = header.len().min(SHTP_HEADER_SIZE);
        own_header[..n].copy_from_slice(&header[..n]);
        Self {
            header: own_header,
            body: body.to_vec(),
        }
    }

    /// Parse a raw packet buffer. The body length comes from the header;
    /// trailing bytes beyond it are ignored and a buffer shorter than the
    /// header claims yields whatever body bytes are present.
    pub fn from_bytes(buf: &[u8]) -> Self {
        if buf.len() < SHTP_HEADER_SIZE {
            return Self::empty();
        }
        let length = parse_header_length(buf);
        if length <= SHTP_HEADER_SIZE {
            return Self::from_parts(&buf[..SHTP_HEADER_SIZE], &[]);
        }
        let end = length.min(buf.len());
        Self::from_parts(&buf[..SHTP_HEADER_SIZE], &buf[SHTP_HEADER_SIZE..end])
    }

    /// Build a response as the device would send it. Used by transports that
    /// synthesize packets and by tests.
    pub fn build(channel: Channel, sequence: u8, body: &[u8]) -> Self {
        let request = ShtpPacketRequest::with_body(channel, sequence, body);
        Self::from_parts(request.header(), request.body())
    }

    pub fn header(&self) -> &[u8; SHTP_HEADER_SIZE] {
        &self.header
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn channel(&self) -> Channel {
        Channel::from(self.header[2])
    }

    pub fn sequence(&self) -> u8 {
        self.header[3]
    }

    /// Packet length declared in the header, continuation flag cleared
    pub fn declared_length(&self) -> usize {
        parse_header_length(&self.header)
    }

    /// Report id byte, body[0]
    pub fn body_first(&self) -> Option<u8> {
        self.body.first().copied()
    }

    pub fn body_size(&self) -> usize {
        self.body.len()
    }

    /// Zero-length body signals that the device had nothing queued
    pub fn data_available(&self) -> bool {
        !self.body.is_empty()
    }

    /// The declared length matches the body actually received
    pub fn is_well_formed(&self) -> bool {
        self.declared_length() == self.body.len() + SHTP_HEADER_SIZE
    }
}

impl fmt::Debug for ShtpPacketResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ShtpPacketResponse {{ header: {}, body: {} }}",
            to_hex_string(&self.header),
            to_hex_string(&self.body)
        )
    }
}
