// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-point and bit-field helpers for SHTP payloads.

use crate::constants::REPORT_DELAY_TICK_US;
use std::fmt::Write;

/// Convert a Q-format fixed-point value to `f32`.
///
/// The raw value is reinterpreted as a signed 16-bit integer before scaling,
/// so `0xFFFF` at any Q point is negative.
pub fn q_to_f32(fixed: u16, q: u8) -> f32 {
    (fixed as i16) as f32 / (1u32 << q) as f32
}

/// Signed variant for values already read as `i16`
pub fn q_i16_to_f32(fixed: i16, q: u8) -> f32 {
    q_to_f32(fixed as u16, q)
}

/// 14-bit report delay in microseconds. Status bits 7:2 are the high six
/// bits, the delay byte the low eight; one tick is 100 us.
pub fn delay_micros(status: u8, delay: u8) -> u64 {
    let ticks = (((status >> 2) as u64) << 8) | delay as u64;
    ticks * REPORT_DELAY_TICK_US
}

/// Accuracy/status in the low two bits of the status byte (0 unreliable,
/// 3 high accuracy)
pub fn accuracy(status: u8) -> u8 {
    status & 0x03
}

/// Little-endian base timestamp delta from the four bytes that follow the
/// BASE_TIMESTAMP marker
pub fn base_timestamp(b1: u8, b2: u8, b3: u8, b4: u8) -> u64 {
    u32::from_le_bytes([b1, b2, b3, b4]) as u64
}

pub fn to_hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 5 + 2);
    out.push('[');
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "0x{:02X}", b);
    }
    out.push(']');
    out
}
