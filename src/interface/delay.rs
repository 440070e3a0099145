// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Blocking delays used by the hardware transports.

use std::{thread, time::Duration};

pub trait Delay {
    /// Pauses execution for `ms` milliseconds
    fn delay_ms(&mut self, ms: u32);

    /// Pauses execution for `us` microseconds
    fn delay_us(&mut self, us: u64);
}

/// Sleeps the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms.into()));
    }

    fn delay_us(&mut self, us: u64) {
        thread::sleep(Duration::from_micros(us));
    }
}

/// Returns immediately, for fake buses
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl Delay for NoDelay {
    fn delay_ms(&mut self, _ms: u32) {}

    fn delay_us(&mut self, _us: u64) {}
}
