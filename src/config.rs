// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Driver timing and retry configuration.

use std::time::Duration;

/// Tunables of the handshake engine and the report reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Polls allowed per handshake step before the step fails
    pub max_attempts: usize,
    /// Sleep between non-matching polls
    pub poll_interval: Duration,
    /// Wait after the soft reset packet before draining
    pub reset_settle: Duration,
    /// Most packets discarded by one drain
    pub drain_limit: usize,
    /// Reader back-off when nothing is queued
    pub idle_poll: Duration,
    /// Poll step of a background calibration waiting for the device
    pub calibrate_poll: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_attempts: 255,
            poll_interval: Duration::from_millis(1),
            reset_settle: Duration::from_millis(250),
            drain_limit: 255,
            idle_poll: Duration::from_millis(1),
            calibrate_poll: Duration::from_millis(5),
        }
    }
}

impl DriverConfig {
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_reset_settle(mut self, reset_settle: Duration) -> Self {
        self.reset_settle = reset_settle;
        self
    }

    pub fn with_drain_limit(mut self, drain_limit: usize) -> Self {
        self.drain_limit = drain_limit;
        self
    }

    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    pub fn with_calibrate_poll(mut self, calibrate_poll: Duration) -> Self {
        self.calibrate_poll = calibrate_poll;
        self
    }

    /// Zero delays everywhere, for scripted transports
    pub fn immediate() -> Self {
        Self {
            poll_interval: Duration::ZERO,
            reset_settle: Duration::ZERO,
            idle_poll: Duration::ZERO,
            calibrate_poll: Duration::ZERO,
            ..Self::default()
        }
    }
}
