// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Request/response handshake chains.
//!
//! A handshake with the sensor hub is scripted as an [`OperationChain`]: an
//! ordered list of "send this, then wait for that" steps. The
//! [`ChainRunner`] executes a chain against a transport, giving every step
//! its own poll budget.

use crate::constants::{Channel, ShtpReportId, RECEIVE_WRITE_BYTE};
use crate::interface::ShtpTransport;
use crate::packet::{ShtpPacketRequest, ShtpPacketResponse};
use log::{trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Describes the response a step waits for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMatcher {
    channel: Channel,
    report_id: u8,
    expected_values: Option<Vec<u8>>,
}

impl ResponseMatcher {
    pub fn new(channel: Channel, report_id: u8) -> Self {
        Self {
            channel,
            report_id,
            expected_values: None,
        }
    }

    /// Match a report on the channel that owns it
    pub fn for_report(report: impl ShtpReportId) -> Self {
        Self::new(report.channel(), report.id())
    }

    /// Also require the body bytes after the report id to equal `values`
    pub fn with_values(mut self, values: Vec<u8>) -> Self {
        self.expected_values = Some(values);
        self
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn report_id(&self) -> u8 {
        self.report_id
    }

    /// A short or padded packet never matches
    pub fn matches(&self, response: &ShtpPacketResponse) -> bool {
        if !response.is_well_formed() {
            return false;
        }
        if response.channel() != self.channel {
            return false;
        }
        if response.body_first() != Some(self.report_id) {
            return false;
        }
        match &self.expected_values {
            Some(values) => &response.body()[1..] == values.as_slice(),
            None => true,
        }
    }
}

/// One handshake step.
#[derive(Debug, Clone)]
pub struct Operation {
    request: Option<ShtpPacketRequest>,
    expected: Option<ResponseMatcher>,
    matched: Option<ShtpPacketResponse>,
}

impl Operation {
    pub fn new(request: Option<ShtpPacketRequest>, expected: Option<ResponseMatcher>) -> Self {
        Self {
            request,
            expected,
            matched: None,
        }
    }

    /// Send `request` and wait for `expected`
    pub fn request_response(request: ShtpPacketRequest, expected: ResponseMatcher) -> Self {
        Self::new(Some(request), Some(expected))
    }

    /// Send without waiting for anything
    pub fn send_only(request: ShtpPacketRequest) -> Self {
        Self::new(Some(request), None)
    }

    /// Wait for an unsolicited packet
    pub fn wait_for(expected: ResponseMatcher) -> Self {
        Self::new(None, Some(expected))
    }

    pub fn request(&self) -> Option<&ShtpPacketRequest> {
        self.request.as_ref()
    }

    pub fn expected(&self) -> Option<&ResponseMatcher> {
        self.expected.as_ref()
    }

    /// Response that satisfied this step on the last run
    pub fn matched(&self) -> Option<&ShtpPacketResponse> {
        self.matched.as_ref()
    }
}

/// Linear sequence of steps, built fresh for every handshake.
#[derive(Debug, Clone, Default)]
pub struct OperationChain {
    ops: Vec<Operation>,
}

impl OperationChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, op: Operation) -> Self {
        self.ops.push(op);
        self
    }

    pub fn push(&mut self, op: Operation) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    /// Matched response of the last step, if any
    pub fn last_response(&self) -> Option<&ShtpPacketResponse> {
        self.ops.last().and_then(Operation::matched)
    }
}

/// Executes operation chains with a per-step poll ceiling.
#[derive(Debug, Clone, Copy)]
pub struct ChainRunner {
    max_attempts: usize,
    poll_interval: Duration,
}

impl ChainRunner {
    pub fn new(max_attempts: usize, poll_interval: Duration) -> Self {
        Self {
            max_attempts,
            poll_interval,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Run `chain` step by step.
    ///
    /// Returns `Ok(true)` when every step matched, `Ok(false)` when a step
    /// ran out of attempts or `cancel` was raised. Transport errors abort the
    /// chain and are returned as is.
    pub fn run<T: ShtpTransport>(
        &self,
        chain: &mut OperationChain,
        transport: &mut T,
        cancel: &AtomicBool,
    ) -> Result<bool, T::Error> {
        for (index, op) in chain.ops.iter_mut().enumerate() {
            if cancel.load(Ordering::Acquire) {
                trace!("chain cancelled before step {}", index);
                return Ok(false);
            }
            op.matched = None;

            if let Some(request) = &op.request {
                trace!("step {} send {:?}", index, request);
                if !transport.send_packet(request)? {
                    warn!("step {}: device rejected {:?}", index, request);
                    return Ok(false);
                }
            }

            let Some(expected) = &op.expected else {
                continue;
            };

            let mut attempts = 0;
            while attempts < self.max_attempts {
                if cancel.load(Ordering::Acquire) {
                    trace!("chain cancelled in step {}", index);
                    return Ok(false);
                }
                attempts += 1;
                let response = transport.receive_packet(false, RECEIVE_WRITE_BYTE)?;
                if response.data_available() && expected.matches(&response) {
                    trace!("step {} matched after {} attempts", index, attempts);
                    op.matched = Some(response);
                    break;
                }
                if response.data_available() {
                    trace!("step {} skip {:?}", index, response);
                }
                transport.wait_for_device()?;
                if !self.poll_interval.is_zero() {
                    thread::sleep(self.poll_interval);
                }
            }

            if op.matched.is_none() {
                warn!(
                    "step {} waiting for {:?}/0x{:02X} gave up after {} attempts",
                    index,
                    expected.channel(),
                    expected.report_id(),
                    self.max_attempts
                );
                return Ok(false);
            }
        }
        Ok(true)
    }
}
