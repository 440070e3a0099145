// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Scripted in-memory transport.
//!
//! Responses are either queued up front or attached to a request so they only
//! become visible after that request was sent. Every clone shares the same
//! state, so a test keeps one handle while the driver owns another.

use super::ShtpTransport;
use crate::constants::Channel;
use crate::packet::{ShtpPacketRequest, ShtpPacketResponse};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    #[error("injected send failure")]
    Send,
    #[error("injected receive failure")]
    Receive,
    #[error("transport is closed")]
    Closed,
}

struct Reply {
    channel: Channel,
    report_id: u8,
    responses: Vec<ShtpPacketResponse>,
}

#[derive(Default)]
struct MockState {
    available: VecDeque<ShtpPacketResponse>,
    replies: Vec<Reply>,
    sent: Vec<ShtpPacketRequest>,
    report_delays: Vec<u64>,
    receive_calls: usize,
    wait_calls: usize,
    setup_calls: usize,
    close_count: usize,
    closed: bool,
    fail_send: bool,
    fail_receive: bool,
    reject_send: bool,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a packet for the next `receive_packet`
    pub fn push_response(&self, response: ShtpPacketResponse) {
        self.state().available.push_back(response);
    }

    /// Queue an explicit "nothing available" read
    pub fn push_empty(&self) {
        self.push_response(ShtpPacketResponse::empty());
    }

    /// Queue `responses` every time a request with `channel` and report id
    /// `report_id` is sent
    pub fn reply_to(&self, channel: Channel, report_id: u8, responses: Vec<ShtpPacketResponse>) {
        self.state().replies.push(Reply {
            channel,
            report_id,
            responses,
        });
    }

    pub fn fail_send(&self, fail: bool) {
        self.state().fail_send = fail;
    }

    pub fn fail_receive(&self, fail: bool) {
        self.state().fail_receive = fail;
    }

    /// Make `send_packet` return `Ok(false)`
    pub fn reject_send(&self, reject: bool) {
        self.state().reject_send = reject;
    }

    pub fn sent(&self) -> Vec<ShtpPacketRequest> {
        self.state().sent.clone()
    }

    pub fn pending(&self) -> usize {
        self.state().available.len()
    }

    pub fn receive_calls(&self) -> usize {
        self.state().receive_calls
    }

    pub fn wait_calls(&self) -> usize {
        self.state().wait_calls
    }

    pub fn setup_calls(&self) -> usize {
        self.state().setup_calls
    }

    pub fn close_count(&self) -> usize {
        self.state().close_count
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn report_delays(&self) -> Vec<u64> {
        self.state().report_delays.clone()
    }
}

impl ShtpTransport for MockTransport {
    type Error = MockError;

    fn setup(&mut self) -> Result<(), MockError> {
        self.state().setup_calls += 1;
        Ok(())
    }

    fn send_packet(&mut self, request: &ShtpPacketRequest) -> Result<bool, MockError> {
        let mut state = self.state();
        if state.closed {
            return Err(MockError::Closed);
        }
        if state.fail_send {
            return Err(MockError::Send);
        }
        if state.reject_send {
            return Ok(false);
        }
        state.sent.push(request.clone());
        let first = request.body().first().copied();
        let queued: Vec<ShtpPacketResponse> = state
            .replies
            .iter()
            .filter(|r| r.channel == request.channel() && Some(r.report_id) == first)
            .flat_map(|r| r.responses.iter().cloned())
            .collect();
        state.available.extend(queued);
        Ok(true)
    }

    fn receive_packet(
        &mut self,
        _delay: bool,
        _write_byte: u8,
    ) -> Result<ShtpPacketResponse, MockError> {
        let mut state = self.state();
        if state.closed {
            return Err(MockError::Closed);
        }
        state.receive_calls += 1;
        if state.fail_receive {
            return Err(MockError::Receive);
        }
        Ok(state.available.pop_front().unwrap_or_default())
    }

    fn wait_for_device(&mut self) -> Result<bool, MockError> {
        let mut state = self.state();
        state.wait_calls += 1;
        Ok(!state.closed)
    }

    fn set_sensor_report_delay(&mut self, micros: u64) {
        self.state().report_delays.push(micros);
    }

    fn close(&mut self) {
        let mut state = self.state();
        state.close_count += 1;
        state.closed = true;
    }
}
