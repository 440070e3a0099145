// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! BNO08x sensor hub driver.
//!
//! The driver owns one [`ShtpTransport`] and serializes every access to it.
//! Handshakes (reset, product id, feature enable) run on the caller's thread
//! as operation chains; once a report is enabled a reader thread decodes
//! input reports and hands them to the registered listeners. Calibration is
//! sent from its own short-lived thread.

use crate::{
    config::DriverConfig,
    constants::{
        Channel, CommandId, ControlReportId, SensorReportId, ShtpReportId, TareBasis,
        CMD_RESP_ADVERTISEMENT, CMD_RESP_ERROR_LIST, COMMAND_REQUEST_LEN,
        EXECUTABLE_DEVICE_CMD_ON, EXECUTABLE_DEVICE_CMD_RESET, EXECUTABLE_DEVICE_CMD_SLEEP,
        EXECUTABLE_DEVICE_RESP_RESET_COMPLETE, NUM_CHANNELS, RECEIVE_WRITE_BYTE,
        RECEIVE_WRITE_BYTE_CONTINUAL, SET_FEATURE_LEN, TARE_AXIS_ALL, TARE_AXIS_Z, TARE_NOW,
        TARE_PERSIST, TARE_SET_REORIENTATION,
    },
    error::DriverError,
    events::{SensorEvent, SensorListener},
    interface::{
        gpio::{GpiodIn, GpiodOut},
        i2c::I2cTransport,
        spi::{SpiControlLines, SpiTransport},
        spidev::SpiDevice,
        ShtpTransport,
    },
    operation::{ChainRunner, Operation, OperationChain, ResponseMatcher},
    packet::{ShtpPacketRequest, ShtpPacketResponse},
    reports::{decode_input_report, ReportParser},
};
use linux_embedded_hal::I2cdev;
use log::{debug, error, trace, warn};
use std::{
    collections::HashMap,
    io::{self, Error, ErrorKind},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

/// Contents of a PRODUCT_ID_RESPONSE
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductId {
    pub reset_cause: u8,
    pub sw_version_major: u8,
    pub sw_version_minor: u8,
    pub sw_part_number: u32,
    pub sw_build_number: u32,
    pub sw_version_patch: u16,
}

impl ProductId {
    /// Parse a response body; fields the device left out read as zero
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.first() != Some(&ControlReportId::ProductIdResponse.id()) {
            return None;
        }
        let mut parser = ReportParser::new(body, 1);
        Some(Self {
            reset_cause: parser.read_u8()?,
            sw_version_major: parser.read_u8().unwrap_or(0),
            sw_version_minor: parser.read_u8().unwrap_or(0),
            sw_part_number: parser.read_u32().unwrap_or(0),
            sw_build_number: parser.read_u32().unwrap_or(0),
            sw_version_patch: parser.read_u16().unwrap_or(0),
        })
    }
}

fn lock<U>(mutex: &Mutex<U>) -> MutexGuard<'_, U> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn error_description(code: u8) -> Option<&'static str> {
    let text = match code {
        1 => "Hub application attempted to exceed maximum read cargo length",
        2 => "Host write was too short (need at least a 4-byte header)",
        3 => "Host wrote a header with length greater than maximum write cargo length",
        4 => "Host wrote a header with length less than or equal to header length",
        5 => "Host wrote beginning of fragmented cargo, fragmentation not supported",
        6 => "Host wrote continuation of fragmented cargo, fragmentation not supported",
        7 => "Unrecognized command on control channel",
        8 => "Unrecognized parameter to get-advertisement command",
        9 => "Host wrote to unrecognized channel",
        10 => "Advertisement request received while Advertisement Response was pending",
        11 => "Host performed a write operation before the hub had finished sending its advertisement response",
        12 => "Error list too long to send, truncated",
        _ => return None,
    };
    Some(text)
}

/// Transport plus the per-channel sequence numbers that go with it
struct Port<T> {
    transport: Option<T>,
    sequence_numbers: [u8; NUM_CHANNELS],
}

impl<T> Port<T> {
    /// Build a request on `channel`, consuming that channel's next sequence
    /// number
    fn request(&mut self, channel: Channel, body: &[u8]) -> ShtpPacketRequest {
        let sequence = match channel.index() {
            Some(index) => {
                let sequence = self.sequence_numbers[index];
                self.sequence_numbers[index] = sequence.wrapping_add(1);
                sequence
            }
            None => 0,
        };
        ShtpPacketRequest::with_body(channel, sequence, body)
    }
}

type ListenerMap = HashMap<String, Arc<dyn SensorListener>>;

/// State shared between the driver handle and its worker threads
struct Shared<T> {
    port: Mutex<Port<T>>,
    listeners: Mutex<ListenerMap>,
    config: DriverConfig,
    /// Reader thread should keep running
    active: AtomicBool,
    /// Product id has been confirmed since the last reset
    ready: AtomicBool,
    closed: AtomicBool,
    reset_occurred: AtomicBool,
    reset_reason: AtomicU8,
    command_sequence: AtomicU8,
    last_report_delay: AtomicU64,
    product_id: Mutex<Option<ProductId>>,
    calibration_status: Mutex<Option<u8>>,
}

impl<T: ShtpTransport> Shared<T> {
    fn runner(&self) -> ChainRunner {
        ChainRunner::new(self.config.max_attempts, self.config.poll_interval)
    }

    fn lock_port(&self) -> Result<MutexGuard<'_, Port<T>>, DriverError<T::Error>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriverError::Closed);
        }
        let port = lock(&self.port);
        if port.transport.is_none() {
            return Err(DriverError::Closed);
        }
        Ok(port)
    }

    /// Build a chain with the port locked and run it
    fn run_chain(
        &self,
        build: impl FnOnce(&Self, &mut Port<T>) -> OperationChain,
    ) -> Result<(bool, OperationChain), DriverError<T::Error>> {
        let mut port = self.lock_port()?;
        let mut chain = build(self, &mut *port);
        let transport = port.transport.as_mut().ok_or(DriverError::Closed)?;
        let done = self
            .runner()
            .run(&mut chain, transport, &self.closed)
            .map_err(DriverError::Transport)?;
        Ok((done, chain))
    }

    fn send(&self, channel: Channel, body: &[u8]) -> Result<bool, DriverError<T::Error>> {
        let (sent, _) = self.run_chain(|_, port| {
            OperationChain::new().then(Operation::send_only(port.request(channel, body)))
        })?;
        Ok(sent)
    }

    /// COMMAND_REQUEST body: report id, command sequence, command, up to nine
    /// parameters. Always sent on the control channel.
    fn command_request(
        &self,
        port: &mut Port<T>,
        command: CommandId,
        params: &[u8],
    ) -> ShtpPacketRequest {
        let mut body = [0u8; COMMAND_REQUEST_LEN];
        body[0] = ControlReportId::CommandRequest.id();
        body[1] = self.command_sequence.fetch_add(1, Ordering::Relaxed);
        body[2] = command.into();
        let n = params.len().min(COMMAND_REQUEST_LEN - 3);
        body[3..3 + n].copy_from_slice(&params[..n]);
        port.request(ControlReportId::CommandRequest.channel(), &body)
    }

    fn send_command(
        &self,
        command: CommandId,
        params: &[u8],
    ) -> Result<bool, DriverError<T::Error>> {
        trace!("command {:?} {:?}", command, params);
        let (sent, _) = self.run_chain(|shared, port| {
            OperationChain::new().then(Operation::send_only(
                shared.command_request(port, command, params),
            ))
        })?;
        Ok(sent)
    }

    /// Receive and discard until the device reports nothing queued
    fn drain(&self) -> Result<usize, DriverError<T::Error>> {
        let mut port = self.lock_port()?;
        let transport = port.transport.as_mut().ok_or(DriverError::Closed)?;
        let mut drained = 0;
        while drained < self.config.drain_limit {
            if self.closed.load(Ordering::Acquire) {
                break;
            }
            let response = transport
                .receive_packet(false, RECEIVE_WRITE_BYTE)
                .map_err(DriverError::Transport)?;
            if !response.data_available() {
                break;
            }
            self.note_packet(&response);
            drained += 1;
        }
        if drained == self.config.drain_limit {
            warn!("drain stopped after {} packets", drained);
        }
        Ok(drained)
    }

    fn soft_reset(&self) -> Result<bool, DriverError<T::Error>> {
        trace!("soft_reset");
        if !self.send(Channel::Executable, &[EXECUTABLE_DEVICE_CMD_RESET])? {
            return Ok(false);
        }
        self.ready.store(false, Ordering::Release);
        if !self.config.reset_settle.is_zero() {
            thread::sleep(self.config.reset_settle);
        }
        let drained = self.drain()?;
        debug!("soft reset drained {} packets", drained);
        Ok(true)
    }

    fn product_id_request(&self) -> Result<bool, DriverError<T::Error>> {
        trace!("request PID...");
        let (done, chain) = self.run_chain(|_, port| {
            let request = port.request(
                ControlReportId::ProductIdRequest.channel(),
                &[ControlReportId::ProductIdRequest.id(), 0],
            );
            OperationChain::new().then(Operation::request_response(
                request,
                ResponseMatcher::for_report(ControlReportId::ProductIdResponse),
            ))
        })?;
        if !done {
            return Ok(false);
        }
        if let Some(response) = chain.last_response() {
            self.note_packet(response);
        }
        self.ready.store(true, Ordering::Release);
        Ok(true)
    }

    fn enable_report(
        &self,
        report: SensorReportId,
        interval_us: u32,
    ) -> Result<bool, DriverError<T::Error>> {
        trace!("enable_report {:?} every {} us", report, interval_us);
        let mut body = [0u8; SET_FEATURE_LEN];
        body[0] = ControlReportId::SetFeatureCommand.id();
        body[1] = report.id();
        // feature flags and change sensitivity stay zero
        body[5..9].copy_from_slice(&interval_us.to_le_bytes());
        // batch interval and sensor specific config stay zero
        let (done, _) = self.run_chain(|_, port| {
            let request = port.request(ControlReportId::SetFeatureCommand.channel(), &body);
            OperationChain::new().then(Operation::request_response(
                request,
                ResponseMatcher::for_report(ControlReportId::GetFeatureResponse),
            ))
        })?;
        trace!("Report {:?} is enabled: {}", report, done);
        Ok(done)
    }

    /// Decode an input report and forward its delay to the transport
    fn parse_input_report(&self, transport: &mut T, response: &ShtpPacketResponse) -> SensorEvent {
        match decode_input_report(response.body()) {
            Ok((header, event)) => {
                let delay = header.delay_micros();
                self.last_report_delay.store(delay, Ordering::Relaxed);
                transport.set_sensor_report_delay(delay);
                event
            }
            Err(e) => {
                debug!("undecodable input report: {}", e);
                SensorEvent::Unhandled {
                    report: SensorReportId::from(response.body_first().unwrap_or(0)),
                    timestamp: 0,
                }
            }
        }
    }

    /// Track state carried by packets that are not input reports
    fn note_packet(&self, response: &ShtpPacketResponse) {
        let body = response.body();
        let Some(&report_id) = body.first() else {
            return;
        };
        match response.channel() {
            Channel::Command => match report_id {
                CMD_RESP_ADVERTISEMENT => self.handle_advertisement(body),
                CMD_RESP_ERROR_LIST => self.handle_error_list(body),
                _ => debug!("unknown cmd: {}", report_id),
            },
            Channel::Executable => match report_id {
                EXECUTABLE_DEVICE_RESP_RESET_COMPLETE => {
                    trace!("resp_reset");
                    self.reset_occurred.store(true, Ordering::Release);
                    self.ready.store(false, Ordering::Release);
                }
                _ => debug!("unknown exe: {}", report_id),
            },
            Channel::Control => self.handle_control(body),
            Channel::Reports | Channel::WakeReports | Channel::Gyro => {
                trace!("skipped report packet on {:?}", response.channel())
            }
            Channel::None(channel) => debug!("unh chan 0x{:X}", channel),
        }
    }

    fn handle_advertisement(&self, body: &[u8]) {
        let mut cursor = 1;
        let mut tags = 0;
        while cursor + 1 < body.len() {
            let len = body[cursor + 1] as usize;
            cursor += 2 + len;
            tags += 1;
        }
        trace!("advertisement with {} tags", tags);
    }

    fn handle_error_list(&self, body: &[u8]) {
        for &code in body.iter().skip(1) {
            match (code, error_description(code)) {
                (0, _) => {}
                (_, Some(text)) => warn!("{}: Error code {}", text, code),
                (_, None) => debug!("Unknown error code {}", code),
            }
        }
    }

    fn handle_control(&self, body: &[u8]) {
        match ControlReportId::from(body[0]) {
            ControlReportId::CommandResponse => {
                // [1] seq, [2] command, [3] command seq, [4] response seq, [5..] R0..R10
                let command = CommandId::from(body.get(2).copied().unwrap_or(0));
                let status = body.get(5).copied();
                trace!("CMD_RESP: {:?} status {:?}", command, status);
                if command == CommandId::MeCalibrate {
                    *lock(&self.calibration_status) = status;
                }
                if let CommandId::None(code) = command {
                    debug!("unknown command response 0x{:X}", code);
                }
            }
            ControlReportId::ProductIdResponse => match ProductId::parse(body) {
                Some(product_id) => {
                    debug!(
                        "PID_RESP {}.{}.{} part {} build {}",
                        product_id.sw_version_major,
                        product_id.sw_version_minor,
                        product_id.sw_version_patch,
                        product_id.sw_part_number,
                        product_id.sw_build_number
                    );
                    self.reset_reason
                        .store(product_id.reset_cause, Ordering::Release);
                    *lock(&self.product_id) = Some(product_id);
                }
                None => debug!("short product id response"),
            },
            ControlReportId::GetFeatureResponse => {
                trace!("feat resp: {:?}", body.get(1))
            }
            ControlReportId::None(code) => debug!("unh hbc: 0x{:X}", code),
            other => trace!("control report {:?}", other),
        }
    }

    /// Read one packet. Returns the decoded event for input reports and
    /// `None` when nothing useful arrived.
    fn read_event(&self) -> Result<Option<SensorEvent>, DriverError<T::Error>> {
        let mut port = self.lock_port()?;
        let transport = port.transport.as_mut().ok_or(DriverError::Closed)?;
        transport.wait_for_device().map_err(DriverError::Transport)?;
        let response = transport
            .receive_packet(true, RECEIVE_WRITE_BYTE_CONTINUAL)
            .map_err(DriverError::Transport)?;
        if !response.data_available() {
            return Ok(None);
        }

        let is_input_report = matches!(
            response.channel(),
            Channel::Reports | Channel::WakeReports
        ) && response.body_first() == Some(SensorReportId::BaseTimestamp.id());
        if !is_input_report {
            self.note_packet(&response);
            return Ok(None);
        }

        let event = self.parse_input_report(transport, &response);
        Ok(event.is_handled().then_some(event))
    }

    fn dispatch(&self, event: &SensorEvent) {
        let listeners: Vec<Arc<dyn SensorListener>> =
            lock(&self.listeners).values().cloned().collect();
        for listener in listeners {
            listener.on_event(event);
        }
    }

    fn calibrate_worker(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.try_send_calibrate() {
                Ok(Some(sent)) => return sent,
                Ok(None) => {}
                Err(e) => {
                    error!("Calibration failed! {}", e);
                    return false;
                }
            }
            if Instant::now() >= deadline {
                warn!("device not ready for calibration within {:?}", timeout);
                return false;
            }
            if !self.config.calibrate_poll.is_zero() {
                thread::sleep(self.config.calibrate_poll);
            }
        }
    }

    /// `Ok(None)` while the device is not ready to accept the command
    fn try_send_calibrate(&self) -> Result<Option<bool>, DriverError<T::Error>> {
        let mut port = self.lock_port()?;
        let transport = port.transport.as_mut().ok_or(DriverError::Closed)?;
        if !transport.wait_for_device().map_err(DriverError::Transport)? {
            return Ok(None);
        }
        let request = self.command_request(&mut port, CommandId::MeCalibrate, &[1, 1, 1]);
        let transport = port.transport.as_mut().ok_or(DriverError::Closed)?;
        let sent = transport
            .send_packet(&request)
            .map_err(DriverError::Transport)?;
        debug!("calibration command sent: {}", sent);
        Ok(Some(sent))
    }
}

fn reader_loop<T: ShtpTransport>(shared: Arc<Shared<T>>) {
    trace!("reader started");
    while shared.active.load(Ordering::Acquire) && !shared.closed.load(Ordering::Acquire) {
        match shared.read_event() {
            Ok(Some(event)) => shared.dispatch(&event),
            Ok(None) => {
                if !shared.config.idle_poll.is_zero() {
                    thread::sleep(shared.config.idle_poll);
                }
            }
            Err(DriverError::Closed) => break,
            Err(e) => {
                error!("report reader stopped: {}", e);
                shared.active.store(false, Ordering::Release);
                break;
            }
        }
    }
    trace!("reader stopped");
}

/// BNO08x IMU driver
///
/// This struct provides the main interface for communicating with BNO08x
/// family IMU sensors over any [`ShtpTransport`].
pub struct BNO08x<T: ShtpTransport> {
    shared: Arc<Shared<T>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    // held by init, reset, product id, start and stop
    lifecycle: Mutex<()>,
}

impl<T: ShtpTransport> BNO08x<T> {
    /// Create a new driver with the default configuration
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, DriverConfig::default())
    }

    pub fn with_config(transport: T, config: DriverConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                port: Mutex::new(Port {
                    transport: Some(transport),
                    sequence_numbers: [0; NUM_CHANNELS],
                }),
                listeners: Mutex::new(HashMap::new()),
                config,
                active: AtomicBool::new(false),
                ready: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                reset_occurred: AtomicBool::new(false),
                reset_reason: AtomicU8::new(0),
                command_sequence: AtomicU8::new(0),
                last_report_delay: AtomicU64::new(0),
                product_id: Mutex::new(None),
                calibration_status: Mutex::new(None),
            }),
            reader: Mutex::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.shared.config
    }

    /// Register a listener under `name`, replacing any previous one
    pub fn add_listener(&self, name: &str, listener: impl SensorListener + 'static) {
        lock(&self.shared.listeners).insert(name.to_string(), Arc::new(listener));
    }

    /// Returns true if a listener was registered under `name`
    pub fn remove_listener(&self, name: &str) -> bool {
        lock(&self.shared.listeners).remove(name).is_some()
    }

    /// Is the report reader running
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Reset observed since the last call
    pub fn was_reset(&self) -> bool {
        self.shared.reset_occurred.swap(false, Ordering::AcqRel)
    }

    /// Reset cause from the last product id response
    pub fn reset_reason(&self) -> u8 {
        self.shared.reset_reason.load(Ordering::Acquire)
    }

    pub fn product_id(&self) -> Option<ProductId> {
        *lock(&self.shared.product_id)
    }

    /// Status byte of the last ME_CALIBRATE command response
    pub fn calibration_status(&self) -> Option<u8> {
        *lock(&self.shared.calibration_status)
    }

    /// Delay of the last decoded input report in microseconds
    pub fn last_report_delay(&self) -> u64 {
        self.shared.last_report_delay.load(Ordering::Relaxed)
    }

    /// Decode a sensor report packet, forwarding its delay to the transport
    /// as a read pacing hint
    pub fn parse_input_report(&self, response: &ShtpPacketResponse) -> SensorEvent {
        let mut port = lock(&self.shared.port);
        match port.transport.as_mut() {
            Some(transport) => self.shared.parse_input_report(transport, response),
            None => crate::reports::decode_sensor_report(response.body()),
        }
    }

    /// Stop the reader thread. Returns whether it was running.
    fn halt_reader(&self) -> bool {
        let was_active = self.shared.active.swap(false, Ordering::AcqRel);
        let handle = lock(&self.reader).take();
        if let Some(handle) = handle {
            // a listener may shut the driver down from the reader thread
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("report reader panicked");
            }
        }
        was_active
    }

    /// Close the transport. Later operations fail with
    /// [`DriverError::Closed`]; calling this again has no effect.
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        trace!("shutdown");
        self.halt_reader();
        self.shared.ready.store(false, Ordering::Release);
        let transport = lock(&self.shared.port).transport.take();
        if let Some(mut transport) = transport {
            transport.close();
        }
    }
}

impl<T> BNO08x<T>
where
    T: ShtpTransport + Send + 'static,
{
    fn spawn_reader(&self) -> Result<(), DriverError<T::Error>> {
        let mut reader = lock(&self.reader);
        if self.is_closed() {
            return Err(DriverError::Closed);
        }
        if reader.as_ref().is_some_and(|handle| !handle.is_finished()) {
            // keep the one reader that is already running
            self.shared.active.store(true, Ordering::Release);
            return Ok(());
        }
        let shared = Arc::clone(&self.shared);
        shared.active.store(true, Ordering::Release);
        let handle = thread::Builder::new()
            .name("bno08x-reader".into())
            .spawn(move || reader_loop(shared))
            .map_err(|e| {
                self.shared.active.store(false, Ordering::Release);
                DriverError::Spawn(e)
            })?;
        *reader = Some(handle);
        Ok(())
    }

    /// Run a handshake with the reader paused so it cannot consume the
    /// responses, resuming it afterwards
    fn exclusive<R>(
        &self,
        f: impl FnOnce(&Shared<T>) -> Result<R, DriverError<T::Error>>,
    ) -> Result<R, DriverError<T::Error>> {
        let was_active = self.halt_reader();
        let result = f(&*self.shared);
        if was_active && !self.is_closed() {
            self.spawn_reader()?;
        }
        result
    }

    /// Hardware setup, soft reset and product id check.
    ///
    /// Returns false when the device did not answer the product id request.
    pub fn init(&self) -> Result<bool, DriverError<T::Error>> {
        let _lifecycle = lock(&self.lifecycle);
        self.init_locked()
    }

    fn init_locked(&self) -> Result<bool, DriverError<T::Error>> {
        trace!("driver init");
        {
            let mut port = self.shared.lock_port()?;
            let transport = port.transport.as_mut().ok_or(DriverError::Closed)?;
            transport.setup().map_err(DriverError::Transport)?;
        }
        self.exclusive(|shared| {
            if !shared.soft_reset()? {
                return Ok(false);
            }
            shared.product_id_request()
        })
    }

    /// Send a reset on the executable channel and drain the packets the hub
    /// emits while restarting.
    pub fn soft_reset(&self) -> Result<bool, DriverError<T::Error>> {
        let _lifecycle = lock(&self.lifecycle);
        self.exclusive(|shared| shared.soft_reset())
    }

    /// Ask for the product id and wait for the response
    pub fn product_id_request(&self) -> Result<bool, DriverError<T::Error>> {
        let _lifecycle = lock(&self.lifecycle);
        self.exclusive(|shared| shared.product_id_request())
    }

    /// Enable `report` every `period` and start delivering events to the
    /// listeners. Initializes the device first if needed.
    ///
    /// Returns false when initialization or the feature handshake did not
    /// converge.
    pub fn start(
        &self,
        report: SensorReportId,
        period: Duration,
    ) -> Result<bool, DriverError<T::Error>> {
        if period.is_zero() {
            return Err(DriverError::InvalidReportPeriod);
        }
        if self.is_closed() {
            return Err(DriverError::Closed);
        }
        let interval_us = u32::try_from(period.as_micros()).unwrap_or(u32::MAX);
        let _lifecycle = lock(&self.lifecycle);
        debug!(
            "START {:?}: ready:{}, active:{}",
            report,
            self.shared.ready.load(Ordering::Acquire),
            self.is_active()
        );

        self.halt_reader();
        if !self.shared.ready.load(Ordering::Acquire) && !self.init_locked()? {
            warn!("start {:?}: device did not initialize", report);
            return Ok(false);
        }
        if !self.shared.enable_report(report, interval_us)? {
            warn!("start {:?}: feature was not acknowledged", report);
            return Ok(false);
        }
        self.spawn_reader()?;
        Ok(true)
    }

    /// Stop the reader and reset the hub, which disables all reports.
    /// Returns false when nothing was running.
    pub fn stop(&self) -> Result<bool, DriverError<T::Error>> {
        let _lifecycle = lock(&self.lifecycle);
        if !self.halt_reader() {
            return Ok(false);
        }
        self.shared.soft_reset()
    }

    /// Start motion engine calibration of accelerometer, gyroscope and
    /// magnetometer in the background.
    ///
    /// The command goes out as soon as the device signals ready, for at most
    /// `timeout`. Joining the handle tells whether it was sent; dropping it
    /// leaves the calibration to complete on its own.
    pub fn calibrate(&self, timeout: Duration) -> Result<JoinHandle<bool>, DriverError<T::Error>> {
        if self.is_closed() {
            return Err(DriverError::Closed);
        }
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name("bno08x-calibrate".into())
            .spawn(move || shared.calibrate_worker(timeout))
            .map_err(DriverError::Spawn)
    }

    /// Clear dynamic calibration data and reset the hub
    pub fn clear_calibration(&self) -> Result<bool, DriverError<T::Error>> {
        self.shared.send_command(CommandId::ClearDcd, &[])
    }

    /// Persist the current dynamic calibration data
    pub fn save_calibration(&self) -> Result<bool, DriverError<T::Error>> {
        self.shared.send_command(CommandId::Dcd, &[])
    }

    /// Enable or disable calibration per sensor
    pub fn set_calibration_config(
        &self,
        accel: bool,
        gyro: bool,
        mag: bool,
    ) -> Result<bool, DriverError<T::Error>> {
        self.shared
            .send_command(CommandId::MeCalibrate, &[accel as u8, gyro as u8, mag as u8])
    }

    /// Tare against the current orientation
    pub fn tare_now(
        &self,
        z_axis_only: bool,
        basis: TareBasis,
    ) -> Result<bool, DriverError<T::Error>> {
        let axes = if z_axis_only { TARE_AXIS_Z } else { TARE_AXIS_ALL };
        self.shared
            .send_command(CommandId::Tare, &[TARE_NOW, axes, basis.into()])
    }

    /// Persist the current tare
    pub fn save_tare(&self) -> Result<bool, DriverError<T::Error>> {
        self.shared.send_command(CommandId::Tare, &[TARE_PERSIST])
    }

    /// Reset the reorientation to identity
    pub fn clear_tare(&self) -> Result<bool, DriverError<T::Error>> {
        self.shared
            .send_command(CommandId::Tare, &[TARE_SET_REORIENTATION])
    }

    pub fn sleep(&self) -> Result<bool, DriverError<T::Error>> {
        self.shared
            .send(Channel::Executable, &[EXECUTABLE_DEVICE_CMD_SLEEP])
    }

    pub fn wake(&self) -> Result<bool, DriverError<T::Error>> {
        self.shared.send(Channel::Executable, &[EXECUTABLE_DEVICE_CMD_ON])
    }
}

impl<T: ShtpTransport> Drop for BNO08x<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl BNO08x<SpiTransport<SpiDevice, GpiodIn, GpiodOut>> {
    /// Create a new BNO08x driver using SPI with explicit GPIO chip and pin
    /// numbers
    ///
    /// # Arguments
    /// * `spidevice` - Path to the SPI device (e.g., "/dev/spidev1.0")
    /// * `hintn_gpiochip` - GPIO chip for the interrupt pin
    /// * `hintn_pin` - GPIO pin number for the interrupt
    /// * `reset_gpiochip` - GPIO chip for the reset pin
    /// * `reset_pin` - GPIO pin number for reset
    pub fn new_spi(
        spidevice: &str,
        hintn_gpiochip: &str,
        hintn_pin: u32,
        reset_gpiochip: &str,
        reset_pin: u32,
    ) -> io::Result<Self> {
        let (hintn, reset) = if hintn_gpiochip == reset_gpiochip {
            let chip = gpiod::Chip::new(hintn_gpiochip)?;
            (
                GpiodIn::new(&chip, hintn_pin)?,
                GpiodOut::new(&chip, reset_pin)?,
            )
        } else {
            let chip0 = gpiod::Chip::new(hintn_gpiochip)?;
            let chip1 = gpiod::Chip::new(reset_gpiochip)?;
            (
                GpiodIn::new(&chip0, hintn_pin)?,
                GpiodOut::new(&chip1, reset_pin)?,
            )
        };

        let spi = SpiDevice::new(spidevice)?;
        let transport = SpiTransport::new(SpiControlLines { spi, hintn, reset });
        Ok(BNO08x::new(transport))
    }

    /// Create a new BNO08x driver using SPI with GPIO pin names (symbol lookup)
    ///
    /// This method searches for GPIO pins by their symbolic names across all
    /// GPIO chips on the system.
    ///
    /// # Arguments
    /// * `spidevice` - Path to the SPI device (e.g., "/dev/spidev1.0")
    /// * `hintn_pin` - Symbolic name of the interrupt pin (e.g., "IMU_INT")
    /// * `reset_pin` - Symbolic name of the reset pin (e.g., "IMU_RST")
    pub fn new_spi_from_symbol(
        spidevice: &str,
        hintn_pin: &str,
        reset_pin: &str,
    ) -> io::Result<Self> {
        let mut hintn: Option<(String, u32)> = None;
        let mut reset: Option<(String, u32)> = None;
        'outer: for entry in gpiod::Chip::list_devices()? {
            let chip = gpiod::Chip::new(&entry)?;
            for i in 0..chip.num_lines() {
                let name = chip.line_info(i)?.name;
                trace!("--- {} ---", name);
                if hintn.is_none() && name == hintn_pin {
                    hintn = Some((entry.display().to_string(), i));
                } else if reset.is_none() && name == reset_pin {
                    reset = Some((entry.display().to_string(), i));
                }
                if hintn.is_some() && reset.is_some() {
                    break 'outer;
                }
            }
        }
        let (hintn_chip, hintn_num) = hintn.ok_or_else(|| {
            Error::new(
                ErrorKind::AddrNotAvailable,
                format!("Did not find hintn pin \"{}\"", hintn_pin),
            )
        })?;
        let (reset_chip, reset_num) = reset.ok_or_else(|| {
            Error::new(
                ErrorKind::AddrNotAvailable,
                format!("Did not find reset pin \"{}\"", reset_pin),
            )
        })?;
        Self::new_spi(spidevice, &hintn_chip, hintn_num, &reset_chip, reset_num)
    }
}

/// Find the GPIO chip and line offset carrying the line name `symbol`
fn find_gpio_line(symbol: &str) -> io::Result<(String, u32)> {
    for entry in gpiod::Chip::list_devices()? {
        let chip = gpiod::Chip::new(&entry)?;
        for i in 0..chip.num_lines() {
            if chip.line_info(i)?.name == symbol {
                return Ok((entry.display().to_string(), i));
            }
        }
    }
    Err(Error::new(
        ErrorKind::AddrNotAvailable,
        format!("Did not find pin \"{}\"", symbol),
    ))
}

impl BNO08x<I2cTransport<I2cdev>> {
    /// Create a new BNO08x driver on a Linux I2C bus without an interrupt
    /// line
    ///
    /// # Arguments
    /// * `i2cdevice` - Path to the I2C bus (e.g., "/dev/i2c-1")
    /// * `address` - 7-bit device address, 0x4B or 0x4A
    pub fn new_i2c(i2cdevice: &str, address: u8) -> io::Result<Self> {
        let bus = I2cdev::new(i2cdevice).map_err(io::Error::other)?;
        Ok(BNO08x::new(I2cTransport::new(bus, address)))
    }
}

impl BNO08x<I2cTransport<I2cdev, GpiodIn>> {
    /// Create a new BNO08x driver on a Linux I2C bus, gating reads on the
    /// interrupt line named `int_pin`
    pub fn new_i2c_from_symbol(i2cdevice: &str, address: u8, int_pin: &str) -> io::Result<Self> {
        let (chip_path, line) = find_gpio_line(int_pin)?;
        let chip = gpiod::Chip::new(&chip_path)?;
        let interrupt = GpiodIn::new(&chip, line)?;
        let bus = I2cdev::new(i2cdevice).map_err(io::Error::other)?;
        Ok(BNO08x::new(I2cTransport::with_interrupt(
            bus, address, interrupt,
        )))
    }
}
