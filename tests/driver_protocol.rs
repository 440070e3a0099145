// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Driver behaviour over the scripted mock transport.

use bno08x_shtp::{
    interface::{mock::MockError, MockTransport},
    BNO08x, Channel, DriverConfig, DriverError, SensorEvent, SensorReportId, ShtpPacketResponse,
    TareBasis,
};
use std::{
    sync::{mpsc, Once},
    thread,
    time::{Duration, Instant},
};

static INIT: Once = Once::new();

fn init_logger() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

fn advertisement() -> ShtpPacketResponse {
    ShtpPacketResponse::build(Channel::Command, 0, &[0x00, 0x00, 0x01, 0x01])
}

fn reset_complete() -> ShtpPacketResponse {
    ShtpPacketResponse::build(Channel::Executable, 0, &[0x01])
}

fn product_id_response(reset_cause: u8) -> ShtpPacketResponse {
    ShtpPacketResponse::build(
        Channel::Control,
        0,
        &[
            0xF8, reset_cause, 3, 2, 0x4C, 0x0E, 0x00, 0x01, 0x05, 0x00, 0x00, 0x00, 0x10, 0x00,
            0x00, 0x00,
        ],
    )
}

fn feature_response(report: u8) -> ShtpPacketResponse {
    let mut body = [0u8; 17];
    body[0] = 0xFC;
    body[1] = report;
    ShtpPacketResponse::build(Channel::Control, 0, &body)
}

fn accelerometer_report() -> ShtpPacketResponse {
    ShtpPacketResponse::build(
        Channel::Reports,
        0,
        &[
            0xFB, 0x78, 0, 0, 0, 0x01, 0, 0x03, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0xFC,
        ],
    )
}

fn noise() -> ShtpPacketResponse {
    ShtpPacketResponse::build(Channel::Reports, 0, &[0xFB, 0, 0, 0, 0])
}

/// Mock that answers a reset and a product id request like the hub does
fn scripted() -> MockTransport {
    let mock = MockTransport::new();
    mock.reply_to(Channel::Executable, 1, vec![advertisement(), reset_complete()]);
    mock.reply_to(Channel::Control, 0xF9, vec![product_id_response(1)]);
    mock
}

fn streaming() -> MockTransport {
    let mock = scripted();
    mock.reply_to(Channel::Control, 0xFD, vec![feature_response(0x01)]);
    mock
}

fn config() -> DriverConfig {
    DriverConfig::immediate().with_idle_poll(Duration::from_millis(1))
}

fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

fn event_channel(imu: &BNO08x<MockTransport>) -> mpsc::Receiver<SensorEvent> {
    let (tx, rx) = mpsc::channel();
    imu.add_listener("test", move |event: &SensorEvent| {
        let _ = tx.send(event.clone());
    });
    rx
}

#[test]
fn test_init_sequence() {
    init_logger();
    let mock = scripted();
    let imu = BNO08x::with_config(mock.clone(), config());

    assert!(imu.init().unwrap());
    assert_eq!(mock.setup_calls(), 1);

    let sent = mock.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].channel(), Channel::Executable);
    assert_eq!(sent[0].body(), &[1]);
    assert_eq!(sent[1].channel(), Channel::Control);
    assert_eq!(sent[1].body(), &[0xF9, 0]);

    let product_id = imu.product_id().unwrap();
    assert_eq!(product_id.sw_version_major, 3);
    assert_eq!(product_id.sw_version_minor, 2);
    assert_eq!(product_id.sw_build_number, 5);
    assert_eq!(imu.reset_reason(), 1);
    assert!(imu.was_reset());
    assert!(!imu.was_reset());
}

#[test]
fn test_product_id_request_after_reset_sees_no_leftovers() {
    init_logger();
    let mock = scripted();
    let imu = BNO08x::with_config(mock.clone(), config());

    assert!(imu.soft_reset().unwrap());
    assert_eq!(mock.pending(), 0);

    let before = mock.receive_calls();
    assert!(imu.product_id_request().unwrap());
    // the first packet read after the request is the answer
    assert_eq!(mock.receive_calls() - before, 1);
}

#[test]
fn test_drain_is_bounded() {
    init_logger();
    let mock = MockTransport::new();
    for _ in 0..5 {
        mock.push_response(noise());
    }
    let imu = BNO08x::with_config(mock.clone(), config().with_drain_limit(2));
    assert!(imu.soft_reset().unwrap());
    assert_eq!(mock.pending(), 3);
}

#[test]
fn test_unanswered_request_gives_up() {
    init_logger();
    let mock = MockTransport::new();
    let imu = BNO08x::with_config(mock.clone(), config().with_max_attempts(4));
    assert!(!imu.product_id_request().unwrap());
    assert_eq!(mock.receive_calls(), 4);
    assert!(imu.product_id().is_none());
}

#[test]
fn test_sequence_numbers_per_channel() {
    init_logger();
    let mock = scripted();
    let imu = BNO08x::with_config(mock.clone(), config());
    assert!(imu.product_id_request().unwrap());
    assert!(imu.soft_reset().unwrap());
    assert!(imu.product_id_request().unwrap());
    assert!(imu.product_id_request().unwrap());

    let control: Vec<u8> = mock
        .sent()
        .iter()
        .filter(|r| r.channel() == Channel::Control)
        .map(|r| r.sequence())
        .collect();
    let executable: Vec<u8> = mock
        .sent()
        .iter()
        .filter(|r| r.channel() == Channel::Executable)
        .map(|r| r.sequence())
        .collect();
    assert_eq!(control, vec![0, 1, 2]);
    assert_eq!(executable, vec![0]);
}

#[test]
fn test_start_streams_events() {
    init_logger();
    let mock = streaming();
    let imu = BNO08x::with_config(mock.clone(), config());
    let events = event_channel(&imu);

    assert!(imu
        .start(SensorReportId::Accelerometer, Duration::from_millis(10))
        .unwrap());
    assert!(imu.is_active());

    let set_feature = mock
        .sent()
        .into_iter()
        .find(|r| r.body().first() == Some(&0xFD))
        .unwrap();
    assert_eq!(set_feature.channel(), Channel::Control);
    assert_eq!(set_feature.body().len(), 17);
    assert_eq!(&set_feature.body()[..9], &[0xFD, 0x01, 0, 0, 0, 0x10, 0x27, 0, 0]);

    mock.push_response(accelerometer_report());
    match events.recv_timeout(Duration::from_secs(2)).unwrap() {
        SensorEvent::Data(data) => {
            assert_eq!(data.status, 3);
            assert!((data.x - 1.0).abs() < 1e-6);
            assert!((data.y - 2.0).abs() < 1e-6);
            assert!((data.z + 4.0).abs() < 1e-6);
            assert_eq!(data.timestamp, 0x78);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(wait_until(|| mock.report_delays().contains(&0)));
    imu.shutdown();
    assert!(!imu.is_active());
}

#[test]
fn test_unknown_reports_are_not_dispatched() {
    init_logger();
    let mock = streaming();
    let imu = BNO08x::with_config(mock.clone(), config());
    let events = event_channel(&imu);
    assert!(imu
        .start(SensorReportId::Pressure, Duration::from_millis(10))
        .unwrap());

    mock.push_response(ShtpPacketResponse::build(
        Channel::Reports,
        0,
        &[0xFB, 0, 0, 0, 0, 0x0A, 0, 0, 0, 1, 2, 3, 4],
    ));
    mock.push_response(accelerometer_report());
    let event = events.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(
        event.event_type(),
        Some(bno08x_shtp::DataEventType::Accelerometer)
    );
}

#[test]
fn test_start_rejects_zero_period() {
    init_logger();
    let imu = BNO08x::with_config(streaming(), config());
    assert!(matches!(
        imu.start(SensorReportId::Accelerometer, Duration::ZERO),
        Err(DriverError::InvalidReportPeriod)
    ));
}

#[test]
fn test_start_without_feature_ack() {
    init_logger();
    let imu = BNO08x::with_config(scripted(), config().with_max_attempts(3));
    assert!(!imu
        .start(SensorReportId::Accelerometer, Duration::from_millis(10))
        .unwrap());
    assert!(!imu.is_active());
}

#[test]
fn test_report_delay_forwarded() {
    init_logger();
    let mock = MockTransport::new();
    let imu = BNO08x::with_config(mock.clone(), config());
    let response = ShtpPacketResponse::build(
        Channel::Reports,
        0,
        &[
            0xFB, 0, 0, 0, 0, 0x01, 0, 0x29, 0x32, 0x00, 0x01, 0x00, 0x01, 0x00, 0x01,
        ],
    );
    let event = imu.parse_input_report(&response);
    assert_eq!(event.status(), Some(1));
    assert_eq!(mock.report_delays(), vec![261_000]);
    assert_eq!(imu.last_report_delay(), 261_000);
}

#[test]
fn test_calibrate_goes_to_control_channel() {
    init_logger();
    let mock = MockTransport::new();
    let imu = BNO08x::with_config(mock.clone(), config());
    let handle = imu.calibrate(Duration::from_millis(100)).unwrap();
    assert!(handle.join().unwrap());

    let sent = mock.sent();
    let request = sent.last().unwrap();
    assert_eq!(request.channel(), Channel::Control);
    assert_eq!(request.body().len(), 12);
    assert_eq!(request.body()[0], 0xF2);
    assert_eq!(request.body()[2], 7);
    assert_eq!(&request.body()[3..6], &[1, 1, 1]);
}

#[test]
fn test_calibrate_while_streaming() {
    init_logger();
    let mock = streaming();
    let imu = BNO08x::with_config(mock.clone(), config());
    let events = event_channel(&imu);
    assert!(imu
        .start(SensorReportId::RotationVector, Duration::from_millis(10))
        .unwrap());

    assert!(imu.calibrate(Duration::from_secs(1)).unwrap().join().unwrap());

    // ME_CALIBRATE command response, status 0
    mock.push_response(ShtpPacketResponse::build(
        Channel::Control,
        0,
        &[0xF1, 0, 7, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    ));
    mock.push_response(ShtpPacketResponse::build(
        Channel::Reports,
        0,
        &[
            0xFB, 0, 0, 0, 0, 0x05, 0, 0x03, 0, 0x00, 0x40, 0, 0, 0, 0, 0x00, 0x40, 0, 0,
        ],
    ));
    match events.recv_timeout(Duration::from_secs(2)).unwrap() {
        SensorEvent::Vector(v) => {
            assert!((v.x - 1.0).abs() < 1e-6);
            assert!(v.y.abs() < 1e-6);
            assert!(v.z.abs() < 1e-6);
            assert!((v.quat_real - 1.0).abs() < 1e-6);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(wait_until(|| imu.calibration_status() == Some(0)));
}

#[test]
fn test_calibrate_after_shutdown() {
    init_logger();
    let mock = MockTransport::new();
    let imu = BNO08x::with_config(mock.clone(), config());
    imu.shutdown();
    assert!(matches!(
        imu.calibrate(Duration::from_millis(10)),
        Err(DriverError::Closed)
    ));
}

#[test]
fn test_tare_and_calibration_commands() {
    init_logger();
    let mock = MockTransport::new();
    let imu = BNO08x::with_config(mock.clone(), config());

    assert!(imu.tare_now(true, TareBasis::RotationVector).unwrap());
    assert!(imu.tare_now(false, TareBasis::GamingRotationVector).unwrap());
    assert!(imu.save_tare().unwrap());
    assert!(imu.clear_tare().unwrap());
    assert!(imu.clear_calibration().unwrap());
    assert!(imu.save_calibration().unwrap());
    assert!(imu.set_calibration_config(true, false, true).unwrap());

    let sent = mock.sent();
    assert!(sent
        .iter()
        .all(|r| r.channel() == Channel::Control && r.body().len() == 12));
    let bodies: Vec<&[u8]> = sent.iter().map(|r| &r.body()[..6]).collect();
    assert_eq!(bodies[0], &[0xF2, 0, 3, 0, 0x04, 0]);
    assert_eq!(bodies[1], &[0xF2, 1, 3, 0, 0x07, 1]);
    assert_eq!(bodies[2], &[0xF2, 2, 3, 1, 0, 0]);
    assert_eq!(bodies[3], &[0xF2, 3, 3, 2, 0, 0]);
    assert_eq!(bodies[4][2], 11);
    assert_eq!(bodies[5][2], 6);
    assert_eq!(bodies[6], &[0xF2, 6, 7, 1, 0, 1]);
}

#[test]
fn test_sleep_and_wake() {
    init_logger();
    let mock = MockTransport::new();
    let imu = BNO08x::with_config(mock.clone(), config());
    assert!(imu.sleep().unwrap());
    assert!(imu.wake().unwrap());
    let sent = mock.sent();
    assert_eq!(sent[0].channel(), Channel::Executable);
    assert_eq!(sent[0].body(), &[3]);
    assert_eq!(sent[1].body(), &[2]);
    assert_eq!(sent[1].sequence(), 1);
}

#[test]
fn test_shutdown_is_idempotent() {
    init_logger();
    let mock = scripted();
    {
        let imu = BNO08x::with_config(mock.clone(), config());
        imu.shutdown();
        imu.shutdown();
        assert!(imu.is_closed());
        assert!(matches!(imu.init(), Err(DriverError::Closed)));
        assert!(matches!(imu.soft_reset(), Err(DriverError::Closed)));
        assert!(matches!(
            imu.start(SensorReportId::Accelerometer, Duration::from_millis(10)),
            Err(DriverError::Closed)
        ));
        assert!(matches!(imu.sleep(), Err(DriverError::Closed)));
    }
    assert_eq!(mock.close_count(), 1);
}

#[test]
fn test_shutdown_interrupts_pending_handshake() {
    init_logger();
    let mock = MockTransport::new();
    let imu = BNO08x::with_config(mock.clone(), config().with_max_attempts(usize::MAX));

    thread::scope(|s| {
        let request = s.spawn(|| {
            let started = Instant::now();
            (imu.product_id_request(), started.elapsed())
        });
        assert!(wait_until(|| mock.receive_calls() > 10));
        imu.shutdown();

        let (result, elapsed) = request.join().unwrap();
        assert!(matches!(result, Ok(false)));
        assert!(elapsed < Duration::from_secs(2));
    });
    assert_eq!(mock.close_count(), 1);
    assert!(imu.product_id().is_none());
}

#[test]
fn test_concurrent_starts_share_one_reader() {
    init_logger();
    let mock = streaming();
    let imu = BNO08x::with_config(mock.clone(), config());

    thread::scope(|s| {
        let first = s.spawn(|| imu.start(SensorReportId::Accelerometer, Duration::from_millis(10)));
        let second = s.spawn(|| imu.start(SensorReportId::Gyroscope, Duration::from_millis(10)));
        assert!(first.join().unwrap().unwrap());
        assert!(second.join().unwrap().unwrap());
    });
    assert!(imu.is_active());

    // a second reader left behind would keep polling after stop
    assert!(imu.stop().unwrap());
    let receives = mock.receive_calls();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(mock.receive_calls(), receives);
    assert_eq!(mock.setup_calls(), 1);
}

#[test]
fn test_drop_closes_transport() {
    init_logger();
    let mock = streaming();
    {
        let imu = BNO08x::with_config(mock.clone(), config());
        assert!(imu
            .start(SensorReportId::Accelerometer, Duration::from_millis(10))
            .unwrap());
    }
    assert_eq!(mock.close_count(), 1);
    assert!(mock.is_closed());
}

#[test]
fn test_stop_resets_hub() {
    init_logger();
    let mock = streaming();
    let imu = BNO08x::with_config(mock.clone(), config());
    assert!(!imu.stop().unwrap());
    assert!(imu
        .start(SensorReportId::Accelerometer, Duration::from_millis(10))
        .unwrap());

    let resets_before = mock
        .sent()
        .iter()
        .filter(|r| r.channel() == Channel::Executable)
        .count();
    assert!(imu.stop().unwrap());
    assert!(!imu.is_active());
    let resets_after = mock
        .sent()
        .iter()
        .filter(|r| r.channel() == Channel::Executable)
        .count();
    assert_eq!(resets_after, resets_before + 1);
}

#[test]
fn test_transport_errors_propagate() {
    init_logger();
    let mock = scripted();
    mock.fail_send(true);
    let imu = BNO08x::with_config(mock.clone(), config());
    assert!(matches!(
        imu.init(),
        Err(DriverError::Transport(MockError::Send))
    ));

    mock.fail_send(false);
    mock.reject_send(true);
    assert!(!imu.soft_reset().unwrap());
}

#[test]
fn test_reader_stops_on_receive_error() {
    init_logger();
    let mock = streaming();
    let imu = BNO08x::with_config(mock.clone(), config());
    assert!(imu
        .start(SensorReportId::Accelerometer, Duration::from_millis(10))
        .unwrap());
    mock.fail_receive(true);
    assert!(wait_until(|| !imu.is_active()));
}

#[test]
fn test_listener_registry() {
    init_logger();
    let imu = BNO08x::with_config(MockTransport::new(), config());
    imu.add_listener("a", |_: &SensorEvent| {});
    assert!(imu.remove_listener("a"));
    assert!(!imu.remove_listener("a"));
}
