//! 调度器集成测试（后台线程 + MockTransport）

use pelco_driver::{
    ControllerBuilder, DeviceEvent, DeviceEventKind, DriverError, LabeledCommand, QueryConfig,
    SchedulerConfig,
};
use pelco_protocol::{
    DeviceAddress, Direction, VerticalAngleMode, checksum, move_frame, set_horizontal_angle,
    set_vertical_angle, stop,
};
use pelco_serial::mock::MockTransport;
use crossbeam_channel::Receiver;
use smallvec::smallvec;
use std::time::{Duration, Instant};

fn reply(cmd: u8, raw: u16) -> Vec<u8> {
    reply_from(0x01, cmd, raw)
}

fn reply_from(address: u8, cmd: u8, raw: u16) -> Vec<u8> {
    let [d1, d2] = raw.to_be_bytes();
    let body = [address, 0x00, cmd, d1, d2];
    let mut bytes = vec![0xFF];
    bytes.extend_from_slice(&body);
    bytes.push(checksum(&body));
    bytes
}

fn responsive_mock() -> MockTransport {
    MockTransport::with_responder(|bytes| match bytes[3] {
        0x51 => Some(reply(0x59, 9000)),
        0x53 => Some(reply(0x5B, 35000)),
        _ => None,
    })
}

/// 按请求帧中的地址应答
fn addressed_mock() -> MockTransport {
    MockTransport::with_responder(|bytes| match bytes[3] {
        0x51 => Some(reply_from(bytes[1], 0x59, 18000)),
        0x53 => Some(reply_from(bytes[1], 0x5B, 4500)),
        _ => None,
    })
}

fn is_query(bytes: &[u8]) -> bool {
    bytes[3] == 0x51 || bytes[3] == 0x53
}

fn fast_builder(query_interval: Duration) -> ControllerBuilder {
    ControllerBuilder::new()
        .query_config(QueryConfig {
            response_timeout: Duration::from_millis(5),
            inter_axis_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
            poll_interval: Duration::from_micros(200),
            ..QueryConfig::default()
        })
        .scheduler_config(SchedulerConfig {
            query_interval,
            command_poll_interval: Duration::from_millis(1),
        })
}

/// 等待满足条件的事件
fn wait_for(
    events: &Receiver<DeviceEvent>,
    timeout: Duration,
    pred: impl Fn(&DeviceEventKind) -> bool,
) -> Option<DeviceEvent> {
    let deadline = Instant::now() + timeout;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match events.recv_timeout(remaining) {
            Ok(event) if pred(&event.kind) => return Some(event),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
    None
}

#[test]
fn test_commands_are_sent_in_order_with_labels() {
    let transport = MockTransport::new();
    let handle = transport.handle();
    let scheduler = fast_builder(Duration::from_secs(60)).build_with_transport(transport);
    let events = scheduler.events();
    let address = DeviceAddress::default();

    scheduler
        .send_burst(smallvec![
            LabeledCommand::new(stop(address), "Tracking Stop"),
            LabeledCommand::new(set_horizontal_angle(address, 123.45).unwrap(), "Tracking Set H"),
            LabeledCommand::new(set_vertical_angle(address, -10.0).unwrap(), "Tracking Set V"),
        ])
        .unwrap();

    let mut labels = Vec::new();
    while labels.len() < 3 {
        let event = wait_for(&events, Duration::from_secs(2), |k| {
            matches!(k, DeviceEventKind::CommandSent { .. })
        })
        .expect("command-sent event");
        if let DeviceEventKind::CommandSent { label, .. } = event.kind {
            labels.push(label.into_owned());
        }
    }
    assert_eq!(labels, ["Tracking Stop", "Tracking Set H", "Tracking Set V"]);

    let commands = handle.written_matching(|b| !is_query(b));
    assert_eq!(commands[0], stop(address).as_bytes().to_vec());
    assert_eq!(commands[1][3], 0x4B);
    assert_eq!(u16::from_be_bytes([commands[1][4], commands[1][5]]), 12345);
    assert_eq!(u16::from_be_bytes([commands[2][4], commands[2][5]]), 35000);
    assert_eq!(scheduler.last_sent().unwrap().label, "Tracking Set V");
}

#[test]
fn test_periodic_query_publishes_angle_results() {
    let scheduler = fast_builder(Duration::from_millis(50))
        .vertical_mode(VerticalAngleMode::Negative)
        .build_with_transport(responsive_mock());
    let events = scheduler.events();

    let event = wait_for(&events, Duration::from_secs(2), |k| {
        matches!(k, DeviceEventKind::AngleResult(o) if o.is_success())
    })
    .expect("angle result");
    let DeviceEventKind::AngleResult(outcome) = event.kind else {
        unreachable!()
    };
    let sample = outcome.sample().unwrap();
    assert_eq!(sample.horizontal_deg, 90.0);
    assert_eq!(sample.vertical_deg, -10.0);
    assert_eq!(scheduler.last_sample().unwrap().vertical_raw, 35000);

    // 运行时切换解码模式
    scheduler.set_vertical_mode(VerticalAngleMode::Direct);
    let event = wait_for(&events, Duration::from_secs(2), |k| {
        matches!(k, DeviceEventKind::AngleResult(o) if o.vertical_mode == VerticalAngleMode::Direct)
    })
    .expect("angle result in direct mode");
    let DeviceEventKind::AngleResult(outcome) = event.kind else {
        unreachable!()
    };
    assert_eq!(outcome.vertical.degrees(), Some(350.0));
}

#[test]
fn test_runtime_address_and_interval_change() {
    let transport = addressed_mock();
    let handle = transport.handle();
    // 初始间隔很长：启动时只查询一次
    let scheduler = fast_builder(Duration::from_secs(60)).build_with_transport(transport);
    let events = scheduler.events();

    let first = wait_for(&events, Duration::from_secs(2), |k| {
        matches!(k, DeviceEventKind::AngleResult(o) if o.is_success())
    })
    .expect("initial angle result");
    let DeviceEventKind::AngleResult(outcome) = first.kind else {
        unreachable!()
    };
    assert_eq!(outcome.device_address.get(), 0x01);

    let new_address = DeviceAddress::new(0x22).unwrap();
    scheduler.set_address(new_address);
    scheduler.set_query_interval(Duration::from_millis(20));
    assert_eq!(scheduler.address(), new_address);
    assert_eq!(
        scheduler.scheduler_config().query_interval,
        Duration::from_millis(20)
    );

    // 60s 间隔下不会再有查询；新间隔下应连续收到新地址的结果
    for _ in 0..3 {
        let event = wait_for(&events, Duration::from_secs(2), |k| {
            matches!(k, DeviceEventKind::AngleResult(_))
        })
        .expect("angle result at new interval");
        let DeviceEventKind::AngleResult(outcome) = event.kind else {
            unreachable!()
        };
        assert_eq!(outcome.device_address, new_address);
        assert!(outcome.is_success());
        assert_eq!(outcome.horizontal.degrees(), Some(180.0));
    }

    let addresses: Vec<u8> = handle
        .written_matching(is_query)
        .iter()
        .map(|frame| frame[1])
        .collect();
    assert_eq!(&addresses[..2], &[0x01, 0x01]);
    assert!(addresses[2..].iter().all(|&a| a == 0x22));
    assert!(addresses.len() >= 8);

    // 恢复长间隔后不再查询
    scheduler.set_query_interval(Duration::from_secs(60));
    std::thread::sleep(Duration::from_millis(100));
    let settled = handle.written_matching(is_query).len();
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(handle.written_matching(is_query).len(), settled);
}

#[test]
fn test_disconnect_sends_stop_and_refuses_commands() {
    let transport = MockTransport::new();
    let handle = transport.handle();
    let scheduler = fast_builder(Duration::from_secs(60)).build_with_transport(transport);
    let events = scheduler.events();
    let address = DeviceAddress::default();

    scheduler
        .send_frame(move_frame(address, Direction::Right, 0x20), "Move Right")
        .unwrap();
    assert!(
        wait_for(&events, Duration::from_secs(2), |k| matches!(
            k,
            DeviceEventKind::CommandSent { .. }
        ))
        .is_some()
    );

    scheduler.disconnect();
    assert!(!scheduler.is_connected());
    assert!(matches!(
        scheduler.send_frame(stop(address), "Stop"),
        Err(DriverError::NotConnected)
    ));

    assert!(
        wait_for(&events, Duration::from_secs(2), |k| {
            *k == DeviceEventKind::ConnectionChanged { connected: false }
        })
        .is_some()
    );
    assert!(handle.is_closed());
    let last = handle.written().pop().unwrap();
    assert_eq!(last, stop(address).as_bytes().to_vec());
}

#[test]
fn test_drop_closes_without_stop_frame() {
    let transport = MockTransport::new();
    let handle = transport.handle();
    let scheduler = fast_builder(Duration::from_secs(60)).build_with_transport(transport);
    assert!(scheduler.is_running());
    drop(scheduler);
    assert!(handle.is_closed());
    // 未请求断开时直接关闭，不发送停止帧
    assert!(handle.written_matching(|b| !is_query(b)).is_empty());
}
