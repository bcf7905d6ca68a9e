//! End-to-end dispatch tests: control-plane command in, bus frames out,
//! confirmation against simulated device reports.

use parking_lot::Mutex;
use wallpad_protocol::{
    decode_state_frame, encode_command, predict_state, CommandAction, CommandRequest, DeviceKind,
    DeviceState, Frame, PowerState, SchemaSet,
};

use wallpad_bridge::config::ClimateSettings;
use wallpad_bridge::queue::{CommandQueue, FramePublisher, TickOutcome};
use wallpad_bridge::state::{build_command, state_messages, TopicScheme};

const SCHEMA: &str = r#"
Light:
  type: light
  command:
    header: "3D"
    structure:
      "1": { name: deviceId }
      "2": { name: power, values: { on: "01", off: "00" } }
  state:
    header: "B0"
    structure:
      "1": { name: power, values: { on: "01", off: "00" } }
      "2": { name: deviceId }
"#;

struct RecordingPublisher {
    sent: Mutex<Vec<String>>,
}

impl RecordingPublisher {
    fn new() -> Self {
        RecordingPublisher {
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl FramePublisher for RecordingPublisher {
    fn publish_frame(&self, frame: &Frame) -> anyhow::Result<()> {
        self.sent.lock().push(frame.to_hex());
        Ok(())
    }
}

/// A device reply confirming Light `index` is on; `noise` varies a spare
/// byte so replies stay distinct in the dedup window.
fn light_on_report(index: u8, noise: u8) -> String {
    Frame::with_checksum([0xB0, 0x01, index, noise, 0, 0, 0]).to_hex()
}

#[test]
fn test_command_flows_from_topic_to_confirmed_send() {
    let schemas = SchemaSet::from_yaml_str(SCHEMA).unwrap();
    let scheme = TopicScheme::new("wallpad");
    let climate = ClimateSettings::default();

    // Controller publishes ON for Light 2.
    let (device, index, attr) = scheme
        .parse_command_topic("wallpad/Light2/power/command")
        .unwrap();
    let request = build_command(&climate, device, index, &attr, "ON").unwrap();
    assert_eq!(request.action, CommandAction::SetPower(PowerState::On));

    let frame = encode_command(&schemas, &request).unwrap();
    assert_eq!(frame.to_hex(), "3D02010000000040");
    let expected = predict_state(&schemas, &frame);

    let mut queue = CommandQueue::new(3, 20);
    let publisher = RecordingPublisher::new();
    queue.enqueue(frame, expected);

    // First two ticks see no replies and resend.
    assert_eq!(queue.tick(&publisher, &[]), TickOutcome::Requeued(frame));
    assert_eq!(queue.tick(&publisher, &[]), TickOutcome::Requeued(frame));

    // The device starts reporting on; three distinct reports confirm.
    // The confirming tick still transmits before scanning.
    let reports = vec![
        light_on_report(2, 0),
        light_on_report(2, 1),
        light_on_report(2, 2),
    ];
    assert_eq!(queue.tick(&publisher, &reports), TickOutcome::Confirmed(frame));
    assert_eq!(publisher.sent.lock().len(), 3);

    // The confirming reports decode back to the state the controller is
    // told about.
    let report = Frame::from_hex(&light_on_report(2, 0)).unwrap();
    let event = decode_state_frame(&schemas, &report).unwrap().unwrap();
    assert_eq!(event.device, DeviceKind::Light);
    assert_eq!(event.index, 2);
    assert_eq!(
        event.state,
        DeviceState::Switch {
            power: PowerState::On
        }
    );
    let messages = state_messages(&scheme, &event);
    assert_eq!(
        messages,
        vec![("wallpad/Light2/power/state".to_string(), "ON".to_string())]
    );
}

#[test]
fn test_unanswered_command_is_abandoned_after_budget() {
    let schemas = SchemaSet::from_yaml_str(SCHEMA).unwrap();
    let frame = encode_command(
        &schemas,
        &CommandRequest {
            device: DeviceKind::Light,
            index: 1,
            action: CommandAction::SetPower(PowerState::Off),
        },
    )
    .unwrap();
    let expected = predict_state(&schemas, &frame);

    let mut queue = CommandQueue::new(3, 20);
    let publisher = RecordingPublisher::new();
    queue.enqueue(frame, expected);

    // Reports for the wrong device keep arriving but never confirm; the
    // final tick sends the 20th copy and gives up.
    let noise = vec![light_on_report(9, 0)];
    for _ in 0..19 {
        assert_eq!(queue.tick(&publisher, &noise), TickOutcome::Requeued(frame));
    }
    assert_eq!(queue.tick(&publisher, &noise), TickOutcome::Abandoned(frame));
    assert_eq!(publisher.sent.lock().len(), 20);
    assert!(queue.is_empty());
}

#[test]
fn test_stale_reports_confirm_only_after_the_first_send() {
    // The confirmation window is a snapshot of recent traffic, so reports
    // that raced ahead of the first send still count, but the command is
    // always transmitted at least once before it can retire.
    let schemas = SchemaSet::from_yaml_str(SCHEMA).unwrap();
    let frame = encode_command(
        &schemas,
        &CommandRequest {
            device: DeviceKind::Light,
            index: 3,
            action: CommandAction::SetPower(PowerState::On),
        },
    )
    .unwrap();
    let expected = predict_state(&schemas, &frame);

    let mut queue = CommandQueue::new(3, 20);
    let publisher = RecordingPublisher::new();
    queue.enqueue(frame, expected);

    let reports = vec![
        light_on_report(3, 0),
        light_on_report(3, 1),
        light_on_report(3, 2),
    ];
    assert_eq!(queue.tick(&publisher, &reports), TickOutcome::Confirmed(frame));
    assert_eq!(publisher.sent.lock().len(), 1);
}
