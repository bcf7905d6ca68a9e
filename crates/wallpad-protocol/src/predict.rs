//! Expected-response prediction for sent commands.
//!
//! The bus has no acknowledgements; the only delivery signal is the device
//! starting to report the commanded state. Before a command is queued, the
//! predictor derives from the schema which state frame would prove the
//! command took effect. The dispatcher then counts matching inbound frames
//! against that prediction.

use tracing::trace;

use crate::device::DeviceKind;
use crate::frame::{hex_byte, Frame};
use crate::schema::{PacketSchema, SchemaSet};

/// A predicted state-frame pattern proving a command took effect.
///
/// Each constraint names a byte position and the set of hex byte values
/// acceptable there. A constraint with an empty value set is recorded but
/// never rejects a frame; it marks a position the schema could not map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedState {
    constraints: Vec<(usize, Vec<String>)>,
}

impl ExpectedState {
    /// Whether `frame` satisfies every constraint.
    pub fn matches(&self, frame: &Frame) -> bool {
        self.constraints.iter().all(|(pos, values)| {
            if values.is_empty() {
                return true;
            }
            frame
                .byte(*pos)
                .is_some_and(|b| values.iter().any(|v| *v == hex_byte(b)))
        })
    }

    /// Whether a frame in hex text form satisfies every constraint.
    pub fn matches_hex(&self, hex_frame: &str) -> bool {
        Frame::from_hex(hex_frame).is_ok_and(|f| self.matches(&f))
    }

    /// The byte-position constraints, for logging and tests.
    pub fn constraints(&self) -> &[(usize, Vec<String>)] {
        &self.constraints
    }
}

/// Derive the expected state frame for a command, if the schema allows.
///
/// Returns `None` when the command's header matches no device, the device
/// kind is unsupported, or the device has no state packet; the dispatcher
/// then sends the command once without confirmation.
pub fn predict_state(schemas: &SchemaSet, command: &Frame) -> Option<ExpectedState> {
    let header = command.as_bytes()[0];
    let Some(device) = schemas.device_for_command_header(header) else {
        trace!(command = %command, "no command schema for header, no prediction");
        return None;
    };
    let kind = device.kind?;
    let cmd = device.command.as_ref()?;
    let state = device.state.as_ref()?;

    let device_id = command.byte(cmd.position_or("deviceId", 1))?;

    // Always required: the state header and the echoed device id.
    let mut constraints = vec![
        (0, vec![state.header_hex.clone()]),
        (
            state.position_or("deviceId", 2),
            vec![hex_byte(device_id)],
        ),
    ];

    match kind {
        DeviceKind::Thermostat => {
            let type_pos = cmd.position_or("commandType", 2);
            let value_pos = cmd.position_or("value", 3);
            let type_byte = command.byte(type_pos)?;
            let value_byte = command.byte(value_pos)?;
            if symbol_matches(cmd, type_pos, "power", type_byte) {
                let power_pos = state.position_or("power", 1);
                let expected = if symbol_matches(cmd, value_pos, "on", value_byte) {
                    // A freshly powered-on thermostat may report either
                    // idle or heating on its first frame.
                    symbols(state, power_pos, &["idle", "heating"])
                } else {
                    symbols(state, power_pos, &["off"])
                };
                constraints.push((power_pos, expected));
            } else if symbol_matches(cmd, type_pos, "change", type_byte) {
                let target_pos = state.position_or("targetTemp", 4);
                constraints.push((target_pos, vec![hex_byte(value_byte)]));
            }
        }
        DeviceKind::Light | DeviceKind::LightBreaker => {
            let power_pos = cmd.position_or("power", 2);
            let power_byte = command.byte(power_pos)?;
            let symbol = if symbol_matches(cmd, power_pos, "on", power_byte) {
                "on"
            } else {
                "off"
            };
            let state_pos = state.position_or("power", 1);
            constraints.push((state_pos, symbols(state, state_pos, &[symbol])));
        }
        DeviceKind::Fan => {
            let type_pos = cmd.position_or("commandType", 2);
            let value_pos = cmd.position_or("value", 3);
            let type_byte = command.byte(type_pos)?;
            let value_byte = command.byte(value_pos)?;
            if symbol_matches(cmd, type_pos, "power", type_byte) {
                let symbol = if symbol_matches(cmd, value_pos, "on", value_byte) {
                    "on"
                } else {
                    "off"
                };
                let state_pos = state.position_or("power", 1);
                constraints.push((state_pos, symbols(state, state_pos, &[symbol])));
            } else if symbol_matches(cmd, type_pos, "setSpeed", type_byte) {
                let speed_pos = state.position_or("speed", 3);
                constraints.push((speed_pos, vec![hex_byte(value_byte)]));
            }
        }
        // Outlet and elevator replies carry nothing predictable beyond the
        // header and device id.
        DeviceKind::Outlet | DeviceKind::Elevator => {}
    }

    Some(ExpectedState { constraints })
}

fn symbol_matches(schema: &PacketSchema, position: usize, symbol: &str, byte: u8) -> bool {
    schema
        .symbol_hex(position, symbol)
        .is_some_and(|hex| hex == hex_byte(byte))
}

fn symbols(schema: &PacketSchema, position: usize, names: &[&str]) -> Vec<String> {
    names
        .iter()
        .filter_map(|name| schema.symbol_hex(position, name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_command;
    use crate::device::FanSpeed;
    use crate::schema::SchemaSet;
    use crate::types::{CommandAction, CommandRequest, PowerState};

    fn test_schemas() -> SchemaSet {
        SchemaSet::from_yaml_str(
            r#"
Light:
  type: light
  command:
    header: "31"
    structure:
      "1": { name: deviceId }
      "2": { name: power, values: { on: "01", off: "00" } }
  state:
    header: "B0"
    structure:
      "1": { name: power, values: { on: "01", off: "00" } }
      "2": { name: deviceId }
Thermo:
  type: climate
  command:
    header: "04"
    structure:
      "1": { name: deviceId }
      "2": { name: commandType, values: { power: "04", change: "03" } }
      "3": { name: value, values: { on: "81", off: "00" } }
  state:
    header: "82"
    structure:
      "1": { name: power, values: { off: "80", idle: "81", heating: "83" } }
      "2": { name: deviceId }
      "3": { name: currentTemp }
      "4": { name: targetTemp }
Fan:
  type: fan
  command:
    header: "78"
    structure:
      "1": { name: deviceId }
      "2": { name: commandType, values: { power: "01", setSpeed: "02" } }
      "3": { name: value, values: { on: "04", off: "00", low: "01", medium: "02", high: "03" } }
  state:
    header: "F6"
    structure:
      "1": { name: power, values: { on: "04", off: "00" } }
      "2": { name: deviceId }
      "3": { name: speed, values: { "01": low, "02": medium, "03": high } }
Outlet:
  type: switch
  command:
    header: "7A"
    structure:
      "1": { name: deviceId }
      "2": { name: power, values: { on: "01", off: "00" } }
  state:
    header: "F9"
    structure:
      "1": { name: power, values: { on: "01", off: "00" } }
      "2": { name: deviceId }
      "5": { name: watt }
"#,
        )
        .unwrap()
    }

    fn command(schemas: &SchemaSet, device: DeviceKind, index: u8, action: CommandAction) -> Frame {
        encode_command(
            schemas,
            &CommandRequest {
                device,
                index,
                action,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_light_on_prediction() {
        let schemas = test_schemas();
        let cmd = command(
            &schemas,
            DeviceKind::Light,
            2,
            CommandAction::SetPower(PowerState::On),
        );
        let expected = predict_state(&schemas, &cmd).unwrap();

        assert!(expected.matches(&Frame::with_checksum([0xB0, 0x01, 0x02, 0, 0, 0, 0])));
        // Wrong power byte.
        assert!(!expected.matches(&Frame::with_checksum([0xB0, 0x00, 0x02, 0, 0, 0, 0])));
        // Wrong device id.
        assert!(!expected.matches(&Frame::with_checksum([0xB0, 0x01, 0x03, 0, 0, 0, 0])));
        // Wrong header.
        assert!(!expected.matches(&Frame::with_checksum([0x82, 0x01, 0x02, 0, 0, 0, 0])));
    }

    #[test]
    fn test_thermostat_power_on_accepts_idle_or_heating() {
        let schemas = test_schemas();
        let cmd = command(
            &schemas,
            DeviceKind::Thermostat,
            1,
            CommandAction::SetPower(PowerState::On),
        );
        let expected = predict_state(&schemas, &cmd).unwrap();

        assert!(expected.matches(&Frame::with_checksum([0x82, 0x81, 0x01, 0x22, 0x24, 0, 0])));
        assert!(expected.matches(&Frame::with_checksum([0x82, 0x83, 0x01, 0x22, 0x24, 0, 0])));
        assert!(!expected.matches(&Frame::with_checksum([0x82, 0x80, 0x01, 0x22, 0x24, 0, 0])));
    }

    #[test]
    fn test_thermostat_power_off_requires_off() {
        let schemas = test_schemas();
        let cmd = command(
            &schemas,
            DeviceKind::Thermostat,
            1,
            CommandAction::SetPower(PowerState::Off),
        );
        let expected = predict_state(&schemas, &cmd).unwrap();

        assert!(expected.matches(&Frame::with_checksum([0x82, 0x80, 0x01, 0x22, 0x24, 0, 0])));
        assert!(!expected.matches(&Frame::with_checksum([0x82, 0x81, 0x01, 0x22, 0x24, 0, 0])));
    }

    #[test]
    fn test_thermostat_change_requires_literal_target() {
        let schemas = test_schemas();
        let cmd = command(
            &schemas,
            DeviceKind::Thermostat,
            1,
            CommandAction::SetTemperature(24),
        );
        let expected = predict_state(&schemas, &cmd).unwrap();

        assert!(expected.matches(&Frame::with_checksum([0x82, 0x81, 0x01, 0x22, 0x24, 0, 0])));
        assert!(!expected.matches(&Frame::with_checksum([0x82, 0x81, 0x01, 0x22, 0x25, 0, 0])));
    }

    #[test]
    fn test_fan_speed_prediction_uses_commanded_byte() {
        let schemas = test_schemas();
        let cmd = command(
            &schemas,
            DeviceKind::Fan,
            1,
            CommandAction::SetFanSpeed(FanSpeed::High),
        );
        let expected = predict_state(&schemas, &cmd).unwrap();

        assert!(expected.matches(&Frame::with_checksum([0xF6, 0x04, 0x01, 0x03, 0, 0, 0])));
        assert!(!expected.matches(&Frame::with_checksum([0xF6, 0x04, 0x01, 0x02, 0, 0, 0])));
    }

    #[test]
    fn test_outlet_prediction_is_header_and_id_only() {
        let schemas = test_schemas();
        let cmd = command(
            &schemas,
            DeviceKind::Outlet,
            3,
            CommandAction::SetPower(PowerState::On),
        );
        let expected = predict_state(&schemas, &cmd).unwrap();
        assert_eq!(expected.constraints().len(), 2);

        // Any power byte confirms, only header and id are checked.
        assert!(expected.matches(&Frame::with_checksum([0xF9, 0x00, 0x03, 0, 0, 0x50, 0])));
        assert!(expected.matches(&Frame::with_checksum([0xF9, 0x01, 0x03, 0, 0, 0x50, 0])));
        assert!(!expected.matches(&Frame::with_checksum([0xF9, 0x01, 0x04, 0, 0, 0x50, 0])));
    }

    #[test]
    fn test_unknown_command_header_yields_no_prediction() {
        let schemas = test_schemas();
        let cmd = Frame::with_checksum([0xEE, 0x01, 0, 0, 0, 0, 0]);
        assert!(predict_state(&schemas, &cmd).is_none());
    }

    #[test]
    fn test_matches_hex_form() {
        let schemas = test_schemas();
        let cmd = command(
            &schemas,
            DeviceKind::Light,
            1,
            CommandAction::SetPower(PowerState::Off),
        );
        let expected = predict_state(&schemas, &cmd).unwrap();
        let reply = Frame::with_checksum([0xB0, 0x00, 0x01, 0, 0, 0, 0]);
        assert!(expected.matches_hex(&reply.to_hex()));
        assert!(!expected.matches_hex("not hex at all!!"));
    }
}
