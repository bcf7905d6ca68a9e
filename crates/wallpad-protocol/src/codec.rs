//! Frame codec: semantic commands → frames, state frames → events.
//!
//! Both directions are driven by the compiled [`SchemaSet`]; the only
//! hard-coded knowledge is the per-kind field semantics (which fields a
//! thermostat has, how its temperatures are encoded, ...).

use tracing::trace;

use crate::device::{DeviceKind, FanSpeed};
use crate::error::ProtocolError;
use crate::frame::{hex_byte, Frame, PAYLOAD_LEN};
use crate::schema::{PacketSchema, SchemaSet};
use crate::types::{
    CommandAction, CommandRequest, DeviceEvent, DeviceState, PowerState, ThermostatAction,
    ThermostatMode,
};

/// Default byte position of the `deviceId` field in state frames.
pub const DEFAULT_STATE_DEVICE_ID_POS: usize = 2;

/// Default byte position of the `deviceId` field in command frames.
pub const DEFAULT_COMMAND_DEVICE_ID_POS: usize = 1;

/// Read the two hex digits of a byte as a decimal number.
///
/// The thermostat dialect stores temperatures this way: byte `0x24` means
/// 24 degrees, not 36. Fails when either nibble is not a decimal digit.
pub fn decimal_from_hex_digits(byte: u8) -> Result<u8, ProtocolError> {
    let hi = byte >> 4;
    let lo = byte & 0x0F;
    if hi > 9 || lo > 9 {
        return Err(ProtocolError::NonDecimalByte(byte));
    }
    Ok(hi * 10 + lo)
}

/// Encode a decimal number into a byte whose hex digits spell it.
///
/// Inverse of [`decimal_from_hex_digits`]; fails above 99.
pub fn decimal_to_hex_digits(value: u8) -> Result<u8, ProtocolError> {
    if value > 99 {
        return Err(ProtocolError::NonDecimalByte(value));
    }
    Ok(((value / 10) << 4) | (value % 10))
}

fn frame_byte(
    frame: &Frame,
    schema: &PacketSchema,
    device: &str,
    field: &str,
    default_pos: usize,
) -> Result<u8, ProtocolError> {
    let pos = schema.position_or(field, default_pos);
    frame.byte(pos).ok_or_else(|| ProtocolError::MissingField {
        device: device.to_string(),
        kind: "state",
        field: field.to_string(),
    })
}

fn matches_symbol(schema: &PacketSchema, position: usize, symbol: &str, byte: u8) -> bool {
    schema
        .symbol_hex(position, symbol)
        .is_some_and(|hex| hex == hex_byte(byte))
}

/// Decode a checksum-valid state frame into a semantic event.
///
/// Returns `Ok(None)` when the header matches no known device or the
/// device name is not in the codec's closed kind set; both cases are
/// normal bus chatter and logged at trace level only.
pub fn decode_state_frame(
    schemas: &SchemaSet,
    frame: &Frame,
) -> Result<Option<DeviceEvent>, ProtocolError> {
    let header = frame.as_bytes()[0];
    let Some(device) = schemas.device_for_state_header(header) else {
        trace!(frame = %frame, "no state schema for header, skipping");
        return Ok(None);
    };
    let Some(kind) = device.kind else {
        trace!(device = %device.name, "device kind not supported by codec, skipping");
        return Ok(None);
    };
    let state = device.state_schema()?;
    let index = frame_byte(frame, state, &device.name, "deviceId", DEFAULT_STATE_DEVICE_ID_POS)?;

    let decoded = match kind {
        DeviceKind::Thermostat => {
            let power_pos = state.position_or("power", 1);
            let power = frame_byte(frame, state, &device.name, "power", 1)?;
            let current_temp =
                decimal_from_hex_digits(frame_byte(frame, state, &device.name, "currentTemp", 3)?)?;
            let target_temp =
                decimal_from_hex_digits(frame_byte(frame, state, &device.name, "targetTemp", 4)?)?;
            let mode = if matches_symbol(state, power_pos, "off", power) {
                ThermostatMode::Off
            } else {
                ThermostatMode::Heat
            };
            let action = if matches_symbol(state, power_pos, "heating", power) {
                ThermostatAction::Heating
            } else {
                ThermostatAction::Idle
            };
            DeviceState::Thermostat {
                mode,
                action,
                current_temp,
                target_temp,
            }
        }
        DeviceKind::Light | DeviceKind::LightBreaker => {
            let power_pos = state.position_or("power", 1);
            let power = frame_byte(frame, state, &device.name, "power", 1)?;
            let power = if matches_symbol(state, power_pos, "on", power) {
                PowerState::On
            } else {
                PowerState::Off
            };
            DeviceState::Switch { power }
        }
        DeviceKind::Outlet => {
            let power_pos = state.position_or("power", 1);
            let power = frame_byte(frame, state, &device.name, "power", 1)?;
            let watt = frame_byte(frame, state, &device.name, "watt", 5)?;
            let power = if matches_symbol(state, power_pos, "on", power) {
                PowerState::On
            } else {
                PowerState::Off
            };
            DeviceState::Outlet {
                power,
                watts: f64::from(watt) / 10.0,
            }
        }
        DeviceKind::Fan => {
            let power_pos = state.position_or("power", 1);
            let power = frame_byte(frame, state, &device.name, "power", 1)?;
            let speed_pos = state.position_or("speed", 3);
            let speed_byte = frame_byte(frame, state, &device.name, "speed", 3)?;
            // Fan is on unless the power byte says off.
            let power = if matches_symbol(state, power_pos, "off", power) {
                PowerState::Off
            } else {
                PowerState::On
            };
            let speed = state
                .label_for_byte(speed_pos, speed_byte)
                .and_then(FanSpeed::from_str)
                .unwrap_or(FanSpeed::Low);
            DeviceState::Fan { power, speed }
        }
        DeviceKind::Elevator => {
            let power_pos = state.position_or("power", 1);
            let power = frame_byte(frame, state, &device.name, "power", 1)?;
            let floor_pos = state.position_or("floor", 3);
            let floor_byte = frame_byte(frame, state, &device.name, "floor", 3)?;
            let power = if matches_symbol(state, power_pos, "on", power) {
                PowerState::On
            } else {
                PowerState::Off
            };
            let floor = state
                .label_for_byte(floor_pos, floor_byte)
                .unwrap_or("B")
                .to_string();
            DeviceState::Elevator { power, floor }
        }
    };

    Ok(Some(DeviceEvent {
        device: kind,
        index,
        state: decoded,
    }))
}

/// Encode a control-plane request into a checksum-normalized command frame.
///
/// Fails when the device type, a referenced field, or a symbolic value is
/// absent from the schema, or when the action does not apply to the
/// device kind.
pub fn encode_command(
    schemas: &SchemaSet,
    request: &CommandRequest,
) -> Result<Frame, ProtocolError> {
    let device = schemas
        .device(request.device.schema_name())
        .ok_or_else(|| ProtocolError::UnknownDevice(request.device.schema_name().to_string()))?;
    let command = device.command_schema()?;

    let mut payload = [0u8; PAYLOAD_LEN];
    payload[0] = command.header;
    let id_pos = command.position_or("deviceId", DEFAULT_COMMAND_DEVICE_ID_POS);
    if id_pos >= PAYLOAD_LEN {
        return Err(ProtocolError::MissingField {
            device: device.name.clone(),
            kind: "command",
            field: "deviceId".to_string(),
        });
    }
    payload[id_pos] = request.index;

    match (request.device, request.action) {
        (DeviceKind::Light | DeviceKind::LightBreaker | DeviceKind::Outlet, action) => {
            let CommandAction::SetPower(power) = action else {
                return Err(unsupported(request));
            };
            let power_pos = command.position_or("power", 2);
            let symbol = if power.is_on() { "on" } else { "off" };
            set_byte(&mut payload, power_pos, command.symbol_byte(power_pos, symbol)?)?;
        }
        (DeviceKind::Thermostat, action) => {
            let type_pos = command.position_or("commandType", 2);
            let value_pos = command.position_or("value", 3);
            match action {
                CommandAction::SetPower(power) => {
                    set_byte(&mut payload, type_pos, command.symbol_byte(type_pos, "power")?)?;
                    let symbol = if power.is_on() { "on" } else { "off" };
                    set_byte(&mut payload, value_pos, command.symbol_byte(value_pos, symbol)?)?;
                }
                CommandAction::SetTemperature(temp) => {
                    set_byte(&mut payload, type_pos, command.symbol_byte(type_pos, "change")?)?;
                    set_byte(&mut payload, value_pos, decimal_to_hex_digits(temp)?)?;
                }
                CommandAction::SetFanSpeed(_) => return Err(unsupported(request)),
            }
        }
        (DeviceKind::Fan, action) => {
            let type_pos = command.position_or("commandType", 2);
            let value_pos = command.position_or("value", 3);
            match action {
                CommandAction::SetPower(power) => {
                    set_byte(&mut payload, type_pos, command.symbol_byte(type_pos, "power")?)?;
                    let symbol = if power.is_on() { "on" } else { "off" };
                    set_byte(&mut payload, value_pos, command.symbol_byte(value_pos, symbol)?)?;
                }
                CommandAction::SetFanSpeed(speed) => {
                    set_byte(
                        &mut payload,
                        type_pos,
                        command.symbol_byte(type_pos, "setSpeed")?,
                    )?;
                    set_byte(
                        &mut payload,
                        value_pos,
                        command.symbol_byte(value_pos, speed.as_str())?,
                    )?;
                }
                CommandAction::SetTemperature(_) => return Err(unsupported(request)),
            }
        }
        // The elevator call panel takes a bare header + deviceId frame; the
        // action carries no further fields.
        (DeviceKind::Elevator, CommandAction::SetPower(_)) => {}
        (DeviceKind::Elevator, _) => return Err(unsupported(request)),
    }

    Ok(Frame::with_checksum(payload))
}

fn unsupported(request: &CommandRequest) -> ProtocolError {
    ProtocolError::UnknownCommandType(format!(
        "{}: {:?}",
        request.device.schema_name(),
        request.action
    ))
}

fn set_byte(payload: &mut [u8; PAYLOAD_LEN], pos: usize, value: u8) -> Result<(), ProtocolError> {
    if pos >= PAYLOAD_LEN {
        return Err(ProtocolError::Schema(format!(
            "field position {pos} outside the 7-byte command payload"
        )));
    }
    payload[pos] = value;
    Ok(())
}
