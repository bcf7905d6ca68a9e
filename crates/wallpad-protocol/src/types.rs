//! Semantic device events and command requests.
//!
//! These are the two value types crossing the protocol boundary: a decoded
//! state report becomes a [`DeviceEvent`] published upward, and a
//! control-plane intent arrives as a [`CommandRequest`] to be encoded.

use crate::device::{DeviceKind, FanSpeed};

/// On/off power state as reported upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    /// Control-plane payload form (`ON` / `OFF`).
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerState::On => "ON",
            PowerState::Off => "OFF",
        }
    }

    /// Whether the state is on.
    pub fn is_on(&self) -> bool {
        matches!(self, PowerState::On)
    }
}

/// Thermostat operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermostatMode {
    Off,
    Heat,
}

impl ThermostatMode {
    /// Control-plane payload form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThermostatMode::Off => "off",
            ThermostatMode::Heat => "heat",
        }
    }
}

/// What the thermostat is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermostatAction {
    Idle,
    Heating,
}

impl ThermostatAction {
    /// Control-plane payload form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThermostatAction::Idle => "idle",
            ThermostatAction::Heating => "heating",
        }
    }
}

/// Device-specific fields decoded from one state frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceState {
    /// Thermostat mode, action, and temperatures in whole degrees C.
    Thermostat {
        mode: ThermostatMode,
        action: ThermostatAction,
        current_temp: u8,
        target_temp: u8,
    },
    /// Plain on/off switch (light, breaker).
    Switch { power: PowerState },
    /// Switched outlet; wattage has one decimal place.
    Outlet { power: PowerState, watts: f64 },
    /// Fan with a symbolic speed step.
    Fan { power: PowerState, speed: FanSpeed },
    /// Elevator car state with a symbolic floor label.
    Elevator { power: PowerState, floor: String },
}

/// One decoded state report: which device said what.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEvent {
    /// Device kind.
    pub device: DeviceKind,
    /// Device index on the bus (the `deviceId` byte).
    pub index: u8,
    /// Decoded fields.
    pub state: DeviceState,
}

/// A device action requested by the control plane.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    /// Device kind to address.
    pub device: DeviceKind,
    /// Device index on the bus.
    pub index: u8,
    /// The action to perform.
    pub action: CommandAction,
}

/// Actions the encoder knows how to express as command frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandAction {
    /// Turn the device on or off.
    SetPower(PowerState),
    /// Change a thermostat's target temperature (whole degrees C).
    SetTemperature(u8),
    /// Change a fan's speed step.
    SetFanSpeed(FanSpeed),
}
