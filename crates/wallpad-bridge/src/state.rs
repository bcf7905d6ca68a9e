//! Topic layout and the mapping between decoded frames and MQTT payloads.
//!
//! State flows out as one retained-nothing message per attribute:
//! `<prefix>/<Device><index>/<attr>/state`. Commands come back on
//! `<prefix>/<Device><index>/<attr>/command` and are translated into
//! [`CommandRequest`]s for the encoder.

use anyhow::{bail, Context};
use wallpad_protocol::{
    CommandAction, CommandRequest, DeviceEvent, DeviceKind, DeviceState, FanSpeed, PowerState,
};

use crate::config::ClimateSettings;

/// Builds and parses the bridge's own MQTT topics.
#[derive(Debug, Clone)]
pub struct TopicScheme {
    prefix: String,
}

impl TopicScheme {
    /// Scheme rooted at the configured bridge prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        TopicScheme {
            prefix: prefix.into(),
        }
    }

    /// State topic for one attribute of one device instance.
    pub fn state_topic(&self, device: DeviceKind, index: u8, attr: &str) -> String {
        format!("{}/{}{}/{}/state", self.prefix, device, index, attr)
    }

    /// Command topic for one attribute of one device instance.
    pub fn command_topic(&self, device: DeviceKind, index: u8, attr: &str) -> String {
        format!("{}/{}{}/{}/command", self.prefix, device, index, attr)
    }

    /// Wildcard subscription covering every command topic.
    pub fn command_wildcard(&self) -> String {
        format!("{}/+/+/command", self.prefix)
    }

    /// Parse a command topic into device kind, index, and attribute.
    ///
    /// Returns `None` for topics outside the scheme, including unknown
    /// device names.
    pub fn parse_command_topic(&self, topic: &str) -> Option<(DeviceKind, u8, String)> {
        let mut parts = topic.split('/');
        if parts.next()? != self.prefix {
            return None;
        }
        let instance = parts.next()?;
        let attr = parts.next()?;
        if parts.next()? != "command" || parts.next().is_some() {
            return None;
        }

        let split_at = instance.find(|c: char| c.is_ascii_digit())?;
        let (name, digits) = instance.split_at(split_at);
        let device = DeviceKind::from_schema_name(name)?;
        let index = digits.parse().ok()?;
        Some((device, index, attr.to_string()))
    }
}

/// Expand a decoded event into per-attribute state messages.
///
/// Temperatures are zero-padded to two digits, matching what wall panel
/// displays show and keeping payloads fixed-width.
pub fn state_messages(scheme: &TopicScheme, event: &DeviceEvent) -> Vec<(String, String)> {
    let topic = |attr: &str| scheme.state_topic(event.device, event.index, attr);
    match &event.state {
        DeviceState::Thermostat {
            mode,
            action,
            current_temp,
            target_temp,
        } => vec![
            (topic("power"), mode.as_str().to_string()),
            (topic("action"), action.as_str().to_string()),
            (topic("curTemp"), format!("{:02}", current_temp)),
            (topic("targetTemp"), format!("{:02}", target_temp)),
        ],
        DeviceState::Switch { power } => vec![(topic("power"), power.as_str().to_string())],
        DeviceState::Outlet { power, watts } => vec![
            (topic("power"), power.as_str().to_string()),
            (topic("watt"), format!("{:.1}", watts)),
        ],
        DeviceState::Fan { power, speed } => {
            let mut messages = vec![(topic("power"), power.as_str().to_string())];
            // Speed is meaningless while the fan is off.
            if power.is_on() {
                messages.push((topic("speed"), speed.as_str().to_string()));
            }
            messages
        }
        // The elevator panel reports continuously; only an active call is
        // worth telling the controller about.
        DeviceState::Elevator { power, floor } => {
            if power.is_on() {
                vec![
                    (topic("power"), power.as_str().to_string()),
                    (topic("floor"), floor.clone()),
                ]
            } else {
                Vec::new()
            }
        }
    }
}

/// Translate an inbound command payload into a device request.
///
/// `attr` and `payload` come straight off the command topic; climate
/// targets are range-checked against the configured limits.
pub fn build_command(
    climate: &ClimateSettings,
    device: DeviceKind,
    index: u8,
    attr: &str,
    payload: &str,
) -> anyhow::Result<CommandRequest> {
    let action = match (attr, payload) {
        // Climate power arrives as an operating mode.
        ("power", "ON" | "heat") => CommandAction::SetPower(PowerState::On),
        ("power", "OFF" | "off") => CommandAction::SetPower(PowerState::Off),
        ("power", other) => bail!("unsupported power payload '{other}'"),
        ("targetTemp", value) => {
            let temp: u8 = value
                .trim()
                .parse::<f64>()
                .map(|t| t as u8)
                .with_context(|| format!("target temperature '{value}' is not a number"))?;
            if temp < climate.min_temp || temp > climate.max_temp {
                bail!(
                    "target temperature {temp} outside {}..={}",
                    climate.min_temp,
                    climate.max_temp
                );
            }
            CommandAction::SetTemperature(temp)
        }
        ("speed", value) => match FanSpeed::from_str(value) {
            Some(speed) => CommandAction::SetFanSpeed(speed),
            None => bail!("unsupported fan speed '{value}'"),
        },
        (other, _) => bail!("unsupported command attribute '{other}'"),
    };
    Ok(CommandRequest {
        device,
        index,
        action,
    })
}
