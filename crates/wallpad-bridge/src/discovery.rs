//! Controller discovery announcements.
//!
//! On startup the bridge publishes one retained config document per
//! device instance under the controller's discovery prefix, so entities
//! appear without manual configuration. The inventory comes from the
//! bridge config; the bus itself cannot be enumerated.

use std::collections::BTreeMap;

use serde_json::json;
use tracing::warn;
use wallpad_protocol::DeviceKind;

use crate::config::ClimateSettings;
use crate::state::TopicScheme;

const NODE_ID: &str = "wallpad";

/// Build the retained discovery messages for the configured inventory.
///
/// Unknown device names in the inventory are skipped with a warning.
pub fn discovery_messages(
    scheme: &TopicScheme,
    climate: &ClimateSettings,
    discovery_prefix: &str,
    inventory: &BTreeMap<String, u8>,
) -> Vec<(String, String)> {
    let mut messages = Vec::new();
    for (name, count) in inventory {
        let Some(kind) = DeviceKind::from_schema_name(name) else {
            warn!(device = %name, "unknown device name in inventory, skipping discovery");
            continue;
        };
        for index in 1..=*count {
            device_messages(scheme, climate, discovery_prefix, kind, index, &mut messages);
        }
    }
    messages
}

fn config_topic(discovery_prefix: &str, component: &str, object: &str) -> String {
    format!("{discovery_prefix}/{component}/{NODE_ID}/{object}/config")
}

fn device_block(kind: DeviceKind, index: u8) -> serde_json::Value {
    json!({
        "identifiers": [format!("{NODE_ID}_{kind}{index}")],
        "name": format!("{kind} {index}"),
        "manufacturer": "Commax",
    })
}

fn device_messages(
    scheme: &TopicScheme,
    climate: &ClimateSettings,
    discovery_prefix: &str,
    kind: DeviceKind,
    index: u8,
    out: &mut Vec<(String, String)>,
) {
    let object = format!("{kind}{index}");
    let unique = format!("{NODE_ID}_{object}");
    match kind {
        DeviceKind::Light | DeviceKind::LightBreaker => {
            let payload = json!({
                "name": object,
                "unique_id": unique,
                "state_topic": scheme.state_topic(kind, index, "power"),
                "command_topic": scheme.command_topic(kind, index, "power"),
                "payload_on": "ON",
                "payload_off": "OFF",
                "device": device_block(kind, index),
            });
            out.push((config_topic(discovery_prefix, "light", &object), payload.to_string()));
        }
        DeviceKind::Thermostat => {
            let payload = json!({
                "name": object,
                "unique_id": unique,
                "modes": ["off", "heat"],
                "mode_state_topic": scheme.state_topic(kind, index, "power"),
                "mode_command_topic": scheme.command_topic(kind, index, "power"),
                "action_topic": scheme.state_topic(kind, index, "action"),
                "current_temperature_topic": scheme.state_topic(kind, index, "curTemp"),
                "temperature_state_topic": scheme.state_topic(kind, index, "targetTemp"),
                "temperature_command_topic": scheme.command_topic(kind, index, "targetTemp"),
                "min_temp": climate.min_temp,
                "max_temp": climate.max_temp,
                "temp_step": 1,
                "device": device_block(kind, index),
            });
            out.push((config_topic(discovery_prefix, "climate", &object), payload.to_string()));
        }
        DeviceKind::Outlet => {
            let payload = json!({
                "name": object,
                "unique_id": unique,
                "state_topic": scheme.state_topic(kind, index, "power"),
                "command_topic": scheme.command_topic(kind, index, "power"),
                "payload_on": "ON",
                "payload_off": "OFF",
                "device": device_block(kind, index),
            });
            out.push((config_topic(discovery_prefix, "switch", &object), payload.to_string()));

            let watt = json!({
                "name": format!("{object} power"),
                "unique_id": format!("{unique}_watt"),
                "state_topic": scheme.state_topic(kind, index, "watt"),
                "unit_of_measurement": "W",
                "device_class": "power",
                "device": device_block(kind, index),
            });
            out.push((
                config_topic(discovery_prefix, "sensor", &format!("{object}_watt")),
                watt.to_string(),
            ));
        }
        DeviceKind::Fan => {
            let payload = json!({
                "name": object,
                "unique_id": unique,
                "state_topic": scheme.state_topic(kind, index, "power"),
                "command_topic": scheme.command_topic(kind, index, "power"),
                "payload_on": "ON",
                "payload_off": "OFF",
                "preset_mode_state_topic": scheme.state_topic(kind, index, "speed"),
                "preset_mode_command_topic": scheme.command_topic(kind, index, "speed"),
                "preset_modes": ["low", "medium", "high"],
                "device": device_block(kind, index),
            });
            out.push((config_topic(discovery_prefix, "fan", &object), payload.to_string()));
        }
        DeviceKind::Elevator => {
            let call = json!({
                "name": object,
                "unique_id": unique,
                "command_topic": scheme.command_topic(kind, index, "power"),
                "payload_press": "ON",
                "device": device_block(kind, index),
            });
            out.push((config_topic(discovery_prefix, "button", &object), call.to_string()));

            let floor = json!({
                "name": format!("{object} floor"),
                "unique_id": format!("{unique}_floor"),
                "state_topic": scheme.state_topic(kind, index, "floor"),
                "device": device_block(kind, index),
            });
            out.push((
                config_topic(discovery_prefix, "sensor", &format!("{object}_floor")),
                floor.to_string(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(inventory: &[(&str, u8)]) -> Vec<(String, String)> {
        let inventory: BTreeMap<String, u8> = inventory
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        discovery_messages(
            &TopicScheme::new("wallpad"),
            &ClimateSettings::default(),
            "homeassistant",
            &inventory,
        )
    }

    #[test]
    fn test_one_config_per_light_instance() {
        let msgs = messages(&[("Light", 3)]);
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].0, "homeassistant/light/wallpad/Light1/config");
        let payload: serde_json::Value = serde_json::from_str(&msgs[0].1).unwrap();
        assert_eq!(payload["command_topic"], "wallpad/Light1/power/command");
        assert_eq!(payload["payload_on"], "ON");
    }

    #[test]
    fn test_climate_config_carries_temperature_limits() {
        let msgs = messages(&[("Thermo", 1)]);
        let payload: serde_json::Value = serde_json::from_str(&msgs[0].1).unwrap();
        assert_eq!(payload["min_temp"], 5);
        assert_eq!(payload["max_temp"], 40);
        assert_eq!(
            payload["temperature_command_topic"],
            "wallpad/Thermo1/targetTemp/command"
        );
    }

    #[test]
    fn test_outlet_gets_switch_and_watt_sensor() {
        let msgs = messages(&[("Outlet", 1)]);
        assert_eq!(msgs.len(), 2);
        assert!(msgs.iter().any(|(t, _)| t.contains("/switch/")));
        assert!(msgs.iter().any(|(t, _)| t.contains("/sensor/")));
    }

    #[test]
    fn test_unknown_inventory_name_is_skipped() {
        let msgs = messages(&[("Curtain", 2)]);
        assert!(msgs.is_empty());
    }
}
