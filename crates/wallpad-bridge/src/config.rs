//! Bridge configuration.
//!
//! Loaded from a JSON document at startup; every field has a default so a
//! minimal deployment only names the MQTT broker. Durations are expressed
//! in the unit their field name carries.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Top-level bridge configuration document.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// MQTT broker connection.
    #[serde(default)]
    pub mqtt: MqttSettings,
    /// Topic prefixes.
    #[serde(default)]
    pub topics: TopicSettings,
    /// Command dispatch tuning.
    #[serde(default)]
    pub dispatch: DispatchSettings,
    /// Gateway health watchdog.
    #[serde(default)]
    pub watchdog: WatchdogSettings,
    /// Serial gateway admin interface, used for recovery reboots.
    #[serde(default)]
    pub gateway: GatewaySettings,
    /// Thermostat target temperature limits in degrees C.
    #[serde(default)]
    pub climate: ClimateSettings,
    /// Device inventory for discovery announcements: schema device name
    /// to highest device index present on the bus.
    #[serde(default)]
    pub devices: BTreeMap<String, u8>,
}

impl BridgeConfig {
    /// Load and parse a configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("cannot parse config file {}", path.display()))
    }
}

/// MQTT broker connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MqttSettings {
    /// Broker hostname or IP.
    #[serde(default = "default_broker_host")]
    pub broker_host: String,
    /// Broker port.
    #[serde(default = "default_broker_port")]
    pub broker_port: u16,
    /// Optional username.
    #[serde(default)]
    pub username: Option<String>,
    /// Optional password.
    #[serde(default)]
    pub password: Option<String>,
    /// MQTT client identifier.
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

impl Default for MqttSettings {
    fn default() -> Self {
        MqttSettings {
            broker_host: default_broker_host(),
            broker_port: default_broker_port(),
            username: None,
            password: None,
            client_id: default_client_id(),
        }
    }
}

/// Topic prefixes for the three MQTT surfaces the bridge touches.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopicSettings {
    /// Prefix of the serial gateway's MQTT topics (`<prefix>/recv`,
    /// `<prefix>/send`).
    #[serde(default = "default_gateway_prefix")]
    pub gateway_prefix: String,
    /// Prefix of the bridge's own state and command topics.
    #[serde(default = "default_bridge_prefix")]
    pub bridge_prefix: String,
    /// Prefix of the controller's discovery tree.
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
}

impl Default for TopicSettings {
    fn default() -> Self {
        TopicSettings {
            gateway_prefix: default_gateway_prefix(),
            bridge_prefix: default_bridge_prefix(),
            discovery_prefix: default_discovery_prefix(),
        }
    }
}

/// Command dispatch and confirmation tuning.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchSettings {
    /// Matching state frames required to consider a command delivered.
    #[serde(default = "default_confirm_threshold")]
    pub confirm_threshold: u32,
    /// Sends after which an unconfirmed command is abandoned.
    #[serde(default = "default_max_sends")]
    pub max_sends: u32,
    /// Dispatch tick period in milliseconds.
    #[serde(default = "default_queue_interval_ms")]
    pub queue_interval_ms: u64,
    /// Inbound silence required before a send, in milliseconds. Keeps
    /// commands out of the middle of device report bursts.
    #[serde(default = "default_quiet_interval_ms")]
    pub quiet_interval_ms: u64,
}

impl DispatchSettings {
    /// Dispatch tick period.
    pub fn queue_interval(&self) -> Duration {
        Duration::from_millis(self.queue_interval_ms)
    }

    /// Required pre-send bus silence.
    pub fn quiet_interval(&self) -> Duration {
        Duration::from_millis(self.quiet_interval_ms)
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        DispatchSettings {
            confirm_threshold: default_confirm_threshold(),
            max_sends: default_max_sends(),
            queue_interval_ms: default_queue_interval_ms(),
            quiet_interval_ms: default_quiet_interval_ms(),
        }
    }
}

/// Gateway health watchdog settings.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchdogSettings {
    /// Valid-frame silence after which the gateway is considered wedged,
    /// in seconds.
    #[serde(default = "default_silence_timeout_secs")]
    pub silence_timeout_secs: u64,
    /// Whether to reboot the gateway on silence. When false the watchdog
    /// only logs.
    #[serde(default = "default_auto_reboot")]
    pub auto_reboot: bool,
    /// Pause after a recovery attempt before dispatching resumes, in
    /// seconds.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl WatchdogSettings {
    /// Silence threshold.
    pub fn silence_timeout(&self) -> Duration {
        Duration::from_secs(self.silence_timeout_secs)
    }

    /// Post-recovery cooldown.
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        WatchdogSettings {
            silence_timeout_secs: default_silence_timeout_secs(),
            auto_reboot: default_auto_reboot(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

/// Serial gateway admin (telnet) interface.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySettings {
    /// Gateway hostname or IP.
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Admin interface port.
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Admin username.
    #[serde(default = "default_gateway_user")]
    pub username: String,
    /// Admin password.
    #[serde(default = "default_gateway_user")]
    pub password: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        GatewaySettings {
            host: default_gateway_host(),
            port: default_gateway_port(),
            username: default_gateway_user(),
            password: default_gateway_user(),
        }
    }
}

/// Thermostat target temperature limits.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClimateSettings {
    /// Lowest accepted target, degrees C.
    #[serde(default = "default_min_temp")]
    pub min_temp: u8,
    /// Highest accepted target, degrees C.
    #[serde(default = "default_max_temp")]
    pub max_temp: u8,
}

impl Default for ClimateSettings {
    fn default() -> Self {
        ClimateSettings {
            min_temp: default_min_temp(),
            max_temp: default_max_temp(),
        }
    }
}

fn default_broker_host() -> String {
    "localhost".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "wallpad-bridge".to_string()
}

fn default_gateway_prefix() -> String {
    "ew11".to_string()
}

fn default_bridge_prefix() -> String {
    "wallpad".to_string()
}

fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}

fn default_confirm_threshold() -> u32 {
    3
}

fn default_max_sends() -> u32 {
    20
}

fn default_queue_interval_ms() -> u64 {
    10
}

fn default_quiet_interval_ms() -> u64 {
    130
}

fn default_silence_timeout_secs() -> u64 {
    10
}

fn default_auto_reboot() -> bool {
    true
}

fn default_cooldown_secs() -> u64 {
    10
}

fn default_gateway_host() -> String {
    "192.168.0.38".to_string()
}

fn default_gateway_port() -> u16 {
    23
}

fn default_gateway_user() -> String {
    "admin".to_string()
}

fn default_min_temp() -> u8 {
    5
}

fn default_max_temp() -> u8 {
    40
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: BridgeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.mqtt.broker_port, 1883);
        assert_eq!(config.dispatch.confirm_threshold, 3);
        assert_eq!(config.dispatch.max_sends, 20);
        assert_eq!(config.dispatch.quiet_interval_ms, 130);
        assert_eq!(config.watchdog.silence_timeout_secs, 10);
        assert!(config.watchdog.auto_reboot);
        assert_eq!(config.climate.max_temp, 40);
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_partial_override() {
        let config: BridgeConfig = serde_json::from_str(
            r#"{
                "mqtt": { "broker_host": "10.0.0.5", "username": "ha" },
                "dispatch": { "confirm_threshold": 1 },
                "devices": { "Light": 3, "Thermo": 2 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.mqtt.broker_host, "10.0.0.5");
        assert_eq!(config.mqtt.username.as_deref(), Some("ha"));
        assert_eq!(config.mqtt.broker_port, 1883);
        assert_eq!(config.dispatch.confirm_threshold, 1);
        assert_eq!(config.devices.get("Light"), Some(&3));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(serde_json::from_str::<BridgeConfig>(r#"{ "mqtt": { "hostname": "x" } }"#).is_err());
    }
}
