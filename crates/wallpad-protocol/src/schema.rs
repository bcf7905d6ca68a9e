//! Declarative packet schemas and their compiled lookup tables.
//!
//! Vendors describe their bus dialect in a YAML document: one entry per
//! device type, each with up to four packet kinds (`command`, `state`,
//! `state_request`, `ack`), each carrying a header byte and a `structure`
//! table mapping byte positions to named fields. Compilation turns the
//! position-keyed table into a `field name → position` index so the codec
//! can address fields by name.
//!
//! The compiled [`SchemaSet`] is immutable; a reload builds a fresh set
//! and the caller swaps it in atomically.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::error;

use crate::device::DeviceKind;
use crate::error::ProtocolError;
use crate::frame::hex_byte;

/// Field name marking a reserved/unused byte position.
pub const EMPTY_FIELD: &str = "empty";

/// One field in a packet `structure` table.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDescriptor {
    /// Field name; `"empty"` marks an unused byte.
    pub name: String,
    /// Symbolic value enumeration, if the field is enumerated.
    ///
    /// Command fields map `symbol → hex byte` (e.g. `on: "01"`). Some
    /// state enumerations run the other way (`hex byte → symbol`, e.g.
    /// fan speed `"01": low`); accessors exist for both directions.
    #[serde(default)]
    pub values: HashMap<String, String>,
}

/// Raw (uncompiled) packet description as found in the document.
#[derive(Debug, Clone, Deserialize)]
pub struct PacketDescriptor {
    /// Header byte as two hex characters.
    pub header: String,
    /// Byte position (as a string key) → field.
    #[serde(default)]
    pub structure: BTreeMap<String, FieldDescriptor>,
}

/// Raw per-device description as found in the document.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceDescriptor {
    /// Control-plane component class (`light`, `climate`, `switch`, ...).
    #[serde(rename = "type")]
    pub component: String,
    /// Command packet layout.
    #[serde(default)]
    pub command: Option<PacketDescriptor>,
    /// State report layout.
    #[serde(default)]
    pub state: Option<PacketDescriptor>,
    /// State request layout (emitted by pollers; not used by the codec).
    #[serde(default)]
    pub state_request: Option<PacketDescriptor>,
    /// Acknowledgement layout (some dialects only).
    #[serde(default)]
    pub ack: Option<PacketDescriptor>,
}

/// A compiled packet layout with field positions indexed by name.
#[derive(Debug, Clone)]
pub struct PacketSchema {
    /// Header byte value.
    pub header: u8,
    /// Header as two uppercase hex characters.
    pub header_hex: String,
    /// Byte position → field, positions in ascending order.
    pub fields: BTreeMap<usize, FieldDescriptor>,
    /// Field name → byte position, excluding `"empty"` entries.
    pub field_positions: HashMap<String, usize>,
}

impl PacketSchema {
    fn compile(
        device: &str,
        kind: &'static str,
        raw: &PacketDescriptor,
    ) -> Result<Self, ProtocolError> {
        let header = u8::from_str_radix(raw.header.trim(), 16).map_err(|_| {
            ProtocolError::Schema(format!(
                "{device}.{kind}: header '{}' is not a hex byte",
                raw.header
            ))
        })?;

        let mut fields = BTreeMap::new();
        for (pos_str, field) in &raw.structure {
            let pos: usize = pos_str.trim().parse().map_err(|_| {
                ProtocolError::Schema(format!(
                    "{device}.{kind}: position '{pos_str}' is not a number"
                ))
            })?;
            fields.insert(pos, field.clone());
        }

        // Ascending scan; on a duplicated name the earlier position wins.
        let mut field_positions = HashMap::new();
        for (&pos, field) in &fields {
            if field.name == EMPTY_FIELD {
                continue;
            }
            if let Some(&existing) = field_positions.get(&field.name) {
                error!(
                    device,
                    kind,
                    field = %field.name,
                    first = existing,
                    duplicate = pos,
                    "duplicate field name in packet schema, keeping first"
                );
            } else {
                field_positions.insert(field.name.clone(), pos);
            }
        }

        Ok(PacketSchema {
            header,
            header_hex: hex_byte(header),
            fields,
            field_positions,
        })
    }

    /// Position of a named field, if defined.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.field_positions.get(name).copied()
    }

    /// Position of a named field, with a dialect-default fallback.
    pub fn position_or(&self, name: &str, default: usize) -> usize {
        self.position(name).unwrap_or(default)
    }

    /// The value enumeration of the field at `position`, if any.
    pub fn values_at(&self, position: usize) -> Option<&HashMap<String, String>> {
        self.fields.get(&position).map(|f| &f.values)
    }

    /// Hex byte (uppercase) for a symbolic value of the field at `position`.
    pub fn symbol_hex(&self, position: usize, symbol: &str) -> Option<String> {
        self.values_at(position)?
            .get(symbol)
            .map(|v| v.trim().to_ascii_uppercase())
    }

    /// Byte value for a symbolic value of the field at `position`.
    pub fn symbol_byte(&self, position: usize, symbol: &str) -> Result<u8, ProtocolError> {
        let hex = self
            .symbol_hex(position, symbol)
            .ok_or_else(|| ProtocolError::MissingSymbol {
                position,
                symbol: symbol.to_string(),
            })?;
        u8::from_str_radix(&hex, 16).map_err(|_| ProtocolError::MissingSymbol {
            position,
            symbol: symbol.to_string(),
        })
    }

    /// Reverse lookup for hex-keyed enumerations (fan speed, floor labels):
    /// the symbol stored under the byte's hex form.
    pub fn label_for_byte(&self, position: usize, byte: u8) -> Option<&str> {
        self.values_at(position)?
            .get(&hex_byte(byte))
            .map(String::as_str)
    }
}

/// A compiled device entry.
#[derive(Debug, Clone)]
pub struct DeviceSchema {
    /// Schema document key (`Light`, `Thermo`, ...).
    pub name: String,
    /// The codec kind, if this device name is recognized.
    pub kind: Option<DeviceKind>,
    /// Control-plane component class from the document.
    pub component: String,
    /// Compiled command layout.
    pub command: Option<PacketSchema>,
    /// Compiled state layout.
    pub state: Option<PacketSchema>,
    /// Compiled state-request layout.
    pub state_request: Option<PacketSchema>,
    /// Compiled acknowledgement layout.
    pub ack: Option<PacketSchema>,
}

impl DeviceSchema {
    /// The command layout, or an error naming what's missing.
    pub fn command_schema(&self) -> Result<&PacketSchema, ProtocolError> {
        self.command
            .as_ref()
            .ok_or_else(|| ProtocolError::MissingPacketSchema {
                device: self.name.clone(),
                kind: "command",
            })
    }

    /// The state layout, or an error naming what's missing.
    pub fn state_schema(&self) -> Result<&PacketSchema, ProtocolError> {
        self.state
            .as_ref()
            .ok_or_else(|| ProtocolError::MissingPacketSchema {
                device: self.name.clone(),
                kind: "state",
            })
    }
}

/// The compiled, immutable schema set for one vendor dialect.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    devices: BTreeMap<String, DeviceSchema>,
}

impl SchemaSet {
    /// Parse and compile a vendor document from YAML text.
    ///
    /// An unparseable document is an error. Within a parseable document,
    /// a malformed packet entry is logged and skipped, leaving that
    /// device partially (or not at all) usable; duplicate field names
    /// within a packet are logged and tolerated (first wins).
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ProtocolError> {
        let raw: BTreeMap<String, DeviceDescriptor> =
            serde_yaml::from_str(yaml).map_err(|e| ProtocolError::Schema(e.to_string()))?;
        Ok(Self::compile(raw))
    }

    /// Load and compile a vendor document from a file.
    pub fn load(path: &Path) -> Result<Self, ProtocolError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProtocolError::Schema(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&text)
    }

    fn compile(raw: BTreeMap<String, DeviceDescriptor>) -> Self {
        let mut devices = BTreeMap::new();
        for (name, descriptor) in raw {
            let compile_kind = |kind: &'static str, pkt: &Option<PacketDescriptor>| {
                let raw = pkt.as_ref()?;
                match PacketSchema::compile(&name, kind, raw) {
                    Ok(schema) => Some(schema),
                    Err(e) => {
                        error!(device = %name, kind, error = %e, "skipping malformed packet schema");
                        None
                    }
                }
            };
            let device = DeviceSchema {
                kind: DeviceKind::from_schema_name(&name),
                component: descriptor.component.clone(),
                command: compile_kind("command", &descriptor.command),
                state: compile_kind("state", &descriptor.state),
                state_request: compile_kind("state_request", &descriptor.state_request),
                ack: compile_kind("ack", &descriptor.ack),
                name: name.clone(),
            };
            devices.insert(name, device);
        }
        SchemaSet { devices }
    }

    /// Look up a device by schema name.
    pub fn device(&self, name: &str) -> Option<&DeviceSchema> {
        self.devices.get(name)
    }

    /// Look up a device by codec kind.
    pub fn device_by_kind(&self, kind: DeviceKind) -> Option<&DeviceSchema> {
        self.device(kind.schema_name())
    }

    /// The device whose state header matches `header`, if any.
    ///
    /// First match wins; the schema set must avoid header collisions by
    /// construction.
    pub fn device_for_state_header(&self, header: u8) -> Option<&DeviceSchema> {
        self.devices
            .values()
            .find(|d| d.state.as_ref().is_some_and(|s| s.header == header))
    }

    /// The device whose command header matches `header`, if any.
    pub fn device_for_command_header(&self, header: u8) -> Option<&DeviceSchema> {
        self.devices
            .values()
            .find(|d| d.command.as_ref().is_some_and(|s| s.header == header))
    }

    /// Number of device entries.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the set holds no devices.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterate device entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceSchema> {
        self.devices.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIGHT_YAML: &str = r#"
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
      "1": { name: deviceId }
      "2": { name: power, values: { on: "01", off: "00" } }
      "3": { name: empty }
"#;

    #[test]
    fn test_compile_field_positions() {
        let set = SchemaSet::from_yaml_str(LIGHT_YAML).unwrap();
        let light = set.device("Light").unwrap();
        let state = light.state.as_ref().unwrap();
        assert_eq!(state.header, 0xB0);
        assert_eq!(state.position("deviceId"), Some(1));
        assert_eq!(state.position("power"), Some(2));
        // "empty" never lands in the index.
        assert_eq!(state.position("empty"), None);
    }

    #[test]
    fn test_duplicate_field_name_keeps_first() {
        let yaml = r#"
Light:
  type: light
  state:
    header: "B0"
    structure:
      "1": { name: power, values: { on: "01", off: "00" } }
      "4": { name: power }
"#;
        let set = SchemaSet::from_yaml_str(yaml).unwrap();
        let state = set.device("Light").unwrap().state.as_ref().unwrap();
        assert_eq!(state.position("power"), Some(1));
    }

    #[test]
    fn test_symbol_lookups() {
        let set = SchemaSet::from_yaml_str(LIGHT_YAML).unwrap();
        let command = set.device("Light").unwrap().command.as_ref().unwrap();
        assert_eq!(command.symbol_hex(2, "on").as_deref(), Some("01"));
        assert_eq!(command.symbol_byte(2, "off").unwrap(), 0x00);
        assert!(matches!(
            command.symbol_byte(2, "dim"),
            Err(ProtocolError::MissingSymbol { position: 2, .. })
        ));
    }

    #[test]
    fn test_label_for_byte_reverse_enumeration() {
        let yaml = r#"
Fan:
  type: fan
  state:
    header: "F6"
    structure:
      "3": { name: speed, values: { "01": low, "02": medium, "03": high } }
"#;
        let set = SchemaSet::from_yaml_str(yaml).unwrap();
        let state = set.device("Fan").unwrap().state.as_ref().unwrap();
        assert_eq!(state.label_for_byte(3, 0x02), Some("medium"));
        assert_eq!(state.label_for_byte(3, 0x09), None);
    }

    #[test]
    fn test_header_lookup() {
        let set = SchemaSet::from_yaml_str(LIGHT_YAML).unwrap();
        assert!(set.device_for_state_header(0xB0).is_some());
        assert!(set.device_for_state_header(0xB1).is_none());
        assert!(set.device_for_command_header(0x31).is_some());
    }

    #[test]
    fn test_unparseable_document_is_an_error() {
        assert!(matches!(
            SchemaSet::from_yaml_str("Light: [not, a, map]"),
            Err(ProtocolError::Schema(_))
        ));
    }

    #[test]
    fn test_malformed_packet_is_skipped_not_fatal() {
        let yaml = r#"
Light:
  type: light
  command:
    header: "31"
    structure:
      "1": { name: deviceId }
  state:
    header: "XY"
    structure: {}
"#;
        let set = SchemaSet::from_yaml_str(yaml).unwrap();
        let light = set.device("Light").unwrap();
        // The bad state entry is dropped, the good command entry stays.
        assert!(light.state.is_none());
        assert!(light.command.is_some());
        assert!(matches!(
            light.state_schema(),
            Err(ProtocolError::MissingPacketSchema { .. })
        ));
    }

    #[test]
    fn test_unknown_device_name_compiles_without_kind() {
        let yaml = r#"
Curtain:
  type: cover
  state:
    header: "C0"
    structure: {}
"#;
        let set = SchemaSet::from_yaml_str(yaml).unwrap();
        assert_eq!(set.device("Curtain").unwrap().kind, None);
    }
}
