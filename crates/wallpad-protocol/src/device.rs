//! The closed set of device kinds the codec understands.
//!
//! The vendor schema keys devices by name (`Light`, `Thermo`, ...). Codec,
//! predictor, and encoder behavior branch on the kind, so new hardware is
//! supported by adding a variant here rather than growing a string-compare
//! chain in three places.

/// A class of physical device sharing one packet schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Heating thermostat (`Thermo`).
    Thermostat,
    /// Room light (`Light`).
    Light,
    /// Whole-home light breaker (`LightBreaker`).
    LightBreaker,
    /// Switched outlet with power metering (`Outlet`).
    Outlet,
    /// Ventilation fan (`Fan`).
    Fan,
    /// Elevator call panel (`EV`).
    Elevator,
}

impl DeviceKind {
    /// Map a schema document key to a kind.
    ///
    /// Returns `None` for unrecognized keys; callers must treat those
    /// devices as unsupported.
    pub fn from_schema_name(name: &str) -> Option<Self> {
        match name {
            "Thermo" => Some(DeviceKind::Thermostat),
            "Light" => Some(DeviceKind::Light),
            "LightBreaker" => Some(DeviceKind::LightBreaker),
            "Outlet" => Some(DeviceKind::Outlet),
            "Fan" => Some(DeviceKind::Fan),
            "EV" => Some(DeviceKind::Elevator),
            _ => None,
        }
    }

    /// The schema document key for this kind.
    pub fn schema_name(&self) -> &'static str {
        match self {
            DeviceKind::Thermostat => "Thermo",
            DeviceKind::Light => "Light",
            DeviceKind::LightBreaker => "LightBreaker",
            DeviceKind::Outlet => "Outlet",
            DeviceKind::Fan => "Fan",
            DeviceKind::Elevator => "EV",
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.schema_name())
    }
}

/// Fan speed steps exposed upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanSpeed {
    /// Lowest speed, also the fallback for unmapped speed bytes.
    Low,
    Medium,
    High,
}

impl FanSpeed {
    /// Lowercase name as used in schema values and control-plane payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            FanSpeed::Low => "low",
            FanSpeed::Medium => "medium",
            FanSpeed::High => "high",
        }
    }

    /// Parse a control-plane speed payload.
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "low" => Some(FanSpeed::Low),
            "medium" => Some(FanSpeed::Medium),
            "high" => Some(FanSpeed::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
