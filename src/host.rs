use std::fmt;

use crate::types::ParameterRecord;
use crate::Result;

/// Integration domain, used as the prefix of every derived object id and
/// as the namespace of persistent notices.
pub const DOMAIN: &str = "nibe";

/// Entity platforms the adapter dispatches discovery for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Sensor,
    BinarySensor,
    Climate,
    Switch,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Sensor => "sensor",
            Platform::BinarySensor => "binary_sensor",
            Platform::Climate => "climate",
            Platform::Switch => "switch",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic object id: `{domain}_{system_id}_{suffix}`.
pub fn object_id(system_id: i64, suffix: &str) -> String {
    format!("{DOMAIN}_{system_id}_{suffix}")
}

/// Host entity id for an object on a platform: `{platform}.{object_id}`.
pub fn entity_id(platform: Platform, object_id: &str) -> String {
    format!("{platform}.{object_id}")
}

/// Facet-specific payload carried by a discovery descriptor.
#[derive(Debug, Clone)]
pub enum DiscoveryPayload {
    /// A polled parameter, optionally with the already-fetched record so
    /// the entity can render before its first own poll.
    Parameter {
        parameter_id: i64,
        data: Option<ParameterRecord>,
    },
    /// A climate sub-system id.
    Climate { climate_id: i64 },
}

/// One discovery descriptor handed to the host's platform loader.
#[derive(Debug, Clone)]
pub struct DiscoveryEntry {
    pub system_id: i64,
    pub object_id: String,
    pub payload: DiscoveryPayload,
}

/// A named host-level collection of entities, registered under a
/// deterministic object id. Re-registering the same object id updates the
/// existing group in place; the host guarantees this is idempotent.
#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub name: String,
    pub object_id: String,
    pub entity_ids: Vec<String>,
    /// Presented as a top-level view rather than an inline group.
    pub view: bool,
    pub icon: Option<&'static str>,
}

/// Device-registry entry for one installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub domain: &'static str,
    pub system_id: i64,
    pub manufacturer: String,
    pub model: String,
    pub name: String,
}

/// Capabilities the adapter consumes from the automation host.
///
/// All calls are expected to be idempotent with respect to their keys
/// (group object id, notice key, device identifiers).
pub trait Host: Send + Sync {
    /// Create or update a named entity group, returning its entity id.
    fn ensure_group(&self, group: GroupSpec) -> Result<String>;

    /// Hand a batch of discovery descriptors to the platform loader.
    fn dispatch_discovery(&self, platform: Platform, entries: Vec<DiscoveryEntry>) -> Result<()>;

    /// Raise a persistent, uniquely keyed user-visible notice.
    fn create_notice(&self, key: &str, title: &str, message: &str);

    /// Retract the notice with the given key, if present.
    fn dismiss_notice(&self, key: &str);

    /// Register a device with the host's device registry.
    fn register_device(&self, device: DeviceInfo) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids_are_deterministic() {
        assert_eq!(object_id(123, "0_40"), "nibe_123_0_40");
        assert_eq!(object_id(123, "0_40"), object_id(123, "0_40"));
    }

    #[test]
    fn entity_id_prefixes_platform() {
        let oid = object_id(123, "40004");
        assert_eq!(entity_id(Platform::Sensor, &oid), "sensor.nibe_123_40004");
        assert_eq!(
            entity_id(Platform::BinarySensor, &oid),
            "binary_sensor.nibe_123_40004"
        );
    }
}
