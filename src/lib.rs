mod config;
mod entity;
mod error;
mod host;
mod logger;
mod setup;
mod system;
mod types;
mod uplink;

pub use config::{Config, Credentials, SystemConfig, UnitConfig};
pub use entity::ParameterMonitor;
pub use error::{Error, Result};
pub use host::{
    entity_id, object_id, DeviceInfo, DiscoveryEntry, DiscoveryPayload, GroupSpec, Host, Platform,
    DOMAIN,
};
pub use logger::MessageLogMode;
pub use setup::{setup_systems, NibeContext};
pub use system::{NibeSystem, ParameterEntry, POLL_INTERVAL};
pub use types::*;
pub use uplink::{Uplink, UplinkBuilder, DEFAULT_BASE_URL};
