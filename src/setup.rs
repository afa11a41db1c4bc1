use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error};

use crate::config::Config;
use crate::host::Host;
use crate::system::NibeSystem;
use crate::uplink::Uplink;
use crate::Result;

/// Integration state produced by setup: the shared client and one
/// controller per configured system, keyed by system id. Written once,
/// read thereafter.
pub struct NibeContext {
    uplink: Arc<Uplink>,
    systems: HashMap<i64, Arc<NibeSystem>>,
}

impl std::fmt::Debug for NibeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NibeContext")
            .field("systems", &self.systems.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl NibeContext {
    pub fn uplink(&self) -> &Arc<Uplink> {
        &self.uplink
    }

    pub fn system(&self, system_id: i64) -> Option<&Arc<NibeSystem>> {
        self.systems.get(&system_id)
    }

    pub fn systems(&self) -> impl Iterator<Item = &Arc<NibeSystem>> {
        self.systems.values()
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

/// Construct one controller per configured system and run all initial
/// loads concurrently.
///
/// With no systems configured this is not an error: the available system
/// ids are fetched and surfaced as a persistent notice so the operator
/// can pick one, and no controllers are created.
///
/// Each controller's load failure is reported individually; siblings are
/// not aborted and their results stand. The first failure is returned
/// once all loads have resolved.
pub async fn setup_systems(
    config: &Config,
    uplink: Arc<Uplink>,
    host: Arc<dyn Host>,
) -> Result<NibeContext> {
    if config.systems.is_empty() {
        let available = uplink.get_systems().await?;
        let listing = serde_json::to_string_pretty(&available)
            .unwrap_or_else(|_| "(unavailable)".to_string());
        host.create_notice(
            "invalid_config",
            "Invalid nibe config",
            &format!("No systems selected, please configure one system id of:\n{listing}"),
        );
        return Ok(NibeContext {
            uplink,
            systems: HashMap::new(),
        });
    }

    // Duplicate system ids overwrite one another, the later entry wins.
    let mut systems = HashMap::new();
    for system_config in &config.systems {
        let system = NibeSystem::new(uplink.clone(), host.clone(), system_config.clone());
        systems.insert(system_config.system, system);
    }
    debug!(count = systems.len(), "loading systems");

    let results = join_all(
        systems
            .values()
            .map(|system| async move { (system.system_id(), system.clone().load().await) }),
    )
    .await;

    let mut first_error = None;
    for (system_id, result) in results {
        if let Err(e) = result {
            error!(system_id, error = %e, "system load failed");
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(NibeContext { uplink, systems }),
    }
}
