use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{SystemConfig, UnitConfig};
use crate::host::{
    entity_id, object_id, DeviceInfo, DiscoveryEntry, DiscoveryPayload, GroupSpec, Host, Platform,
    DOMAIN,
};
use crate::types::{CategoryRecord, NotificationRecord, ParameterRecord, SystemInfo};
use crate::uplink::Uplink;
use crate::Result;

pub const POLL_INTERVAL: Duration = Duration::from_secs(60);

const MANUFACTURER: &str = "NIBE Energy Systems";

/// Parameter values that identify a binary reading rather than a numeric
/// sensor, matched case-insensitively.
const BINARY_SENSOR_VALUES: [&str; 4] = ["off", "on", "yes", "no"];

/// Accumulated record for one parameter: the last data seen during load
/// plus every group object id that references it. A parameter can belong
/// to multiple groups when unit configurations overlap.
#[derive(Debug, Clone, Default)]
pub struct ParameterEntry {
    pub data: Option<ParameterRecord>,
    pub groups: Vec<String>,
}

/// Controller for one vendor installation.
///
/// Owns the discovery dedup table, the per-parameter accumulation map and
/// the reconciled notification set. None of that state is shared across
/// controllers; the mutexes only guard against this controller's own
/// concurrent loader tasks.
pub struct NibeSystem {
    uplink: Arc<Uplink>,
    host: Arc<dyn Host>,
    system_id: i64,
    config: SystemConfig,
    system: Mutex<Option<SystemInfo>>,
    notice: Mutex<Vec<NotificationRecord>>,
    discovered: Mutex<HashMap<Platform, HashSet<String>>>,
    parameters: Mutex<HashMap<i64, ParameterEntry>>,
    poll_guard: tokio::sync::Mutex<()>,
}

impl NibeSystem {
    pub fn new(uplink: Arc<Uplink>, host: Arc<dyn Host>, config: SystemConfig) -> Arc<Self> {
        Arc::new(Self {
            uplink,
            host,
            system_id: config.system,
            config,
            system: Mutex::new(None),
            notice: Mutex::new(Vec::new()),
            discovered: Mutex::new(HashMap::new()),
            parameters: Mutex::new(HashMap::new()),
            poll_guard: tokio::sync::Mutex::new(()),
        })
    }

    pub fn system_id(&self) -> i64 {
        self.system_id
    }

    /// Accumulated state for one parameter, if it was seen during load.
    pub fn parameter_entry(&self, parameter_id: i64) -> Option<ParameterEntry> {
        self.parameters
            .lock()
            .expect("parameter table poisoned")
            .get(&parameter_id)
            .cloned()
    }

    /// Load metadata, all configured units and the initial notification
    /// set, then start the recurring poll. Invoked exactly once.
    pub async fn load(self: Arc<Self>) -> Result<()> {
        let info = self.fetch_metadata().await?;

        self.host.register_device(DeviceInfo {
            domain: DOMAIN,
            system_id: self.system_id,
            manufacturer: MANUFACTURER.to_string(),
            model: info.product_name.clone(),
            name: info.name.clone(),
        })?;

        try_join_all(
            self.config
                .units
                .iter()
                .map(|unit| self.load_unit(&info, unit)),
        )
        .await?;

        self.update().await?;
        self.clone().spawn_poller();
        Ok(())
    }

    /// One poll tick: fetch notifications, reconcile against the stored
    /// set, raise/retract host notices for the difference. Overlapping
    /// ticks serialize on the poll guard.
    pub async fn update(&self) -> Result<()> {
        let _tick = self.poll_guard.lock().await;

        let current = self.uplink.get_notifications(self.system_id).await?;

        let mut stored = self.notice.lock().expect("notification set poisoned");
        let (added, removed) = diff_notifications(&stored, &current);

        self.uplink.log_notifications(self.system_id, &added, &removed);
        if !added.is_empty() || !removed.is_empty() {
            debug!(
                system_id = self.system_id,
                added = added.len(),
                removed = removed.len(),
                "notifications changed"
            );
        }

        for notification in &added {
            self.host.create_notice(
                &notice_key(notification.notification_id),
                &notification.info.title,
                &notification.info.description,
            );
        }
        for notification in &removed {
            self.host
                .dismiss_notice(&notice_key(notification.notification_id));
        }

        *stored = current;
        Ok(())
    }

    async fn fetch_metadata(&self) -> Result<SystemInfo> {
        let cached = self
            .system
            .lock()
            .expect("system metadata poisoned")
            .clone();
        if let Some(info) = cached {
            return Ok(info);
        }
        let info = self.uplink.get_system(self.system_id).await?;
        debug!(system_id = self.system_id, name = %info.name, "loaded system metadata");
        *self.system.lock().expect("system metadata poisoned") = Some(info.clone());
        Ok(info)
    }

    /// Load every configured facet of one unit concurrently, then bundle
    /// all produced entities into the unit's top-level view group.
    async fn load_unit(&self, system: &SystemInfo, unit: &UnitConfig) -> Result<()> {
        let (categories, statuses, sensors, climates, switches) = futures::try_join!(
            async {
                match &unit.categories {
                    Some(selected) => self.load_categories(unit.unit, selected).await,
                    None => Ok(Vec::new()),
                }
            },
            async {
                // The configured status values are accepted but not used
                // as a filter, every returned status block is loaded.
                match &unit.statuses {
                    Some(_) => self.load_status(unit.unit).await,
                    None => Ok(Vec::new()),
                }
            },
            async {
                match &unit.sensors {
                    Some(ids) => self.load_parameters(ids, &HashMap::new()).await,
                    None => Ok(Vec::new()),
                }
            },
            async {
                match &unit.climates {
                    Some(ids) => self.load_climate(ids).await,
                    None => Ok(Vec::new()),
                }
            },
            async {
                match &unit.switches {
                    Some(ids) => self.load_switch(ids).await,
                    None => Ok(Vec::new()),
                }
            },
        )?;

        let mut entities = categories;
        entities.extend(statuses);
        entities.extend(sensors);
        entities.extend(climates);
        entities.extend(switches);

        self.host.ensure_group(GroupSpec {
            name: format!("{} - Unit {}", system.product_name, unit.unit),
            object_id: object_id(self.system_id, &unit.unit.to_string()),
            entity_ids: entities,
            view: true,
            icon: Some("mdi:thermostat"),
        })?;
        Ok(())
    }

    async fn load_categories(&self, unit_id: i64, selected: &[String]) -> Result<Vec<String>> {
        let data = self.uplink.get_categories(self.system_id, true, unit_id).await?;
        let data = filter_categories(data, selected);
        try_join_all(data.iter().map(|category| {
            self.load_parameter_group(
                &category.name,
                format!("{}_{}", unit_id, category.category_id),
                &category.parameters,
            )
        }))
        .await
    }

    async fn load_status(&self, unit_id: i64) -> Result<Vec<String>> {
        let data = self.uplink.get_unit_status(self.system_id, unit_id).await?;
        try_join_all(data.iter().map(|status| {
            self.load_parameter_group(
                &status.title,
                format!("{}_{}", unit_id, status.title),
                &status.parameters,
            )
        }))
        .await
    }

    /// Turn a batch of parameters into polled entities and bundle them
    /// into one named, non-interactive group. Returns the group entity id.
    async fn load_parameter_group(
        &self,
        name: &str,
        suffix: String,
        parameters: &[ParameterRecord],
    ) -> Result<String> {
        // Dedupe by parameter id, first occurrence keeps its position,
        // last record wins.
        let mut order = Vec::new();
        let mut data: HashMap<i64, ParameterRecord> = HashMap::new();
        for parameter in parameters {
            if data
                .insert(parameter.parameter_id, parameter.clone())
                .is_none()
            {
                order.push(parameter.parameter_id);
            }
        }

        let entity_ids = self.load_parameters(&order, &data).await?;
        let group_object_id = object_id(self.system_id, &suffix);

        {
            let mut table = self.parameters.lock().expect("parameter table poisoned");
            for id in &order {
                let entry = table.entry(*id).or_default();
                entry.data = data.get(id).cloned();
                if !entry.groups.contains(&group_object_id) {
                    entry.groups.push(group_object_id.clone());
                }
            }
        }

        self.host.ensure_group(GroupSpec {
            name: name.to_string(),
            object_id: group_object_id,
            entity_ids,
            view: false,
            icon: None,
        })
    }

    /// Dispatch discovery for a list of parameter ids. Parameters whose
    /// fetched value reads as on/off/yes/no go to the binary sensor
    /// platform, everything else to the generic sensor platform.
    async fn load_parameters(
        &self,
        ids: &[i64],
        data: &HashMap<i64, ParameterRecord>,
    ) -> Result<Vec<String>> {
        let mut sensors = Vec::new();
        let mut binary_sensors = Vec::new();

        for &id in ids {
            // Parameters without a real id cannot be polled.
            if id == 0 {
                continue;
            }
            let record = data.get(&id);
            let platform = match record {
                Some(record) if is_binary_value(&record.value) => Platform::BinarySensor,
                _ => Platform::Sensor,
            };
            let entry = DiscoveryEntry {
                system_id: self.system_id,
                object_id: object_id(self.system_id, &id.to_string()),
                payload: DiscoveryPayload::Parameter {
                    parameter_id: id,
                    data: record.cloned(),
                },
            };
            match platform {
                Platform::BinarySensor => binary_sensors.push(entry),
                _ => sensors.push(entry),
            }
        }

        let mut entity_ids = self.load_platform(Platform::Sensor, sensors)?;
        entity_ids.extend(self.load_platform(Platform::BinarySensor, binary_sensors)?);
        Ok(entity_ids)
    }

    async fn load_climate(&self, selected: &[i64]) -> Result<Vec<String>> {
        debug!(system_id = self.system_id, ?selected, "loading climate systems");
        let entries = selected
            .iter()
            .map(|&id| DiscoveryEntry {
                system_id: self.system_id,
                object_id: object_id(self.system_id, &id.to_string()),
                payload: DiscoveryPayload::Climate { climate_id: id },
            })
            .collect();
        self.load_platform(Platform::Climate, entries)
    }

    async fn load_switch(&self, selected: &[i64]) -> Result<Vec<String>> {
        debug!(system_id = self.system_id, ?selected, "loading switches");
        let entries = selected
            .iter()
            .map(|&id| DiscoveryEntry {
                system_id: self.system_id,
                object_id: object_id(self.system_id, &id.to_string()),
                payload: DiscoveryPayload::Parameter {
                    parameter_id: id,
                    data: None,
                },
            })
            .collect();
        self.load_platform(Platform::Switch, entries)
    }

    /// Dispatch a discovery batch, suppressing object ids already sent
    /// for this platform. The returned entity id list always covers the
    /// whole batch so callers can reference entities discovered earlier.
    fn load_platform(&self, platform: Platform, entries: Vec<DiscoveryEntry>) -> Result<Vec<String>> {
        let all_ids = entries
            .iter()
            .map(|entry| entity_id(platform, &entry.object_id))
            .collect();

        let fresh = self.filter_discovered(platform, entries);
        if !fresh.is_empty() {
            debug!(platform = %platform, count = fresh.len(), "dispatching discovery");
            self.host.dispatch_discovery(platform, fresh)?;
        }
        Ok(all_ids)
    }

    fn filter_discovered(
        &self,
        platform: Platform,
        entries: Vec<DiscoveryEntry>,
    ) -> Vec<DiscoveryEntry> {
        let mut discovered = self.discovered.lock().expect("dedup table poisoned");
        let table = discovered.entry(platform).or_default();
        entries
            .into_iter()
            .filter(|entry| table.insert(entry.object_id.clone()))
            .collect()
    }

    fn spawn_poller(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first interval tick fires immediately and load() has
            // already polled once, skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.update().await {
                    warn!(system_id = self.system_id, error = %e, "notification poll failed");
                }
            }
        });
    }
}

fn notice_key(notification_id: i64) -> String {
    format!("{DOMAIN}:{notification_id}")
}

/// Keep only categories whose id is in the selection; an empty selection
/// keeps everything.
fn filter_categories(data: Vec<CategoryRecord>, selected: &[String]) -> Vec<CategoryRecord> {
    if selected.is_empty() {
        data
    } else {
        data.into_iter()
            .filter(|category| selected.iter().any(|s| *s == category.category_id))
            .collect()
    }
}

fn is_binary_value(value: &Value) -> bool {
    let rendered = match value {
        Value::String(s) => s.to_ascii_lowercase(),
        other => other.to_string().to_ascii_lowercase(),
    };
    BINARY_SENSOR_VALUES.contains(&rendered.as_str())
}

/// Diff two notification lists by identifier. Added entries come back in
/// current-list order, removed entries in previous-list order.
pub(crate) fn diff_notifications<'a>(
    previous: &'a [NotificationRecord],
    current: &'a [NotificationRecord],
) -> (Vec<&'a NotificationRecord>, Vec<&'a NotificationRecord>) {
    let previous_ids: HashSet<i64> = previous.iter().map(|n| n.notification_id).collect();
    let current_ids: HashSet<i64> = current.iter().map(|n| n.notification_id).collect();

    let added = current
        .iter()
        .filter(|n| !previous_ids.contains(&n.notification_id))
        .collect();
    let removed = previous
        .iter()
        .filter(|n| !current_ids.contains(&n.notification_id))
        .collect();
    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notification(id: i64) -> NotificationRecord {
        serde_json::from_value(json!({
            "notificationId": id,
            "info": {"title": format!("alarm {id}"), "description": "d"}
        }))
        .unwrap()
    }

    fn category(id: &str) -> CategoryRecord {
        serde_json::from_value(json!({
            "categoryId": id,
            "name": format!("category {id}"),
            "parameters": []
        }))
        .unwrap()
    }

    #[test]
    fn diff_reports_added_and_removed_in_order() {
        let previous = vec![notification(1), notification(2)];
        let current = vec![notification(2), notification(3)];
        let (added, removed) = diff_notifications(&previous, &current);
        assert_eq!(added.iter().map(|n| n.notification_id).collect::<Vec<_>>(), [3]);
        assert_eq!(removed.iter().map(|n| n.notification_id).collect::<Vec<_>>(), [1]);
    }

    #[test]
    fn diff_unchanged_is_empty() {
        let list = vec![notification(1), notification(2)];
        let (added, removed) = diff_notifications(&list, &list);
        assert!(added.is_empty());
        assert!(removed.is_empty());
    }

    #[test]
    fn diff_ignores_input_ordering_within_sets() {
        let previous = vec![notification(2), notification(1)];
        let current = vec![notification(3), notification(2)];
        let (added, removed) = diff_notifications(&previous, &current);
        assert_eq!(added.iter().map(|n| n.notification_id).collect::<Vec<_>>(), [3]);
        assert_eq!(removed.iter().map(|n| n.notification_id).collect::<Vec<_>>(), [1]);
    }

    #[test]
    fn empty_selection_keeps_all_categories() {
        let data = vec![category("40"), category("41")];
        let kept = filter_categories(data, &[]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn selection_filters_categories() {
        let data = vec![category("40"), category("41")];
        let kept = filter_categories(data, &["40".to_string()]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].category_id, "40");
    }

    #[test]
    fn binary_values_match_case_insensitively() {
        assert!(is_binary_value(&json!("On")));
        assert!(is_binary_value(&json!("OFF")));
        assert!(is_binary_value(&json!("yes")));
        assert!(!is_binary_value(&json!("21.5")));
        assert!(!is_binary_value(&json!(21.5)));
        assert!(!is_binary_value(&json!(null)));
    }
}
