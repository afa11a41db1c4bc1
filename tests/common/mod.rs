#![allow(dead_code)]

use std::sync::Mutex;

use nibe_uplink::{DeviceInfo, DiscoveryEntry, GroupSpec, Host, Platform, Result};

/// Test double for the automation host: records every capability call.
#[derive(Default)]
pub struct RecordingHost {
    pub groups: Mutex<Vec<GroupSpec>>,
    pub discoveries: Mutex<Vec<(Platform, Vec<DiscoveryEntry>)>>,
    pub notices: Mutex<Vec<(String, String, String)>>,
    pub dismissed: Mutex<Vec<String>>,
    pub devices: Mutex<Vec<DeviceInfo>>,
}

impl RecordingHost {
    /// Last registration for a group object id, if any.
    pub fn group(&self, object_id: &str) -> Option<GroupSpec> {
        self.groups
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|g| g.object_id == object_id)
            .cloned()
    }

    /// All object ids ever dispatched for a platform, across batches.
    pub fn dispatched(&self, platform: Platform) -> Vec<String> {
        self.discoveries
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == platform)
            .flat_map(|(_, entries)| entries.iter().map(|e| e.object_id.clone()))
            .collect()
    }

    pub fn notice_count(&self, key: &str) -> usize {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _, _)| k == key)
            .count()
    }
}

impl Host for RecordingHost {
    fn ensure_group(&self, group: GroupSpec) -> Result<String> {
        let id = format!("group.{}", group.object_id);
        self.groups.lock().unwrap().push(group);
        Ok(id)
    }

    fn dispatch_discovery(&self, platform: Platform, entries: Vec<DiscoveryEntry>) -> Result<()> {
        self.discoveries.lock().unwrap().push((platform, entries));
        Ok(())
    }

    fn create_notice(&self, key: &str, title: &str, message: &str) {
        self.notices
            .lock()
            .unwrap()
            .push((key.to_string(), title.to_string(), message.to_string()));
    }

    fn dismiss_notice(&self, key: &str) {
        self.dismissed.lock().unwrap().push(key.to_string());
    }

    fn register_device(&self, device: DeviceInfo) -> Result<()> {
        self.devices.lock().unwrap().push(device);
        Ok(())
    }
}
