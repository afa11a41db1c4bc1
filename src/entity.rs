use std::sync::Arc;

use serde_json::Value;

use crate::types::ParameterRecord;
use crate::uplink::Uplink;
use crate::Result;

/// Icon hints keyed by the vendor's display unit.
const UNIT_ICON: [(&str, &str); 3] = [
    ("A", "mdi:power-plug"),
    ("Hz", "mdi:update"),
    ("h", "mdi:clock"),
];

/// Polling state for one parameter entity.
///
/// A failed or empty fetch clears the cached record, so "unavailable" is
/// always distinguishable from "available with a stale value". Fetch
/// errors still propagate so the host's own retry scheduling applies.
pub struct ParameterMonitor {
    uplink: Arc<Uplink>,
    system_id: i64,
    parameter_id: i64,
    name: Option<String>,
    data: Option<ParameterRecord>,
}

impl ParameterMonitor {
    pub fn new(uplink: Arc<Uplink>, system_id: i64, parameter_id: i64) -> Self {
        Self {
            uplink,
            system_id,
            parameter_id,
            name: None,
            data: None,
        }
    }

    /// Seed from a record fetched during discovery, so the entity can
    /// render before its first own poll.
    pub fn with_data(mut self, data: Option<ParameterRecord>) -> Self {
        self.parse_data(data);
        self
    }

    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.system_id, self.parameter_id)
    }

    /// The name sticks to the first title seen, the vendor occasionally
    /// retitles parameters between polls.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn available(&self) -> bool {
        self.data.is_some()
    }

    pub fn value(&self) -> Option<&Value> {
        self.data.as_ref().map(|d| &d.value)
    }

    pub fn unit(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.unit.as_str())
    }

    pub fn icon(&self) -> Option<&'static str> {
        let unit = self.data.as_ref()?.unit.as_str();
        UNIT_ICON
            .iter()
            .find(|(u, _)| *u == unit)
            .map(|(_, icon)| *icon)
    }

    pub fn data(&self) -> Option<&ParameterRecord> {
        self.data.as_ref()
    }

    pub async fn update(&mut self) -> Result<()> {
        match self
            .uplink
            .get_parameter(self.system_id, self.parameter_id)
            .await
        {
            Ok(data) => {
                self.parse_data(data);
                Ok(())
            }
            Err(e) => {
                self.parse_data(None);
                Err(e)
            }
        }
    }

    fn parse_data(&mut self, data: Option<ParameterRecord>) {
        if let Some(ref record) = data
            && self.name.is_none()
        {
            self.name = Some(record.title.clone());
        }
        self.data = data;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(title: &str, unit: &str, value: Value) -> ParameterRecord {
        serde_json::from_value(json!({
            "parameterId": 40004,
            "title": title,
            "unit": unit,
            "value": value.clone(),
            "displayValue": value.to_string(),
            "rawValue": value,
            "designation": "BT1"
        }))
        .unwrap()
    }

    fn monitor() -> ParameterMonitor {
        let uplink = Arc::new(Uplink::builder("token").build());
        ParameterMonitor::new(uplink, 123, 40004)
    }

    #[test]
    fn unavailable_until_data_arrives() {
        let monitor = monitor();
        assert!(!monitor.available());
        assert_eq!(monitor.unique_id(), "123_40004");
    }

    #[test]
    fn seeded_data_makes_available() {
        let monitor = monitor().with_data(Some(record("outdoor temp.", "°C", json!(21.5))));
        assert!(monitor.available());
        assert_eq!(monitor.name(), Some("outdoor temp."));
        assert_eq!(monitor.value(), Some(&json!(21.5)));
        assert_eq!(monitor.icon(), None);
    }

    #[test]
    fn name_sticks_to_first_title() {
        let mut monitor = monitor().with_data(Some(record("first", "Hz", json!(50))));
        monitor.parse_data(Some(record("second", "Hz", json!(60))));
        assert_eq!(monitor.name(), Some("first"));
        assert_eq!(monitor.icon(), Some("mdi:update"));
    }

    #[test]
    fn cleared_data_means_unavailable() {
        let mut monitor = monitor().with_data(Some(record("t", "A", json!(1))));
        assert_eq!(monitor.icon(), Some("mdi:power-plug"));
        monitor.parse_data(None);
        assert!(!monitor.available());
        assert!(monitor.value().is_none());
    }
}
