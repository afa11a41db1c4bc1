use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Paged collection envelope used by the Uplink list endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Paged<T> {
    #[serde(default)]
    pub objects: Vec<T>,
}

/// One registered installation, as returned by both the systems listing
/// and the single-system endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub system_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One polled value exposed by the vendor API.
///
/// Only the fields the adapter inspects are named; everything else the
/// vendor sends rides along in `extra` for the host entity layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterRecord {
    pub parameter_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub designation: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub display_value: String,
    #[serde(default)]
    pub raw_value: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A vendor-defined grouping of related parameters (e.g. "Compressor").
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRecord {
    pub category_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterRecord>,
}

/// One subsystem's live state block (e.g. "compressor").
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub title: String,
    #[serde(default)]
    pub parameters: Vec<ParameterRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotificationInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// A vendor-issued alert tied to a system. The stable `notification_id`
/// drives diff-based reconciliation across poll cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub notification_id: i64,
    #[serde(default)]
    pub info: NotificationInfo,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
