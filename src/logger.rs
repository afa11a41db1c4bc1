use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::types::NotificationRecord;

pub enum MessageLogMode {
    /// Log every API request and every notification poll.
    Full,
    /// Log requests, but only polls whose reconciled diff is non-empty.
    Changes,
}

pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { mode, file })
    }

    pub fn log_request(&mut self, method: &str, path: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": method,
            "path": path,
        });
        self.write_line(&entry);
    }

    pub fn log_notifications(
        &mut self,
        system_id: i64,
        added: &[&NotificationRecord],
        removed: &[&NotificationRecord],
    ) {
        if matches!(self.mode, MessageLogMode::Changes) && added.is_empty() && removed.is_empty() {
            return;
        }
        let ids = |list: &[&NotificationRecord]| -> Vec<i64> {
            list.iter().map(|n| n.notification_id).collect()
        };
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "notifications",
            "system": system_id,
            "added": ids(added),
            "removed": ids(removed),
        });
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::NamedTempFile;

    fn notification(id: i64) -> NotificationRecord {
        serde_json::from_value(json!({
            "notificationId": id,
            "info": {"title": "t", "description": "d"}
        }))
        .unwrap()
    }

    fn read_lines(path: &str) -> Vec<Value> {
        let mut contents = String::new();
        std::fs::File::open(path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn log_request_writes_ndjson() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_request("GET", "/api/v1/systems/123/notifications");

        let lines = read_lines(path);
        assert_eq!(lines[0]["dir"], "req");
        assert_eq!(lines[0]["method"], "GET");
        assert!(lines[0]["ts"].as_str().is_some());
    }

    #[test]
    fn full_mode_logs_empty_diffs() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Full, path).unwrap();
        logger.log_notifications(123, &[], &[]);

        let lines = read_lines(path);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["system"], 123);
        assert_eq!(lines[0]["added"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn changes_mode_skips_empty_diffs() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();
        let mut logger = MessageLogger::new(MessageLogMode::Changes, path).unwrap();

        logger.log_notifications(123, &[], &[]);
        let added = notification(7);
        logger.log_notifications(123, &[&added], &[]);

        let lines = read_lines(path);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["added"], json!([7]));
    }
}
