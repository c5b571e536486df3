// Aggregate record appended to the topic (wire format is the JSON object itself)

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Windowed average for one device. Field names and order are the topic wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub device_id: i64,
    pub water_level: i64,
    /// ISO-8601 UTC at flush time, e.g. `2025-05-01T12:00:00.123Z`.
    pub timestamp: String,
}

impl Envelope {
    pub fn new(device_id: i64, water_level: i64, flushed_at: DateTime<Utc>) -> Self {
        Self {
            device_id,
            water_level,
            timestamp: flushed_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
