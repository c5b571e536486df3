// Query contract of the downstream history service (GET ?device_id=&range=).
// Only the types live here; this crate never serves or calls that API.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryRange {
    LastHour,
    #[serde(rename = "last_6_hours")]
    Last6Hours,
    #[serde(rename = "last_12_hours")]
    Last12Hours,
    #[default]
    LastDay,
    LastWeek,
    LastMonth,
}

impl HistoryRange {
    pub const ALL: [HistoryRange; 6] = [
        HistoryRange::LastHour,
        HistoryRange::Last6Hours,
        HistoryRange::Last12Hours,
        HistoryRange::LastDay,
        HistoryRange::LastWeek,
        HistoryRange::LastMonth,
    ];

    /// Look-back window covered by the range. A month is 30 days.
    pub fn duration(self) -> Duration {
        const HOUR: u64 = 3600;
        let secs = match self {
            HistoryRange::LastHour => HOUR,
            HistoryRange::Last6Hours => 6 * HOUR,
            HistoryRange::Last12Hours => 12 * HOUR,
            HistoryRange::LastDay => 24 * HOUR,
            HistoryRange::LastWeek => 7 * 24 * HOUR,
            HistoryRange::LastMonth => 30 * 24 * HOUR,
        };
        Duration::from_secs(secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: String,
    pub water_level: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub data: Vec<HistoryPoint>,
}
