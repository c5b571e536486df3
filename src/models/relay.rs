// Topic entries as read by the relay, and per-entry delivery bookkeeping

use serde::Serialize;

/// One row of the topic log. `payload` is the envelope JSON exactly as appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicEntry {
    pub offset: i64,
    pub topic: String,
    pub payload: String,
    pub appended_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    Failed,
}

impl DeliveryOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "delivered" => Some(DeliveryOutcome::Delivered),
            "failed" => Some(DeliveryOutcome::Failed),
            _ => None,
        }
    }
}

/// A delivery attempt: which entry, how it went, and where the group's commit position
/// stood afterwards (replay on restart starts there).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayRecord {
    pub entry_offset: i64,
    pub outcome: DeliveryOutcome,
    pub commit_position: i64,
    pub attempted_at: i64,
}
