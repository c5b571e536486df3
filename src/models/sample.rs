// One parsed sensor reading

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSample {
    pub value: i64,
    pub captured_at: DateTime<Utc>,
}

impl SensorSample {
    pub fn new(value: i64, captured_at: DateTime<Utc>) -> Self {
        Self { value, captured_at }
    }
}
