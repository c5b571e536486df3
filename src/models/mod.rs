// Domain models: samples, envelopes, topic entries, relay records, history contract

mod envelope;
mod history;
mod relay;
mod sample;

pub use envelope::Envelope;
pub use history::{HistoryPoint, HistoryRange, HistoryResponse};
pub use relay::{DeliveryOutcome, RelayRecord, TopicEntry};
pub use sample::SensorSample;
