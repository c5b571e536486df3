use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub device: DeviceConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    pub topic: TopicConfig,
    pub relay: RelayConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Constant device_id stamped on every envelope.
    #[serde(default = "default_device_id")]
    pub device_id: i64,
    /// Serial ports tried in order at startup; the first that opens is used.
    pub candidate_ports: Vec<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Upper bound on one poll's drain of the serial buffer.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_device_id() -> i64 {
    1
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_read_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// How often to log pipeline counters at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            flush_interval_secs: default_flush_interval_secs(),
            stats_log_interval_secs: default_stats_log_interval_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_flush_interval_secs() -> u64 {
    300
}

fn default_stats_log_interval_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicConfig {
    /// SQLite file holding the topic log, consumer offsets and relay records.
    pub path: String,
    #[serde(default = "default_topic_name")]
    pub name: String,
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
    /// Entries older than this are pruned whether or not the relay has consumed them.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
    /// Optional cron expression for VACUUM (e.g. "0 0 3 * * *" = 03:00 daily). Uses local time.
    #[serde(default)]
    pub vacuum_schedule: Option<String>,
    /// Run VACUUM every N seconds when vacuum_schedule is not set.
    #[serde(default = "default_vacuum_interval_secs")]
    pub vacuum_interval_secs: u64,
}

fn default_topic_name() -> String {
    "sensor-data".into()
}

fn default_publish_timeout_ms() -> u64 {
    5000
}

fn default_retention_days() -> u32 {
    7
}

fn default_prune_interval_secs() -> u64 {
    3600
}

fn default_vacuum_interval_secs() -> u64 {
    7 * 24 * 3600
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Fixed ingestion endpoint; every topic entry is POSTed here verbatim.
    pub url: String,
    #[serde(default = "default_group_id")]
    pub group_id: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Idle wait between log reads once the relay has caught up.
    #[serde(default = "default_relay_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_group_id() -> String {
    "aws-forwarder".into()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_relay_poll_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            host: "0.0.0.0".into(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.device.candidate_ports.is_empty(),
            "device.candidate_ports must list at least one port"
        );
        anyhow::ensure!(
            self.device.candidate_ports.iter().all(|p| !p.trim().is_empty()),
            "device.candidate_ports must not contain empty entries"
        );
        anyhow::ensure!(
            self.device.baud_rate > 0,
            "device.baud_rate must be > 0, got {}",
            self.device.baud_rate
        );
        anyhow::ensure!(
            self.device.read_timeout_ms > 0,
            "device.read_timeout_ms must be > 0, got {}",
            self.device.read_timeout_ms
        );
        anyhow::ensure!(
            self.sampling.poll_interval_secs > 0,
            "sampling.poll_interval_secs must be > 0, got {}",
            self.sampling.poll_interval_secs
        );
        anyhow::ensure!(
            self.sampling.flush_interval_secs > 0,
            "sampling.flush_interval_secs must be > 0, got {}",
            self.sampling.flush_interval_secs
        );
        anyhow::ensure!(
            self.sampling.stats_log_interval_secs > 0,
            "sampling.stats_log_interval_secs must be > 0, got {}",
            self.sampling.stats_log_interval_secs
        );
        anyhow::ensure!(!self.topic.path.is_empty(), "topic.path must be non-empty");
        anyhow::ensure!(
            !self.topic.name.trim().is_empty(),
            "topic.name must be non-empty"
        );
        anyhow::ensure!(
            self.topic.publish_timeout_ms > 0,
            "topic.publish_timeout_ms must be > 0, got {}",
            self.topic.publish_timeout_ms
        );
        anyhow::ensure!(
            self.topic.retention_days > 0,
            "topic.retention_days must be > 0, got {}",
            self.topic.retention_days
        );
        anyhow::ensure!(
            self.topic.prune_interval_secs > 0,
            "topic.prune_interval_secs must be > 0, got {}",
            self.topic.prune_interval_secs
        );
        if let Some(ref cron_str) = self.topic.vacuum_schedule {
            anyhow::ensure!(
                cron::Schedule::from_str(cron_str).is_ok(),
                "topic.vacuum_schedule is not a valid cron expression: {:?}",
                cron_str
            );
        }
        anyhow::ensure!(
            self.topic.vacuum_interval_secs > 0,
            "topic.vacuum_interval_secs must be > 0, got {}",
            self.topic.vacuum_interval_secs
        );
        anyhow::ensure!(
            self.relay.url.starts_with("http://") || self.relay.url.starts_with("https://"),
            "relay.url must be an http(s) URL, got {:?}",
            self.relay.url
        );
        anyhow::ensure!(
            !self.relay.group_id.trim().is_empty(),
            "relay.group_id must be non-empty"
        );
        anyhow::ensure!(
            self.relay.request_timeout_ms > 0,
            "relay.request_timeout_ms must be > 0, got {}",
            self.relay.request_timeout_ms
        );
        anyhow::ensure!(
            self.relay.poll_interval_ms > 0,
            "relay.poll_interval_ms must be > 0, got {}",
            self.relay.poll_interval_ms
        );
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        Ok(())
    }
}
