// Config loading and validation tests

use waterlevel::config::AppConfig;

const VALID_CONFIG: &str = r#"
[device]
device_id = 1
candidate_ports = ["/dev/ttyUSB0", "/dev/ttyUSB1"]
baud_rate = 9600
read_timeout_ms = 2000

[sampling]
poll_interval_secs = 60
flush_interval_secs = 300
stats_log_interval_secs = 3600

[topic]
path = "data/topic.db"
name = "sensor-data"
publish_timeout_ms = 5000
retention_days = 7

[relay]
url = "https://ingest.example.com/"
group_id = "aws-forwarder"
request_timeout_ms = 10000
poll_interval_ms = 1000

[server]
port = 8081
host = "0.0.0.0"
"#;

const MINIMAL_CONFIG: &str = r#"
[device]
candidate_ports = ["/dev/ttyUSB0"]

[topic]
path = "data/topic.db"

[relay]
url = "http://localhost:9000/ingest"
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.device.device_id, 1);
    assert_eq!(
        config.device.candidate_ports,
        vec!["/dev/ttyUSB0", "/dev/ttyUSB1"]
    );
    assert_eq!(config.sampling.poll_interval_secs, 60);
    assert_eq!(config.sampling.flush_interval_secs, 300);
    assert_eq!(config.topic.name, "sensor-data");
    assert_eq!(config.relay.url, "https://ingest.example.com/");
    assert_eq!(config.server.port, 8081);
}

#[test]
fn test_config_defaults_when_omitted() {
    let config = AppConfig::load_from_str(MINIMAL_CONFIG).expect("minimal config");
    assert_eq!(config.device.device_id, 1);
    assert_eq!(config.device.baud_rate, 9600);
    assert_eq!(config.sampling.poll_interval_secs, 60);
    assert_eq!(config.sampling.flush_interval_secs, 300);
    assert_eq!(config.topic.name, "sensor-data");
    assert_eq!(config.topic.retention_days, 7);
    assert!(config.topic.vacuum_schedule.is_none());
    assert_eq!(config.relay.group_id, "aws-forwarder");
    assert_eq!(config.server.port, 8081);
}

#[test]
fn test_config_validation_rejects_empty_port_list() {
    let bad = VALID_CONFIG.replace(
        r#"candidate_ports = ["/dev/ttyUSB0", "/dev/ttyUSB1"]"#,
        "candidate_ports = []",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("candidate_ports"));
}

#[test]
fn test_config_validation_rejects_blank_port() {
    let bad = VALID_CONFIG.replace(
        r#"candidate_ports = ["/dev/ttyUSB0", "/dev/ttyUSB1"]"#,
        r#"candidate_ports = ["/dev/ttyUSB0", " "]"#,
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("candidate_ports"));
}

#[test]
fn test_config_validation_rejects_poll_interval_zero() {
    let bad = VALID_CONFIG.replace("poll_interval_secs = 60", "poll_interval_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("poll_interval_secs"));
}

#[test]
fn test_config_validation_rejects_flush_interval_zero() {
    let bad = VALID_CONFIG.replace("flush_interval_secs = 300", "flush_interval_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("flush_interval_secs"));
}

#[test]
fn test_config_validation_rejects_read_timeout_zero() {
    let bad = VALID_CONFIG.replace("read_timeout_ms = 2000", "read_timeout_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("read_timeout_ms"));
}

#[test]
fn test_config_validation_rejects_empty_topic_name() {
    let bad = VALID_CONFIG.replace(r#"name = "sensor-data""#, r#"name = """#);
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("topic.name"));
}

#[test]
fn test_config_validation_rejects_empty_topic_path() {
    let bad = VALID_CONFIG.replace(r#"path = "data/topic.db""#, r#"path = """#);
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("topic.path"));
}

#[test]
fn test_config_validation_rejects_publish_timeout_zero() {
    let bad = VALID_CONFIG.replace("publish_timeout_ms = 5000", "publish_timeout_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("publish_timeout_ms"));
}

#[test]
fn test_config_validation_rejects_empty_relay_url() {
    let bad = VALID_CONFIG.replace(r#"url = "https://ingest.example.com/""#, r#"url = """#);
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("relay.url"));
}

#[test]
fn test_config_validation_rejects_empty_group_id() {
    let bad = VALID_CONFIG.replace(r#"group_id = "aws-forwarder""#, r#"group_id = """#);
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("group_id"));
}

#[test]
fn test_config_validation_rejects_invalid_vacuum_schedule() {
    let bad = VALID_CONFIG.replace(
        "retention_days = 7",
        "retention_days = 7\nvacuum_schedule = \"not a cron\"",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("vacuum_schedule"));
}

#[test]
fn test_config_accepts_cron_vacuum_schedule() {
    let good = VALID_CONFIG.replace(
        "retention_days = 7",
        "retention_days = 7\nvacuum_schedule = \"0 0 3 * * *\"",
    );
    let config = AppConfig::load_from_str(&good).expect("valid cron");
    assert_eq!(config.topic.vacuum_schedule.as_deref(), Some("0 0 3 * * *"));
}

#[test]
fn test_config_validation_rejects_invalid_port() {
    let bad = VALID_CONFIG.replace("port = 8081", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn test_config_validation_rejects_invalid_toml() {
    let err = AppConfig::load_from_str("not valid toml [[[").unwrap_err();
    assert!(!err.to_string().is_empty());
}

#[test]
fn test_config_load_from_file_via_env() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, VALID_CONFIG).unwrap();
    unsafe { std::env::set_var("CONFIG_FILE", path.to_str().unwrap()) };
    let result = AppConfig::load();
    unsafe { std::env::remove_var("CONFIG_FILE") };
    let config = result.expect("load from CONFIG_FILE");
    assert_eq!(config.topic.path, "data/topic.db");
    assert_eq!(config.device.candidate_ports.len(), 2);
}
