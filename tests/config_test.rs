//! Configuration loading from YAML files and the environment.

use std::time::Duration;

use kafka_facade::config::{RequiredAcks, SaslMechanism, SecurityProtocol};
use kafka_facade::{Config, ConfigError, OffsetReset};
use serial_test::serial;

mod common;
use common::temp_config_file;

const FULL_CONFIG: &str = r#"
group_id: billing
servers: "b1:9092, b2:9092"
topics: invoices,refunds
options:
  client_id: billing-worker
  consumer:
    offsets_initial: newest
    commit_interval_ms: 500
    session_timeout_ms: 10000
  producer:
    timeout_ms: 2000
    acks: wait_for_all
  security:
    protocol: SASL_SSL
    sasl_mechanism: SCRAM-SHA-256
    sasl_username: svc
  extra:
    fetch.min.bytes: "1024"
"#;

fn property<'a>(settings: &'a [(String, String)], key: &str) -> Option<&'a str> {
    settings
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[test]
#[serial]
fn test_load_full_yaml() {
    let (_dir, path) = temp_config_file(FULL_CONFIG);

    let config = Config::load(&path).unwrap();

    assert_eq!(config.group_id, "billing");
    assert_eq!(config.broker_list().unwrap(), vec!["b1:9092", "b2:9092"]);
    assert_eq!(config.topic_list().unwrap(), vec!["invoices", "refunds"]);
    assert_eq!(config.offsets_initial(), OffsetReset::Newest);
    assert_eq!(config.commit_interval(), Duration::from_millis(500));
    assert_eq!(config.producer_timeout(), Duration::from_secs(2));
    assert_eq!(config.options.producer.acks, Some(RequiredAcks::WaitForAll));

    let security = config.options.security.as_ref().unwrap();
    assert_eq!(security.protocol, SecurityProtocol::SaslSsl);
    assert_eq!(security.sasl_mechanism, SaslMechanism::ScramSha256);
}

#[test]
#[serial]
fn test_loaded_config_maps_to_consumer_properties() {
    let (_dir, path) = temp_config_file(FULL_CONFIG);
    let config = Config::load(&path).unwrap().with_defaults();

    let settings = config.consumer_properties().unwrap();

    assert_eq!(property(&settings, "bootstrap.servers"), Some("b1:9092,b2:9092"));
    assert_eq!(property(&settings, "group.id"), Some("billing"));
    assert_eq!(property(&settings, "auto.offset.reset"), Some("latest"));
    assert_eq!(property(&settings, "auto.commit.interval.ms"), Some("500"));
    assert_eq!(property(&settings, "session.timeout.ms"), Some("10000"));
    assert_eq!(property(&settings, "client.id"), Some("billing-worker"));
    assert_eq!(property(&settings, "security.protocol"), Some("SASL_SSL"));
    assert_eq!(property(&settings, "sasl.mechanism"), Some("SCRAM-SHA-256"));
    assert_eq!(property(&settings, "fetch.min.bytes"), Some("1024"));
}

#[test]
#[serial]
fn test_loaded_config_maps_to_producer_properties() {
    let (_dir, path) = temp_config_file(FULL_CONFIG);
    let config = Config::load(&path).unwrap().with_defaults();

    let settings = config.producer_properties().unwrap();

    assert_eq!(property(&settings, "message.timeout.ms"), Some("2000"));
    assert_eq!(property(&settings, "acks"), Some("all"));
    assert_eq!(property(&settings, "group.id"), None);
}

#[test]
#[serial]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::TempDir::new().unwrap();

    let config = Config::load(dir.path().join("absent.yaml")).unwrap();

    assert_eq!(config, Config::default());
}

#[test]
#[serial]
fn test_malformed_file_is_parse_error() {
    let (_dir, path) = temp_config_file("group_id: [unterminated\n");

    let result = Config::load(&path);

    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
#[serial]
fn test_env_overrides_file() {
    let (_dir, path) = temp_config_file(FULL_CONFIG);
    unsafe {
        std::env::set_var("KAFKA_FACADE_TOPICS", "audit");
        std::env::set_var("KAFKA_FACADE_PRODUCER_TIMEOUT_MS", "750");
    }

    let config = Config::load(&path);

    unsafe {
        std::env::remove_var("KAFKA_FACADE_TOPICS");
        std::env::remove_var("KAFKA_FACADE_PRODUCER_TIMEOUT_MS");
    }

    let config = config.unwrap();
    assert_eq!(config.topics, "audit");
    assert_eq!(config.producer_timeout(), Duration::from_millis(750));
    assert_eq!(config.group_id, "billing");
}
