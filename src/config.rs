//! Configuration management for kafka-facade
//!
//! This module handles loading, defaulting, and validating client
//! configuration from files and environment variables, and maps the result
//! onto librdkafka properties.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use kafka_facade::config::{Config, OffsetReset};
//!
//! let config = Config::new("g1", "b1:9092,b2:9092", "t1,t2").with_defaults();
//!
//! assert_eq!(config.offsets_initial(), OffsetReset::Oldest);
//! assert_eq!(config.commit_interval(), Duration::from_secs(1));
//! assert_eq!(config.producer_timeout(), Duration::from_secs(5));
//! assert_eq!(config.topic_list().unwrap(), vec!["t1", "t2"]);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Initial offset policy applied when the group has no committed offset.
pub const DEFAULT_OFFSETS_INITIAL: OffsetReset = OffsetReset::Oldest;

/// Offset auto-commit interval applied when left at zero.
pub const DEFAULT_COMMIT_INTERVAL_MS: u64 = 1_000;

/// Producer acknowledgement timeout applied when left at zero.
pub const DEFAULT_PRODUCER_TIMEOUT_MS: u64 = 5_000;

/// Main configuration structure for a [`crate::Client`]
///
/// Holds the consumer group, the broker and topic lists (each
/// comma-separated), and the embedded library-specific options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Consumer group id
    #[serde(default)]
    pub group_id: String,

    /// Broker addresses, multiple servers joined by ','
    #[serde(default)]
    pub servers: String,

    /// Topic names, multiple topics joined by ','
    #[serde(default)]
    pub topics: String,

    /// Library-specific tuning options
    #[serde(default)]
    pub options: ClientOptions,
}

/// Library-specific options embedded in [`Config`]
///
/// Zero values request the defaults applied by [`Config::with_defaults`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Consumer options
    #[serde(default)]
    pub consumer: ConsumerOptions,

    /// Producer options
    #[serde(default)]
    pub producer: ProducerOptions,

    /// Client id reported to the brokers
    #[serde(default)]
    pub client_id: Option<String>,

    /// Transport security settings
    #[serde(default)]
    pub security: Option<SecurityConfig>,

    /// Raw librdkafka properties, applied after every other setting
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// Consumer options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerOptions {
    /// Forward consumer errors to the drain task
    #[serde(default)]
    pub return_errors: bool,

    /// Forward rebalance notifications to the drain task
    #[serde(default = "default_true")]
    pub return_notifications: bool,

    /// Initial offset policy (unset means oldest)
    #[serde(default)]
    pub offsets_initial: Option<OffsetReset>,

    /// Offset commit interval in milliseconds (0 means default)
    #[serde(default)]
    pub commit_interval_ms: u64,

    /// Group session timeout in milliseconds (0 leaves the library default)
    #[serde(default)]
    pub session_timeout_ms: u64,
}

/// Producer options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerOptions {
    /// Forward delivery errors to the drain task
    #[serde(default)]
    pub return_errors: bool,

    /// Forward delivery successes to the drain task
    #[serde(default)]
    pub return_successes: bool,

    /// Acknowledgement timeout in milliseconds (0 means default)
    #[serde(default)]
    pub timeout_ms: u64,

    /// Required acknowledgements (unset leaves the library default)
    #[serde(default)]
    pub acks: Option<RequiredAcks>,
}

/// Where a consumer group starts when it has no committed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    /// Start from the oldest retained message
    Oldest,
    /// Start from the next produced message
    Newest,
}

impl OffsetReset {
    /// Returns the librdkafka `auto.offset.reset` value for this policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oldest => "earliest",
            Self::Newest => "latest",
        }
    }
}

impl std::str::FromStr for OffsetReset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "oldest" | "earliest" => Ok(Self::Oldest),
            "newest" | "latest" => Ok(Self::Newest),
            _ => Err(ConfigError::InvalidOffsetReset(s.to_string())),
        }
    }
}

/// Broker acknowledgements required before a send counts as delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredAcks {
    /// Do not wait for any acknowledgement
    NoResponse,
    /// Wait for the partition leader only
    WaitForLocal,
    /// Wait for all in-sync replicas
    WaitForAll,
}

impl RequiredAcks {
    /// Returns the librdkafka `acks` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoResponse => "0",
            Self::WaitForLocal => "1",
            Self::WaitForAll => "all",
        }
    }
}

/// Security protocol for broker connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityProtocol {
    /// No encryption or authentication.
    #[default]
    Plaintext,
    /// TLS encryption without SASL.
    Ssl,
    /// SASL authentication without TLS.
    SaslPlaintext,
    /// SASL authentication with TLS encryption.
    SaslSsl,
}

impl SecurityProtocol {
    /// Returns the librdkafka `security.protocol` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plaintext => "PLAINTEXT",
            Self::Ssl => "SSL",
            Self::SaslPlaintext => "SASL_PLAINTEXT",
            Self::SaslSsl => "SASL_SSL",
        }
    }
}

impl std::str::FromStr for SecurityProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PLAINTEXT" => Ok(Self::Plaintext),
            "SSL" => Ok(Self::Ssl),
            "SASL_PLAINTEXT" => Ok(Self::SaslPlaintext),
            "SASL_SSL" => Ok(Self::SaslSsl),
            _ => Err(ConfigError::InvalidSecurityProtocol(s.to_string())),
        }
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaslMechanism {
    /// PLAIN mechanism (username/password in clear text).
    #[serde(rename = "PLAIN")]
    Plain,
    /// SCRAM-SHA-256 mechanism.
    #[default]
    #[serde(rename = "SCRAM-SHA-256")]
    ScramSha256,
    /// SCRAM-SHA-512 mechanism.
    #[serde(rename = "SCRAM-SHA-512")]
    ScramSha512,
}

impl SaslMechanism {
    /// Returns the librdkafka `sasl.mechanism` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::ScramSha512 => "SCRAM-SHA-512",
        }
    }
}

impl std::str::FromStr for SaslMechanism {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PLAIN" => Ok(Self::Plain),
            "SCRAM-SHA-256" => Ok(Self::ScramSha256),
            "SCRAM-SHA-512" => Ok(Self::ScramSha512),
            _ => Err(ConfigError::InvalidSaslMechanism(s.to_string())),
        }
    }
}

/// Transport security settings.
///
/// The `Debug` output redacts the SASL password.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Security protocol
    #[serde(default)]
    pub protocol: SecurityProtocol,

    /// SASL mechanism, used with the SASL protocols
    #[serde(default)]
    pub sasl_mechanism: SaslMechanism,

    /// SASL username
    #[serde(default)]
    pub sasl_username: Option<String>,

    /// SASL password (prefer env var KAFKA_FACADE_SASL_PASSWORD)
    #[serde(default)]
    pub sasl_password: Option<String>,

    /// Path to CA certificate file
    #[serde(default)]
    pub ssl_ca_location: Option<String>,

    /// Path to client certificate file (for mTLS)
    #[serde(default)]
    pub ssl_certificate_location: Option<String>,

    /// Path to client key file (for mTLS)
    #[serde(default)]
    pub ssl_key_location: Option<String>,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("protocol", &self.protocol)
            .field("sasl_mechanism", &self.sasl_mechanism)
            .field("sasl_username", &self.sasl_username)
            .field(
                "sasl_password",
                &self.sasl_password.as_ref().map(|_| "<redacted>"),
            )
            .field("ssl_ca_location", &self.ssl_ca_location)
            .field("ssl_certificate_location", &self.ssl_certificate_location)
            .field("ssl_key_location", &self.ssl_key_location)
            .finish()
    }
}

fn default_true() -> bool {
    true
}

/// Whole milliseconds in `duration`. A non-zero duration shorter than one
/// millisecond counts as one, since zero means unset.
fn whole_millis(duration: Duration) -> u64 {
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    if millis == 0 && !duration.is_zero() {
        1
    } else {
        millis
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            consumer: ConsumerOptions::default(),
            producer: ProducerOptions::default(),
            client_id: None,
            security: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            return_errors: false,
            return_notifications: default_true(),
            offsets_initial: None,
            commit_interval_ms: 0,
            session_timeout_ms: 0,
        }
    }
}

impl Default for ProducerOptions {
    fn default() -> Self {
        Self {
            return_errors: false,
            return_successes: false,
            timeout_ms: 0,
            acks: None,
        }
    }
}

impl Config {
    /// Creates a configuration with the three connection strings set and
    /// every option left at its zero value.
    ///
    /// # Arguments
    ///
    /// * `group_id` - Consumer group id
    /// * `servers` - Comma-separated broker addresses
    /// * `topics` - Comma-separated topic names
    pub fn new(group_id: &str, servers: &str, topics: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            servers: servers.to_string(),
            topics: topics.to_string(),
            options: ClientOptions::default(),
        }
    }

    /// Applies the required defaults and returns the resolved configuration.
    ///
    /// Error reporting is always enabled for consumer and producer, and
    /// success reporting for the producer. The initial offset policy, commit
    /// interval and producer timeout are filled in only when left unset;
    /// explicit values are preserved.
    pub fn with_defaults(mut self) -> Self {
        let consumer = &mut self.options.consumer;
        consumer.return_errors = true;
        if consumer.offsets_initial.is_none() {
            consumer.offsets_initial = Some(DEFAULT_OFFSETS_INITIAL);
        }
        if consumer.commit_interval_ms == 0 {
            consumer.commit_interval_ms = DEFAULT_COMMIT_INTERVAL_MS;
        }

        let producer = &mut self.options.producer;
        producer.return_errors = true;
        producer.return_successes = true;
        if producer.timeout_ms == 0 {
            producer.timeout_ms = DEFAULT_PRODUCER_TIMEOUT_MS;
        }

        self
    }

    /// Sets the initial offset policy.
    pub fn with_offsets_initial(mut self, policy: OffsetReset) -> Self {
        self.options.consumer.offsets_initial = Some(policy);
        self
    }

    /// Sets the offset commit interval.
    pub fn with_commit_interval(mut self, interval: Duration) -> Self {
        self.options.consumer.commit_interval_ms = whole_millis(interval);
        self
    }

    /// Sets the producer acknowledgement timeout.
    pub fn with_producer_timeout(mut self, timeout: Duration) -> Self {
        self.options.producer.timeout_ms = whole_millis(timeout);
        self
    }

    /// Sets the client id reported to the brokers.
    pub fn with_client_id(mut self, client_id: &str) -> Self {
        self.options.client_id = Some(client_id.to_string());
        self
    }

    /// Configures SASL authentication over TLS.
    pub fn with_sasl(mut self, mechanism: SaslMechanism, username: &str, password: &str) -> Self {
        let security = self.options.security.get_or_insert_with(Default::default);
        security.protocol = SecurityProtocol::SaslSsl;
        security.sasl_mechanism = mechanism;
        security.sasl_username = Some(username.to_string());
        security.sasl_password = Some(password.to_string());
        self
    }

    /// Configures TLS with a CA certificate.
    ///
    /// Upgrades a plaintext protocol to SSL; SASL protocols keep SASL.
    pub fn with_ssl(mut self, ca_location: &str) -> Self {
        let security = self.options.security.get_or_insert_with(Default::default);
        security.protocol = match security.protocol {
            SecurityProtocol::Plaintext | SecurityProtocol::Ssl => SecurityProtocol::Ssl,
            SecurityProtocol::SaslPlaintext | SecurityProtocol::SaslSsl => {
                SecurityProtocol::SaslSsl
            }
        };
        security.ssl_ca_location = Some(ca_location.to_string());
        self
    }

    /// Sets a raw librdkafka property.
    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.options
            .extra
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Resolved initial offset policy.
    pub fn offsets_initial(&self) -> OffsetReset {
        self.options
            .consumer
            .offsets_initial
            .unwrap_or(DEFAULT_OFFSETS_INITIAL)
    }

    /// Resolved offset commit interval.
    pub fn commit_interval(&self) -> Duration {
        Duration::from_millis(non_zero_or(
            self.options.consumer.commit_interval_ms,
            DEFAULT_COMMIT_INTERVAL_MS,
        ))
    }

    /// Resolved producer acknowledgement timeout.
    pub fn producer_timeout(&self) -> Duration {
        Duration::from_millis(non_zero_or(
            self.options.producer.timeout_ms,
            DEFAULT_PRODUCER_TIMEOUT_MS,
        ))
    }

    /// Broker addresses split on ','.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyList` if no non-empty entry remains.
    pub fn broker_list(&self) -> Result<Vec<String>, ConfigError> {
        split_list(&self.servers, "broker")
    }

    /// Topic names split on ','.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyList` if no non-empty entry remains.
    pub fn topic_list(&self) -> Result<Vec<String>, ConfigError> {
        split_list(&self.topics, "topic")
    }

    /// librdkafka properties for a consumer-group session.
    ///
    /// Offsets are stored explicitly after each received message and
    /// committed by the library at the configured interval.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyList` if the broker list is empty.
    pub fn consumer_properties(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let mut settings = vec![
            ("bootstrap.servers".to_string(), self.broker_list()?.join(",")),
            ("group.id".to_string(), self.group_id.clone()),
            (
                "auto.offset.reset".to_string(),
                self.offsets_initial().as_str().to_string(),
            ),
            ("enable.auto.commit".to_string(), "true".to_string()),
            (
                "auto.commit.interval.ms".to_string(),
                self.commit_interval().as_millis().to_string(),
            ),
            ("enable.auto.offset.store".to_string(), "false".to_string()),
        ];

        if self.options.consumer.session_timeout_ms > 0 {
            settings.push((
                "session.timeout.ms".to_string(),
                self.options.consumer.session_timeout_ms.to_string(),
            ));
        }

        self.push_common_properties(&mut settings);
        Ok(settings)
    }

    /// librdkafka properties for a producer session.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyList` if the broker list is empty.
    pub fn producer_properties(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let timeout = self.producer_timeout().as_millis().to_string();
        let mut settings = vec![
            ("bootstrap.servers".to_string(), self.broker_list()?.join(",")),
            ("message.timeout.ms".to_string(), timeout.clone()),
            ("request.timeout.ms".to_string(), timeout),
        ];

        if let Some(acks) = self.options.producer.acks {
            settings.push(("acks".to_string(), acks.as_str().to_string()));
        }

        self.push_common_properties(&mut settings);
        Ok(settings)
    }

    fn push_common_properties(&self, settings: &mut Vec<(String, String)>) {
        if let Some(client_id) = &self.options.client_id {
            settings.push(("client.id".to_string(), client_id.clone()));
        }

        if let Some(security) = &self.options.security {
            settings.push((
                "security.protocol".to_string(),
                security.protocol.as_str().to_string(),
            ));

            if matches!(
                security.protocol,
                SecurityProtocol::SaslPlaintext | SecurityProtocol::SaslSsl
            ) {
                settings.push((
                    "sasl.mechanism".to_string(),
                    security.sasl_mechanism.as_str().to_string(),
                ));
                if let Some(username) = &security.sasl_username {
                    settings.push(("sasl.username".to_string(), username.clone()));
                }
                if let Some(password) = &security.sasl_password {
                    settings.push(("sasl.password".to_string(), password.clone()));
                }
            }

            if let Some(ca) = &security.ssl_ca_location {
                settings.push(("ssl.ca.location".to_string(), ca.clone()));
            }
            if let Some(cert) = &security.ssl_certificate_location {
                settings.push(("ssl.certificate.location".to_string(), cert.clone()));
            }
            if let Some(key) = &security.ssl_key_location {
                settings.push(("ssl.key.location".to_string(), key.clone()));
            }
        }

        for (key, value) in &self.options.extra {
            settings.push((key.clone(), value.clone()));
        }
    }

    /// Load configuration from a YAML file and environment variables.
    ///
    /// A missing file is not an error: the configuration starts from
    /// defaults and is then overridden from the environment. Defaults are
    /// not applied here; [`crate::Client::new`] does that.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` or `ConfigError::Parse` if the file exists
    /// but cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_vars();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `KAFKA_FACADE_*` environment overrides.
    ///
    /// Invalid values are logged and ignored.
    pub fn apply_env_vars(&mut self) {
        if let Ok(servers) = std::env::var("KAFKA_FACADE_SERVERS") {
            tracing::debug!(servers = %servers, "Env override: KAFKA_FACADE_SERVERS");
            self.servers = servers;
        }

        if let Ok(topics) = std::env::var("KAFKA_FACADE_TOPICS") {
            tracing::debug!(topics = %topics, "Env override: KAFKA_FACADE_TOPICS");
            self.topics = topics;
        }

        if let Ok(group_id) = std::env::var("KAFKA_FACADE_GROUP_ID") {
            tracing::debug!(group_id = %group_id, "Env override: KAFKA_FACADE_GROUP_ID");
            self.group_id = group_id;
        }

        if let Ok(client_id) = std::env::var("KAFKA_FACADE_CLIENT_ID") {
            self.options.client_id = Some(client_id);
        }

        if let Ok(policy) = std::env::var("KAFKA_FACADE_OFFSET_RESET") {
            match policy.parse::<OffsetReset>() {
                Ok(v) => self.options.consumer.offsets_initial = Some(v),
                Err(e) => tracing::warn!("Ignoring KAFKA_FACADE_OFFSET_RESET: {}", e),
            }
        }

        if let Ok(interval) = std::env::var("KAFKA_FACADE_COMMIT_INTERVAL_MS") {
            match interval.parse::<u64>() {
                Ok(v) => self.options.consumer.commit_interval_ms = v,
                Err(_) => tracing::warn!("Invalid KAFKA_FACADE_COMMIT_INTERVAL_MS: {}", interval),
            }
        }

        if let Ok(timeout) = std::env::var("KAFKA_FACADE_PRODUCER_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(v) => self.options.producer.timeout_ms = v,
                Err(_) => tracing::warn!("Invalid KAFKA_FACADE_PRODUCER_TIMEOUT_MS: {}", timeout),
            }
        }

        if let Ok(protocol) = std::env::var("KAFKA_FACADE_SECURITY_PROTOCOL") {
            match protocol.parse::<SecurityProtocol>() {
                Ok(v) => {
                    self.options
                        .security
                        .get_or_insert_with(Default::default)
                        .protocol = v
                }
                Err(e) => tracing::warn!("Ignoring KAFKA_FACADE_SECURITY_PROTOCOL: {}", e),
            }
        }

        if let Ok(mechanism) = std::env::var("KAFKA_FACADE_SASL_MECHANISM") {
            match mechanism.parse::<SaslMechanism>() {
                Ok(v) => {
                    self.options
                        .security
                        .get_or_insert_with(Default::default)
                        .sasl_mechanism = v
                }
                Err(e) => tracing::warn!("Ignoring KAFKA_FACADE_SASL_MECHANISM: {}", e),
            }
        }

        if let Ok(username) = std::env::var("KAFKA_FACADE_SASL_USERNAME") {
            self.options
                .security
                .get_or_insert_with(Default::default)
                .sasl_username = Some(username);
        }

        if let Ok(password) = std::env::var("KAFKA_FACADE_SASL_PASSWORD") {
            self.options
                .security
                .get_or_insert_with(Default::default)
                .sasl_password = Some(password);
        }

        if let Ok(ca) = std::env::var("KAFKA_FACADE_SSL_CA_LOCATION") {
            self.options
                .security
                .get_or_insert_with(Default::default)
                .ssl_ca_location = Some(ca);
        }
    }
}

fn non_zero_or(value: u64, default: u64) -> u64 {
    if value == 0 {
        default
    } else {
        value
    }
}

fn split_list(raw: &str, what: &'static str) -> Result<Vec<String>, ConfigError> {
    let entries: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if entries.is_empty() {
        return Err(ConfigError::EmptyList(what));
    }
    Ok(entries)
}
