use crate::domain::services::SelectorKind;
use crate::domain::value_objects::NodeAddress;
use std::time::Duration;

/// Configuration failure. Always fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be positive")]
    NonPositive(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("unknown selector {0:?} (expected fixed-primary or deterministic-key)")]
    UnknownSelector(String),
    #[error("channel needs at least one server")]
    MissingServers,
}

/// Sizing of one channel's queue and send loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub capacity: usize,
    pub batch_size: usize,
    pub drain_interval: Duration,
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::NonPositive("queue capacity"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::NonPositive("batch size"));
        }
        if self.drain_interval.is_zero() {
            return Err(ConfigError::NonPositive("drain interval"));
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 600,
            batch_size: 600,
            drain_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Node identity
    pub node_id: String,
    pub listen_addr: String,
    pub debug: bool,

    // Cluster membership
    pub peers: Vec<NodeAddress>,
    pub selector: SelectorKind,

    // Outbound channels
    pub queue: QueueConfig,
    pub reconnect_interval: Duration,
    pub upstream_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: "relay-1".to_string(),
            listen_addr: "0.0.0.0:11800".to_string(),
            debug: false,
            peers: Vec::new(),
            selector: SelectorKind::default(),
            queue: QueueConfig::default(),
            reconnect_interval: Duration::from_secs(30),
            upstream_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.queue.validate()?;
        if self.reconnect_interval.is_zero() {
            return Err(ConfigError::NonPositive("reconnect interval"));
        }
        if self.upstream_timeout.is_zero() {
            return Err(ConfigError::NonPositive("upstream timeout"));
        }
        Ok(())
    }
}

/// Load configuration from the process environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Load configuration through `lookup`, falling back to defaults for unset keys.
pub fn load_config_from<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let node_id = lookup("RELAY_NODE_ID").unwrap_or(defaults.node_id);

    let listen_addr = lookup("RELAY_LISTEN_ADDR").unwrap_or(defaults.listen_addr);

    let peers = lookup("RELAY_PEERS")
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(NodeAddress::from)
                .collect()
        })
        .unwrap_or_default();

    let selector = match lookup("RELAY_SELECTOR") {
        Some(v) => SelectorKind::parse(&v).ok_or(ConfigError::UnknownSelector(v))?,
        None => defaults.selector,
    };

    let capacity = positive(&lookup, "RELAY_QUEUE_CAPACITY", defaults.queue.capacity as u64)?;
    let batch_size = positive(&lookup, "RELAY_BATCH_SIZE", defaults.queue.batch_size as u64)?;
    let drain_interval_ms = positive(&lookup, "RELAY_DRAIN_INTERVAL_MS", 1000)?;
    let reconnect_secs = positive(&lookup, "RELAY_RECONNECT_INTERVAL_SECS", 30)?;
    let timeout_secs = positive(&lookup, "RELAY_UPSTREAM_TIMEOUT_SECS", 30)?;

    let debug = lookup("DEBUG").is_some();

    let config = Config {
        node_id,
        listen_addr,
        debug,
        peers,
        selector,
        queue: QueueConfig {
            capacity: usize::try_from(capacity).unwrap_or(usize::MAX),
            batch_size: usize::try_from(batch_size).unwrap_or(usize::MAX),
            drain_interval: Duration::from_millis(drain_interval_ms),
        },
        reconnect_interval: Duration::from_secs(reconnect_secs),
        upstream_timeout: Duration::from_secs(timeout_secs),
    };
    config.validate()?;
    Ok(config)
}

fn positive<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let value: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.clone(),
    })?;
    if value == 0 {
        return Err(ConfigError::NonPositive(key));
    }
    Ok(value)
}
