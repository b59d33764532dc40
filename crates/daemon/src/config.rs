// Daemon configuration from INFERGATE_* environment variables

use infergate_api_rpc::RpcServerConfig;
use infergate_core::application::constants::DEFAULT_QUEUE;
use infergate_core::application::{LoadBalanceStrategy, SchedulerConfig};
use infergate_core::domain::QueueType;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Queue to create at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub id: String,
    pub queue_type: QueueType,
    pub capacity: usize,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub scheduler: SchedulerConfig,
    pub rpc: RpcServerConfig,
    pub queues: Vec<QueueSpec>,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Numeric and enum values fall back to defaults when unparsable;
    /// a malformed queue list is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut scheduler = SchedulerConfig::default();
        if let Some(v) = parsed(&lookup, "INFERGATE_MAX_WORKERS") {
            scheduler.max_workers = v;
        }
        if let Some(v) = parsed(&lookup, "INFERGATE_QUEUE_CAPACITY") {
            scheduler.default_queue_capacity = v;
        }
        if let Some(secs) = parsed::<u64>(&lookup, "INFERGATE_AUTOSCALE_INTERVAL_SECS") {
            scheduler.autoscale_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = parsed::<u64>(&lookup, "INFERGATE_STALL_TIMEOUT_SECS") {
            scheduler.stall_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(strategy) = parsed::<LoadBalanceStrategy>(&lookup, "INFERGATE_BALANCE_STRATEGY") {
            scheduler.load_balance_strategy = strategy;
        }

        let mut rpc = RpcServerConfig::default();
        if let Some(host) = lookup("INFERGATE_RPC_HOST") {
            rpc.host = host;
        }
        if let Some(port) = parsed(&lookup, "INFERGATE_RPC_PORT") {
            rpc.port = port;
        }

        let queues = parse_queue_specs(
            lookup("INFERGATE_QUEUES").as_deref().unwrap_or(DEFAULT_QUEUE),
            &scheduler,
        )?;

        Ok(Self {
            scheduler,
            rpc,
            queues,
        })
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable setting, using default");
            None
        }
    }
}

/// `name[:type[:capacity]]`, comma-separated
pub fn parse_queue_specs(raw: &str, defaults: &SchedulerConfig) -> Result<Vec<QueueSpec>, String> {
    let mut specs: Vec<QueueSpec> = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let mut parts = entry.split(':').map(str::trim);
        let id = parts.next().unwrap_or_default().to_string();
        if id.is_empty() {
            return Err(format!("queue entry '{}' has no name", entry));
        }

        let queue_type = match parts.next().filter(|p| !p.is_empty()) {
            Some(t) => t
                .parse::<QueueType>()
                .map_err(|e| format!("queue '{}': {}", id, e))?,
            None => defaults.default_queue_type,
        };
        let capacity = match parts.next().filter(|p| !p.is_empty()) {
            Some(c) => c
                .parse::<usize>()
                .ok()
                .filter(|c| *c > 0)
                .ok_or_else(|| format!("queue '{}': invalid capacity '{}'", id, c))?,
            None => defaults.default_queue_capacity,
        };
        if parts.next().is_some() {
            return Err(format!("queue entry '{}' has too many fields", entry));
        }
        if specs.iter().any(|s| s.id == id) {
            return Err(format!("queue '{}' listed twice", id));
        }

        specs.push(QueueSpec {
            id,
            queue_type,
            capacity,
        });
    }

    Ok(specs)
}
