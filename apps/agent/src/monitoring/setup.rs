//! Turns the loaded configuration into monitors, checking everything that
//! can be checked before the first evaluation runs.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use super::disk_usage::DiskUsageMonitor;
use super::email_ping::EmailPingMonitor;
use super::monitor::{AliveMonitor, Monitor};
use super::types::{MonitorIdentity, MonitorKind, UnknownKind};
use crate::config::{Config, HostEntry, MonitorEntry};
use crate::disk::{DiskQuery, SystemDiskQuery};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("No monitors defined")]
    NoMonitors,

    #[error("Missing parameter for monitor {monitor} ({kind}): {parameter}")]
    MissingParameter { monitor: String, kind: String, parameter: &'static str },

    #[error("Monitor {monitor} uses key of monitor {previous}, keys must be unique")]
    DuplicateKey { monitor: String, previous: String },

    #[error("Could not find host {host} of monitor {monitor}")]
    UnknownHost { monitor: String, host: String },

    #[error("Monitor {monitor}: {source}")]
    UnknownKind {
        monitor: String,
        #[source]
        source: UnknownKind,
    },
}

/// Collaborators handed to monitors at construction
pub struct SetupContext {
    pub disk: Arc<dyn DiskQuery>,
}

impl SetupContext {
    pub fn system() -> Self {
        Self { disk: Arc::new(SystemDiskQuery) }
    }
}

fn missing(entry: &MonitorEntry, parameter: &'static str) -> SetupError {
    SetupError::MissingParameter {
        monitor: entry.name.clone(),
        kind: entry.kind.clone(),
        parameter,
    }
}

/// Require a non-zero number
pub(crate) fn require<T>(
    entry: &MonitorEntry,
    parameter: &'static str,
    value: T,
) -> Result<T, SetupError>
where
    T: Default + PartialEq,
{
    if value == T::default() { Err(missing(entry, parameter)) } else { Ok(value) }
}

/// Require a non-blank string
pub(crate) fn require_text(
    entry: &MonitorEntry,
    parameter: &'static str,
    value: &str,
) -> Result<String, SetupError> {
    if value.trim().is_empty() {
        Err(missing(entry, parameter))
    } else {
        Ok(value.to_string())
    }
}

/// Optional string, an empty value is only worth a debug line
pub(crate) fn optional_text(entry: &MonitorEntry, parameter: &'static str, value: &str) -> String {
    if value.is_empty() {
        debug!(
            monitor = %entry.name,
            kind = %entry.kind,
            parameter,
            "Empty parameter for monitor"
        );
    }
    value.to_string()
}

/// Ensure a host URL ends with a trailing `/`
pub fn normalize_host_url(url: &str) -> String {
    if url.ends_with('/') { url.to_string() } else { format!("{url}/") }
}

fn resolve_host(hosts: &[HostEntry], entry: &MonitorEntry) -> Result<String, SetupError> {
    hosts
        .iter()
        .find(|host| host.name == entry.host)
        .filter(|host| !host.url.is_empty())
        .map(|host| normalize_host_url(&host.url))
        .ok_or_else(|| SetupError::UnknownHost {
            monitor: entry.name.clone(),
            host: entry.host.clone(),
        })
}

fn setup_monitor(
    entry: &MonitorEntry,
    host_url: String,
    context: &SetupContext,
) -> Result<Arc<dyn Monitor>, SetupError> {
    let kind: MonitorKind = entry
        .kind
        .parse()
        .map_err(|source| SetupError::UnknownKind { monitor: entry.name.clone(), source })?;

    let identity = MonitorIdentity {
        name: entry.name.clone(),
        kind,
        host_url,
        key: require_text(entry, "key", &entry.key)?,
        interval_seconds: require(entry, "interval", entry.interval)?,
    };

    let monitor: Arc<dyn Monitor> = match kind {
        MonitorKind::Alive => Arc::new(AliveMonitor::new(identity)),
        MonitorKind::DiskUsage => Arc::new(DiskUsageMonitor::new(
            identity,
            require_text(entry, "file_system", &entry.file_system)?,
            require(entry, "down_threshold", entry.down_threshold)?,
            context.disk.clone(),
        )),
        MonitorKind::EmailPing => Arc::new(EmailPingMonitor::setup(identity, entry)?),
    };

    Ok(monitor)
}

/// Build one monitor per configured entry, in config order
///
/// Fails on the first misconfigured entry; nothing has been scheduled at that
/// point.
pub fn setup_monitors(
    config: &Config,
    context: &SetupContext,
) -> Result<Vec<Arc<dyn Monitor>>, SetupError> {
    if config.monitors.is_empty() {
        return Err(SetupError::NoMonitors);
    }

    info!(count = config.monitors.len(), "Setting up monitors");

    let mut keys: HashMap<&str, &str> = HashMap::new();
    let mut monitors = Vec::with_capacity(config.monitors.len());

    for entry in &config.monitors {
        info!(monitor = %entry.name, kind = %entry.kind, "Setting up monitor");

        if let Some(previous) = keys.insert(entry.key.as_str(), entry.name.as_str()) {
            return Err(SetupError::DuplicateKey {
                monitor: entry.name.clone(),
                previous: previous.to_string(),
            });
        }

        let host_url = resolve_host(&config.hosts, entry)?;
        monitors.push(setup_monitor(entry, host_url, context)?);
    }

    Ok(monitors)
}
