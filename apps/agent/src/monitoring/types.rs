use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::mail::MailError;

/// Status reported to an uptime host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStatus {
    Up,
    Down,
}

impl MonitorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorStatus::Up => "up",
            MonitorStatus::Down => "down",
        }
    }
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind tag of a monitor as written in the config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorKind {
    Alive,
    DiskUsage,
    EmailPing,
}

impl MonitorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorKind::Alive => "alive",
            MonitorKind::DiskUsage => "disk_usage",
            MonitorKind::EmailPing => "email_ping",
        }
    }
}

impl fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown monitor type: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for MonitorKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alive" => Ok(MonitorKind::Alive),
            "disk_usage" => Ok(MonitorKind::DiskUsage),
            "email_ping" => Ok(MonitorKind::EmailPing),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Identity of a monitor, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorIdentity {
    /// User defined name from the config
    pub name: String,
    pub kind: MonitorKind,
    /// Resolved host URL, always ending with a `/`
    pub host_url: String,
    /// Secret path segment of the report channel
    pub key: String,
    /// Seconds between two evaluations
    pub interval_seconds: u64,
}

/// Outcome of a single evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub status: MonitorStatus,
    pub message: String,
    /// Round trip time, or any other number the monitor wants to report
    pub ping: u64,
}

impl Evaluation {
    pub fn up(ping: u64) -> Self {
        Self { status: MonitorStatus::Up, message: "OK".to_string(), ping }
    }

    pub fn down(message: impl Into<String>, ping: u64) -> Self {
        Self { status: MonitorStatus::Down, message: message.into(), ping }
    }
}

/// Failure of an evaluation. The tick is skipped and nothing is pushed.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("error cleaning old responses: {0}")]
    PreClean(#[source] MailError),

    #[error("{0}")]
    Send(#[source] MailError),

    #[error("{0}")]
    Receive(#[source] MailError),

    #[error("evaluation task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        for kind in [MonitorKind::Alive, MonitorKind::DiskUsage, MonitorKind::EmailPing] {
            assert_eq!(kind.as_str().parse::<MonitorKind>().unwrap(), kind);
        }
        assert_eq!("http".parse::<MonitorKind>().unwrap_err(), UnknownKind("http".into()));
    }

    #[test]
    fn test_evaluation_constructors() {
        let up = Evaluation::up(5);
        assert_eq!(up.status, MonitorStatus::Up);
        assert_eq!(up.message, "OK");

        let down = Evaluation::down("broken", 0);
        assert_eq!(down.status.to_string(), "down");
        assert_eq!(down.message, "broken");
    }
}
