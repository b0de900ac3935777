use std::{env, fmt, fs, io, path};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    ReadFailed {
        path: path::PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ParseFailed {
        path: path::PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("No config path given and neither $XDG_CONFIG_HOME nor $HOME is set")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub hosts: Vec<HostEntry>,
    #[serde(default)]
    pub monitors: Vec<MonitorEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSettings {
    /// Seconds before a status push request is abandoned
    #[serde(default = "default_push_timeout")]
    pub push_timeout: u64,
}

fn default_push_timeout() -> u64 {
    10
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self { push_timeout: default_push_timeout() }
    }
}

/// Remote aggregator receiving status pushes
#[derive(Debug, Clone, Deserialize)]
pub struct HostEntry {
    pub name: String,
    pub url: String,
}

/// One configured monitor. Kind specific fields are optional here and checked
/// when the monitor is set up.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MonitorEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub host: String,
    pub key: String,
    /// Seconds between two evaluations
    pub interval: u64,

    // disk_usage
    /// Linux: path as passed to `df`, Windows: drive letter
    pub file_system: String,
    /// Percentage of used space which will start triggering down status
    pub down_threshold: u8,

    // email_ping
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_force_tls: bool,
    pub smtp_sender_address: String,
    pub smtp_recipient_address: String,
    pub smtp_username: String,
    pub smtp_password: String,

    pub imap_host: String,
    pub imap_port: u16,
    pub imap_force_tls: bool,
    pub imap_username: String,
    pub imap_password: String,

    pub message_subject: String,
    pub message_body: String,
    pub response_subject: String,

    /// Seconds to wait for the reply email
    pub timeout: u64,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uppe/agent.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("uppe/agent.toml"))
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "<empty>" } else { "<redacted>" }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_title_2 = write_title_indented(2);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Agent Configuration State:")?;
        write_1(f, "Node Name", &self.node_name)?;
        write_1(f, "Push Timeout", &format_args!("{}s", self.agent.push_timeout))?;

        write_title_1(f, "Hosts")?;
        for host in &self.hosts {
            write_1(f, &host.name, &host.url)?;
        }

        write_title_1(f, "Monitors")?;
        for monitor in &self.monitors {
            write_title_2(f, &format!("{} ({})", monitor.name, monitor.kind))?;
            write_2(f, "Host", &monitor.host)?;
            write_2(f, "Key", &redact(&monitor.key))?;
            write_2(f, "Interval", &format_args!("{}s", monitor.interval))?;
            match monitor.kind.as_str() {
                "disk_usage" => {
                    write_2(f, "File System", &monitor.file_system)?;
                    write_2(f, "Down Threshold", &format_args!("{}%", monitor.down_threshold))?;
                }
                "email_ping" => {
                    let smtp = format!("{}:{}", monitor.smtp_host, monitor.smtp_port);
                    write_2(f, "SMTP", &smtp)?;
                    write_2(f, "SMTP Password", &redact(&monitor.smtp_password))?;
                    let imap = format!("{}:{}", monitor.imap_host, monitor.imap_port);
                    write_2(f, "IMAP", &imap)?;
                    write_2(f, "IMAP Password", &redact(&monitor.imap_password))?;
                    write_2(f, "Timeout", &format_args!("{}s", monitor.timeout))?;
                }
                _ => {}
            }
        }

        Ok(())
    }
}

impl Config {
    /// Load the agent configuration from a file
    ///
    /// Reads `optional_path` (forced to a `.toml` extension) or the default
    /// location under `~/.config/uppe/agent.toml`.
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(
        optional_path: Option<impl AsRef<path::Path>>,
    ) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let raw_string = fs::read_to_string(&config_path)
            .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;

        toml::from_str(raw_string.as_str())
            .map_err(|source| ConfigError::ParseFailed { path: config_path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
node_name = "web-01"

[[hosts]]
name = "kuma"
url = "https://status.example.com/api/push"

[[monitors]]
name = "agent"
type = "alive"
host = "kuma"
key = "alive-key"
interval = 60

[[monitors]]
name = "root disk"
type = "disk_usage"
host = "kuma"
key = "disk-key"
interval = 300
file_system = "/"
down_threshold = 90
"#;

    #[test]
    fn test_parse_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        fs::write(&path, SAMPLE).unwrap();

        let cfg = Config::from_config(Some(&path)).unwrap();
        assert_eq!(cfg.node_name, "web-01");
        assert_eq!(cfg.agent.push_timeout, 10);
        assert_eq!(cfg.hosts.len(), 1);
        assert_eq!(cfg.monitors.len(), 2);
        assert_eq!(cfg.monitors[0].kind, "alive");
        assert_eq!(cfg.monitors[1].file_system, "/");
        assert_eq!(cfg.monitors[1].down_threshold, 90);
        assert!(!cfg.monitors[1].smtp_force_tls);
    }

    #[test]
    fn test_extension_is_forced_to_toml() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("agent.toml"), SAMPLE).unwrap();

        let cfg = Config::from_config(Some(dir.path().join("agent.yml"))).unwrap();
        assert_eq!(cfg.monitors.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = Config::from_config(Some(dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        fs::write(&path, "monitors = 5").unwrap();

        let err = Config::from_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed { .. }));
    }

    #[test]
    fn test_display_redacts_secrets() {
        let mut cfg: Config = toml::from_str(SAMPLE).unwrap();
        cfg.monitors.push(MonitorEntry {
            name: "mail".into(),
            kind: "email_ping".into(),
            key: "mail-key".into(),
            imap_password: "hunter2".into(),
            ..Default::default()
        });

        let printed = cfg.to_string();
        assert!(printed.contains("web-01"));
        assert!(printed.contains("root disk (disk_usage)"));
        assert!(!printed.contains("alive-key"));
        assert!(!printed.contains("hunter2"));
    }
}
