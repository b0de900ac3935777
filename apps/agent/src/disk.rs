use std::io;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiskError {
    #[error("failed to query disk space of {path}: {source}")]
    Query {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Space of a file system in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSpace {
    /// Space available to an unprivileged user, reserved blocks excluded
    pub available: u64,
    pub total: u64,
}

impl DiskSpace {
    /// Percentage of used space, `None` when it cannot be computed
    pub fn used_percent(&self) -> Option<f64> {
        let share = self.available as f64 / self.total as f64;
        let used = 100.0 - share * 100.0;
        used.is_finite().then_some(used)
    }
}

/// Source of disk space numbers for a path or drive
pub trait DiskQuery: Send + Sync {
    fn space(&self, file_system: &str) -> Result<DiskSpace, DiskError>;
}

/// Queries the operating system (`statvfs` / `GetDiskFreeSpaceEx`)
pub struct SystemDiskQuery;

impl DiskQuery for SystemDiskQuery {
    fn space(&self, file_system: &str) -> Result<DiskSpace, DiskError> {
        let path = Path::new(file_system);
        let query_err = |source| DiskError::Query { path: file_system.to_string(), source };

        let available = fs2::available_space(path).map_err(query_err)?;
        let total = fs2::total_space(path).map_err(query_err)?;

        Ok(DiskSpace { available, total })
    }
}
