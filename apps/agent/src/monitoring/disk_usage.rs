use std::sync::Arc;

use tracing::{debug, error};

use super::monitor::Monitor;
use super::types::{Evaluation, EvaluationError, MonitorIdentity};
use crate::disk::DiskQuery;

/// Goes down once the used space of a file system reaches a threshold
pub struct DiskUsageMonitor {
    identity: MonitorIdentity,
    /// Linux: path as passed to `df`, Windows: drive letter
    file_system: String,
    /// Percentage of used space which will start triggering down status
    down_threshold: u8,
    disk: Arc<dyn DiskQuery>,
}

impl DiskUsageMonitor {
    pub fn new(
        identity: MonitorIdentity,
        file_system: String,
        down_threshold: u8,
        disk: Arc<dyn DiskQuery>,
    ) -> Self {
        Self { identity, file_system, down_threshold, disk }
    }

    fn check(&self) -> Evaluation {
        debug!(
            monitor = %self.identity.name,
            file_system = %self.file_system,
            down_threshold = self.down_threshold,
            "Getting disk usage"
        );

        let used = match self.disk.space(&self.file_system) {
            Ok(space) => space.used_percent(),
            Err(e) => {
                error!(monitor = %self.identity.name, error = %e, "Error getting disk usage");
                None
            }
        };

        // The operator still gets notified through the host
        let Some(used) = used else {
            return Evaluation::down("Error getting disk usage", 0);
        };

        // Usage is never negative, so truncating after adding a half rounds
        let percentage = (used + 0.5) as u64;

        let eval = if percentage < u64::from(self.down_threshold) {
            Evaluation::up(percentage)
        } else {
            Evaluation::down(format!("Exceeds threshold of {}%", self.down_threshold), percentage)
        };

        debug!(
            monitor = %self.identity.name,
            status = %eval.status,
            percentage,
            message = %eval.message,
            "Got disk usage"
        );

        eval
    }
}

#[async_trait::async_trait]
impl Monitor for DiskUsageMonitor {
    fn identity(&self) -> &MonitorIdentity {
        &self.identity
    }

    async fn evaluate(&self) -> Result<Evaluation, EvaluationError> {
        Ok(self.check())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{DiskError, DiskSpace};
    use crate::monitoring::types::{MonitorKind, MonitorStatus};

    struct FixedDisk(Option<DiskSpace>);

    impl DiskQuery for FixedDisk {
        fn space(&self, file_system: &str) -> Result<DiskSpace, DiskError> {
            self.0.ok_or_else(|| DiskError::Query {
                path: file_system.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        }
    }

    fn monitor(space: Option<DiskSpace>, threshold: u8) -> DiskUsageMonitor {
        DiskUsageMonitor::new(
            MonitorIdentity {
                name: "root disk".into(),
                kind: MonitorKind::DiskUsage,
                host_url: "https://h/".into(),
                key: "disk".into(),
                interval_seconds: 60,
            },
            "/".into(),
            threshold,
            Arc::new(FixedDisk(space)),
        )
    }

    fn space(available: u64, total: u64) -> Option<DiskSpace> {
        Some(DiskSpace { available, total })
    }

    async fn evaluate(space: Option<DiskSpace>, threshold: u8) -> Evaluation {
        monitor(space, threshold).evaluate().await.unwrap()
    }

    #[tokio::test]
    async fn test_below_threshold_is_up() {
        let eval = evaluate(space(50, 200), 80).await;
        assert_eq!(eval.status, MonitorStatus::Up);
        assert_eq!(eval.message, "OK");
        assert_eq!(eval.ping, 75);
    }

    #[tokio::test]
    async fn test_above_threshold_is_down() {
        let eval = evaluate(space(50, 200), 70).await;
        assert_eq!(eval.status, MonitorStatus::Down);
        assert!(eval.message.contains("70"));
        assert_eq!(eval.ping, 75);
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let eval = evaluate(space(50, 200), 75).await;
        assert_eq!(eval.status, MonitorStatus::Down);
    }

    #[tokio::test]
    async fn test_rounds_half_up() {
        // 87.5% used
        let eval = evaluate(space(1, 8), 90).await;
        assert_eq!(eval.ping, 88);

        // 74.4% used
        let eval = evaluate(space(256, 1000), 90).await;
        assert_eq!(eval.ping, 74);
    }

    #[tokio::test]
    async fn test_query_failure_is_down() {
        let eval = evaluate(None, 80).await;
        assert_eq!(eval, Evaluation::down("Error getting disk usage", 0));
    }

    #[tokio::test]
    async fn test_unusable_numbers_are_down() {
        let eval = evaluate(space(0, 0), 80).await;
        assert_eq!(eval, Evaluation::down("Error getting disk usage", 0));
    }
}
