use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, warn};

use super::monitor::Monitor;
use super::pusher::StatusReporter;

/// Monitoring scheduler - runs every monitor on its own timer
///
/// Each tick spawns the evaluation and the push as a detached task. The next
/// tick is not delayed by a running evaluation, so an evaluation taking longer
/// than the interval overlaps with the following one.
pub struct MonitoringScheduler {
    reporter: Arc<dyn StatusReporter>,
}

impl MonitoringScheduler {
    /// Create a new monitoring scheduler
    pub fn new(reporter: Arc<dyn StatusReporter>) -> Self {
        Self { reporter }
    }

    /// Schedule a single monitor for periodic evaluation
    pub fn schedule_monitor(&self, monitor: Arc<dyn Monitor>) -> tokio::task::JoinHandle<()> {
        let reporter = self.reporter.clone();

        tokio::spawn(async move {
            let mut timer = interval(Duration::from_secs(monitor.identity().interval_seconds));

            loop {
                timer.tick().await;

                tokio::spawn(run_tick(monitor.clone(), reporter.clone()));
            }
        })
    }

    /// Schedule multiple monitors
    pub fn schedule_monitors(
        &self,
        monitors: Vec<Arc<dyn Monitor>>,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        monitors
            .into_iter()
            .map(|monitor| self.schedule_monitor(monitor))
            .collect()
    }
}

/// Evaluate once and push the result. Failed evaluations push nothing.
async fn run_tick(monitor: Arc<dyn Monitor>, reporter: Arc<dyn StatusReporter>) {
    let identity = monitor.identity();

    let eval = match monitor.evaluate().await {
        Ok(eval) => eval,
        Err(e) => {
            error!(
                monitor = %identity.name,
                kind = %identity.kind,
                error = %e,
                "Monitor evaluation failed"
            );
            return;
        }
    };

    debug!(
        monitor = %identity.name,
        status = %eval.status,
        message = %eval.message,
        ping = eval.ping,
        "Monitor evaluated"
    );

    if let Err(e) = reporter.report(identity, &eval).await {
        warn!(monitor = %identity.name, error = %e, "Failed to push status to host");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::MailError;
    use crate::monitoring::pusher::PushError;
    use crate::monitoring::types::{
        Evaluation, EvaluationError, MonitorIdentity, MonitorKind, MonitorStatus,
    };
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingReporter {
        reports: Mutex<Vec<(String, MonitorStatus)>>,
    }

    impl RecordingReporter {
        fn count_for(&self, name: &str) -> usize {
            self.reports.lock().unwrap().iter().filter(|(n, _)| n == name).count()
        }
    }

    #[async_trait::async_trait]
    impl StatusReporter for RecordingReporter {
        async fn report(
            &self,
            identity: &MonitorIdentity,
            eval: &Evaluation,
        ) -> Result<(), PushError> {
            self.reports.lock().unwrap().push((identity.name.clone(), eval.status));
            Ok(())
        }
    }

    /// Sleeps for `duration` on every evaluation and tracks overlap
    struct SlowMonitor {
        identity: MonitorIdentity,
        duration: Duration,
        fail: bool,
        started: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl SlowMonitor {
        fn new(name: &str, interval_seconds: u64, duration: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                identity: MonitorIdentity {
                    name: name.into(),
                    kind: MonitorKind::Alive,
                    host_url: "https://h/".into(),
                    key: name.into(),
                    interval_seconds,
                },
                duration,
                fail,
                started: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl Monitor for SlowMonitor {
        fn identity(&self) -> &MonitorIdentity {
            &self.identity
        }

        async fn evaluate(&self) -> Result<Evaluation, EvaluationError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(self.duration).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail {
                Err(EvaluationError::Send(MailError::Send("rejected".into())))
            } else {
                Ok(Evaluation::up(0))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_overlap_slow_evaluations() {
        let reporter = Arc::new(RecordingReporter::default());
        let scheduler = MonitoringScheduler::new(reporter.clone());
        let monitor = SlowMonitor::new("slow", 1, Duration::from_millis(2500), false);

        let handle = scheduler.schedule_monitor(monitor.clone());
        tokio::time::sleep(Duration::from_millis(5200)).await;
        handle.abort();

        // Ticks at 0..=5 s, each one running for 2.5 s
        assert_eq!(monitor.started.load(Ordering::SeqCst), 6);
        assert!(monitor.max_in_flight.load(Ordering::SeqCst) >= 2);
        assert_eq!(reporter.count_for("slow"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_evaluation_is_not_pushed() {
        let reporter = Arc::new(RecordingReporter::default());
        let scheduler = MonitoringScheduler::new(reporter.clone());
        let monitor = SlowMonitor::new("broken", 1, Duration::from_millis(10), true);

        let handle = scheduler.schedule_monitor(monitor.clone());
        tokio::time::sleep(Duration::from_millis(3500)).await;
        handle.abort();

        assert_eq!(monitor.started.load(Ordering::SeqCst), 4);
        assert_eq!(reporter.count_for("broken"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitors_run_independently() {
        let reporter = Arc::new(RecordingReporter::default());
        let scheduler = MonitoringScheduler::new(reporter.clone());
        let stuck = SlowMonitor::new("stuck", 1, Duration::from_secs(3600), false);
        let fast = SlowMonitor::new("fast", 2, Duration::ZERO, false);

        let stuck_monitor: Arc<dyn Monitor> = stuck.clone();
        let fast_monitor: Arc<dyn Monitor> = fast.clone();
        let handles = scheduler.schedule_monitors(vec![stuck_monitor, fast_monitor]);
        tokio::time::sleep(Duration::from_millis(6500)).await;
        for handle in handles {
            handle.abort();
        }

        assert_eq!(reporter.count_for("stuck"), 0);
        assert_eq!(reporter.count_for("fast"), 4);
    }
}
