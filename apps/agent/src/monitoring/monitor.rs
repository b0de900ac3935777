use super::types::{Evaluation, EvaluationError, MonitorIdentity};

/// A periodically evaluated health check
#[async_trait::async_trait]
pub trait Monitor: Send + Sync {
    fn identity(&self) -> &MonitorIdentity;

    /// Evaluate the monitor once. Degraded conditions are reported as a
    /// successful [`Evaluation`] with a down status.
    async fn evaluate(&self) -> Result<Evaluation, EvaluationError>;
}

/// Lets the host know that the agent process itself is alive
pub struct AliveMonitor {
    identity: MonitorIdentity,
}

impl AliveMonitor {
    pub fn new(identity: MonitorIdentity) -> Self {
        Self { identity }
    }
}

#[async_trait::async_trait]
impl Monitor for AliveMonitor {
    fn identity(&self) -> &MonitorIdentity {
        &self.identity
    }

    async fn evaluate(&self) -> Result<Evaluation, EvaluationError> {
        Ok(Evaluation::up(0))
    }
}
