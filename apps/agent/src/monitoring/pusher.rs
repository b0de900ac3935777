use std::time::Duration;

use thiserror::Error;
use tracing::debug;
use url::Url;

use super::types::{Evaluation, MonitorIdentity};

#[derive(Debug, Error)]
pub enum PushError {
    #[error("Invalid push URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Push request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Push rejected with status code: {0}")]
    Status(reqwest::StatusCode),
}

/// Destination of evaluation results
#[async_trait::async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report(&self, identity: &MonitorIdentity, eval: &Evaluation) -> Result<(), PushError>;
}

/// Build `{host_url}{key}?status=..&msg=..&ping=..`
///
/// `host_url` is expected to end with a `/`, see
/// [`normalize_host_url`](super::setup::normalize_host_url).
pub fn push_url(host_url: &str, key: &str, eval: &Evaluation) -> Result<Url, PushError> {
    let mut url = Url::parse(&format!("{host_url}{key}"))?;
    url.query_pairs_mut()
        .append_pair("status", eval.status.as_str())
        .append_pair("msg", &eval.message)
        .append_pair("ping", &eval.ping.to_string());

    Ok(url)
}

/// Pushes monitor states to uptime hosts with plain GET requests
pub struct StatusPusher {
    client: reqwest::Client,
}

impl StatusPusher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl StatusReporter for StatusPusher {
    async fn report(&self, identity: &MonitorIdentity, eval: &Evaluation) -> Result<(), PushError> {
        let url = push_url(&identity.host_url, &identity.key, eval)?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PushError::Status(status));
        }

        debug!(monitor = %identity.name, status = %eval.status, "Pushed status to host");
        Ok(())
    }
}
