//! Email round trip ("ping-pong") monitor.
//!
//! One cycle sends a mail to a relay that answers it, then waits for the
//! answer in an IMAP inbox:
//!
//! 1. compose a subject with a fresh `{UUID}` token
//! 2. delete residual answers matching the expected subject, without waiting
//! 3. send the mail over SMTP
//! 4. poll the inbox once per poll interval until the answer arrives or the
//!    timeout passes, then delete the answer
//!
//! The expected answer subject is `response_subject` with `{ORIG_SUBJ}`
//! replaced by the subject actually sent, which is all the correlation there
//! is between a cycle and its answer.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use super::monitor::Monitor;
use super::setup::{SetupError, optional_text, require, require_text};
use super::types::{Evaluation, EvaluationError, MonitorIdentity};
use crate::config::MonitorEntry;
use crate::mail::{
    ImapInbox, Inbox, MailError, MailSender, OutgoingEmail, ServerSettings, SmtpSender,
};

const UUID_PLACEHOLDER: &str = "{UUID}";
const SUBJECT_PLACEHOLDER: &str = "{ORIG_SUBJ}";
/// Bound on every mail server connect, read and write
const MAIL_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Message templates and timing of a ping-pong cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingPongSettings {
    pub sender_address: String,
    pub recipient_address: String,
    /// May contain `{UUID}`
    pub message_subject: String,
    pub message_body: String,
    /// May contain `{ORIG_SUBJ}`
    pub response_subject: String,
    /// Longest wait for the answer, measured from the start of the wait
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl PingPongSettings {
    fn compose(&self) -> OutgoingEmail {
        let token = Uuid::new_v4().to_string();
        let subject = self.message_subject.replace(UUID_PLACEHOLDER, &token);
        let body = format!(
            "{}\r\n\r\nThis is a test email sent at {}",
            self.message_body,
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        );

        OutgoingEmail {
            from: self.sender_address.clone(),
            to: self.recipient_address.clone(),
            subject,
            body,
        }
    }

    fn expected_subject(&self, sent_subject: &str) -> String {
        self.response_subject.replace(SUBJECT_PLACEHOLDER, sent_subject)
    }
}

/// What a pass over the inbox found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collected {
    /// Matching answers were deleted, possibly none
    Deleted(usize),
    TimedOut(Duration),
}

struct PingPong {
    settings: PingPongSettings,
    sender: Box<dyn MailSender>,
    inbox: Box<dyn Inbox>,
}

impl PingPong {
    fn run(&self) -> Result<Evaluation, EvaluationError> {
        let email = self.settings.compose();
        let expected = self.settings.expected_subject(&email.subject);
        debug!(
            from = %email.from,
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "Composed email"
        );

        // Residual answers of earlier cycles, relevant when the subject has no UUID
        debug!("Cleaning old responses...");
        let cleaned = self.collect(&expected, None).map_err(EvaluationError::PreClean)?;
        debug!(?cleaned, "Cleaned old responses");

        let start = Instant::now();
        debug!("Sending email...");
        self.sender.send(&email).map_err(EvaluationError::Send)?;

        debug!("Waiting for response...");
        let answer = self
            .collect(&expected, Some(self.settings.timeout))
            .map_err(EvaluationError::Receive)?;

        match answer {
            Collected::Deleted(count) => {
                debug!(count, "Response received");
                Ok(Evaluation::up(start.elapsed().as_secs()))
            }
            Collected::TimedOut(waited) => Ok(Evaluation::down(
                format!("timed out waiting for response after {} seconds", waited.as_secs()),
                0,
            )),
        }
    }

    /// Find answers matching `subject` and delete them
    ///
    /// With a `wait`, keeps searching until at least one answer shows up or
    /// the wait is exceeded.
    fn collect(&self, subject: &str, wait: Option<Duration>) -> Result<Collected, MailError> {
        let from = self.settings.recipient_address.as_str();
        let mut session = self.inbox.open()?;

        let mut uids = session.search(from, subject)?;

        if let Some(timeout) = wait {
            let wait_start = Instant::now();
            while uids.is_empty() {
                debug!("IMAP no response found yet, sleeping...");
                thread::sleep(self.settings.poll_interval);

                uids = session.search(from, subject)?;

                let waited = wait_start.elapsed();
                if uids.is_empty() && waited > timeout {
                    if let Err(e) = session.logout() {
                        warn!(error = %e, "IMAP logout after timeout failed");
                    }
                    return Ok(Collected::TimedOut(waited));
                }
            }
        }

        if uids.is_empty() {
            debug!("IMAP no response found - not waiting");
            session.logout()?;
            return Ok(Collected::Deleted(0));
        }

        debug!(count = uids.len(), "IMAP response found");
        session.delete(&uids)?;
        session.logout()?;

        Ok(Collected::Deleted(uids.len()))
    }
}

pub struct EmailPingMonitor {
    identity: MonitorIdentity,
    ping_pong: Arc<PingPong>,
}

impl EmailPingMonitor {
    pub fn new(
        identity: MonitorIdentity,
        settings: PingPongSettings,
        sender: Box<dyn MailSender>,
        inbox: Box<dyn Inbox>,
    ) -> Self {
        Self { identity, ping_pong: Arc::new(PingPong { settings, sender, inbox }) }
    }

    /// Validate the parameters of a monitor of type `email_ping` and connect it
    /// to the configured SMTP and IMAP servers
    pub fn setup(identity: MonitorIdentity, entry: &MonitorEntry) -> Result<Self, SetupError> {
        let smtp = ServerSettings {
            host: require_text(entry, "smtp_host", &entry.smtp_host)?,
            port: require(entry, "smtp_port", entry.smtp_port)?,
            force_tls: entry.smtp_force_tls,
            username: optional_text(entry, "smtp_username", &entry.smtp_username),
            password: optional_text(entry, "smtp_password", &entry.smtp_password),
            io_timeout: MAIL_IO_TIMEOUT,
        };
        let sender_address =
            require_text(entry, "smtp_sender_address", &entry.smtp_sender_address)?;
        let recipient_address =
            require_text(entry, "smtp_recipient_address", &entry.smtp_recipient_address)?;

        let imap = ServerSettings {
            host: require_text(entry, "imap_host", &entry.imap_host)?,
            port: require(entry, "imap_port", entry.imap_port)?,
            force_tls: entry.imap_force_tls,
            username: require_text(entry, "imap_username", &entry.imap_username)?,
            password: optional_text(entry, "imap_password", &entry.imap_password),
            io_timeout: MAIL_IO_TIMEOUT,
        };

        let settings = PingPongSettings {
            sender_address,
            recipient_address,
            message_subject: require_text(entry, "message_subject", &entry.message_subject)?,
            message_body: require_text(entry, "message_body", &entry.message_body)?,
            response_subject: require_text(entry, "response_subject", &entry.response_subject)?,
            timeout: Duration::from_secs(require(entry, "timeout", entry.timeout)?),
            poll_interval: Duration::from_secs(1),
        };

        Ok(Self::new(
            identity,
            settings,
            Box::new(SmtpSender::new(smtp)),
            Box::new(ImapInbox::new(imap)),
        ))
    }
}

#[async_trait::async_trait]
impl Monitor for EmailPingMonitor {
    fn identity(&self) -> &MonitorIdentity {
        &self.identity
    }

    async fn evaluate(&self) -> Result<Evaluation, EvaluationError> {
        let ping_pong = self.ping_pong.clone();

        // SMTP and IMAP clients block, keep them off the timer threads
        tokio::task::spawn_blocking(move || ping_pong.run()).await?
    }
}
