//! Mail collaborators of the email ping-pong monitor.
//!
//! The monitor only talks to the [`MailSender`] and [`Inbox`] traits. The
//! clients behind them are blocking and are driven from tokio's blocking pool.

pub mod inbox;
pub mod smtp;

use std::time::Duration;

use thiserror::Error;

pub use self::inbox::ImapInbox;
pub use self::smtp::SmtpSender;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to connect to {protocol} server: {message}")]
    Connect { protocol: &'static str, message: String },

    #[error("failed to starttls: {0}")]
    StartTls(String),

    #[error("{0} STARTTLS forced but no support")]
    StartTlsUnsupported(&'static str),

    #[error("{protocol} authentication failed: {message}")]
    Auth { protocol: &'static str, message: String },

    #[error("invalid address {address}: {message}")]
    Address { address: String, message: String },

    #[error("failed to send email: {0}")]
    Send(String),

    #[error("failed to select INBOX: {0}")]
    Select(String),

    #[error("failed to search for emails: {0}")]
    Search(String),

    #[error("failed to delete response emails: {0}")]
    Delete(String),

    #[error("failed to log out: {0}")]
    Logout(String),
}

/// Endpoint and credentials of a mail server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Refuse to continue without STARTTLS
    pub force_tls: bool,
    /// Empty means no authentication (SMTP only)
    pub username: String,
    pub password: String,
    /// Bound on connecting and on every single read or write
    pub io_timeout: Duration,
}

/// Main datapoints associated with a single email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait MailSender: Send + Sync {
    /// Deliver `email` to the outgoing mail server
    fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

pub trait Inbox: Send + Sync {
    /// Connect, authenticate and select the inbox
    fn open(&self) -> Result<Box<dyn InboxSession>, MailError>;
}

/// A logged in session with the inbox selected
pub trait InboxSession: Send {
    /// UIDs of messages matching both the sender and the subject
    fn search(&mut self, from: &str, subject: &str) -> Result<Vec<u32>, MailError>;

    /// Mark messages as deleted and expunge them
    fn delete(&mut self, uids: &[u32]) -> Result<(), MailError>;

    fn logout(&mut self) -> Result<(), MailError>;
}
