use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use imap::error::Error;
use tracing::{Level, debug};

use super::{Inbox, InboxSession, MailError, ServerSettings};

/// IMAP mailbox, upgraded with STARTTLS when the server accepts it
pub struct ImapInbox {
    settings: ServerSettings,
}

impl ImapInbox {
    pub fn new(settings: ServerSettings) -> Self {
        Self { settings }
    }

    fn dial(&self) -> io::Result<TcpStream> {
        let timeout = self.settings.io_timeout;
        let mut last_error = None;

        for addr in (self.settings.host.as_str(), self.settings.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    return Ok(stream);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
        }))
    }

    fn connect(&self) -> Result<imap::Client<TcpStream>, MailError> {
        let connect_err = |e: &dyn std::fmt::Display| MailError::Connect {
            protocol: "IMAP",
            message: e.to_string(),
        };

        // Socket timeouts carry over to the TLS stream wrapping it
        let stream = self.dial().map_err(|e| connect_err(&e))?;
        let mut client = imap::Client::new(stream);
        client.read_greeting().map_err(|e| connect_err(&e))?;
        debug!(host = %self.settings.host, port = self.settings.port, "IMAP dialed");

        Ok(client)
    }

    fn login<T>(&self, client: imap::Client<T>) -> Result<Box<dyn InboxSession>, MailError>
    where
        T: Read + Write + Send + 'static,
    {
        let mut session = client
            .login(&self.settings.username, &self.settings.password)
            .map_err(|(e, _client)| MailError::Auth {
                protocol: "IMAP",
                message: e.to_string(),
            })?;
        debug!("IMAP authenticated");

        session.select("INBOX").map_err(|e| MailError::Select(e.to_string()))?;
        debug!("IMAP selected INBOX");

        Ok(Box::new(ImapSession { session }))
    }
}

impl Inbox for ImapInbox {
    fn open(&self) -> Result<Box<dyn InboxSession>, MailError> {
        let client = self.connect()?;
        let connector =
            native_tls::TlsConnector::new().map_err(|e| MailError::StartTls(e.to_string()))?;

        // A refused STARTTLS consumes the client, plaintext needs a new connection
        match client.secure(self.settings.host.as_str(), &connector) {
            Ok(client) => {
                debug!("IMAP STARTTLS completed");
                self.login(client)
            }
            Err(Error::No(_) | Error::Bad(_)) if self.settings.force_tls => {
                debug!("IMAP STARTTLS capability forced but no support");
                Err(MailError::StartTlsUnsupported("IMAP"))
            }
            Err(Error::No(_) | Error::Bad(_)) => {
                debug!("IMAP continuing with unencrypted connection!");
                let client = self.connect()?;
                self.login(client)
            }
            Err(e) => Err(MailError::StartTls(e.to_string())),
        }
    }
}

struct ImapSession<T: Read + Write> {
    session: imap::Session<T>,
}

/// Quote a search key as an IMAP string
fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn search_query(from: &str, subject: &str) -> String {
    format!("FROM {} SUBJECT {}", quoted(from), quoted(subject))
}

fn format_address(mailbox: Option<&[u8]>, host: Option<&[u8]>) -> String {
    let part =
        |value: Option<&[u8]>| String::from_utf8_lossy(value.unwrap_or_default()).into_owned();
    format!("{}@{}", part(mailbox), part(host))
}

impl<T> ImapSession<T>
where
    T: Read + Write + Send,
{
    /// Log sender and subject of the matched messages, debug only
    fn log_matches(&mut self, set: &str) {
        if !tracing::enabled!(Level::DEBUG) {
            return;
        }

        let fetches = match self.session.uid_fetch(set, "ENVELOPE") {
            Ok(fetches) => fetches,
            Err(e) => {
                debug!(error = %e, "IMAP could not fetch response envelopes");
                return;
            }
        };

        for fetch in fetches.iter() {
            let Some(envelope) = fetch.envelope() else { continue };
            let from = envelope
                .from
                .iter()
                .flatten()
                .map(|address| format_address(address.mailbox, address.host))
                .collect::<Vec<_>>()
                .join(", ");
            let subject = String::from_utf8_lossy(envelope.subject.unwrap_or_default());

            debug!(uid = ?fetch.uid, %from, %subject, "IMAP matched response");
        }
    }
}

impl<T> InboxSession for ImapSession<T>
where
    T: Read + Write + Send,
{
    fn search(&mut self, from: &str, subject: &str) -> Result<Vec<u32>, MailError> {
        let mut uids: Vec<u32> = self
            .session
            .uid_search(search_query(from, subject))
            .map_err(|e| MailError::Search(e.to_string()))?
            .into_iter()
            .collect();
        uids.sort_unstable();

        Ok(uids)
    }

    fn delete(&mut self, uids: &[u32]) -> Result<(), MailError> {
        let set = uids.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
        self.log_matches(&set);

        self.session
            .uid_store(&set, "+FLAGS.SILENT (\\Deleted)")
            .map_err(|e| MailError::Delete(e.to_string()))?;
        debug!(count = uids.len(), "IMAP marked response emails as deleted");

        self.session.expunge().map_err(|e| MailError::Delete(e.to_string()))?;
        debug!("IMAP expunged successfully");

        Ok(())
    }

    fn logout(&mut self) -> Result<(), MailError> {
        self.session.logout().map_err(|e| MailError::Logout(e.to_string()))
    }
}
