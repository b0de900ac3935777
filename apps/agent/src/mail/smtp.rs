use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use tracing::debug;

use super::{MailError, MailSender, OutgoingEmail, ServerSettings};

/// Sends mail through an SMTP relay, upgrading with STARTTLS when offered
pub struct SmtpSender {
    settings: ServerSettings,
}

impl SmtpSender {
    pub fn new(settings: ServerSettings) -> Self {
        Self { settings }
    }

    fn transport(&self) -> Result<SmtpTransport, MailError> {
        let parameters = TlsParameters::new(self.settings.host.clone())
            .map_err(|e| MailError::StartTls(e.to_string()))?;

        let tls = if self.settings.force_tls {
            Tls::Required(parameters)
        } else {
            Tls::Opportunistic(parameters)
        };

        let mut builder = SmtpTransport::builder_dangerous(self.settings.host.as_str())
            .port(self.settings.port)
            .timeout(Some(self.settings.io_timeout))
            .tls(tls);

        if !self.settings.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.settings.username.clone(),
                self.settings.password.clone(),
            ));
        }

        Ok(builder.build())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| MailError::Address {
            address: address.to_string(),
            message: e.to_string(),
        })
}

impl MailSender for SmtpSender {
    fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(parse_mailbox(&email.from)?)
            .to(parse_mailbox(&email.to)?)
            .subject(email.subject.as_str())
            .body(email.body.clone())
            .map_err(|e| MailError::Send(e.to_string()))?;

        let transport = self.transport()?;
        debug!(
            host = %self.settings.host,
            port = self.settings.port,
            force_tls = self.settings.force_tls,
            "SMTP sending"
        );

        transport.send(&message).map_err(|e| MailError::Send(e.to_string()))?;
        debug!("SMTP email accepted");

        Ok(())
    }
}
