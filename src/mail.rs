//! Outbound account email: verification and password-reset links.
//!
//! `SmtpMailer` delivers over STARTTLS with the configured credentials.
//! Without credentials the service runs with `LogMailer`, which records
//! that a message would have been sent but never prints its body (the body
//! carries a live token).

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;

use crate::config::{SmtpConfig, APP_NAME};

/// Verification links stay valid for 24 hours.
pub const VERIFICATION_TTL_HOURS: i64 = 24;
/// Reset links stay valid for 1 hour.
pub const RESET_TTL_HOURS: i64 = 1;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Message build failed: {0}")]
    Build(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),

    #[error("SMTP is not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait Mailer: Send + Sync {
    fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;

    /// Whether messages actually leave the process.
    fn delivers(&self) -> bool {
        true
    }
}

/// Verification message with a link to `{public_url}/verify?token=…`.
pub fn verification_email(public_url: &str, to: &str, username: &str, token: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Verify your email address".into(),
        body: format!(
            "Hello {username},\n\n\
             Thank you for registering with {APP_NAME}. Please verify your email address \
             by opening the link below:\n\n\
             {public_url}/verify?token={token}\n\n\
             This link will expire in {VERIFICATION_TTL_HOURS} hours.\n\n\
             If you did not create an account, you can ignore this message.\n"
        ),
    }
}

/// Password reset message with a link to `{public_url}/reset-password?token=…`.
pub fn reset_email(public_url: &str, to: &str, username: &str, token: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Reset your password".into(),
        body: format!(
            "Hello {username},\n\n\
             A password reset was requested for your {APP_NAME} account. \
             Open the link below to choose a new password:\n\n\
             {public_url}/reset-password?token={token}\n\n\
             This link will expire in {RESET_TTL_HOURS} hour.\n\n\
             If you did not request a reset, you can ignore this message.\n"
        ),
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// SMTP delivery through a STARTTLS relay.
pub struct SmtpMailer {
    from: Mailbox,
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let (Some(username), Some(password)) = (&config.username, &config.password) else {
            return Err(MailError::NotConfigured);
        };

        let from = parse_mailbox(username)?;
        let transport = SmtpTransport::starttls_relay(&config.server)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(
                username.clone(),
                password.expose().to_string(),
            ))
            .build();

        Ok(Self { from, transport })
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&email.to)?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(&message)
            .map_err(|e| MailError::Transport(e.to_string()))?;

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

/// Stand-in used when SMTP credentials are absent.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        tracing::warn!(
            to = %email.to,
            subject = %email.subject,
            "SMTP not configured, email not delivered"
        );
        Ok(())
    }

    fn delivers(&self) -> bool {
        false
    }
}

/// Pick the mailer for the configured SMTP settings.
pub fn mailer_from_config(config: &SmtpConfig) -> Box<dyn Mailer> {
    if !config.has_credentials() {
        tracing::warn!("EMAIL_USER/EMAIL_PASSWORD not set, outgoing email will only be logged");
        return Box::new(LogMailer);
    }
    match SmtpMailer::new(config) {
        Ok(mailer) => {
            tracing::info!(server = %config.server, port = config.port, "SMTP mailer configured");
            Box::new(mailer)
        }
        Err(e) => {
            tracing::error!(error = %e, "SMTP mailer unavailable, falling back to log mailer");
            Box::new(LogMailer)
        }
    }
}

/// Captures messages in memory for assertions.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: std::sync::Mutex<Vec<OutgoingEmail>>,
    pub fail: bool,
}

#[cfg(test)]
impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// Token embedded in the most recent message's link.
    pub fn last_token(&self) -> Option<String> {
        let messages = self.messages();
        let body = &messages.last()?.body;
        let start = body.find("token=")? + "token=".len();
        let token: String = body[start..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        Some(token)
    }
}

#[cfg(test)]
impl Mailer for RecordingMailer {
    fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Transport("connection refused".into()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}
