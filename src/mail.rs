//! Notification messages sent on account events.
//!
//! Messages are composed here and handed to a [`Transport`]. Delivery is
//! best effort: a failing transport is logged and never fails the request.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{FileTransport, Transport as _};

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("invalid message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("spool error: {0}")]
    Spool(#[from] lettre::transport::file::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Notification kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    /// Sent to a freshly registered user with their generated password.
    NewUser { login: String, password: String },
    /// Sent after a password reset with the replacement password.
    PasswordReset { login: String, password: String },
    /// Sent after a user or an administrator sets a new password.
    PasswordChanged { login: String },
    /// Sent to the webmaster for each registration.
    NewUserNotice {
        login: String,
        name: String,
        email: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Message {
    /// Build the RFC 5322 message. Fails when an address does not parse,
    /// which also rules out header injection through the recipient.
    pub fn to_email(&self) -> Result<lettre::Message, MailError> {
        let email = lettre::Message::builder()
            .from(self.from.parse::<Mailbox>()?)
            .to(self.to.parse::<Mailbox>()?)
            .subject(self.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(self.body.clone())?;
        Ok(email)
    }
}

/// Where composed messages go.
#[derive(Debug, Clone, Default)]
pub enum Transport {
    /// Record recipient and subject in the log. Bodies are not logged.
    #[default]
    Log,
    /// Write one `.eml` file per message for a local MTA to pick up.
    Spool(PathBuf),
    /// Keep messages in memory.
    Memory(Arc<Mutex<Vec<Message>>>),
}

#[derive(Debug, Clone)]
pub struct MailManager {
    from: String,
    webmaster: String,
    site_name: String,
    transport: Transport,
}

impl MailManager {
    /// Spool to `mail.spool_dir` when configured, log otherwise.
    pub fn new(config: &Config) -> Self {
        let transport = match &config.mail.spool_dir {
            Some(dir) => Transport::Spool(dir.clone()),
            None => Transport::Log,
        };
        Self {
            from: config.mail.from.clone(),
            webmaster: config.mail.webmaster.clone(),
            site_name: config.site.name.clone(),
            transport,
        }
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// False when messages only reach the log, so mailed passwords are lost.
    pub fn delivers(&self) -> bool {
        !matches!(self.transport, Transport::Log)
    }

    pub fn webmaster(&self) -> &str {
        &self.webmaster
    }

    pub fn compose(&self, template: &Template, to: &str) -> Message {
        let site = &self.site_name;
        let (subject, body) = match template {
            Template::NewUser { login, password } => (
                format!("Your {site} account"),
                format!(
                    "Welcome to {site}!\n\n\
                     login: {login}\n\
                     password: {password}\n\n\
                     You can change this password from your account page once logged in.\n"
                ),
            ),
            Template::PasswordReset { login, password } => (
                format!("Your {site} password has been reset"),
                format!(
                    "A new password was requested for your {site} account.\n\n\
                     login: {login}\n\
                     password: {password}\n"
                ),
            ),
            Template::PasswordChanged { login } => (
                format!("Your {site} password was changed"),
                format!(
                    "The password of the {site} account {login} was just changed.\n\
                     If you did not do this, reset it from the login page.\n"
                ),
            ),
            Template::NewUserNotice { login, name, email } => (
                format!("New user registered on {site} !"),
                format!("login: {login}\nname: {name}\nemail: {email}\n"),
            ),
        };

        Message {
            from: self.from.clone(),
            to: to.to_string(),
            subject,
            body,
        }
    }

    /// Compose and deliver a notification.
    pub fn send(&self, template: Template, to: &str) {
        if to.is_empty() {
            tracing::debug!("no recipient address, notification dropped");
            return;
        }

        let message = self.compose(&template, to);
        let email = match message.to_email() {
            Ok(email) => email,
            Err(e) => {
                tracing::warn!(to = ?message.to, error = %e, "mail not sent");
                return;
            }
        };

        match &self.transport {
            Transport::Log => {
                tracing::info!(to = %message.to, subject = %message.subject, "mail queued");
            }
            Transport::Spool(dir) => {
                if let Err(e) = spool(dir, &email) {
                    tracing::error!(to = %message.to, error = %e, "failed to spool mail");
                }
            }
            Transport::Memory(outbox) => match outbox.lock() {
                Ok(mut outbox) => outbox.push(message),
                Err(e) => tracing::error!("mail outbox poisoned: {}", e),
            },
        }
    }

    /// Messages delivered so far through a [`Transport::Memory`] transport.
    pub fn sent(&self) -> Vec<Message> {
        match &self.transport {
            Transport::Memory(outbox) => outbox.lock().map(|o| o.clone()).unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

fn spool(dir: &Path, email: &lettre::Message) -> Result<String, MailError> {
    std::fs::create_dir_all(dir)?;
    let id = FileTransport::new(dir).send(email)?;
    tracing::debug!(dir = %dir.display(), %id, "mail spooled");
    Ok(id)
}
