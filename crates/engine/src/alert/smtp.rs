#![forbid(unsafe_code)]

use super::Sender;
use crate::act::Loaded;
use crate::domain::Report;
use crate::error::Error;
use async_trait::async_trait;
use config::{Config, SenderConfig, SmtpAlert};
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::PathBuf;
use tracing::debug;

/// Mails the report as pretty-printed JSON over STARTTLS.
pub struct SmtpSender {
    identifier: String,
    dir: PathBuf,
    smtp: config::Smtp,
    loaded: Option<(AsyncSmtpTransport<Tokio1Executor>, SmtpAlert)>,
}

impl SmtpSender {
    pub fn new(config: &Config) -> Self {
        Self {
            identifier: config.identifier.clone(),
            dir: config.alerts.dir.clone(),
            smtp: config.secrets.smtp.clone(),
            loaded: None,
        }
    }

    fn message(&self, alert: &SmtpAlert, report: &Report<'_>) -> Result<Message, Error> {
        let from = if alert.from.is_empty() {
            format!("malwatch@{}", self.identifier)
        } else {
            alert.from.clone()
        };
        let mut builder = Message::builder()
            .from(from.parse::<Mailbox>()?)
            .subject(format!("malwatch alert - {}", self.identifier))
            .header(ContentType::TEXT_PLAIN);
        for to in &alert.to {
            builder = builder.to(to.parse::<Mailbox>()?);
        }
        Ok(builder.body(serde_json::to_string_pretty(report)?)?)
    }
}

#[async_trait]
impl Sender for SmtpSender {
    fn name(&self) -> &'static str {
        "smtp"
    }

    fn config_path(&self) -> PathBuf {
        self.dir.join(SmtpAlert::FILE)
    }

    async fn load(&mut self) -> Result<Loaded, Error> {
        let Some(alert) = SmtpAlert::load(&self.dir)? else {
            return Ok(Loaded::Disabled);
        };
        if alert.to.is_empty() || self.smtp.hostname.is_empty() {
            return Ok(Loaded::Disabled);
        }
        let mut transport =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.smtp.hostname)?
                .port(self.smtp.port);
        if !self.smtp.user.is_empty() {
            transport = transport.credentials(Credentials::new(
                self.smtp.user.clone(),
                self.smtp.pass.clone(),
            ));
        }
        self.loaded = Some((transport.build(), alert));
        Ok(Loaded::Enabled)
    }

    async fn alert(&self, report: &Report<'_>) -> Result<(), Error> {
        let (transport, alert) = self.loaded.as_ref().ok_or(Error::SenderNotLoaded("smtp"))?;
        let message = self.message(alert, report)?;
        transport.send(message).await?;
        debug!(to = ?alert.to, target = report.target, "mail alert sent");
        Ok(())
    }
}
