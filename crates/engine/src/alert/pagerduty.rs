#![forbid(unsafe_code)]

use super::{Sender, check_status, http_client};
use crate::act::Loaded;
use crate::domain::Report;
use crate::error::Error;
use async_trait::async_trait;
use config::{Config, PagerDutyAlert, SenderConfig};
use reqwest::Client;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

#[derive(Serialize)]
struct Event<'a> {
    payload: Payload<'a>,
    routing_key: &'a str,
    event_action: &'static str,
}

#[derive(Serialize)]
struct Payload<'a> {
    summary: String,
    source: &'a str,
    severity: &'a str,
    custom_details: &'a Report<'a>,
}

/// Triggers a PagerDuty Events API v2 incident per report.
pub struct PagerDutySender {
    identifier: String,
    dir: PathBuf,
    token: String,
    loaded: Option<(Client, PagerDutyAlert)>,
}

impl PagerDutySender {
    pub fn new(config: &Config) -> Self {
        Self {
            identifier: config.identifier.clone(),
            dir: config.alerts.dir.clone(),
            token: config.secrets.pagerduty.token.clone(),
            loaded: None,
        }
    }
}

#[async_trait]
impl Sender for PagerDutySender {
    fn name(&self) -> &'static str {
        "pagerduty"
    }

    fn config_path(&self) -> PathBuf {
        self.dir.join(PagerDutyAlert::FILE)
    }

    async fn load(&mut self) -> Result<Loaded, Error> {
        let Some(alert) = PagerDutyAlert::load(&self.dir)? else {
            return Ok(Loaded::Disabled);
        };
        if alert.endpoint.is_empty() || self.token.is_empty() {
            return Ok(Loaded::Disabled);
        }
        self.loaded = Some((http_client()?, alert));
        Ok(Loaded::Enabled)
    }

    async fn alert(&self, report: &Report<'_>) -> Result<(), Error> {
        let (client, alert) = self
            .loaded
            .as_ref()
            .ok_or(Error::SenderNotLoaded("pagerduty"))?;
        let event = Event {
            payload: Payload {
                summary: format!("Malwatch Scan Report - {}", self.identifier),
                source: &self.identifier,
                severity: &alert.severity,
                custom_details: report,
            },
            routing_key: &self.token,
            event_action: "trigger",
        };
        check_status(client.post(&alert.endpoint).json(&event).send().await?)?;
        debug!(target = report.target, "pagerduty event triggered");
        Ok(())
    }
}
