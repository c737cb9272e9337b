#![forbid(unsafe_code)]

//! Alert transports used by the alert action.

mod json;
mod pagerduty;
mod smtp;

pub use json::JsonSender;
pub use pagerduty::PagerDutySender;
pub use smtp::SmtpSender;

use crate::act::Loaded;
use crate::domain::Report;
use crate::error::Error;
use async_trait::async_trait;
use config::Config;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Sender: Send + Sync {
    fn name(&self) -> &'static str;

    /// The settings file this sender reads on load.
    fn config_path(&self) -> PathBuf;

    /// A sender without settings stays disabled.
    async fn load(&mut self) -> Result<Loaded, Error>;

    async fn alert(&self, report: &Report<'_>) -> Result<(), Error>;
}

/// Every built-in sender, unloaded.
pub fn presets(config: &Config) -> Vec<Box<dyn Sender>> {
    vec![
        Box::new(JsonSender::new(config)),
        Box::new(PagerDutySender::new(config)),
        Box::new(SmtpSender::new(config)),
    ]
}

fn http_client() -> Result<Client, Error> {
    Ok(Client::builder().timeout(TIMEOUT).build()?)
}

/// Fail on any non-2xx response.
fn check_status(response: reqwest::Response) -> Result<(), Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(Error::HttpStatus {
        url: response.url().to_string(),
        status: status.as_u16(),
    })
}
