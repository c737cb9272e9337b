#![forbid(unsafe_code)]

use super::{Acter, Loaded};
use crate::alert::Sender;
use crate::domain::ResultView;
use crate::error::Error;
use async_trait::async_trait;
use config::Verb;
use futures::future::join_all;
use tracing::{debug, info, warn};

/// Sends a report of the view through every enabled sender.
pub struct Alerter {
    senders: Vec<Box<dyn Sender>>,
}

impl Alerter {
    pub fn new(senders: Vec<Box<dyn Sender>>) -> Self {
        Self { senders }
    }

    pub fn senders(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.senders.iter().map(|sender| sender.name())
    }
}

#[async_trait]
impl Acter for Alerter {
    /// A sender that fails to load is left out without failing the others.
    async fn load(&mut self) -> Result<Loaded, Error> {
        let mut enabled = Vec::with_capacity(self.senders.len());
        for mut sender in std::mem::take(&mut self.senders) {
            match sender.load().await {
                Ok(Loaded::Enabled) => enabled.push(sender),
                Ok(Loaded::Disabled) => debug!(sender = sender.name(), "alert sender disabled"),
                Err(err) => warn!(
                    sender = sender.name(),
                    path = %sender.config_path().display(),
                    %err,
                    "failed to load alert sender"
                ),
            }
        }
        self.senders = enabled;
        if self.senders.is_empty() {
            return Ok(Loaded::Disabled);
        }
        info!(senders = ?self.senders().collect::<Vec<_>>(), "alert senders loaded");
        Ok(Loaded::Enabled)
    }

    fn verb(&self) -> Verb {
        Verb::Alert
    }

    async fn act(&self, view: &mut ResultView<'_>) -> Result<(), Error> {
        let report = view.report();
        let results = join_all(self.senders.iter().map(|sender| sender.alert(&report))).await;
        for (sender, result) in self.senders.iter().zip(results) {
            match result {
                Ok(()) => info!(sender = sender.name(), target = report.target, hits = report.hits.len(), "alert sent"),
                Err(err) => view.record(err),
            }
        }
        Ok(())
    }
}
