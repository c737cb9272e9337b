#![forbid(unsafe_code)]

//! Actions taken on detections, one actor per [`Verb`].

mod alert;
mod clean;
mod exile;
mod quarantine;
mod sed;

pub use alert::Alerter;
pub use clean::Cleaner;
pub use exile::Exiler;
pub use quarantine::Quarantiner;
pub use sed::SedExpr;

use crate::domain::{ResultView, ScanResult};
use crate::error::Error;
use crate::scan::Ruleset;
use async_trait::async_trait;
use config::{Config, Verb};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of loading an actor or a sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loaded {
    Enabled,
    Disabled,
}

#[async_trait]
pub trait Acter: Send + Sync {
    /// Check configuration and prepare clients. A disabled actor is left out
    /// of the pipeline.
    async fn load(&mut self) -> Result<Loaded, Error>;

    fn verb(&self) -> Verb;

    /// Act on every path of `view`. Per-path failures go to `view.errs()`;
    /// a returned error fails the whole view.
    async fn act(&self, view: &mut ResultView<'_>) -> Result<(), Error>;
}

/// Enabled actors in [`Verb`] order.
#[derive(Default)]
pub struct Pipeline {
    acters: Vec<Box<dyn Acter>>,
}

impl Pipeline {
    pub async fn load(acters: Vec<Box<dyn Acter>>) -> Result<Self, Error> {
        let mut enabled = Vec::with_capacity(acters.len());
        for mut acter in acters {
            match acter.load().await? {
                Loaded::Enabled => enabled.push(acter),
                Loaded::Disabled => debug!(verb = %acter.verb(), "action disabled"),
            }
        }
        enabled.sort_by_key(|acter| acter.verb());
        let pipeline = Self { acters: enabled };
        info!(verbs = ?pipeline.verbs(), "actions loaded");
        Ok(pipeline)
    }

    pub fn verbs(&self) -> Vec<Verb> {
        self.acters.iter().map(|acter| acter.verb()).collect()
    }

    /// Run each actor over the paths that resolved to its verb. Status
    /// changes made by one actor are visible to the next.
    pub async fn act(&self, result: &mut ScanResult) {
        for acter in &self.acters {
            let mut view = result.view(acter.verb());
            if view.is_empty() {
                continue;
            }
            debug!(verb = %acter.verb(), target = view.target(), paths = view.len(), "acting");
            if let Err(err) = acter.act(&mut view).await {
                view.record(err);
            }
        }
    }
}

/// The standard actors, configured from `config`.
pub fn presets(config: &Config, ruleset: Arc<dyn Ruleset>) -> Vec<Box<dyn Acter>> {
    let quarantine = config.actions.quarantine.dir.clone();
    vec![
        Box::new(Exiler::new(config.secrets.s3.clone())),
        Box::new(Quarantiner::new(quarantine.clone())),
        Box::new(Cleaner::new(
            quarantine,
            config.actions.clean.clone(),
            ruleset,
            config.scans.block_size,
        )),
        Box::new(Alerter::new(crate::alert::presets(config))),
    ]
}
