#![forbid(unsafe_code)]

mod job;
mod rules;
mod run;
mod walker;
mod worker;

pub use job::Job;
pub use rules::RegexRuleset;
pub use run::{Scan, glob_paths};
pub use walker::PathWalker;
pub use worker::Worker;

use crate::domain::{Errs, Hit};
use crate::error::Error;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Matches file content against a compiled signature set.
///
/// A scanner is fed the blocks of one file in order and remembers every rule
/// matched so far until [`Scanner::reset`] is called.
pub trait Scanner: Send {
    fn scan(&mut self, block: &[u8]) -> Result<(), Error>;
    fn matches(&self) -> &BTreeSet<String>;
    fn reset(&mut self);
}

/// A loaded signature set.
pub trait Ruleset: Send + Sync {
    fn scanner(&self) -> Box<dyn Scanner>;
}

const DAY: u64 = 24 * 60 * 60;

/// Age filter for workers, `None` when `days` is zero.
pub(crate) fn max_age(days: u32) -> Option<Duration> {
    (days > 0).then(|| Duration::from_secs(u64::from(days) * DAY))
}

/// State shared by the workers of one run.
#[derive(Clone)]
pub struct RunState {
    hits: flume::Sender<Hit>,
    errs: Arc<Errs>,
}

impl RunState {
    pub fn new(hits: flume::Sender<Hit>, errs: Arc<Errs>) -> Self {
        Self { hits, errs }
    }

    pub fn emit(&self, hit: Hit) {
        if self.hits.send(hit).is_err() {
            debug!("hit stream closed, dropping detection");
        }
    }

    pub fn record(&self, err: Error) {
        self.errs.add(err);
    }
}

/// Start one thread per worker, all draining `queue`.
pub(crate) fn spawn_workers(
    workers: Vec<Worker>,
    cancel: &CancellationToken,
    queue: &flume::Receiver<PathBuf>,
    state: &RunState,
) -> Result<Vec<JoinHandle<()>>, Error> {
    workers
        .into_iter()
        .enumerate()
        .map(|(i, worker)| {
            let cancel = cancel.clone();
            let queue = queue.clone();
            let state = state.clone();
            std::thread::Builder::new()
                .name(format!("scan-worker-{i}"))
                .spawn(move || worker.work(&cancel, &queue, &state))
                .map_err(Error::from)
        })
        .collect()
}
