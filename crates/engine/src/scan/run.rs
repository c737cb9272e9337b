#![forbid(unsafe_code)]

use super::{Job, PathWalker, Ruleset, Worker, max_age};
use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::resolve::ActionResolver;
use crate::skips::Skips;
use config::Config;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Expand glob patterns into existing scan roots.
pub fn glob_paths<I, S>(patterns: I) -> Result<Vec<PathBuf>, Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut paths = Vec::new();
    for pattern in patterns {
        for entry in glob::glob(pattern.as_ref())? {
            match entry {
                Ok(path) => paths.push(path),
                Err(err) => warn!(%err, "unreadable glob match"),
            }
        }
    }
    paths.sort();
    paths.dedup();
    if paths.is_empty() {
        return Err(Error::NoScanPaths);
    }
    Ok(paths)
}

/// A full scan: roots are grouped by target and each group runs as its own
/// [`Job`], one after another.
pub struct Scan {
    ruleset: Arc<dyn Ruleset>,
    resolver: Arc<ActionResolver>,
    skips: Arc<Skips>,
    dispatcher: Arc<Dispatcher>,
    threads: usize,
    block_size: usize,
    max_age: Option<Duration>,
    batch_size: usize,
    queue_size: usize,
    timeout: Duration,
}

impl Scan {
    pub fn new(config: &Config, ruleset: Arc<dyn Ruleset>, dispatcher: Arc<Dispatcher>) -> Self {
        let scans = &config.scans;
        Self {
            ruleset,
            resolver: Arc::new(ActionResolver::from(&config.actions)),
            skips: Arc::new(Skips::from_config(config)),
            dispatcher,
            threads: config.threads.max(1),
            block_size: scans.block_size,
            max_age: max_age(scans.max_age),
            batch_size: scans.batch_size,
            queue_size: scans.queue_size,
            timeout: scans.timeout,
        }
    }

    pub fn workers(&self) -> Vec<Worker> {
        (0..self.threads)
            .map(|_| {
                Worker::new(
                    self.ruleset.scanner(),
                    Arc::clone(&self.resolver),
                    self.block_size,
                    self.max_age,
                )
            })
            .collect()
    }

    /// Roots grouped by the target they belong to. Roots outside every
    /// target are grouped under `None` and their hits resolved per path.
    pub fn jobs(&self, roots: Vec<PathBuf>) -> BTreeMap<Option<String>, Vec<PathBuf>> {
        let targets = self.dispatcher.targets();
        let mut jobs: BTreeMap<Option<String>, Vec<PathBuf>> = BTreeMap::new();
        for root in roots {
            let target = (!targets.is_unmatched(&root)).then(|| targets.resolve(&root));
            jobs.entry(target).or_default().push(root);
        }
        jobs
    }

    /// Scan `roots`, returning the number of hits processed.
    pub async fn run(&self, cancel: &CancellationToken, roots: Vec<PathBuf>) -> Result<usize, Error> {
        let mut total = 0;
        for (target, roots) in self.jobs(roots) {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let child = cancel.child_token();
            let timer = tokio::spawn({
                let child = child.clone();
                let timeout = self.timeout;
                let target = target.clone();
                async move {
                    tokio::select! {
                        _ = child.cancelled() => {}
                        _ = tokio::time::sleep(timeout) => {
                            warn!(?target, ?timeout, "scan job timed out");
                            child.cancel();
                        }
                    }
                }
            });

            let mut job = Job::new(
                target,
                PathWalker::new(roots),
                Arc::clone(&self.dispatcher),
                self.batch_size,
                self.queue_size,
            );
            let started = job.start(&child, Arc::clone(&self.skips), self.workers());
            let stopped = match started {
                Ok(()) => job.stop().await,
                Err(err) => Err(err),
            };
            child.cancel();
            timer.await?;
            total += stopped?;
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        info!(hits = total, "scan finished");
        Ok(total)
    }
}
