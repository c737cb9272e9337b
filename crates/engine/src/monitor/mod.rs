#![forbid(unsafe_code)]

//! Real-time scanning of files as they are written.
//!
//! A listener thread turns close-write events into paths for the worker
//! pool. Detections accumulate until the next tick of the interval timer,
//! which hands them to the dispatcher in one go so a burst of writes to the
//! same site ends up in a single alert.

mod fanotify;

pub use fanotify::FanotifySource;

use crate::dispatch::Dispatcher;
use crate::domain::{Batch, Errs, Hit};
use crate::error::Error;
use crate::fsys;
use crate::resolve::ActionResolver;
use crate::scan::{Ruleset, RunState, Worker, glob_paths, max_age, spawn_workers};
use crate::skips::Skips;
use crate::targets::Targets;
use config::Config;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

const SEND_TIMEOUT: Duration = Duration::from_millis(100);
/// Pause after a failed read so a persistent error does not spin.
const RETRY_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    CloseWrite(PathBuf),
    /// Any other event, carrying its raw mask.
    Other(u64),
}

/// A blocking source of file events. `next` should return within a short
/// time even when nothing happened, so the listener can notice cancellation.
pub trait EventSource: Send {
    fn next(&mut self) -> Result<Vec<FileEvent>, Error>;
}

/// Events fed through a channel, for embedding and tests.
pub struct ChannelSource {
    rx: flume::Receiver<FileEvent>,
}

impl ChannelSource {
    pub fn new() -> (flume::Sender<FileEvent>, Self) {
        let (tx, rx) = flume::unbounded();
        (tx, Self { rx })
    }
}

impl EventSource for ChannelSource {
    fn next(&mut self) -> Result<Vec<FileEvent>, Error> {
        match self.rx.recv_timeout(SEND_TIMEOUT) {
            Ok(event) => {
                let mut events = vec![event];
                events.extend(self.rx.try_iter());
                Ok(events)
            }
            Err(flume::RecvTimeoutError::Timeout) => Ok(Vec::new()),
            Err(flume::RecvTimeoutError::Disconnected) => {
                std::thread::sleep(SEND_TIMEOUT);
                Ok(Vec::new())
            }
        }
    }
}

pub struct Monitor {
    source: Box<dyn EventSource>,
    workers: Vec<Worker>,
    skips: Arc<Skips>,
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    batch_size: usize,
    queue_size: usize,
}

impl Monitor {
    /// Watch the mounts holding the configured scan paths.
    pub fn new(
        config: &Config,
        ruleset: Arc<dyn Ruleset>,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self, Error> {
        let mut mounts = glob_paths(&config.scans.paths)?
            .iter()
            .map(|path| fsys::mount_point(path))
            .collect::<Result<Vec<_>, _>>()?;
        mounts.sort();
        mounts.dedup();
        let source = FanotifySource::new(&mounts)?;
        Ok(Self::with_source(config, ruleset, dispatcher, Box::new(source)))
    }

    pub fn with_source(
        config: &Config,
        ruleset: Arc<dyn Ruleset>,
        dispatcher: Arc<Dispatcher>,
        source: Box<dyn EventSource>,
    ) -> Self {
        let scans = &config.scans;
        let resolver = Arc::new(ActionResolver::from(&config.actions));
        let workers = (0..config.threads.max(1))
            .map(|_| {
                Worker::new(
                    ruleset.scanner(),
                    Arc::clone(&resolver),
                    scans.block_size,
                    max_age(scans.max_age),
                )
            })
            .collect();
        Self {
            source,
            workers,
            skips: Arc::new(Skips::from_config(config)),
            dispatcher,
            interval: scans.monitor.interval,
            batch_size: scans.batch_size,
            queue_size: scans.queue_size,
        }
    }

    /// Run until `cancel` fires, which is reported as [`Error::Cancelled`].
    pub async fn run(self, cancel: &CancellationToken) -> Result<(), Error> {
        let Self {
            source,
            workers,
            skips,
            dispatcher,
            interval,
            batch_size,
            queue_size,
        } = self;

        let errs = Arc::new(Errs::default());
        let (queue_tx, queue_rx) = flume::bounded(queue_size.max(1));
        let (hits_tx, hits_rx) = flume::bounded(queue_size.max(1));
        let state = RunState::new(hits_tx, Arc::clone(&errs));

        let count = workers.len();
        let mut threads = spawn_workers(workers, cancel, &queue_rx, &state)?;
        drop(queue_rx);
        drop(state);

        let listener = Listener {
            cancel: cancel.clone(),
            targets: Arc::clone(dispatcher.targets()),
            skips,
            queue: queue_tx,
            errs: Arc::clone(&errs),
        };
        threads.push(
            std::thread::Builder::new()
                .name("fanotify-reader".into())
                .spawn(move || listener.listen(source))?,
        );

        let hits = Arc::new(Batch::<Hit>::default());
        let collector = tokio::spawn({
            let hits = Arc::clone(&hits);
            async move {
                while let Ok(hit) = hits_rx.recv_async().await {
                    hits.add(hit);
                }
            }
        });

        info!(workers = count, ?interval, "monitor started");
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => tick(&dispatcher, &hits, &errs, batch_size).await,
            }
        }

        let panicked = tokio::task::spawn_blocking(move || {
            threads
                .into_iter()
                .map(JoinHandle::join)
                .filter(Result::is_err)
                .count()
        })
        .await?;
        if panicked > 0 {
            error!(panicked, "monitor threads panicked");
        }
        collector.await?;

        let dropped = hits.take().len();
        info!(dropped, "monitor stopped");
        Err(Error::Cancelled)
    }
}

/// Errors since the last tick are logged, then pending hits are processed.
async fn tick(dispatcher: &Dispatcher, hits: &Batch<Hit>, errs: &Errs, batch_size: usize) {
    for err in errs.take() {
        error!(%err, "monitor error");
    }
    let hits = hits.take();
    if hits.is_empty() {
        trace!("idle tick");
        return;
    }
    info!(hits = hits.len(), "processing detections");
    dispatcher.flush_chunked(None, hits, batch_size).await;
}

struct Listener {
    cancel: CancellationToken,
    targets: Arc<Targets>,
    skips: Arc<Skips>,
    queue: flume::Sender<PathBuf>,
    errs: Arc<Errs>,
}

impl Listener {
    fn listen(self, mut source: Box<dyn EventSource>) {
        while !self.cancel.is_cancelled() {
            let events = match source.next() {
                Ok(events) => events,
                Err(err) => {
                    warn!(%err, "reading events failed");
                    self.errs.add(err);
                    std::thread::sleep(RETRY_DELAY);
                    continue;
                }
            };
            for event in events {
                if let Some(path) = self.accept(event) {
                    if !self.push(path) {
                        return;
                    }
                }
            }
        }
        trace!("listener exited");
    }

    fn accept(&self, event: FileEvent) -> Option<PathBuf> {
        let path = match event {
            FileEvent::CloseWrite(path) => path,
            FileEvent::Other(mask) => {
                self.errs.add(Error::UnknownEvent(mask));
                return None;
            }
        };
        if path.as_os_str().is_empty()
            || self.targets.is_unmatched(&path)
            || self.skips.is_skipped(&path)
        {
            trace!(path = %path.display(), "ignoring event");
            return None;
        }
        Some(path)
    }

    /// Blocks while the queue is full. Returns false once the monitor is
    /// shutting down.
    fn push(&self, mut path: PathBuf) -> bool {
        loop {
            match self.queue.send_timeout(path, SEND_TIMEOUT) {
                Ok(()) => return true,
                Err(flume::SendTimeoutError::Timeout(back)) => {
                    if self.cancel.is_cancelled() {
                        debug!(path = %back.display(), "dropping event on shutdown");
                        return false;
                    }
                    path = back;
                }
                Err(flume::SendTimeoutError::Disconnected(_)) => {
                    warn!("path queue closed");
                    return false;
                }
            }
        }
    }
}
