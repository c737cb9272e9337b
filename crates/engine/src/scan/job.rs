#![forbid(unsafe_code)]

use super::{PathWalker, RunState, Worker, spawn_workers};
use crate::dispatch::Dispatcher;
use crate::domain::{Errs, Hit, ScanResult};
use crate::error::Error;
use crate::skips::Skips;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// One walk over a set of roots, scanned by a pool of workers.
pub struct Job {
    target: Option<String>,
    walker: Option<PathWalker>,
    dispatcher: Arc<Dispatcher>,
    batch_size: usize,
    queue_size: usize,
    errs: Arc<Errs>,
    hits: Option<flume::Receiver<Hit>>,
    waiter: Option<JoinHandle<()>>,
}

impl Job {
    /// `target` fixes the target of every hit. `None` resolves it per path.
    pub fn new(
        target: Option<String>,
        walker: PathWalker,
        dispatcher: Arc<Dispatcher>,
        batch_size: usize,
        queue_size: usize,
    ) -> Self {
        Self {
            target,
            walker: Some(walker),
            dispatcher,
            batch_size: batch_size.max(1),
            queue_size,
            errs: Arc::new(Errs::default()),
            hits: None,
            waiter: None,
        }
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Launch the walker and one thread per worker. The hit stream closes
    /// once every worker has returned.
    pub fn start(
        &mut self,
        cancel: &CancellationToken,
        skips: Arc<Skips>,
        workers: Vec<Worker>,
    ) -> Result<(), Error> {
        let Some(walker) = self.walker.take() else {
            return Ok(());
        };
        let roots = walker.roots().len();
        let (queue, walk) =
            walker.walk(cancel.clone(), skips, self.queue_size, Arc::clone(&self.errs))?;

        let (tx, rx) = flume::bounded(self.queue_size.max(1));
        let state = RunState::new(tx, Arc::clone(&self.errs));
        let count = workers.len();
        let handles = spawn_workers(workers, cancel, &queue, &state)?;
        drop(queue);

        let waiter = std::thread::Builder::new()
            .name("scan-waiter".into())
            .spawn(move || {
                if walk.join().is_err() {
                    state.record(Error::WorkerPanicked);
                }
                for handle in handles {
                    if handle.join().is_err() {
                        state.record(Error::WorkerPanicked);
                    }
                }
            })?;

        info!(target = ?self.target, roots, workers = count, "scan job started");
        self.hits = Some(rx);
        self.waiter = Some(waiter);
        Ok(())
    }

    /// Drain the hit stream, flushing as soon as more than `batch_size` hits
    /// are pending and once more when the stream closes. Returns the number
    /// of hits processed.
    pub async fn stop(&mut self) -> Result<usize, Error> {
        let Some(hits) = self.hits.take() else {
            return Ok(0);
        };

        let mut batch = Vec::new();
        let mut total = 0;
        while let Ok(hit) = hits.recv_async().await {
            batch.push(hit);
            total += 1;
            if batch.len() > self.batch_size {
                self.flush(std::mem::take(&mut batch)).await;
            }
        }
        self.flush(batch).await;

        if let Some(waiter) = self.waiter.take() {
            tokio::task::spawn_blocking(move || waiter.join())
                .await?
                .map_err(|_| Error::WorkerPanicked)?;
        }

        let errs = self.errs.take();
        for err in &errs {
            error!(%err, "scan error");
        }
        info!(target = ?self.target, hits = total, errors = errs.len(), "scan job finished");
        Ok(total)
    }

    async fn flush(&self, hits: Vec<Hit>) {
        debug!(target = ?self.target, hits = hits.len(), "flushing batch");
        self.dispatcher.flush(self.target(), hits).await;
    }

    /// Run the actions over `result` in pipeline order.
    pub async fn acts(&self, result: &mut ScanResult) {
        self.dispatcher.acts(result).await;
    }

    /// Run the post-processing tasks over `result`.
    pub async fn tasks(&self, result: &ScanResult) {
        self.dispatcher.tasks(result).await;
    }
}
