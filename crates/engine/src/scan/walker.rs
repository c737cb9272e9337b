#![forbid(unsafe_code)]

use crate::domain::Errs;
use crate::error::Error;
use crate::skips::Skips;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Enumerates the regular files below a set of roots.
#[derive(Debug, Clone)]
pub struct PathWalker {
    roots: Vec<PathBuf>,
}

impl PathWalker {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Walk every root on a background thread, feeding a queue of at most
    /// `capacity` paths. The queue closes once the walk ends.
    pub fn walk(
        self,
        cancel: CancellationToken,
        skips: Arc<Skips>,
        capacity: usize,
        errs: Arc<Errs>,
    ) -> Result<(flume::Receiver<PathBuf>, JoinHandle<()>), Error> {
        let (tx, rx) = flume::bounded(capacity.max(1));
        let handle = std::thread::Builder::new()
            .name("path-walker".into())
            .spawn(move || self.produce(&cancel, &skips, &tx, &errs))?;
        Ok((rx, handle))
    }

    fn produce(
        &self,
        cancel: &CancellationToken,
        skips: &Skips,
        tx: &flume::Sender<PathBuf>,
        errs: &Errs,
    ) {
        let mut queued = 0usize;
        for root in &self.roots {
            let entries = WalkDir::new(root)
                .into_iter()
                .filter_entry(|entry| !(entry.file_type().is_dir() && skips.is_skipped_dir(entry.path())));
            for entry in entries {
                if cancel.is_cancelled() {
                    debug!(queued, "walk cancelled");
                    return;
                }
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        errs.add(err.into());
                        continue;
                    }
                };
                if !entry.file_type().is_file() || skips.is_skipped_file(entry.path()) {
                    continue;
                }
                if tx.send(entry.into_path()).is_err() {
                    debug!(queued, "path queue closed");
                    return;
                }
                queued += 1;
            }
        }
        trace!(queued, "walk finished");
    }
}
