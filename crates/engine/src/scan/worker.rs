#![forbid(unsafe_code)]

use super::{RunState, Scanner};
use crate::domain::{Attr, Hit, Meta};
use crate::error::Error;
use crate::fsys;
use crate::resolve::ActionResolver;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Scans files one at a time with its own scanner and read buffer.
pub struct Worker {
    scanner: Box<dyn Scanner>,
    resolver: Arc<ActionResolver>,
    buf: Vec<u8>,
    max_age: Option<Duration>,
}

impl Worker {
    /// `block_size` is jittered per worker. A `max_age` of `None` scans
    /// files regardless of age without stat-ing them first.
    pub fn new(
        scanner: Box<dyn Scanner>,
        resolver: Arc<ActionResolver>,
        block_size: usize,
        max_age: Option<Duration>,
    ) -> Self {
        Self {
            scanner,
            resolver,
            buf: vec![0; fsys::block_size(block_size)],
            max_age,
        }
    }

    pub fn block_size(&self) -> usize {
        self.buf.len()
    }

    /// Scan `path` and emit a hit if any rule matched. Failures are recorded
    /// on `state`.
    pub fn scan(&mut self, path: &Path, state: &RunState) {
        let mut attr = None;
        if let Some(max_age) = self.max_age {
            let meta = match std::fs::metadata(path) {
                Ok(meta) => meta,
                Err(err) => return state.record(Error::file(path, err)),
            };
            let expiry = SystemTime::now()
                .checked_sub(max_age)
                .unwrap_or(UNIX_EPOCH);
            if fsys::is_expired(expiry, &meta) {
                trace!(path = %path.display(), "skipping expired file");
                return;
            }
            attr = Some(Attr::from(&meta));
        }

        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(err) => return state.record(Error::file(path, err)),
        };

        self.scanner.reset();
        loop {
            let n = match file.read(&mut self.buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return state.record(Error::file(path, err)),
            };
            if let Err(err) = self.scanner.scan(&self.buf[..n]) {
                return state.record(err);
            }
        }

        let rules = self.scanner.matches();
        if rules.is_empty() {
            return;
        }

        let attr = match attr {
            Some(attr) => attr,
            None => match file.metadata() {
                Ok(meta) => Attr::from(&meta),
                Err(err) => return state.record(Error::file(path, err)),
            },
        };
        let acts = self.resolver.resolve(path, rules.iter().map(String::as_str));
        debug!(path = %path.display(), ?rules, ?acts, "detection");

        state.emit(Hit {
            path: path.to_path_buf(),
            meta: Meta::new(rules.clone(), acts, attr),
        });
    }

    /// Scan queued paths until the queue closes or `cancel` fires. A scan in
    /// progress is always finished.
    pub(crate) fn work(
        mut self,
        cancel: &CancellationToken,
        queue: &flume::Receiver<PathBuf>,
        state: &RunState,
    ) {
        for path in queue.iter() {
            if cancel.is_cancelled() {
                break;
            }
            self.scan(&path, state);
        }
        trace!("worker exited");
    }
}
