#![forbid(unsafe_code)]

use super::sed::{SedExpr, apply_all};
use super::{Acter, Loaded};
use crate::domain::{Attr, ResultView, Status};
use crate::error::Error;
use crate::fsys;
use crate::scan::Ruleset;
use async_trait::async_trait;
use config::Verb;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Rewrites infected files without the injected code.
///
/// The file is quarantined first, then streamed through the expressions of
/// every rule it matched. Each rewritten block is scanned again and the
/// result only replaces the original path when none of those rules match
/// anymore. A failed clean leaves the file in quarantine.
pub struct Cleaner {
    dir: Option<PathBuf>,
    config: BTreeMap<String, Vec<String>>,
    ruleset: Arc<dyn Ruleset>,
    block_size: usize,
    exprs: Arc<BTreeMap<String, Vec<SedExpr>>>,
}

impl Cleaner {
    pub fn new(
        dir: Option<PathBuf>,
        config: BTreeMap<String, Vec<String>>,
        ruleset: Arc<dyn Ruleset>,
        block_size: usize,
    ) -> Self {
        Self {
            dir,
            config,
            ruleset,
            block_size,
            exprs: Arc::default(),
        }
    }
}

#[async_trait]
impl Acter for Cleaner {
    async fn load(&mut self) -> Result<Loaded, Error> {
        match &self.dir {
            Some(dir) if !dir.as_os_str().is_empty() => {}
            _ => return Ok(Loaded::Disabled),
        }
        let exprs = self
            .config
            .iter()
            .map(|(rule, exprs)| {
                let exprs = exprs
                    .iter()
                    .map(|expr| SedExpr::parse(expr))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((rule.clone(), exprs))
            })
            .collect::<Result<BTreeMap<_, _>, Error>>()?;
        self.exprs = Arc::new(exprs);
        Ok(Loaded::Enabled)
    }

    fn verb(&self) -> Verb {
        Verb::Clean
    }

    async fn act(&self, view: &mut ResultView<'_>) -> Result<(), Error> {
        let dir = self.dir.clone().ok_or(Error::QuarantineDisabled)?;
        let errs = view.errs();
        for (path, meta) in view.iter_mut() {
            let job = CleanJob {
                dir: dir.clone(),
                exprs: Arc::clone(&self.exprs),
                ruleset: Arc::clone(&self.ruleset),
                block_size: self.block_size,
                path: path.to_path_buf(),
                rules: meta.rules.clone(),
                attr: meta.attr,
            };
            let status = meta.status.clone();
            match tokio::task::spawn_blocking(move || job.run(status)).await {
                Ok((status, result)) => {
                    meta.status = status;
                    if let Err(err) = result {
                        errs.add(err);
                    }
                }
                Err(err) => errs.add(err.into()),
            }
        }
        Ok(())
    }
}

struct CleanJob {
    dir: PathBuf,
    exprs: Arc<BTreeMap<String, Vec<SedExpr>>>,
    ruleset: Arc<dyn Ruleset>,
    block_size: usize,
    path: PathBuf,
    rules: BTreeSet<String>,
    attr: Attr,
}

impl CleanJob {
    /// Returns the status the file ends up with alongside the outcome.
    fn run(self, status: Status) -> (Status, Result<(), Error>) {
        let (status, source) = match status {
            Status::Quarantined(name) => {
                let source = fsys::quarantine_location(&self.dir, &self.path, &name);
                (Status::Quarantined(name), source)
            }
            status => match fsys::quarantine(&self.dir, &self.path, &self.attr) {
                Ok(dst) => (Status::Quarantined(fsys::file_name(&dst)), dst),
                Err(err) => return (status, Err(err)),
            },
        };
        let result = self.replace_with_clean(&source);
        (status, result)
    }

    fn replace_with_clean(&self, source: &Path) -> Result<(), Error> {
        let mut exprs = Vec::new();
        for rule in &self.rules {
            match self.exprs.get(rule) {
                Some(list) if !list.is_empty() => exprs.extend(list.iter().cloned()),
                _ => {
                    return Err(Error::NoCleanExpr {
                        rule: rule.clone(),
                        path: self.path.clone(),
                    });
                }
            }
        }

        let mut clean = source.as_os_str().to_owned();
        clean.push("-clean");
        let clean = PathBuf::from(clean);

        let result = self
            .rewrite(source, &clean, &exprs)
            .and_then(|()| fsys::move_file(&clean, &self.path, &self.attr));
        if result.is_err() && clean.exists() {
            // The original stays quarantined, the partial copy goes.
            discard(&clean);
        }
        result?;

        info!(path = %self.path.display(), rules = ?self.rules, "cleaned file");
        Ok(())
    }

    fn rewrite(&self, source: &Path, clean: &Path, exprs: &[SedExpr]) -> Result<(), Error> {
        let mut input = File::open(source).map_err(|err| Error::file(source, err))?;
        let mut output = File::create(clean).map_err(|err| Error::file(clean, err))?;
        let mut scanner = self.ruleset.scanner();
        let mut buf = vec![0; fsys::block_size(self.block_size)];

        loop {
            let n = match input.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::file(source, err)),
            };
            let block = apply_all(exprs, &buf[..n]);

            scanner.reset();
            scanner.scan(&block)?;
            if let Some(rule) = scanner.matches().iter().find(|rule| self.rules.contains(*rule)) {
                return Err(Error::CleanFailed {
                    rule: rule.clone(),
                    path: self.path.clone(),
                });
            }

            output
                .write_all(&block)
                .map_err(|err| Error::file(clean, err))?;
        }
        output.sync_all().map_err(|err| Error::file(clean, err))
    }
}

/// Removes a partial clean copy. Returns false, after logging, when the file
/// could not be removed.
fn discard(clean: &Path) -> bool {
    match std::fs::remove_file(clean) {
        Ok(()) => true,
        Err(err) => {
            warn!(path = %clean.display(), %err, "failed to remove partial clean copy");
            false
        }
    }
}
