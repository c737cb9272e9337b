#![forbid(unsafe_code)]

use super::{Acter, Loaded};
use crate::domain::{ResultView, Status};
use crate::error::Error;
use crate::fsys;
use async_trait::async_trait;
use config::Verb;
use std::path::PathBuf;
use tracing::debug;

/// Moves detected files into the quarantine directory.
pub struct Quarantiner {
    dir: Option<PathBuf>,
}

impl Quarantiner {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl Acter for Quarantiner {
    async fn load(&mut self) -> Result<Loaded, Error> {
        Ok(match &self.dir {
            Some(dir) if !dir.as_os_str().is_empty() => Loaded::Enabled,
            _ => Loaded::Disabled,
        })
    }

    fn verb(&self) -> Verb {
        Verb::Quarantine
    }

    async fn act(&self, view: &mut ResultView<'_>) -> Result<(), Error> {
        let dir = self.dir.clone().ok_or(Error::QuarantineDisabled)?;
        let errs = view.errs();
        for (path, meta) in view.iter_mut() {
            if let Status::Quarantined(name) = &meta.status {
                debug!(path = %path.display(), name, "already quarantined");
                continue;
            }
            let dir = dir.clone();
            let src = path.to_path_buf();
            let attr = meta.attr;
            match tokio::task::spawn_blocking(move || fsys::quarantine(&dir, &src, &attr)).await {
                Ok(Ok(dst)) => meta.status = Status::Quarantined(fsys::file_name(&dst)),
                Ok(Err(err)) => errs.add(err),
                Err(err) => errs.add(err.into()),
            }
        }
        Ok(())
    }
}
