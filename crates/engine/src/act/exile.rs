#![forbid(unsafe_code)]

use super::{Acter, Loaded};
use crate::domain::{ResultView, Status};
use crate::error::Error;
use crate::fsys;
use crate::remote::{ObjectStore, S3Store};
use async_trait::async_trait;
use config::Verb;
use std::sync::Arc;
use tracing::info;

/// Uploads detected files to remote storage and removes the local copy
/// unless a later action still needs it.
pub struct Exiler {
    s3: config::S3,
    remote: Option<Arc<dyn ObjectStore>>,
}

impl Exiler {
    pub fn new(s3: config::S3) -> Self {
        Self { s3, remote: None }
    }

    /// Use `remote` instead of building an S3 client on load.
    pub fn with_remote(s3: config::S3, remote: Arc<dyn ObjectStore>) -> Self {
        Self {
            s3,
            remote: Some(remote),
        }
    }
}

#[async_trait]
impl Acter for Exiler {
    async fn load(&mut self) -> Result<Loaded, Error> {
        if self.s3.endpoint.is_empty() {
            return Ok(Loaded::Disabled);
        }
        if self.remote.is_none() {
            self.remote = Some(Arc::new(S3Store::new(&self.s3)?));
        }
        Ok(Loaded::Enabled)
    }

    fn verb(&self) -> Verb {
        Verb::Exile
    }

    async fn act(&self, view: &mut ResultView<'_>) -> Result<(), Error> {
        let remote = self.remote.as_ref().ok_or(Error::RemoteDisabled)?;
        if self.s3.region.is_empty() {
            return Err(Error::MissingRegion);
        }

        let errs = view.errs();
        for (path, meta) in view.iter_mut() {
            if let Err(err) = remote.upload(path).await {
                errs.add(err);
                continue;
            }
            meta.status = Status::Exiled(fsys::file_name(path));

            if meta.has_act(Verb::Quarantine) || meta.has_act(Verb::Clean) {
                continue;
            }
            match tokio::fs::remove_file(path).await {
                Ok(()) => info!(path = %path.display(), "removed exiled file"),
                Err(err) => errs.add(Error::file(path, err)),
            }
        }
        Ok(())
    }
}
