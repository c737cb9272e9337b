#![forbid(unsafe_code)]

//! Off-host storage for exiled files.

mod s3;

pub use s3::S3Store;

use crate::error::Error;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `path` under [`object_key`].
    async fn upload(&self, path: &Path) -> Result<(), Error>;

    /// Fetch the object stored for `path` and write it to `dst`.
    async fn download(&self, path: &Path, dst: &Path) -> Result<(), Error>;
}

/// Objects are keyed by their absolute path without the leading slash.
pub fn object_key(path: &Path) -> String {
    path.to_string_lossy().trim_start_matches('/').to_owned()
}
