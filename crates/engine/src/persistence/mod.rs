#![forbid(unsafe_code)]

mod repo;

pub use repo::SqliteStore;

use crate::domain::{Hit, Meta, ScanResult};
use crate::error::Error;
use async_trait::async_trait;
use std::path::Path;

/// Durable record of every detection and where its file went.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Append every path of `result`.
    async fn save(&self, result: &ScanResult) -> Result<(), Error>;

    /// The most recent detection of `path`.
    async fn last(&self, path: &Path) -> Result<Option<Meta>, Error>;

    /// Every recorded detection with its target, oldest first within a
    /// target. `target` narrows the history to one target.
    async fn history(&self, target: Option<&str>) -> Result<Vec<(String, Hit)>, Error>;

    /// Forget every detection of `target`. Returns the number removed.
    async fn delete_target(&self, target: &str) -> Result<u64, Error>;

    /// Forget every detection of `path`. Returns the number removed.
    async fn delete_path(&self, path: &Path) -> Result<u64, Error>;
}

#[derive(Debug, Default)]
pub struct NoopStore;

#[async_trait]
impl ResultStore for NoopStore {
    async fn save(&self, _result: &ScanResult) -> Result<(), Error> {
        Ok(())
    }

    async fn last(&self, _path: &Path) -> Result<Option<Meta>, Error> {
        Ok(None)
    }

    async fn history(&self, _target: Option<&str>) -> Result<Vec<(String, Hit)>, Error> {
        Ok(Vec::new())
    }

    async fn delete_target(&self, _target: &str) -> Result<u64, Error> {
        Ok(0)
    }

    async fn delete_path(&self, _path: &Path) -> Result<u64, Error> {
        Ok(0)
    }
}
