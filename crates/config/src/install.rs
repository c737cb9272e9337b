use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Operational paths. Their directories are never scanned or monitored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Install {
    pub dir: PathBuf,

    /// Detection history database.
    pub db: PathBuf,

    pub log: PathBuf,
}

impl Default for Install {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/opt/malwatch"),
            db: PathBuf::from("/opt/malwatch/db/malwatch.db"),
            log: PathBuf::from("/opt/malwatch/log/malwatch.log"),
        }
    }
}
