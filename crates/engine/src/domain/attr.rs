#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;

/// Ownership, permission bits and timestamps of a file at detection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attr {
    pub uid: u32,
    pub gid: u32,
    /// Permission bits only, file type excluded.
    pub mode: u32,
    pub ctime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
}

impl From<&Metadata> for Attr {
    fn from(meta: &Metadata) -> Self {
        Self {
            uid: meta.uid(),
            gid: meta.gid(),
            mode: meta.mode() & 0o7777,
            ctime: timestamp(meta.ctime(), meta.ctime_nsec()),
            mtime: timestamp(meta.mtime(), meta.mtime_nsec()),
        }
    }
}

fn timestamp(secs: i64, nsecs: i64) -> DateTime<Utc> {
    let nsecs = u32::try_from(nsecs).unwrap_or_default();
    DateTime::from_timestamp(secs, nsecs).unwrap_or_default()
}
