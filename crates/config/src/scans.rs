use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::path::PathBuf;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Scans {
    /// Regular expressions mapping a file path to its target, usually a
    /// hosting account. The named group `target` is used when present,
    /// otherwise the first capture group. Paths matching none of them belong
    /// to the `fs` target.
    pub targets: Vec<String>,

    /// Scan roots. Glob patterns are expanded at scan time.
    pub paths: Vec<String>,

    /// Upper bound for a single scan job. **Measured in seconds**.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub timeout: Duration,

    /// Skip files whose ctime and mtime are both older than this many days.
    /// Zero scans everything.
    pub max_age: u32,

    /// Read size used when feeding files to the signature engine. Each worker
    /// shrinks it by a random factor of up to 20% so block boundaries differ
    /// between workers.
    pub block_size: usize,

    /// Maximum number of detections handed to the actions at once.
    pub batch_size: usize,

    /// Capacity of the path queue between the producer and the workers.
    pub queue_size: usize,

    /// Compiled signature file.
    pub signatures: PathBuf,

    pub monitor: Monitor,
}

impl Default for Scans {
    fn default() -> Self {
        Self {
            targets: vec![r"^/var/www/(?P<target>[^/]+)".into()],
            paths: vec!["/var/www".into()],
            timeout: Duration::from_secs(60 * 60),
            max_age: 0,
            block_size: 65536,
            batch_size: 500,
            queue_size: 4096,
            signatures: PathBuf::from("/opt/malwatch/sigs/rules.toml"),
            monitor: Monitor::default(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Monitor {
    /// How long written files are left to settle before the accumulated
    /// detections are acted upon. **Measured in seconds**.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub interval: Duration,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}
