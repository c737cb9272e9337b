#![forbid(unsafe_code)]

use crate::domain::Attr;
use chrono::{DateTime, Utc};
use config::Verb;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Scheme marking a status that refers to remote object storage.
pub const REMOTE_SCHEME: &str = "s3://";

/// Where the detected file currently lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, SerializeDisplay, DeserializeFromStr)]
pub enum Status {
    /// Left in place.
    #[default]
    Detected,
    /// Moved into quarantine under this file name.
    Quarantined(String),
    /// Uploaded to remote storage under this file name.
    Exiled(String),
}

impl Status {
    pub fn is_detected(&self) -> bool {
        matches!(self, Status::Detected)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Detected => Ok(()),
            Status::Quarantined(name) => f.write_str(name),
            Status::Exiled(name) => write!(f, "{REMOTE_SCHEME}{name}"),
        }
    }
}

impl FromStr for Status {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "" => Status::Detected,
            s => match s.strip_prefix(REMOTE_SCHEME) {
                Some(name) => Status::Exiled(name.to_owned()),
                None => Status::Quarantined(s.to_owned()),
            },
        })
    }
}

/// One detection of one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub time: DateTime<Utc>,
    pub rules: BTreeSet<String>,
    /// Resolved verbs, sorted in pipeline order.
    pub acts: Vec<Verb>,
    pub status: Status,
    pub attr: Attr,
}

impl Meta {
    pub fn new(rules: BTreeSet<String>, acts: Vec<Verb>, attr: Attr) -> Self {
        Self {
            time: Utc::now(),
            rules,
            acts,
            status: Status::default(),
            attr,
        }
    }

    pub fn has_act(&self, verb: Verb) -> bool {
        self.acts.contains(&verb)
    }
}

/// A detection emitted by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub path: PathBuf,
    pub meta: Meta,
}
