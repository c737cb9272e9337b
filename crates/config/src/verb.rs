use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A remediation action applied to a detection.
///
/// The declaration order is the order in which actions run against a batch.
/// Later actions observe the disposition left by earlier ones, so exile must
/// read the file before quarantine moves it away.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Verb {
    /// Upload the file to remote object storage.
    #[serde(rename = "exile")]
    Exile,

    /// Move the file into the quarantine directory.
    #[serde(rename = "quarantine")]
    Quarantine,

    /// Strip the malicious content in place.
    #[serde(rename = "clean")]
    Clean,

    /// Notify the configured alert senders.
    #[serde(rename = "alert")]
    Alert,
}

impl Verb {
    pub const ALL: [Verb; 4] = [Verb::Exile, Verb::Quarantine, Verb::Clean, Verb::Alert];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Exile => "exile",
            Verb::Quarantine => "quarantine",
            Verb::Clean => "clean",
            Verb::Alert => "alert",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|verb| verb.as_str() == s)
            .ok_or_else(|| Error::UnknownVerb(s.to_owned()))
    }
}
