#![forbid(unsafe_code)]

use crate::error::Error;
use regex::Regex;
use std::path::Path;

/// Target of paths that match none of the configured patterns.
pub const UNMATCHED_TARGET: &str = "fs";

/// Maps file paths to the target (usually a hosting account) they belong to.
#[derive(Debug, Clone)]
pub struct Targets {
    patterns: Vec<Regex>,
}

impl Targets {
    pub fn new<I, S>(patterns: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| Regex::new(pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// The `target` capture of the first matching pattern, falling back to
    /// its first group, or [`UNMATCHED_TARGET`].
    pub fn resolve(&self, path: &Path) -> String {
        let path = path.to_string_lossy();
        self.patterns
            .iter()
            .filter_map(|re| re.captures(&path))
            .filter_map(|caps| caps.name("target").or_else(|| caps.get(1)))
            .map(|m| m.as_str())
            .find(|target| !target.is_empty())
            .unwrap_or(UNMATCHED_TARGET)
            .to_owned()
    }

    pub fn is_unmatched(&self, path: &Path) -> bool {
        self.resolve(path) == UNMATCHED_TARGET
    }
}
