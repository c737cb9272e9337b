#![forbid(unsafe_code)]

use super::{Ruleset, Scanner};
use crate::error::Error;
use regex::bytes::RegexSet;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default, rename = "rule")]
    rules: Vec<RuleDef>,
}

#[derive(Debug, Deserialize)]
struct RuleDef {
    name: String,
    pattern: String,
}

/// Signature set of named byte regexes.
///
/// ```toml
/// [[rule]]
/// name = "php_eval_base64"
/// pattern = 'eval\(base64_decode\('
/// ```
#[derive(Debug, Clone)]
pub struct RegexRuleset {
    names: Arc<[String]>,
    set: RegexSet,
}

impl RegexRuleset {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| Error::file(path, err))?;
        let file: RuleFile = toml_edit::de::from_str(&text)?;
        if file.rules.is_empty() {
            return Err(Error::NoRules(path.to_path_buf()));
        }
        let ruleset = Self::new(file.rules.into_iter().map(|r| (r.name, r.pattern)))?;
        info!(path = %path.display(), rules = ruleset.len(), "loaded signatures");
        Ok(ruleset)
    }

    pub fn new<I, N, P>(rules: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: AsRef<str>,
    {
        let mut names = Vec::new();
        let mut patterns = Vec::new();
        for (name, pattern) in rules {
            let name = name.into();
            if !config::is_valid_rule_name(&name) || name == config::WILDCARD_RULE {
                return Err(Error::InvalidRuleName(name));
            }
            names.push(name);
            patterns.push(pattern.as_ref().to_owned());
        }
        Ok(Self {
            names: names.into(),
            set: RegexSet::new(patterns)?,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Ruleset for RegexRuleset {
    fn scanner(&self) -> Box<dyn Scanner> {
        Box::new(RegexScanner {
            names: Arc::clone(&self.names),
            set: self.set.clone(),
            matches: BTreeSet::new(),
        })
    }
}

struct RegexScanner {
    names: Arc<[String]>,
    set: RegexSet,
    matches: BTreeSet<String>,
}

impl Scanner for RegexScanner {
    fn scan(&mut self, block: &[u8]) -> Result<(), Error> {
        for idx in self.set.matches(block).iter() {
            if let Some(name) = self.names.get(idx) {
                self.matches.insert(name.clone());
            }
        }
        Ok(())
    }

    fn matches(&self) -> &BTreeSet<String> {
        &self.matches
    }

    fn reset(&mut self) {
        self.matches.clear();
    }
}
