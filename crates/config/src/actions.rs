#![forbid(unsafe_code)]

use crate::{Error, Verb};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// Rule key that applies to every rule under a path.
pub const WILDCARD_RULE: &str = "*";

/// Verb resolution table and action settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Actions {
    /// Verbs applied to a detection when nothing more specific is configured.
    pub default: Vec<Verb>,

    /// Per-rule verbs. An empty list whitelists the rule everywhere.
    pub signatures: BTreeMap<String, Vec<Verb>>,

    /// Per-path, per-rule verbs. Keys are absolute file or directory paths
    /// without a trailing slash. The rule key `*` applies to all rules, and
    /// `"*" = []` excludes the path from scanning altogether.
    pub paths: BTreeMap<String, BTreeMap<String, Vec<Verb>>>,

    pub quarantine: Quarantine,

    /// Sed-style substitutions (`s/pattern/replacement/flags`) used to
    /// disinfect files, keyed by rule name.
    pub clean: BTreeMap<String, Vec<String>>,
}

impl Default for Actions {
    fn default() -> Self {
        Self {
            default: vec![Verb::Alert],
            signatures: BTreeMap::new(),
            paths: BTreeMap::new(),
            quarantine: Quarantine::default(),
            clean: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Quarantine {
    /// Quarantine directory. Quarantine and clean are disabled when unset.
    pub dir: Option<PathBuf>,
}

/// A rule and the verbs configured for it under one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Loadout {
    pub rule: String,
    pub actions: Vec<Verb>,
}

/// Rule names consist of word characters, optionally with `*`.
pub fn is_valid_rule_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '*')
}

fn normalize(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    }
}

fn merge(list: &mut Vec<Verb>, verbs: &[Verb]) {
    if verbs.is_empty() {
        list.clear();
        return;
    }
    list.extend_from_slice(verbs);
    list.sort();
    list.dedup();
}

impl Actions {
    /// Loadouts configured for `path`.
    pub fn loadouts(&self, path: &str) -> Vec<Loadout> {
        self.paths
            .get(normalize(path))
            .map(|rules| {
                rules
                    .iter()
                    .map(|(rule, actions)| Loadout {
                        rule: rule.clone(),
                        actions: actions.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Add verbs to a rule. An empty `verbs` whitelists the rule.
    pub fn add_sig_verbs(&mut self, rule: &str, verbs: &[Verb]) -> Result<(), Error> {
        if !is_valid_rule_name(rule) {
            return Err(Error::InvalidRuleName(rule.to_owned()));
        }
        if rule == WILDCARD_RULE {
            return Err(Error::WildcardSignature);
        }

        info!(?verbs, rule, "setting actions");
        merge(self.signatures.entry(rule.to_owned()).or_default(), verbs);
        Ok(())
    }

    /// Replace a rule's verbs.
    pub fn set_sig_verbs(&mut self, rule: &str, verbs: &[Verb]) -> Result<(), Error> {
        if !is_valid_rule_name(rule) {
            return Err(Error::InvalidRuleName(rule.to_owned()));
        }
        if let Some(list) = self.signatures.get_mut(rule) {
            list.clear();
        }
        self.add_sig_verbs(rule, verbs)
    }

    pub fn del_sig_verbs(&mut self, rule: &str) -> Result<(), Error> {
        if self.signatures.remove(rule).is_none() {
            return Err(Error::NoActions(rule.to_owned()));
        }
        info!(rule, "deleted actions");
        Ok(())
    }

    /// Add verbs for a rule under a path. An empty `verbs` whitelists the
    /// rule for that path.
    ///
    /// Configuring the wildcard rule, or adding to a path that already has
    /// one, replaces every other rule configured for the path.
    pub fn add_path_verbs(&mut self, path: &str, rule: &str, verbs: &[Verb]) -> Result<(), Error> {
        let path = normalize(path);
        if !path.starts_with('/') {
            return Err(Error::PathNotAbsolute(path.to_owned()));
        }
        if !is_valid_rule_name(rule) {
            return Err(Error::InvalidRuleName(rule.to_owned()));
        }

        let rules = self.paths.entry(path.to_owned()).or_default();
        if rule == WILDCARD_RULE || rules.contains_key(WILDCARD_RULE) {
            rules.clear();
        }

        info!(?verbs, path, rule, "setting actions");
        merge(rules.entry(rule.to_owned()).or_default(), verbs);
        Ok(())
    }

    /// Replace the verbs for a rule under a path.
    pub fn set_path_verbs(&mut self, path: &str, rule: &str, verbs: &[Verb]) -> Result<(), Error> {
        if let Some(list) = self
            .paths
            .get_mut(normalize(path))
            .and_then(|rules| rules.get_mut(rule))
        {
            list.clear();
        }
        self.add_path_verbs(path, rule, verbs)
    }

    pub fn del_path_verbs(&mut self, path: &str) -> Result<(), Error> {
        let path = normalize(path);
        if self.paths.remove(path).is_none() {
            return Err(Error::NoActions(path.to_owned()));
        }
        info!(path, "deleted actions");
        Ok(())
    }
}
