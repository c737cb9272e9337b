#![forbid(unsafe_code)]

use config::{Actions, Verb, WILDCARD_RULE};
use std::collections::BTreeMap;
use std::path::Path;

/// Decides which verbs apply to a detection.
#[derive(Debug, Clone, Default)]
pub struct ActionResolver {
    default: Vec<Verb>,
    signatures: BTreeMap<String, Vec<Verb>>,
    paths: BTreeMap<String, BTreeMap<String, Vec<Verb>>>,
}

impl From<&Actions> for ActionResolver {
    fn from(actions: &Actions) -> Self {
        Self {
            default: actions.default.clone(),
            signatures: actions.signatures.clone(),
            paths: actions.paths.clone(),
        }
    }
}

impl ActionResolver {
    /// Sorted, deduplicated verbs for `path` given the rules it matched.
    ///
    /// Each rule is resolved on its own, from most to least specific:
    ///
    /// 1. the file and the rule
    /// 2. the parent directory and the rule
    /// 3. the file and the wildcard rule
    /// 4. the parent directory and the wildcard rule
    /// 5. the rule alone
    /// 6. the default verbs
    ///
    /// An empty list at levels 1, 2 or 5 is a whitelist: it stops the search
    /// and contributes nothing. An empty wildcard list does not stop it.
    pub fn resolve<'r, I>(&self, path: &Path, rules: I) -> Vec<Verb>
    where
        I: IntoIterator<Item = &'r str>,
    {
        let path = path.to_string_lossy();
        let path = match path.strip_suffix('/') {
            Some(trimmed) if !trimmed.is_empty() => trimmed,
            _ => path.as_ref(),
        };
        let parent = Path::new(path)
            .parent()
            .map(|p| p.to_string_lossy())
            .unwrap_or_else(|| path.into());

        let mut verbs: Vec<Verb> = rules
            .into_iter()
            .flat_map(|rule| self.rule_verbs(path, &parent, rule).iter().copied())
            .collect();
        verbs.sort();
        verbs.dedup();
        verbs
    }

    fn rule_verbs(&self, path: &str, parent: &str, rule: &str) -> &[Verb] {
        if let Some(verbs) = self.lookup(path, rule) {
            return verbs;
        }
        if let Some(verbs) = self.lookup(parent, rule) {
            return verbs;
        }
        if let Some(verbs) = self.lookup(path, WILDCARD_RULE).filter(|v| !v.is_empty()) {
            return verbs;
        }
        if let Some(verbs) = self.lookup(parent, WILDCARD_RULE).filter(|v| !v.is_empty()) {
            return verbs;
        }
        if let Some(verbs) = self.signatures.get(rule) {
            return verbs;
        }
        &self.default
    }

    fn lookup(&self, path: &str, rule: &str) -> Option<&[Verb]> {
        self.paths
            .get(path)
            .and_then(|rules| rules.get(rule))
            .map(Vec::as_slice)
    }
}
