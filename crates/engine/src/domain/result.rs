#![forbid(unsafe_code)]

use crate::domain::{Errs, Hit, Meta};
use crate::error::Error;
use crate::targets::{Targets, UNMATCHED_TARGET};
use config::Verb;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One target's batch of detections.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub target: String,
    pub paths: BTreeMap<PathBuf, Meta>,
    pub errs: Errs,
}

impl ScanResult {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            paths: BTreeMap::new(),
            errs: Errs::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Add a hit, merging its rules and verbs into any existing entry for the
    /// same path.
    pub fn insert(&mut self, hit: Hit) {
        match self.paths.get_mut(&hit.path) {
            Some(meta) => {
                meta.rules.extend(hit.meta.rules);
                meta.acts.extend(hit.meta.acts);
                meta.acts.sort();
                meta.acts.dedup();
            }
            None => {
                self.paths.insert(hit.path, hit.meta);
            }
        }
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.paths
            .iter()
            .map(|(path, meta)| Hit {
                path: path.clone(),
                meta: meta.clone(),
            })
            .collect()
    }

    /// A view over the paths whose resolved verbs include `verb`.
    ///
    /// The view borrows the metas in place, so status changes made through it
    /// are seen by whoever looks at the result next.
    pub fn view(&mut self, verb: Verb) -> ResultView<'_> {
        ResultView {
            target: &self.target,
            entries: self
                .paths
                .iter_mut()
                .filter(|(_, meta)| meta.has_act(verb))
                .map(|(path, meta)| (path.as_path(), meta))
                .collect(),
            errs: &self.errs,
        }
    }
}

/// Group hits into results.
///
/// With a fixed `target` every hit lands in one result. Otherwise each path
/// is resolved through `targets`. Results are ordered by target. No hits
/// yields a single empty result so errors still get reported.
pub fn group(target: Option<&str>, hits: Vec<Hit>, targets: &Targets) -> Vec<ScanResult> {
    if hits.is_empty() {
        return vec![ScanResult::new(target.unwrap_or(UNMATCHED_TARGET))];
    }

    let mut results: BTreeMap<String, ScanResult> = BTreeMap::new();
    for hit in hits {
        let key = match target {
            Some(target) => target.to_owned(),
            None => targets.resolve(&hit.path),
        };
        results
            .entry(key)
            .or_insert_with_key(|key| ScanResult::new(key.clone()))
            .insert(hit);
    }
    results.into_values().collect()
}

/// The slice of a [`ScanResult`] handed to one action.
pub struct ResultView<'a> {
    target: &'a str,
    entries: Vec<(&'a Path, &'a mut Meta)>,
    errs: &'a Errs,
}

impl<'a> ResultView<'a> {
    pub fn target(&self) -> &'a str {
        self.target
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Collector for per-path failures. Usable while iterating.
    pub fn errs(&self) -> &'a Errs {
        self.errs
    }

    pub fn record(&self, err: Error) {
        self.errs.add(err);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a Path, &Meta)> + '_ {
        self.entries.iter().map(|(path, meta)| (*path, &**meta))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&'a Path, &mut Meta)> + '_ {
        self.entries.iter_mut().map(|(path, meta)| (*path, &mut **meta))
    }

    pub fn report(&self) -> Report<'_> {
        Report {
            target: self.target,
            hits: self.iter().collect(),
        }
    }
}

/// Serializable summary of a view, sent to alert receivers.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub target: &'a str,
    pub hits: BTreeMap<&'a Path, &'a Meta>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Status;
    use crate::testing::hit;

    fn targets() -> Targets {
        Targets::new([r"^/var/www/(?P<target>[^/]+)"]).unwrap()
    }

    #[test]
    fn groups_by_resolved_target() {
        let hits = vec![
            hit("/var/www/b/x.php", &["eicar"], &[Verb::Alert]),
            hit("/var/www/a/y.php", &["eicar"], &[Verb::Alert]),
            hit("/tmp/z.php", &["eicar"], &[Verb::Alert]),
        ];
        let results = group(None, hits, &targets());
        let names: Vec<_> = results.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(names, ["a", "b", "fs"]);
    }

    #[test]
    fn fixed_target_takes_everything() {
        let hits = vec![
            hit("/var/www/b/x.php", &["eicar"], &[Verb::Alert]),
            hit("/var/www/a/y.php", &["eicar"], &[Verb::Alert]),
        ];
        let results = group(Some("acct"), hits, &targets());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].target, "acct");
        assert_eq!(results[0].len(), 2);
    }

    #[test]
    fn duplicate_paths_merge_rules() {
        let hits = vec![
            hit("/var/www/a/x.php", &["webshell"], &[Verb::Quarantine]),
            hit("/var/www/a/x.php", &["eicar"], &[Verb::Alert]),
        ];
        let results = group(None, hits, &targets());
        assert_eq!(results.len(), 1);
        let meta = &results[0].paths[Path::new("/var/www/a/x.php")];
        assert_eq!(
            meta.rules.iter().map(String::as_str).collect::<Vec<_>>(),
            ["eicar", "webshell"]
        );
        assert_eq!(meta.acts, vec![Verb::Quarantine, Verb::Alert]);
    }

    #[test]
    fn empty_input_yields_one_empty_result() {
        let results = group(None, Vec::new(), &targets());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].target, UNMATCHED_TARGET);
        assert!(results[0].is_empty());
    }

    #[test]
    fn regrouping_is_idempotent() {
        let hits = vec![
            hit("/var/www/a/x.php", &["webshell"], &[Verb::Quarantine]),
            hit("/var/www/a/x.php", &["eicar"], &[Verb::Alert]),
            hit("/var/www/a/y.php", &["eicar"], &[Verb::Alert]),
        ];
        let first = group(None, hits, &targets());
        assert_eq!(first.len(), 1);
        let again = group(None, first[0].hits(), &targets());
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].target, first[0].target);
        assert_eq!(again[0].paths, first[0].paths);
    }

    #[test]
    fn view_mutations_reach_the_result() {
        let mut result = ScanResult::new("a");
        result.insert(hit("/var/www/a/x.php", &["eicar"], &[Verb::Quarantine]));
        result.insert(hit("/var/www/a/y.php", &["eicar"], &[Verb::Alert]));

        {
            let mut view = result.view(Verb::Quarantine);
            assert_eq!(view.len(), 1);
            for (_, meta) in view.iter_mut() {
                meta.status = Status::Quarantined("x.php-1".into());
            }
        }

        let view = result.view(Verb::Alert);
        assert_eq!(view.len(), 1);
        assert_eq!(
            result.paths[Path::new("/var/www/a/x.php")].status,
            Status::Quarantined("x.php-1".into())
        );
    }
}
