#![forbid(unsafe_code)]

use crate::fsys::is_within;
use config::{Config, WILDCARD_RULE};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Paths that are neither walked nor monitored.
#[derive(Debug, Clone, Default)]
pub struct Skips {
    dirs: Vec<PathBuf>,
    files: HashSet<PathBuf>,
}

impl Skips {
    pub fn new(dirs: Vec<PathBuf>, files: HashSet<PathBuf>) -> Self {
        Self { dirs, files }
    }

    /// Operational directories plus every path whose wildcard rule is an
    /// empty list.
    pub fn from_config(config: &Config) -> Self {
        let parents = [&config.install.db, &config.install.log]
            .into_iter()
            .filter_map(|path| path.parent().map(Path::to_path_buf));
        let mut dirs: Vec<PathBuf> = [Some(config.install.dir.clone())]
            .into_iter()
            .chain([config.actions.quarantine.dir.clone()])
            .flatten()
            .chain(parents)
            .filter(|dir| !dir.as_os_str().is_empty() && dir != Path::new("."))
            .collect();
        let mut files = HashSet::new();

        for (path, rules) in &config.actions.paths {
            if !rules.get(WILDCARD_RULE).is_some_and(Vec::is_empty) {
                continue;
            }
            match std::fs::metadata(path) {
                Ok(meta) if meta.is_dir() => dirs.push(PathBuf::from(path.trim_end_matches('/'))),
                Ok(_) => {
                    files.insert(PathBuf::from(path));
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path, "skipped path does not exist");
                }
                Err(err) => warn!(path, %err, "failed to stat skipped path"),
            }
        }

        dirs.sort();
        dirs.dedup();
        Self { dirs, files }
    }

    pub fn is_skipped_dir(&self, dir: &Path) -> bool {
        self.dirs.iter().any(|skip| is_within(dir, skip))
    }

    pub fn is_skipped_file(&self, file: &Path) -> bool {
        self.files.contains(file)
    }

    /// Whether `path` is an excluded file or lies under an excluded directory.
    pub fn is_skipped(&self, path: &Path) -> bool {
        self.is_skipped_file(path) || self.is_skipped_dir(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Verb;
    use tempfile::tempdir;

    #[test]
    fn operational_dirs_are_skipped() {
        let mut config = Config::default();
        config.install.dir = "/opt/malwatch".into();
        config.install.db = "/var/lib/malwatch/db.sqlite".into();
        config.install.log = "/var/log/malwatch/malwatch.log".into();
        config.actions.quarantine.dir = Some("/srv/quarantine".into());

        let skips = Skips::from_config(&config);
        assert!(skips.is_skipped(Path::new("/opt/malwatch/sigs/rules.toml")));
        assert!(skips.is_skipped(Path::new("/var/lib/malwatch/db.sqlite")));
        assert!(skips.is_skipped(Path::new("/var/log/malwatch")));
        assert!(skips.is_skipped(Path::new("/srv/quarantine/var/www/x.php-1")));
        assert!(!skips.is_skipped(Path::new("/var/www/site/index.php")));
        assert!(!skips.is_skipped(Path::new("/opt/malwatch-other/x")));
    }

    #[test]
    fn wildcard_whitelist_becomes_skip() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache");
        let file = dir.path().join("vendor.js");
        std::fs::create_dir(&cache).unwrap();
        std::fs::write(&file, b"x").unwrap();

        let mut config = Config::default();
        let cache_key = format!("{}/", cache.display());
        let file_key = file.to_string_lossy().into_owned();
        config.actions.add_path_verbs(&cache_key, "*", &[]).unwrap();
        config.actions.add_path_verbs(&file_key, "*", &[]).unwrap();
        config
            .actions
            .add_path_verbs("/nonexistent/path", "*", &[])
            .unwrap();
        let other = dir.path().join("other.php").to_string_lossy().into_owned();
        config
            .actions
            .add_path_verbs(&other, "*", &[Verb::Alert])
            .unwrap();
        std::fs::write(&other, b"x").unwrap();

        let skips = Skips::from_config(&config);
        assert!(skips.is_skipped_dir(&cache.join("a/b")));
        assert!(skips.is_skipped_file(&file));
        assert!(!skips.is_skipped(Path::new(&other)));
    }
}
