#![forbid(unsafe_code)]
#![allow(dead_code)]

use async_trait::async_trait;
use config::{Config, Verb};
use engine::{Acter, Dispatcher, Error, Loaded, Pipeline, RegexRuleset, ResultView, Targets, Tasks};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const EICAR: &str = "X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

/// Every view an alert action was handed: its target and paths.
#[derive(Default)]
pub struct Calls(Mutex<Vec<(String, Vec<PathBuf>)>>);

impl Calls {
    pub fn take(&self) -> Vec<(String, Vec<PathBuf>)> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

struct Recorder(Arc<Calls>);

#[async_trait]
impl Acter for Recorder {
    async fn load(&mut self) -> Result<Loaded, Error> {
        Ok(Loaded::Enabled)
    }

    fn verb(&self) -> Verb {
        Verb::Alert
    }

    async fn act(&self, view: &mut ResultView<'_>) -> Result<(), Error> {
        let paths = view.iter().map(|(path, _)| path.to_path_buf()).collect();
        self.0.0.lock().unwrap().push((view.target().to_owned(), paths));
        Ok(())
    }
}

pub fn ruleset() -> Arc<RegexRuleset> {
    Arc::new(RegexRuleset::new([("eicar", "EICAR-STANDARD-ANTIVIRUS-TEST-FILE")]).unwrap())
}

/// Sites live under `<root>/www/<target>`.
pub fn config(root: &Path) -> Config {
    let mut config = Config::default();
    config.threads = 4;
    config.scans.targets = vec![format!("^{}/www/(?P<target>[^/]+)", regex_escape(root))];
    config.scans.paths = vec![format!("{}/www/*", root.display())];
    config.install.dir = root.join("opt");
    config.install.db = root.join("opt/db/malwatch.sqlite");
    config.install.log = root.join("opt/log/malwatch.log");
    config
}

pub async fn dispatcher(config: &Config, calls: &Arc<Calls>) -> Arc<Dispatcher> {
    let targets = Targets::new(&config.scans.targets).unwrap();
    let pipeline = Pipeline::load(vec![Box::new(Recorder(Arc::clone(calls)))])
        .await
        .unwrap();
    Arc::new(Dispatcher::new(Arc::new(targets), pipeline, Tasks::default()))
}

fn regex_escape(path: &Path) -> String {
    regex::escape(&path.to_string_lossy())
}
