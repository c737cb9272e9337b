use crate::cli::{ActionsCommand, ActionsEdit, HistoryCommand};
use crate::print::{self, PrintTask};
use config::{Actions, Config, Loadout, WILDCARD_RULE};
use engine::{
    Acter, Attr, Dispatcher, Error, Exiler, Hit, LogTask, Meta, Monitor, ObjectStore, Pipeline,
    Quarantiner, RegexRuleset, ResultStore, S3Store, SaveTask, Scan, ScanResult, SqliteStore,
    Status, Targets, Task, Tasks, glob_paths,
};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Wires configuration into the engine for one command.
pub struct App {
    config: Config,
    store: Arc<SqliteStore>,
}

impl App {
    /// Opens the detection history.
    pub async fn new(config: Config) -> Result<Self, Error> {
        let store = Arc::new(SqliteStore::new(config.install.db.clone()).await?);
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn ruleset(&self) -> Result<Arc<RegexRuleset>, Error> {
        Ok(Arc::new(RegexRuleset::load(&self.config.scans.signatures)?))
    }

    /// Actions and tasks for every detection. `print` adds a table per
    /// result on stdout.
    async fn dispatcher(&self, ruleset: Arc<RegexRuleset>, print: bool) -> Result<Arc<Dispatcher>, Error> {
        let targets = Targets::new(&self.config.scans.targets)?;
        let pipeline = Pipeline::load(engine::act::presets(&self.config, ruleset)).await?;

        let mut tasks: Vec<Box<dyn Task>> = vec![
            Box::new(SaveTask::new(Arc::clone(&self.store) as _)),
            Box::new(LogTask),
        ];
        if print {
            tasks.push(Box::new(PrintTask));
        }
        let tasks = Tasks::new(tasks);
        debug!(tasks = ?tasks.names(), "tasks loaded");

        Ok(Arc::new(Dispatcher::new(Arc::new(targets), pipeline, tasks)))
    }

    /// Scan `patterns`, or the configured paths when empty. Returns the number
    /// of detections.
    pub async fn scan(
        &self,
        cancel: &CancellationToken,
        patterns: &[String],
        unattended: bool,
    ) -> Result<usize, Error> {
        let patterns = if patterns.is_empty() {
            self.config.scans.paths.as_slice()
        } else {
            patterns
        };
        let roots = glob_paths(patterns)?;
        info!(roots = roots.len(), "starting scan");

        let ruleset = self.ruleset()?;
        let dispatcher = self.dispatcher(Arc::clone(&ruleset), !unattended).await?;
        Scan::new(&self.config, ruleset, dispatcher).run(cancel, roots).await
    }

    /// Watch the configured paths until `cancel` fires.
    pub async fn monitor(&self, cancel: &CancellationToken) -> Result<(), Error> {
        let ruleset = self.ruleset()?;
        let dispatcher = self.dispatcher(Arc::clone(&ruleset), false).await?;
        Monitor::new(&self.config, ruleset, dispatcher)?.run(cancel).await
    }

    pub async fn restore(&self, path: &Path) -> Result<(), Error> {
        let s3 = &self.config.secrets.s3;
        let remote = if s3.endpoint.is_empty() {
            None
        } else {
            Some(S3Store::new(s3)?)
        };
        engine::restore(
            self.store.as_ref(),
            self.config.actions.quarantine.dir.as_deref(),
            remote.as_ref().map(|remote| remote as &dyn ObjectStore),
            path,
        )
        .await
    }

    /// Quarantine `path` by hand. Returns where it went.
    pub async fn quarantine(&self, path: &Path) -> Result<Status, Error> {
        let dir = self.config.actions.quarantine.dir.clone();
        self.act_on(Box::new(Quarantiner::new(dir)), path, Error::QuarantineDisabled)
            .await
    }

    /// Exile `path` by hand. Returns where it went.
    pub async fn exile(&self, path: &Path) -> Result<Status, Error> {
        let s3 = self.config.secrets.s3.clone();
        self.act_on(Box::new(Exiler::new(s3)), path, Error::RemoteDisabled)
            .await
    }

    /// Run one action on `path` as if it had been detected, then record the
    /// outcome. The first failure is returned after the record is saved.
    async fn act_on(
        &self,
        acter: Box<dyn Acter>,
        path: &Path,
        disabled: Error,
    ) -> Result<Status, Error> {
        let verb = acter.verb();
        let pipeline = Pipeline::load(vec![acter]).await?;
        if pipeline.verbs().is_empty() {
            return Err(disabled);
        }

        let meta = std::fs::metadata(path).map_err(|err| Error::file(path, err))?;
        if meta.is_dir() {
            return Err(Error::IsDirectory(path.to_path_buf()));
        }
        let targets = Targets::new(&self.config.scans.targets)?;
        let mut result = ScanResult::new(targets.resolve(path));
        result.insert(Hit {
            path: path.to_path_buf(),
            meta: Meta::new(BTreeSet::new(), vec![verb], Attr::from(&meta)),
        });

        pipeline.act(&mut result).await;
        self.store.save(&result).await?;

        let mut errs = result.errs.take().into_iter();
        if let Some(first) = errs.next() {
            for err in errs {
                error!(%err, "action failed");
            }
            return Err(first);
        }
        let status = result
            .paths
            .into_values()
            .next()
            .map(|meta| meta.status)
            .unwrap_or_default();
        info!(path = %path.display(), %verb, %status, "action complete");
        Ok(status)
    }

    /// Print recorded detections: all, one target's, or a path's latest.
    pub async fn history(&self, command: &HistoryCommand) -> Result<(), Error> {
        match command {
            HistoryCommand::Get { key: Some(key) } if key.starts_with('/') => {
                let path = Path::new(key);
                let hits = self
                    .store
                    .last(path)
                    .await?
                    .map(|meta| Hit {
                        path: path.to_path_buf(),
                        meta,
                    })
                    .into_iter()
                    .collect::<Vec<_>>();
                let target = Targets::new(&self.config.scans.targets)?.resolve(path);
                println!("{target}\n{}", print::history(&hits));
            }
            HistoryCommand::Get { key } => {
                let records = self.store.history(key.as_deref()).await?;
                let mut targets = records.chunk_by(|(a, _), (b, _)| a == b).peekable();
                if targets.peek().is_none() {
                    println!("{}", print::history(std::iter::empty()));
                }
                for chunk in targets {
                    let target = &chunk[0].0;
                    println!("{target}\n{}", print::history(chunk.iter().map(|(_, hit)| hit)));
                }
            }
            HistoryCommand::Del { key } if key.starts_with('/') => {
                let deleted = self.store.delete_path(Path::new(key)).await?;
                info!(path = %key, deleted, "history removed");
            }
            HistoryCommand::Del { key } => {
                let deleted = self.store.delete_target(key).await?;
                info!(target = %key, deleted, "history removed");
            }
        }
        Ok(())
    }
}

/// Print the loadouts for a signature or a path.
pub fn show_actions(actions: &Actions, key: &str) {
    let loadouts = if key.starts_with('/') {
        actions.loadouts(key)
    } else {
        actions
            .signatures
            .get(key)
            .map(|verbs| {
                vec![Loadout {
                    rule: key.to_owned(),
                    actions: verbs.clone(),
                }]
            })
            .unwrap_or_default()
    };
    println!("{}", print::loadouts(&loadouts));
}

/// Apply an `actions` edit to the config file at `path`. `get` reads
/// `actions` instead of the file.
pub fn edit_actions(path: &Path, actions: &Actions, command: &ActionsCommand) -> Result<(), Error> {
    match command {
        ActionsCommand::Get { key } => show_actions(actions, key),
        ActionsCommand::Add(edit) => {
            Config::edit_actions(path, |actions| apply(actions, edit, false))?;
        }
        ActionsCommand::Set(edit) => {
            Config::edit_actions(path, |actions| apply(actions, edit, true))?;
        }
        ActionsCommand::Del { key } if key.starts_with('/') => {
            Config::edit_actions(path, |actions| actions.del_path_verbs(key))?;
        }
        ActionsCommand::Del { key } => {
            Config::edit_actions(path, |actions| actions.del_sig_verbs(key))?;
        }
    }
    Ok(())
}

fn apply(actions: &mut Actions, edit: &ActionsEdit, replace: bool) -> Result<(), config::Error> {
    let key = edit.key.as_str();
    if !key.starts_with('/') {
        if let Some(rule) = &edit.rule {
            warn!(rule, signature = key, "rule only applies to paths, ignoring");
        }
        return if replace {
            actions.set_sig_verbs(key, &edit.verbs)
        } else {
            actions.add_sig_verbs(key, &edit.verbs)
        };
    }

    let rule = edit.rule.as_deref().unwrap_or(WILDCARD_RULE);
    if replace {
        actions.set_path_verbs(key, rule, &edit.verbs)
    } else {
        actions.add_path_verbs(key, rule, &edit.verbs)
    }
}
