#![forbid(unsafe_code)]

mod actions;
mod alerts;
mod error;
mod install;
mod scans;
mod secrets;
mod verb;

pub use actions::{Actions, Loadout, Quarantine, WILDCARD_RULE, is_valid_rule_name};
pub use alerts::{Alerts, JsonAlert, PagerDutyAlert, SenderConfig, SmtpAlert};
pub use error::Error;
pub use install::Install;
pub use scans::{Monitor, Scans};
pub use secrets::{Json, PagerDuty, S3, Secrets, Smtp};
pub use verb::Verb;

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Name of this host in alerts. Defaults to the hostname.
    pub identifier: String,

    /// Number of scan workers. Zero uses the available parallelism.
    pub threads: usize,

    pub install: Install,
    pub scans: Scans,
    pub actions: Actions,
    pub secrets: Secrets,
    pub alerts: Alerts,
}

impl Config {
    /// Load configuration from a TOML file. Missing fields are filled with defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        let mut config: Config = toml_edit::de::from_str(&text)?;
        config.apply_defaults();
        Ok(config)
    }

    /// Edit the `[actions]` table of the file at `path` and write it back.
    /// Everything else in the document, comments included, is kept as
    /// written. A missing file is created. Returns the saved table.
    pub fn edit_actions<F>(path: impl AsRef<Path>, edit: F) -> Result<Actions, Error>
    where
        F: FnOnce(&mut Actions) -> Result<(), Error>,
    {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };
        let mut doc: toml_edit::DocumentMut = text.parse()?;
        let mut actions = toml_edit::de::from_str::<Config>(&text)?.actions;
        edit(&mut actions)?;

        #[derive(Serialize)]
        struct Section<'a> {
            actions: &'a Actions,
        }
        let section: toml_edit::DocumentMut =
            toml_edit::ser::to_string_pretty(&Section { actions: &actions })?.parse()?;
        if let Some(item) = section.get("actions") {
            doc.insert("actions", item.clone());
        }
        std::fs::write(path, doc.to_string())?;
        Ok(actions)
    }

    /// Load configuration from multiple TOML files. Later files override earlier ones.
    pub fn load_multiple<T, U>(paths: U) -> Result<Self, Error>
    where
        T: AsRef<Path>,
        U: IntoIterator<Item = T>,
    {
        let mut merged = toml_edit::DocumentMut::new();
        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                continue;
            }
            let text = std::fs::read_to_string(path)?;
            let doc: toml_edit::DocumentMut = text.parse()?;
            merge_document(&mut merged, doc);
        }
        let mut config: Config = toml_edit::de::from_str(&merged.to_string())?;
        config.apply_defaults();
        Ok(config)
    }

    fn apply_defaults(&mut self) {
        if self.identifier.is_empty() {
            self.identifier = nix::unistd::gethostname()
                .ok()
                .and_then(|name| name.into_string().ok())
                .unwrap_or_else(|| "malwatch".into());
        }
        if self.threads == 0 {
            self.threads = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
        }
        for list in self.actions.signatures.values_mut() {
            list.sort();
            list.dedup();
        }
        for rules in self.actions.paths.values_mut() {
            for list in rules.values_mut() {
                list.sort();
                list.dedup();
            }
        }
    }
}

fn merge_document(target: &mut toml_edit::DocumentMut, source: toml_edit::DocumentMut) {
    for (key, item) in source.iter() {
        merge_item(
            target.entry(key).or_insert(toml_edit::Item::None),
            item.clone(),
        );
    }
}

fn merge_item(target: &mut toml_edit::Item, source: toml_edit::Item) {
    use toml_edit::Item;
    match (target, source) {
        (Item::Table(target_table), Item::Table(source_table)) => {
            for (key, item) in source_table.iter() {
                merge_item(target_table.entry(key).or_insert(Item::None), item.clone());
            }
        }
        (Item::ArrayOfTables(target_array), Item::ArrayOfTables(source_array)) => {
            for table in source_array.iter() {
                target_array.push(table.clone());
            }
        }
        (target_item, source_item) => {
            *target_item = source_item;
        }
    }
}
