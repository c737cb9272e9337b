use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use config::Verb;
use std::path::{Path, PathBuf};

/// malwatch: malware detection and response for shared web hosts
///
/// malwatch scans hosting accounts for files matching a signature set and
/// acts on what it finds: exiling to object storage, quarantining, cleaning
/// and alerting, as configured per signature and per path.
#[derive(Debug, Parser, Clone)]
#[command(about, long_about, version)]
pub struct Cli {
    /// Path to configuration file.
    ///
    /// If not provided, the default locations are checked. They are
    /// `/etc/malwatch/config.toml` and `/etc/malwatch/config.d/*.toml`,
    /// where the latter being a glob pattern. If they don't exist, the default
    /// configuration is used.
    #[arg(short, long, value_parser = validate_file)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Scan files once and act on detections.
    Scan {
        /// Glob patterns to scan instead of the configured paths.
        paths: Vec<String>,

        /// Do not print detection tables.
        #[arg(short, long)]
        unattended: bool,
    },

    /// Scan files as they are written until interrupted.
    Monitor,

    /// Put the latest quarantined or exiled copy of a file back in place.
    Restore {
        #[arg(value_parser = validate_absolute)]
        path: PathBuf,
    },

    /// Quarantine a file by hand and record it in the history.
    Quarantine {
        #[arg(value_parser = validate_absolute)]
        path: PathBuf,
    },

    /// Upload a file to remote storage, remove it, and record it in the
    /// history.
    Exile {
        #[arg(value_parser = validate_absolute)]
        path: PathBuf,
    },

    /// Show or edit the actions taken per signature and per path.
    ///
    /// Edits are written to the file given with `--config`, or to
    /// `/etc/malwatch/config.toml`.
    #[command(subcommand)]
    Actions(ActionsCommand),

    /// Show or forget recorded detections.
    #[command(subcommand)]
    History(HistoryCommand),
}

#[derive(Debug, Subcommand, Clone)]
pub enum ActionsCommand {
    /// Actions configured for a signature, or for every rule under a path.
    Get { key: String },

    /// Add actions to a signature, or to a rule under a path. Without
    /// actions the signature or rule is whitelisted.
    Add(ActionsEdit),

    /// Replace the actions of a signature, or of a rule under a path.
    Set(ActionsEdit),

    /// Remove a signature, or a path with all of its rules.
    Del { key: String },
}

#[derive(Debug, clap::Args, Clone)]
pub struct ActionsEdit {
    /// Signature name, or an absolute path.
    pub key: String,

    /// Rule under the path. Defaults to `*`, all rules; `*` without actions
    /// excludes the path from scanning.
    #[arg(short, long)]
    pub rule: Option<String>,

    /// Any of exile, quarantine, clean and alert.
    pub verbs: Vec<Verb>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum HistoryCommand {
    /// Every detection, or those of a target, or the latest for a path.
    Get { key: Option<String> },

    /// Forget the detections of a target or a path.
    Del { key: String },
}

/// Check if the file exists.
#[inline(always)]
fn validate_file(file: &str) -> Result<PathBuf, String> {
    let path = Path::new(file);
    if path.exists() {
        Ok(path.to_owned())
    } else {
        Err(format!("File not found: {:?}", path))
    }
}

/// Detections are recorded by absolute path.
#[inline(always)]
fn validate_absolute(path: &str) -> Result<PathBuf, String> {
    let path = Path::new(path);
    if path.is_absolute() && path != Path::new("/") {
        Ok(path.to_owned())
    } else {
        Err(format!("`{}` is not an absolute file path", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn path_candidates() -> impl Strategy<Value = String> {
        prop_oneof![
            2 => "(/[a-z0-9._-]{1,8}){1,4}",
            1 => "[a-z0-9._-]{1,8}(/[a-z0-9._-]{1,8}){0,3}",
            1 => ".*",
        ]
    }

    proptest! {
        #[test]
        fn test_validate_absolute(path in path_candidates()) {
            match validate_absolute(&path) {
                Ok(p) => prop_assert!(p.is_absolute() && p != Path::new("/")),
                Err(err) => prop_assert!(err.ends_with("is not an absolute file path")),
            }
        }
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["malwatch", "scan", "-u", "/var/www/*"]).unwrap();
        match cli.command {
            Command::Scan { paths, unattended } => {
                assert_eq!(paths, ["/var/www/*"]);
                assert!(unattended);
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from(["malwatch", "restore", "index.php"]).is_err());
        assert!(Cli::try_parse_from(["malwatch", "quarantine", "index.php"]).is_err());
        assert!(matches!(
            Cli::try_parse_from(["malwatch", "-v", "monitor"]).unwrap().command,
            Command::Monitor
        ));
    }

    #[test]
    fn parses_action_edits() {
        let cli = Cli::try_parse_from([
            "malwatch", "actions", "set", "/var/www/site", "-r", "eicar", "quarantine", "alert",
        ])
        .unwrap();
        match cli.command {
            Command::Actions(ActionsCommand::Set(edit)) => {
                assert_eq!(edit.key, "/var/www/site");
                assert_eq!(edit.rule.as_deref(), Some("eicar"));
                assert_eq!(edit.verbs, [Verb::Quarantine, Verb::Alert]);
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from(["malwatch", "actions", "add", "eicar", "shred"]).is_err());
        assert!(matches!(
            Cli::try_parse_from(["malwatch", "history", "get"]).unwrap().command,
            Command::History(HistoryCommand::Get { key: None })
        ));
    }
}
