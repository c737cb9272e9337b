#![forbid(unsafe_code)]

pub mod act;
pub mod alert;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod fsys;
pub mod monitor;
pub mod persistence;
pub mod remote;
pub mod resolve;
pub mod restore;
pub mod scan;
pub mod skips;
pub mod targets;
pub mod tasks;

#[cfg(test)]
mod testing;

pub use act::{Acter, Alerter, Cleaner, Exiler, Loaded, Pipeline, Quarantiner, SedExpr};
pub use alert::{JsonSender, PagerDutySender, Sender, SmtpSender};
pub use dispatch::Dispatcher;
pub use domain::{Attr, Hit, Meta, Report, ResultView, ScanResult, Status};
pub use error::Error;
pub use monitor::{ChannelSource, EventSource, FanotifySource, FileEvent, Monitor};
pub use persistence::{NoopStore, ResultStore, SqliteStore};
pub use remote::{ObjectStore, S3Store};
pub use resolve::ActionResolver;
pub use restore::restore;
pub use scan::{Job, PathWalker, RegexRuleset, Ruleset, Scan, Scanner, Worker, glob_paths};
pub use skips::Skips;
pub use targets::{Targets, UNMATCHED_TARGET};
pub use tasks::{LogTask, SaveTask, Task, Tasks};
