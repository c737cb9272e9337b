#![forbid(unsafe_code)]

use crate::domain::ScanResult;
use crate::error::Error;
use crate::persistence::ResultStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, warn};

/// Post-processing of a result once every action has run.
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, result: &ScanResult) -> Result<(), Error>;
}

/// Tasks run in order. A failing task does not stop the rest. Tasks only
/// read the errors recorded on a result; they are drained and logged once
/// every task has run.
#[derive(Default)]
pub struct Tasks {
    tasks: Vec<Box<dyn Task>>,
}

impl Tasks {
    pub fn new(tasks: Vec<Box<dyn Task>>) -> Self {
        Self { tasks }
    }

    pub fn push(&mut self, task: Box<dyn Task>) {
        self.tasks.push(task);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|task| task.name()).collect()
    }

    /// Errors recorded by actions or tasks are logged afterwards.
    pub async fn run(&self, result: &ScanResult) {
        for task in &self.tasks {
            if let Err(err) = task.run(result).await {
                result.errs.add(err);
            }
        }
        for err in result.errs.take() {
            error!(target = %result.target, %err, "error processing detections");
        }
    }
}

/// Appends the result to the store.
pub struct SaveTask {
    store: Arc<dyn ResultStore>,
}

impl SaveTask {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Task for SaveTask {
    fn name(&self) -> &'static str {
        "save"
    }

    async fn run(&self, result: &ScanResult) -> Result<(), Error> {
        self.store.save(result).await
    }
}

/// One warning per detection, plus a count of recorded failures.
#[derive(Debug, Default)]
pub struct LogTask;

#[async_trait]
impl Task for LogTask {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn run(&self, result: &ScanResult) -> Result<(), Error> {
        for (path, meta) in &result.paths {
            warn!(
                target = %result.target,
                path = %path.display(),
                rules = ?meta.rules,
                acts = ?meta.acts,
                status = %meta.status,
                "malware detected"
            );
        }
        let errs = result.errs.len();
        if errs > 0 {
            warn!(target = %result.target, errs, "detections processed with errors");
        }
        Ok(())
    }
}
