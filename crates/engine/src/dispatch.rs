#![forbid(unsafe_code)]

use crate::act::Pipeline;
use crate::domain::{Hit, ScanResult, group};
use crate::targets::Targets;
use crate::tasks::Tasks;
use std::sync::Arc;
use tracing::debug;

/// Turns accumulated hits into results and runs them through the actions and
/// the post-processing tasks.
pub struct Dispatcher {
    targets: Arc<Targets>,
    pipeline: Pipeline,
    tasks: Tasks,
}

impl Dispatcher {
    pub fn new(targets: Arc<Targets>, pipeline: Pipeline, tasks: Tasks) -> Self {
        Self {
            targets,
            pipeline,
            tasks,
        }
    }

    pub fn targets(&self) -> &Arc<Targets> {
        &self.targets
    }

    /// Group `hits` by target and process every resulting batch in target
    /// order. Returns the number of results processed.
    pub async fn flush(&self, target: Option<&str>, hits: Vec<Hit>) -> usize {
        let results = group(target, hits, &self.targets);
        let count = results.len();
        for mut result in results {
            debug!(target = %result.target, hits = result.len(), "flushing result");
            self.acts(&mut result).await;
            self.tasks(&result).await;
        }
        count
    }

    /// [`Dispatcher::flush`] in slices of at most `batch_size` hits.
    pub async fn flush_chunked(
        &self,
        target: Option<&str>,
        mut hits: Vec<Hit>,
        batch_size: usize,
    ) -> usize {
        let batch_size = batch_size.max(1);
        let mut count = 0;
        while hits.len() > batch_size {
            let rest = hits.split_off(batch_size);
            count += self.flush(target, hits).await;
            hits = rest;
        }
        count + self.flush(target, hits).await
    }

    pub async fn acts(&self, result: &mut ScanResult) {
        self.pipeline.act(result).await;
    }

    pub async fn tasks(&self, result: &ScanResult) {
        self.tasks.run(result).await;
    }
}
