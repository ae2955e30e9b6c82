use crate::utils::error::{BuildFailure, Result, WedError};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};

pub const DEFAULT_BUILD_CONCURRENCY: usize = 4;

/// Outcome of draining a [`run_bounded`] group.
#[derive(Debug)]
pub struct JobResults<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<BuildFailure>,
}

impl<T> JobResults<T> {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Runs independent labelled jobs with at most `concurrency` in flight.
///
/// Every job runs to completion: a failure never aborts its siblings, and all
/// failures are returned together once the group has drained. Completion order
/// is unspecified.
pub async fn run_bounded<T, Fut>(
    concurrency: usize,
    jobs: impl IntoIterator<Item = (String, Fut)>,
) -> JobResults<T>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut labels: HashMap<Id, String> = HashMap::new();

    for (label, job) in jobs {
        let semaphore = Arc::clone(&semaphore);
        let handle = tasks.spawn(async move {
            match semaphore.acquire_owned().await {
                Ok(_permit) => job.await,
                Err(e) => Err(WedError::config(format!("build pool closed: {}", e))),
            }
        });
        labels.insert(handle.id(), label);
    }

    let mut results = JobResults {
        succeeded: Vec::new(),
        failed: Vec::new(),
    };

    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, outcome) = match joined {
            Ok((id, outcome)) => (id, outcome.map_err(|e| e.to_string())),
            Err(e) => (e.id(), Err(format!("build task aborted: {}", e))),
        };
        let unit = labels
            .remove(&id)
            .unwrap_or_else(|| format!("task {}", id));

        match outcome {
            Ok(value) => results.succeeded.push(value),
            Err(message) => {
                tracing::error!("❌ {} failed: {}", unit, message);
                results.failed.push(BuildFailure { unit, message });
            }
        }
    }

    results
}
