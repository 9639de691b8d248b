//! Bounded batch executor.
//!
//! Runs many independent remote operations concurrently while never holding
//! more than `max_concurrent` calls in flight. Each item sleeps for the pacing
//! delay after releasing its permit, which spreads load on the remote API.
//! Item failures never abort the batch; callers compare the success count
//! against what they required.

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::info;
use warden_types::{AutomationRuleSpec, CategorySpec, ChannelSpec, RemoteResource, RoleSpec};

use crate::config::{BatchConfig, RetryConfig};
use crate::error::RemoteResult;
use crate::resilience::{OperationFailure, OperationOutcome, ResilientExecutor};

/// Anything that can be named in logs while a batch processes it
pub trait BatchItem: Clone {
    fn describe(&self) -> String;
}

impl BatchItem for RemoteResource {
    fn describe(&self) -> String {
        self.name.clone()
    }
}

impl BatchItem for RoleSpec {
    fn describe(&self) -> String {
        self.name.clone()
    }
}

impl BatchItem for CategorySpec {
    fn describe(&self) -> String {
        self.name.clone()
    }
}

impl BatchItem for ChannelSpec {
    fn describe(&self) -> String {
        self.name.clone()
    }
}

impl BatchItem for AutomationRuleSpec {
    fn describe(&self) -> String {
        self.name.clone()
    }
}

impl BatchItem for String {
    fn describe(&self) -> String {
        self.clone()
    }
}

/// Per-item accounting for one batch
#[derive(Debug)]
pub struct BatchReport<I, T> {
    pub attempted: usize,
    /// Items that completed; `None` when the remote reported already absent
    pub completed: Vec<(I, Option<T>)>,
    pub failed: Vec<(I, OperationFailure)>,
}

impl<I, T> BatchReport<I, T> {
    pub fn success_count(&self) -> usize {
        self.completed.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty() && self.completed.len() == self.attempted
    }
}

/// Shared permit pool plus retry policy
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    pacing: Duration,
    resilience: ResilientExecutor,
}

impl BatchExecutor {
    pub fn new(batch: BatchConfig, retry: RetryConfig) -> Self {
        let max_concurrent = batch.max_concurrent.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            pacing: batch.pacing(),
            resilience: ResilientExecutor::new(retry),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn resilience(&self) -> &ResilientExecutor {
        &self.resilience
    }

    /// Run `op` once per item (plus retries) under the shared permit pool
    pub async fn run<I, T, F, Fut>(&self, label: &str, items: Vec<I>, op: F) -> BatchReport<I, T>
    where
        I: BatchItem,
        F: Fn(I) -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        let attempted = items.len();
        let op = &op;

        let tasks = items.into_iter().map(|item| async move {
            let operation = format!("{} {}", label, item.describe());
            let outcome = {
                // The pool is never closed, so acquisition only waits.
                let _permit = self.permits.acquire().await.ok();
                self.resilience.run(&operation, || op(item.clone())).await
            };
            tokio::time::sleep(self.pacing).await;
            (item, outcome)
        });

        let mut report = BatchReport {
            attempted,
            completed: Vec::with_capacity(attempted),
            failed: Vec::new(),
        };

        for (item, outcome) in join_all(tasks).await {
            match outcome {
                OperationOutcome::Completed(value) => report.completed.push((item, Some(value))),
                OperationOutcome::AlreadyAbsent => report.completed.push((item, None)),
                OperationOutcome::Failed(failure) => report.failed.push((item, failure)),
            }
        }

        info!(
            batch = label,
            attempted,
            succeeded = report.success_count(),
            failed = report.failure_count(),
            "Batch finished"
        );

        report
    }
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::new(BatchConfig::default(), RetryConfig::default())
    }
}
