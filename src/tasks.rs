use crate::app::ports::SourceFetcher;
use crate::error::{GeneError, Result};
use crate::metrics;
use crate::parser::GeneParser;
use crate::types::{SequenceInput, SourceKind, ToolResult};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Cooperative cancellation flag shared by every task of a run. Tasks check
/// it between steps and while sleeping in poll loops.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(GeneError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as this token, so the wait cannot fail.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Sleeps for `delay`, returning early with `Cancelled` if the run is aborted.
    pub async fn sleep(&self, delay: Duration) -> Result<()> {
        self.check()?;
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = self.cancelled() => Err(GeneError::Cancelled),
        }
    }
}

/// Lifecycle of one source's query. `Completed` is terminal.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Completed { result: ToolResult },
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed { .. })
    }

    /// Moves `Pending` to `Running`; any other state is left untouched.
    pub fn start(&mut self) -> bool {
        if matches!(self, TaskState::Pending) {
            *self = TaskState::Running;
            true
        } else {
            false
        }
    }

    /// Records the outcome unless the task already completed.
    pub fn complete(&mut self, result: ToolResult) -> bool {
        if self.is_terminal() {
            false
        } else {
            *self = TaskState::Completed { result };
            true
        }
    }
}

/// Everything a spawned task needs, owned so it can move onto the runtime.
pub struct QueryTask {
    pub source: SourceKind,
    /// `Err` carries the reason the source cannot be queried.
    pub fetcher: std::result::Result<Arc<dyn SourceFetcher>, String>,
    pub parser: Arc<dyn GeneParser>,
    pub sequence: Arc<SequenceInput>,
    pub cancel: CancelToken,
    pub deadline: Duration,
}

impl QueryTask {
    /// Fetch then parse under the task deadline. Every error, including the
    /// deadline expiring, becomes a `Failure` result for this source only.
    #[instrument(skip(self), fields(source = %self.source))]
    pub async fn run(self) -> ToolResult {
        let started = Instant::now();
        let deadline = self.deadline;
        let source = self.source;
        info!("querying {}", source.display_name());

        let outcome = match tokio::time::timeout(deadline, self.fetch_and_parse()).await {
            Ok(result) => result,
            Err(_) => Err(GeneError::Timeout(deadline.as_secs())),
        };

        let elapsed = started.elapsed();
        let result = ToolResult::from(outcome);
        match &result {
            ToolResult::Success { genes } => {
                info!("{} returned {} genes in {:.1}s", source, genes.len(), elapsed.as_secs_f64());
            }
            ToolResult::Failure { kind, message } => {
                warn!("{} failed ({}): {}", source, kind, message);
            }
        }
        metrics::record_task_outcome(source, &result, elapsed);
        result
    }

    async fn fetch_and_parse(&self) -> Result<Vec<crate::gene::Gene>> {
        self.cancel.check()?;
        let fetcher = match &self.fetcher {
            Ok(fetcher) => fetcher.clone(),
            Err(reason) => return Err(GeneError::Config(reason.clone())),
        };
        let raw = fetcher.fetch(&self.sequence, &self.cancel).await?;
        debug!("{} raw output {} bytes", self.source, raw.len());
        self.cancel.check()?;
        self.parser.parse(&raw)
    }
}
