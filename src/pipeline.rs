use crate::config::Config;
use crate::consensus::{self, AgreementDenominator, ConsensusGroup};
use crate::error::GeneError;
use crate::gene::Gene;
use crate::metrics;
use crate::registry::SourceRegistry;
use crate::storage::{InMemoryResultStore, ResultStore, SavedRun, SourceFailure};
use crate::tasks::{CancelToken, QueryTask, TaskState};
use crate::types::{SequenceInput, SourceKind, ToolResult};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Progress notifications, published in the order tasks reach each step.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    Started { source: SourceKind },
    Completed { source: SourceKind, outcome: ToolResult },
}

/// Fans a sequence out to every enabled source and joins the results.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    registry: Arc<SourceRegistry>,
}

impl Pipeline {
    pub fn new(config: Config, registry: SourceRegistry) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Starts a run over the configured sources. Must be called from within a
    /// tokio runtime.
    pub fn start_run(&self, sequence: SequenceInput) -> RunHandle {
        let sources = self.config.enabled_sources.clone();
        self.start_run_with(sequence, &sources)
    }

    #[instrument(skip(self, sequence), fields(sequence = %sequence.name))]
    pub fn start_run_with(&self, sequence: SequenceInput, sources: &[SourceKind]) -> RunHandle {
        let run_id = Uuid::new_v4();
        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let store: Arc<dyn ResultStore> = Arc::new(InMemoryResultStore::new());

        let mut enabled: Vec<SourceKind> = Vec::with_capacity(sources.len());
        for source in sources {
            if !enabled.contains(source) {
                enabled.push(*source);
            }
        }
        info!("run {} starting with {} sources", run_id, enabled.len());

        let fingerprint = sequence.fingerprint();
        let sequence_name = sequence.name.clone();
        let sequence = Arc::new(sequence);

        let mut tasks = Vec::with_capacity(enabled.len());
        for source in &enabled {
            let source = *source;
            store.register(source);
            let task = QueryTask {
                source,
                fetcher: self.registry.fetcher(source),
                parser: self.registry.parser(source),
                sequence: sequence.clone(),
                cancel: cancel.clone(),
                deadline: self.config.task_timeout(source),
            };
            let work = {
                let store = store.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    store.mark_running(source);
                    let _ = tx.send(TaskEvent::Started { source });
                    let outcome = task.run().await;
                    store.record(source, outcome.clone());
                    let _ = tx.send(TaskEvent::Completed {
                        source,
                        outcome: outcome.clone(),
                    });
                    outcome
                })
            };
            tasks.push((source, tokio::spawn(supervise(source, work, store.clone(), tx.clone()))));
        }
        // Senders live only in the tasks, so the stream ends once they all do.
        drop(tx);

        RunHandle {
            run_id,
            sequence_name,
            fingerprint,
            enabled,
            cancel,
            store,
            events: Some(rx),
            tasks,
            started: Instant::now(),
        }
    }

    /// Starts a run and waits for every source to finish.
    pub async fn run(&self, sequence: SequenceInput) -> RunOutcome {
        self.start_run(sequence).wait().await
    }
}

/// A run in flight. `wait` is the join barrier; nothing can be aggregated
/// before it returns.
pub struct RunHandle {
    run_id: Uuid,
    sequence_name: String,
    fingerprint: String,
    enabled: Vec<SourceKind>,
    cancel: CancelToken,
    store: Arc<dyn ResultStore>,
    events: Option<mpsc::UnboundedReceiver<TaskEvent>>,
    tasks: Vec<(SourceKind, JoinHandle<ToolResult>)>,
    started: Instant,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Asks every in-flight task to stop at its next check. Finished tasks
    /// keep their results.
    pub fn abort(&self) {
        warn!("run {} aborted", self.run_id);
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// The event stream; available once per run. It closes when every task
    /// has reported completion, so it can be drained before `wait`.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<TaskEvent>> {
        self.events.take()
    }

    pub fn state(&self, source: SourceKind) -> Option<TaskState> {
        self.store.state(source)
    }

    pub async fn wait(self) -> RunOutcome {
        for (source, handle) in self.tasks {
            if let Err(e) = handle.await {
                error!("{} supervisor ended abnormally: {}", source, e);
                self.store.record(source, internal_failure(&e));
            }
        }

        let mut results = BTreeMap::new();
        for (source, state) in self.store.snapshot() {
            let result = match state {
                TaskState::Completed { result } => result,
                TaskState::Pending | TaskState::Running => ToolResult::failure(&GeneError::Cancelled),
            };
            results.insert(source, result);
        }

        let outcome = RunOutcome {
            run_id: self.run_id,
            sequence_name: self.sequence_name,
            fingerprint: self.fingerprint,
            enabled: self.enabled,
            results,
        };
        info!(
            "run {} finished in {:.1}s: {} succeeded, {} failed",
            outcome.run_id,
            self.started.elapsed().as_secs_f64(),
            outcome.succeeded_sources().len(),
            outcome.failures().len()
        );
        outcome
    }
}

/// Awaits one source's task and reports a panic as that source's failure.
async fn supervise(
    source: SourceKind,
    work: JoinHandle<ToolResult>,
    store: Arc<dyn ResultStore>,
    tx: mpsc::UnboundedSender<TaskEvent>,
) -> ToolResult {
    match work.await {
        Ok(outcome) => outcome,
        Err(e) => {
            // The task never reached its own completion step.
            error!("{} task ended abnormally: {}", source, e);
            let outcome = internal_failure(&e);
            if store.record(source, outcome.clone()) {
                let _ = tx.send(TaskEvent::Completed {
                    source,
                    outcome: outcome.clone(),
                });
            }
            outcome
        }
    }
}

fn internal_failure(e: &tokio::task::JoinError) -> ToolResult {
    ToolResult::Failure {
        kind: crate::error::ErrorKind::Internal,
        message: format!("task error: {}", e),
    }
}

/// Every enabled source with its terminal result.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    run_id: Uuid,
    sequence_name: String,
    fingerprint: String,
    enabled: Vec<SourceKind>,
    results: BTreeMap<SourceKind, ToolResult>,
}

impl RunOutcome {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn sequence_name(&self) -> &str {
        &self.sequence_name
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn enabled_sources(&self) -> &[SourceKind] {
        &self.enabled
    }

    pub fn results(&self) -> &BTreeMap<SourceKind, ToolResult> {
        &self.results
    }

    pub fn result(&self, source: SourceKind) -> Option<&ToolResult> {
        self.results.get(&source)
    }

    pub fn succeeded_sources(&self) -> Vec<SourceKind> {
        self.enabled
            .iter()
            .copied()
            .filter(|s| self.results.get(s).is_some_and(|r| r.is_success()))
            .collect()
    }

    /// One entry per failed source, in enabled order.
    pub fn failures(&self) -> Vec<SourceFailure> {
        self.enabled
            .iter()
            .filter_map(|source| match self.results.get(source) {
                Some(ToolResult::Failure { kind, message }) => Some(SourceFailure {
                    source: *source,
                    kind: *kind,
                    message: message.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Calls from every successful source, sources in enabled order.
    pub fn all_genes(&self) -> Vec<Gene> {
        self.enabled
            .iter()
            .filter_map(|source| self.results.get(source))
            .flat_map(|result| result.genes().iter().cloned())
            .collect()
    }

    pub fn agreement_denominator(&self, policy: AgreementDenominator) -> usize {
        match policy {
            AgreementDenominator::Succeeded => self.succeeded_sources().len(),
            AgreementDenominator::Enabled => self.enabled.len(),
        }
    }

    pub fn consensus(&self, policy: AgreementDenominator) -> Vec<ConsensusGroup> {
        let groups = consensus::aggregate(self.all_genes(), self.agreement_denominator(policy));
        metrics::record_groups(groups.len());
        groups
    }

    pub fn to_saved_run(&self, config: &Config) -> SavedRun {
        let gene_calls = self
            .results
            .iter()
            .filter_map(|(source, result)| match result {
                ToolResult::Success { genes } => Some((*source, genes.clone())),
                ToolResult::Failure { .. } => None,
            })
            .collect();
        SavedRun {
            run_id: self.run_id,
            saved_at: Utc::now(),
            sequence_name: self.sequence_name.clone(),
            sequence_sha256: self.fingerprint.clone(),
            config: config.clone(),
            enabled_sources: self.enabled.clone(),
            gene_calls,
            failures: self.failures(),
        }
    }

    /// Reopens a saved run for re-aggregation without querying any source.
    pub fn from_saved_run(saved: &SavedRun) -> Self {
        Self {
            run_id: saved.run_id,
            sequence_name: saved.sequence_name.clone(),
            fingerprint: saved.sequence_sha256.clone(),
            enabled: saved.enabled_sources.clone(),
            results: saved.results(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::SourceFetcher;
    use crate::error::{ErrorKind, Result};
    use crate::gene::Direction;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Canned(&'static str);

    #[async_trait]
    impl SourceFetcher for Canned {
        async fn fetch(&self, _sequence: &SequenceInput, _cancel: &CancelToken) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl SourceFetcher for Unreachable {
        async fn fetch(&self, _sequence: &SequenceInput, _cancel: &CancelToken) -> Result<String> {
            Err(GeneError::Transport("connection refused".into()))
        }
    }

    const GLIMMER_OUT: &str = ">phage\norf00001 10 100 +1 5.1\n";
    const PRODIGAL_OUT: &str = "FEATURES             Location/Qualifiers\n     CDS             10..100\n//\n";

    fn pipeline(sources: Vec<SourceKind>) -> Pipeline {
        let config = Config {
            enabled_sources: sources,
            ..Config::default()
        };
        let registry = SourceRegistry::empty()
            .with_fetcher(SourceKind::Glimmer, Arc::new(Canned(GLIMMER_OUT)))
            .with_fetcher(SourceKind::Prodigal, Arc::new(Canned(PRODIGAL_OUT)))
            .with_fetcher(SourceKind::GeneMark, Arc::new(Unreachable));
        Pipeline::new(config, registry)
    }

    fn sequence() -> SequenceInput {
        SequenceInput::new("phage", b">phage\nACGTACGT\n".to_vec())
    }

    #[tokio::test]
    async fn test_run_joins_every_source() {
        let p = pipeline(vec![SourceKind::Glimmer, SourceKind::Prodigal, SourceKind::GeneMark]);
        let outcome = p.run(sequence()).await;

        assert_eq!(outcome.results().len(), 3);
        assert_eq!(outcome.succeeded_sources(), vec![SourceKind::Glimmer, SourceKind::Prodigal]);
        let failures = outcome.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].source, SourceKind::GeneMark);
        assert_eq!(failures[0].kind, ErrorKind::Transport);

        let groups = outcome.consensus(AgreementDenominator::Succeeded);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].call_count, 2);
        assert!(groups[0].all_agree);
        assert!(!outcome.consensus(AgreementDenominator::Enabled)[0].all_agree);
        assert_eq!(groups[0].representative.coords(), (Direction::Forward, 10, 100));
    }

    #[tokio::test]
    async fn test_events_pair_up_per_source() {
        let p = pipeline(vec![SourceKind::Glimmer, SourceKind::GeneMark]);
        let mut handle = p.start_run(sequence());
        let mut events = handle.take_events().unwrap();
        assert!(handle.take_events().is_none());
        let _ = handle.wait().await;

        let mut started = Vec::new();
        let mut completed = Vec::new();
        while let Ok(event) = events.try_recv() {
            match event {
                TaskEvent::Started { source } => started.push(source),
                TaskEvent::Completed { source, .. } => completed.push(source),
            }
        }
        started.sort();
        completed.sort();
        assert_eq!(started, vec![SourceKind::Glimmer, SourceKind::GeneMark]);
        assert_eq!(completed, started);
    }

    #[tokio::test]
    async fn test_unregistered_source_fails_with_config() {
        let p = pipeline(vec![SourceKind::Glimmer, SourceKind::Rast]);
        let outcome = p.run(sequence()).await;
        assert!(outcome.result(SourceKind::Glimmer).unwrap().is_success());
        assert!(matches!(
            outcome.result(SourceKind::Rast),
            Some(ToolResult::Failure { kind: ErrorKind::Config, .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_sources_run_once() {
        let p = pipeline(vec![SourceKind::Glimmer, SourceKind::Glimmer]);
        let outcome = p.run(sequence()).await;
        assert_eq!(outcome.enabled_sources(), &[SourceKind::Glimmer]);
        assert_eq!(outcome.all_genes().len(), 1);
    }

    #[tokio::test]
    async fn test_saved_run_reaggregates_identically() {
        let p = pipeline(vec![SourceKind::Glimmer, SourceKind::Prodigal, SourceKind::GeneMark]);
        let outcome = p.run(sequence()).await;
        let saved = outcome.to_saved_run(p.config());
        assert_eq!(saved.failures.len(), 1);

        let reopened = RunOutcome::from_saved_run(&saved);
        let before = outcome.consensus(AgreementDenominator::Succeeded);
        let after = reopened.consensus(AgreementDenominator::Succeeded);
        assert_eq!(before.len(), after.len());
        assert_eq!(before[0].call_count, after[0].call_count);
        assert_eq!(reopened.failures(), outcome.failures());
        assert_eq!(reopened.fingerprint(), sequence().fingerprint());
    }

    #[tokio::test]
    async fn test_abort_before_fetch() {
        let p = pipeline(vec![SourceKind::Glimmer]);
        let handle = p.start_run(sequence());
        handle.abort();
        let outcome = tokio::time::timeout(Duration::from_secs(5), handle.wait()).await.unwrap();
        // Either the task finished before the abort or it observed it.
        match outcome.result(SourceKind::Glimmer).unwrap() {
            ToolResult::Success { .. } => {}
            ToolResult::Failure { kind, .. } => assert_eq!(*kind, ErrorKind::Cancelled),
        }
    }
}
