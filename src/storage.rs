use crate::config::Config;
use crate::error::{ErrorKind, GeneError, Result};
use crate::gene::Gene;
use crate::tasks::TaskState;
use crate::types::{SourceKind, ToolResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-run store of task states keyed by source. Each task writes only its
/// own key; the store is read once every task is terminal.
pub trait ResultStore: Send + Sync {
    fn register(&self, source: SourceKind);
    fn mark_running(&self, source: SourceKind);
    /// Returns false if the source already had a terminal result.
    fn record(&self, source: SourceKind, result: ToolResult) -> bool;
    fn state(&self, source: SourceKind) -> Option<TaskState>;
    fn snapshot(&self) -> BTreeMap<SourceKind, TaskState>;
}

/// In-memory store; a coarse lock around the map is enough as keys are never shared.
#[derive(Clone, Default)]
pub struct InMemoryResultStore {
    states: Arc<Mutex<HashMap<SourceKind, TaskState>>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultStore for InMemoryResultStore {
    fn register(&self, source: SourceKind) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.entry(source).or_insert(TaskState::Pending);
    }

    fn mark_running(&self, source: SourceKind) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(state) = states.get_mut(&source) {
            if !state.start() {
                debug!("{} not pending, state left as is", source);
            }
        }
    }

    fn record(&self, source: SourceKind, result: ToolResult) -> bool {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let recorded = states.entry(source).or_insert(TaskState::Pending).complete(result);
        if !recorded {
            warn!("{} already completed; ignoring second result", source);
        }
        recorded
    }

    fn state(&self, source: SourceKind) -> Option<TaskState> {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.get(&source).cloned()
    }

    fn snapshot(&self) -> BTreeMap<SourceKind, TaskState> {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.iter().map(|(k, v)| (*k, v.clone())).collect()
    }
}

/// A failed source as shown to the user after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: SourceKind,
    pub kind: ErrorKind,
    pub message: String,
}

/// Plain-data form of a finished run: enough to reopen and re-aggregate it
/// without querying any source again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRun {
    pub run_id: Uuid,
    pub saved_at: DateTime<Utc>,
    pub sequence_name: String,
    pub sequence_sha256: String,
    pub config: Config,
    pub enabled_sources: Vec<SourceKind>,
    pub gene_calls: BTreeMap<SourceKind, Vec<Gene>>,
    pub failures: Vec<SourceFailure>,
}

impl SavedRun {
    pub fn results(&self) -> BTreeMap<SourceKind, ToolResult> {
        let mut results: BTreeMap<SourceKind, ToolResult> = self
            .gene_calls
            .iter()
            .map(|(source, genes)| (*source, ToolResult::Success { genes: genes.clone() }))
            .collect();
        for failure in &self.failures {
            results.insert(
                failure.source,
                ToolResult::Failure {
                    kind: failure.kind,
                    message: failure.message.clone(),
                },
            );
        }
        results
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!("Saved run {} to {}", self.run_id, path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GeneError::Config(format!("Failed to read saved run '{}': {}", path.display(), e)))?;
        let run: SavedRun = serde_json::from_str(&content).map_err(|e| {
            if e.is_data() {
                GeneError::Validation(format!("Saved run '{}' holds an invalid record: {}", path.display(), e))
            } else {
                GeneError::Json(e)
            }
        })?;
        debug!("Loaded run {} ({} sources)", run.run_id, run.enabled_sources.len());
        Ok(run)
    }
}
