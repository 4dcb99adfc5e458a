//! Seams to the services that actually run the predictions. Transport details
//! live in `infra`; tests substitute their own implementations.

use crate::error::Result;
use crate::tasks::CancelToken;
use crate::types::SequenceInput;
use async_trait::async_trait;

/// Opaque reference to a submitted job, e.g. a job key or a result URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Ready(String),
    Failed(u16),
}

/// Prediction service answering within seconds: submit once, then poll.
#[async_trait]
pub trait JobService: Send + Sync {
    async fn submit(&self, sequence: &SequenceInput) -> Result<JobHandle>;
    async fn poll(&self, job: &JobHandle) -> Result<JobStatus>;
}

/// Annotation service whose jobs run for minutes to hours.
#[async_trait]
pub trait AnnotationService: Send + Sync {
    async fn submit(&self, fasta: &str, name: &str) -> Result<String>;
    async fn check_complete(&self, job_id: &str) -> Result<bool>;
    async fn retrieve(&self, job_id: &str) -> Result<String>;
}

/// Produces the raw text output of one source for a sequence.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, sequence: &SequenceInput, cancel: &CancelToken) -> Result<String>;
}
