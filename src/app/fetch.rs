use crate::app::ports::{AnnotationService, JobService, JobStatus, SourceFetcher};
use crate::constants;
use crate::error::{GeneError, Result};
use crate::tasks::CancelToken;
use crate::types::SequenceInput;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Submits to a `JobService` and polls until the result is ready. Pending
/// answers are tolerated indefinitely; the task deadline bounds the wait.
pub struct PolledJobFetcher {
    service: Arc<dyn JobService>,
    delay: Duration,
}

impl PolledJobFetcher {
    pub fn new(service: Arc<dyn JobService>, delay: Duration) -> Self {
        Self { service, delay }
    }
}

#[async_trait]
impl SourceFetcher for PolledJobFetcher {
    async fn fetch(&self, sequence: &SequenceInput, cancel: &CancelToken) -> Result<String> {
        cancel.check()?;
        let job = self.service.submit(sequence).await?;
        debug!("submitted job {:?}", job);

        let mut polls = 0u32;
        loop {
            cancel.sleep(self.delay).await?;
            polls += 1;
            match self.service.poll(&job).await? {
                JobStatus::Pending => {
                    debug!("job {:?} still pending after {} polls", job, polls);
                }
                JobStatus::Ready(text) => {
                    info!("job {:?} ready after {} polls ({} bytes)", job, polls, text.len());
                    return Ok(text);
                }
                JobStatus::Failed(status) => {
                    warn!("job {:?} failed with status {}", job, status);
                    return Err(GeneError::Transport(format!(
                        "server answered {}; check the sequence format or server status",
                        status
                    )));
                }
            }
        }
    }
}

/// Drives an `AnnotationService` job to completion. An existing job id is
/// reused when that job has already finished.
pub struct AnnotationJobFetcher {
    service: Arc<dyn AnnotationService>,
    delay: Duration,
    existing_job: Option<String>,
}

impl AnnotationJobFetcher {
    /// `delay` is raised to the service's minimum check interval.
    pub fn new(service: Arc<dyn AnnotationService>, delay: Duration, existing_job: Option<String>) -> Self {
        let min = Duration::from_millis(constants::MIN_ANNOTATION_POLL_DELAY_MS);
        Self {
            service,
            delay: delay.max(min),
            existing_job,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl SourceFetcher for AnnotationJobFetcher {
    async fn fetch(&self, sequence: &SequenceInput, cancel: &CancelToken) -> Result<String> {
        cancel.check()?;
        if let Some(job_id) = &self.existing_job {
            if self.service.check_complete(job_id).await? {
                info!("reusing completed annotation job {}", job_id);
                return self.service.retrieve(job_id).await;
            }
        }

        let fasta = String::from_utf8_lossy(&sequence.fasta);
        let job_id = self.service.submit(&fasta, &sequence.name).await?;
        info!("submitted annotation job {} for {}", job_id, sequence.name);

        loop {
            cancel.sleep(self.delay).await?;
            if self.service.check_complete(&job_id).await? {
                break;
            }
            debug!("annotation job {} not complete", job_id);
        }
        self.service.retrieve(&job_id).await
    }
}
