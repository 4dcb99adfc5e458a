use crate::app::ports::{JobHandle, JobService, JobStatus};
use crate::constants;
use crate::error::{GeneError, Result};
use crate::types::SequenceInput;
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;
use tracing::{debug, instrument};

/// Server that answers a sequence POST with `job_key=<key>` and is then
/// re-POSTed the key until the output is ready (200) rather than queued (202).
pub struct JobKeyService {
    client: reqwest::Client,
    url: String,
    submit_label: &'static str,
}

impl JobKeyService {
    pub fn new(client: reqwest::Client, url: impl Into<String>, submit_label: &'static str) -> Self {
        Self {
            client,
            url: url.into(),
            submit_label,
        }
    }

    pub fn glimmer(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self::new(client, url, "Run GLIMMER v3.02")
    }

    pub fn genemark(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self::new(client, url, "Run GeneMark.hmm")
    }
}

/// Splits a `job_key=<key>` body into its form pair.
pub fn parse_job_key(body: &str) -> Result<(String, String)> {
    let body = body.trim();
    let (name, key) = body
        .split_once('=')
        .filter(|(name, key)| name.trim() == "job_key" && !key.trim().is_empty())
        .ok_or_else(|| GeneError::Transport(format!("expected job_key in submit response, got '{}'", truncate(body))))?;
    Ok((name.trim().to_string(), key.trim().to_string()))
}

/// Maps a poll response onto the job lifecycle.
pub fn classify_poll(status: StatusCode, body: String) -> JobStatus {
    match status {
        StatusCode::OK => JobStatus::Ready(body),
        StatusCode::ACCEPTED => JobStatus::Pending,
        other => JobStatus::Failed(other.as_u16()),
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(80) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl JobService for JobKeyService {
    #[instrument(skip(self, sequence), fields(url = %self.url))]
    async fn submit(&self, sequence: &SequenceInput) -> Result<JobHandle> {
        let fasta = String::from_utf8_lossy(&sequence.fasta).into_owned();
        let form = [
            ("sequence", fasta.as_str()),
            ("gencode", "11"),
            ("topology", "0"),
            ("submit", self.submit_label),
        ];
        let resp = self
            .client
            .post(&self.url)
            .header(USER_AGENT, constants::USER_AGENT)
            .form(&form)
            .send()
            .await?
            .error_for_status()?;
        let body = resp.text().await?;
        let (_, key) = parse_job_key(&body)?;
        debug!("job key {}", key);
        Ok(JobHandle(key))
    }

    async fn poll(&self, job: &JobHandle) -> Result<JobStatus> {
        let resp = self
            .client
            .post(&self.url)
            .header(USER_AGENT, constants::USER_AGENT)
            .form(&[("job_key", job.0.as_str())])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        Ok(classify_poll(status, body))
    }
}
