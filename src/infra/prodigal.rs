use crate::app::ports::SourceFetcher;
use crate::error::{GeneError, Result};
use crate::tasks::CancelToken;
use crate::types::SequenceInput;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Runs a local Prodigal binary in metagenomic mode, feeding the FASTA on stdin.
pub struct ProdigalRunner {
    executable: PathBuf,
}

impl ProdigalRunner {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

#[async_trait]
impl SourceFetcher for ProdigalRunner {
    #[instrument(skip(self, sequence, cancel), fields(exe = %self.executable.display()))]
    async fn fetch(&self, sequence: &SequenceInput, cancel: &CancelToken) -> Result<String> {
        cancel.check()?;
        let mut child = Command::new(&self.executable)
            .args(["-p", "meta"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                GeneError::Config(format!("cannot start {}: {}", self.executable.display(), e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&sequence.fasta).await?;
        }

        // Dropping the wait future on cancel kills the child.
        let output = tokio::select! {
            output = child.wait_with_output() => output?,
            _ = cancel.cancelled() => return Err(GeneError::Cancelled),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("prodigal exited with {}: {}", output.status, stderr.trim());
            return Err(GeneError::Transport(format!(
                "prodigal exited with {}",
                output.status
            )));
        }
        debug!("prodigal wrote {} bytes", output.stdout.len());
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
