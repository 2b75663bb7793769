//! End-to-end job run: submit, poll until done, download the result.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::api::CloudApiClient;
use crate::config::AppConfig;
use crate::credentials::Credentials;
use crate::error::ClientResult;
use crate::jobs::Job;
use crate::poller::{PollPolicy, TaskPoller};

/// Summary of a completed job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowReport {
    pub task_id: String,
    pub doc_id: String,
    pub output: PathBuf,
    pub bytes_written: u64,
    pub poll_attempts: u32,
}

/// Runs jobs against one API client with a fixed polling policy
pub struct Workflow {
    api: CloudApiClient,
    policy: PollPolicy,
}

impl Workflow {
    pub fn new(api: CloudApiClient, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    /// Build from configuration. Credentials are read here, before any
    /// network traffic.
    pub fn from_config(config: &AppConfig) -> ClientResult<Self> {
        let credentials = Credentials::load(&config.credentials_path)?;
        info!(
            path = %config.credentials_path.display(),
            client_id = %credentials.client_id(),
            "Credentials loaded"
        );
        let api = CloudApiClient::new(
            &config.api.base_url,
            config.api.request_timeout(),
            credentials,
        )?;
        Ok(Self::new(api, config.polling.policy()))
    }

    pub async fn run(&self, job: &Job, output: &Path) -> ClientResult<WorkflowReport> {
        let handle = self.api.submit(job).await?;
        let poll = TaskPoller::new(&self.api, self.policy.clone())
            .wait(&handle)
            .await?;
        let bytes_written = self.api.download(&poll.doc_id, output).await?;

        info!(
            job = job.name(),
            task_id = %handle.task_id(),
            path = %output.display(),
            "Job finished"
        );
        Ok(WorkflowReport {
            task_id: handle.task_id().to_string(),
            doc_id: poll.doc_id,
            output: output.to_path_buf(),
            bytes_written,
            poll_attempts: poll.attempts,
        })
    }
}

/// Run the configured job
pub async fn run(config: &AppConfig) -> ClientResult<WorkflowReport> {
    Workflow::from_config(config)?
        .run(&config.job.job, &config.job.output)
        .await
}
