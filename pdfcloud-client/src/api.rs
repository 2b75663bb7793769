//! Authenticated client for the document service HTTP API.
//!
//! Three calls make up every job: a signed multipart upload that creates a
//! task, a status query by task id, and a download of the finished document.

mod responses;

use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::credentials::Credentials;
use crate::error::{ClientError, ClientResult};
use crate::jobs::{FilePart, Job};
use crate::poller::PollOutcome;
use crate::signing;

use responses::{Envelope, SubmittedTask, TaskData, TaskStatusInfo};

/// Default base URL for the document service
pub const DEFAULT_BASE_URL: &str = "https://servicesapi.foxitsoftware.cn/api";

/// Default timeout for API requests
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Server-side task created by a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    task_id: String,
}

impl TaskHandle {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

/// Parsed `taskInfo` from a successful status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    pub percentage: u8,
    /// Only present once `percentage` reaches 100
    pub doc_id: Option<String>,
}

/// Document service API client
#[derive(Clone)]
pub struct CloudApiClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl CloudApiClient {
    /// Create a new client for `base_url`
    pub fn new(base_url: &str, timeout: Duration, credentials: Credentials) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pdfcloud-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Signature over `clientId` plus `params`
    fn signature(&self, params: &[(String, String)]) -> String {
        let client_id = ("clientId".to_string(), self.credentials.client_id().to_string());
        signing::sign(
            std::iter::once(&client_id)
                .chain(params.iter())
                .map(|(k, v)| (k.as_str(), v.as_str())),
            self.credentials.secret_key(),
        )
    }

    /// Query string for a request: `sn`, `clientId`, then `params`
    fn signed_query(&self, params: Vec<(String, String)>) -> Vec<(String, String)> {
        let sn = self.signature(&params);
        let mut query = vec![
            ("sn".to_string(), sn),
            (
                "clientId".to_string(),
                self.credentials.client_id().to_string(),
            ),
        ];
        query.extend(params);
        query
    }

    /// Upload the job's inputs and create a server-side task
    pub async fn submit(&self, job: &Job) -> ClientResult<TaskHandle> {
        let request = job.request()?;

        let mut form = Form::new();
        for (name, value) in &request.fields {
            form = form.text(name.clone(), value.clone());
        }
        for file in &request.files {
            form = form.part(file.field, file_part(file).await?);
        }

        // Form fields are signed but only sn/clientId travel in the URL
        let sn = self.signature(&request.fields);
        let query = [("sn", sn.as_str()), ("clientId", self.credentials.client_id())];

        info!(job = job.name(), endpoint = request.endpoint, "Submitting task");
        let response = self
            .client
            .post(self.url(request.endpoint))
            .query(&query)
            .multipart(form)
            .send()
            .await?;
        let response = error_for_status(response).await?;

        let data: TaskData<SubmittedTask> = parse_envelope(response).await?;
        let task_id = responses::id_string(&data.task_info.task_id)
            .ok_or_else(|| ClientError::malformed("taskInfo.taskId is empty"))?;

        info!(task_id = %task_id, "Task created");
        Ok(TaskHandle::new(task_id))
    }

    /// Query a task's status once.
    ///
    /// The status endpoint answers with an HTTP error while a task is busy;
    /// that case is reported as `Pending` rather than as a failure.
    pub async fn query_status(&self, handle: &TaskHandle) -> PollOutcome {
        match self.fetch_status(handle).await {
            Ok(Some(status)) => match status.doc_id {
                Some(doc_id) if status.percentage >= 100 => PollOutcome::Done { doc_id },
                None if status.percentage >= 100 => PollOutcome::Failed(ClientError::malformed(
                    "task reported 100% without a docId",
                )),
                _ => PollOutcome::Pending {
                    percentage: Some(status.percentage),
                },
            },
            Ok(None) => PollOutcome::Pending { percentage: None },
            Err(e) => PollOutcome::Failed(e),
        }
    }

    /// `Ok(None)` means the service answered "task is running"
    async fn fetch_status(&self, handle: &TaskHandle) -> ClientResult<Option<TaskStatus>> {
        let query = self.signed_query(vec![("taskId".to_string(), handle.task_id().to_string())]);

        let response = self.client.get(self.url("task")).query(&query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = body_text(response).await;
            if responses::is_task_running(&body) {
                debug!(task_id = %handle.task_id(), "Service reports task is still running");
                return Ok(None);
            }
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: TaskData<TaskStatusInfo> = parse_envelope(response).await?;
        let percentage = responses::percentage(&data.task_info.percentage).ok_or_else(|| {
            ClientError::malformed(format!(
                "invalid taskInfo.percentage: {}",
                data.task_info.percentage
            ))
        })?;
        let doc_id = data.task_info.doc_id.as_ref().and_then(responses::id_string);

        Ok(Some(TaskStatus { percentage, doc_id }))
    }

    /// Download a finished document to `destination`, creating parent
    /// directories as needed. Returns the number of bytes written.
    pub async fn download(&self, doc_id: &str, destination: &Path) -> ClientResult<u64> {
        let file_name = destination
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ClientError::config(format!(
                    "Output path has no file name: {}",
                    destination.display()
                ))
            })?;

        let query = self.signed_query(vec![
            ("docId".to_string(), doc_id.to_string()),
            ("fileName".to_string(), file_name.to_string()),
        ]);

        let response = self
            .client
            .get(self.url("download"))
            .query(&query)
            .send()
            .await?;
        let mut response = error_for_status(response).await?;

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ClientError::io(parent, e))?;
        }

        // Stream into a sibling file so a failed transfer never leaves a
        // truncated document at the destination
        let partial = partial_path(destination, file_name);
        let written = match stream_to_file(&mut response, &partial).await {
            Ok(written) => written,
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&partial).await {
                    warn!(
                        path = %partial.display(),
                        error = %remove_err,
                        "Failed to remove incomplete download"
                    );
                }
                return Err(e);
            }
        };
        tokio::fs::rename(&partial, destination)
            .await
            .map_err(|e| ClientError::io(destination, e))?;

        info!(
            doc_id = %doc_id,
            path = %destination.display(),
            bytes = written,
            "Download finished"
        );
        Ok(written)
    }
}

/// `<destination>.part`, next to the destination
fn partial_path(destination: &Path, file_name: &str) -> PathBuf {
    destination.with_file_name(format!("{}.part", file_name))
}

/// Write the response body to `path`, returning the number of bytes written
async fn stream_to_file(response: &mut Response, path: &Path) -> ClientResult<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ClientError::io(path, e))?;
    let mut written: u64 = 0;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk)
            .await
            .map_err(|e| ClientError::io(path, e))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| ClientError::io(path, e))?;
    Ok(written)
}

/// Body text for an error report; a failed read is described rather than dropped
async fn body_text(response: Response) -> String {
    match response.text().await {
        Ok(text) => text,
        Err(e) => format!("<failed to read response body: {}>", e),
    }
}

/// Stream a local file into a multipart part
async fn file_part(file: &FilePart) -> ClientResult<Part> {
    let handle = tokio::fs::File::open(&file.path)
        .await
        .map_err(|e| ClientError::io(&file.path, e))?;
    let len = handle
        .metadata()
        .await
        .map_err(|e| ClientError::io(&file.path, e))?
        .len();
    let file_name = file
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.field.to_string());

    let body = Body::wrap_stream(ReaderStream::new(handle));
    let part = Part::stream_with_length(body, len)
        .file_name(file_name)
        .mime_str(file.mime)?;
    Ok(part)
}

/// Turn a non-2xx response into `HttpStatus` carrying the body text
async fn error_for_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(ClientError::HttpStatus {
        status: status.as_u16(),
        message: body_text(response).await,
    })
}

/// Decode the `{code, msg, data}` envelope and return `data` as `T`
async fn parse_envelope<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let body = response.text().await?;
    let envelope: Envelope = serde_json::from_str(&body)
        .map_err(|e| ClientError::malformed(format!("invalid JSON body: {}", e)))?;

    if envelope.code != 0 {
        return Err(ClientError::RemoteTask {
            code: envelope.code,
            message: envelope.error_message(),
        });
    }

    let data = envelope
        .data
        .ok_or_else(|| ClientError::malformed("response has no data field"))?;
    serde_json::from_value(data).map_err(|e| ClientError::malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{CombineJob, CombineOptions, ConvertJob, ConvertOptions};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> CloudApiClient {
        let credentials = Credentials::new("cid", "sek").unwrap();
        CloudApiClient::new(
            &format!("{}/api/", server.uri()),
            Duration::from_secs(5),
            credentials,
        )
        .unwrap()
    }

    fn combine_job(dir: &Path) -> Job {
        let input = dir.join("combine.zip");
        std::fs::write(&input, b"PK\x03\x04zip").unwrap();
        Job::Combine(CombineJob {
            input,
            options: CombineOptions::default(),
        })
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let credentials = Credentials::new("cid", "sek").unwrap();
        let client =
            CloudApiClient::new("https://example.com/api/", Duration::from_secs(1), credentials)
                .unwrap();
        assert_eq!(client.base_url(), "https://example.com/api");
        assert_eq!(client.url("task"), "https://example.com/api/task");
        assert_eq!(
            client.url("/document/combine"),
            "https://example.com/api/document/combine"
        );
    }

    #[tokio::test]
    async fn test_submit_signs_form_fields() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let job = combine_job(dir.path());

        let config = job.request().unwrap().fields[0].1.clone();
        let expected_sn = signing::sign([("clientId", "cid"), ("config", config.as_str())], "sek");

        Mock::given(method("POST"))
            .and(path("/api/document/combine"))
            .and(query_param("clientId", "cid"))
            .and(query_param("sn", expected_sn.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "msg": "success",
                "data": {"taskInfo": {"taskId": "T1"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let handle = test_client(&server).submit(&job).await.unwrap();
        assert_eq!(handle.task_id(), "T1");
    }

    #[tokio::test]
    async fn test_submit_accepts_lowercase_taskid() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("AboutFoxit.pdf");
        std::fs::write(&input, b"%PDF-1.4").unwrap();
        let job = Job::Convert(ConvertJob {
            input,
            format: "image".to_string(),
            options: ConvertOptions::default(),
        });

        Mock::given(method("POST"))
            .and(path("/api/document/convert"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {"taskInfo": {"taskid": 1234}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let handle = test_client(&server).submit(&job).await.unwrap();
        assert_eq!(handle.task_id(), "1234");
    }

    #[tokio::test]
    async fn test_submit_nonzero_code_is_remote_task_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"code": 1, "msg": "bad input"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server)
            .submit(&combine_job(dir.path()))
            .await
            .unwrap_err();
        match err {
            ClientError::RemoteTask { code, message } => {
                assert_eq!(code, 1);
                assert_eq!(message, "bad input");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_http_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let err = test_client(&server)
            .submit(&combine_job(dir.path()))
            .await
            .unwrap_err();
        match err {
            ClientError::HttpStatus { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "unauthorized");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_missing_input_fails_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let job = Job::Combine(CombineJob {
            input: "/nonexistent/combine.zip".into(),
            options: CombineOptions::default(),
        });
        let err = test_client(&server).submit(&job).await.unwrap_err();
        assert!(matches!(err, ClientError::Io { .. }));
    }

    #[tokio::test]
    async fn test_transport_error() {
        let credentials = Credentials::new("cid", "sek").unwrap();
        // Port 9 (discard) is not listening
        let client =
            CloudApiClient::new("http://127.0.0.1:9/api", Duration::from_secs(2), credentials)
                .unwrap();
        let err = client
            .download("D1", Path::new("unused.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[tokio::test]
    async fn test_query_status_outcomes() {
        let server = MockServer::start().await;
        let handle = TaskHandle::new("T1");
        let expected_sn = signing::sign([("clientId", "cid"), ("taskId", "T1")], "sek");

        Mock::given(method("GET"))
            .and(path("/api/task"))
            .and(query_param("taskId", "T1"))
            .and(query_param("sn", expected_sn.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {"taskInfo": {"percentage": 40}}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/task"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "data": {"detail": "The task is running"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/task"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {"taskInfo": {"percentage": 100, "docId": "D1"}}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        assert!(matches!(
            client.query_status(&handle).await,
            PollOutcome::Pending {
                percentage: Some(40)
            }
        ));
        assert!(matches!(
            client.query_status(&handle).await,
            PollOutcome::Pending { percentage: None }
        ));
        match client.query_status(&handle).await {
            PollOutcome::Done { doc_id } => assert_eq!(doc_id, "D1"),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_query_status_complete_without_doc_id_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/task"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {"taskInfo": {"percentage": 100}}
            })))
            .mount(&server)
            .await;

        let outcome = test_client(&server)
            .query_status(&TaskHandle::new("T1"))
            .await;
        assert!(matches!(
            outcome,
            PollOutcome::Failed(ClientError::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_query_status_nonzero_code_uses_task_info() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/task"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 4,
                "task_info": "conversion failed"
            })))
            .mount(&server)
            .await;

        match test_client(&server)
            .query_status(&TaskHandle::new("T1"))
            .await
        {
            PollOutcome::Failed(ClientError::RemoteTask { code, message }) => {
                assert_eq!(code, 4);
                assert_eq!(message, "conversion failed");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_download_writes_file_and_creates_dirs() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("nested/out/Result.pdf");
        let expected_sn = signing::sign(
            [("clientId", "cid"), ("docId", "D1"), ("fileName", "Result.pdf")],
            "sek",
        );

        Mock::given(method("GET"))
            .and(path("/api/download"))
            .and(query_param("docId", "D1"))
            .and(query_param("fileName", "Result.pdf"))
            .and(query_param("sn", expected_sn.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 body".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let written = test_client(&server)
            .download("D1", &destination)
            .await
            .unwrap();
        assert_eq!(written, 13);
        assert_eq!(std::fs::read(&destination).unwrap(), b"%PDF-1.4 body");
    }

    #[tokio::test]
    async fn test_download_http_error_writes_nothing() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out/Result.pdf");

        Mock::given(method("GET"))
            .and(path("/api/download"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such doc"))
            .mount(&server)
            .await;

        let err = test_client(&server)
            .download("D1", &destination)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::HttpStatus { status: 404, .. }));
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_truncated_download_leaves_no_file() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out/Result.pdf");

        // Declared length exceeds the body, so the connection ends mid-transfer
        Mock::given(method("GET"))
            .and(path("/api/download"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-length", "4096")
                    .set_body_bytes(b"%PDF-1.4 partial".to_vec()),
            )
            .mount(&server)
            .await;

        let err = test_client(&server)
            .download("D1", &destination)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert!(!destination.exists());
        assert!(!dir.path().join("out/Result.pdf.part").exists());
    }

    #[tokio::test]
    async fn test_download_replaces_stale_partial_file() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("Result.pdf");
        std::fs::write(dir.path().join("Result.pdf.part"), b"stale").unwrap();

        Mock::given(method("GET"))
            .and(path("/api/download"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(&server)
            .await;

        test_client(&server)
            .download("D1", &destination)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"%PDF-1.4");
        assert!(!dir.path().join("Result.pdf.part").exists());
    }

    #[tokio::test]
    async fn test_unreadable_error_body_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/task"))
            .respond_with(
                ResponseTemplate::new(502)
                    .insert_header("content-length", "4096")
                    .set_body_string("bad gateway"),
            )
            .mount(&server)
            .await;

        match test_client(&server)
            .query_status(&TaskHandle::new("T1"))
            .await
        {
            PollOutcome::Failed(ClientError::HttpStatus { status, message }) => {
                assert_eq!(status, 502);
                assert!(message.contains("failed to read response body"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
