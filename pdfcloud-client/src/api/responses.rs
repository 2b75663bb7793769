//! Response bodies returned by the document service.
//!
//! Field names vary between endpoints and service versions (`taskId` vs
//! `taskid`, `docId` vs `docid`), and ids are sometimes numbers.

use serde::Deserialize;
use serde_json::Value;

/// Substring the status endpoint puts in `data.detail` while a task is busy
pub(crate) const TASK_RUNNING_MARKER: &str = "The task is running";

/// Outer `{code, msg, data}` envelope shared by every JSON response
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub task_info: Option<Value>,
}

impl Envelope {
    /// Best available error text for a non-zero `code`
    pub fn error_message(&self) -> String {
        if let Some(msg) = self.msg.as_deref().filter(|m| !m.is_empty()) {
            return msg.to_string();
        }
        match &self.task_info {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => format!("Request failed with code {}", self.code),
        }
    }
}

/// `data` payload: `{"taskInfo": {...}}`
#[derive(Debug, Deserialize)]
pub(crate) struct TaskData<T> {
    #[serde(rename = "taskInfo")]
    pub task_info: T,
}

/// `taskInfo` returned when a job is accepted
#[derive(Debug, Deserialize)]
pub(crate) struct SubmittedTask {
    #[serde(rename = "taskId", alias = "taskid")]
    pub task_id: Value,
}

/// `taskInfo` returned by the status endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct TaskStatusInfo {
    pub percentage: Value,
    #[serde(rename = "docId", alias = "docid", default)]
    pub doc_id: Option<Value>,
}

/// Body of an error response from the status endpoint
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    data: Option<ErrorData>,
}

#[derive(Debug, Deserialize)]
struct ErrorData {
    #[serde(default)]
    detail: Option<String>,
}

/// Whether an error body reports a task that is still being processed
pub(crate) fn is_task_running(body: &str) -> bool {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.data)
        .and_then(|d| d.detail)
        .is_some_and(|detail| detail.contains(TASK_RUNNING_MARKER))
}

/// Normalize an id that may arrive as a string or a number
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read a 0-100 percentage that may arrive as an integer, float or string
pub(crate) fn percentage(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    if !(0.0..=100.0).contains(&raw) {
        return None;
    }
    Some(raw as u8)
}
