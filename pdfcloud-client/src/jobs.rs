//! Job definitions for the document service.
//!
//! Each job knows its endpoint, the text form fields it sends (which are also
//! the signed parameters), and the files it uploads. The JSON `config` option
//! blobs are opaque to the client and only serialized here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ClientError, ClientResult};

const MIME_PDF: &str = "application/pdf";
const MIME_ZIP: &str = "application/zip";

/// A file uploaded as one multipart part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Multipart field name expected by the endpoint
    pub field: &'static str,
    pub path: PathBuf,
    pub mime: &'static str,
}

/// Everything needed to submit a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    /// Path relative to the API base URL, e.g. `document/combine`
    pub endpoint: &'static str,
    /// Text form fields, signed together with `clientId`
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

/// A document-service job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    Combine(CombineJob),
    Convert(ConvertJob),
    Compare(CompareJob),
    RemovePassword(RemovePasswordJob),
    Flatten(FlattenJob),
    Extract(ExtractJob),
    CreateFromHtml(CreateFromHtmlJob),
}

impl Job {
    /// Short name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            Job::Combine(_) => "combine",
            Job::Convert(_) => "convert",
            Job::Compare(_) => "compare",
            Job::RemovePassword(_) => "remove_password",
            Job::Flatten(_) => "flatten",
            Job::Extract(_) => "extract",
            Job::CreateFromHtml(_) => "create_from_html",
        }
    }

    /// Build the submission for this job
    pub fn request(&self) -> ClientResult<JobRequest> {
        match self {
            Job::Combine(job) => Ok(JobRequest {
                endpoint: "document/combine",
                fields: vec![field("config", to_config_json(&job.options)?)],
                files: vec![FilePart {
                    field: "inputZipDocument",
                    path: job.input.clone(),
                    mime: MIME_ZIP,
                }],
            }),
            Job::Convert(job) => Ok(JobRequest {
                endpoint: "document/convert",
                fields: vec![
                    field("format", job.format.clone()),
                    field("config", to_config_json(&job.options)?),
                ],
                files: vec![pdf_part("inputDocument", &job.input)],
            }),
            Job::Compare(job) => Ok(JobRequest {
                endpoint: "document/compare",
                fields: vec![
                    field("resultType", job.result_type.clone()),
                    field("compareType", job.compare_type.clone()),
                ],
                files: vec![
                    pdf_part("inputBaseDocument", &job.base),
                    pdf_part("inputCompareDocument", &job.compare),
                ],
            }),
            Job::RemovePassword(job) => Ok(JobRequest {
                endpoint: "document/removePassword",
                fields: vec![field("password", job.password.clone())],
                files: vec![pdf_part("inputDocument", &job.input)],
            }),
            Job::Flatten(job) => Ok(JobRequest {
                endpoint: "document/flatten",
                fields: vec![field("pageRange", job.page_range.clone())],
                files: vec![pdf_part("inputDocument", &job.input)],
            }),
            Job::Extract(job) => {
                let mut fields = vec![field("mode", job.mode.as_str())];
                if let Some(range) = job.page_range.as_deref().filter(|r| !r.is_empty()) {
                    fields.push(field("pageRange", range));
                }
                Ok(JobRequest {
                    endpoint: "document/extract",
                    fields,
                    files: vec![pdf_part("inputDocument", &job.input)],
                })
            }
            Job::CreateFromHtml(job) => Ok(JobRequest {
                endpoint: "document/createFromHtml",
                fields: vec![
                    field("url", job.url.clone()),
                    field("format", job.format.as_str()),
                    field("config", to_config_json(&job.options)?),
                ],
                files: Vec::new(),
            }),
        }
    }
}

fn field(name: &str, value: impl Into<String>) -> (String, String) {
    (name.to_string(), value.into())
}

fn pdf_part(name: &'static str, path: &std::path::Path) -> FilePart {
    FilePart {
        field: name,
        path: path.to_path_buf(),
        mime: MIME_PDF,
    }
}

fn to_config_json<T: Serialize>(options: &T) -> ClientResult<String> {
    serde_json::to_string(options)
        .map_err(|e| ClientError::config(format!("Cannot encode job options: {}", e)))
}

// ==================== Combine ====================

/// Merge the PDFs inside a zip archive into one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombineJob {
    pub input: PathBuf,
    #[serde(default)]
    pub options: CombineOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CombineOptions {
    pub is_add_bookmark: bool,
    #[serde(rename = "isAddTOC")]
    pub is_add_toc: bool,
    pub is_continue_merge: bool,
    pub is_retain_page_num: bool,
    /// Bookmark depth range, e.g. `1-4`
    pub bookmark_levels: String,
}

impl Default for CombineOptions {
    fn default() -> Self {
        Self {
            is_add_bookmark: true,
            is_add_toc: false,
            is_continue_merge: true,
            is_retain_page_num: false,
            bookmark_levels: "1-4".to_string(),
        }
    }
}

// ==================== Convert ====================

/// Convert a PDF to another format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertJob {
    pub input: PathBuf,
    /// Target type understood by the service (`image`, `word`, `excel`, ...)
    #[serde(default = "default_convert_format")]
    pub format: String,
    #[serde(default)]
    pub options: ConvertOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConvertOptions {
    pub dpi: u32,
    /// `all` or a range expression such as `1-3,5`
    pub page_range: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            dpi: 96,
            page_range: default_page_range(),
        }
    }
}

fn default_convert_format() -> String {
    "image".to_string()
}

fn default_page_range() -> String {
    "all".to_string()
}

// ==================== Compare ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareJob {
    pub base: PathBuf,
    pub compare: PathBuf,
    #[serde(default = "default_result_type")]
    pub result_type: String,
    #[serde(default = "default_compare_type")]
    pub compare_type: String,
}

fn default_result_type() -> String {
    "json".to_string()
}

fn default_compare_type() -> String {
    "all".to_string()
}

// ==================== Remove password ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovePasswordJob {
    pub input: PathBuf,
    pub password: String,
}

// ==================== Flatten ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlattenJob {
    pub input: PathBuf,
    #[serde(default = "default_page_range")]
    pub page_range: String,
}

// ==================== Extract ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMode {
    Text,
    Images,
}

impl ExtractMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractMode::Text => "extractText",
            ExtractMode::Images => "extractImages",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractJob {
    pub input: PathBuf,
    pub mode: ExtractMode,
    #[serde(default)]
    pub page_range: Option<String>,
}

// ==================== Create from HTML ====================

/// How the `url` field of an HTML job is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HtmlSource {
    Url,
    Html,
    Shtml,
}

impl HtmlSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            HtmlSource::Url => "url",
            HtmlSource::Html => "html",
            HtmlSource::Shtml => "shtml",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFromHtmlJob {
    pub url: String,
    #[serde(default = "default_html_source")]
    pub format: HtmlSource,
    #[serde(default)]
    pub options: HtmlPageOptions,
}

fn default_html_source() -> HtmlSource {
    HtmlSource::Url
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HtmlPageOptions {
    pub width: u32,
    pub height: u32,
    pub rotate: u32,
    pub page_mode: u32,
    pub page_scaling: u32,
}

impl Default for HtmlPageOptions {
    fn default() -> Self {
        Self {
            width: 640,
            height: 900,
            rotate: 0,
            page_mode: 1,
            page_scaling: 1,
        }
    }
}
