//! Client for a cloud document-processing API.
//!
//! Jobs (combine, convert, compare, ...) are uploaded with a signed request,
//! polled until the server finishes them, and the result is downloaded.

pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod jobs;
pub mod poller;
pub mod signing;
pub mod workflow;

pub use api::{CloudApiClient, TaskHandle, TaskStatus};
pub use config::AppConfig;
pub use credentials::Credentials;
pub use error::{ClientError, ClientResult};
pub use jobs::Job;
pub use poller::{PollOutcome, PollPolicy, TaskPoller, TaskState};
pub use workflow::{Workflow, WorkflowReport};
