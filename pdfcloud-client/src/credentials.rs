//! API credentials loaded from the service's credential file.

use serde::Deserialize;
use std::path::Path;

use crate::error::{ClientError, ClientResult};

/// Client id and shared secret used to sign every request
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: String,
    secret_key: String,
}

// Keep the secret out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// On-disk layout: `{"client_credentials": {"client_id": .., "secret_id": ..}}`
#[derive(Deserialize)]
struct CredentialFile {
    client_credentials: ClientCredentials,
}

#[derive(Deserialize)]
struct ClientCredentials {
    client_id: String,
    secret_id: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, secret_key: impl Into<String>) -> ClientResult<Self> {
        let client_id = client_id.into();
        let secret_key = secret_key.into();
        if client_id.is_empty() {
            return Err(ClientError::config("client_id must not be empty"));
        }
        if secret_key.is_empty() {
            return Err(ClientError::config("secret_id must not be empty"));
        }
        Ok(Self {
            client_id,
            secret_key,
        })
    }

    /// Parse credentials from the JSON credential document
    pub fn from_json(json: &str) -> ClientResult<Self> {
        let file: CredentialFile = serde_json::from_str(json)
            .map_err(|e| ClientError::config(format!("Invalid credential file: {}", e)))?;
        Self::new(
            file.client_credentials.client_id,
            file.client_credentials.secret_id,
        )
    }

    /// Read and parse the credential file at `path`
    pub fn load(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config(format!(
                "Cannot read credential file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}
