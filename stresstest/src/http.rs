//! Contains a remote implementation using HTTP to interact with querysim.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::workload::Action;

/// The envelope of successful API responses, reduced to what the stresstest checks.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    data: serde_json::Value,
}

/// A remote implementation using HTTP to interact with querysim.
#[derive(Debug)]
pub struct HttpRemote {
    /// The base URL of the server.
    pub remote: String,
    /// The HTTP client used to talk to the server.
    pub client: reqwest::Client,
}

impl HttpRemote {
    /// Creates a new `HttpRemote` instance with the given remote URL and a default client.
    pub fn new(remote: &str) -> Self {
        Self {
            remote: remote.trim_end_matches('/').to_owned(),
            client: reqwest::Client::new(),
        }
    }

    /// Performs `action` and validates the response.
    pub(crate) async fn perform(&self, action: &Action) -> Result<()> {
        let url = format!("{}{}", self.remote, action.path());

        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?;
        let body: ApiResponse = response
            .json()
            .await
            .with_context(|| format!("malformed response from `{url}`"))?;

        if body.data.is_null() {
            anyhow::bail!("response from `{url}` carries no data");
        }

        Ok(())
    }
}
