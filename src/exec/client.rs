//! Execution service client
//!
//! The orchestrator only sees [`ExecutionService`]; the HTTP implementation
//! talks to the real service with reqwest.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::common::config::ServiceConfig;
use crate::common::{Error, Result};
use crate::session::languages::RemoteLanguage;

use super::protocol::{ErrorResponse, ExecutionRequest, ExecutionResult, StatusResponse};

/// Remote batch execution service
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Run a batch and wait for its result
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult>;

    /// Current progress of the running batch
    async fn status(&self) -> Result<StatusResponse>;

    /// Versions and compilers per language
    async fn languages(&self) -> Result<HashMap<String, RemoteLanguage>>;
}

#[async_trait]
impl<T: ExecutionService + ?Sized> ExecutionService for Arc<T> {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        (**self).execute(request).await
    }

    async fn status(&self) -> Result<StatusResponse> {
        (**self).status().await
    }

    async fn languages(&self) -> Result<HashMap<String, RemoteLanguage>> {
        (**self).languages().await
    }
}

/// HTTP client for the execution service
#[derive(Debug, Clone)]
pub struct HttpExecutionService {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpExecutionService {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("cellbench/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ExecutionService for HttpExecutionService {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let url = self.config.url(&self.config.execute_path);
        tracing::debug!(url = %url, cells = request.message.options.len(), "Submitting batch");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Submission(format!("could not reach {}: {}", url, e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Submission(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorResponse>(&body).ok();
            let message = message.as_ref().and_then(ErrorResponse::error_message);
            tracing::debug!(status = %status, message = ?message, "Service rejected batch");
            return Err(Error::submission(message));
        }

        serde_json::from_slice(&body)
            .map_err(|e| Error::Submission(format!("unexpected response body: {}", e)))
    }

    async fn status(&self) -> Result<StatusResponse> {
        let url = self.config.url(&self.config.status_path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Poll(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Poll(format!("status endpoint returned {}", response.status())));
        }
        response
            .json::<StatusResponse>()
            .await
            .map_err(|e| Error::Poll(e.to_string()))
    }

    async fn languages(&self) -> Result<HashMap<String, RemoteLanguage>> {
        let url = self.config.url(&self.config.languages_path);
        let response = self
            .client
            .get(&url)
            .query(&[("language", "all")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Internal(format!(
                "language catalog request returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}
