use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{AnalysisExecutionResult, EngineRequest, EngineResponse};
use super::ComputeEngine;
use crate::config::{EngineConfig, RequestConfig};
use crate::error::{EngineError, EngineResult};

/// Client for the compute engine's HTTP API
#[derive(Clone)]
pub struct HttpComputeEngine {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    request_config: RequestConfig,
}

impl HttpComputeEngine {
    /// Create a new compute engine client
    pub fn new(config: &EngineConfig, request_config: RequestConfig) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .connect_timeout(Duration::from_millis(request_config.connect_timeout_ms))
            .build()
            .map_err(EngineError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {}", key)),
            None => builder,
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> EngineError {
        if e.is_timeout() {
            EngineError::Timeout {
                timeout_ms: self.request_config.timeout_ms,
            }
        } else {
            EngineError::Http(e)
        }
    }

    /// Execute a single request (internal)
    async fn execute_request(&self, request: &EngineRequest) -> EngineResult<AnalysisExecutionResult> {
        let url = format!("{}/analysis/{}", self.base_url, request.operation);

        debug!(
            operation = %request.operation,
            execution_id = %request.execution_id,
            rows = request.dataset.rows.len(),
            columns = request.dataset.columns.len(),
            "Calling compute engine"
        );

        let response = self
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            // Engines report their own failures in the envelope even on 4xx/5xx.
            if let Ok(envelope) = serde_json::from_str::<EngineResponse>(&error_body) {
                return envelope.into_execution_result(&request.operation);
            }
            return Err(EngineError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let envelope: EngineResponse =
            response
                .json()
                .await
                .map_err(|e| EngineError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        envelope.into_execution_result(&request.operation)
    }
}

#[async_trait]
impl ComputeEngine for HttpComputeEngine {
    async fn execute(&self, request: EngineRequest) -> EngineResult<AnalysisExecutionResult> {
        let start = Instant::now();
        let result = self.execute_request(&request).await;
        let latency = start.elapsed();

        match &result {
            Ok(_) => info!(
                operation = %request.operation,
                execution_id = %request.execution_id,
                latency_ms = latency.as_millis(),
                "Compute engine call succeeded"
            ),
            Err(e) => error!(
                operation = %request.operation,
                execution_id = %request.execution_id,
                error = %e,
                latency_ms = latency.as_millis(),
                "Compute engine call failed"
            ),
        }
        result
    }

    async fn abort(&self, execution_id: &str) -> EngineResult<()> {
        let url = format!("{}/analysis/{}/abort", self.base_url, execution_id);

        let response = self
            .post(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(
                execution_id = %execution_id,
                status = status.as_u16(),
                "Compute engine rejected abort"
            );
            return Err(EngineError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        info!(execution_id = %execution_id, "Abort sent to compute engine");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = EngineConfig {
            base_url: "http://localhost:8000/".to_string(),
            api_key: None,
        };

        let client = HttpComputeEngine::new(&config, RequestConfig::default());
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url(), "http://localhost:8000");
    }
}
