use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};
use visearch_common::{AppConfig, Result, VisearchError};

use crate::provider::EmbeddingProvider;
use crate::types::{EmbedRequest, EmbedResponse, ImageInput};

/// Jina embeddings API client (CLIP-style image embeddings)
#[derive(Debug, Clone)]
pub struct JinaClient {
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
    max_retries: u32,
    retry_base_delay: Duration,
    client: Client,
}

/// Outcome of a failed attempt
enum AttemptError {
    /// Network failure or server-side status, worth another attempt
    Retryable(VisearchError),
    /// Client-side status or unusable body
    Fatal(VisearchError),
}

impl JinaClient {
    /// Create new Jina client
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = endpoint.into();
        let model = model.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        if api_key.is_none() {
            warn!("No embedding API key configured; requests will be sent unauthenticated");
        }

        info!(
            "Embedding client initialized: {} (model={}, dimension={})",
            endpoint, model, dimension
        );
        Ok(Self {
            endpoint,
            api_key,
            model,
            dimension,
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            client,
        })
    }

    /// Create client from application configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            config.embedding_api_url.clone(),
            config.embedding_api_key.clone(),
            config.embedding_model.clone(),
            config.embedding_dimension,
            config.embedding_timeout(),
        )?
        .with_max_retries(config.embedding_max_retries))
    }

    /// Set attempts per request (at least one)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the first backoff delay; later attempts double it
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Generate embedding with retry on transient failures
    async fn embed_with_retry(&self, input: &ImageInput) -> Result<Vec<f32>> {
        let request = EmbedRequest::for_image(&self.model, self.dimension, input);

        debug!(
            "Generating embedding - Model: {}, Input: {}",
            self.model,
            input.describe()
        );

        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self.try_embed(&request).await {
                Ok(embedding) => {
                    debug!("Received embedding - Dimension: {}", embedding.len());
                    return Ok(embedding);
                }
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Retryable(e)) => {
                    if attempt < self.max_retries {
                        let delay = retry_delay(self.retry_base_delay, attempt);
                        warn!(
                            "Embedding request failed (attempt {}/{}): {}. Retrying in {:?}...",
                            attempt, self.max_retries, e, delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| VisearchError::embedding_provider("All retries failed")))
    }

    /// Single attempt to generate embedding
    async fn try_embed(&self, request: &EmbedRequest) -> std::result::Result<Vec<f32>, AttemptError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            AttemptError::Retryable(VisearchError::embedding_provider(format!(
                "Failed to send embedding request: {}",
                e
            )))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = VisearchError::embedding_provider(format!(
                "Embedding API error: {}. Response body: {}",
                status, body
            ));
            return Err(if is_retryable_status(status) {
                AttemptError::Retryable(err)
            } else {
                AttemptError::Fatal(err)
            });
        }

        let result: EmbedResponse = response.json().await.map_err(|e| {
            AttemptError::Fatal(VisearchError::embedding_provider(format!(
                "Failed to parse embedding response: {}",
                e
            )))
        })?;

        result.into_first_embedding().ok_or_else(|| {
            AttemptError::Fatal(VisearchError::embedding_provider(
                "No embedding returned by provider",
            ))
        })
    }
}

#[async_trait]
impl EmbeddingProvider for JinaClient {
    async fn embed_image(&self, input: &ImageInput) -> Result<Vec<f32>> {
        self.embed_with_retry(input).await
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Exponential backoff: base, 2*base, 4*base, ...
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.pow(attempt.saturating_sub(1).min(6))
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
