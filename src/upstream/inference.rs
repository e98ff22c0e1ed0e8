//! OpenAI-compatible inference backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::UpstreamConfig;
use crate::upstream::{check_status, InferenceBackend, UpstreamError};

/// Chat completion request. Everything except `model` is forwarded as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    #[serde(default)]
    pub model: String,
    #[serde(flatten)]
    pub body: serde_json::Map<String, serde_json::Value>,
}

/// Posts to `{inference_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct HttpInferenceBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpInferenceBackend {
    pub fn new(client: reqwest::Client, config: &UpstreamConfig) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.inference_url.trim_end_matches('/')
            ),
            api_key: config.inference_api_key.clone(),
        }
    }
}

#[async_trait]
impl InferenceBackend for HttpInferenceBackend {
    async fn complete(
        &self,
        request: &InferenceRequest,
    ) -> Result<serde_json::Value, UpstreamError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = check_status(builder.send().await?).await?;
        Ok(response.json().await?)
    }
}
