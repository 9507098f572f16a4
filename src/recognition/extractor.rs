// Feature extractor adapter
//
// The face embedding itself is computed by an external service; this module
// only ships images to it and reads back the descriptor.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Fixed-length face embedding.
pub type FeatureVector = Vec<f32>;

/// An image handed to the extractor: uploaded bytes or a stored reference URL.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Bytes(Vec<u8>),
    Url(String),
}

impl ImageSource {
    pub fn describe(&self) -> String {
        match self {
            ImageSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
            ImageSource::Url(url) => url.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no face found in image")]
    NoFace,

    #[error("extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("extractor unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    /// Returns the descriptor of the single face in `image`.
    async fn extract(&self, image: &ImageSource) -> Result<FeatureVector, ExtractError>;
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    descriptor: Option<Vec<f32>>,
}

/// Client for the embedding service: `POST {base}/extract`.
pub struct HttpFeatureExtractor {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpFeatureExtractor {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExtractError::Unavailable(e.to_string()))?;

        Ok(Self {
            endpoint: format!("{}/extract", base_url.trim_end_matches('/')),
            client,
        })
    }
}

#[async_trait]
impl FeatureExtractor for HttpFeatureExtractor {
    async fn extract(&self, image: &ImageSource) -> Result<FeatureVector, ExtractError> {
        debug!(image = %image.describe(), "Requesting face descriptor");

        let request = match image {
            ImageSource::Bytes(bytes) => self
                .client
                .post(&self.endpoint)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes.clone()),
            ImageSource::Url(url) => self.client.post(&self.endpoint).json(&json!({ "url": url })),
        };

        let response = request
            .send()
            .await
            .map_err(|e| ExtractError::Unavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            return Err(ExtractError::NoFace);
        }
        if !response.status().is_success() {
            return Err(ExtractError::Unavailable(format!(
                "extractor returned {}",
                response.status()
            )));
        }

        let body: ExtractResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Unavailable(e.to_string()))?;

        match body.descriptor {
            Some(descriptor) if !descriptor.is_empty() => Ok(descriptor),
            _ => Err(ExtractError::NoFace),
        }
    }
}
