//! Object store collaborator for uploaded evidence files.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object store request failed: {0}")]
    Request(String),

    #[error("object store rejected upload: {0}")]
    Rejected(String),
}

/// A stored object: public URL plus the key used to delete it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredObject {
    pub url: String,
    pub key: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        folder: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredObject, ObjectStoreError>;

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
}

/// `PUT {base}/{folder}/{uuid}` uploads, `DELETE {base}/{key}` removes.
pub struct HttpObjectStore {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl HttpObjectStore {
    pub fn new(base_url: &str, token: &str) -> Result<Self, ObjectStoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ObjectStoreError::Request(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.token)
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(
        &self,
        folder: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredObject, ObjectStoreError> {
        let key = format!("{}/{}", folder.trim_matches('/'), Uuid::new_v4());
        let response = self
            .authorized(self.client.put(format!("{}/{}", self.base_url, key)))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ObjectStoreError::Rejected(response.status().to_string()));
        }

        response
            .json::<StoredObject>()
            .await
            .map_err(|e| ObjectStoreError::Request(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let response = self
            .authorized(self.client.delete(format!("{}/{}", self.base_url, key)))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ObjectStoreError::Rejected(response.status().to_string()));
        }
        Ok(())
    }
}
