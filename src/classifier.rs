//! Image classifier collaborator.
//!
//! Classification happens out of process; this module defines the calling
//! contract and an HTTP client for a classifier sidecar. The gate treats the
//! returned label and confidence as givens.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ClassifierConfig;

/// A classifier verdict for one frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Classification {
    /// Predicted species label, or the background label
    pub label: String,
    /// Probability in [0.0, 1.0]
    pub confidence: f64,
}

/// Black-box image classifier.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one encoded image.
    async fn predict(&self, image: &[u8]) -> Result<Classification>;
}

/// Client for an HTTP classifier sidecar. POSTs the raw image bytes and
/// expects `{"label": ..., "confidence": ...}` back.
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("failed to build classifier HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn predict(&self, image: &[u8]) -> Result<Classification> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .context("classifier request failed")?
            .error_for_status()
            .context("classifier returned an error status")?;

        response
            .json()
            .await
            .context("classifier returned malformed JSON")
    }
}
