//! Client for the external face comparison service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceMatchResult {
    pub face_detected: bool,
    pub match_score: f64,
    pub is_same_person: bool,
    pub confidence: MatchConfidence,
}

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("face verification is not configured")]
    NotConfigured,
    #[error("face verification timed out")]
    Timeout,
    #[error("face verification request failed: {0}")]
    Transport(String),
    #[error("face verification returned status {0}")]
    Status(u16),
    #[error("face verification returned an unreadable response: {0}")]
    Malformed(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FaceMatchOracle: Send + Sync {
    /// Compares a base64 probe image against a stored reference feature string.
    async fn compare(&self, probe: &str, reference: &str) -> Result<FaceMatchResult, OracleError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareRequest<'a> {
    image: &'a str,
    reference_features: &'a str,
}

pub struct HttpFaceMatchOracle {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpFaceMatchOracle {
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("rollcall-backend/1.0")
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to initialize HTTP client: {}", e))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }
}

#[async_trait]
impl FaceMatchOracle for HttpFaceMatchOracle {
    async fn compare(&self, probe: &str, reference: &str) -> Result<FaceMatchResult, OracleError> {
        let mut request = self.client.post(&self.url).json(&CompareRequest {
            image: probe,
            reference_features: reference,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout
            } else {
                OracleError::Transport(e.to_string())
            }
        })?;
        if !resp.status().is_success() {
            return Err(OracleError::Status(resp.status().as_u16()));
        }

        let body = resp.text().await.map_err(|e| OracleError::Transport(e.to_string()))?;
        parse_result(&body)
    }
}

fn parse_result(body: &str) -> Result<FaceMatchResult, OracleError> {
    let result: FaceMatchResult =
        serde_json::from_str(body).map_err(|e| OracleError::Malformed(e.to_string()))?;
    if !result.match_score.is_finite() || !(0.0..=1.0).contains(&result.match_score) {
        return Err(OracleError::Malformed(format!(
            "matchScore {} outside [0, 1]",
            result.match_score
        )));
    }
    Ok(result)
}

/// Stand-in used when no oracle URL is configured; every comparison fails.
#[derive(Debug, Default)]
pub struct UnconfiguredFaceMatchOracle;

#[async_trait]
impl FaceMatchOracle for UnconfiguredFaceMatchOracle {
    async fn compare(&self, _probe: &str, _reference: &str) -> Result<FaceMatchResult, OracleError> {
        Err(OracleError::NotConfigured)
    }
}
