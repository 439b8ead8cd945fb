//! # Classifiers
//!
//! Two external HTTP services:
//!
//! - identity predictor: `POST {IDENTITY_SERVICE_URL}/predict`, multipart field `video`,
//!   answers `{deepfake_score, liveness_status, overall_result, latency_ms?}`
//! - categorizer: `POST {GRIEVANCE_SERVICE_URL}/categorize`, JSON `{text}`,
//!   answers `{category, confidence}`
//!
//! One attempt per call, bounded by a timeout. Callers go through
//! [`or_fallback`] so a failure always turns into the documented default and
//! never reaches the end user.
use std::{future::Future, time::Duration};

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::{
    Client, StatusCode,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::{
    config::Config,
    models::{Category, LivenessStatus, OverallResult},
};

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentityPrediction {
    pub deepfake_score: f64,
    pub liveness_status: LivenessStatus,
    pub overall_result: OverallResult,
    pub latency_ms: Option<u64>,
}

impl IdentityPrediction {
    /// Optimistic default used whenever the predictor is unavailable.
    /// This fails open.
    pub fn fallback() -> Self {
        Self {
            deepfake_score: 0.15,
            liveness_status: LivenessStatus::Pass,
            overall_result: OverallResult::Verified,
            latency_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Categorization {
    pub category: Category,
    pub confidence: f64,
}

impl Categorization {
    pub fn fallback() -> Self {
        Self {
            category: Category::Other,
            confidence: 0.5,
        }
    }
}

#[async_trait]
pub trait IdentityClassifier: Send + Sync {
    async fn predict(&self, video: Bytes) -> Result<IdentityPrediction, ClassifierError>;
}

#[async_trait]
pub trait Categorizer: Send + Sync {
    async fn categorize(&self, text: &str) -> Result<Categorization, ClassifierError>;
}

pub async fn or_fallback<T, F>(service: &str, call: F, fallback: T) -> T
where
    F: Future<Output = Result<T, ClassifierError>>,
{
    match call.await {
        Ok(value) => value,
        Err(e) => {
            warn!("{service} unavailable, using fallback: {e}");
            fallback
        }
    }
}

#[derive(Deserialize)]
struct PredictResponse {
    deepfake_score: f64,
    liveness_status: String,
    overall_result: String,
    latency_ms: Option<u64>,
}

#[derive(Serialize)]
struct CategorizeRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct CategorizeResponse {
    category: String,
    confidence: Option<f64>,
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

pub struct HttpClassifier {
    client: Client,
    identity_url: String,
    grievance_url: String,
    identity_timeout: Duration,
    categorize_timeout: Duration,
}

impl HttpClassifier {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            identity_url: config.identity_service_url.trim_end_matches('/').to_string(),
            grievance_url: config.grievance_service_url.trim_end_matches('/').to_string(),
            identity_timeout: config.identity_timeout,
            categorize_timeout: config.categorize_timeout,
        }
    }
}

#[async_trait]
impl IdentityClassifier for HttpClassifier {
    async fn predict(&self, video: Bytes) -> Result<IdentityPrediction, ClassifierError> {
        let part = Part::bytes(video.to_vec())
            .file_name("video")
            .mime_str("application/octet-stream")?;

        let response = self
            .client
            .post(format!("{}/predict", self.identity_url))
            .multipart(Form::new().part("video", part))
            .timeout(self.identity_timeout)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(ClassifierError::Status(response.status()));
        }

        let body: PredictResponse = response.json().await?;

        Ok(IdentityPrediction {
            deepfake_score: clamp_unit(body.deepfake_score),
            liveness_status: LivenessStatus::from_label(&body.liveness_status),
            overall_result: OverallResult::from_label(&body.overall_result),
            latency_ms: body.latency_ms,
        })
    }
}

#[async_trait]
impl Categorizer for HttpClassifier {
    async fn categorize(&self, text: &str) -> Result<Categorization, ClassifierError> {
        let response = self
            .client
            .post(format!("{}/categorize", self.grievance_url))
            .json(&CategorizeRequest { text })
            .timeout(self.categorize_timeout)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(ClassifierError::Status(response.status()));
        }

        let body: CategorizeResponse = response.json().await?;

        Ok(Categorization {
            category: Category::coerce(&body.category),
            confidence: clamp_unit(body.confidence.unwrap_or(0.5)),
        })
    }
}
