//! # Identity checks
//!
//! Deepfake and liveness verification for an uploaded video.
//!
//! The predictor is never fatal: when it times out, answers non-200 or
//! sends garbage, the check is recorded as VERIFIED with score 0.15. That
//! default fails open and is kept as a product policy.
use std::{sync::Arc, time::Instant};

use axum::body::Bytes;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::{
    classifier::{IdentityClassifier, IdentityPrediction, or_fallback},
    error::AppError,
    models::IdentityCheck,
    store::Store,
    utils::elapsed_ms,
};

pub const RECENT_CHECKS: usize = 20;

pub struct IdentityService {
    store: Arc<dyn Store>,
    classifier: Arc<dyn IdentityClassifier>,
}

impl IdentityService {
    pub fn new(store: Arc<dyn Store>, classifier: Arc<dyn IdentityClassifier>) -> Self {
        Self { store, classifier }
    }

    pub async fn verify(&self, user_id: &str, video: Bytes) -> Result<IdentityCheck, AppError> {
        let start = Instant::now();

        let prediction = or_fallback(
            "Identity predictor",
            self.classifier.predict(video),
            IdentityPrediction::fallback(),
        )
        .await;

        let check = IdentityCheck {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            deepfake_score: prediction.deepfake_score,
            liveness_status: prediction.liveness_status,
            overall_result: prediction.overall_result,
            latency_ms: prediction.latency_ms.unwrap_or_else(|| elapsed_ms(start)),
            created_at: Utc::now(),
        };

        self.store.insert_identity_check(&check).await?;

        info!(
            "Identity verification for user {user_id}: {:?}",
            check.overall_result
        );

        Ok(check)
    }

    /// Records of other users look exactly like missing ones.
    pub async fn get_result(&self, user_id: &str, id: &str) -> Result<IdentityCheck, AppError> {
        self.store
            .find_identity_check(id)
            .await?
            .filter(|check| check.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Result not found".into()))
    }

    pub async fn history(&self, user_id: &str) -> Result<Vec<IdentityCheck>, AppError> {
        Ok(self
            .store
            .list_identity_checks(user_id, RECENT_CHECKS)
            .await?)
    }
}
