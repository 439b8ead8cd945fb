//! # App authenticity
//!
//! Resolves a package name and/or APK against two registries.
//!
//! ## Precedence
//! 1. Official registry, matched by package name or by SHA-256 of the APK: OFFICIAL, 0.98
//! 2. Suspicious registry, matched by package name only: SUSPICIOUS, stored confidence
//! 3. Otherwise: UNKNOWN, 0.5
//!
//! The first hit in that order decides; mixed partial matches are not reconciled.
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AppError, StoreError},
    models::{DEFAULT_SUSPICIOUS_CONFIDENCE, OfficialApp, SuspiciousApp},
    store::{REGISTRY_PAGE, Store},
    utils::{is_sha256_hex, non_blank},
};

pub const OFFICIAL_CONFIDENCE: f64 = 0.98;
pub const UNKNOWN_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Official,
    Suspicious,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppVerdict {
    pub status: Verdict,
    pub publisher: Option<String>,
    pub google_play_link: Option<String>,
    pub confidence: f64,
    pub sha256_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewOfficialApp {
    pub package_name: Option<String>,
    pub sha256_hash: Option<String>,
    pub publisher: Option<String>,
    pub google_play_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewSuspiciousApp {
    pub package_name: String,
    pub publisher: Option<String>,
    pub google_play_link: Option<String>,
    pub confidence: Option<f64>,
}

impl NewOfficialApp {
    /// Blank keys count as absent; a hash is lowercased.
    pub fn normalized(self) -> Self {
        Self {
            package_name: non_blank(self.package_name),
            sha256_hash: non_blank(self.sha256_hash).map(|hash| hash.to_ascii_lowercase()),
            ..self
        }
    }

    /// Expects a [`normalized`](Self::normalized) entry.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.package_name.is_none() && self.sha256_hash.is_none() {
            return Err(AppError::Validation(
                "package_name or sha256_hash required".into(),
            ));
        }

        if let Some(hash) = &self.sha256_hash {
            if !is_sha256_hex(hash) {
                return Err(AppError::Validation(
                    "sha256_hash must be 64 hex characters".into(),
                ));
            }
        }

        Ok(())
    }
}

impl NewSuspiciousApp {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.package_name.trim().is_empty() {
            return Err(AppError::Validation("package_name required".into()));
        }

        match self.confidence {
            Some(confidence) if !(0.0..=1.0).contains(&confidence) => Err(AppError::Validation(
                "confidence must be between 0 and 1".into(),
            )),
            _ => Ok(()),
        }
    }
}

pub fn sha256_hex(artifact: &[u8]) -> String {
    format!("{:x}", Sha256::digest(artifact))
}

pub struct AppResolver {
    store: Arc<dyn Store>,
}

impl AppResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn resolve(
        &self,
        package_name: Option<&str>,
        artifact: Option<&[u8]>,
    ) -> Result<AppVerdict, AppError> {
        if package_name.is_none() && artifact.is_none() {
            return Err(AppError::Validation("package_name or apk required".into()));
        }

        let sha256_hash = artifact.map(sha256_hex);

        let verdict = if let Some(app) = self
            .store
            .find_official_app(package_name, sha256_hash.as_deref())
            .await?
        {
            AppVerdict {
                status: Verdict::Official,
                publisher: app.publisher,
                google_play_link: app.google_play_link,
                confidence: OFFICIAL_CONFIDENCE,
                sha256_hash,
            }
        } else if let Some(app) = match package_name {
            Some(name) => self.store.find_suspicious_app(name).await?,
            None => None,
        } {
            AppVerdict {
                status: Verdict::Suspicious,
                publisher: app.publisher,
                google_play_link: app.google_play_link,
                confidence: app.confidence,
                sha256_hash,
            }
        } else {
            AppVerdict {
                status: Verdict::Unknown,
                publisher: None,
                google_play_link: None,
                confidence: UNKNOWN_CONFIDENCE,
                sha256_hash,
            }
        };

        info!(
            "App verify package={} status={:?}",
            package_name.unwrap_or("-"),
            verdict.status
        );

        Ok(verdict)
    }

    pub async fn list_official(&self) -> Result<Vec<OfficialApp>, AppError> {
        Ok(self.store.list_official_apps(REGISTRY_PAGE).await?)
    }

    pub async fn list_suspicious(&self) -> Result<Vec<SuspiciousApp>, AppError> {
        Ok(self.store.list_suspicious_apps(REGISTRY_PAGE).await?)
    }

    /// Any authenticated caller may write; there is no admin role yet.
    pub async fn add_official(&self, entry: NewOfficialApp) -> Result<OfficialApp, AppError> {
        let entry = entry.normalized();
        entry.validate()?;

        let app = OfficialApp {
            id: Uuid::new_v4().to_string(),
            package_name: entry.package_name,
            sha256_hash: entry.sha256_hash,
            publisher: entry.publisher,
            google_play_link: entry.google_play_link,
            last_verified: Utc::now(),
        };

        match self.store.insert_official_app(&app).await {
            Ok(()) => Ok(app),
            Err(StoreError::Duplicate(_)) => {
                Err(AppError::Conflict("Package already registered".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn add_suspicious(&self, entry: NewSuspiciousApp) -> Result<SuspiciousApp, AppError> {
        entry.validate()?;

        let app = SuspiciousApp {
            id: Uuid::new_v4().to_string(),
            package_name: entry.package_name.trim().to_string(),
            publisher: entry.publisher,
            google_play_link: entry.google_play_link,
            confidence: entry.confidence.unwrap_or(DEFAULT_SUSPICIOUS_CONFIDENCE),
        };

        self.store.insert_suspicious_app(&app).await?;

        Ok(app)
    }
}
