//! # Storage
//!
//! Every component talks to persistence through [`Store`]. The handle is
//! opened once in `State::new` and shared as `Arc<dyn Store>`.
//!
//! ## Backends
//! - [`crate::database::RedisStore`]: production, JSON documents in Redis
//! - [`crate::memory::MemoryStore`]: tests and local development
//!
//! ## Uniqueness
//! Inserts that must be unique (email, official package name, complaint id)
//! fail with [`StoreError::Duplicate`] instead of overwriting. The check and
//! the write are a single atomic step on both backends.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::StoreError,
    models::{Grievance, GrievanceStatus, IdentityCheck, OfficialApp, SuspiciousApp, User},
};

pub const REGISTRY_PAGE: usize = 100;

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError>;
    /// `email` must already be lowercased.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn insert_identity_check(&self, check: &IdentityCheck) -> Result<(), StoreError>;
    async fn find_identity_check(&self, id: &str) -> Result<Option<IdentityCheck>, StoreError>;
    /// Most recent first.
    async fn list_identity_checks(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<IdentityCheck>, StoreError>;

    async fn insert_official_app(&self, app: &OfficialApp) -> Result<(), StoreError>;
    /// Matches on either key; a package name hit wins over a hash hit.
    async fn find_official_app(
        &self,
        package_name: Option<&str>,
        sha256_hash: Option<&str>,
    ) -> Result<Option<OfficialApp>, StoreError>;
    async fn list_official_apps(&self, limit: usize) -> Result<Vec<OfficialApp>, StoreError>;

    async fn insert_suspicious_app(&self, app: &SuspiciousApp) -> Result<(), StoreError>;
    /// Earliest entry for the package wins.
    async fn find_suspicious_app(
        &self,
        package_name: &str,
    ) -> Result<Option<SuspiciousApp>, StoreError>;
    async fn list_suspicious_apps(&self, limit: usize) -> Result<Vec<SuspiciousApp>, StoreError>;

    async fn insert_grievance(&self, grievance: &Grievance) -> Result<(), StoreError>;
    async fn find_grievance(&self, complaint_id: &str) -> Result<Option<Grievance>, StoreError>;
    async fn list_user_grievances(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Grievance>, StoreError>;
    /// Full snapshot, used for analytics.
    async fn list_grievances(&self) -> Result<Vec<Grievance>, StoreError>;
    async fn update_grievance_status(
        &self,
        complaint_id: &str,
        status: GrievanceStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Grievance>, StoreError>;
}
