//! # Records
//!
//! Fixed schema for everything the gateway persists. Each entity is stored
//! as one JSON document keyed by its identifier.
//!
//! ## Ownership
//! - `IdentityCheck` and `Grievance` carry the owning user id and are only
//!   ever returned to that user
//! - `OfficialApp` and `SuspiciousApp` are standalone lookup tables
use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Always lowercase.
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LivenessStatus {
    Pass,
    Fail,
}

impl LivenessStatus {
    /// Anything other than an explicit pass is a failure.
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("PASS") {
            Self::Pass
        } else {
            Self::Fail
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallResult {
    Verified,
    Rejected,
    Unknown,
}

impl OverallResult {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "VERIFIED" => Self::Verified,
            "REJECTED" => Self::Rejected,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityCheck {
    pub id: String,
    pub user_id: String,
    pub deepfake_score: f64,
    pub liveness_status: LivenessStatus,
    pub overall_result: OverallResult,
    pub latency_ms: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficialApp {
    pub id: String,
    pub package_name: Option<String>,
    pub sha256_hash: Option<String>,
    pub publisher: Option<String>,
    pub google_play_link: Option<String>,
    pub last_verified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousApp {
    pub id: String,
    pub package_name: String,
    pub publisher: Option<String>,
    pub google_play_link: Option<String>,
    pub confidence: f64,
}

pub const DEFAULT_SUSPICIOUS_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    UnauthorizedDebit,
    LoanDispute,
    AccountClosure,
    FailedTransfer,
    CardFraud,
    DigitalServiceIssue,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::UnauthorizedDebit,
        Category::LoanDispute,
        Category::AccountClosure,
        Category::FailedTransfer,
        Category::CardFraud,
        Category::DigitalServiceIssue,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::UnauthorizedDebit => "unauthorized_debit",
            Category::LoanDispute => "loan_dispute",
            Category::AccountClosure => "account_closure",
            Category::FailedTransfer => "failed_transfer",
            Category::CardFraud => "card_fraud",
            Category::DigitalServiceIssue => "digital_service_issue",
            Category::Other => "other",
        }
    }

    /// Labels outside the fixed set collapse to `Other`.
    pub fn coerce(label: &str) -> Self {
        label.parse().unwrap_or(Category::Other)
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == label)
            .ok_or(())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrievanceStatus {
    Received,
    InProgress,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grievance {
    pub id: String,
    pub complaint_id: String,
    pub user_id: String,
    pub text: String,
    pub category: Category,
    pub urgency: Urgency,
    pub status: GrievanceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
