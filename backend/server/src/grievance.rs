//! # Grievances
//!
//! Filing, status projection and analytics for consumer complaints.
//!
//! ## Filing
//! 1. Category comes from the caller, else from the categorizer (5s timeout), else `other`
//! 2. Labels outside the fixed set become `other`
//! 3. Urgency is HIGH for `card_fraud` / `unauthorized_debit`, or when the text
//!    mentions "fraud" or "debit" in any case; MEDIUM otherwise
//! 4. Complaint ids are `CASE-` plus a random UUID, claimed with set-if-absent
//!
//! ## Status
//! Only the current status and the last update time are stored, so the
//! timeline is at most two events: `created`, then `in_progress` or `resolved`.
use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    classifier::{Categorization, Categorizer, or_fallback},
    error::{AppError, StoreError},
    models::{Category, Grievance, GrievanceStatus, Urgency},
    store::Store,
};

pub const COMPLAINT_PREFIX: &str = "CASE-";
pub const RECENT_GRIEVANCES: usize = 100;
const ID_ATTEMPTS: usize = 3;
const NEXT_UPDATE_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEvent {
    pub event: &'static str,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub complaint_id: String,
    pub category: Category,
    pub urgency: Urgency,
    pub status: GrievanceStatus,
    pub timeline: Vec<TimelineEvent>,
    pub next_update_expected: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub total_complaints: u64,
    pub by_category: BTreeMap<Category, u64>,
    pub avg_resolution_time_hours: f64,
    pub high_priority_pending: u64,
}

pub fn urgency(category: Category, text: &str) -> Urgency {
    let text = text.to_lowercase();

    if matches!(category, Category::CardFraud | Category::UnauthorizedDebit)
        || text.contains("fraud")
        || text.contains("debit")
    {
        Urgency::High
    } else {
        Urgency::Medium
    }
}

pub fn new_complaint_id() -> String {
    format!(
        "{COMPLAINT_PREFIX}{}",
        Uuid::new_v4().simple().to_string().to_uppercase()
    )
}

pub fn status_view(grievance: &Grievance) -> StatusView {
    let mut timeline = vec![TimelineEvent {
        event: "created",
        at: grievance.created_at,
    }];

    match grievance.status {
        GrievanceStatus::Received => {}
        GrievanceStatus::InProgress => timeline.push(TimelineEvent {
            event: "in_progress",
            at: grievance.updated_at,
        }),
        GrievanceStatus::Resolved => timeline.push(TimelineEvent {
            event: "resolved",
            at: grievance.updated_at,
        }),
    }

    StatusView {
        complaint_id: grievance.complaint_id.clone(),
        category: grievance.category,
        urgency: grievance.urgency,
        status: grievance.status,
        timeline,
        next_update_expected: grievance.updated_at + Duration::hours(NEXT_UPDATE_HOURS),
    }
}

/// All four figures come from the same slice, so they always agree.
pub fn analytics(grievances: &[Grievance]) -> AnalyticsSnapshot {
    let mut by_category = BTreeMap::new();
    let mut high_priority_pending = 0;
    let mut total_hours = 0.0;

    for grievance in grievances {
        *by_category.entry(grievance.category).or_insert(0) += 1;

        if grievance.urgency == Urgency::High && grievance.status != GrievanceStatus::Resolved {
            high_priority_pending += 1;
        }

        let elapsed = grievance.updated_at - grievance.created_at;
        total_hours += elapsed.num_milliseconds() as f64 / 3_600_000.0;
    }

    let avg_resolution_time_hours = if grievances.is_empty() {
        0.0
    } else {
        (total_hours / grievances.len() as f64 * 100.0).round() / 100.0
    };

    AnalyticsSnapshot {
        total_complaints: grievances.len() as u64,
        by_category,
        avg_resolution_time_hours,
        high_priority_pending,
    }
}

pub struct GrievanceManager {
    store: Arc<dyn Store>,
    categorizer: Arc<dyn Categorizer>,
}

impl GrievanceManager {
    pub fn new(store: Arc<dyn Store>, categorizer: Arc<dyn Categorizer>) -> Self {
        Self { store, categorizer }
    }

    pub async fn file(
        &self,
        user_id: &str,
        text: &str,
        category: Option<&str>,
    ) -> Result<Grievance, AppError> {
        let category = match category {
            Some(label) => Category::coerce(label),
            None => {
                // preview confidence is irrelevant here, only the label is kept
                or_fallback(
                    "Categorizer",
                    self.categorizer.categorize(text),
                    Categorization::fallback(),
                )
                .await
                .category
            }
        };

        let now = Utc::now();
        let mut grievance = Grievance {
            id: Uuid::new_v4().to_string(),
            complaint_id: new_complaint_id(),
            user_id: user_id.to_string(),
            text: text.to_string(),
            category,
            urgency: urgency(category, text),
            status: GrievanceStatus::Received,
            created_at: now,
            updated_at: now,
        };

        for attempt in 1..=ID_ATTEMPTS {
            match self.store.insert_grievance(&grievance).await {
                Ok(()) => {
                    info!(
                        "Filed {} for user {user_id}: {} {:?}",
                        grievance.complaint_id, grievance.category, grievance.urgency
                    );
                    return Ok(grievance);
                }
                Err(StoreError::Duplicate(_)) if attempt < ID_ATTEMPTS => {
                    warn!("Complaint id {} taken, regenerating", grievance.complaint_id);
                    grievance.complaint_id = new_complaint_id();
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::internal("could not allocate a complaint id"))
    }

    pub async fn status(&self, user_id: &str, complaint_id: &str) -> Result<StatusView, AppError> {
        self.store
            .find_grievance(complaint_id)
            .await?
            .filter(|grievance| grievance.user_id == user_id)
            .map(|grievance| status_view(&grievance))
            .ok_or_else(|| AppError::NotFound("Complaint not found".into()))
    }

    pub async fn categorize_preview(&self, text: &str) -> Categorization {
        or_fallback(
            "Categorizer",
            self.categorizer.categorize(text),
            Categorization::fallback(),
        )
        .await
    }

    pub async fn analytics(&self) -> Result<AnalyticsSnapshot, AppError> {
        let snapshot = self.store.list_grievances().await?;

        Ok(analytics(&snapshot))
    }

    pub async fn list_for(&self, user_id: &str) -> Result<Vec<Grievance>, AppError> {
        Ok(self
            .store
            .list_user_grievances(user_id, RECENT_GRIEVANCES)
            .await?)
    }

    /// Operator-side status change; not routed over HTTP.
    pub async fn transition(
        &self,
        complaint_id: &str,
        status: GrievanceStatus,
    ) -> Result<Grievance, AppError> {
        let updated = self
            .store
            .update_grievance_status(complaint_id, status, Utc::now())
            .await?
            .ok_or_else(|| AppError::NotFound("Complaint not found".into()))?;

        info!("{complaint_id} moved to {status:?}");

        Ok(updated)
    }
}
