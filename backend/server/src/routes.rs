//! # HTTP surface
//!
//! Every response body is an [`Envelope`]: `{success, data, error, statusCode}`.
//! Everything under `/api` except register and login needs
//! `Authorization: Bearer <token>`.
//!
//! | Route | Body |
//! |---|---|
//! | `POST /api/auth/register` | `{email, password, name}` |
//! | `POST /api/auth/login` | `{email, password}` |
//! | `GET /api/auth/me` | |
//! | `POST /api/identity/verify` | multipart `video` |
//! | `GET /api/identity/result/{id}` | |
//! | `GET /api/identity/checks` | |
//! | `POST /api/app/verify` | multipart `package_name?`, `apk?` |
//! | `GET/POST /api/app/registry` | `{package_name?, sha256_hash?, publisher?, google_play_link?}` |
//! | `GET/POST /api/app/suspicious` | `{package_name, publisher?, google_play_link?, confidence?}` |
//! | `POST /api/grievance/file` | `{text, category?}` |
//! | `GET /api/grievance/status/{complaint_id}` | |
//! | `GET /api/grievance/list` | |
//! | `POST /api/grievance/categorize` | `{text}` |
//! | `GET /api/grievance/analytics` | |
use std::{sync::Arc, time::Instant};

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Path, State as AxumState, rejection::JsonRejection},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
    apps::{AppVerdict, NewOfficialApp, NewSuspiciousApp},
    auth::{AuthSession, Claims},
    error::AppError,
    models::{
        Category, GrievanceStatus, IdentityCheck, LivenessStatus, OverallResult, Urgency,
    },
    state::State,
    utils::{created, elapsed_ms, non_blank, ok},
};

type AppState = AxumState<Arc<State>>;

const MAX_FIELD_LEN: usize = 255;

#[derive(Deserialize)]
pub struct RegisterRequest {
    email: String,
    password: String,
    name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct FileGrievanceRequest {
    text: String,
    category: Option<String>,
}

#[derive(Deserialize)]
pub struct CategorizeRequest {
    text: String,
}

#[derive(Serialize)]
struct SessionResponse {
    #[serde(flatten)]
    session: AuthSession,
    latency_ms: u64,
}

#[derive(Serialize)]
struct IdentityResultView {
    id: String,
    deepfake_score: f64,
    liveness_status: LivenessStatus,
    overall_result: OverallResult,
    latency_ms: u64,
    created_at: DateTime<Utc>,
}

impl From<IdentityCheck> for IdentityResultView {
    fn from(check: IdentityCheck) -> Self {
        Self {
            id: check.id,
            deepfake_score: check.deepfake_score,
            liveness_status: check.liveness_status,
            overall_result: check.overall_result,
            latency_ms: check.latency_ms,
            created_at: check.created_at,
        }
    }
}

#[derive(Serialize)]
struct VerdictResponse {
    #[serde(flatten)]
    verdict: AppVerdict,
    latency_ms: u64,
}

#[derive(Serialize)]
struct FiledGrievance {
    complaint_id: String,
    category: Category,
    urgency: Urgency,
    status: GrievanceStatus,
    created_at: DateTime<Utc>,
    latency_ms: u64,
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid || email.len() > MAX_FIELD_LEN {
        return Err(AppError::Validation("Invalid email".into()));
    }

    Ok(())
}

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} required")));
    }

    Ok(())
}

pub async fn root_handler() -> impl IntoResponse {
    ok(json!({ "message": "TrustGuard API running" }))
}

pub async fn health_handler(AxumState(state): AppState) -> impl IntoResponse {
    let db = state.store.ping().await.is_ok();

    ok(json!({ "status": "OK", "db": db }))
}

pub async fn register_handler(
    AxumState(state): AppState,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let start = Instant::now();
    let Json(body) = payload?;

    validate_email(&body.email)?;
    require_text("password", &body.password)?;
    require_text("name", &body.name)?;
    if body.name.len() > MAX_FIELD_LEN {
        return Err(AppError::Validation("name too long".into()));
    }

    let session = state
        .credentials
        .register(&body.email, &body.password, &body.name)
        .await?;

    Ok(created(SessionResponse {
        session,
        latency_ms: elapsed_ms(start),
    }))
}

pub async fn login_handler(
    AxumState(state): AppState,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let start = Instant::now();
    let Json(body) = payload?;

    validate_email(&body.email)?;
    require_text("password", &body.password)?;

    let session = state.credentials.login(&body.email, &body.password).await?;

    Ok(ok(SessionResponse {
        session,
        latency_ms: elapsed_ms(start),
    }))
}

pub async fn me_handler(
    AxumState(state): AppState,
    claims: Claims,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.credentials.who_am_i(&claims).await?))
}

pub async fn identity_verify_handler(
    AxumState(state): AppState,
    claims: Claims,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut video: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("video") {
            video = Some(field.bytes().await?);
        }
    }

    let video = video
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| AppError::Validation("video required".into()))?;

    let check = state.identity.verify(&claims.sub, video).await?;

    Ok(ok(IdentityResultView::from(check)))
}

pub async fn identity_result_handler(
    AxumState(state): AppState,
    claims: Claims,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let check = state.identity.get_result(&claims.sub, &id).await?;

    Ok(ok(IdentityResultView::from(check)))
}

pub async fn identity_checks_handler(
    AxumState(state): AppState,
    claims: Claims,
) -> Result<impl IntoResponse, AppError> {
    let checks: Vec<IdentityResultView> = state
        .identity
        .history(&claims.sub)
        .await?
        .into_iter()
        .map(IdentityResultView::from)
        .collect();

    Ok(ok(checks))
}

pub async fn app_verify_handler(
    AxumState(state): AppState,
    _claims: Claims,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let start = Instant::now();
    let mut package_name: Option<String> = None;
    let mut apk: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);

        match name.as_deref() {
            Some("package_name") => package_name = Some(field.text().await?),
            Some("apk") => apk = Some(field.bytes().await?),
            _ => {}
        }
    }

    let package_name = non_blank(package_name);
    let apk = apk.filter(|bytes| !bytes.is_empty());

    let verdict = state
        .apps
        .resolve(package_name.as_deref(), apk.as_deref())
        .await?;

    Ok(ok(VerdictResponse {
        verdict,
        latency_ms: elapsed_ms(start),
    }))
}

pub async fn registry_list_handler(
    AxumState(state): AppState,
    _claims: Claims,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.apps.list_official().await?))
}

pub async fn registry_add_handler(
    AxumState(state): AppState,
    claims: Claims,
    payload: Result<Json<NewOfficialApp>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(entry) = payload?;

    let app = state.apps.add_official(entry).await?;
    info!("User {} added official app {}", claims.sub, app.id);

    Ok(ok(json!({ "id": app.id })))
}

pub async fn suspicious_list_handler(
    AxumState(state): AppState,
    _claims: Claims,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.apps.list_suspicious().await?))
}

pub async fn suspicious_add_handler(
    AxumState(state): AppState,
    claims: Claims,
    payload: Result<Json<NewSuspiciousApp>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(entry) = payload?;

    let app = state.apps.add_suspicious(entry).await?;
    info!("User {} flagged suspicious app {}", claims.sub, app.package_name);

    Ok(ok(json!({ "id": app.id })))
}

pub async fn grievance_file_handler(
    AxumState(state): AppState,
    claims: Claims,
    payload: Result<Json<FileGrievanceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let start = Instant::now();
    let Json(body) = payload?;

    require_text("text", &body.text)?;
    let category = non_blank(body.category);

    let grievance = state
        .grievances
        .file(&claims.sub, &body.text, category.as_deref())
        .await?;

    Ok(ok(FiledGrievance {
        complaint_id: grievance.complaint_id,
        category: grievance.category,
        urgency: grievance.urgency,
        status: grievance.status,
        created_at: grievance.created_at,
        latency_ms: elapsed_ms(start),
    }))
}

pub async fn grievance_status_handler(
    AxumState(state): AppState,
    claims: Claims,
    Path(complaint_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.grievances.status(&claims.sub, &complaint_id).await?))
}

pub async fn grievance_list_handler(
    AxumState(state): AppState,
    claims: Claims,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.grievances.list_for(&claims.sub).await?))
}

pub async fn grievance_categorize_handler(
    AxumState(state): AppState,
    _claims: Claims,
    payload: Result<Json<CategorizeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = payload?;
    require_text("text", &body.text)?;

    Ok(ok(state.grievances.categorize_preview(&body.text).await))
}

pub async fn grievance_analytics_handler(
    AxumState(state): AppState,
    _claims: Claims,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.grievances.analytics().await?))
}
