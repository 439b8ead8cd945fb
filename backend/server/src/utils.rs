use std::time::Instant;

use axum::{Json, http::StatusCode};
use serde::Serialize;

/// Uniform response body for every endpoint, success or failure.
#[derive(Serialize, Debug)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T, status: StatusCode) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status_code: status.as_u16(),
        }
    }

    pub fn failure(message: String, status: StatusCode) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            status_code: status.as_u16(),
        }
    }
}

pub fn ok<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::OK, Json(Envelope::success(data, StatusCode::OK)))
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (
        StatusCode::CREATED,
        Json(Envelope::success(data, StatusCode::CREATED)),
    )
}

pub fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Blank and whitespace-only form values count as absent.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
