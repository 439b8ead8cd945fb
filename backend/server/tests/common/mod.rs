#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use axum::{Json, Router, http::StatusCode, routing::post};
use reqwest::Client;
use serde_json::{Value, json};
use server::{
    classifier::HttpClassifier,
    config::{Config, MIN_BCRYPT_COST, StorageBackend},
    memory::MemoryStore,
    router,
    state::State,
};
use tokio::net::TcpListener;

pub const UNREACHABLE: &str = "http://127.0.0.1:1";

pub fn config(identity_url: &str, grievance_url: &str) -> Config {
    Config {
        port: 0,
        storage: StorageBackend::Memory,
        redis_url: String::new(),
        jwt_secret: "integration-secret".to_string(),
        token_lifetime: Duration::from_secs(60 * 60),
        bcrypt_cost: MIN_BCRYPT_COST,
        identity_service_url: identity_url.to_string(),
        grievance_service_url: grievance_url.to_string(),
        identity_timeout: Duration::from_secs(2),
        categorize_timeout: Duration::from_secs(2),
        cors_allow_origins: vec!["*".to_string()],
        max_upload_bytes: 4 * 1024 * 1024,
    }
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{address}")
}

/// Gateway over an empty in-memory store.
pub async fn spawn_gateway(config: Config) -> String {
    let classifier = Arc::new(HttpClassifier::new(&config));
    let state = State::assemble(
        config,
        Arc::new(MemoryStore::new()),
        classifier.clone(),
        classifier,
    );

    serve(router(state)).await
}

/// Classifier stand-in answering both `/predict` and `/categorize`.
pub async fn spawn_classifiers() -> String {
    let app = Router::new()
        .route(
            "/predict",
            post(|| async {
                Json(json!({
                    "deepfake_score": 0.72,
                    "liveness_status": "FAIL",
                    "overall_result": "REJECTED",
                    "latency_ms": 42
                }))
            }),
        )
        .route(
            "/categorize",
            post(|Json(body): Json<Value>| async move {
                let text = body["text"].as_str().unwrap_or_default().to_lowercase();
                let category = if text.contains("loan") {
                    "loan_dispute"
                } else {
                    "fraud"
                };

                Json(json!({ "category": category, "confidence": 0.77 }))
            }),
        );

    serve(app).await
}

/// Classifier stand-in that always fails.
pub async fn spawn_broken_classifiers() -> String {
    let app = Router::new()
        .route("/predict", post(|| async { StatusCode::BAD_GATEWAY }))
        .route(
            "/categorize",
            post(|| async { (StatusCode::OK, "not json") }),
        );

    serve(app).await
}

pub struct TestClient {
    pub base: String,
    pub http: Client,
}

impl TestClient {
    pub fn new(base: String) -> Self {
        Self {
            base,
            http: Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub async fn register(&self, email: &str) -> (StatusCode, Value) {
        let response = self
            .http
            .post(self.url("/api/auth/register"))
            .json(&json!({ "email": email, "password": "correct horse", "name": "Tester" }))
            .send()
            .await
            .unwrap();

        read(response).await
    }

    /// Registers a fresh user and returns its token.
    pub async fn token_for(&self, email: &str) -> String {
        let (status, body) = self.register(email).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");

        body["data"]["token"].as_str().unwrap().to_string()
    }

    pub async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();

        read(response).await
    }

    pub async fn post_json(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();

        read(response).await
    }
}

pub async fn read(response: reqwest::Response) -> (StatusCode, Value) {
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
    let body = response.json().await.unwrap();

    (status, body)
}
