mod common;

use axum::http::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::json;

use common::{TestClient, UNREACHABLE, config, read, spawn_gateway};

async fn offline_gateway() -> TestClient {
    TestClient::new(spawn_gateway(config(UNREACHABLE, UNREACHABLE)).await)
}

#[tokio::test]
async fn test_health_is_public() {
    let client = offline_gateway().await;

    let response = client.http.get(client.url("/health")).send().await.unwrap();
    let (status, body) = read(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "status": "OK", "db": true }));
    assert_eq!(body["statusCode"], 200);
}

#[tokio::test]
async fn test_register_conflict_and_login_paths() {
    let client = offline_gateway().await;

    let (status, body) = client.register("Dana@Example.com").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user"]["email"], "dana@example.com");

    let (status, body) = client.register("dana@example.COM").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body,
        json!({ "success": false, "data": null, "error": "Email already registered", "statusCode": 409 })
    );

    let login = |email: &'static str, password: &'static str| {
        let client = &client;
        async move {
            let response = client
                .http
                .post(client.url("/api/auth/login"))
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await
                .unwrap();
            read(response).await
        }
    };

    let (status, body) = login("dana@example.com", "correct horse").await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, _) = login("dana@example.com", "battery staple").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = login("eve@example.com", "correct horse").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = client.get("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Tester");
}

#[tokio::test]
async fn test_protected_routes_need_a_valid_token() {
    let client = offline_gateway().await;

    let response = client
        .http
        .get(client.url("/api/grievance/analytics"))
        .send()
        .await
        .unwrap();
    let (status, body) = read(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing token");

    let (status, body) = client.get("/api/auth/me", "garbage.token.value").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn test_malformed_bodies_are_validation_errors() {
    let client = offline_gateway().await;

    let response = client
        .http
        .post(client.url("/api/auth/register"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    let (status, body) = read(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let response = client
        .http
        .post(client.url("/api/auth/register"))
        .json(&json!({ "email": "no-at-sign", "password": "x", "name": "X" }))
        .send()
        .await
        .unwrap();
    let (status, _) = read(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let token = client.token_for("frank@example.com").await;
    let (status, _) = client
        .post_json("/api/grievance/file", &token, json!({ "text": "   " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = client
        .post_json(
            "/api/app/registry",
            &token,
            json!({ "package_name": "com.bank.app", "owner": "me" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_grievance_lifecycle_with_categorizer_down() {
    let client = offline_gateway().await;
    let owner = client.token_for("gina@example.com").await;
    let other = client.token_for("hank@example.com").await;

    let (status, body) = client
        .post_json(
            "/api/grievance/file",
            &owner,
            json!({ "text": "unauthorized debit from my account" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["category"], "other");
    assert_eq!(body["data"]["urgency"], "HIGH");
    assert_eq!(body["data"]["status"], "RECEIVED");

    let complaint_id = body["data"]["complaint_id"].as_str().unwrap().to_string();
    assert!(complaint_id.starts_with("CASE-"));

    let (status, body) = client
        .get(&format!("/api/grievance/status/{complaint_id}"), &owner)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["timeline"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["timeline"][0]["event"], "created");

    let (status, foreign) = client
        .get(&format!("/api/grievance/status/{complaint_id}"), &other)
        .await;
    let (_, missing) = client.get("/api/grievance/status/CASE-0", &other).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(foreign, missing);

    let (_, body) = client
        .post_json(
            "/api/grievance/file",
            &owner,
            json!({ "text": "my card was used fraudulently", "category": "card_fraud" }),
        )
        .await;
    assert_eq!(body["data"]["category"], "card_fraud");
    assert_eq!(body["data"]["urgency"], "HIGH");

    let (_, body) = client.get("/api/grievance/list", &owner).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    let (_, body) = client.get("/api/grievance/list", &other).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, body) = client
        .post_json(
            "/api/grievance/categorize",
            &owner,
            json!({ "text": "loan interest wrong" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "category": "other", "confidence": 0.5 }));

    let (_, body) = client.get("/api/grievance/analytics", &owner).await;
    assert_eq!(body["data"]["total_complaints"], 2);
    assert_eq!(body["data"]["by_category"], json!({ "card_fraud": 1, "other": 1 }));
    assert_eq!(body["data"]["high_priority_pending"], 2);
    assert_eq!(body["data"]["avg_resolution_time_hours"], 0.0);
}

#[tokio::test]
async fn test_analytics_on_empty_store() {
    let client = offline_gateway().await;
    let token = client.token_for("ivy@example.com").await;

    let (status, body) = client.get("/api/grievance/analytics", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({
            "total_complaints": 0,
            "by_category": {},
            "avg_resolution_time_hours": 0.0,
            "high_priority_pending": 0
        })
    );
}

#[tokio::test]
async fn test_identity_fallback_is_persisted_and_owned() {
    let client = offline_gateway().await;
    let owner = client.token_for("jack@example.com").await;
    let other = client.token_for("kate@example.com").await;

    let form = Form::new().part(
        "video",
        Part::bytes(b"fake video frames".to_vec()).file_name("selfie.mp4"),
    );
    let response = client
        .http
        .post(client.url("/api/identity/verify"))
        .bearer_auth(&owner)
        .multipart(form)
        .send()
        .await
        .unwrap();
    let (status, body) = read(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["overall_result"], "VERIFIED");
    assert_eq!(body["data"]["liveness_status"], "PASS");
    assert_eq!(body["data"]["deepfake_score"], 0.15);

    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = client
        .get(&format!("/api/identity/result/{id}"), &owner)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id);

    let (status, _) = client
        .get(&format!("/api/identity/result/{id}"), &other)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = client.get("/api/identity/checks", &owner).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_identity_verify_requires_video() {
    let client = offline_gateway().await;
    let token = client.token_for("liam@example.com").await;

    let response = client
        .http
        .post(client.url("/api/identity/verify"))
        .bearer_auth(&token)
        .multipart(Form::new().text("note", "no video here"))
        .send()
        .await
        .unwrap();
    let (status, _) = read(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_app_verdicts_follow_registry_precedence() {
    let client = offline_gateway().await;
    let token = client.token_for("mia@example.com").await;

    let (status, _) = client
        .post_json(
            "/api/app/registry",
            &token,
            json!({
                "package_name": "com.bank.app",
                "publisher": "Example Bank Ltd",
                "google_play_link": "https://play.google.com/store/apps/details?id=com.bank.app"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = client
        .post_json(
            "/api/app/registry",
            &token,
            json!({ "package_name": "com.bank.app" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    for package_name in ["com.bank.app", "com.bank.app.lite"] {
        let (status, _) = client
            .post_json(
                "/api/app/suspicious",
                &token,
                json!({ "package_name": package_name }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let verify = |form: Form| {
        let client = &client;
        let token = &token;
        async move {
            let response = client
                .http
                .post(client.url("/api/app/verify"))
                .bearer_auth(token)
                .multipart(form)
                .send()
                .await
                .unwrap();
            read(response).await
        }
    };

    let (status, body) = verify(Form::new().text("package_name", "com.bank.app")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "OFFICIAL");
    assert_eq!(body["data"]["confidence"], 0.98);
    assert_eq!(body["data"]["publisher"], "Example Bank Ltd");

    let (_, body) = verify(Form::new().text("package_name", "com.bank.app.lite")).await;
    assert_eq!(body["data"]["status"], "SUSPICIOUS");
    assert_eq!(body["data"]["confidence"], 0.8);

    let (_, body) = verify(
        Form::new().part(
            "apk",
            Part::bytes(b"unknown build".to_vec()).file_name("app.apk"),
        ),
    )
    .await;
    assert_eq!(body["data"]["status"], "UNKNOWN");
    assert_eq!(body["data"]["confidence"], 0.5);
    assert_eq!(body["data"]["publisher"], serde_json::Value::Null);

    let (status, _) = verify(Form::new().text("package_name", "  ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = client.get("/api/app/registry", &token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    let (_, body) = client.get("/api/app/suspicious", &token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_blank_registry_keys_are_rejected() {
    let client = offline_gateway().await;
    let token = client.token_for("nina@example.com").await;

    for body in [
        json!({ "package_name": "   " }),
        json!({ "package_name": "" }),
        json!({ "sha256_hash": " " }),
    ] {
        let (status, body) = client.post_json("/api/app/registry", &token, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }

    let (_, body) = client.get("/api/app/registry", &token).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let mut config = config(UNREACHABLE, UNREACHABLE);
    config.max_upload_bytes = 1024;
    let client = TestClient::new(spawn_gateway(config).await);
    let token = client.token_for("otto@example.com").await;

    let response = client
        .http
        .post(client.url("/api/identity/verify"))
        .bearer_auth(&token)
        .multipart(Form::new().part("video", Part::bytes(vec![7u8; 8 * 1024])))
        .send()
        .await
        .unwrap();
    let (status, body) = read(response).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["success"], false);
    assert_eq!(body["statusCode"], 413);

    let (_, body) = client.get("/api/identity/checks", &token).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}
