//! Documentation of the TrustGuard consumer trust and safety backend.
//!
//!
//!
//! # General Infrastructure
//! - One gateway process serves the whole `/api` surface
//! - Storage is Redis, reached through a single injected [`store::Store`] handle
//! - Two classifier microservices (identity predictor, grievance categorizer) are
//!   plain HTTP collaborators; when they are down the gateway answers with fixed defaults
//! - Bearer tokens are HS256 JWTs signed with `JWT_SECRET`
//!
//!
//!
//! # Components
//! - [`auth`]: registration, login, token verification
//! - [`identity`]: deepfake / liveness check with a fail-open fallback
//! - [`apps`]: APK authenticity against the official and suspicious registries
//! - [`grievance`]: complaint filing, status timeline, analytics
//! - [`routes`]: thin handlers translating HTTP to the components above
//!
//!
//!
//! # Notes
//!
//! ## Fail-open identity checks
//! If the identity predictor is unreachable the check is stored as VERIFIED
//! with score 0.15. This is a product decision and a known weak spot.
//!
//! ## Registry writes
//! Any authenticated user can add official or suspicious registry entries.
//! There is no admin role yet; do not add one without a product decision.
//!
//!
//!
//! # Setup
//!
//! Run against a local Redis.
//! ```sh
//! JWT_SECRET=dev REDIS_URL=redis://localhost:6379 cargo run -p trustguard
//! ```
//!
//! Run without Redis.
//! ```sh
//! JWT_SECRET=dev STORAGE_BACKEND=memory cargo run -p trustguard
//! ```
//!
//! Smoke test a running gateway.
//! ```sh
//! cargo run -p tester -- http://localhost:8000
//! ```
//!
//! Generate docs in `target/doc/server/index.html`.
//! ```sh
//! cargo doc
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod apps;
pub mod auth;
pub mod classifier;
pub mod config;
pub mod database;
pub mod error;
pub mod grievance;
pub mod identity;
pub mod memory;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;

use routes::{
    app_verify_handler, grievance_analytics_handler, grievance_categorize_handler,
    grievance_file_handler, grievance_list_handler, grievance_status_handler, health_handler,
    identity_checks_handler, identity_result_handler, identity_verify_handler, login_handler,
    me_handler, register_handler, registry_add_handler, registry_list_handler, root_handler,
    suspicious_add_handler, suspicious_list_handler,
};
use state::State;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new().await;

    info!("Starting server...");

    let app = router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    drop(state);
    info!("Server shut down, storage handle released");
}

pub fn router(state: Arc<State>) -> Router {
    let api = Router::new()
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/me", get(me_handler))
        .route("/identity/verify", post(identity_verify_handler))
        .route("/identity/result/{id}", get(identity_result_handler))
        .route("/identity/checks", get(identity_checks_handler))
        .route("/app/verify", post(app_verify_handler))
        .route(
            "/app/registry",
            get(registry_list_handler).post(registry_add_handler),
        )
        .route(
            "/app/suspicious",
            get(suspicious_list_handler).post(suspicious_add_handler),
        )
        .route("/grievance/file", post(grievance_file_handler))
        .route(
            "/grievance/status/{complaint_id}",
            get(grievance_status_handler),
        )
        .route("/grievance/list", get(grievance_list_handler))
        .route("/grievance/categorize", post(grievance_categorize_handler))
        .route("/grievance/analytics", get(grievance_analytics_handler));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(cors(&state.config.cors_allow_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    if origins.iter().any(|origin| origin == "*") {
        return cors.allow_origin(AllowOrigin::any());
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|_| warn!("Ignoring invalid CORS origin {origin}"))
                .ok()
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(allowed))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
