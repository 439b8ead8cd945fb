//! # Credentials
//!
//! User registration, password checks and bearer tokens.
//!
//! - Passwords are hashed with bcrypt (cost 10 or more) on the blocking pool
//! - Tokens are HS256 JWTs carrying `sub`, `email` and `exp`
//! - Expiry is a hard cutoff, no leeway and no refresh
use std::{sync::Arc, time::Duration};

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use tokio::task::spawn_blocking;
use tracing::info;
use uuid::Uuid;

use crate::{
    config::{Config, MIN_BCRYPT_COST},
    error::{AppError, StoreError},
    models::{PublicUser, User},
    state::State,
    store::Store,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: PublicUser,
}

pub struct Credentials {
    store: Arc<dyn Store>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_lifetime: Duration,
    bcrypt_cost: u32,
}

impl Credentials {
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            store,
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            token_lifetime: config.token_lifetime,
            bcrypt_cost: config.bcrypt_cost.max(MIN_BCRYPT_COST),
        }
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthSession, AppError> {
        let email = email.trim().to_lowercase();

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".into()));
        }

        let password = password.to_string();
        let cost = self.bcrypt_cost;
        let password_hash = spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(AppError::internal)?
            .map_err(AppError::internal)?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash,
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };

        match self.store.insert_user(&user).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(AppError::Conflict("Email already registered".into()));
            }
            Err(e) => return Err(e.into()),
        }

        info!("Registered user {}", user.id);

        self.session_for(&user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        let email = email.trim().to_lowercase();

        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        let password = password.to_string();
        let password_hash = user.password_hash.clone();
        let matches = spawn_blocking(move || bcrypt::verify(password, &password_hash))
            .await
            .map_err(AppError::internal)?
            .map_err(AppError::internal)?;

        if !matches {
            return Err(AppError::Unauthorized("Invalid password".into()));
        }

        info!("Login for user {}", user.id);

        self.session_for(&user)
    }

    pub fn authenticate(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::Unauthorized("Token expired".into()),
                _ => AppError::Unauthorized("Invalid token".into()),
            })
    }

    pub async fn who_am_i(&self, claims: &Claims) -> Result<PublicUser, AppError> {
        self.store
            .find_user(&claims.sub)
            .await?
            .map(|user| PublicUser::from(&user))
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(AppError::internal)
    }

    fn session_for(&self, user: &User) -> Result<AuthSession, AppError> {
        let expires_at = Utc::now().timestamp() as u64 + self.token_lifetime.as_secs();

        let token = self.sign(&Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            exp: expires_at as usize,
        })?;

        Ok(AuthSession {
            token,
            user: PublicUser::from(user),
        })
    }
}

impl FromRequestParts<Arc<State>> for Claims {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<State>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;

        state.credentials.authenticate(token)
    }
}
