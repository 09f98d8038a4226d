// Authentication: password hashing, JWT tokens and the summoner extractor.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::config::{self, LOCAL_SUMMONER_ID, LOCAL_USERNAME};
use crate::db::{Database, Summoner};

// ── JWT ──────────────────────────────────────────────────────────────

fn jwt_secret() -> Vec<u8> {
    std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "swarfarm-dev-secret-change-in-production".to_string())
        .into_bytes()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i64, // summoner id
    pub username: String,
    pub exp: usize,
}

pub fn create_token(summoner_id: i64, username: &str) -> Result<String, String> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(24))
        .ok_or_else(|| "Token expiry out of range".to_string())?
        .timestamp() as usize;

    let claims = Claims {
        sub: summoner_id,
        username: username.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(&jwt_secret()),
    )
    .map_err(|e| format!("Failed to create token: {e}"))
}

pub fn verify_token(token: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(&jwt_secret()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {e}"))
}

// ── Password hashing ─────────────────────────────────────────────────

pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| format!("Failed to hash password: {e}"))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| format!("Invalid password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

// ── Axum extractor: AuthUser ─────────────────────────────────────────

/// The authenticated summoner, from a `Bearer` JWT. In local mode every
/// request is the local summoner.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn summoner_id(&self) -> i64 {
        self.0.sub
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if config::is_local_mode() {
            return Ok(AuthUser(Claims {
                sub: LOCAL_SUMMONER_ID,
                username: LOCAL_USERNAME.to_string(),
                exp: usize::MAX,
            }));
        }

        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"error": "Missing Authorization header"})),
                )
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Invalid Authorization header format"})),
            )
        })?;

        verify_token(token).map(AuthUser).map_err(|e| {
            tracing::debug!("Rejected bearer token: {e}");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Invalid token"})),
            )
        })
    }
}

// ── Auth API handlers ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub summoner: Summoner,
}

fn auth_error(status: StatusCode, msg: &str) -> axum::response::Response {
    (status, Json(json!({ "error": msg }))).into_response()
}

fn token_response(status: StatusCode, summoner: Summoner) -> axum::response::Response {
    match create_token(summoner.id, &summoner.username) {
        Ok(token) => (status, Json(json!(AuthResponse { token, summoner }))).into_response(),
        Err(e) => {
            tracing::error!("Token creation error: {e}");
            auth_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

pub async fn register(
    State(db): State<Arc<Database>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    if req.username.is_empty() || req.password.is_empty() || req.email.is_empty() {
        return auth_error(
            StatusCode::BAD_REQUEST,
            "username, email, and password are required",
        );
    }
    if req.username.len() < 3 || req.username.len() > 30 {
        return auth_error(StatusCode::BAD_REQUEST, "username must be 3-30 characters");
    }
    if req.password.len() < 8 {
        return auth_error(
            StatusCode::BAD_REQUEST,
            "password must be at least 8 characters",
        );
    }

    let password_hash = match hash_password(&req.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("Password hash error: {e}");
            return auth_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
        }
    };

    match db
        .create_summoner(&req.username, &req.email, Some(&password_hash))
        .await
    {
        Ok(summoner) => {
            tracing::info!(summoner_id = summoner.id, "Registered summoner");
            token_response(StatusCode::CREATED, summoner)
        }
        Err(e) if e.to_string().contains("UNIQUE") => {
            auth_error(StatusCode::CONFLICT, "Username or email already taken")
        }
        Err(e) => {
            tracing::error!("DB error in register: {e}");
            auth_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

pub async fn login(
    State(db): State<Arc<Database>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let summoner = match db.get_summoner_by_username(&req.username).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            return auth_error(StatusCode::UNAUTHORIZED, "Invalid username or password");
        }
        Err(e) => {
            tracing::error!("DB error in login: {e}");
            return auth_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
        }
    };

    let Some(ref password_hash) = summoner.password_hash else {
        return auth_error(StatusCode::UNAUTHORIZED, "This account has no password");
    };

    match verify_password(&req.password, password_hash) {
        Ok(true) => token_response(StatusCode::OK, summoner),
        Ok(false) => auth_error(StatusCode::UNAUTHORIZED, "Invalid username or password"),
        Err(e) => {
            tracing::error!("Password verify error: {e}");
            auth_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

pub async fn me(auth: AuthUser, State(db): State<Arc<Database>>) -> impl IntoResponse {
    match db.get_summoner(auth.summoner_id()).await {
        Ok(Some(summoner)) => (StatusCode::OK, Json(json!(summoner))).into_response(),
        Ok(None) => auth_error(StatusCode::NOT_FOUND, "Summoner not found"),
        Err(e) => {
            tracing::error!("DB error: {e}");
            auth_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}
