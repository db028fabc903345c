use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};

use timeline_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};
use timeline_types::models::User;

use crate::error::ApiError;
use crate::state::{AppState, with_db};

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    // Validate input
    let username_len = req.username.chars().count();
    if !(3..=32).contains(&username_len) {
        return Err(ApiError::Validation(
            "Username must be between 3 and 32 characters".into(),
        ));
    }
    if req.password.chars().count() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }

    // Check if username is taken
    let name = req.username.clone();
    if with_db(&state, move |db| db.get_user_by_username(&name))
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("Username already exists".into()));
    }

    let password_hash = hash_password(&req.password)?;

    // The UNIQUE constraint still catches a concurrent registration.
    let name = req.username.clone();
    let user = with_db(&state, move |db| db.create_user(&name, &password_hash)).await?;

    let token = create_token(&state.jwt_secret, user.id, &user.username)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!("Registered user {} ({})", user.username, user.id);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id: user.id,
            username: user.username,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let name = req.username.clone();
    let user = with_db(&state, move |db| db.get_user_by_username(&name))
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    // Verify password
    let parsed_hash =
        PasswordHash::new(&user.password).map_err(|e| ApiError::Internal(e.to_string()))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthenticated)?;

    let token = create_token(&state.jwt_secret, user.id, &user.username)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(AuthResponse {
        user_id: user.id,
        username: user.username,
        token,
    }))
}

/// GET /user — the identity behind the bearer token.
pub async fn current_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<User>, ApiError> {
    let user = with_db(&state, move |db| db.get_user(claims.sub))
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    Ok(Json(User {
        id: user.id,
        username: user.username,
    }))
}

/// Hash a password with Argon2id and a random salt, in PHC string format.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Internal(e.to_string())
        })
}

pub fn create_token(
    secret: &str,
    user_id: i64,
    username: &str,
) -> jsonwebtoken::errors::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}
