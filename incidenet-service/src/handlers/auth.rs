//! Authentication handlers: registration, login, current profile.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::middleware::AuthUser;
use crate::models::{SanitizedUser, User};
use crate::utils::password::{hash_password, verify_password};
use crate::AppState;
use service_core::error::AppError;

/// Request to register a new user.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    /// Explicit role assignment; only honored when the request carries an
    /// administrator token. Everyone else gets the seeded "Usuario" role.
    pub role_id: Option<Uuid>,
}

/// Request to log in.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response: token plus the sanitized user.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: SanitizedUser,
}

/// Register a new user. The route is public, so an explicit `role_id` is
/// only honored for callers presenting an administrator token; otherwise the
/// fixed seeded role ids would let anyone self-register as administrator.
///
/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SanitizedUser>), AppError> {
    req.validate()?;

    let role_id = match req.role_id {
        Some(role_id) => {
            require_admin_caller(&state, &headers).await?;
            state
                .db
                .find_role_by_id(role_id)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?
                .role_id
        }
        None => {
            state
                .db
                .find_role_by_name("Usuario")
                .await?
                .ok_or_else(|| {
                    AppError::InternalError(anyhow::anyhow!("Default role is not seeded"))
                })?
                .role_id
        }
    };

    let password_hash = hash_password(&req.password)?;
    let user = User::new(req.email, password_hash, req.full_name, role_id);

    state.db.insert_user(&user).await?;

    tracing::info!(user_id = %user.user_id, "User registered");
    Ok((StatusCode::CREATED, Json(user.sanitize())))
}

/// Require that the (pre-middleware) request carries a valid bearer token
/// whose role is the administrator role.
async fn require_admin_caller(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Forbidden(anyhow::anyhow!(
                "Assigning a role requires administrator access"
            ))
        })?;

    let claims = state.jwt.validate_access_token(token)?;
    let role = state
        .db
        .find_role_by_id(claims.role_id()?)
        .await?
        .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Role not found")))?;

    if !role.is_admin() {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Assigning a role requires administrator access"
        )));
    }

    Ok(())
}

/// Verify credentials and issue an access token.
///
/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = state
        .db
        .find_user_by_email(&req.email)
        .await?
        .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Invalid credentials")))?;

    if !verify_password(&req.password, &user.password_hash)? {
        return Err(AppError::AuthError(anyhow::anyhow!("Invalid credentials")));
    }

    if !user.active {
        return Err(AppError::AuthError(anyhow::anyhow!("User is inactive")));
    }

    let access_token = state.jwt.generate_access_token(&user)?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.access_token_expiry_seconds(),
        user: user.sanitize(),
    }))
}

/// Current caller's profile.
///
/// GET /users/me
pub async fn me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<SanitizedUser>, AppError> {
    let user = state
        .db
        .find_user_by_id(claims.user_id()?)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    Ok(Json(user.sanitize()))
}
