//! User administration handlers.

use axum::extract::{Json, Path, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::{SanitizedUser, UpdateUser};
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Default)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub role_id: Option<Uuid>,
}

/// List users.
///
/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Vec<SanitizedUser>>, AppError> {
    state.authz.require_any(&claims, &["ver"]).await?;

    let users = state.db.list_users().await?;
    Ok(Json(users.into_iter().map(|u| u.sanitize()).collect()))
}

/// Update a user's profile or role.
///
/// PUT /users/:user_id
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<SanitizedUser>, AppError> {
    state.authz.require_any(&claims, &["editar"]).await?;

    if let Some(role_id) = req.role_id {
        state
            .db
            .find_role_by_id(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;
    }

    let user = state
        .db
        .update_user(
            user_id,
            &UpdateUser {
                full_name: req.full_name,
                role_id: req.role_id,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    Ok(Json(user.sanitize()))
}

/// Deactivate a user; deactivated users can no longer log in.
///
/// POST /users/:user_id/deactivate
pub async fn deactivate_user(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<SanitizedUser>, AppError> {
    state.authz.require_any(&claims, &["editar"]).await?;

    let user = state
        .db
        .set_user_active(user_id, false)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    Ok(Json(user.sanitize()))
}
