//! Role and access-grant handlers.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::MessageResponse;
use crate::middleware::AuthUser;
use crate::models::{AccessGrant, CreateRole, Role, UpdateRole};
use crate::AppState;
use service_core::error::AppError;

/// Request to create a role.
#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
}

/// Request to update a role.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Request to upsert an access grant for a role.
#[derive(Debug, Deserialize)]
pub struct UpsertGrantRequest {
    pub permission_id: Uuid,
    pub granted: bool,
}

/// Create a new role.
///
/// POST /roles
pub async fn create_role(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), AppError> {
    state.authz.require_any(&claims, &["crear"]).await?;

    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("Role name is required")));
    }

    let role = state
        .db
        .insert_role(&CreateRole {
            name: req.name.trim().to_string(),
            description: req.description,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(role)))
}

/// List all roles.
///
/// GET /roles
pub async fn list_roles(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Vec<Role>>, AppError> {
    state.authz.require_any(&claims, &["ver"]).await?;
    Ok(Json(state.db.list_roles().await?))
}

/// Get a role by ID.
///
/// GET /roles/:role_id
pub async fn get_role(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(role_id): Path<Uuid>,
) -> Result<Json<Role>, AppError> {
    state.authz.require_any(&claims, &["ver"]).await?;

    let role = state
        .db
        .find_role_by_id(role_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;

    Ok(Json(role))
}

/// Update a role.
///
/// PUT /roles/:role_id
pub async fn update_role(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(role_id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<Role>, AppError> {
    state.authz.require_any(&claims, &["editar"]).await?;

    let role = state
        .db
        .update_role(
            role_id,
            &UpdateRole {
                name: req.name,
                description: req.description,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;

    Ok(Json(role))
}

/// Delete a role. Destructive; only the database's referential constraints
/// stand in the way of removing a role that is still referenced.
///
/// DELETE /roles/:role_id
pub async fn delete_role(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(role_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.authz.require_any(&claims, &["eliminar"]).await?;

    if !state.db.delete_role(role_id).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("Role not found")));
    }

    Ok(Json(MessageResponse {
        message: "Role deleted".to_string(),
    }))
}

/// Upsert an access grant for a role. One row per (role, permission) pair.
///
/// PUT /roles/:role_id/grants
pub async fn upsert_grant(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(role_id): Path<Uuid>,
    Json(req): Json<UpsertGrantRequest>,
) -> Result<Json<AccessGrant>, AppError> {
    state.authz.require_any(&claims, &["editar"]).await?;

    state
        .db
        .find_role_by_id(role_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;

    let grant = state
        .db
        .upsert_access_grant(role_id, req.permission_id, req.granted)
        .await?;

    Ok(Json(grant))
}

/// List a role's access grants.
///
/// GET /roles/:role_id/grants
pub async fn list_grants(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(role_id): Path<Uuid>,
) -> Result<Json<Vec<AccessGrant>>, AppError> {
    state.authz.require_any(&claims, &["ver"]).await?;

    state
        .db
        .find_role_by_id(role_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;

    Ok(Json(state.db.list_role_grants(role_id).await?))
}
