//! Module handlers, including the permission-set replace and merge
//! operations.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::MessageResponse;
use crate::middleware::AuthUser;
use crate::models::{CreateModule, Module, Permission, UpdateModule};
use crate::AppState;
use service_core::error::AppError;

/// Request to create a module.
#[derive(Debug, Deserialize)]
pub struct CreateModuleRequest {
    pub name: String,
    pub route_path: String,
    pub icon: Option<String>,
    #[serde(default)]
    pub menu_order: i32,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

/// Request to update a module.
#[derive(Debug, Deserialize, Default)]
pub struct UpdateModuleRequest {
    pub name: Option<String>,
    pub route_path: Option<String>,
    pub icon: Option<String>,
    pub menu_order: Option<i32>,
    pub visible: Option<bool>,
}

/// Desired permission names for replace/merge operations.
#[derive(Debug, Deserialize)]
pub struct PermissionNamesRequest {
    pub permissions: Vec<String>,
}

/// Create a module.
///
/// POST /modules
pub async fn create_module(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<CreateModuleRequest>,
) -> Result<(StatusCode, Json<Module>), AppError> {
    state.authz.require_any(&claims, &["crear"]).await?;

    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Module name is required"
        )));
    }

    let module = state
        .db
        .insert_module(&CreateModule {
            name: req.name,
            route_path: req.route_path,
            icon: req.icon,
            menu_order: req.menu_order,
            visible: req.visible,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(module)))
}

/// List modules ordered for menu display.
///
/// GET /modules
pub async fn list_modules(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Vec<Module>>, AppError> {
    state.authz.require_any(&claims, &["ver"]).await?;
    Ok(Json(state.db.list_modules().await?))
}

/// Get a module by ID.
///
/// GET /modules/:module_id
pub async fn get_module(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(module_id): Path<Uuid>,
) -> Result<Json<Module>, AppError> {
    state.authz.require_any(&claims, &["ver"]).await?;

    let module = state
        .db
        .find_module_by_id(module_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Module not found")))?;

    Ok(Json(module))
}

/// Update a module.
///
/// PUT /modules/:module_id
pub async fn update_module(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(module_id): Path<Uuid>,
    Json(req): Json<UpdateModuleRequest>,
) -> Result<Json<Module>, AppError> {
    state.authz.require_any(&claims, &["editar"]).await?;

    let module = state
        .db
        .update_module(
            module_id,
            &UpdateModule {
                name: req.name,
                route_path: req.route_path,
                icon: req.icon,
                menu_order: req.menu_order,
                visible: req.visible,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Module not found")))?;

    Ok(Json(module))
}

/// Delete a module with its permissions and their grants, atomically.
///
/// DELETE /modules/:module_id
pub async fn delete_module(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(module_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.authz.require_any(&claims, &["eliminar"]).await?;

    if !state.db.delete_module_cascade(module_id).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("Module not found")));
    }

    Ok(Json(MessageResponse {
        message: "Module deleted".to_string(),
    }))
}

/// List a module's permissions, ordered by name.
///
/// GET /modules/:module_id/permissions
pub async fn list_permissions(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(module_id): Path<Uuid>,
) -> Result<Json<Vec<Permission>>, AppError> {
    state.authz.require_any(&claims, &["ver"]).await?;

    state
        .db
        .find_module_by_id(module_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Module not found")))?;

    Ok(Json(state.db.list_module_permissions(module_id).await?))
}

/// Reconcile the module's permission set to exactly the supplied names.
/// Removed permissions lose their grants; retained ones keep theirs.
///
/// PUT /modules/:module_id/permissions
pub async fn replace_permissions(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(module_id): Path<Uuid>,
    Json(req): Json<PermissionNamesRequest>,
) -> Result<Json<Vec<Permission>>, AppError> {
    state.authz.require_any(&claims, &["editar"]).await?;

    state
        .db
        .find_module_by_id(module_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Module not found")))?;

    let permissions = state
        .db
        .replace_module_permissions(module_id, &req.permissions)
        .await?;

    Ok(Json(permissions))
}

/// Add permission names not already present; never removes.
///
/// POST /modules/:module_id/permissions
pub async fn merge_permissions(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(module_id): Path<Uuid>,
    Json(req): Json<PermissionNamesRequest>,
) -> Result<Json<Vec<Permission>>, AppError> {
    state.authz.require_any(&claims, &["editar"]).await?;

    state
        .db
        .find_module_by_id(module_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Module not found")))?;

    let permissions = state
        .db
        .merge_module_permissions(module_id, &req.permissions)
        .await?;

    Ok(Json(permissions))
}
