//! Plan handlers.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::{CreatePlan, Plan, UpdatePlan};
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_interval")]
    pub billing_interval: String,
    pub max_users: Option<i32>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_interval() -> String {
    "monthly".to_string()
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdatePlanRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListPlansQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Create a plan.
///
/// POST /plans
pub async fn create_plan(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<CreatePlanRequest>,
) -> Result<(StatusCode, Json<Plan>), AppError> {
    state.authz.require_any(&claims, &["crear"]).await?;

    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("Plan name is required")));
    }
    if req.price < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Plan price must not be negative"
        )));
    }

    let plan = state
        .db
        .insert_plan(&CreatePlan {
            name: req.name,
            description: req.description,
            price: req.price,
            currency: req.currency,
            billing_interval: req.billing_interval,
            max_users: req.max_users,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(plan)))
}

/// List plans, active only unless `include_inactive` is set.
///
/// GET /plans
pub async fn list_plans(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Query(query): Query<ListPlansQuery>,
) -> Result<Json<Vec<Plan>>, AppError> {
    state.authz.require_any(&claims, &["ver"]).await?;
    Ok(Json(state.db.list_plans(query.include_inactive).await?))
}

/// Get a plan by ID.
///
/// GET /plans/:plan_id
pub async fn get_plan(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<Plan>, AppError> {
    state.authz.require_any(&claims, &["ver"]).await?;

    let plan = state
        .db
        .find_plan_by_id(plan_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Plan not found")))?;

    Ok(Json(plan))
}

/// Update a plan; deactivation happens through the `active` flag.
///
/// PUT /plans/:plan_id
pub async fn update_plan(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(plan_id): Path<Uuid>,
    Json(req): Json<UpdatePlanRequest>,
) -> Result<Json<Plan>, AppError> {
    state.authz.require_any(&claims, &["editar"]).await?;

    let plan = state
        .db
        .update_plan(
            plan_id,
            &UpdatePlan {
                name: req.name,
                description: req.description,
                price: req.price,
                active: req.active,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Plan not found")))?;

    Ok(Json(plan))
}
