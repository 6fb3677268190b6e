//! Subscription handlers.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::{CreateSubscription, Subscription};
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub starts_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelSubscriptionRequest {
    pub ends_on: Option<NaiveDate>,
}

/// Subscribe a user to a plan.
///
/// POST /subscriptions
pub async fn create_subscription(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<Subscription>), AppError> {
    state.authz.require_any(&claims, &["crear"]).await?;

    state
        .db
        .find_user_by_id(req.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

    let plan = state
        .db
        .find_plan_by_id(req.plan_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Plan not found")))?;

    if !plan.active {
        return Err(AppError::BadRequest(anyhow::anyhow!("Plan is inactive")));
    }

    let subscription = state
        .db
        .insert_subscription(&CreateSubscription {
            user_id: req.user_id,
            plan_id: req.plan_id,
            starts_on: req.starts_on.unwrap_or_else(|| Utc::now().date_naive()),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(subscription)))
}

/// Get a subscription by ID.
///
/// GET /subscriptions/:subscription_id
pub async fn get_subscription(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(subscription_id): Path<Uuid>,
) -> Result<Json<Subscription>, AppError> {
    state.authz.require_any(&claims, &["ver"]).await?;

    let subscription = state
        .db
        .find_subscription_by_id(subscription_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Subscription not found")))?;

    Ok(Json(subscription))
}

/// List a user's subscriptions.
///
/// GET /users/:user_id/subscriptions
pub async fn list_user_subscriptions(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<Subscription>>, AppError> {
    state.authz.require_any(&claims, &["ver"]).await?;
    Ok(Json(state.db.list_user_subscriptions(user_id).await?))
}

/// Cancel a subscription.
///
/// POST /subscriptions/:subscription_id/cancel
pub async fn cancel_subscription(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(subscription_id): Path<Uuid>,
    Json(req): Json<CancelSubscriptionRequest>,
) -> Result<Json<Subscription>, AppError> {
    state.authz.require_any(&claims, &["editar"]).await?;

    let ends_on = req.ends_on.unwrap_or_else(|| Utc::now().date_naive());
    let subscription = state
        .db
        .cancel_subscription(subscription_id, ends_on)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Subscription not found")))?;

    Ok(Json(subscription))
}
