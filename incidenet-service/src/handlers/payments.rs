//! Payment handlers.
//!
//! Payments are manually verified claims; there is no provider integration.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::{CreatePayment, Payment, PaymentStatus};
use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub subscription_id: Uuid,
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub reference: Option<String>,
    pub method: Option<String>,
    pub paid_on: Option<NaiveDate>,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub status: PaymentStatus,
}

/// Record a payment claim against a subscription; starts out pending.
///
/// POST /payments
pub async fn create_payment(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    state.authz.require_any(&claims, &["crear"]).await?;

    state
        .db
        .find_subscription_by_id(req.subscription_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Subscription not found")))?;

    if req.amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Payment amount must be positive"
        )));
    }

    let payment = state
        .db
        .insert_payment(&CreatePayment {
            subscription_id: req.subscription_id,
            amount: req.amount,
            currency: req.currency,
            reference: req.reference,
            method: req.method,
            paid_on: req.paid_on,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(payment)))
}

/// List a subscription's payments.
///
/// GET /subscriptions/:subscription_id/payments
pub async fn list_subscription_payments(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(subscription_id): Path<Uuid>,
) -> Result<Json<Vec<Payment>>, AppError> {
    state.authz.require_any(&claims, &["ver"]).await?;
    Ok(Json(
        state.db.list_subscription_payments(subscription_id).await?,
    ))
}

/// Record the manual verification outcome of a payment claim.
///
/// POST /payments/:payment_id/verify
pub async fn verify_payment(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(payment_id): Path<Uuid>,
    Json(req): Json<VerifyPaymentRequest>,
) -> Result<Json<Payment>, AppError> {
    let verifier = state.authz.require_any_user(&claims, &["editar"]).await?;

    if req.status == PaymentStatus::Pending {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Verification must be 'verified' or 'rejected'"
        )));
    }

    let payment = state
        .db
        .set_payment_status(payment_id, req.status, verifier)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    Ok(Json(payment))
}
