//! Plan, subscription and payment models.
//!
//! Payments record manually verified claims only; there is no gateway
//! integration.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Subscription plan.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub plan_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: String,
    pub billing_interval: String,
    pub max_users: Option<i32>,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

/// Subscription of a user to a plan.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
    pub created_utc: DateTime<Utc>,
}

/// Payment claim against a subscription.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub subscription_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub reference: Option<String>,
    pub method: Option<String>,
    pub status: String,
    pub paid_on: Option<NaiveDate>,
    pub verified_by: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

/// Verification outcome of a payment claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Verified,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Verified => "verified",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

/// Input for creating a plan.
#[derive(Debug, Clone)]
pub struct CreatePlan {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: String,
    pub billing_interval: String,
    pub max_users: Option<i32>,
}

/// Input for updating a plan.
#[derive(Debug, Clone, Default)]
pub struct UpdatePlan {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub active: Option<bool>,
}

/// Input for creating a subscription.
#[derive(Debug, Clone)]
pub struct CreateSubscription {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub starts_on: NaiveDate,
}

/// Input for recording a payment claim.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub subscription_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub reference: Option<String>,
    pub method: Option<String>,
    pub paid_on: Option<NaiveDate>,
}
