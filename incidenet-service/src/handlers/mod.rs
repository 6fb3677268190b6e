pub mod auth;
pub mod import;
pub mod incidences;
pub mod modules;
pub mod payments;
pub mod plans;
pub mod roles;
pub mod subscriptions;
pub mod users;

use serde::Serialize;

/// Generic message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
