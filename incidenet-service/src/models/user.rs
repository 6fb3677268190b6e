//! User model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User entity. `password_hash` never leaves the service; responses use
/// [`SanitizedUser`].
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role_id: Uuid,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, password_hash: String, full_name: String, role_id: Uuid) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            email,
            password_hash,
            full_name,
            role_id,
            active: true,
            created_utc: Utc::now(),
        }
    }

    pub fn sanitize(self) -> SanitizedUser {
        SanitizedUser {
            user_id: self.user_id,
            email: self.email,
            full_name: self.full_name,
            role_id: self.role_id,
            active: self.active,
            created_utc: self.created_utc,
        }
    }
}

/// User representation safe to return to clients.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedUser {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role_id: Uuid,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

/// Input for updating a user's profile.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub full_name: Option<String>,
    pub role_id: Option<Uuid>,
}
