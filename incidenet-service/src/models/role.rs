//! Role model.
//!
//! One role per user; the role named "administrador" (case-insensitive)
//! bypasses all permission checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Name of the role that is granted everything unconditionally.
pub const ADMIN_ROLE_NAME: &str = "administrador";

/// Role entity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub role_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Role {
    pub fn new(name: String, description: Option<String>) -> Self {
        Self {
            role_id: Uuid::new_v4(),
            name,
            description,
            created_utc: Utc::now(),
        }
    }

    /// Whether this role is the unconditional-access administrator role.
    pub fn is_admin(&self) -> bool {
        self.name.eq_ignore_ascii_case(ADMIN_ROLE_NAME)
    }
}

/// Input for creating a role.
#[derive(Debug, Clone)]
pub struct CreateRole {
    pub name: String,
    pub description: Option<String>,
}

/// Input for updating a role.
#[derive(Debug, Clone, Default)]
pub struct UpdateRole {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_role_matches_case_insensitively() {
        assert!(Role::new("Administrador".to_string(), None).is_admin());
        assert!(Role::new("ADMINISTRADOR".to_string(), None).is_admin());
        assert!(!Role::new("Usuario".to_string(), None).is_admin());
    }
}
