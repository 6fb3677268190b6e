//! Permission checks for gated operations.
//!
//! Each protected handler declares the permission names that satisfy it and
//! asks the checker before touching data. The administrator role bypasses
//! the grant lookup entirely; for everyone else a truthy grant on any
//! permission with one of the accepted names is enough. The name lookup is
//! global, not scoped to the module owning the permission.

use service_core::error::AppError;
use uuid::Uuid;

use crate::services::database::Database;
use crate::services::jwt::AccessTokenClaims;

#[derive(Clone)]
pub struct PermissionChecker {
    db: Database,
}

impl PermissionChecker {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Allow the request if the caller's role is the administrator role or
    /// holds a truthy grant for any of `names`. 401 when the role id claim
    /// resolves to no role; 403 when the role exists but no grant matches.
    pub async fn require_any(
        &self,
        claims: &AccessTokenClaims,
        names: &[&str],
    ) -> Result<(), AppError> {
        let role_id = claims.role_id()?;

        let role = self
            .db
            .find_role_by_id(role_id)
            .await?
            .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Role not found")))?;

        if role.is_admin() {
            return Ok(());
        }

        let names: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
        if self.db.role_has_any_granted(role_id, &names).await? {
            return Ok(());
        }

        tracing::debug!(
            role = %role.name,
            required = ?names,
            "Permission check failed"
        );
        Err(AppError::Forbidden(anyhow::anyhow!(
            "Insufficient permissions"
        )))
    }

    /// Convenience for handlers that only need the caller's user id after a
    /// successful check.
    pub async fn require_any_user(
        &self,
        claims: &AccessTokenClaims,
        names: &[&str],
    ) -> Result<Uuid, AppError> {
        self.require_any(claims, names).await?;
        claims.user_id()
    }
}
