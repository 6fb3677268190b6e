pub mod authz;
pub mod database;
pub mod jwt;

pub use authz::PermissionChecker;
pub use database::Database;
pub use jwt::{AccessTokenClaims, JwtService};
