//! Module, Permission and AccessGrant models.
//!
//! A module is a feature area owning a set of named permissions; access
//! grants map (role, permission) pairs to a boolean.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Module entity (feature area with its own permission set).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Module {
    pub module_id: Uuid,
    pub name: String,
    pub route_path: String,
    pub icon: Option<String>,
    pub menu_order: i32,
    pub visible: bool,
    pub created_utc: DateTime<Utc>,
}

/// Permission entity, scoped to exactly one module. Names are stored
/// lowercase.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub permission_id: Uuid,
    pub module_id: Uuid,
    pub name: String,
    pub created_utc: DateTime<Utc>,
}

/// Access grant: (role, permission) -> granted flag. At most one row per
/// pair; writes are upserts keyed on the pair.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccessGrant {
    pub role_id: Uuid,
    pub permission_id: Uuid,
    pub granted: bool,
}

/// Input for creating a module.
#[derive(Debug, Clone)]
pub struct CreateModule {
    pub name: String,
    pub route_path: String,
    pub icon: Option<String>,
    pub menu_order: i32,
    pub visible: bool,
}

/// Input for updating a module.
#[derive(Debug, Clone, Default)]
pub struct UpdateModule {
    pub name: Option<String>,
    pub route_path: Option<String>,
    pub icon: Option<String>,
    pub menu_order: Option<i32>,
    pub visible: Option<bool>,
}

/// Normalize a desired permission-name list: lowercase, trim, drop empties,
/// dedupe preserving first occurrence.
pub fn normalize_permission_names(names: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let normalized = name.trim().to_lowercase();
        if normalized.is_empty() {
            continue;
        }
        if !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    out
}

/// Difference between a module's existing permission names and the desired
/// set: names to delete (present, not desired) and names to create (desired,
/// not present). Both sides are expected pre-normalized.
pub fn permission_set_diff(existing: &[String], desired: &[String]) -> (Vec<String>, Vec<String>) {
    let to_delete = existing
        .iter()
        .filter(|name| !desired.contains(name))
        .cloned()
        .collect();
    let to_create = desired
        .iter()
        .filter(|name| !existing.contains(name))
        .cloned()
        .collect();
    (to_delete, to_create)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalize_lowercases_and_dedupes() {
        let input = names(&["Ver", "CREAR", " ver ", "", "  ", "editar"]);
        assert_eq!(
            normalize_permission_names(&input),
            names(&["ver", "crear", "editar"])
        );
    }

    #[test]
    fn diff_splits_deletions_and_creations() {
        let existing = names(&["ver", "crear", "eliminar"]);
        let desired = names(&["ver", "editar"]);
        let (to_delete, to_create) = permission_set_diff(&existing, &desired);
        assert_eq!(to_delete, names(&["crear", "eliminar"]));
        assert_eq!(to_create, names(&["editar"]));
    }

    #[test]
    fn diff_of_identical_sets_is_empty() {
        let set = names(&["ver", "crear"]);
        let (to_delete, to_create) = permission_set_diff(&set, &set);
        assert!(to_delete.is_empty());
        assert!(to_create.is_empty());
    }

    #[test]
    fn diff_against_empty_desired_deletes_everything() {
        let existing = names(&["ver"]);
        let (to_delete, to_create) = permission_set_diff(&existing, &[]);
        assert_eq!(to_delete, names(&["ver"]));
        assert!(to_create.is_empty());
    }
}
