//! Person, Institution and FamilyLink models.
//!
//! Persons and institutions are identified by natural keys (national id /
//! registration code) and written as upserts so repeated submissions never
//! duplicate rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Person entity, keyed by national identity number.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Person {
    pub person_id: Uuid,
    pub national_id: String,
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Institution entity, keyed by registration code.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Institution {
    pub institution_id: Uuid,
    pub code: String,
    pub name: String,
    pub kind: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Link between a family member and the affected person. One row per pair;
/// re-linking updates the relationship label in place.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FamilyLink {
    pub family_member_id: Uuid,
    pub person_id: Uuid,
    pub relationship: String,
}

/// Upsert input for a person.
#[derive(Debug, Clone, Deserialize)]
pub struct PersonInput {
    pub national_id: String,
    pub full_name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

/// Upsert input for an institution.
#[derive(Debug, Clone, Deserialize)]
pub struct InstitutionInput {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
}

/// A family member to resolve and link to the affected person.
#[derive(Debug, Clone, Deserialize)]
pub struct FamilyMemberInput {
    pub national_id: String,
    pub full_name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    pub relationship: String,
}
