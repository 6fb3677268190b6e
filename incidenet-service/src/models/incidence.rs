//! Incidence model and the composite-creation bundle.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::person::{FamilyMemberInput, InstitutionInput, PersonInput};

/// Incidence entity: a reportable event (debt, behavioral issue) tied to a
/// person and optionally an institution.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Incidence {
    pub incidence_id: Uuid,
    pub person_id: Uuid,
    pub institution_id: Option<Uuid>,
    pub reported_by: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub confidentiality: String,
    pub amount: Option<Decimal>,
    pub status: String,
    pub occurred_on: Option<NaiveDate>,
    pub created_utc: DateTime<Utc>,
}

/// Incidence joined with the resolved person and institution names.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct IncidenceDetail {
    pub incidence_id: Uuid,
    pub person_id: Uuid,
    pub person_national_id: String,
    pub person_full_name: String,
    pub institution_id: Option<Uuid>,
    pub institution_name: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub confidentiality: String,
    pub amount: Option<Decimal>,
    pub status: String,
    pub occurred_on: Option<NaiveDate>,
    pub created_utc: DateTime<Utc>,
}

/// Details of the incidence itself within a composite bundle.
#[derive(Debug, Clone, Deserialize)]
pub struct IncidenceInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    #[serde(default = "default_confidentiality")]
    pub confidentiality: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub occurred_on: Option<NaiveDate>,
}

fn default_confidentiality() -> String {
    "publica".to_string()
}

fn default_status() -> String {
    "abierta".to_string()
}

/// Composite creation input: the affected person, an optional institution,
/// the incidence details, and zero or more family links. Materialized in a
/// single transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateIncidenceBundle {
    pub person: PersonInput,
    #[serde(default)]
    pub institution: Option<InstitutionInput>,
    pub incidence: IncidenceInput,
    #[serde(default)]
    pub family_members: Vec<FamilyMemberInput>,
}

/// Result of a composite creation.
#[derive(Debug, Clone, Serialize)]
pub struct IncidenceBundleResult {
    pub incidence: Incidence,
    pub person: super::person::Person,
    pub institution: Option<super::person::Institution>,
    pub family_links: Vec<super::person::FamilyLink>,
}

/// Input for updating an incidence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateIncidence {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub confidentiality: Option<String>,
    pub amount: Option<Decimal>,
    pub status: Option<String>,
    pub occurred_on: Option<NaiveDate>,
}

/// Filter parameters for listing incidences.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListIncidencesFilter {
    pub national_id: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
}
