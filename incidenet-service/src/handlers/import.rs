//! Bulk import of incidence rows.
//!
//! Rows arrive as a JSON array with fixed named columns (the upload has
//! already been turned into rows by the client). Each row is validated
//! field-by-field and materialized with the same composite write as the
//! single-incidence endpoint, one transaction per row. Failures are
//! collected per row instead of aborting the batch, and a failing row
//! writes nothing.

use axum::extract::{Json, State};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::middleware::AuthUser;
use crate::models::{
    CreateIncidenceBundle, FamilyMemberInput, IncidenceInput, InstitutionInput, PersonInput,
};
use crate::AppState;
use service_core::error::AppError;

/// One import row. Column names match the ad hoc spreadsheet schema.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ImportRow {
    #[validate(length(min = 1, message = "national_id is required"))]
    pub national_id: String,
    #[validate(length(min = 1, message = "full_name is required"))]
    pub full_name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,

    #[serde(default)]
    pub institution_code: Option<String>,
    #[serde(default)]
    pub institution_name: Option<String>,
    #[serde(default)]
    pub institution_kind: Option<String>,

    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[validate(length(min = 1, message = "category is required"))]
    pub category: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub occurred_on: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub confidentiality: Option<String>,

    #[serde(default)]
    pub family_national_id: Option<String>,
    #[serde(default)]
    pub family_full_name: Option<String>,
    #[serde(default)]
    pub family_relationship: Option<String>,
}

impl ImportRow {
    /// Field-shape validation plus the cross-field rules the derive cannot
    /// express.
    fn check(&self) -> Result<(), String> {
        if let Err(errors) = self.validate() {
            return Err(errors.to_string());
        }

        if self.institution_code.as_deref().is_some_and(|c| !c.trim().is_empty())
            && self
                .institution_name
                .as_deref()
                .map_or(true, |n| n.trim().is_empty())
        {
            return Err("institution_name is required when institution_code is set".to_string());
        }

        let family_given = [
            self.family_national_id.as_deref(),
            self.family_full_name.as_deref(),
            self.family_relationship.as_deref(),
        ];
        let given = family_given
            .iter()
            .filter(|f| f.is_some_and(|v| !v.trim().is_empty()))
            .count();
        if given != 0 && given != 3 {
            return Err(
                "family_national_id, family_full_name and family_relationship must be given together"
                    .to_string(),
            );
        }

        Ok(())
    }

    fn into_bundle(self) -> CreateIncidenceBundle {
        let institution = match (&self.institution_code, &self.institution_name) {
            (Some(code), Some(name)) if !code.trim().is_empty() => Some(InstitutionInput {
                code: code.trim().to_string(),
                name: name.trim().to_string(),
                kind: self.institution_kind.clone(),
            }),
            _ => None,
        };

        let family_members = match (
            &self.family_national_id,
            &self.family_full_name,
            &self.family_relationship,
        ) {
            (Some(id), Some(name), Some(relationship)) if !id.trim().is_empty() => {
                vec![FamilyMemberInput {
                    national_id: id.trim().to_string(),
                    full_name: name.trim().to_string(),
                    birth_date: None,
                    relationship: relationship.trim().to_string(),
                }]
            }
            _ => Vec::new(),
        };

        CreateIncidenceBundle {
            person: PersonInput {
                national_id: self.national_id.trim().to_string(),
                full_name: self.full_name.trim().to_string(),
                birth_date: self.birth_date,
            },
            institution,
            incidence: IncidenceInput {
                title: self.title,
                description: self.description,
                category: self.category,
                confidentiality: self
                    .confidentiality
                    .unwrap_or_else(|| "publica".to_string()),
                amount: self.amount,
                status: self.status.unwrap_or_else(|| "abierta".to_string()),
                occurred_on: self.occurred_on,
            },
            family_members,
        }
    }
}

/// Per-row failure in an import report.
#[derive(Debug, Serialize)]
pub struct ImportRowError {
    /// 1-based row number, matching what the user sees in the sheet.
    pub row: usize,
    pub error: String,
}

/// Outcome of a bulk import.
#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub errors: Vec<ImportRowError>,
}

/// Import a batch of incidence rows.
///
/// POST /incidences/import
pub async fn import_incidences(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(rows): Json<Vec<ImportRow>>,
) -> Result<Json<ImportReport>, AppError> {
    let reporter = state.authz.require_any_user(&claims, &["crear"]).await?;

    let mut created = 0;
    let mut errors = Vec::new();

    for (index, row) in rows.into_iter().enumerate() {
        let row_number = index + 1;

        if let Err(error) = row.check() {
            errors.push(ImportRowError {
                row: row_number,
                error,
            });
            continue;
        }

        let bundle = row.into_bundle();
        match state.db.create_incidence_bundle(&bundle, Some(reporter)).await {
            Ok(_) => created += 1,
            Err(e) => {
                tracing::warn!(row = row_number, error = %e, "Import row failed");
                errors.push(ImportRowError {
                    row: row_number,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(Json(ImportReport { created, errors }))
}
