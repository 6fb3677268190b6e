//! Incidence handlers, including the composite creation operation.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};

use uuid::Uuid;

use crate::handlers::MessageResponse;
use crate::middleware::AuthUser;
use crate::models::{
    CreateIncidenceBundle, Incidence, IncidenceBundleResult, IncidenceDetail,
    ListIncidencesFilter, UpdateIncidence,
};
use crate::AppState;
use service_core::error::AppError;

fn validate_bundle(bundle: &CreateIncidenceBundle) -> Result<(), AppError> {
    if bundle.person.national_id.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Person national id is required"
        )));
    }
    if bundle.person.full_name.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Person full name is required"
        )));
    }
    if bundle.incidence.title.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Incidence title is required"
        )));
    }
    if bundle.incidence.category.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Incidence category is required"
        )));
    }
    if let Some(institution) = &bundle.institution {
        if institution.code.trim().is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Institution code is required when an institution is attached"
            )));
        }
    }
    for member in &bundle.family_members {
        if member.national_id.trim().is_empty() || member.relationship.trim().is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Family members need a national id and a relationship"
            )));
        }
    }
    Ok(())
}

/// Create an incidence together with its person, institution and family
/// links. Person and institution are resolved by natural key; the whole
/// bundle is applied atomically.
///
/// POST /incidences
pub async fn create_incidence(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(bundle): Json<CreateIncidenceBundle>,
) -> Result<(StatusCode, Json<IncidenceBundleResult>), AppError> {
    let reporter = state.authz.require_any_user(&claims, &["crear"]).await?;

    validate_bundle(&bundle)?;

    let result = state
        .db
        .create_incidence_bundle(&bundle, Some(reporter))
        .await?;

    tracing::info!(
        incidence_id = %result.incidence.incidence_id,
        person_id = %result.person.person_id,
        family_links = result.family_links.len(),
        "Incidence created"
    );

    Ok((StatusCode::CREATED, Json(result)))
}

/// List incidences, optionally filtered by person national id, status or
/// category. Newest first.
///
/// GET /incidences
pub async fn list_incidences(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Query(filter): Query<ListIncidencesFilter>,
) -> Result<Json<Vec<Incidence>>, AppError> {
    state.authz.require_any(&claims, &["ver"]).await?;
    Ok(Json(state.db.list_incidences(&filter).await?))
}

/// Get an incidence with its resolved person and institution.
///
/// GET /incidences/:incidence_id
pub async fn get_incidence(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(incidence_id): Path<Uuid>,
) -> Result<Json<IncidenceDetail>, AppError> {
    state.authz.require_any(&claims, &["ver"]).await?;

    let detail = state
        .db
        .find_incidence_detail(incidence_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Incidence not found")))?;

    Ok(Json(detail))
}

/// Update an incidence's details or status.
///
/// PUT /incidences/:incidence_id
pub async fn update_incidence(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(incidence_id): Path<Uuid>,
    Json(input): Json<UpdateIncidence>,
) -> Result<Json<Incidence>, AppError> {
    state.authz.require_any(&claims, &["editar"]).await?;

    let incidence = state
        .db
        .update_incidence(incidence_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Incidence not found")))?;

    Ok(Json(incidence))
}

/// Delete an incidence.
///
/// DELETE /incidences/:incidence_id
pub async fn delete_incidence(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(incidence_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.authz.require_any(&claims, &["eliminar"]).await?;

    if !state.db.delete_incidence(incidence_id).await? {
        return Err(AppError::NotFound(anyhow::anyhow!("Incidence not found")));
    }

    Ok(Json(MessageResponse {
        message: "Incidence deleted".to_string(),
    }))
}
