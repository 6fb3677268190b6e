pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use axum::{
    extract::State,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use service_core::middleware::tracing::request_id_middleware;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ServiceConfig;
use crate::services::{Database, JwtService, PermissionChecker};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ServiceConfig,
    pub db: Database,
    pub jwt: JwtService,
    pub authz: PermissionChecker,
}

/// Service health check.
///
/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": state.config.service_name,
                "version": state.config.service_version,
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": state.config.service_name,
                    "error": e.to_string(),
                })),
            )
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Everything behind the auth middleware; handlers run their own
    // permission checks on top.
    let protected = Router::new()
        .route("/users/me", get(handlers::auth::me))
        .route("/users", get(handlers::users::list_users))
        .route("/users/:user_id", put(handlers::users::update_user))
        .route(
            "/users/:user_id/deactivate",
            post(handlers::users::deactivate_user),
        )
        .route(
            "/users/:user_id/subscriptions",
            get(handlers::subscriptions::list_user_subscriptions),
        )
        .route(
            "/roles",
            post(handlers::roles::create_role).get(handlers::roles::list_roles),
        )
        .route(
            "/roles/:role_id",
            get(handlers::roles::get_role)
                .put(handlers::roles::update_role)
                .delete(handlers::roles::delete_role),
        )
        .route(
            "/roles/:role_id/grants",
            put(handlers::roles::upsert_grant).get(handlers::roles::list_grants),
        )
        .route(
            "/modules",
            post(handlers::modules::create_module).get(handlers::modules::list_modules),
        )
        .route(
            "/modules/:module_id",
            get(handlers::modules::get_module)
                .put(handlers::modules::update_module)
                .delete(handlers::modules::delete_module),
        )
        .route(
            "/modules/:module_id/permissions",
            get(handlers::modules::list_permissions)
                .put(handlers::modules::replace_permissions)
                .post(handlers::modules::merge_permissions),
        )
        .route(
            "/incidences",
            post(handlers::incidences::create_incidence)
                .get(handlers::incidences::list_incidences),
        )
        .route("/incidences/import", post(handlers::import::import_incidences))
        .route(
            "/incidences/:incidence_id",
            get(handlers::incidences::get_incidence)
                .put(handlers::incidences::update_incidence)
                .delete(handlers::incidences::delete_incidence),
        )
        .route(
            "/plans",
            post(handlers::plans::create_plan).get(handlers::plans::list_plans),
        )
        .route(
            "/plans/:plan_id",
            get(handlers::plans::get_plan).put(handlers::plans::update_plan),
        )
        .route(
            "/subscriptions",
            post(handlers::subscriptions::create_subscription),
        )
        .route(
            "/subscriptions/:subscription_id",
            get(handlers::subscriptions::get_subscription),
        )
        .route(
            "/subscriptions/:subscription_id/cancel",
            post(handlers::subscriptions::cancel_subscription),
        )
        .route(
            "/subscriptions/:subscription_id/payments",
            get(handlers::payments::list_subscription_payments),
        )
        .route("/payments", post(handlers::payments::create_payment))
        .route(
            "/payments/:payment_id/verify",
            post(handlers::payments::verify_payment),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
                .collect::<Vec<_>>(),
        )
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(cors)
}
