//! Application startup and lifecycle management.

use service_core::error::AppError;
use tokio::net::TcpListener;

use crate::config::ServiceConfig;
use crate::services::{Database, JwtService, PermissionChecker};
use crate::{build_router, AppState};

/// Application container for managing the server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration, running pending
    /// migrations first.
    pub async fn build(config: ServiceConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build without running migrations; for tests where the harness has
    /// already applied them.
    pub async fn build_without_migrations(config: ServiceConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(config: ServiceConfig, run_migrations: bool) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;

        if run_migrations {
            db.run_migrations().await?;
        }

        let jwt = JwtService::new(&config.jwt);
        let authz = PermissionChecker::new(db.clone());

        let state = AppState {
            config: config.clone(),
            db,
            jwt,
            authz,
        };

        let listener = TcpListener::bind(("0.0.0.0", config.common.port)).await?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Application built");

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Actual bound port; useful when built with port 0.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until the process is stopped.
    pub async fn run_until_stopped(self) -> Result<(), AppError> {
        let app = build_router(self.state);
        axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .await?;
        Ok(())
    }
}
