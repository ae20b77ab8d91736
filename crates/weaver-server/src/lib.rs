pub mod engine;
pub mod error;
pub mod routes;
pub mod state;

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use weaver_core::store::Store;
use weaver_core::validate::Ruleset;

use state::AppState;
use weaver_controller::RetryPolicy;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Events (SSE)
        .route("/api/events", get(routes::events::events))
        // Status
        .route("/api/status/health", get(routes::status::health))
        .route("/api/status/stats", get(routes::status::stats))
        .route("/api/status/templates", get(routes::status::list_templates))
        .route(
            "/api/status/templates/{id}",
            get(routes::status::get_template),
        )
        .route("/api/status/logs/recent", get(routes::status::recent_logs))
        // Provisioning
        .route(
            "/api/provisioning/jobs",
            post(routes::provisioning::create_job).get(routes::provisioning::list_jobs),
        )
        .route(
            "/api/provisioning/jobs/{id}",
            get(routes::provisioning::get_job).delete(routes::provisioning::delete_job),
        )
        .route(
            "/api/provisioning/jobs/{id}/logs",
            get(routes::provisioning::job_logs),
        )
        .route(
            "/api/provisioning/jobs/{id}/cancel",
            post(routes::provisioning::cancel_job),
        )
        .route(
            "/api/provisioning/validate-config",
            post(routes::provisioning::validate_config),
        )
        .layer(cors)
        .with_state(app_state)
}

/// Everything `serve` needs beyond the listening port.
pub struct ServeOptions {
    pub db_path: PathBuf,
    pub ruleset: Ruleset,
}

/// Open the store, recover jobs interrupted by a previous shutdown, and run
/// the HTTP server until the process exits.
pub async fn serve(port: u16, opts: ServeOptions) -> anyhow::Result<()> {
    let store = Arc::new(Store::open(&opts.db_path)?);

    let recovered = engine::recover_interrupted(&store)?;
    if recovered > 0 {
        tracing::warn!(recovered, "marked interrupted jobs as failed");
    }

    let app_state = AppState::new(
        store,
        opts.ruleset,
        engine::apic_factory(),
        RetryPolicy::default(),
    );
    let app = build_router(app_state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("weaver server listening on http://localhost:{port}");

    axum::serve(listener, app).await?;
    Ok(())
}
