//! HTTP server setup

use crate::api;
use crate::config::Config;
use crate::middleware::{
    inject_client_ip, rls_layer, rls_middleware, HttpMetricsLayer, RedactingMakeSpan,
    RlsMiddlewareConfig,
};
use crate::permissions::PermissionLevel;
use crate::state::AppState;
use anyhow::Result;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Guard for the flag administration routes. Enforced even with RLS off.
pub fn flag_admin_guard() -> RlsMiddlewareConfig {
    RlsMiddlewareConfig {
        bypass_rls: true,
        ..RlsMiddlewareConfig::default()
    }
    .require_permission("users", PermissionLevel::Admin)
    .rate_limited("flags")
}

/// Build the HTTP router
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let flag_routes = Router::new()
        .route("/api/v1/flags", get(api::flags::get_flags))
        .route("/api/v1/flags/kill-switch", post(api::flags::set_kill_switch))
        .route(
            "/api/v1/flags/overrides",
            post(api::flags::override_flag).delete(api::flags::reset_overrides),
        )
        .route_layer(middleware::from_fn_with_state(
            rls_layer(state.clone(), flag_admin_guard()),
            rls_middleware,
        ));

    let protected_routes = Router::new()
        .route("/api/v1/whoami", get(api::whoami::whoami))
        .route_layer(middleware::from_fn_with_state(
            rls_layer(
                state.clone(),
                RlsMiddlewareConfig::default().rate_limited("whoami"),
            ),
            rls_middleware,
        ));

    Router::new()
        .route("/health", get(api::health::health))
        .route("/metrics", get(api::metrics::metrics_handler))
        .merge(flag_routes)
        .merge(protected_routes)
        .layer(HttpMetricsLayer)
        .layer(TraceLayer::new_for_http().make_span_with(RedactingMakeSpan))
        .layer(cors)
        .layer(middleware::from_fn(inject_client_ip))
        .with_state(state)
}

/// Run the HTTP server until Ctrl-C
pub async fn run(config: Config, metrics_handle: Option<PrometheusHandle>) -> Result<()> {
    let addr = config.http_addr();
    let state = AppState::from_config(config, metrics_handle)?;

    let flags = state.flags.get_config();
    info!(
        environment = flags.environment.as_str(),
        kill_switch = flags.kill_switch_active,
        "Feature flags loaded"
    );
    for issue in state.flags.validate() {
        tracing::warn!(issue = %issue, "Feature flag configuration issue");
    }

    let mut updates = state.flags.subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let generation = *updates.borrow_and_update();
            info!(generation, "Feature flag configuration changed");
        }
    });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server started on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    })
    .await?;

    info!("HTTP server stopped");
    Ok(())
}
