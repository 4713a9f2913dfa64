//! HTTP listener for the decision API.
use crate::authz::AuthzState;
use crate::settings::Settings;
use axum::Router;
use miette::IntoDiagnostic;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Decision API wrapped in request tracing.
pub fn app(state: Arc<AuthzState>) -> Router {
    crate::authz::web::router(state).layer(TraceLayer::new_for_http())
}

pub async fn serve(settings: Settings, state: Arc<AuthzState>) -> miette::Result<()> {
    let addr: SocketAddr = settings
        .listen_addr()
        .parse()
        .map_err(|e| miette::miette!("bad listen addr: {e}"))?;

    tracing::info!(
        resources = state.registry.len(),
        alg = %state.trusted_key.algorithm(),
        leeway_secs = state.trusted_key.leeway().num_seconds(),
        "Authorization service starting"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;
    tracing::info!(%addr, "Authorization policy API listening");
    axum::serve(listener, app(state)).await.into_diagnostic()?;
    Ok(())
}
