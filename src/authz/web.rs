use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::authz::types::{CheckRequest, CheckResponse, Denial, Method, PolicyResponse};
use crate::authz::AuthzState;

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        (
            self.kind.status_code(),
            Json(json!({ "message": self.message })),
        )
            .into_response()
    }
}

/// Decision API for services that ask over HTTP instead of embedding the guard.
pub fn router(state: Arc<AuthzState>) -> Router {
    Router::new()
        .route("/v1/check", post(handle_check))
        .route("/v1/policies/{resource}", get(handle_policy))
        .route("/healthz", get(health))
        .with_state(state)
}

/// Guard every route of `router` with the policy declared for `resource_type`.
///
/// Requests whose method has no policy vocabulary (e.g. `OPTIONS`) pass through.
pub fn protect<S>(router: Router<S>, state: Arc<AuthzState>, resource_type: &str) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let guard = ResourceGuard {
        state,
        resource_type: Arc::from(resource_type),
    };
    router.route_layer(middleware::from_fn_with_state(guard, enforce))
}

#[derive(Clone)]
struct ResourceGuard {
    state: Arc<AuthzState>,
    resource_type: Arc<str>,
}

async fn enforce(State(guard): State<ResourceGuard>, request: Request, next: Next) -> Response {
    let Some(method) = Method::from_http(request.method()) else {
        return next.run(request).await;
    };

    // non-UTF-8 header values are treated as malformed, not missing
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default());
    let decision = guard.state.authorize(&guard.resource_type, method, header);

    match decision.into_result() {
        Ok(()) => {
            tracing::debug!(resource = %guard.resource_type, %method, "Request authorized");
            next.run(request).await
        }
        Err(denial) => {
            tracing::info!(
                resource = %guard.resource_type,
                %method,
                status = denial.kind.status_code().as_u16(),
                reason = %denial.message,
                "Request denied"
            );
            denial.into_response()
        }
    }
}

async fn handle_check(
    State(state): State<Arc<AuthzState>>,
    Json(req): Json<CheckRequest>,
) -> impl IntoResponse {
    let method: Method = match req.method.parse() {
        Ok(method) => method,
        Err(e) => return e.into_response(),
    };
    let decision = state.authorize(&req.resource, method, req.authorization.as_deref());
    tracing::debug!(
        resource = %req.resource,
        %method,
        allowed = decision.is_allowed(),
        "Checked access"
    );
    Json(CheckResponse::from(decision)).into_response()
}

async fn handle_policy(
    State(state): State<Arc<AuthzState>>,
    Path(resource): Path<String>,
) -> impl IntoResponse {
    let methods = state
        .registry
        .policy(&resource)
        .map(|policy| policy.sets().clone())
        .unwrap_or_default();
    Json(PolicyResponse { resource, methods })
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
