use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use energy_portal::store::InMemoryEntityStore;
use energy_portal::sync::SessionAddress;
use energy_portal::workflows::{portal_router, Portal};
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub(crate) type ServedPortal = Portal<InMemoryEntityStore>;

#[derive(Debug, Serialize)]
pub(crate) struct RegisteredSession {
    pub(crate) session: SessionAddress,
    pub(crate) instance: u64,
    pub(crate) display_name: String,
    pub(crate) closed: bool,
}

/// Portal endpoints plus the operational ones. Expects `AppState` as an extension layer.
pub(crate) fn with_portal_routes(portal: Arc<ServedPortal>) -> Router {
    portal_router(Arc::clone(&portal))
        .route("/api/v1/portal/registry", get(registry_endpoint))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .layer(Extension(portal))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn registry_endpoint(
    Extension(portal): Extension<Arc<ServedPortal>>,
) -> Json<Vec<RegisteredSession>> {
    let sessions = portal
        .host()
        .registry()
        .sessions()
        .into_iter()
        .map(|handle| RegisteredSession {
            session: handle.address().clone(),
            instance: handle.instance(),
            display_name: handle.display_name().to_string(),
            closed: handle.is_closed(),
        })
        .collect();
    Json(sessions)
}
