use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::JobStatus;
use super::service::{
    DeskError, IssueReport, IssueResolution, MaintenanceRequest, Outcome, StockRequestDraft,
    TechnicianApplicationDraft, TechnicianAssignment,
};
use super::Portal;
use crate::store::{EntityStore, StoreError};
use crate::sync::{PortalKind, ProjectionName, SessionAddress, SessionError, SessionHandle};

#[derive(Debug, Deserialize)]
pub(crate) struct OpenSessionRequest {
    pub(crate) portal: PortalKind,
    pub(crate) key: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionView {
    pub(crate) session: SessionAddress,
    pub(crate) instance: u64,
    pub(crate) display_name: String,
    pub(crate) projections: Vec<ProjectionSummary>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProjectionSummary {
    pub(crate) name: ProjectionName,
    pub(crate) rows: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobStatusUpdate {
    pub(crate) status: JobStatus,
}

/// Routes for opening portal sessions, reading their projections, and running the flows.
pub fn portal_router<S>(portal: Arc<Portal<S>>) -> Router
where
    S: EntityStore + 'static,
{
    Router::new()
        .route("/api/v1/portal/sessions", post(open_session::<S>))
        .route(
            "/api/v1/portal/sessions/:portal/:key",
            delete(close_session::<S>),
        )
        .route(
            "/api/v1/portal/sessions/:portal/:key/messages",
            get(session_messages::<S>),
        )
        .route(
            "/api/v1/portal/sessions/:portal/:key/projections/:projection",
            get(read_projection::<S>),
        )
        .route(
            "/api/v1/portal/sessions/:portal/:key/projections/:projection/refresh",
            post(refresh_projection::<S>),
        )
        .route(
            "/api/v1/portal/customers/:email/maintenance-requests",
            post(submit_maintenance::<S>),
        )
        .route(
            "/api/v1/portal/maintenance-tickets/:ticket_id",
            delete(delete_ticket::<S>),
        )
        .route(
            "/api/v1/portal/maintenance-tickets/:ticket_id/approve",
            post(approve_maintenance::<S>),
        )
        .route(
            "/api/v1/portal/jobs/:job_id/status",
            put(update_job_status::<S>),
        )
        .route(
            "/api/v1/portal/technicians/:email/jobs/:job_id/complete",
            post(complete_job::<S>),
        )
        .route(
            "/api/v1/portal/customers/:email/issues",
            post(report_issue::<S>),
        )
        .route(
            "/api/v1/portal/technicians/:email/issues/:issue_id/assign",
            post(assign_issue::<S>),
        )
        .route(
            "/api/v1/portal/technicians/:email/issues/:issue_id/resolve",
            post(resolve_issue::<S>),
        )
        .route("/api/v1/portal/stock-requests", post(submit_stock_request::<S>))
        .route(
            "/api/v1/portal/technician-applications",
            post(submit_application::<S>),
        )
        .with_state(portal)
}

pub(crate) async fn open_session<S>(
    State(portal): State<Arc<Portal<S>>>,
    Json(request): Json<OpenSessionRequest>,
) -> Response
where
    S: EntityStore + 'static,
{
    let handle = match portal.host().open(request.portal, request.key).await {
        Ok(handle) => handle,
        Err(err) => return session_error_response(err),
    };

    let mut projections = Vec::new();
    for &name in handle.address().portal.projections() {
        match handle.projection(name).await {
            Ok(projection) => projections.push(ProjectionSummary {
                name,
                rows: projection.rows.len(),
            }),
            Err(err) => return session_error_response(err),
        }
    }

    let view = SessionView {
        session: handle.address().clone(),
        instance: handle.instance(),
        display_name: handle.display_name().to_string(),
        projections,
    };
    (StatusCode::CREATED, Json(view)).into_response()
}

pub(crate) async fn read_projection<S>(
    State(portal): State<Arc<Portal<S>>>,
    Path((kind, key, projection)): Path<(PortalKind, String, ProjectionName)>,
) -> Response
where
    S: EntityStore + 'static,
{
    let handle = match registered(&portal, kind, key) {
        Ok(handle) => handle,
        Err(response) => return response,
    };
    match handle.projection(projection).await {
        Ok(projection) => (StatusCode::OK, Json(projection)).into_response(),
        Err(err) => session_error_response(err),
    }
}

pub(crate) async fn refresh_projection<S>(
    State(portal): State<Arc<Portal<S>>>,
    Path((kind, key, projection)): Path<(PortalKind, String, ProjectionName)>,
) -> Response
where
    S: EntityStore + 'static,
{
    let handle = match registered(&portal, kind, key) {
        Ok(handle) => handle,
        Err(response) => return response,
    };
    match handle.refresh(projection).await {
        Ok(rows) => (
            StatusCode::OK,
            Json(json!({ "projection": projection, "rows": rows })),
        )
            .into_response(),
        Err(err) => session_error_response(err),
    }
}

pub(crate) async fn close_session<S>(
    State(portal): State<Arc<Portal<S>>>,
    Path((kind, key)): Path<(PortalKind, String)>,
) -> Response
where
    S: EntityStore + 'static,
{
    match registered(&portal, kind, key) {
        Ok(handle) => {
            handle.close().await;
            StatusCode::NO_CONTENT.into_response()
        }
        Err(response) => response,
    }
}

pub(crate) async fn session_messages<S>(
    State(portal): State<Arc<Portal<S>>>,
    Path((kind, key)): Path<(PortalKind, String)>,
) -> Response
where
    S: EntityStore + 'static,
{
    let address = SessionAddress::new(kind, key);
    let messages = portal.messages().announcements_for(&address);
    (StatusCode::OK, Json(messages)).into_response()
}

pub(crate) async fn submit_maintenance<S>(
    State(portal): State<Arc<Portal<S>>>,
    Path(email): Path<String>,
    Json(request): Json<MaintenanceRequest>,
) -> Response
where
    S: EntityStore + 'static,
{
    created(portal.desk().submit_maintenance_request(&email, request))
}

pub(crate) async fn approve_maintenance<S>(
    State(portal): State<Arc<Portal<S>>>,
    Path(ticket_id): Path<String>,
    Json(assignment): Json<TechnicianAssignment>,
) -> Response
where
    S: EntityStore + 'static,
{
    created(portal.desk().approve_maintenance(&ticket_id, assignment))
}

pub(crate) async fn delete_ticket<S>(
    State(portal): State<Arc<Portal<S>>>,
    Path(ticket_id): Path<String>,
) -> Response
where
    S: EntityStore + 'static,
{
    ok(portal.desk().delete_maintenance_ticket(&ticket_id))
}

pub(crate) async fn update_job_status<S>(
    State(portal): State<Arc<Portal<S>>>,
    Path(job_id): Path<String>,
    Json(update): Json<JobStatusUpdate>,
) -> Response
where
    S: EntityStore + 'static,
{
    ok(portal.desk().update_job_status(&job_id, update.status))
}

pub(crate) async fn complete_job<S>(
    State(portal): State<Arc<Portal<S>>>,
    Path((email, job_id)): Path<(String, String)>,
) -> Response
where
    S: EntityStore + 'static,
{
    ok(portal.desk().complete_job(&email, &job_id))
}

pub(crate) async fn report_issue<S>(
    State(portal): State<Arc<Portal<S>>>,
    Path(email): Path<String>,
    Json(report): Json<IssueReport>,
) -> Response
where
    S: EntityStore + 'static,
{
    created(portal.desk().report_issue(&email, report))
}

pub(crate) async fn assign_issue<S>(
    State(portal): State<Arc<Portal<S>>>,
    Path((email, issue_id)): Path<(String, String)>,
) -> Response
where
    S: EntityStore + 'static,
{
    ok(portal.desk().assign_issue(&email, &issue_id))
}

pub(crate) async fn resolve_issue<S>(
    State(portal): State<Arc<Portal<S>>>,
    Path((email, issue_id)): Path<(String, String)>,
    Json(resolution): Json<IssueResolution>,
) -> Response
where
    S: EntityStore + 'static,
{
    ok(portal.desk().resolve_issue(&email, &issue_id, resolution))
}

pub(crate) async fn submit_stock_request<S>(
    State(portal): State<Arc<Portal<S>>>,
    Json(draft): Json<StockRequestDraft>,
) -> Response
where
    S: EntityStore + 'static,
{
    created(portal.desk().submit_stock_request(draft))
}

pub(crate) async fn submit_application<S>(
    State(portal): State<Arc<Portal<S>>>,
    Json(draft): Json<TechnicianApplicationDraft>,
) -> Response
where
    S: EntityStore + 'static,
{
    created(portal.desk().submit_technician_application(draft))
}

fn registered<S>(
    portal: &Portal<S>,
    kind: PortalKind,
    key: String,
) -> Result<SessionHandle, Response>
where
    S: EntityStore + 'static,
{
    let address = SessionAddress::new(kind, key);
    portal.host().registry().lookup(&address).ok_or_else(|| {
        let payload = json!({
            "error": format!("no open session for {address}"),
        });
        (StatusCode::NOT_FOUND, Json(payload)).into_response()
    })
}

fn created<T: Serialize>(result: Result<Outcome<T>, DeskError>) -> Response {
    respond(StatusCode::CREATED, result)
}

fn ok<T: Serialize>(result: Result<Outcome<T>, DeskError>) -> Response {
    respond(StatusCode::OK, result)
}

fn respond<T: Serialize>(status: StatusCode, result: Result<Outcome<T>, DeskError>) -> Response {
    match result {
        Ok(outcome) => (status, Json(outcome)).into_response(),
        Err(err) => {
            let status = desk_error_status(&err);
            let payload = json!({ "error": err.to_string() });
            (status, Json(payload)).into_response()
        }
    }
}

fn desk_error_status(err: &DeskError) -> StatusCode {
    match err {
        DeskError::Store(err) => store_error_status(err),
        DeskError::UnknownAccount { .. } => StatusCode::NOT_FOUND,
        DeskError::NotAssigned { .. } => StatusCode::FORBIDDEN,
        DeskError::InvalidTechnician(_)
        | DeskError::MissingResolution
        | DeskError::MissingField(_)
        | DeskError::InvalidQuantity => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn store_error_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::Conflict { .. } => StatusCode::CONFLICT,
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Malformed { .. } | StoreError::InvalidValue { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn session_error_response(err: SessionError) -> Response {
    let status = match &err {
        SessionError::Store(err) => store_error_status(err),
        SessionError::UnknownProjection { .. } | SessionError::UnknownAccount { .. } => {
            StatusCode::NOT_FOUND
        }
        SessionError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        SessionError::Closed(_) => StatusCode::GONE,
        SessionError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}
