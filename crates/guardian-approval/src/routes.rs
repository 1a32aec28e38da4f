// routes.rs — HTTP surface of the approval server.
//
// Every state-changing route embeds the session nonce in its path; a wrong
// nonce is rejected before any state is touched (404 for page fetches,
// 401 for posts). Responses are JSON except the approval page itself.
// A timeout layer bounds every request so a stalled client cannot hold
// the server open past its window.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::timeout::TimeoutLayer;

use guardian_registry::HelloResponse;

use crate::page;
use crate::server::{ApproveResult, DenyResult, ServerState};

/// Upper bound on any single request, slow headers and bodies included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the router for one approval session.
pub(crate) fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/hello", get(hello))
        .route("/", get(root))
        .route("/approve/{nonce}", get(approval_page))
        .route("/approve/{nonce}/confirm", post(confirm))
        .route("/approve/{nonce}/deny", post(deny))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

/// `GET /hello` — identity probe for sibling discovery.
async fn hello(State(state): State<Arc<ServerState>>) -> Json<HelloResponse> {
    Json(HelloResponse {
        name: crate::server::SERVER_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        started_at: state.started_at,
    })
}

/// `GET /` — convenience redirect to the nonce-bearing approval page.
async fn root(State(state): State<Arc<ServerState>>) -> Redirect {
    Redirect::temporary(&format!("/approve/{}", state.nonce))
}

/// `GET /approve/{nonce}` — the approval page.
async fn approval_page(
    State(state): State<Arc<ServerState>>,
    Path(nonce): Path<String>,
) -> Response {
    if nonce != state.nonce {
        return StatusCode::NOT_FOUND.into_response();
    }
    let template = state.template.get_or_init(page::select_template);
    Html(page::render(template, &state.session, &state.nonce)).into_response()
}

/// `POST /approve/{nonce}/confirm` — approve the pending operation.
async fn confirm(State(state): State<Arc<ServerState>>, Path(nonce): Path<String>) -> Response {
    if nonce != state.nonce {
        tracing::warn!("confirm with invalid nonce rejected");
        return invalid_nonce();
    }

    match state.approve() {
        ApproveResult::Approved(grant) => Json(serde_json::json!({
            "status": "approved",
            "scope": state.session.scope,
            "operation": state.session.operation,
            "grant_id": grant.id,
            "expires_at": grant.expires_at,
        }))
        .into_response(),
        ApproveResult::AlreadySettled(status) => already_settled(status),
        ApproveResult::Failed => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "status": "error",
                "error": "approval could not be recorded",
            })),
        )
            .into_response(),
    }
}

/// `POST /approve/{nonce}/deny` — deny the pending operation.
async fn deny(State(state): State<Arc<ServerState>>, Path(nonce): Path<String>) -> Response {
    if nonce != state.nonce {
        tracing::warn!("deny with invalid nonce rejected");
        return invalid_nonce();
    }

    match state.deny() {
        DenyResult::Denied => Json(serde_json::json!({
            "status": "denied",
            "scope": state.session.scope,
            "operation": state.session.operation,
        }))
        .into_response(),
        DenyResult::AlreadySettled(status) => already_settled(status),
    }
}

fn invalid_nonce() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "invalid nonce" })),
    )
        .into_response()
}

/// A second decision after settlement is a no-op; report what already won.
fn already_settled(status: &str) -> Response {
    Json(serde_json::json!({ "status": status })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use guardian_audit::NullSink;
    use guardian_config::{ApprovalMethod, Branding, BrowserApproval, GrantSettings, ResolvedPolicy};
    use guardian_grants::{GrantStore, OperationContext};
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    use crate::session::ApprovalSession;

    const NONCE: &str = "aaaabbbbccccddddaaaabbbbccccdddd";

    fn test_router(home: &std::path::Path) -> Router {
        let policy = ResolvedPolicy {
            scope: "git".to_string(),
            operation: "push".to_string(),
            method: ApprovalMethod::Browser,
            expires: Duration::from_secs(900),
            require_reason: false,
            risk: "high".to_string(),
            conditions: BTreeMap::new(),
        };
        let session = ApprovalSession::new(
            policy,
            OperationContext::new("main", "origin", "alice"),
            None,
            &BrowserApproval::default(),
            &Branding::default(),
        );
        let (outcome_tx, _) =
            tokio::sync::watch::channel::<Option<crate::server::Outcome>>(None);
        let (shutdown_tx, _) = tokio::sync::watch::channel(false);
        let state = Arc::new(ServerState::for_tests(
            session,
            NONCE.to_string(),
            GrantStore::new(home).unwrap(),
            GrantSettings::default(),
            Arc::new(NullSink),
            outcome_tx,
            shutdown_tx,
        ));
        router(state)
    }

    async fn status_of(router: Router, method: &str, uri: &str) -> StatusCode {
        let response = router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn hello_answers() {
        let home = tempfile::tempdir().unwrap();
        let app = test_router(home.path());
        assert_eq!(status_of(app, "GET", "/hello").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn root_redirects_with_307() {
        let home = tempfile::tempdir().unwrap();
        let app = test_router(home.path());
        assert_eq!(
            status_of(app, "GET", "/").await,
            StatusCode::TEMPORARY_REDIRECT
        );
    }

    #[tokio::test]
    async fn page_with_right_nonce_renders() {
        let home = tempfile::tempdir().unwrap();
        let app = test_router(home.path());
        let uri = format!("/approve/{}", NONCE);
        assert_eq!(status_of(app, "GET", &uri).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn page_with_wrong_nonce_is_404() {
        let home = tempfile::tempdir().unwrap();
        let app = test_router(home.path());
        assert_eq!(
            status_of(app, "GET", "/approve/wrongnonce").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn post_with_wrong_nonce_is_401() {
        let home = tempfile::tempdir().unwrap();
        let app = test_router(home.path());
        assert_eq!(
            status_of(app, "POST", "/approve/wrongnonce/confirm").await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn wrong_method_is_405() {
        let home = tempfile::tempdir().unwrap();
        let app = test_router(home.path());
        let uri = format!("/approve/{}/confirm", NONCE);
        assert_eq!(
            status_of(app, "GET", &uri).await,
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[tokio::test]
    async fn confirm_mints_a_grant() {
        let home = tempfile::tempdir().unwrap();
        let app = test_router(home.path());
        let uri = format!("/approve/{}/confirm", NONCE);
        assert_eq!(status_of(app, "POST", &uri).await, StatusCode::OK);

        let grants = GrantStore::new(home.path()).unwrap();
        assert_eq!(grants.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_decision_reports_the_first() {
        let home = tempfile::tempdir().unwrap();
        let app = test_router(home.path());
        let deny_uri = format!("/approve/{}/deny", NONCE);
        let confirm_uri = format!("/approve/{}/confirm", NONCE);

        assert_eq!(status_of(app.clone(), "POST", &deny_uri).await, StatusCode::OK);
        // The confirm after a deny is a no-op and must not mint anything.
        assert_eq!(status_of(app, "POST", &confirm_uri).await, StatusCode::OK);

        let grants = GrantStore::new(home.path()).unwrap();
        assert!(grants.list().unwrap().is_empty());
    }
}
