//! Defines the Axum API routes and handlers.

use crate::status::StatusSnapshot;
use crate::web::auth_channel::AuthRequest;
use crate::web::models::{AuthStateResponse, VerificationCodeRequest};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Html,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::sync::mpsc::Sender;

pub struct AppStateInner {
    pub auth_tx: Sender<AuthRequest>,
    pub status: Arc<RwLock<StatusSnapshot>>,
}
pub type AppState = Arc<AppStateInner>;

/// Creates the Axum router with the login page and the API endpoints.
pub fn create_router(auth_tx: Sender<AuthRequest>, status: Arc<RwLock<StatusSnapshot>>) -> Router {
    create_router_with_state(Arc::new(AppStateInner { auth_tx, status }))
}

/// For tests: create a router around pre-built state.
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/", get(login_page))
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/auth/state", get(auth_state))
        .route("/api/v1/auth/login", post(auth_login))
        .route("/api/v1/auth/code", post(auth_code))
        .route("/api/v1/auth/logout", post(auth_logout))
        .with_state(state)
}

/// The page the wall QR code points at.
async fn login_page() -> Html<&'static str> {
    Html(include_str!("login.html"))
}

/// Handler for the display's read path: the latest status snapshot.
async fn get_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.status.read().await.clone())
}

/// Handler to get the current login state.
async fn auth_state(
    State(state): State<AppState>,
) -> Result<Json<AuthStateResponse>, StatusCode> {
    let (resp_tx, resp_rx) = tokio::sync::oneshot::channel();
    if state.auth_tx.send(AuthRequest::GetView { respond_to: resp_tx }).await.is_err() {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    match resp_rx.await {
        Ok(view) => Ok(Json(view.into())),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Handler for the "log in" button.
async fn auth_login(
    State(state): State<AppState>,
) -> Result<Json<AuthStateResponse>, StatusCode> {
    let (resp_tx, resp_rx) = tokio::sync::oneshot::channel();
    if state.auth_tx.send(AuthRequest::LogIn { respond_to: resp_tx }).await.is_err() {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    match resp_rx.await {
        Ok(view) => Ok(Json(view.into())),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Handler for a submitted verification code.
async fn auth_code(
    State(state): State<AppState>,
    Json(payload): Json<VerificationCodeRequest>,
) -> Result<Json<AuthStateResponse>, StatusCode> {
    let (resp_tx, resp_rx) = tokio::sync::oneshot::channel();
    if state
        .auth_tx
        .send(AuthRequest::SubmitCode {
            code: payload.code,
            respond_to: resp_tx,
        })
        .await
        .is_err()
    {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    match resp_rx.await {
        Ok(view) => Ok(Json(view.into())),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Handler for the "log out" button.
async fn auth_logout(
    State(state): State<AppState>,
) -> Result<Json<AuthStateResponse>, StatusCode> {
    let (resp_tx, resp_rx) = tokio::sync::oneshot::channel();
    if state.auth_tx.send(AuthRequest::LogOut { respond_to: resp_tx }).await.is_err() {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    match resp_rx.await {
        Ok(view) => Ok(Json(view.into())),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
