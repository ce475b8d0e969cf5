// src/auth/mod.rs - Cloud login state machine, owned by a single task
pub mod token_store;
pub use token_store::TokenStore;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, MissedTickBehavior};

use crate::cloud::{CloudClient, CloudError};
use crate::web::auth_channel::AuthRequest;

/// Cloud account login state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudState {
    Unknown,
    LoggedOut,
    CodeSent,
    LoggingIn,
    LoggedIn,
    Blocked,
}

impl fmt::Display for CloudState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Labels as the login page shows them.
        match self {
            CloudState::Unknown => write!(f, "Unknown state"),
            CloudState::LoggedOut => write!(f, "Logged out"),
            CloudState::CodeSent => write!(f, "Enter authentication code"),
            CloudState::LoggingIn => write!(f, "Logging in"),
            CloudState::LoggedIn => write!(f, "Logged in"),
            CloudState::Blocked => write!(f, "Blocked by Cloudflare"),
        }
    }
}

/// Cloud account credentials from the config file.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub region: String,
    pub email: String,
    pub password: String,
}

/// What the login UI needs to render: the state, its label, and a message
/// from the last transition when there is something to say.
#[derive(Debug, Clone, Serialize)]
pub struct AuthView {
    pub state: CloudState,
    pub label: String,
    pub message: Option<String>,
}

/// Login state machine. All transitions run on the one task that owns the
/// machine (see [`run`]), so user actions and the periodic refresh can never
/// interleave half-done.
pub struct CloudAuthStateMachine {
    state: CloudState,
    message: Option<String>,
    credentials: Credentials,
    client: Arc<dyn CloudClient>,
    tokens: TokenStore,
    connected: Arc<AtomicBool>,
}

impl CloudAuthStateMachine {
    pub fn new(client: Arc<dyn CloudClient>, credentials: Credentials, tokens: TokenStore) -> Self {
        Self {
            state: CloudState::Unknown,
            message: None,
            credentials,
            client,
            tokens,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag the display reads. True exactly while logged in; stored in
    /// the same step as every state change so no reader sees a stale pair.
    pub fn connected_flag(&self) -> Arc<AtomicBool> {
        self.connected.clone()
    }

    pub fn state(&self) -> CloudState {
        self.state
    }

    pub fn view(&self) -> AuthView {
        AuthView {
            state: self.state,
            label: self.state.to_string(),
            message: self.message.clone(),
        }
    }

    fn set_state(&mut self, next: CloudState) {
        tracing::debug!("Changing cloud state from {:?} -> {:?}", self.state, next);
        self.state = next;
        self.connected.store(next == CloudState::LoggedIn, Ordering::SeqCst);
    }

    /// Account check via the device list, run at startup and then
    /// periodically. Skipped while a code entry or login is in progress so it
    /// cannot stomp the user's flow.
    pub async fn refresh(&mut self) {
        match self.state {
            CloudState::CodeSent | CloudState::LoggingIn | CloudState::Blocked => return,
            CloudState::Unknown | CloudState::LoggedOut | CloudState::LoggedIn => {}
        }
        tracing::info!("Updating cloud status");
        match self.client.list_devices().await {
            Ok(devices) if !devices.is_empty() => {
                if let Some(first) = devices.first() {
                    tracing::info!(
                        "Connected to the cloud, found {} ({})",
                        first.name,
                        if first.online { "online" } else { "offline" }
                    );
                }
                self.message = None;
                self.set_state(CloudState::LoggedIn);
            }
            Ok(_) | Err(CloudError::Unauthenticated) => {
                tracing::error!("Not authenticated with the cloud API");
                self.set_state(CloudState::LoggedOut);
            }
            Err(e) => {
                // Transient failure. Keep the session and let the next
                // scheduled check decide; only the very first check has no
                // state to keep.
                tracing::warn!("Cloud status check failed: {}", e);
                if self.state == CloudState::Unknown {
                    self.set_state(CloudState::LoggedOut);
                }
            }
        }
    }

    /// User pressed "log in".
    pub async fn log_in(&mut self) {
        match self.state {
            CloudState::LoggedOut | CloudState::Blocked => {}
            other => {
                tracing::debug!("Ignoring login request in state {:?}", other);
                return;
            }
        }
        tracing::info!("Login requested");
        let Credentials { region, email, password } = self.credentials.clone();
        match self.client.login(&region, &email, &password).await {
            Ok(()) => {
                self.message = None;
                self.set_state(CloudState::LoggedIn);
            }
            Err(CloudError::CloudflareBlocked) => {
                tracing::error!("Blocked by Cloudflare");
                self.message = Some("Login blocked by Cloudflare".to_string());
                self.set_state(CloudState::Blocked);
            }
            Err(CloudError::VerificationRequired) => {
                tracing::info!("Requesting email verification code");
                self.request_code().await;
                self.set_state(CloudState::CodeSent);
            }
            Err(e) => {
                tracing::error!("Login failed: {}", e);
                self.message = Some(format!("Login failed: {}", e));
                self.set_state(CloudState::LoggedOut);
            }
        }
    }

    /// User submitted an emailed verification code.
    pub async fn submit_code(&mut self, code: &str) {
        if self.state != CloudState::CodeSent {
            tracing::debug!("Ignoring verification code in state {:?}", self.state);
            return;
        }
        self.set_state(CloudState::LoggingIn);
        tracing::info!("Verifying emailed code");
        match self.client.verify_code(code).await {
            Ok(token) => {
                if let Err(e) = self.tokens.store(&token) {
                    tracing::warn!("Failed to persist session token: {}", e);
                }
                self.message = None;
                self.set_state(CloudState::LoggedIn);
            }
            Err(CloudError::CodeExpired) => {
                tracing::info!("Code expired, requesting a new one");
                self.request_code().await;
                self.message = Some("Code expired, a new one was sent".to_string());
                self.set_state(CloudState::CodeSent);
            }
            Err(CloudError::CodeIncorrect) => {
                self.message = Some("Incorrect code, try again".to_string());
                self.set_state(CloudState::CodeSent);
            }
            Err(CloudError::CodeInvalid) => {
                tracing::warn!("Code rejected as malformed, requesting a new one");
                self.request_code().await;
                self.message = Some("Failed to verify code, requested a new one".to_string());
                self.set_state(CloudState::CodeSent);
            }
            Err(e) => {
                tracing::error!("Verification failed: {}", e);
                self.message = Some(format!("Verification failed: {}", e));
                self.set_state(CloudState::CodeSent);
            }
        }
    }

    /// User pressed "log out". Clears the local flag only; the cloud session
    /// itself is left alone.
    pub fn log_out(&mut self) {
        tracing::info!("Logout requested");
        self.message = None;
        self.set_state(CloudState::LoggedOut);
    }

    async fn request_code(&self) {
        if let Err(e) = self.client.request_verification_code().await {
            tracing::error!("Failed to request a verification code: {}", e);
        }
    }
}

/// Serve user intents and the periodic account refresh from one task. Runs
/// the initial account check first, then loops until every request sender is
/// dropped.
pub async fn run(
    mut machine: CloudAuthStateMachine,
    mut rx: mpsc::Receiver<AuthRequest>,
    refresh_interval: Duration,
) {
    machine.refresh().await;
    let mut interval =
        tokio::time::interval_at(Instant::now() + refresh_interval, refresh_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            request = rx.recv() => {
                match request {
                    Some(request) => handle(&mut machine, request).await,
                    None => {
                        tracing::info!("Auth task shutting down");
                        break;
                    }
                }
            }
            _ = interval.tick() => {
                machine.refresh().await;
            }
        }
    }
}

async fn handle(machine: &mut CloudAuthStateMachine, request: AuthRequest) {
    match request {
        AuthRequest::GetView { respond_to } => {
            let _ = respond_to.send(machine.view());
        }
        AuthRequest::LogIn { respond_to } => {
            machine.log_in().await;
            let _ = respond_to.send(machine.view());
        }
        AuthRequest::SubmitCode { code, respond_to } => {
            machine.submit_code(&code).await;
            let _ = respond_to.send(machine.view());
        }
        AuthRequest::LogOut { respond_to } => {
            machine.log_out();
            let _ = respond_to.send(machine.view());
        }
    }
}
