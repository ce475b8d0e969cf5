//! Contains the data models for API requests and responses.

use serde::{Deserialize, Serialize};

use crate::auth::{AuthView, CloudState};

/// Login-flow state as rendered by the login page.
#[derive(Debug, Serialize)]
pub struct AuthStateResponse {
    pub state: CloudState,
    pub label: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<AuthView> for AuthStateResponse {
    fn from(view: AuthView) -> Self {
        Self {
            connected: view.state == CloudState::LoggedIn,
            state: view.state,
            label: view.label,
            message: view.message,
        }
    }
}

/// Request to complete login with an emailed verification code.
#[derive(Debug, Deserialize)]
pub struct VerificationCodeRequest {
    pub code: String,
}
