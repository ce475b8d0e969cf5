//! Defines the communication channel messages between the web server and the
//! task that owns the login state machine.

use crate::auth::AuthView;
use tokio::sync::oneshot;

/// A user intent (or state query) sent from a web handler to the auth task.
#[derive(Debug)]
pub enum AuthRequest {
    /// Current login state for rendering.
    GetView {
        /// The channel to send the response back on.
        respond_to: oneshot::Sender<AuthView>,
    },
    /// The "log in" button.
    LogIn {
        respond_to: oneshot::Sender<AuthView>,
    },
    /// A verification code typed by the user.
    SubmitCode {
        code: String,
        respond_to: oneshot::Sender<AuthView>,
    },
    /// The "log out" button.
    LogOut {
        respond_to: oneshot::Sender<AuthView>,
    },
}
