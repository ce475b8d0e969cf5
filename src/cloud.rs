// src/cloud.rs - Cloud account collaborator: device list, login, verification codes, job covers
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;
use tokio::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloudError {
    #[error("not authenticated with the cloud account")]
    Unauthenticated,
    #[error("login blocked by Cloudflare")]
    CloudflareBlocked,
    #[error("email verification code required")]
    VerificationRequired,
    #[error("verification code expired")]
    CodeExpired,
    #[error("verification code incorrect")]
    CodeIncorrect,
    #[error("verification code rejected")]
    CodeInvalid,
    #[error("network error: {0}")]
    Network(String),
}

/// A printer bound to the cloud account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub serial: String,
    pub online: bool,
}

/// Most recent cloud-side job record for a printer. Carries the reference the
/// cover image is downloaded by.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    pub title: String,
    pub cover_url: String,
}

/// Vendor cloud operations the mirror depends on. The HTTPS/MQTT plumbing
/// lives behind this trait.
#[async_trait]
pub trait CloudClient: Send + Sync + 'static {
    /// Printers registered to the account. `Unauthenticated` when no valid
    /// session exists.
    async fn list_devices(&self) -> Result<Vec<Device>, CloudError>;

    /// Password login. `VerificationRequired` means the account wants an
    /// emailed code before a session is issued.
    async fn login(&self, region: &str, email: &str, password: &str) -> Result<(), CloudError>;

    /// Ask the cloud to email a fresh verification code.
    async fn request_verification_code(&self) -> Result<(), CloudError>;

    /// Complete a verification-code login. Returns the issued session token.
    async fn verify_code(&self, code: &str) -> Result<String, CloudError>;

    /// Latest job record for the printer with the given serial.
    async fn latest_job(&self, serial: &str) -> Result<JobDescriptor, CloudError>;

    /// Fetch the raw bytes behind a cover reference.
    async fn download(&self, cover_url: &str) -> Result<Vec<u8>, CloudError>;
}

/// In-memory cloud account for tests and the demo harness. A session opens
/// when a presented token matches the accepted one or when a scripted login
/// succeeds; everything else is returned as scripted.
pub struct InMemoryCloudClient {
    accepted_token: Mutex<Option<String>>,
    presented_token: Mutex<Option<String>>,
    session_open: AtomicBool,
    devices: Mutex<Vec<Device>>,
    login_result: Mutex<Result<(), CloudError>>,
    verify_result: Mutex<Result<String, CloudError>>,
    latest_job: Mutex<Result<JobDescriptor, CloudError>>,
    cover: Mutex<Result<Vec<u8>, CloudError>>,
    next_list_error: Mutex<Option<CloudError>>,
    latency: Mutex<Duration>,
    codes_requested: AtomicUsize,
    downloads: AtomicUsize,
}

impl InMemoryCloudClient {
    /// A logged-out account with no devices.
    pub fn new() -> Self {
        Self {
            accepted_token: Mutex::new(None),
            presented_token: Mutex::new(None),
            session_open: AtomicBool::new(false),
            devices: Mutex::new(Vec::new()),
            login_result: Mutex::new(Ok(())),
            verify_result: Mutex::new(Err(CloudError::CodeIncorrect)),
            latest_job: Mutex::new(Err(CloudError::Network("no job recorded".to_string()))),
            cover: Mutex::new(Err(CloudError::Network("no cover recorded".to_string()))),
            next_list_error: Mutex::new(None),
            latency: Mutex::new(Duration::ZERO),
            codes_requested: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
        }
    }

    /// Token the account recognizes for silent re-authentication.
    pub fn accept_token(&self, token: impl Into<String>) {
        *self.accepted_token.lock().unwrap() = Some(token.into());
    }

    /// Token this client was constructed with, mirroring how the real client
    /// receives a previously stored session token.
    pub fn present_token(&self, token: impl Into<String>) {
        *self.presented_token.lock().unwrap() = Some(token.into());
    }

    pub fn set_devices(&self, devices: Vec<Device>) {
        *self.devices.lock().unwrap() = devices;
    }

    pub fn set_login(&self, result: Result<(), CloudError>) {
        *self.login_result.lock().unwrap() = result;
    }

    pub fn set_verify(&self, result: Result<String, CloudError>) {
        *self.verify_result.lock().unwrap() = result;
    }

    pub fn set_latest_job(&self, result: Result<JobDescriptor, CloudError>) {
        *self.latest_job.lock().unwrap() = result;
    }

    pub fn set_cover(&self, result: Result<Vec<u8>, CloudError>) {
        *self.cover.lock().unwrap() = result;
    }

    /// Fail the next `list_devices` call with the given error, then recover.
    pub fn fail_next_list(&self, error: CloudError) {
        *self.next_list_error.lock().unwrap() = Some(error);
    }

    /// Artificial delay for `download`, to keep a fetch in flight while a test
    /// moves the world on.
    pub fn set_download_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn codes_requested(&self) -> usize {
        self.codes_requested.load(Ordering::SeqCst)
    }

    pub fn downloads_started(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    fn session_valid(&self) -> bool {
        if self.session_open.load(Ordering::SeqCst) {
            return true;
        }
        let accepted = self.accepted_token.lock().unwrap();
        let presented = self.presented_token.lock().unwrap();
        match (accepted.as_deref(), presented.as_deref()) {
            (Some(accepted), Some(presented)) => accepted == presented,
            _ => false,
        }
    }
}

impl Default for InMemoryCloudClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CloudClient for InMemoryCloudClient {
    async fn list_devices(&self) -> Result<Vec<Device>, CloudError> {
        if let Some(error) = self.next_list_error.lock().unwrap().take() {
            return Err(error);
        }
        if !self.session_valid() {
            return Err(CloudError::Unauthenticated);
        }
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn login(&self, _region: &str, _email: &str, _password: &str) -> Result<(), CloudError> {
        let result = self.login_result.lock().unwrap().clone();
        if result.is_ok() {
            self.session_open.store(true, Ordering::SeqCst);
        }
        result
    }

    async fn request_verification_code(&self) -> Result<(), CloudError> {
        self.codes_requested.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn verify_code(&self, _code: &str) -> Result<String, CloudError> {
        let result = self.verify_result.lock().unwrap().clone();
        if result.is_ok() {
            self.session_open.store(true, Ordering::SeqCst);
        }
        result
    }

    async fn latest_job(&self, _serial: &str) -> Result<JobDescriptor, CloudError> {
        self.latest_job.lock().unwrap().clone()
    }

    async fn download(&self, _cover_url: &str) -> Result<Vec<u8>, CloudError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if latency > Duration::ZERO {
            tokio::time::sleep(latency).await;
        }
        self.cover.lock().unwrap().clone()
    }
}
