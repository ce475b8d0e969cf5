//! Login state machine scenarios against the in-memory cloud account

use printmirror::auth::{CloudAuthStateMachine, CloudState, Credentials, TokenStore};
use printmirror::cloud::{CloudClient, CloudError, Device, InMemoryCloudClient};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tempfile::{TempDir, tempdir};

fn credentials() -> Credentials {
    Credentials {
        region: "EU".to_string(),
        email: "a@b.com".to_string(),
        password: "pw".to_string(),
    }
}

fn workshop_printer() -> Device {
    Device {
        name: "Workshop printer".to_string(),
        serial: "01S00A000000000".to_string(),
        online: true,
    }
}

fn machine_with(cloud: &Arc<InMemoryCloudClient>, dir: &TempDir) -> CloudAuthStateMachine {
    let tokens = TokenStore::new(dir.path().join("authtoken"));
    CloudAuthStateMachine::new(cloud.clone() as Arc<dyn CloudClient>, credentials(), tokens)
}

#[tokio::test]
async fn device_list_marks_logged_in() {
    let cloud = Arc::new(InMemoryCloudClient::new());
    cloud.accept_token("tok");
    cloud.present_token("tok");
    cloud.set_devices(vec![workshop_printer()]);
    let dir = tempdir().unwrap();
    let mut machine = machine_with(&cloud, &dir);
    let connected = machine.connected_flag();

    assert_eq!(machine.state(), CloudState::Unknown);
    machine.refresh().await;
    assert_eq!(machine.state(), CloudState::LoggedIn);
    assert!(connected.load(Ordering::SeqCst));
}

#[tokio::test]
async fn empty_device_list_is_logged_out() {
    let cloud = Arc::new(InMemoryCloudClient::new());
    cloud.accept_token("tok");
    cloud.present_token("tok");
    let dir = tempdir().unwrap();
    let mut machine = machine_with(&cloud, &dir);

    machine.refresh().await;
    assert_eq!(machine.state(), CloudState::LoggedOut);
}

#[tokio::test]
async fn initial_transient_failure_is_logged_out() {
    let cloud = Arc::new(InMemoryCloudClient::new());
    cloud.fail_next_list(CloudError::Network("timeout".to_string()));
    let dir = tempdir().unwrap();
    let mut machine = machine_with(&cloud, &dir);

    machine.refresh().await;
    assert_eq!(machine.state(), CloudState::LoggedOut);
}

#[tokio::test]
async fn verification_flow_persists_token() {
    let cloud = Arc::new(InMemoryCloudClient::new());
    cloud.set_login(Err(CloudError::VerificationRequired));
    cloud.set_verify(Ok("tok-123".to_string()));
    cloud.set_devices(vec![workshop_printer()]);
    let dir = tempdir().unwrap();
    let mut machine = machine_with(&cloud, &dir);
    let connected = machine.connected_flag();

    machine.refresh().await;
    assert_eq!(machine.state(), CloudState::LoggedOut);

    machine.log_in().await;
    assert_eq!(machine.state(), CloudState::CodeSent);
    assert_eq!(cloud.codes_requested(), 1);
    assert!(!connected.load(Ordering::SeqCst));

    machine.submit_code("123456").await;
    assert_eq!(machine.state(), CloudState::LoggedIn);
    assert!(connected.load(Ordering::SeqCst));
    let stored = std::fs::read_to_string(dir.path().join("authtoken")).unwrap();
    assert_eq!(stored, "tok-123");
}

#[tokio::test]
async fn incorrect_code_keeps_code_sent_and_token_untouched() {
    let cloud = Arc::new(InMemoryCloudClient::new());
    cloud.set_login(Err(CloudError::VerificationRequired));
    cloud.set_verify(Err(CloudError::CodeIncorrect));
    let dir = tempdir().unwrap();
    let token_path = dir.path().join("authtoken");
    std::fs::write(&token_path, "previous-token").unwrap();
    let mut machine = machine_with(&cloud, &dir);

    machine.refresh().await;
    machine.log_in().await;
    assert_eq!(cloud.codes_requested(), 1);

    machine.submit_code("000000").await;
    assert_eq!(machine.state(), CloudState::CodeSent);
    // No new code for a wrong guess, and the old token file is untouched.
    assert_eq!(cloud.codes_requested(), 1);
    assert_eq!(std::fs::read_to_string(&token_path).unwrap(), "previous-token");
}

#[tokio::test]
async fn expired_code_requests_a_new_one() {
    let cloud = Arc::new(InMemoryCloudClient::new());
    cloud.set_login(Err(CloudError::VerificationRequired));
    cloud.set_verify(Err(CloudError::CodeExpired));
    let dir = tempdir().unwrap();
    let mut machine = machine_with(&cloud, &dir);

    machine.refresh().await;
    machine.log_in().await;
    assert_eq!(cloud.codes_requested(), 1);

    machine.submit_code("123456").await;
    assert_eq!(machine.state(), CloudState::CodeSent);
    assert_eq!(cloud.codes_requested(), 2);
}

#[tokio::test]
async fn cloudflare_blocks_until_the_user_retries() {
    let cloud = Arc::new(InMemoryCloudClient::new());
    cloud.set_login(Err(CloudError::CloudflareBlocked));
    let dir = tempdir().unwrap();
    let mut machine = machine_with(&cloud, &dir);

    machine.refresh().await;
    machine.log_in().await;
    assert_eq!(machine.state(), CloudState::Blocked);

    // The periodic refresh must not clear a block on its own.
    machine.refresh().await;
    assert_eq!(machine.state(), CloudState::Blocked);

    // A retry from BLOCKED goes through the normal login row.
    cloud.set_login(Err(CloudError::VerificationRequired));
    machine.log_in().await;
    assert_eq!(machine.state(), CloudState::CodeSent);
}

#[tokio::test]
async fn transient_refresh_failure_keeps_the_session() {
    let cloud = Arc::new(InMemoryCloudClient::new());
    cloud.accept_token("tok");
    cloud.present_token("tok");
    cloud.set_devices(vec![workshop_printer()]);
    let dir = tempdir().unwrap();
    let mut machine = machine_with(&cloud, &dir);

    machine.refresh().await;
    assert_eq!(machine.state(), CloudState::LoggedIn);

    cloud.fail_next_list(CloudError::Network("dns failure".to_string()));
    machine.refresh().await;
    assert_eq!(machine.state(), CloudState::LoggedIn);

    // An explicit rejection does log the session out.
    cloud.fail_next_list(CloudError::Unauthenticated);
    machine.refresh().await;
    assert_eq!(machine.state(), CloudState::LoggedOut);
}

#[tokio::test]
async fn refresh_does_not_stomp_code_entry() {
    let cloud = Arc::new(InMemoryCloudClient::new());
    cloud.set_login(Err(CloudError::VerificationRequired));
    let dir = tempdir().unwrap();
    let mut machine = machine_with(&cloud, &dir);

    machine.refresh().await;
    machine.log_in().await;
    assert_eq!(machine.state(), CloudState::CodeSent);

    machine.refresh().await;
    assert_eq!(machine.state(), CloudState::CodeSent);
}

#[tokio::test]
async fn logout_is_local_only() {
    let cloud = Arc::new(InMemoryCloudClient::new());
    cloud.accept_token("tok");
    cloud.present_token("tok");
    cloud.set_devices(vec![workshop_printer()]);
    let dir = tempdir().unwrap();
    let mut machine = machine_with(&cloud, &dir);
    let connected = machine.connected_flag();

    machine.refresh().await;
    assert_eq!(machine.state(), CloudState::LoggedIn);

    machine.log_out();
    assert_eq!(machine.state(), CloudState::LoggedOut);
    assert!(!connected.load(Ordering::SeqCst));
}

#[tokio::test]
async fn persisted_token_reopens_the_session_on_restart() {
    // First run: verification-code login persists a token.
    let cloud = Arc::new(InMemoryCloudClient::new());
    cloud.set_login(Err(CloudError::VerificationRequired));
    cloud.set_verify(Ok("tok-123".to_string()));
    cloud.set_devices(vec![workshop_printer()]);
    let dir = tempdir().unwrap();
    let mut machine = machine_with(&cloud, &dir);
    machine.refresh().await;
    machine.log_in().await;
    machine.submit_code("123456").await;
    assert_eq!(machine.state(), CloudState::LoggedIn);

    // Fresh startup: the stored token is handed to a new client before any
    // user interaction.
    let tokens = TokenStore::new(dir.path().join("authtoken"));
    let restarted = Arc::new(InMemoryCloudClient::new());
    restarted.accept_token("tok-123");
    restarted.set_devices(vec![workshop_printer()]);
    if let Some(token) = tokens.load() {
        restarted.present_token(token);
    }
    let mut machine =
        CloudAuthStateMachine::new(restarted.clone() as Arc<dyn CloudClient>, credentials(), tokens);
    machine.refresh().await;
    assert_eq!(machine.state(), CloudState::LoggedIn);
}
