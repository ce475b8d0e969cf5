// src/main.rs - Wires telemetry, the auth task, the poll loop and the web UI together
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;

use printmirror::auth::{self, CloudAuthStateMachine, Credentials, TokenStore};
use printmirror::cloud::{CloudClient, CloudError, Device, InMemoryCloudClient};
use printmirror::config::{self, Config};
use printmirror::job::cover::{CoverFetcher, CoverHandle};
use printmirror::monitor::Monitor;
use printmirror::telemetry::{
    DeviceSnapshot, GcodeState, JobSnapshot, ReplayTelemetry, TelemetrySource, Temperatures,
};
use printmirror::web;

#[derive(Parser)]
#[command(name = "printmirror", about = "Shared-screen status mirror for a Bambu Lab printer")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "printmirror.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting printmirror");

    let args = Args::parse();
    tracing::info!("Loading configuration from: {}", args.config);
    let config = config::load_config(&args.config).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", args.config, e);
        tracing::error!("Please ensure the configuration file exists and is properly formatted");
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;

    tracing::info!(
        "Printer: {} ({}) at {}",
        config.printer.serial,
        config.printer.device_type,
        config.printer.host
    );
    tracing::info!("Cloud region: {}", config.cloud.region);

    let tokens = TokenStore::new(&config.cloud.auth_token_file);
    let stored_token = tokens.load();
    if stored_token.is_some() {
        tracing::debug!("Read auth token from {}", tokens.path().display());
    }

    // Collaborator wiring. The MQTT and HTTPS transports live behind the
    // TelemetrySource/CloudClient traits; the binary currently runs against
    // the in-memory stand-ins with a scripted account and print.
    let cloud = Arc::new(demo_cloud(&config, stored_token));
    let telemetry: Arc<dyn TelemetrySource> = Arc::new(demo_telemetry());
    telemetry.connect().await?;

    let machine = CloudAuthStateMachine::new(
        cloud.clone() as Arc<dyn CloudClient>,
        Credentials {
            region: config.cloud.region.clone(),
            email: config.cloud.email.clone(),
            password: config.cloud.password.clone(),
        },
        tokens,
    );
    let connected = machine.connected_flag();

    // Single owner for all login-state transitions.
    let (auth_tx, auth_rx) = mpsc::channel(16);
    tokio::spawn(auth::run(
        machine,
        auth_rx,
        Duration::from_secs(config.cloud.refresh_secs),
    ));

    let cover_handle = CoverHandle::new();
    let fetcher = CoverFetcher::new(
        cloud as Arc<dyn CloudClient>,
        &config.printer.serial,
        &config.cloud.cover_dir,
        cover_handle.clone(),
    );
    let monitor = Monitor::new(telemetry, fetcher, cover_handle, connected);
    let status = monitor.status_handle();
    monitor.spawn(Duration::from_millis(config.printer.poll_interval_ms));

    let app = web::api::create_router(auth_tx, status);
    let addr = format!("{}:{}", config.web.bind, config.web.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Login UI listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Demo account backing the login flow until the real cloud client lands:
/// the password login asks for a verification code and any submitted code is
/// accepted. A token persisted by a previous run re-opens the session
/// silently.
fn demo_cloud(config: &Config, stored_token: Option<String>) -> InMemoryCloudClient {
    let cloud = InMemoryCloudClient::new();
    cloud.accept_token("printmirror-demo-session");
    cloud.set_devices(vec![Device {
        name: "Workshop printer".to_string(),
        serial: config.printer.serial.clone(),
        online: true,
    }]);
    cloud.set_login(Err(CloudError::VerificationRequired));
    cloud.set_verify(Ok("printmirror-demo-session".to_string()));
    if let Some(token) = stored_token {
        cloud.present_token(token);
    }
    cloud
}

/// A short scripted print so the mirror has something to show.
fn demo_telemetry() -> ReplayTelemetry {
    let job = JobSnapshot {
        print_type: "cloud".to_string(),
        start_time: None,
        subtask_name: "benchy_boat".to_string(),
        current_layer: 42,
        total_layers: 187,
        progress_percent: 22,
        remaining_minutes: 96,
    };
    let temperatures = Temperatures {
        nozzle: Some(219.4),
        nozzle_target: Some(220.0),
        bed: Some(55.0),
        bed_target: Some(55.0),
    };
    ReplayTelemetry::new(vec![
        DeviceSnapshot::default(),
        DeviceSnapshot {
            gcode_state: GcodeState::Running,
            job: Some(job.clone()),
            temperatures,
            ..Default::default()
        },
        DeviceSnapshot {
            gcode_state: GcodeState::Running,
            job: Some(JobSnapshot {
                start_time: Some(chrono::Utc::now()),
                ..job
            }),
            temperatures,
            ..Default::default()
        },
    ])
}
