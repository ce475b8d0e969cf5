// src/job/cover.rs - One-shot background fetch of a job's cover image
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::cloud::{CloudClient, CloudError};

#[derive(Debug, Error)]
pub enum CoverError {
    #[error("cloud error: {0}")]
    Cloud(#[from] CloudError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the cover for the current job stands. The image path only exists in
/// `Ready`, so a reader can never see a path for a fetch that has not
/// finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CoverState {
    #[default]
    NotRequested,
    Downloading,
    Ready(PathBuf),
    /// The download failed; the job keeps going without a cover.
    Failed,
}

#[derive(Debug, Default)]
struct CoverSlot {
    generation: u64,
    state: CoverState,
}

/// Shared cover slot: the poll loop resets it per job, the fetch task reports
/// into it, the display reads it. A generation stamp ties every in-flight
/// fetch to the job it was spawned for, so a fetch that outlives its job is
/// discarded instead of tagging the next one.
#[derive(Clone, Default)]
pub struct CoverHandle {
    slot: Arc<Mutex<CoverSlot>>,
}

impl CoverHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CoverState {
        self.slot.lock().unwrap().state.clone()
    }

    /// Reset for a new job; returns the generation the job's fetch must carry.
    pub fn begin_job(&self) -> u64 {
        let mut slot = self.slot.lock().unwrap();
        slot.generation += 1;
        slot.state = CoverState::NotRequested;
        slot.generation
    }

    /// The job is gone. Bumping the generation strands whatever is still in
    /// flight.
    pub fn end_job(&self) {
        let mut slot = self.slot.lock().unwrap();
        slot.generation += 1;
        slot.state = CoverState::NotRequested;
    }

    /// Claim the fetch for `generation`. Succeeds at most once per job.
    fn claim(&self, generation: u64) -> bool {
        let mut slot = self.slot.lock().unwrap();
        if slot.generation == generation && slot.state == CoverState::NotRequested {
            slot.state = CoverState::Downloading;
            true
        } else {
            false
        }
    }

    fn finish(&self, generation: u64, result: Result<PathBuf, CoverError>) {
        let mut slot = self.slot.lock().unwrap();
        if slot.generation != generation {
            tracing::debug!("Discarding cover result for an ended job");
            return;
        }
        slot.state = match result {
            Ok(path) => CoverState::Ready(path),
            Err(_) => CoverState::Failed,
        };
    }
}

/// Downloads the cover for a freshly started job on a detached worker task.
pub struct CoverFetcher {
    client: Arc<dyn CloudClient>,
    serial: String,
    cover_dir: PathBuf,
    handle: CoverHandle,
}

impl CoverFetcher {
    pub fn new(
        client: Arc<dyn CloudClient>,
        serial: impl Into<String>,
        cover_dir: impl Into<PathBuf>,
        handle: CoverHandle,
    ) -> Self {
        Self {
            client,
            serial: serial.into(),
            cover_dir: cover_dir.into(),
            handle,
        }
    }

    /// Kick off the fetch for the job stamped with `generation`. The slot is
    /// claimed before the task is spawned, so a second trigger for the same
    /// job is a no-op. The task is never joined; it publishes its result
    /// through the handle, and a failure leaves the slot `Failed` for the rest
    /// of the job.
    pub fn trigger(&self, generation: u64) {
        if !self.handle.claim(generation) {
            return;
        }
        tracing::info!("Downloading cover from the cloud");
        let client = self.client.clone();
        let serial = self.serial.clone();
        let cover_dir = self.cover_dir.clone();
        let handle = self.handle.clone();
        tokio::spawn(async move {
            let result = fetch_cover(client.as_ref(), &serial, &cover_dir).await;
            if let Err(e) = &result {
                tracing::error!("Cover download failed: {}", e);
            }
            handle.finish(generation, result);
        });
    }
}

async fn fetch_cover(
    client: &dyn CloudClient,
    serial: &str,
    cover_dir: &Path,
) -> Result<PathBuf, CoverError> {
    let job = client.latest_job(serial).await?;
    let bytes = client.download(&job.cover_url).await?;
    let path = cover_dir.join(format!("cover-{}.png", uuid::Uuid::new_v4()));
    tokio::fs::write(&path, &bytes).await?;
    tracing::info!("Cover downloaded to {}", path.display());
    Ok(path)
}
