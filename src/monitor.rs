// src/monitor.rs - Poll loop: snapshot -> tracker -> cover trigger -> published status
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::{Duration, MissedTickBehavior};

use crate::job::cover::{CoverFetcher, CoverHandle};
use crate::job::tracker::{JobEvent, PrintJobTracker};
use crate::status::{AmsView, JobStatus, StatusSnapshot};
use crate::telemetry::TelemetrySource;

/// Owns the telemetry handle and runs the per-tick pipeline. Everything the
/// rest of the process needs out of it crosses through the published status
/// snapshot or the cover handle; nothing here blocks on the network.
pub struct Monitor {
    telemetry: Arc<dyn TelemetrySource>,
    tracker: PrintJobTracker,
    cover: CoverFetcher,
    cover_handle: CoverHandle,
    connected: Arc<AtomicBool>,
    status: Arc<RwLock<StatusSnapshot>>,
}

impl Monitor {
    pub fn new(
        telemetry: Arc<dyn TelemetrySource>,
        cover: CoverFetcher,
        cover_handle: CoverHandle,
        connected: Arc<AtomicBool>,
    ) -> Self {
        Self {
            telemetry,
            tracker: PrintJobTracker::new(),
            cover,
            cover_handle,
            connected,
            status: Arc::new(RwLock::new(StatusSnapshot::default())),
        }
    }

    /// Handle the display and the web API read each render tick.
    pub fn status_handle(&self) -> Arc<RwLock<StatusSnapshot>> {
        self.status.clone()
    }

    /// One poll tick. Public so tests can drive the pipeline without the
    /// timer.
    pub async fn tick(&mut self) {
        let snapshot = self.telemetry.snapshot();

        match self.tracker.observe(&snapshot) {
            Some(JobEvent::Started) => {
                let generation = self.cover_handle.begin_job();
                self.cover.trigger(generation);
            }
            Some(JobEvent::Ended) => self.cover_handle.end_job(),
            None => {}
        }

        if snapshot.hms_error_count > 0 {
            tracing::error!("HMS reports {} error(s)", snapshot.hms_error_count);
        }
        if snapshot.print_error {
            tracing::error!("Printer reports an active print error");
        }

        let job = match (self.tracker.current(), snapshot.job.as_ref()) {
            (Some(tracked), Some(job)) => Some(JobStatus::assemble(
                tracked,
                job,
                &self.cover_handle.state(),
                Utc::now(),
            )),
            _ => None,
        };
        let (nozzle, bed) = StatusSnapshot::heaters(&snapshot.temperatures);
        let next = StatusSnapshot {
            connected: self.connected.load(Ordering::SeqCst),
            device_online: self.telemetry.connected(),
            stage: snapshot.gcode_state.to_string(),
            nozzle,
            bed,
            ams: snapshot.ams.as_ref().map(AmsView::from_status),
            job,
        };
        *self.status.write().await = next;
    }

    /// Run the poll loop forever at the given cadence. The task is detached;
    /// shutdown does not wait for it.
    pub fn spawn(mut self, poll_interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                self.tick().await;
            }
        })
    }
}
