// src/job/tracker.rs - Print job lifecycle detection from polled snapshots
use chrono::{DateTime, Utc};

use crate::telemetry::DeviceSnapshot;

/// Lifecycle edge detected by a single `observe` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    Started,
    Ended,
}

/// The job currently on the bed, as far as the tracker can tell.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedJob {
    pub subtask_name: String,
    /// When the job began: the device-reported time when available, otherwise
    /// the moment the tracker first saw the job.
    pub start_time: DateTime<Utc>,
    /// Device-reported start time. The first snapshots of a job often omit
    /// it; backfilled once it shows up.
    pub first_start_time: Option<DateTime<Utc>>,
}

/// Turns the stream of polled snapshots into start/end events. Replaying an
/// unchanged snapshot emits nothing, so the poll cadence does not matter.
#[derive(Debug, Default)]
pub struct PrintJobTracker {
    current: Option<TrackedJob>,
}

impl PrintJobTracker {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn current(&self) -> Option<&TrackedJob> {
        self.current.as_ref()
    }

    /// Feed one polled snapshot. No I/O happens here; the caller reacts to the
    /// returned event.
    pub fn observe(&mut self, snapshot: &DeviceSnapshot) -> Option<JobEvent> {
        let descriptor = if snapshot.gcode_state.is_terminal() {
            None
        } else {
            snapshot.job.as_ref()
        };

        match (self.current.is_some(), descriptor) {
            (false, Some(job)) => {
                tracing::info!("Print job started: {}", job.subtask_name);
                self.current = Some(TrackedJob {
                    subtask_name: job.subtask_name.clone(),
                    start_time: job.start_time.unwrap_or_else(Utc::now),
                    first_start_time: job.start_time,
                });
                Some(JobEvent::Started)
            }
            (true, None) => {
                tracing::info!("Print job ended");
                self.current = None;
                Some(JobEvent::Ended)
            }
            (true, Some(job)) => {
                if let Some(tracked) = self.current.as_mut() {
                    if tracked.first_start_time.is_none() {
                        if let Some(reported) = job.start_time {
                            // The device reports the true start time a few
                            // snapshots late.
                            tracing::debug!("Got updated start time");
                            tracked.first_start_time = Some(reported);
                            tracked.start_time = reported;
                        }
                    }
                }
                None
            }
            (false, None) => None,
        }
    }
}
