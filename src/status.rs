// src/status.rs - The read-only view assembled for the display each tick
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::job::cover::CoverState;
use crate::job::tracker::TrackedJob;
use crate::telemetry::{AmsStatus, HeatTrend, JobSnapshot, Rgba, Temperatures, heat_trend};

/// Everything the screen needs about the running job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub current_layer: u32,
    pub total_layers: u32,
    pub percent: u8,
    pub remaining_seconds: u64,
    pub elapsed_seconds: u64,
    pub cover_path: Option<PathBuf>,
}

impl JobStatus {
    pub fn assemble(
        tracked: &TrackedJob,
        job: &JobSnapshot,
        cover: &CoverState,
        now: DateTime<Utc>,
    ) -> Self {
        let cover_path = match cover {
            CoverState::Ready(path) => Some(path.clone()),
            CoverState::NotRequested | CoverState::Downloading | CoverState::Failed => None,
        };
        Self {
            name: tracked.subtask_name.replace('_', " "),
            current_layer: job.current_layer,
            total_layers: job.total_layers,
            percent: job.progress_percent,
            remaining_seconds: u64::from(job.remaining_minutes) * 60,
            elapsed_seconds: (now - tracked.start_time).num_seconds().max(0) as u64,
            cover_path,
        }
    }
}

/// One heater readout with its display cue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeaterView {
    pub current: Option<f64>,
    pub target: Option<f64>,
    pub trend: HeatTrend,
}

impl HeaterView {
    fn new(current: Option<f64>, target: Option<f64>) -> Self {
        Self { current, target, trend: heat_trend(current, target) }
    }
}

impl Default for HeaterView {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One carousel slot with its color already parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrayView {
    pub name: String,
    pub color: Rgba,
    pub empty: bool,
    pub active: bool,
}

/// Carousel state as presented on the screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmsView {
    /// 1 = dry .. 5 = wet, already flipped to the presentation convention.
    pub humidity: u8,
    pub trays: Vec<TrayView>,
}

impl AmsView {
    pub fn from_status(ams: &AmsStatus) -> Self {
        Self {
            humidity: ams.display_humidity(),
            trays: ams
                .trays
                .iter()
                .enumerate()
                .map(|(index, tray)| TrayView {
                    name: tray.name.clone(),
                    color: Rgba::parse(&tray.color),
                    empty: tray.empty,
                    active: ams.active_tray == Some(index),
                })
                .collect(),
        }
    }
}

/// One coherent view per poll tick; the display never sees half an update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub connected: bool,
    /// Whether the telemetry link to the device itself is up. The screen
    /// shows nothing but the login prompt while this is false.
    pub device_online: bool,
    /// Lifecycle phase label, e.g. "Running".
    pub stage: String,
    pub nozzle: HeaterView,
    pub bed: HeaterView,
    pub ams: Option<AmsView>,
    pub job: Option<JobStatus>,
}

impl StatusSnapshot {
    pub fn heaters(temperatures: &Temperatures) -> (HeaterView, HeaterView) {
        (
            HeaterView::new(temperatures.nozzle, temperatures.nozzle_target),
            HeaterView::new(temperatures.bed, temperatures.bed_target),
        )
    }
}

/// "2h 05m 03s" style rendering for the screen. `skip_seconds` gives the
/// compact variant and `counting_down` swaps the zero case for "soon".
pub fn format_duration(total_seconds: u64, skip_seconds: bool, counting_down: bool) -> String {
    let h = total_seconds / 3600;
    let m = (total_seconds % 3600) / 60;
    let s = total_seconds % 60;
    if h > 0 {
        if skip_seconds {
            format!("{}h {:02}m", h, m)
        } else {
            format!("{}h {:02}m {:02}s", h, m, s)
        }
    } else if m > 0 {
        if skip_seconds {
            format!("{}m", m)
        } else {
            format!("{}m {:02}s", m, s)
        }
    } else if s > 0 {
        if skip_seconds {
            "< 1m".to_string()
        } else {
            format!("{}s", s)
        }
    } else if skip_seconds && counting_down {
        "soon".to_string()
    } else {
        "now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::AmsTray;

    #[test]
    fn test_format_duration_full() {
        assert_eq!(format_duration(3723, false, false), "1h 02m 03s");
        assert_eq!(format_duration(125, false, false), "2m 05s");
        assert_eq!(format_duration(9, false, false), "9s");
        assert_eq!(format_duration(0, false, false), "now");
    }

    #[test]
    fn test_format_duration_compact() {
        assert_eq!(format_duration(3723, true, false), "1h 02m");
        assert_eq!(format_duration(125, true, false), "2m");
        assert_eq!(format_duration(9, true, false), "< 1m");
        assert_eq!(format_duration(0, true, false), "now");
        assert_eq!(format_duration(0, true, true), "soon");
    }

    #[test]
    fn test_job_name_presents_spaces() {
        let tracked = TrackedJob {
            subtask_name: "benchy_boat_v2".to_string(),
            start_time: Utc::now(),
            first_start_time: None,
        };
        let job = JobSnapshot { subtask_name: "benchy_boat_v2".to_string(), ..Default::default() };
        let status = JobStatus::assemble(&tracked, &job, &CoverState::NotRequested, Utc::now());
        assert_eq!(status.name, "benchy boat v2");
        assert_eq!(status.cover_path, None);
    }

    #[test]
    fn test_cover_path_only_when_ready() {
        let tracked = TrackedJob {
            subtask_name: "benchy".to_string(),
            start_time: Utc::now(),
            first_start_time: None,
        };
        let job = JobSnapshot::default();
        let ready = CoverState::Ready(PathBuf::from("/tmp/cover-x.png"));
        let status = JobStatus::assemble(&tracked, &job, &ready, Utc::now());
        assert_eq!(status.cover_path, Some(PathBuf::from("/tmp/cover-x.png")));
        let status = JobStatus::assemble(&tracked, &job, &CoverState::Downloading, Utc::now());
        assert_eq!(status.cover_path, None);
    }

    #[test]
    fn test_ams_view_parses_colors_and_flips_humidity() {
        let ams = AmsStatus {
            humidity_index: 2,
            active_tray: Some(1),
            trays: vec![
                AmsTray { name: "PLA".to_string(), color: "ff0000ff".to_string(), empty: false },
                AmsTray { name: "PETG".to_string(), color: "junk".to_string(), empty: false },
            ],
        };
        let view = AmsView::from_status(&ams);
        assert_eq!(view.humidity, 4);
        assert_eq!(view.trays[0].color, Rgba { r: 0xff, g: 0, b: 0, a: 0xff });
        assert!(!view.trays[0].active);
        assert_eq!(view.trays[1].color, Rgba::TRANSPARENT);
        assert!(view.trays[1].active);
    }
}
