// src/telemetry.rs - Device snapshot model and the telemetry collaborator trait
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Telemetry connection failed: {0}")]
    Connection(String),
}

/// Print lifecycle phase as reported by the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GcodeState {
    #[default]
    Idle,
    Finish,
    Failed,
    Prepare,
    Running,
    Pause,
    Slicing,
    /// Firmware tags we do not know yet still count as an active print.
    Other(String),
}

impl GcodeState {
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_uppercase().as_str() {
            "IDLE" => GcodeState::Idle,
            "FINISH" => GcodeState::Finish,
            "FAILED" => GcodeState::Failed,
            "PREPARE" => GcodeState::Prepare,
            "RUNNING" => GcodeState::Running,
            "PAUSE" => GcodeState::Pause,
            "SLICING" => GcodeState::Slicing,
            other => GcodeState::Other(other.to_string()),
        }
    }

    /// Terminal phases end the tracked job; everything else counts as printing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GcodeState::Idle | GcodeState::Finish | GcodeState::Failed)
    }
}

impl fmt::Display for GcodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcodeState::Idle => write!(f, "Idle"),
            GcodeState::Finish => write!(f, "Finish"),
            GcodeState::Failed => write!(f, "Failed"),
            GcodeState::Prepare => write!(f, "Prepare"),
            GcodeState::Running => write!(f, "Running"),
            GcodeState::Pause => write!(f, "Pause"),
            GcodeState::Slicing => write!(f, "Slicing"),
            GcodeState::Other(tag) => write!(f, "{}", title_case(tag)),
        }
    }
}

/// "HEATBED_PREHEATING" -> "Heatbed Preheating", for the screen.
fn title_case(tag: &str) -> String {
    tag.split(['_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Job descriptor fields the device reports while something is on the bed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub print_type: String,
    /// Often missing in the first snapshots of a job.
    pub start_time: Option<DateTime<Utc>>,
    pub subtask_name: String,
    pub current_layer: u32,
    pub total_layers: u32,
    pub progress_percent: u8,
    pub remaining_minutes: u32,
}

/// Nozzle and bed readings plus their targets, when the device reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Temperatures {
    pub nozzle: Option<f64>,
    pub nozzle_target: Option<f64>,
    pub bed: Option<f64>,
    pub bed_target: Option<f64>,
}

/// Text-color cue for a heater readout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatTrend {
    Heating,
    Cooling,
    Steady,
}

/// Classify a sensor for the display. `Cooling` only applies above the
/// still-warm threshold so an idle nozzle at room temperature reads `Steady`.
pub fn heat_trend(current: Option<f64>, target: Option<f64>) -> HeatTrend {
    const STILL_WARM_C: f64 = 45.0;
    match (current, target) {
        (Some(current), Some(target)) if target > current => HeatTrend::Heating,
        (Some(current), Some(target)) if target < current && current > STILL_WARM_C => HeatTrend::Cooling,
        _ => HeatTrend::Steady,
    }
}

/// Material carousel state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AmsStatus {
    /// Raw index from the printer: 1 = wet .. 5 = dry.
    pub humidity_index: u8,
    /// Slot currently feeding the extruder.
    pub active_tray: Option<usize>,
    pub trays: Vec<AmsTray>,
}

impl AmsStatus {
    /// Handy/Studio present humidity the other way around (1 = dry, 5 = wet);
    /// the screen follows that convention.
    pub fn display_humidity(&self) -> u8 {
        6u8.saturating_sub(self.humidity_index)
    }
}

/// One carousel slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AmsTray {
    pub name: String,
    /// Filament color as 8 hex digits (RRGGBBAA) from the device.
    pub color: String,
    pub empty: bool,
}

/// Filament color ready for drawing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba { r: 0, g: 0, b: 0, a: 0 };

    /// Parse an RRGGBBAA tray color. Malformed values fall back to fully
    /// transparent black so a single bad field never aborts a render tick.
    pub fn parse(color: &str) -> Rgba {
        if color.len() != 8 || !color.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Rgba::TRANSPARENT;
        }
        let component = |range: std::ops::Range<usize>| u8::from_str_radix(&color[range], 16).unwrap_or(0);
        Rgba {
            r: component(0..2),
            g: component(2..4),
            b: component(4..6),
            a: component(6..8),
        }
    }
}

/// Everything the poll loop sees about the device in one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub gcode_state: GcodeState,
    /// Present while the device reports a job on the bed.
    pub job: Option<JobSnapshot>,
    pub temperatures: Temperatures,
    pub ams: Option<AmsStatus>,
    pub hms_error_count: u32,
    pub print_error: bool,
}

/// Source of periodic device snapshots. The MQTT transport lives behind this
/// trait; the mirror only ever reads the last-known value.
#[async_trait]
pub trait TelemetrySource: Send + Sync + 'static {
    /// Establish the underlying transport.
    async fn connect(&self) -> Result<(), TelemetryError>;

    /// Whether the transport currently has a live link to the device.
    fn connected(&self) -> bool;

    /// Last-known device state. Never blocks.
    fn snapshot(&self) -> DeviceSnapshot;
}

/// Scripted telemetry feed for tests and the demo harness: serves queued
/// frames in order, then keeps repeating the last one.
pub struct ReplayTelemetry {
    frames: Mutex<VecDeque<DeviceSnapshot>>,
    last: Mutex<DeviceSnapshot>,
    connected: AtomicBool,
}

impl ReplayTelemetry {
    pub fn new(frames: Vec<DeviceSnapshot>) -> Self {
        Self {
            frames: Mutex::new(frames.into()),
            last: Mutex::new(DeviceSnapshot::default()),
            connected: AtomicBool::new(false),
        }
    }

    /// Queue another frame behind the ones not yet served.
    pub fn push(&self, frame: DeviceSnapshot) {
        self.frames.lock().unwrap().push_back(frame);
    }
}

#[async_trait]
impl TelemetrySource for ReplayTelemetry {
    async fn connect(&self) -> Result<(), TelemetryError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> DeviceSnapshot {
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.frames.lock().unwrap().pop_front() {
            *last = next;
        }
        last.clone()
    }
}
