//! Presentation collaborators
//!
//! The session hands every render tick to a [`Visualizer`] and reports
//! non-fatal conditions as [`SessionEvent`]s. How they are drawn is up to
//! the implementation; [`ConsoleVisualizer`] prints a status line or NDJSON.

use crate::config::FrequencyAxis;
use crate::state::Phase;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// One render tick worth of display data
#[derive(Debug, Clone)]
pub struct SpectrogramFrame {
    /// Row times in seconds relative to the tick, oldest first
    pub times: Vec<f64>,
    /// Row-major `time × frequency`, NaN where a grid cell is missing
    pub magnitudes: Vec<f32>,
    /// Frequency of each column, shared by every frame of a session
    pub axis: Arc<FrequencyAxis>,
    pub missing_rows: usize,
    /// Peak of the averaging window's mean spectrum, if it has data
    pub average_peak_hz: Option<f64>,
    pub average_horizon_s: f64,
}

impl SpectrogramFrame {
    pub fn rows(&self) -> usize {
        self.times.len()
    }

    pub fn bin_count(&self) -> usize {
        self.axis.len()
    }

    pub fn nyquist_hz(&self) -> f64 {
        self.axis.nyquist_hz()
    }

    /// `Avg Frequency (30s): 123.45 Hz`
    pub fn average_label(&self) -> Option<String> {
        self.average_peak_hz
            .map(|hz| average_label(self.average_horizon_s, hz))
    }
}

pub fn average_label(horizon_s: f64, peak_hz: f64) -> String {
    format!("Avg Frequency ({}s): {:.2} Hz", horizon_s, peak_hz)
}

/// Things worth telling the operator about
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionEvent {
    /// Lifecycle transition
    Phase { phase: Phase },
    /// A snapshot file pair was written
    Saved { data: PathBuf, image: PathBuf },
    /// Source failure; acquisition has ended but timers keep running
    #[serde(rename = "source_error")]
    SourceError { error: String },
    /// Save failure; the next scheduled save proceeds independently
    #[serde(rename = "save_error")]
    SaveError { error: String },
    /// The source reached end of stream
    #[serde(rename = "source_closed")]
    SourceClosed,
}

pub trait Visualizer: Send + Sync {
    fn frame(&self, frame: &SpectrogramFrame);

    fn event(&self, _event: &SessionEvent) {}
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullVisualizer;

impl Visualizer for NullVisualizer {
    fn frame(&self, _frame: &SpectrogramFrame) {}
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayFormat {
    #[default]
    Text,
    Json,
}

/// Writes a status line (or a JSON object) to stdout every `every` frames
pub struct ConsoleVisualizer {
    format: DisplayFormat,
    every: u64,
    ticks: AtomicU64,
}

#[derive(Serialize)]
struct FrameSummary<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    rows: usize,
    missing_rows: usize,
    bins: usize,
    average_peak_hz: Option<f64>,
    label: Option<String>,
}

impl ConsoleVisualizer {
    pub fn new(format: DisplayFormat, every: u64) -> Self {
        Self {
            format,
            every: every.max(1),
            ticks: AtomicU64::new(0),
        }
    }

    fn emit(&self, line: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", line) {
            log::debug!("Failed to write to stdout: {}", e);
        }
    }

    /// Render a frame as one output line
    pub fn format_frame(&self, frame: &SpectrogramFrame) -> String {
        match self.format {
            DisplayFormat::Text => {
                let label = frame
                    .average_label()
                    .unwrap_or_else(|| format!("Avg Frequency ({}s): --", frame.average_horizon_s));
                format!(
                    "{} | rows {} (missing {})",
                    label,
                    frame.rows(),
                    frame.missing_rows
                )
            }
            DisplayFormat::Json => {
                let summary = FrameSummary {
                    kind: "frame",
                    rows: frame.rows(),
                    missing_rows: frame.missing_rows,
                    bins: frame.bin_count(),
                    average_peak_hz: frame.average_peak_hz,
                    label: frame.average_label(),
                };
                to_json(&summary)
            }
        }
    }

    pub fn format_event(&self, event: &SessionEvent) -> String {
        match self.format {
            DisplayFormat::Json => to_json(event),
            DisplayFormat::Text => match event {
                SessionEvent::Phase { phase } => format!("Session {}", phase.as_str()),
                SessionEvent::Saved { data, image } => {
                    format!("Saved {} and {}", data.display(), image.display())
                }
                SessionEvent::SourceError { error } => format!("Source error: {}", error),
                SessionEvent::SaveError { error } => format!("Save failed: {}", error),
                SessionEvent::SourceClosed => "Source closed".to_string(),
            },
        }
    }
}

/// One JSON line; a serialization failure is logged and yields an error object
fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        log::warn!("Failed to serialize output line: {}", e);
        serde_json::json!({ "type": "error", "error": e.to_string() }).to_string()
    })
}

impl Visualizer for ConsoleVisualizer {
    fn frame(&self, frame: &SpectrogramFrame) {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed);
        if tick % self.every == 0 {
            self.emit(&self.format_frame(frame));
        }
    }

    fn event(&self, event: &SessionEvent) {
        self.emit(&self.format_event(event));
    }
}
