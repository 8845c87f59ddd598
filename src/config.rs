//! Session configuration
//!
//! Two layers live here:
//! - `Settings`: the user-editable TOML file (`~/.config/specwatch/config.toml`),
//!   every field defaulted so a missing or partial file still loads.
//! - `SessionConfig`: the validated, immutable parameters of one observation
//!   session. Construction is the only place numeric input is checked, so a
//!   session that exists is a session whose parameters are valid.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Shortest accepted period for any interval setting
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);
/// Longest accepted period for any interval setting
pub const MAX_INTERVAL: Duration = Duration::from_secs(86_400);
/// Largest ring a regular-cadence source may allocate per window
pub const MAX_WINDOW_SAMPLES: usize = 1 << 20;
/// Largest display grid
pub const MAX_GRID_POINTS: usize = 1 << 16;
/// Largest accepted number of frequency bins per sample
pub const MAX_BIN_COUNT: usize = 1 << 16;
/// Largest socket read buffer
pub const MAX_READ_CHUNK: usize = 1 << 24;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{field} must be positive (got {value})")]
    NonPositive { field: &'static str, value: String },
    #[error("{field} is out of range (got {value})")]
    OutOfRange { field: &'static str, value: String },
    #[error("{field} must be a number (got {value:?})")]
    NonNumeric { field: &'static str, value: String },
    #[error("invalid bind address {0:?}")]
    BindAddress(String),
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Where sample vectors come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Random vectors at a fixed cadence
    #[default]
    Synthetic,
    /// Fixed-width float32 records from a single TCP peer
    Socket,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Synthetic => "synthetic",
            SourceKind::Socket => "socket",
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "synthetic" => Ok(SourceKind::Synthetic),
            "socket" => Ok(SourceKind::Socket),
            other => Err(format!("Invalid source kind: {}", other)),
        }
    }
}

/// Color ramp used for the persisted raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    #[default]
    Spectral,
    Viridis,
    Gray,
}

impl Colormap {
    pub fn as_str(&self) -> &'static str {
        match self {
            Colormap::Spectral => "spectral",
            Colormap::Viridis => "viridis",
            Colormap::Gray => "gray",
        }
    }
}

impl std::str::FromStr for Colormap {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spectral" => Ok(Colormap::Spectral),
            "viridis" => Ok(Colormap::Viridis),
            "gray" | "grey" => Ok(Colormap::Gray),
            other => Err(format!("Invalid colormap: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub source: SourceKind,

    /// Window kept for the live display (seconds)
    #[serde(default = "default_live_horizon")]
    pub live_horizon_s: f64,

    /// Window the peak-frequency statistic is computed over (seconds)
    #[serde(default = "default_average_horizon")]
    pub average_horizon_s: f64,

    /// Window written out on every save (seconds)
    #[serde(default = "default_save_horizon")]
    pub save_horizon_s: f64,

    /// Nominal cadence of the source (seconds); also sizes the ring windows
    #[serde(default = "default_sample_interval")]
    pub sample_interval_s: f64,

    /// Display refresh period (seconds)
    #[serde(default = "default_render_interval")]
    pub render_interval_s: f64,

    /// Period of the background save (seconds)
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval_s: f64,

    /// Step of the uniform display grid for irregular sources (seconds)
    #[serde(default = "default_grid_step")]
    pub grid_step_s: f64,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bytes requested from the socket per read
    #[serde(default = "default_read_chunk")]
    pub read_chunk_bytes: usize,

    /// Site identifier prefixed to every saved file name
    #[serde(default = "default_site")]
    pub site: String,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub colormap: Colormap,
}

fn default_live_horizon() -> f64 {
    10.0
}
fn default_average_horizon() -> f64 {
    30.0
}
fn default_save_horizon() -> f64 {
    60.0
}
fn default_sample_interval() -> f64 {
    0.02
}
fn default_render_interval() -> f64 {
    0.1
}
fn default_autosave_interval() -> f64 {
    60.0
}
fn default_grid_step() -> f64 {
    0.05
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    9999
}
fn default_read_chunk() -> usize {
    4096
}
fn default_site() -> String {
    "Udaipur_PRL".to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            live_horizon_s: default_live_horizon(),
            average_horizon_s: default_average_horizon(),
            save_horizon_s: default_save_horizon(),
            sample_interval_s: default_sample_interval(),
            render_interval_s: default_render_interval(),
            autosave_interval_s: default_autosave_interval(),
            grid_step_s: default_grid_step(),
            bind_address: default_bind_address(),
            port: default_port(),
            read_chunk_bytes: default_read_chunk(),
            site: default_site(),
            output_dir: default_output_dir(),
            colormap: Colormap::default(),
        }
    }
}

impl Settings {
    /// Load settings from the default config path
    ///
    /// Falls back to defaults when the file is absent or fails to parse.
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            log::warn!("Could not determine config directory, using defaults");
            return Self::default();
        };

        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("Failed to load {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Path to the settings file: `~/.config/specwatch/config.toml` on Linux
pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "specwatch").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Like `config_path`, but an error when no home directory can be resolved
pub fn require_config_path() -> Result<PathBuf, ConfigError> {
    config_path().ok_or(ConfigError::NoConfigDir)
}

/// Source-specific parameters
#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    Synthetic,
    Socket {
        bind: SocketAddr,
        read_chunk_bytes: usize,
    },
}

impl SourceConfig {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceConfig::Synthetic => SourceKind::Synthetic,
            SourceConfig::Socket { .. } => SourceKind::Socket,
        }
    }
}

/// Where and how snapshots are written
#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub site: String,
    pub colormap: Colormap,
}

/// Validated parameters of one observation session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub sampling_frequency_hz: u32,
    pub bin_count: usize,
    pub live_horizon_s: f64,
    pub average_horizon_s: f64,
    pub save_horizon_s: f64,
    pub sample_interval_s: f64,
    pub render_interval_s: f64,
    pub autosave_interval_s: f64,
    pub grid_step_s: f64,
    /// Cadence of the synthetic source
    pub sample_period: Duration,
    pub render_period: Duration,
    pub autosave_period: Duration,
    /// Points of the display grid over the live horizon
    pub grid_points: usize,
    pub source: SourceConfig,
    pub output: OutputConfig,
}

impl SessionConfig {
    /// Validate the session parameters against the loaded settings
    pub fn from_settings(
        settings: &Settings,
        sampling_frequency_hz: i64,
        bin_count: i64,
    ) -> Result<Self, ConfigError> {
        let sampling_frequency_hz =
            positive_int("sampling_frequency_hz", sampling_frequency_hz, u32::MAX as i64)? as u32;
        let bin_count = positive_int("bin_count", bin_count, MAX_BIN_COUNT as i64)? as usize;

        let live_horizon_s = positive_secs("live_horizon_s", settings.live_horizon_s)?;
        let average_horizon_s = positive_secs("average_horizon_s", settings.average_horizon_s)?;
        let save_horizon_s = positive_secs("save_horizon_s", settings.save_horizon_s)?;
        let (sample_interval_s, sample_period) =
            interval("sample_interval_s", settings.sample_interval_s)?;
        let (render_interval_s, render_period) =
            interval("render_interval_s", settings.render_interval_s)?;
        let (autosave_interval_s, autosave_period) =
            interval("autosave_interval_s", settings.autosave_interval_s)?;
        let (grid_step_s, _) = interval("grid_step_s", settings.grid_step_s)?;
        let grid_points =
            bounded_steps("grid_step_s", live_horizon_s, grid_step_s, MAX_GRID_POINTS)?;

        let source = match settings.source {
            SourceKind::Synthetic => {
                // Rings are allocated up front
                for (field, horizon_s) in [
                    ("live_horizon_s", live_horizon_s),
                    ("average_horizon_s", average_horizon_s),
                    ("save_horizon_s", save_horizon_s),
                ] {
                    bounded_steps(field, horizon_s, sample_interval_s, MAX_WINDOW_SAMPLES)?;
                }
                SourceConfig::Synthetic
            }
            SourceKind::Socket => {
                if settings.port == 0 {
                    return Err(ConfigError::NonPositive {
                        field: "port",
                        value: "0".to_string(),
                    });
                }
                let ip: IpAddr = settings
                    .bind_address
                    .parse()
                    .map_err(|_| ConfigError::BindAddress(settings.bind_address.clone()))?;
                SourceConfig::Socket {
                    bind: SocketAddr::new(ip, settings.port),
                    read_chunk_bytes: positive_int(
                        "read_chunk_bytes",
                        i64::try_from(settings.read_chunk_bytes).unwrap_or(i64::MAX),
                        MAX_READ_CHUNK as i64,
                    )? as usize,
                }
            }
        };

        Ok(Self {
            sampling_frequency_hz,
            bin_count,
            live_horizon_s,
            average_horizon_s,
            save_horizon_s,
            sample_interval_s,
            render_interval_s,
            autosave_interval_s,
            grid_step_s,
            sample_period,
            render_period,
            autosave_period,
            grid_points,
            source,
            output: OutputConfig {
                dir: settings.output_dir.clone(),
                site: settings.site.clone(),
                colormap: settings.colormap,
            },
        })
    }

    /// Validate raw textual parameters as typed by a user
    ///
    /// `port`, when given, overrides the settings file.
    pub fn parse(
        settings: &Settings,
        sampling_frequency_hz: &str,
        bin_count: &str,
        port: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let fs = parse_int("sampling_frequency_hz", sampling_frequency_hz)?;
        let n = parse_int("bin_count", bin_count)?;

        let mut settings = settings.clone();
        if let Some(port) = port {
            let value = parse_int("port", port)?;
            settings.port = positive_int("port", value, u16::MAX as i64)? as u16;
        }

        Self::from_settings(&settings, fs, n)
    }

    /// Number of cadence steps covering `horizon_s`, at most
    /// [`MAX_WINDOW_SAMPLES`]
    pub fn steps_for(&self, horizon_s: f64) -> usize {
        steps(horizon_s, self.sample_interval_s)
            .map_or(MAX_WINDOW_SAMPLES, |n| n.min(MAX_WINDOW_SAMPLES))
    }

    pub fn frequency_axis(&self) -> FrequencyAxis {
        FrequencyAxis::new(self.sampling_frequency_hz, self.bin_count)
    }

    pub fn nyquist_hz(&self) -> f64 {
        self.sampling_frequency_hz as f64 / 2.0
    }
}

/// `ceil(horizon / interval)`, tolerant of float noise on exact multiples
///
/// At least 1; `None` when the ratio is not a finite count that fits a
/// `usize`.
pub fn steps(horizon_s: f64, interval_s: f64) -> Option<usize> {
    let raw = horizon_s / interval_s;
    if !raw.is_finite() || raw < 0.0 {
        return None;
    }
    let nearest = raw.round();
    let count = if (raw - nearest).abs() < 1e-9 {
        nearest
    } else {
        raw.ceil()
    };
    if count >= usize::MAX as f64 {
        return None;
    }
    Some((count as usize).max(1))
}

fn bounded_steps(
    field: &'static str,
    horizon_s: f64,
    interval_s: f64,
    max: usize,
) -> Result<usize, ConfigError> {
    steps(horizon_s, interval_s)
        .filter(|&n| n <= max)
        .ok_or_else(|| ConfigError::OutOfRange {
            field,
            value: format!("{}s in {}s steps, limit {}", horizon_s, interval_s, max),
        })
}

fn parse_int(field: &'static str, value: &str) -> Result<i64, ConfigError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::NonNumeric {
            field,
            value: value.to_string(),
        })
}

fn positive_int(field: &'static str, value: i64, max: i64) -> Result<i64, ConfigError> {
    if value <= 0 {
        return Err(ConfigError::NonPositive {
            field,
            value: value.to_string(),
        });
    }
    if value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn positive_secs(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::NonPositive {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}

/// A positive period within [`MIN_INTERVAL`]..=[`MAX_INTERVAL`]
fn interval(field: &'static str, value: f64) -> Result<(f64, Duration), ConfigError> {
    let secs = positive_secs(field, value)?;
    match Duration::try_from_secs_f64(secs) {
        Ok(period) if (MIN_INTERVAL..=MAX_INTERVAL).contains(&period) => Ok((secs, period)),
        _ => Err(ConfigError::OutOfRange {
            field,
            value: value.to_string(),
        }),
    }
}

/// Frequency of every bin, linearly spaced from 0 to Nyquist inclusive
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyAxis {
    values: Vec<f64>,
    nyquist_hz: f64,
}

impl FrequencyAxis {
    pub fn new(sampling_frequency_hz: u32, bin_count: usize) -> Self {
        let nyquist = sampling_frequency_hz as f64 / 2.0;
        let values = match bin_count {
            0 => Vec::new(),
            1 => vec![0.0],
            n => {
                let step = nyquist / (n - 1) as f64;
                (0..n).map(|i| i as f64 * step).collect()
            }
        };
        Self {
            values,
            nyquist_hz: nyquist,
        }
    }

    pub fn nyquist_hz(&self) -> f64 {
        self.nyquist_hz
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, bin: usize) -> Option<f64> {
        self.values.get(bin).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_roundtrip_through_toml() {
        let settings = Settings::default();
        let text = settings.to_toml().unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Settings = toml::from_str("source = \"socket\"\nport = 7000\n").unwrap();
        assert_eq!(parsed.source, SourceKind::Socket);
        assert_eq!(parsed.port, 7000);
        assert_eq!(parsed.live_horizon_s, 10.0);
        assert_eq!(parsed.site, "Udaipur_PRL");
    }

    #[test]
    fn test_rejects_non_positive_parameters() {
        let settings = Settings::default();
        assert!(matches!(
            SessionConfig::from_settings(&settings, 0, 512),
            Err(ConfigError::NonPositive { field: "sampling_frequency_hz", .. })
        ));
        assert!(matches!(
            SessionConfig::from_settings(&settings, 1000, -4),
            Err(ConfigError::NonPositive { field: "bin_count", .. })
        ));

        let mut bad = Settings::default();
        bad.live_horizon_s = 0.0;
        assert!(matches!(
            SessionConfig::from_settings(&bad, 1000, 4),
            Err(ConfigError::NonPositive { field: "live_horizon_s", .. })
        ));
    }

    #[test]
    fn test_rejects_non_numeric_parameters() {
        let settings = Settings::default();
        assert!(matches!(
            SessionConfig::parse(&settings, "abc", "512", None),
            Err(ConfigError::NonNumeric { field: "sampling_frequency_hz", .. })
        ));
        assert!(matches!(
            SessionConfig::parse(&settings, "1000", "4.5", None),
            Err(ConfigError::NonNumeric { field: "bin_count", .. })
        ));
        assert!(matches!(
            SessionConfig::parse(&settings, "1000", "4", Some("port")),
            Err(ConfigError::NonNumeric { field: "port", .. })
        ));
    }

    #[test]
    fn test_port_override() {
        let mut settings = Settings::default();
        settings.source = SourceKind::Socket;
        let config = SessionConfig::parse(&settings, "2000", "64", Some("12345")).unwrap();
        match config.source {
            SourceConfig::Socket { bind, .. } => assert_eq!(bind.port(), 12345),
            other => panic!("unexpected source {:?}", other),
        }
        assert!(SessionConfig::parse(&settings, "2000", "64", Some("0")).is_err());
        assert!(SessionConfig::parse(&settings, "2000", "64", Some("70000")).is_err());
    }

    #[test]
    fn test_steps_tolerates_float_noise() {
        assert_eq!(steps(10.0, 0.02), Some(500));
        assert_eq!(steps(60.0, 0.02), Some(3000));
        assert_eq!(steps(10.0, 1.0), Some(10));
        assert_eq!(steps(10.0, 3.0), Some(4));
        assert_eq!(steps(0.001, 1.0), Some(1));
    }

    #[test]
    fn test_steps_does_not_saturate() {
        assert_eq!(steps(1e300, 0.001), None);
        assert_eq!(steps(f64::INFINITY, 1.0), None);
        assert_eq!(steps(1.0, 0.0), None);
    }

    #[test]
    fn test_intervals_become_bounded_durations() {
        let config = SessionConfig::from_settings(&Settings::default(), 1000, 4).unwrap();
        assert_eq!(config.sample_period, Duration::from_millis(20));
        assert_eq!(config.render_period, Duration::from_millis(100));
        assert_eq!(config.autosave_period, Duration::from_secs(60));
        assert_eq!(config.grid_points, 200);

        for (field, value) in [
            ("render_interval_s", 1e-10),
            ("render_interval_s", 1e300),
            ("autosave_interval_s", 1e-4),
            ("sample_interval_s", 1e20),
            ("grid_step_s", 5e-4),
        ] {
            let mut settings = Settings::default();
            match field {
                "render_interval_s" => settings.render_interval_s = value,
                "autosave_interval_s" => settings.autosave_interval_s = value,
                "sample_interval_s" => settings.sample_interval_s = value,
                _ => settings.grid_step_s = value,
            }
            let result = SessionConfig::from_settings(&settings, 1000, 4);
            assert!(
                matches!(result, Err(ConfigError::OutOfRange { field: f, .. }) if f == field),
                "{field} = {value}: {result:?}"
            );
        }
    }

    #[test]
    fn test_rejects_oversized_allocations() {
        let settings = Settings {
            save_horizon_s: 1e300,
            ..Settings::default()
        };
        assert!(matches!(
            SessionConfig::from_settings(&settings, 1000, 4),
            Err(ConfigError::OutOfRange { field: "save_horizon_s", .. })
        ));

        // a deque is not preallocated, but the display grid is
        let socket = Settings {
            source: SourceKind::Socket,
            save_horizon_s: 1e300,
            ..Settings::default()
        };
        assert!(SessionConfig::from_settings(&socket, 1000, 4).is_ok());
        let wide_grid = Settings {
            live_horizon_s: 1e300,
            ..socket
        };
        assert!(matches!(
            SessionConfig::from_settings(&wide_grid, 1000, 4),
            Err(ConfigError::OutOfRange { field: "grid_step_s", .. })
        ));

        assert!(matches!(
            SessionConfig::from_settings(&Settings::default(), 1000, u32::MAX as i64),
            Err(ConfigError::OutOfRange { field: "bin_count", .. })
        ));
        assert!(SessionConfig::from_settings(&Settings::default(), 1000, MAX_BIN_COUNT as i64).is_ok());

        let huge_chunk = Settings {
            source: SourceKind::Socket,
            read_chunk_bytes: usize::MAX,
            ..Settings::default()
        };
        assert!(matches!(
            SessionConfig::from_settings(&huge_chunk, 1000, 4),
            Err(ConfigError::OutOfRange { field: "read_chunk_bytes", .. })
        ));
    }

    #[test]
    fn test_frequency_axis_spans_zero_to_nyquist() {
        let axis = FrequencyAxis::new(1000, 5);
        assert_eq!(axis.values(), &[0.0, 125.0, 250.0, 375.0, 500.0]);

        let single = FrequencyAxis::new(1000, 1);
        assert_eq!(single.values(), &[0.0]);
    }
}
