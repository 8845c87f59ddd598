//! Snapshot persistence: a FITS data file plus a PNG raster
//!
//! Both files share a base name `<site>_<DDMMYYYY>_<HHMMSS>_Fs<fs>_N<n>`
//! and are written through a temporary sibling that is renamed into place,
//! so a reader never observes a half-written file. Existing files at the
//! same path are replaced.

mod fits;
mod font;
mod render;

pub use fits::{Card, ImageData, ImageHdu, Value, write_fits};
pub use render::{Raster, color_at, value_range};

use crate::align::{chronological_matrix, relative_times};
use crate::config::{FrequencyAxis, SessionConfig};
use crate::sample::Sample;
use jiff::Zoned;
use std::ffi::OsString;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode raster: {0}")]
    Encode(String),
    #[error("nothing to render")]
    EmptyRaster,
}

/// The abstract record handed to the file writers
#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    /// Seconds before the newest sample, oldest first; the last entry is 0
    pub relative_times: Vec<f64>,
    pub frequencies: Vec<f64>,
    /// Row-major `time × frequency`, NaN where a value is missing
    pub magnitudes: Vec<f32>,
    pub bin_count: usize,
    pub sampling_frequency_hz: u32,
    pub captured_at: Zoned,
}

impl SnapshotRecord {
    /// `None` for an empty snapshot
    pub fn from_snapshot(
        snapshot: &[Sample],
        axis: &FrequencyAxis,
        config: &SessionConfig,
        captured_at: Zoned,
    ) -> Option<Self> {
        let newest = snapshot.last()?.timestamp();
        Some(Self {
            relative_times: relative_times(snapshot, newest),
            frequencies: axis.values().to_vec(),
            magnitudes: chronological_matrix(snapshot, config.bin_count),
            bin_count: config.bin_count,
            sampling_frequency_hz: config.sampling_frequency_hz,
            captured_at,
        })
    }

    pub fn rows(&self) -> usize {
        self.relative_times.len()
    }

    /// Span covered by the time axis in seconds
    pub fn duration_s(&self) -> f64 {
        self.relative_times.first().map(|t| -t).unwrap_or(0.0)
    }

    pub fn hdus(&self) -> Vec<ImageHdu> {
        vec![
            ImageHdu::new(vec![self.rows()], ImageData::F64(self.relative_times.clone()))
                .card(
                    Card::new("FS", Value::Int(self.sampling_frequency_hz as i64))
                        .with_comment("sampling frequency [Hz]"),
                )
                .card(Card::new("NFFT", Value::Int(self.bin_count as i64)).with_comment("frequency bins"))
                .card(Card::new(
                    "DATE-OBS",
                    Value::Text(self.captured_at.strftime("%Y-%m-%dT%H:%M:%S").to_string()),
                )),
            ImageHdu::new(vec![self.frequencies.len()], ImageData::F64(self.frequencies.clone()))
                .named("FREQ"),
            ImageHdu::new(
                vec![self.bin_count, self.rows()],
                ImageData::F32(self.magnitudes.clone()),
            )
            .named("DATA"),
        ]
    }

    pub fn title(&self) -> String {
        format!(
            "{:.0}S SPECTROGRAM SNAPSHOT (FS={} HZ, N={})",
            self.duration_s(),
            self.sampling_frequency_hz,
            self.bin_count
        )
    }

    pub fn caption(&self) -> String {
        format!("Captured at: {}", self.captured_at.strftime("%Y-%m-%d %H:%M:%S"))
    }
}

/// Paths of one written file pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFiles {
    pub data: PathBuf,
    pub image: PathBuf,
}

/// `<site>_<DDMMYYYY>_<HHMMSS>_Fs<fs>_N<n>`
pub fn base_name(site: &str, captured_at: &Zoned, sampling_frequency_hz: u32, bin_count: usize) -> String {
    format!(
        "{}_{}_Fs{}_N{}",
        site,
        captured_at.strftime("%d%m%Y_%H%M%S"),
        sampling_frequency_hz,
        bin_count
    )
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Write `path` via a temporary sibling and a rename
fn write_atomic(path: &Path, write: impl FnOnce(&mut BufWriter<fs::File>) -> std::io::Result<()>) -> Result<(), PersistError> {
    let tmp = with_suffix(path, ".tmp");
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };

    let result = (|| {
        let file = fs::File::create(&tmp)?;
        let mut out = BufWriter::new(file);
        write(&mut out)?;
        out.flush()?;
        out.get_ref().sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(e));
    }
    Ok(())
}

/// Write the record as `<base>.fits` and `<base>.png`
pub fn write_record(
    record: &SnapshotRecord,
    config: &SessionConfig,
    out_base: &Path,
) -> Result<SavedFiles, PersistError> {
    let data = with_suffix(out_base, ".fits");
    let image = with_suffix(out_base, ".png");

    if let Some(parent) = out_base.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PersistError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let hdus = record.hdus();
    write_atomic(&data, |out| write_fits(out, &hdus))?;
    log::info!("Saved FITS: {}", data.display());

    log::debug!("Rendering {} raster", config.output.colormap.as_str());
    let title = record.title();
    let caption = record.caption();
    let pixmap = render::render(&Raster {
        magnitudes: &record.magnitudes,
        bin_count: record.bin_count,
        relative_times: &record.relative_times,
        nyquist_hz: config.nyquist_hz(),
        colormap: config.output.colormap,
        title: &title,
        caption: &caption,
    })?;
    let png = pixmap
        .encode_png()
        .map_err(|e| PersistError::Encode(e.to_string()))?;
    write_atomic(&image, |out| out.write_all(&png))?;
    log::info!("Saved PNG: {}", image.display());

    Ok(SavedFiles { data, image })
}

/// Persist a window snapshot to `<out_base>.fits` and `<out_base>.png`
///
/// An empty snapshot writes nothing and returns `Ok(None)`.
pub fn snapshot_to_file(
    snapshot: &[Sample],
    axis: &FrequencyAxis,
    config: &SessionConfig,
    out_base: &Path,
) -> Result<Option<SavedFiles>, PersistError> {
    let Some(record) = SnapshotRecord::from_snapshot(snapshot, axis, config, Zoned::now()) else {
        log::debug!("Snapshot empty, nothing to save");
        return Ok(None);
    };
    write_record(&record, config, out_base).map(Some)
}

/// Persist into the configured output directory under a timestamped name
pub fn save_snapshot(
    snapshot: &[Sample],
    axis: &FrequencyAxis,
    config: &SessionConfig,
) -> Result<Option<SavedFiles>, PersistError> {
    let captured_at = Zoned::now();
    let Some(record) = SnapshotRecord::from_snapshot(snapshot, axis, config, captured_at.clone()) else {
        log::debug!("Snapshot empty, nothing to save");
        return Ok(None);
    };
    let base = config.output.dir.join(base_name(
        &config.output.site,
        &captured_at,
        config.sampling_frequency_hz,
        config.bin_count,
    ));
    write_record(&record, config, &base).map(Some)
}
