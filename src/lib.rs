//! Sliding-window spectrogram acquisition
//!
//! Samples (fixed-width spectral vectors) arrive from a synthetic generator
//! or a TCP peer, fan out into several sliding windows of different
//! horizons, and are periodically rendered, averaged and saved to disk as a
//! FITS file plus a PNG raster.

pub mod aggregate;
pub mod align;
pub mod config;
pub mod display;
pub mod persist;
pub mod sample;
pub mod session;
pub mod source;
pub mod state;
pub mod window;
pub mod window_set;

pub use config::{SessionConfig, Settings};
pub use sample::{Sample, SessionClock};
pub use session::{Session, SessionError};
