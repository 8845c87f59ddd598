//! One observation session
//!
//! A session owns the window set, the sample source and three background
//! tasks that share them:
//! - acquisition: `produce()` → `WindowSet::push` until end of stream
//! - render tick: snapshot → align/aggregate → [`Visualizer`]
//! - autosave: snapshot of the save window → FITS + PNG
//!
//! Every exit path (explicit stop, drop) moves the shared
//! [`SessionState`] to `Stopped`, which wakes every task blocked on the
//! source or a timer.

use crate::aggregate::peak_frequency;
use crate::align::{GridAligner, chronological_matrix, relative_times};
use crate::config::{ConfigError, FrequencyAxis, SessionConfig, SourceConfig};
use crate::display::{SessionEvent, SpectrogramFrame, Visualizer};
use crate::persist::{self, PersistError, SavedFiles};
use crate::sample::SessionClock;
use crate::source::{SampleSource, SourceError};
use crate::state::{Phase, SessionState};
use crate::window::{Eviction, SlidingWindow};
use crate::window_set::WindowSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Short window shown by the render tick
pub const LIVE: &str = "live";
/// Window whose mean spectrum yields the peak frequency
pub const AVERAGE: &str = "average";
/// Window written to disk
pub const SAVE: &str = "save";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("save failed: {0}")]
    Persist(#[from] PersistError),
    #[error("session is not running")]
    NotRunning,
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Member windows for the configured source
///
/// A regular-cadence source gets fixed-capacity rings sized
/// `ceil(horizon / interval)`; an irregular one gets time-evicted deques.
pub fn build_windows(config: &SessionConfig) -> WindowSet {
    [
        (LIVE, config.live_horizon_s),
        (AVERAGE, config.average_horizon_s),
        (SAVE, config.save_horizon_s),
    ]
    .into_iter()
    .fold(WindowSet::new(), |set, (name, horizon_s)| {
        let eviction = match config.source {
            SourceConfig::Synthetic => Eviction::Capacity(config.steps_for(horizon_s)),
            SourceConfig::Socket { .. } => Eviction::Horizon(horizon_s),
        };
        set.with_window(name, SlidingWindow::new(eviction))
    })
}

struct SessionInner {
    config: SessionConfig,
    axis: Arc<FrequencyAxis>,
    windows: WindowSet,
    aligner: Option<GridAligner>,
    state: Arc<SessionState>,
    clock: SessionClock,
    visualizer: Arc<dyn Visualizer>,
    // Serializes saves
    save_lock: tokio::sync::Mutex<()>,
}

impl SessionInner {
    fn emit(&self, event: SessionEvent) {
        self.visualizer.event(&event);
    }

    /// Build the display data for the tick at `now`; `None` until the live
    /// window has data
    fn frame(&self, now: f64) -> Option<SpectrogramFrame> {
        let live = self.windows.snapshot(LIVE)?;
        let newest = live.last()?.timestamp();
        let bins = self.config.bin_count;

        let (times, magnitudes, missing_rows) = match &self.aligner {
            Some(grid) => {
                let aligned = grid.align(&live, now, bins);
                (aligned.times().to_vec(), aligned.to_matrix(), aligned.missing_count())
            }
            None => (relative_times(&live, newest), chronological_matrix(&live, bins), 0),
        };

        let average_peak_hz = self
            .windows
            .snapshot(AVERAGE)
            .and_then(|snapshot| peak_frequency(&snapshot, &self.axis));

        Some(SpectrogramFrame {
            times,
            magnitudes,
            axis: Arc::clone(&self.axis),
            missing_rows,
            average_peak_hz,
            average_horizon_s: self.config.average_horizon_s,
        })
    }

    /// Persist the save window off the async runtime
    async fn save(&self) -> SessionResult<Option<SavedFiles>> {
        let _guard = self.save_lock.lock().await;
        let snapshot = self.windows.snapshot(SAVE).unwrap_or_default();
        let config = self.config.clone();
        let axis = Arc::clone(&self.axis);

        let saved =
            tokio::task::spawn_blocking(move || persist::save_snapshot(&snapshot, &axis, &config))
                .await??;
        if let Some(files) = &saved {
            self.emit(SessionEvent::Saved {
                data: files.data.clone(),
                image: files.image.clone(),
            });
        }
        Ok(saved)
    }

    /// Save, reporting failure instead of returning it
    async fn save_reporting(&self) -> Option<SavedFiles> {
        match self.save().await {
            Ok(saved) => saved,
            Err(e) => {
                log::warn!("Save failed: {}", e);
                self.emit(SessionEvent::SaveError {
                    error: e.to_string(),
                });
                None
            }
        }
    }
}

pub struct Session {
    inner: Arc<SessionInner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    local_addr: Option<SocketAddr>,
}

impl Session {
    /// Allocate the windows, open the source and start the background tasks
    ///
    /// A socket source binds its port here; a busy port fails the start.
    pub async fn start(config: SessionConfig, visualizer: Arc<dyn Visualizer>) -> SessionResult<Self> {
        let state = Arc::new(SessionState::new());
        let clock = SessionClock::start();
        let source = SampleSource::from_config(&config, Arc::clone(&state), clock).await?;
        let local_addr = source.local_addr();

        let aligner = match config.source {
            SourceConfig::Socket { .. } => {
                Some(GridAligner::with_points(config.live_horizon_s, config.grid_points))
            }
            SourceConfig::Synthetic => None,
        };

        log::info!(
            "Starting {} session: Fs={} Hz, N={}, windows {}s/{}s/{}s",
            config.source.kind().as_str(),
            config.sampling_frequency_hz,
            config.bin_count,
            config.live_horizon_s,
            config.average_horizon_s,
            config.save_horizon_s
        );

        let inner = Arc::new(SessionInner {
            axis: Arc::new(config.frequency_axis()),
            windows: build_windows(&config),
            aligner,
            state: Arc::clone(&state),
            clock,
            visualizer,
            save_lock: tokio::sync::Mutex::new(()),
            config,
        });

        state.start();
        inner.emit(SessionEvent::Phase {
            phase: Phase::Running,
        });

        let tasks = vec![
            tokio::spawn(acquisition_loop(Arc::clone(&inner), source)),
            tokio::spawn(render_loop(Arc::clone(&inner))),
            tokio::spawn(autosave_loop(Arc::clone(&inner))),
        ];

        Ok(Self {
            inner,
            tasks: Mutex::new(tasks),
            local_addr,
        })
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.phase()
    }

    pub fn state(&self) -> Arc<SessionState> {
        Arc::clone(&self.inner.state)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn windows(&self) -> &WindowSet {
        &self.inner.windows
    }

    /// Listening address of a socket session
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Display data as of now, outside the render tick
    pub fn frame(&self) -> Option<SpectrogramFrame> {
        self.inner.frame(self.inner.clock.now())
    }

    fn announce(&self, changed: bool) -> bool {
        if changed {
            let phase = self.phase();
            log::info!("Session {}", phase.as_str());
            self.inner.emit(SessionEvent::Phase { phase });
        }
        changed
    }

    pub fn pause(&self) -> bool {
        self.announce(self.inner.state.pause())
    }

    pub fn resume(&self) -> bool {
        self.announce(self.inner.state.resume())
    }

    pub fn toggle_pause(&self) -> Phase {
        let before = self.phase();
        let after = self.inner.state.toggle_pause();
        self.announce(before != after);
        after
    }

    /// Save the save window now; `Ok(None)` if it is still empty
    pub async fn save_now(&self) -> SessionResult<Option<SavedFiles>> {
        if self.inner.state.is_stopped() {
            return Err(SessionError::NotRunning);
        }
        self.inner.save().await
    }

    /// Stop the tasks, release the source and make a final save
    ///
    /// Idempotent: only the first call saves; later calls return `Ok(None)`.
    pub async fn stop(&self) -> SessionResult<Option<SavedFiles>> {
        let first = self.inner.state.stop();
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            if let Err(e) = task.await {
                log::error!("Session task failed: {}", e);
            }
        }
        if !first {
            return Ok(None);
        }

        log::info!("Session stopped");
        self.inner.emit(SessionEvent::Phase {
            phase: Phase::Stopped,
        });
        self.inner.save().await.map_err(|e| {
            self.inner.emit(SessionEvent::SaveError {
                error: e.to_string(),
            });
            e
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Tasks observe the stop and exit on their own; no final save here
        self.inner.state.stop();
    }
}

async fn acquisition_loop(inner: Arc<SessionInner>, mut source: SampleSource) {
    loop {
        match source.produce().await {
            Ok(Some(sample)) => {
                if inner.state.is_running() {
                    inner.windows.push(sample);
                } else {
                    log::debug!("Dropping sample produced across a pause or stop");
                }
            }
            Ok(None) => {
                if !inner.state.is_stopped() {
                    log::info!("Source closed");
                    inner.emit(SessionEvent::SourceClosed);
                }
                break;
            }
            Err(e) => {
                log::error!("Acquisition stopped: {}", e);
                inner.emit(SessionEvent::SourceError {
                    error: e.to_string(),
                });
                break;
            }
        }
    }
    source.close();
}

async fn render_loop(inner: Arc<SessionInner>) {
    let mut ticker = tokio::time::interval(inner.config.render_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = inner.state.wait_stopped() => break,
            _ = ticker.tick() => {}
        }

        let now = inner.clock.now();
        // Staleness keeps accruing while paused
        inner.windows.evict(now);
        if inner.state.is_paused() {
            continue;
        }
        if let Some(frame) = inner.frame(now) {
            inner.visualizer.frame(&frame);
        }
    }
}

async fn autosave_loop(inner: Arc<SessionInner>) {
    let period = inner.config.autosave_period;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = inner.state.wait_stopped() => break,
            _ = ticker.tick() => {}
        }

        if inner.state.is_paused() {
            log::debug!("Paused, skipping autosave");
            continue;
        }
        inner.save_reporting().await;
    }
}
