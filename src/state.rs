//! Session lifecycle state shared by every running task
//!
//! `Idle → Running → Paused ⇄ Running → Stopped`. The phase lives in a
//! `tokio::sync::watch` channel so tasks can await a transition (resume,
//! stop) instead of polling a flag.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Running => "running",
            Phase::Paused => "paused",
            Phase::Stopped => "stopped",
        }
    }
}

#[derive(Debug)]
pub struct SessionState {
    tx: watch::Sender<Phase>,
}

impl SessionState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Phase::Idle);
        Self { tx }
    }

    pub fn phase(&self) -> Phase {
        *self.tx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.phase() == Phase::Running
    }

    pub fn is_paused(&self) -> bool {
        self.phase() == Phase::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.phase() == Phase::Stopped
    }

    /// Apply `from → to` if the current phase is one of `from`
    fn transition(&self, from: &[Phase], to: Phase) -> bool {
        self.tx.send_if_modified(|phase| {
            if from.contains(phase) {
                *phase = to;
                true
            } else {
                false
            }
        })
    }

    pub fn start(&self) -> bool {
        self.transition(&[Phase::Idle], Phase::Running)
    }

    pub fn pause(&self) -> bool {
        self.transition(&[Phase::Running], Phase::Paused)
    }

    pub fn resume(&self) -> bool {
        self.transition(&[Phase::Paused], Phase::Running)
    }

    /// Flip between running and paused; returns the resulting phase
    pub fn toggle_pause(&self) -> Phase {
        if !self.pause() {
            self.resume();
        }
        self.phase()
    }

    /// Terminal; returns `false` if already stopped
    pub fn stop(&self) -> bool {
        self.transition(&[Phase::Idle, Phase::Running, Phase::Paused], Phase::Stopped)
    }

    /// Wait until the session runs; `false` once it has stopped
    ///
    /// Returns immediately when already running.
    pub async fn wait_until_running(&self) -> bool {
        let mut rx = self.tx.subscribe();
        match rx
            .wait_for(|p| matches!(p, Phase::Running | Phase::Stopped))
            .await
        {
            Ok(phase) => *phase == Phase::Running,
            Err(_) => false,
        }
    }

    /// Resolve once the session has stopped
    pub async fn wait_stopped(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|p| *p == Phase::Stopped).await;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
