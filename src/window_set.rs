//! A group of sliding windows fed from one sample stream
//!
//! All member windows sit behind a single mutex. A push is applied to every
//! member inside one critical section, so a reader can never observe one
//! window holding sample k+1 while another is still missing sample k.
//! Critical sections only move `Arc`s around; anything heavier (alignment,
//! statistics, serialization) runs on the copied-out snapshot.

use crate::sample::Sample;
use crate::window::{SlidingWindow, Snapshot};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct WindowSet {
    members: Mutex<Vec<Member>>,
}

#[derive(Debug)]
struct Member {
    name: String,
    window: SlidingWindow,
}

impl WindowSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member window, replacing any existing one with the same name
    pub fn with_window(self, name: impl Into<String>, window: SlidingWindow) -> Self {
        let name = name.into();
        {
            let mut members = self.lock();
            members.retain(|m| m.name != name);
            members.push(Member { name, window });
        }
        self
    }

    // Poisoning is ignored: no member is left half-updated by a panicking holder.
    fn lock(&self) -> MutexGuard<'_, Vec<Member>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push one sample into every member window
    pub fn push(&self, sample: Sample) {
        let mut members = self.lock();
        for member in members.iter_mut() {
            member.window.push(sample.clone());
        }
    }

    /// Evict aged-out samples from every member as of `now`
    pub fn evict(&self, now: f64) {
        let mut members = self.lock();
        for member in members.iter_mut() {
            member.window.evict(now);
        }
    }

    /// Chronological snapshot of one member, `None` if no such member exists
    pub fn snapshot(&self, name: &str) -> Option<Snapshot> {
        let members = self.lock();
        members
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.window.snapshot())
    }

    /// Snapshots of every member taken under the same lock acquisition
    pub fn snapshot_all(&self) -> Vec<(String, Snapshot)> {
        let members = self.lock();
        members
            .iter()
            .map(|m| (m.name.clone(), m.window.snapshot()))
            .collect()
    }

    pub fn len(&self, name: &str) -> Option<usize> {
        let members = self.lock();
        members
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.window.len())
    }

    pub fn total_pushed(&self, name: &str) -> Option<u64> {
        let members = self.lock();
        members
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.window.total_pushed())
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|m| m.name.clone()).collect()
    }
}
