//! crates/paraphrase_bot_core/src/rotation.rs
//!
//! The global credential rotation window: a trailing-24-hour log of
//! generation events shared by every user, driving which upstream credential
//! is active. All access is funneled through one owner (the service wraps
//! this in a single async mutex); the struct itself is plain data.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use crate::domain::ApiCredential;

/// Persistable view of the window, so restarts keep the 24-hour horizon.
#[derive(Clone, Debug, PartialEq)]
pub struct RotationSnapshot {
    pub events: Vec<DateTime<Utc>>,
    pub active_index: usize,
    pub rotation_mark: Option<DateTime<Utc>>,
    pub exhausted: bool,
}

pub struct RotationWindow {
    credentials: Vec<ApiCredential>,
    threshold: usize,
    events: VecDeque<DateTime<Utc>>,
    active_index: usize,
    /// Timestamp of the event that triggered the last rotation. Only events
    /// after it count toward the next crossing, so one crossing rotates
    /// exactly once.
    rotation_mark: Option<DateTime<Utc>>,
    exhausted: bool,
}

fn window() -> Duration {
    Duration::hours(24)
}

impl RotationWindow {
    pub fn new(credentials: Vec<ApiCredential>, threshold: usize) -> Self {
        let exhausted = credentials.is_empty();
        Self {
            credentials,
            threshold,
            events: VecDeque::new(),
            active_index: 0,
            rotation_mark: None,
            exhausted,
        }
    }

    /// Rebuilds the window from a persisted snapshot. An index past the end
    /// of the (possibly reconfigured) credential list counts as exhausted.
    pub fn restore(
        credentials: Vec<ApiCredential>,
        threshold: usize,
        snapshot: RotationSnapshot,
    ) -> Self {
        let out_of_range = snapshot.active_index >= credentials.len();
        Self {
            exhausted: snapshot.exhausted || out_of_range || credentials.is_empty(),
            active_index: if out_of_range { 0 } else { snapshot.active_index },
            events: snapshot.events.into_iter().collect(),
            rotation_mark: snapshot.rotation_mark,
            credentials,
            threshold,
        }
    }

    pub fn snapshot(&self) -> RotationSnapshot {
        RotationSnapshot {
            events: self.events.iter().copied().collect(),
            active_index: self.active_index,
            rotation_mark: self.rotation_mark,
            exhausted: self.exhausted,
        }
    }

    /// The credential generation calls should use right now, or `None` while
    /// the list is exhausted.
    pub fn current(&mut self, now: DateTime<Utc>) -> Option<ApiCredential> {
        self.evict(now);
        self.maybe_rearm(now);
        if self.exhausted {
            return None;
        }
        self.credentials.get(self.active_index).cloned()
    }

    /// Logs one successful generation and rotates if this event crossed the
    /// volume threshold. Crossing on the last credential enters the
    /// exhausted state instead of wrapping around.
    pub fn record_event(&mut self, now: DateTime<Utc>) {
        self.evict(now);
        self.events.push_back(now);
        if self.exhausted {
            return;
        }
        if self.count_since_mark() >= self.threshold {
            if self.active_index + 1 < self.credentials.len() {
                self.active_index += 1;
            } else {
                self.exhausted = true;
            }
            self.rotation_mark = Some(now);
        }
    }

    /// Number of events within the trailing 24 hours.
    pub fn in_window_count(&mut self, now: DateTime<Utc>) -> usize {
        self.evict(now);
        self.events.len()
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    fn evict(&mut self, now: DateTime<Utc>) {
        let horizon = now - window();
        while matches!(self.events.front(), Some(ts) if *ts <= horizon) {
            self.events.pop_front();
        }
    }

    fn count_since_mark(&self) -> usize {
        match self.rotation_mark {
            None => self.events.len(),
            Some(mark) => self.events.iter().rev().take_while(|ts| **ts > mark).count(),
        }
    }

    /// After exhaustion, a new cycle begins once the trailing window has
    /// drained below the threshold; the list re-arms at the first
    /// credential. Until then exhaustion is a hard stop.
    fn maybe_rearm(&mut self, now: DateTime<Utc>) {
        if self.exhausted && !self.credentials.is_empty() && self.events.len() < self.threshold {
            self.exhausted = false;
            self.active_index = 0;
            self.rotation_mark = Some(now);
        }
    }
}
