//! Timeline
//!
//! Shared core of the offline and realtime clocks: a deadline queue of
//! callbacks keyed in beats, a tempo map, and the notion of "now" for the
//! chosen mode. Deadlines are stored in beats, so a tempo change retimes
//! every pending callback without touching the queue.

use crate::clock::{Callback, ClockConfig, EventHandle};
use crate::error::{require_finite, require_positive, PhiError, Result};
use crate::pq::DeadlineQueue;
use crate::tempo::TempoMap;
use std::time::Instant;
use tracing::{trace, warn};

/// Clock execution mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ClockMode {
    Realtime,
    Offline,
}

/// Upper bound on callbacks fired by one `fire_due` call. Hitting it means a
/// callback keeps rescheduling itself at or before the target.
pub const MAX_FIRINGS_PER_ADVANCE: usize = 200_000;

pub(crate) struct Timeline {
    pub mode: ClockMode,

    /// Deterministic submission counter, doubles as the handle id.
    seq: u64,

    queue: DeadlineQueue<Callback>,
    pub tempo: TempoMap,

    /// False after shutdown.
    open: bool,

    /// Offline position in beats.
    offline_beats: f64,

    /// Time dilation anchors (realtime only).
    rate: f64,
    wall_anchor: Instant,
    logical_anchor: f64,
}

impl Timeline {
    pub fn new(mode: ClockMode, config: &ClockConfig) -> Result<Self> {
        let rate = require_positive("rate", config.rate)?;
        Ok(Self {
            mode,
            seq: 0,
            queue: DeadlineQueue::new(),
            tempo: TempoMap::new(config.bpm)?,
            open: true,
            offline_beats: 0.0,
            rate,
            wall_anchor: Instant::now(),
            logical_anchor: 0.0,
        })
    }

    /// Current logical time in seconds.
    pub fn now_sec(&self) -> f64 {
        match self.mode {
            ClockMode::Offline => self.tempo.time_at_beats(self.offline_beats),
            ClockMode::Realtime => {
                let dt = self.wall_anchor.elapsed().as_secs_f64();
                self.logical_anchor + dt * self.rate
            }
        }
    }

    /// Current position in beats.
    pub fn now_beats(&self) -> f64 {
        match self.mode {
            ClockMode::Offline => self.offline_beats,
            ClockMode::Realtime => self.tempo.beats_at_time(self.now_sec()),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Change the time dilation rate (realtime only), re-anchoring so the
    /// logical clock stays continuous.
    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        let rate = require_positive("rate", rate)?;
        if self.mode == ClockMode::Offline {
            return Ok(());
        }
        self.logical_anchor = self.now_sec();
        self.wall_anchor = Instant::now();
        self.rate = rate;
        Ok(())
    }

    /// Change tempo from the current position on.
    pub fn set_bpm(&mut self, bpm: f64) -> Result<()> {
        let t = self.now_sec();
        self.tempo.set_bpm_at_time(bpm, t)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn insert(&mut self, at: f64, callback: Callback) -> Result<EventHandle> {
        if !self.open {
            return Err(PhiError::ClockUnavailable("clock has been shut down".into()));
        }
        let at = require_finite("at", at)?;
        let seq = self.seq;
        self.seq += 1;
        self.queue.push(seq, at, callback);
        trace!(seq, at, "registered callback");
        Ok(EventHandle(seq))
    }

    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        let removed = self.queue.remove(handle.0).is_some();
        if removed {
            trace!(seq = handle.0, "cancelled callback");
        }
        removed
    }

    /// Close the timeline and drop everything still pending.
    pub fn shutdown(&mut self) -> usize {
        self.open = false;
        let dropped = self.queue.clear();
        if dropped > 0 {
            warn!(dropped, "clock shut down with pending callbacks");
        }
        dropped
    }

    pub fn next_deadline(&mut self) -> Option<f64> {
        self.queue.peek_deadline()
    }

    pub fn pop_due(&mut self, limit: f64) -> Option<(u64, f64, Callback)> {
        self.queue.pop_due(limit)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.queue.contains(handle.0)
    }

    /// Offline clocks never move backwards.
    pub fn set_offline_beats(&mut self, beats: f64) {
        if beats > self.offline_beats {
            self.offline_beats = beats;
        }
    }
}
