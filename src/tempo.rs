//! Tempo Map - stepwise BPM over time
//!
//! Converts between seconds and beats when the tempo changes at arbitrary
//! points. Each change starts a new constant-BPM segment; later segments are
//! discarded.

use crate::error::{require_positive, Result};

#[derive(Clone, Copy, Debug)]
struct TempoSegment {
    t0: f64,     // start time (sec)
    beats0: f64, // cumulative beats at t0
    bpm: f64,
}

impl TempoSegment {
    fn beats_at(&self, t: f64) -> f64 {
        self.beats0 + (t - self.t0).max(0.0) * self.bpm / 60.0
    }

    fn time_at(&self, beats: f64) -> f64 {
        self.t0 + (beats - self.beats0).max(0.0) * 60.0 / self.bpm
    }
}

/// Piecewise-constant tempo, starting at t = 0 with beat 0.
#[derive(Clone, Debug)]
pub struct TempoMap {
    /// Bumped on every tempo change.
    pub version: u64,
    segs: Vec<TempoSegment>,
}

impl TempoMap {
    pub fn new(bpm: f64) -> Result<Self> {
        let bpm = require_positive("bpm", bpm)?;
        Ok(Self {
            version: 0,
            segs: vec![TempoSegment {
                t0: 0.0,
                beats0: 0.0,
                bpm,
            }],
        })
    }

    pub fn bpm_at_time(&self, t: f64) -> f64 {
        self.segment_at_time(t).bpm
    }

    pub fn beats_at_time(&self, t: f64) -> f64 {
        if !t.is_finite() {
            return t;
        }
        self.segment_at_time(t).beats_at(t)
    }

    pub fn time_at_beats(&self, beats: f64) -> f64 {
        if !beats.is_finite() {
            return beats;
        }
        let i = self
            .segs
            .partition_point(|s| s.beats0 <= beats)
            .saturating_sub(1);
        self.segs[i].time_at(beats)
    }

    /// Change the tempo from time `t` onward. Segments starting at or after
    /// `t` are dropped.
    pub fn set_bpm_at_time(&mut self, bpm: f64, t: f64) -> Result<()> {
        let bpm = require_positive("bpm", bpm)?;
        let t = t.max(0.0);
        let beats0 = self.beats_at_time(t);

        let keep = self.segs.partition_point(|s| s.t0 < t);
        self.segs.truncate(keep);
        self.segs.push(TempoSegment { t0: t, beats0, bpm });

        self.version += 1;
        Ok(())
    }

    /// Change the tempo from beat `beats` onward.
    pub fn set_bpm_at_beat(&mut self, bpm: f64, beats: f64) -> Result<()> {
        let t = self.time_at_beats(beats.max(0.0));
        self.set_bpm_at_time(bpm, t)
    }

    fn segment_at_time(&self, t: f64) -> &TempoSegment {
        let i = self.segs.partition_point(|s| s.t0 <= t).saturating_sub(1);
        &self.segs[i]
    }
}
