//! Phi Scheduler
//!
//! Turns a list of event identifiers into absolute-time callback requests:
//! golden-ratio offsets, anchored at the next grid boundary, registered all
//! at once with a clock. Nothing here waits; firing is the clock's job, and
//! because every deadline is computed up front a late firing never shifts
//! the ones after it.

use crate::clock::{Clock, EventHandle};
use crate::error::{require_finite, require_positive, PhiError, Result};
use crate::offsets::{generate_offsets, OffsetPolicy, OffsetSeries};
use std::rc::Rc;
use tracing::{debug, trace};

/// Configuration for a [`PhiScheduler`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SchedulerConfig {
    /// Base duration in clock ticks.
    pub base: f64,
    pub policy: OffsetPolicy,
    /// Grid spacing the series is anchored to (4 = one bar of 4/4 in beats).
    pub grid_unit: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base: 1.0,
            policy: OffsetPolicy::CumulativeIntervals,
            grid_unit: 4.0,
        }
    }
}

/// An (absolute time, identifier) pair ready to hand to a clock.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduleEntry<I> {
    pub at: f64,
    pub id: I,
}

/// One registration made by [`schedule_series`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scheduled {
    pub at: f64,
    pub handle: EventHandle,
}

/// Smallest multiple of `grid_unit` strictly greater than `position`.
///
/// A position exactly on a boundary advances to the next one, so the result
/// is never in the past.
pub fn next_grid_boundary(grid_unit: f64, position: f64) -> Result<f64> {
    let g = require_positive("grid_unit", grid_unit)?;
    let position = require_finite("position", position)?;

    let mut anchor = ((position / g).floor() + 1.0) * g;
    // Division can round a value just below a boundary up onto it.
    if anchor <= position {
        anchor += g;
    }
    // Past 2^53 grid steps, adding g no longer moves the value.
    if anchor <= position {
        return Err(PhiError::invalid(
            "position",
            format!("{position} is too large to resolve a grid of {g}"),
        ));
    }
    Ok(anchor)
}

/// Next grid boundary after the clock's current position.
pub fn anchor_to_grid<C>(grid_unit: f64, clock: &C) -> Result<f64>
where
    C: Clock + ?Sized,
{
    let now = clock.now();
    let anchor = next_grid_boundary(grid_unit, now)?;
    debug!(grid_unit, now, anchor, "anchored to grid");
    Ok(anchor)
}

/// Pair offsets with identifiers at `anchor + offset`.
///
/// Validates everything before building anything.
pub fn build_entries<I>(
    anchor: f64,
    offsets: &[f64],
    identifiers: Vec<I>,
) -> Result<Vec<ScheduleEntry<I>>> {
    if offsets.len() != identifiers.len() {
        return Err(PhiError::LengthMismatch {
            offsets: offsets.len(),
            identifiers: identifiers.len(),
        });
    }
    let anchor = require_finite("anchor", anchor)?;
    for &off in offsets {
        require_finite("offset", off)?;
    }

    Ok(offsets
        .iter()
        .zip(identifiers)
        .map(|(&off, id)| ScheduleEntry {
            at: anchor + off,
            id,
        })
        .collect())
}

/// Register `on_fire(id)` with `clock` at `anchor + offset` for each pair.
///
/// Returns immediately after registering. On a validation error (length
/// mismatch, clock not ready, non-finite times) nothing is registered. A
/// failure from the clock part-way through is returned as-is; earlier
/// registrations stay with the clock.
pub fn schedule_series<C, I, F>(
    anchor: f64,
    offsets: &[f64],
    identifiers: Vec<I>,
    clock: &mut C,
    on_fire: F,
) -> Result<Vec<Scheduled>>
where
    C: Clock + ?Sized,
    I: 'static,
    F: Fn(I) + 'static,
{
    let entries = build_entries(anchor, offsets, identifiers)?;
    if !clock.is_ready() {
        return Err(PhiError::ClockUnavailable(
            "clock is not accepting registrations".into(),
        ));
    }

    debug!(anchor, count = entries.len(), "registering series");

    let on_fire = Rc::new(on_fire);
    let mut scheduled = Vec::with_capacity(entries.len());
    for ScheduleEntry { at, id } in entries {
        let sink = Rc::clone(&on_fire);
        let handle = clock.schedule_at(at, Box::new(move || (*sink)(id)))?;
        trace!(at, handle = handle.0, "registered");
        scheduled.push(Scheduled { at, handle });
    }
    Ok(scheduled)
}

/// Golden-ratio scheduler. Holds configuration only; each call is independent.
#[derive(Clone, Debug)]
pub struct PhiScheduler {
    config: SchedulerConfig,
}

impl PhiScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        require_positive("base", config.base)?;
        require_positive("grid_unit", config.grid_unit)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn generate_offsets(&self, count: usize) -> Result<OffsetSeries> {
        generate_offsets(self.config.base, count, self.config.policy)
    }

    pub fn anchor<C: Clock + ?Sized>(&self, clock: &C) -> Result<f64> {
        anchor_to_grid(self.config.grid_unit, clock)
    }

    /// Absolute times `schedule` would use for `count` events if the clock
    /// were at `now`. Registers nothing.
    pub fn plan(&self, count: usize, now: f64) -> Result<Vec<f64>> {
        let offsets = self.generate_offsets(count)?;
        let anchor = next_grid_boundary(self.config.grid_unit, now)?;
        Ok(offsets.into_iter().map(|off| anchor + off).collect())
    }

    /// Generate, anchor and register one event per identifier.
    pub fn schedule<C, I, F>(
        &self,
        identifiers: impl IntoIterator<Item = I>,
        clock: &mut C,
        on_fire: F,
    ) -> Result<Vec<Scheduled>>
    where
        C: Clock + ?Sized,
        I: 'static,
        F: Fn(I) + 'static,
    {
        let identifiers: Vec<I> = identifiers.into_iter().collect();
        let offsets = self.generate_offsets(identifiers.len())?;
        let anchor = self.anchor(&*clock)?;
        schedule_series(anchor, offsets.as_slice(), identifiers, clock, on_fire)
    }
}
