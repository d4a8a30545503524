//! Clock contract
//!
//! The scheduler only needs two things from a clock: where it is now, and a
//! way to run a one-shot callback at an absolute time. Everything about how
//! and when callbacks actually run belongs to the clock.

use crate::error::Result;

/// One-shot callback registered with a clock.
pub type Callback = Box<dyn FnOnce()>;

/// Identifies one registration with a clock, for cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventHandle(pub u64);

/// A time source that can fire callbacks at absolute times.
///
/// Times are in clock-native ticks (beats for the clocks in this crate).
pub trait Clock {
    /// Current absolute position.
    fn now(&self) -> f64;

    /// Whether the clock currently accepts registrations.
    fn is_ready(&self) -> bool {
        true
    }

    /// Run `callback` once, at or after absolute time `at`.
    fn schedule_at(&mut self, at: f64, callback: Callback) -> Result<EventHandle>;

    /// Drop a pending registration. Returns false if it already fired or
    /// was cancelled before.
    fn cancel(&mut self, handle: EventHandle) -> bool;
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn now(&self) -> f64 {
        (**self).now()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn schedule_at(&mut self, at: f64, callback: Callback) -> Result<EventHandle> {
        (**self).schedule_at(at, callback)
    }

    fn cancel(&mut self, handle: EventHandle) -> bool {
        (**self).cancel(handle)
    }
}

/// Configuration shared by the offline and realtime clocks.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClockConfig {
    /// Initial tempo.
    pub bpm: f64,
    /// Logical seconds per wall second (realtime only).
    pub rate: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            bpm: 60.0,
            rate: 1.0,
        }
    }
}
