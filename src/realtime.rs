//! Realtime clock
//!
//! Wall-clock driven: `now()` is derived from `Instant` through the rate
//! multiplier and the tempo map, and the run loops sleep with `spin_sleep`
//! until the next deadline. Deadlines are absolute, so a late firing never
//! delays the ones after it.

use crate::clock::{Callback, Clock, ClockConfig, EventHandle};
use crate::error::Result;
use crate::timeline::{ClockMode, Timeline, MAX_FIRINGS_PER_ADVANCE};
use spin_sleep::SpinSleeper;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::trace;

/// Longest single sleep. Far deadlines are reached in slices, re-checking
/// the stop condition and the tempo in between.
const MAX_SLEEP: Duration = Duration::from_millis(100);

/// Handle to a realtime timeline. Clones share the same timeline.
#[derive(Clone)]
pub struct RealtimeClock {
    inner: Rc<RefCell<Timeline>>,
    sleeper: SpinSleeper,
}

impl RealtimeClock {
    pub fn new(config: ClockConfig) -> Result<Self> {
        let tl = Timeline::new(ClockMode::Realtime, &config)?;
        Ok(Self {
            inner: Rc::new(RefCell::new(tl)),
            sleeper: SpinSleeper::default(),
        })
    }

    pub fn now_sec(&self) -> f64 {
        self.inner.borrow().now_sec()
    }

    pub fn set_bpm(&mut self, bpm: f64) -> Result<()> {
        self.inner.borrow_mut().set_bpm(bpm)
    }

    pub fn rate(&self) -> f64 {
        self.inner.borrow().rate()
    }

    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        self.inner.borrow_mut().set_rate(rate)
    }

    pub fn pending(&self) -> usize {
        self.inner.borrow().pending()
    }

    pub fn shutdown(&mut self) -> usize {
        self.inner.borrow_mut().shutdown()
    }

    /// Fire every callback whose deadline has passed. Returns how many fired.
    pub fn fire_due(&mut self) -> usize {
        let mut fired = 0;
        loop {
            let now = self.now();
            let due = self.inner.borrow_mut().pop_due(now);
            let Some((seq, at, callback)) = due else {
                break;
            };
            trace!(seq, at, late_by = now - at, "firing");
            callback();

            fired += 1;
            if fired > MAX_FIRINGS_PER_ADVANCE {
                panic!(
                    "fire_due() exceeded MAX_FIRINGS_PER_ADVANCE at beat {} - likely infinite scheduling",
                    now
                );
            }
        }
        fired
    }

    /// Run until nothing is pending.
    pub fn run_until_idle(&mut self) -> usize {
        self.run_until(|| false)
    }

    /// Run until `is_done` returns true or nothing is pending.
    pub fn run_until<F>(&mut self, is_done: F) -> usize
    where
        F: Fn() -> bool,
    {
        let mut fired = 0;
        loop {
            fired += self.fire_due();

            if is_done() {
                break;
            }

            let next = self.inner.borrow_mut().next_deadline();
            let Some(next_beat) = next else {
                break;
            };

            let wait = self.wall_until(next_beat);
            if wait > Duration::ZERO {
                self.sleeper.sleep(wait);
            }
        }
        fired
    }

    /// Wall time until beat `beat` under the current tempo and rate, capped
    /// at `MAX_SLEEP`.
    fn wall_until(&self, beat: f64) -> Duration {
        let tl = self.inner.borrow();
        let dt_logical = tl.tempo.time_at_beats(beat) - tl.now_sec();
        let dt_wall = (dt_logical / tl.rate()).max(0.0);
        Duration::try_from_secs_f64(dt_wall)
            .unwrap_or(MAX_SLEEP)
            .min(MAX_SLEEP)
    }
}

impl Clock for RealtimeClock {
    fn now(&self) -> f64 {
        self.inner.borrow().now_beats()
    }

    fn is_ready(&self) -> bool {
        self.inner.borrow().is_open()
    }

    fn schedule_at(&mut self, at: f64, callback: Callback) -> Result<EventHandle> {
        self.inner.borrow_mut().insert(at, callback)
    }

    fn cancel(&mut self, handle: EventHandle) -> bool {
        self.inner.borrow_mut().cancel(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Speed multiplier so a beat at 60 bpm takes 10 ms of wall time.
    const FAST: ClockConfig = ClockConfig {
        bpm: 60.0,
        rate: 100.0,
    };

    #[test]
    fn test_fires_in_order() {
        let mut c = RealtimeClock::new(FAST).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));

        for (at, name) in [(0.3, "c"), (0.1, "a"), (0.2, "b")] {
            let log = log.clone();
            c.schedule_at(at, Box::new(move || log.borrow_mut().push(name)))
                .unwrap();
        }

        assert_eq!(c.run_until_idle(), 3);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert!(c.now() >= 0.3);
    }

    #[test]
    fn test_fires_no_earlier_than_deadline() {
        let mut c = RealtimeClock::new(FAST).unwrap();
        let seen = Rc::new(Cell::new(0.0));

        let watch = c.clone();
        let s = seen.clone();
        c.schedule_at(0.5, Box::new(move || s.set(watch.now())))
            .unwrap();

        c.run_until_idle();
        assert!(seen.get() >= 0.5);
    }

    #[test]
    fn test_run_until_stops_early() {
        let mut c = RealtimeClock::new(FAST).unwrap();
        let hit = Rc::new(Cell::new(0));
        for at in [0.1, 50.0] {
            let h = hit.clone();
            c.schedule_at(at, Box::new(move || h.set(h.get() + 1)))
                .unwrap();
        }

        let h = hit.clone();
        c.run_until(move || h.get() >= 1);
        assert_eq!(hit.get(), 1);
        assert_eq!(c.pending(), 1);
    }

    #[test]
    fn test_far_deadline_sleeps_in_slices() {
        let mut c = RealtimeClock::new(FAST).unwrap();
        assert_eq!(c.wall_until(1e20), MAX_SLEEP);
        assert_eq!(c.wall_until(f64::MAX), MAX_SLEEP);

        // Only a far deadline pending: the loop wakes each slice to poll
        c.schedule_at(1e20, Box::new(|| {})).unwrap();
        let polls = Cell::new(0);
        let fired = c.run_until(|| {
            polls.set(polls.get() + 1);
            polls.get() >= 3
        });
        assert_eq!(fired, 0);
        assert_eq!(polls.get(), 3);
        assert_eq!(c.pending(), 1);
    }

    #[test]
    #[should_panic(expected = "MAX_FIRINGS_PER_ADVANCE")]
    fn test_self_rescheduling_at_now_is_caught() {
        fn again(mut clock: RealtimeClock) {
            let at = clock.now();
            let next = clock.clone();
            let _ = clock.schedule_at(at, Box::new(move || again(next)));
        }

        let mut c = RealtimeClock::new(FAST).unwrap();
        let start = c.clone();
        c.schedule_at(0.0, Box::new(move || again(start))).unwrap();
        c.fire_due();
    }

    #[test]
    fn test_set_rate() {
        let mut c = RealtimeClock::new(ClockConfig::default()).unwrap();
        assert_eq!(c.rate(), 1.0);
        c.set_rate(4.0).unwrap();
        assert_eq!(c.rate(), 4.0);
        assert!(c.set_rate(0.0).is_err());
    }
}
