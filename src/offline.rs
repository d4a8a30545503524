//! Offline clock
//!
//! A stepping clock for deterministic, faster-than-realtime runs. Nothing
//! fires until the owner advances it; every due callback then fires in
//! deadline order with `now()` pinned to its deadline.

use crate::clock::{Callback, Clock, ClockConfig, EventHandle};
use crate::error::Result;
use crate::timeline::{ClockMode, Timeline, MAX_FIRINGS_PER_ADVANCE};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// Handle to an offline timeline. Clones share the same timeline, so a
/// callback can capture a clone and schedule further events.
#[derive(Clone)]
pub struct OfflineClock(Rc<RefCell<Timeline>>);

impl OfflineClock {
    pub fn new(config: ClockConfig) -> Result<Self> {
        let tl = Timeline::new(ClockMode::Offline, &config)?;
        Ok(Self(Rc::new(RefCell::new(tl))))
    }

    /// Current logical time in seconds under the tempo map.
    pub fn now_sec(&self) -> f64 {
        self.0.borrow().now_sec()
    }

    /// Fire everything due at or before `target` beats, then park there.
    /// Returns the number of callbacks fired.
    pub fn advance_to(&mut self, target: f64) -> usize {
        let target = target.max(self.now());
        let mut fired = 0;

        loop {
            // Borrow ends before the callback runs so it can use the clock.
            let due = self.0.borrow_mut().pop_due(target);
            let Some((seq, at, callback)) = due else {
                break;
            };

            self.0.borrow_mut().set_offline_beats(at);
            trace!(seq, at, "firing");
            callback();

            fired += 1;
            if fired > MAX_FIRINGS_PER_ADVANCE {
                panic!(
                    "advance_to({}) exceeded MAX_FIRINGS_PER_ADVANCE - likely infinite scheduling",
                    target
                );
            }
        }

        self.0.borrow_mut().set_offline_beats(target);
        fired
    }

    /// Advance by `dt` beats.
    pub fn step_beats(&mut self, dt: f64) -> usize {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        let target = self.now() + dt;
        self.advance_to(target)
    }

    /// Advance by `dt` seconds of logical time.
    pub fn step_sec(&mut self, dt: f64) -> usize {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        let target = {
            let tl = self.0.borrow();
            tl.tempo.beats_at_time(tl.now_sec() + dt)
        };
        self.advance_to(target)
    }

    /// Fire every pending callback, including ones scheduled while draining.
    pub fn run_until_idle(&mut self) -> usize {
        let mut fired = 0;
        while let Some(next) = self.next_deadline() {
            fired += self.advance_to(next);
        }
        fired
    }

    pub fn next_deadline(&self) -> Option<f64> {
        self.0.borrow_mut().next_deadline()
    }

    /// Change tempo from the current position on. Pending deadlines are in
    /// beats and keep their beat position.
    pub fn set_bpm(&mut self, bpm: f64) -> Result<()> {
        self.0.borrow_mut().set_bpm(bpm)
    }

    /// Wall-clock seconds at which beat `beats` falls under the current tempo map.
    pub fn time_at_beats(&self, beats: f64) -> f64 {
        self.0.borrow().tempo.time_at_beats(beats)
    }

    pub fn pending(&self) -> usize {
        self.0.borrow().pending()
    }

    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.0.borrow().is_pending(handle)
    }

    /// Refuse further registrations and drop pending ones.
    pub fn shutdown(&mut self) -> usize {
        self.0.borrow_mut().shutdown()
    }
}

impl Clock for OfflineClock {
    fn now(&self) -> f64 {
        self.0.borrow().now_beats()
    }

    fn is_ready(&self) -> bool {
        self.0.borrow().is_open()
    }

    fn schedule_at(&mut self, at: f64, callback: Callback) -> Result<EventHandle> {
        self.0.borrow_mut().insert(at, callback)
    }

    fn cancel(&mut self, handle: EventHandle) -> bool {
        self.0.borrow_mut().cancel(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn clock() -> OfflineClock {
        OfflineClock::new(ClockConfig::default()).unwrap()
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let mut c = clock();
        let log = Rc::new(RefCell::new(Vec::new()));

        for (at, name) in [(3.0, "c"), (1.0, "a"), (2.0, "b")] {
            let log = log.clone();
            c.schedule_at(at, Box::new(move || log.borrow_mut().push(name)))
                .unwrap();
        }

        assert_eq!(c.advance_to(10.0), 3);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(c.now(), 10.0);
    }

    #[test]
    fn test_now_is_pinned_to_deadline_while_firing() {
        let mut c = clock();
        let seen = Rc::new(Cell::new(f64::NAN));

        let watch = c.clone();
        let s = seen.clone();
        c.schedule_at(2.5, Box::new(move || s.set(watch.now())))
            .unwrap();

        c.advance_to(4.0);
        assert_eq!(seen.get(), 2.5);
    }

    #[test]
    fn test_not_due_yet() {
        let mut c = clock();
        let hit = Rc::new(Cell::new(false));
        let h = hit.clone();
        c.schedule_at(5.0, Box::new(move || h.set(true))).unwrap();

        assert_eq!(c.advance_to(4.999), 0);
        assert!(!hit.get());
        assert_eq!(c.step_beats(0.001), 1);
        assert!(hit.get());
    }

    #[test]
    fn test_equal_deadlines_fire_in_submission_order() {
        let mut c = clock();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..5 {
            let log = log.clone();
            c.schedule_at(1.0, Box::new(move || log.borrow_mut().push(i)))
                .unwrap();
        }
        c.run_until_idle();
        assert_eq!(*log.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_callback_can_reschedule() {
        let mut c = clock();
        let count = Rc::new(Cell::new(0));

        fn tick(mut clock: OfflineClock, count: Rc<Cell<u32>>) {
            count.set(count.get() + 1);
            if count.get() < 4 {
                let at = clock.now() + 1.0;
                let next = clock.clone();
                let _ = clock.schedule_at(at, Box::new(move || tick(next, count)));
            }
        }

        let (cc, n) = (c.clone(), count.clone());
        c.schedule_at(0.0, Box::new(move || tick(cc, n))).unwrap();

        c.advance_to(2.0);
        assert_eq!(count.get(), 3);
        c.run_until_idle();
        assert_eq!(count.get(), 4);
        assert_eq!(c.pending(), 0);
    }

    #[test]
    fn test_cancel() {
        let mut c = clock();
        let hit = Rc::new(Cell::new(false));
        let h = hit.clone();
        let handle = c.schedule_at(1.0, Box::new(move || h.set(true))).unwrap();

        assert!(c.is_pending(handle));
        assert!(c.cancel(handle));
        assert!(!c.cancel(handle));
        c.run_until_idle();
        assert!(!hit.get());
    }

    #[test]
    fn test_past_deadline_fires_on_next_advance() {
        let mut c = clock();
        c.advance_to(8.0);
        let hit = Rc::new(Cell::new(false));
        let h = hit.clone();
        c.schedule_at(3.0, Box::new(move || h.set(true))).unwrap();

        c.step_beats(0.0);
        assert!(hit.get());
        assert_eq!(c.now(), 8.0);
    }

    #[test]
    fn test_step_sec_uses_tempo() {
        let mut c = OfflineClock::new(ClockConfig {
            bpm: 120.0,
            ..Default::default()
        })
        .unwrap();
        c.step_sec(1.5);
        assert!((c.now() - 3.0).abs() < 1e-10);
        assert!((c.now_sec() - 1.5).abs() < 1e-10);
    }

    #[test]
    fn test_tempo_change_retimes_pending_events() {
        let mut c = clock(); // 60 bpm
        c.advance_to(2.0);
        c.schedule_at(6.0, Box::new(|| {})).unwrap();
        assert!((c.time_at_beats(6.0) - 6.0).abs() < 1e-10);

        c.set_bpm(120.0).unwrap();
        // 2 s to reach beat 2, then 4 beats at 2 beats/s
        assert!((c.time_at_beats(6.0) - 4.0).abs() < 1e-10);
        assert_eq!(c.next_deadline(), Some(6.0));
    }

    #[test]
    fn test_shutdown() {
        let mut c = clock();
        c.schedule_at(1.0, Box::new(|| {})).unwrap();
        assert!(c.is_ready());
        assert_eq!(c.shutdown(), 1);
        assert!(!c.is_ready());
        assert!(c.schedule_at(2.0, Box::new(|| {})).is_err());
        assert_eq!(c.run_until_idle(), 0);
    }
}
