//! Phi Timing
//!
//! Golden-ratio event scheduling for live performance scripts:
//! - Offsets that grow by φ (cumulative gaps or direct powers)
//! - Anchoring to the next boundary of a beat grid
//! - Drift-free absolute registration with a clock (no sleep-then-act)
//! - Offline (stepping) and realtime (spin_sleep) reference clocks over a tempo map

pub mod error;
pub mod phi;
pub mod offsets;
pub mod pq;
pub mod tempo;
pub mod clock;
mod timeline;
pub mod offline;
pub mod realtime;
pub mod scheduler;


pub use clock::{Callback, Clock, ClockConfig, EventHandle};
pub use error::{PhiError, Result};
pub use offline::OfflineClock;
pub use offsets::{generate_offsets, OffsetPolicy, OffsetSeries};
pub use phi::{PHI, PHI_INV};
pub use realtime::RealtimeClock;
pub use scheduler::{
    anchor_to_grid, next_grid_boundary, schedule_series, PhiScheduler, ScheduleEntry, Scheduled,
    SchedulerConfig,
};
pub use timeline::MAX_FIRINGS_PER_ADVANCE;
