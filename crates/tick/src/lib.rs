//! Tick scheduling: fixed-rate loop, running flag and TPS history.
//!
//! # Invariants
//! - The loop never sleeps a non-positive duration.
//! - The TPS history holds at most 640 samples, oldest evicted first.
//! - An interrupted sleep never stops the loop; only the running flag does.

mod history;
mod scheduler;

pub use history::{TPS_HISTORY_CAPACITY, TpsHistory};
pub use scheduler::{
    MIN_SLEEP, PRESENTATION_TICK_PERIOD, RunningFlag, SERVER_TICK_PERIOD, SchedulerStats, TickScheduler, tps_for,
};
