use crate::history::TpsHistory;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Target period of the authoritative server loop.
pub const SERVER_TICK_PERIOD: Duration = Duration::from_millis(25);
/// Target period for presentation-only loops (monitors, dashboards).
pub const PRESENTATION_TICK_PERIOD: Duration = Duration::from_millis(100);
/// Sleep used when a step overran its period. Never sleep zero or less.
pub const MIN_SLEEP: Duration = Duration::from_millis(2);

#[derive(Debug, Default)]
struct FlagState {
    running: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Shared running/stopped lifecycle flag.
///
/// Cloning shares the flag. `stop` and `interrupt` wake a loop that is
/// currently sleeping between ticks.
#[derive(Debug, Clone, Default)]
pub struct RunningFlag {
    state: Arc<FlagState>,
}

impl RunningFlag {
    /// A flag in the running state.
    pub fn new() -> Self {
        let flag = Self::default();
        flag.state.running.store(true, Ordering::SeqCst);
        flag
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.state.running.store(false, Ordering::SeqCst);
        let _guard = self.state.lock.lock();
        self.state.wake.notify_all();
    }

    /// Cut the current sleep short without stopping.
    pub fn interrupt(&self) {
        let _guard = self.state.lock.lock();
        self.state.wake.notify_all();
    }

    /// Sleep up to `duration`. Returns `true` when woken early.
    fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut guard = self.state.lock.lock();
        if !self.is_running() {
            return true;
        }
        !self.state.wake.wait_until(&mut guard, deadline).timed_out()
    }
}

/// Counters for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub late_ticks: u64,
    pub interrupted_sleeps: u64,
    pub current_tps: u32,
}

/// Fixed-rate loop driver.
///
/// Every iteration runs the step, sleeps for the rest of the period (or
/// [`MIN_SLEEP`] after an overrun), then records `1 / actual_period` as
/// whole ticks per second.
#[derive(Debug)]
pub struct TickScheduler {
    period: Duration,
    running: RunningFlag,
    history: Arc<TpsHistory>,
    current_tps: AtomicU32,
    ticks: AtomicU64,
    late_ticks: AtomicU64,
    interrupted_sleeps: AtomicU64,
}

impl TickScheduler {
    pub fn new(period: Duration, running: RunningFlag) -> Self {
        Self {
            period,
            running,
            history: Arc::new(TpsHistory::new()),
            current_tps: AtomicU32::new(0),
            ticks: AtomicU64::new(0),
            late_ticks: AtomicU64::new(0),
            interrupted_sleeps: AtomicU64::new(0),
        }
    }

    pub fn server(running: RunningFlag) -> Self {
        Self::new(SERVER_TICK_PERIOD, running)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn running(&self) -> &RunningFlag {
        &self.running
    }

    pub fn stop(&self) {
        self.running.stop();
    }

    /// Shared handle to the TPS history for monitor threads.
    pub fn history(&self) -> Arc<TpsHistory> {
        self.history.clone()
    }

    pub fn current_tps(&self) -> u32 {
        self.current_tps.load(Ordering::Relaxed)
    }

    pub fn late_ticks(&self) -> u64 {
        self.late_ticks.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            late_ticks: self.late_ticks(),
            interrupted_sleeps: self.interrupted_sleeps.load(Ordering::Relaxed),
            current_tps: self.current_tps(),
        }
    }

    /// Run `step` until the running flag is cleared.
    pub fn run(&self, mut step: impl FnMut()) {
        tracing::info!(period_ms = self.period.as_millis() as u64, "tick loop started");
        while self.running.is_running() {
            self.run_once(&mut step);
        }
        tracing::info!(ticks = self.ticks.load(Ordering::Relaxed), "tick loop stopped");
    }

    /// One iteration: step, sleep, measure.
    pub fn run_once(&self, step: &mut impl FnMut()) {
        let start = Instant::now();
        step();
        let elapsed = start.elapsed();

        let sleep = match self.period.checked_sub(elapsed) {
            Some(rest) if !rest.is_zero() => rest,
            _ => {
                self.late_ticks.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "tick overran its period");
                MIN_SLEEP
            }
        };
        if self.running.sleep(sleep) && self.running.is_running() {
            self.interrupted_sleeps.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("tick sleep interrupted");
        }

        let actual = start.elapsed();
        let tps = tps_for(actual);
        self.current_tps.store(tps, Ordering::Relaxed);
        self.history.push(tps);
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }
}

/// Whole ticks per second for one iteration of length `period`.
pub fn tps_for(period: Duration) -> u32 {
    let micros = period.as_micros().max(1);
    (1_000_000 / micros).min(u32::MAX as u128) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tps_from_period() {
        assert_eq!(tps_for(SERVER_TICK_PERIOD), 40);
        assert_eq!(tps_for(PRESENTATION_TICK_PERIOD), 10);
        assert_eq!(tps_for(Duration::from_millis(30)), 33);
        assert_eq!(tps_for(Duration::ZERO), 1_000_000);
    }

    #[test]
    fn flag_lifecycle() {
        let flag = RunningFlag::new();
        let shared = flag.clone();
        assert!(flag.is_running());
        shared.stop();
        assert!(!flag.is_running());
        assert!(!RunningFlag::default().is_running());
    }

    #[test]
    fn overrun_sleeps_minimum_and_counts_late() {
        let scheduler = TickScheduler::new(Duration::from_millis(1), RunningFlag::new());
        let mut step = || std::thread::sleep(Duration::from_millis(3));
        let start = Instant::now();
        scheduler.run_once(&mut step);
        assert!(start.elapsed() >= Duration::from_millis(3) + MIN_SLEEP);
        assert_eq!(scheduler.late_ticks(), 1);
        assert_eq!(scheduler.history().len(), 1);
        assert!(scheduler.current_tps() <= 200);
    }

    #[test]
    fn run_stops_when_flag_cleared() {
        let scheduler = TickScheduler::new(Duration::from_millis(1), RunningFlag::new());
        let mut count = 0;
        scheduler.run(|| {
            count += 1;
            if count == 5 {
                scheduler.stop();
            }
        });
        assert_eq!(count, 5);
        let stats = scheduler.stats();
        assert_eq!(stats.ticks, 5);
        assert_eq!(scheduler.history().snapshot().len(), 5);
    }

    #[test]
    fn stop_wakes_a_sleeping_loop() {
        let running = RunningFlag::new();
        let scheduler = Arc::new(TickScheduler::new(Duration::from_secs(30), running.clone()));
        let worker = {
            let scheduler = scheduler.clone();
            std::thread::spawn(move || scheduler.run(|| {}))
        };
        std::thread::sleep(Duration::from_millis(50));
        let start = Instant::now();
        running.stop();
        worker.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(scheduler.stats().interrupted_sleeps, 0);
    }

    #[test]
    fn interrupt_shortens_sleep_without_stopping() {
        let running = RunningFlag::new();
        let scheduler = Arc::new(TickScheduler::new(Duration::from_secs(30), running.clone()));
        let worker = {
            let scheduler = scheduler.clone();
            std::thread::spawn(move || {
                let mut step = || {};
                scheduler.run_once(&mut step);
            })
        };
        while !worker.is_finished() {
            std::thread::sleep(Duration::from_millis(10));
            running.interrupt();
        }
        worker.join().unwrap();
        assert!(running.is_running());
        assert_eq!(scheduler.stats().interrupted_sleeps, 1);
        assert_eq!(scheduler.stats().ticks, 1);
    }
}
