//! The cyclic executive: a deterministic scheduler loop that runs
//! registered actions on a rate-monotonic major/minor frame.
//!
//! ## RT Setup Sequence
//! 1. Pre-allocate all runtime state (zero heap in loop).
//! 2. `mlockall(MCL_CURRENT | MCL_FUTURE)` — lock all pages.
//! 3. Prefault stack pages.
//! 4. `sched_setaffinity` — pin to isolated CPU core.
//! 5. `sched_setscheduler(SCHED_FIFO, priority)` — RT priority.
//!
//! ## Cycle Loop
//! Absolute-time sleep on `CLOCK_MONOTONIC` for drift-free pacing —
//! there is no catch-up. An overrun is recorded in [`CycleStats::overruns`]
//! and logged; it never aborts the loop, in either `rt` or simulation mode.

use crate::schedule::ScheduleParams;
use tracing::{debug, warn};

/// O(1) per-cycle timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration \[ns\].
    pub last_cycle_ns: i64,
    /// Minimum cycle duration \[ns\].
    pub min_cycle_ns: i64,
    /// Maximum cycle duration \[ns\].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Running sum of squares for stddev computation.
    pub sum_sq_cycle_ns: i128,
    /// Number of overruns detected.
    pub overruns: u64,
    /// Maximum wake-up latency \[ns\] (time between expected and actual wake).
    pub max_latency_ns: i64,
}

impl CycleStats {
    /// Create a new zeroed stats instance.
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            sum_sq_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        if duration_ns < self.min_cycle_ns {
            self.min_cycle_ns = duration_ns;
        }
        if duration_ns > self.max_cycle_ns {
            self.max_cycle_ns = duration_ns;
        }
        self.sum_cycle_ns += duration_ns;
        self.sum_sq_cycle_ns += (duration_ns as i128) * (duration_ns as i128);
        if latency_ns > self.max_latency_ns {
            self.max_latency_ns = latency_ns;
        }
    }

    /// Average cycle time \[ns\] (returns 0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Context handed to a registered action on the slot it runs in.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext {
    /// The minor-cycle slot this invocation runs in, 0-indexed.
    pub slot: u64,
    /// Monotonic timestamp at the start of this cycle, in nanoseconds.
    pub cycle_start_ns: i64,
    /// Cumulative overrun count as of the start of this cycle.
    pub overruns: u64,
}

/// A unit of work scheduled on the cyclic executive.
struct RegisteredAction {
    name: &'static str,
    period_ms: u64,
    callback: Box<dyn FnMut(&ActionContext) + Send>,
}

/// Errors during RT setup or cycle execution.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// An RT system call failed during setup.
    #[error("RT setup error: {0}")]
    RtSetup(String),

    /// The schedule could not be derived from the registered periods.
    #[error("schedule error: {0}")]
    Schedule(#[from] crate::schedule::ScheduleError),

    /// A cycle overran its budget. Carried as a value at the point the
    /// RT loop aborts; the simulation loop only records it in stats.
    #[error("cycle overrun: {actual_ns}ns > {budget_ns}ns budget")]
    CycleOverrun {
        /// Actual cycle duration \[ns\].
        actual_ns: i64,
        /// Configured minor-cycle budget \[ns\].
        budget_ns: i64,
    },
}

/// Lock all current and future memory pages (prevent page faults in RT loop).
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Prefault stack pages to prevent page faults during RT execution.
fn prefault_stack() {
    let mut buf = [0u8; 1024 * 1024];
    for byte in buf.iter_mut() {
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

/// Pin the current thread to a specific CPU core.
#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

/// Set SCHED_FIFO with the given RT priority.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Perform the full RT setup sequence. Must be called before entering
/// the cycle loop. In simulation mode (no `rt` feature), all RT calls
/// are no-ops.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

/// The cyclic executive: owns the schedule and the registered actions,
/// and drives them on a minor-cycle tick.
pub struct CyclicExecutive {
    schedule: ScheduleParams,
    actions: Vec<RegisteredAction>,
    stats: CycleStats,
    minor_cycle_ns: i64,
    slot: u64,
}

impl CyclicExecutive {
    /// Build an executive with no actions registered yet. Call
    /// [`Self::register_action`] before [`Self::run`].
    pub fn new(periods_ms: &[u64]) -> Result<Self, CycleError> {
        let schedule = ScheduleParams::calculate(periods_ms)?;
        Ok(Self {
            schedule,
            actions: Vec::new(),
            stats: CycleStats::new(),
            minor_cycle_ns: schedule.minor_cycle_ms as i64 * 1_000_000,
            slot: 0,
        })
    }

    /// The derived schedule parameters.
    pub fn schedule(&self) -> ScheduleParams {
        self.schedule
    }

    /// Cycle statistics accumulated so far.
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Register an action to run every time its period elapses. The
    /// period must be a period this executive was built with (and thus
    /// a multiple of the minor cycle).
    pub fn register_action(
        &mut self,
        name: &'static str,
        period_ms: u64,
        callback: impl FnMut(&ActionContext) + Send + 'static,
    ) {
        self.actions.push(RegisteredAction {
            name,
            period_ms,
            callback: Box::new(callback),
        });
    }

    fn tick(&mut self, cycle_start_ns: i64) {
        let ctx = ActionContext {
            slot: self.slot,
            cycle_start_ns,
            overruns: self.stats.overruns,
        };
        for action in &mut self.actions {
            if self.schedule.action_due(action.period_ms, self.slot) {
                debug!(action = action.name, slot = self.slot, "dispatching action");
                (action.callback)(&ctx);
            }
        }
        debug!(slot = self.slot, "cycle tick complete");
        self.slot = (self.slot + 1) % self.schedule.num_slots;
    }

    /// Enter the deterministic cycle loop. Never returns under normal
    /// operation; overruns are recorded in [`CycleStats::overruns`] and
    /// logged, not propagated as an error.
    ///
    /// # Errors
    /// Only returns an error if a clock syscall itself fails, in which
    /// case the loop cannot continue at all.
    pub fn run(&mut self) -> Result<(), CycleError> {
        #[cfg(feature = "rt")]
        {
            self.run_rt_loop()
        }

        #[cfg(not(feature = "rt"))]
        {
            self.run_sim_loop()
        }
    }

    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self) -> Result<(), CycleError> {
        use nix::sys::time::TimeSpec;
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let mut next_wake = clock_gettime(clock)
            .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;

        loop {
            next_wake = timespec_add_ns(next_wake, self.minor_cycle_ns);

            let cycle_start = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
            let wake_latency_ns = timespec_diff_ns(&cycle_start, &next_wake).abs();

            self.tick(cycle_start.tv_sec() * 1_000_000_000 + cycle_start.tv_nsec());

            let cycle_end = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
            let duration_ns = timespec_diff_ns(&cycle_end, &cycle_start);

            self.stats.record(duration_ns, wake_latency_ns);

            if duration_ns > self.minor_cycle_ns {
                self.stats.overruns += 1;
                warn!(actual_ns = duration_ns, budget_ns = self.minor_cycle_ns, "cycle overrun, continuing");
            }

            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
        }
    }

    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self) -> Result<(), CycleError> {
        use std::time::Instant;

        let cycle_duration = std::time::Duration::from_nanos(self.minor_cycle_ns as u64);

        loop {
            let cycle_start = Instant::now();

            self.tick(0);

            let elapsed = cycle_start.elapsed();
            let duration_ns = elapsed.as_nanos() as i64;

            self.stats.record(duration_ns, 0);

            if duration_ns > self.minor_cycle_ns {
                self.stats.overruns += 1;
                warn!(
                    actual_ns = duration_ns,
                    budget_ns = self.minor_cycle_ns,
                    "cycle overrun (simulation mode, continuing)"
                );
            }

            if let Some(remaining) = cycle_duration.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
    }
}

/// Add nanoseconds to a `TimeSpec`.
#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    while nanos < 0 {
        secs -= 1;
        nanos += 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

/// Compute the difference (a - b) in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn cycle_stats_basic() {
        let mut stats = CycleStats::new();
        assert_eq!(stats.cycle_count, 0);
        assert_eq!(stats.avg_cycle_ns(), 0);

        stats.record(500_000, 1_000);
        assert_eq!(stats.cycle_count, 1);
        assert_eq!(stats.last_cycle_ns, 500_000);
        assert_eq!(stats.min_cycle_ns, 500_000);
        assert_eq!(stats.max_cycle_ns, 500_000);
        assert_eq!(stats.max_latency_ns, 1_000);
        assert_eq!(stats.avg_cycle_ns(), 500_000);

        stats.record(600_000, 500);
        assert_eq!(stats.cycle_count, 2);
        assert_eq!(stats.min_cycle_ns, 500_000);
        assert_eq!(stats.max_cycle_ns, 600_000);
        assert_eq!(stats.max_latency_ns, 1_000);
        assert_eq!(stats.avg_cycle_ns(), 550_000);
    }

    #[test]
    fn rt_setup_no_rt_feature_is_noop() {
        #[cfg(not(feature = "rt"))]
        {
            let result = rt_setup(0, 80);
            assert!(result.is_ok());
        }
    }

    #[test]
    fn cycle_error_display() {
        let err = CycleError::CycleOverrun {
            actual_ns: 1_500_000,
            budget_ns: 1_000_000,
        };
        let msg = format!("{err}");
        assert!(msg.contains("1500000"));
        assert!(msg.contains("1000000"));
    }

    #[test]
    fn new_derives_schedule_from_periods() {
        let exec = CyclicExecutive::new(&[10, 50]).unwrap();
        assert_eq!(exec.schedule().minor_cycle_ms, 10);
        assert_eq!(exec.schedule().major_cycle_ms, 50);
    }

    #[test]
    fn tick_dispatches_only_due_actions() {
        let mut exec = CyclicExecutive::new(&[10, 50]).unwrap();
        let fast_count = Arc::new(AtomicU64::new(0));
        let slow_count = Arc::new(AtomicU64::new(0));

        let fc = fast_count.clone();
        exec.register_action("fast", 10, move |_| {
            fc.fetch_add(1, Ordering::Relaxed);
        });
        let sc = slow_count.clone();
        exec.register_action("slow", 50, move |_| {
            sc.fetch_add(1, Ordering::Relaxed);
        });

        for _ in 0..5 {
            exec.tick(0);
        }

        assert_eq!(fast_count.load(Ordering::Relaxed), 5);
        assert_eq!(slow_count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn invalid_periods_reject_construction() {
        let err = CyclicExecutive::new(&[]).unwrap_err();
        assert!(matches!(err, CycleError::Schedule(_)));
    }
}
