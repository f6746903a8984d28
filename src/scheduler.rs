//! Work division and scheduling.
//!
//! Build kernels are expressed as functions of a [`WorkDivision`]: a worker
//! identity `idx` out of `max` workers. A [`Scheduler`] fans a kernel out,
//! invoking it once per division and blocking until every invocation has
//! returned. Kernels partition their index space by striding
//! (`i = idx, idx + max, idx + 2 * max, ...`), so any worker count yields the
//! same set of per-index writes and the build result does not depend on the
//! scheduler in use.

/// One worker's share of a fanned-out kernel: `idx` is in `[0, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkDivision {
    /// This worker's index.
    pub idx: usize,

    /// Total number of workers the kernel was fanned out to.
    pub max: usize,
}

impl WorkDivision {
    /// Returns the indices of `[0, len)` owned by this division: every
    /// `max`-th index starting at `idx`.
    pub fn stride(&self, len: usize) -> impl Iterator<Item = usize> {
        (self.idx..len).step_by(self.max)
    }
}

/// Fans a kernel out over work divisions and blocks until all of them finish.
pub trait Scheduler {
    /// Invokes `kernel` once per division, with `idx` ranging over
    /// `[0, max)`, and returns after every invocation has returned.
    fn run<K: Fn(WorkDivision) + Sync>(&self, kernel: K);
}

/// Runs kernels on the rayon thread pool, one division per pool thread.
///
/// This is the default scheduler. Its worker count matches the pool's
/// configured parallelism, which defaults to the available hardware
/// concurrency and is always at least one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RayonScheduler;

impl Scheduler for RayonScheduler {
    fn run<K: Fn(WorkDivision) + Sync>(&self, kernel: K) {
        let max = rayon::current_num_threads().max(1);
        let kernel = &kernel;
        rayon::scope(|scope| {
            for idx in 0..max {
                scope.spawn(move |_| kernel(WorkDivision { idx, max }));
            }
        });
    }
}

/// Runs kernels on the calling thread as a single division.
///
/// Useful for tests, for deterministic profiling, and as a fallback where a
/// thread pool is unwanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialScheduler;

impl Scheduler for SerialScheduler {
    fn run<K: Fn(WorkDivision) + Sync>(&self, kernel: K) {
        kernel(WorkDivision { idx: 0, max: 1 });
    }
}
