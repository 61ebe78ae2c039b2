// src/engine/pool.rs
//
// Parallel-for engine.
//
// **Architecture Decision**: a single global rayon pool executes every
// data-parallel section. Per-call parallelism is bounded by an
// `ExecutionConfig` handed in by the caller, not by the pool size:
// `[0, n)` is cut into at most `max_workers` contiguous ranges and each
// range becomes exactly one task.
//
// **Disjointness**: output-producing sections receive their destination
// as `&mut [u8]` chunks carved with `split_at_mut`, so two workers can
// never alias the same output bytes. Sources are shared read-only.
//
// **Worker count**:
// - Defaults to std::thread::available_parallelism() (respects cgroup/CPU quota)
// - PIXELFLOW_MAX_WORKERS overrides the host default when set to a positive integer
// - set_max_workers() changes the process-wide default; 0 restores the host value
// - The value is sampled once when a config is built, never mid-call

use parking_lot::RwLock;
use rayon::ThreadPool;
use std::ops::Range;
use std::sync::OnceLock;
use tracing::{trace, warn};

/// Environment variable that seeds the default worker count.
pub const MAX_WORKERS_ENV: &str = "PIXELFLOW_MAX_WORKERS";

/// Minimum number of workers; a config never drops below this.
const MIN_WORKERS: usize = 1;

static GLOBAL_THREAD_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

/// 0 means "not configured": fall back to the host default.
static GLOBAL_MAX_WORKERS: RwLock<usize> = parking_lot::const_rwlock(0);

/// Host logical CPU count (at least 1).
pub fn host_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_WORKERS)
}

fn env_max_workers() -> Option<usize> {
    std::env::var(MAX_WORKERS_ENV)
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
}

/// Per-call execution settings for the parallel engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionConfig {
    max_workers: usize,
}

impl ExecutionConfig {
    /// Config with an explicit worker bound (clamped to at least 1).
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(MIN_WORKERS),
        }
    }

    /// Everything runs inline on the calling thread.
    pub fn single_threaded() -> Self {
        Self::new(1)
    }

    /// Host default: `PIXELFLOW_MAX_WORKERS` if set, else the logical CPU count.
    pub fn host() -> Self {
        Self::new(env_max_workers().unwrap_or_else(host_parallelism))
    }

    /// Snapshot of the process-wide default.
    pub fn global() -> Self {
        let configured = *GLOBAL_MAX_WORKERS.read();
        if configured == 0 {
            Self::host()
        } else {
            Self::new(configured)
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::global()
    }
}

/// Set the process-wide default worker count. `0` restores the host default.
pub fn set_max_workers(workers: usize) {
    *GLOBAL_MAX_WORKERS.write() = workers;
}

/// Current process-wide default worker count.
pub fn max_workers() -> usize {
    ExecutionConfig::global().max_workers()
}

/// Lazily built global pool sized to the host. `None` only if the OS
/// refused to spawn threads, in which case work runs inline.
fn get_pool() -> Option<&'static ThreadPool> {
    GLOBAL_THREAD_POOL
        .get_or_init(|| {
            let threads = host_parallelism();
            match rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("pixelflow-{i}"))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!(target: "pixelflow::pool", error = %e, threads, "thread pool unavailable, running inline");
                    None
                }
            }
        })
        .as_ref()
}

/// Split `[0, n)` into `min(workers, n)` contiguous, disjoint, non-empty
/// ranges covering every index exactly once, in ascending order.
pub fn partition(n: usize, workers: usize) -> Vec<Range<usize>> {
    if n == 0 {
        return Vec::new();
    }
    let parts = workers.clamp(MIN_WORKERS, n);
    let base = n / parts;
    let extra = n % parts;
    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let len = base + usize::from(i < extra);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

/// Run `body` once per sub-range of `[0, n)` and collect the results in
/// range order. Blocks until every worker has finished; a panicking
/// worker propagates its panic to the caller.
pub fn parallel_map<T, F>(config: &ExecutionConfig, n: usize, body: F) -> Vec<T>
where
    T: Send,
    F: Fn(Range<usize>) -> T + Sync,
{
    let ranges = partition(n, config.max_workers());
    let pool = match get_pool() {
        Some(pool) if ranges.len() > 1 => pool,
        _ => return ranges.into_iter().map(&body).collect(),
    };

    trace!(target: "pixelflow::pool", items = n, workers = ranges.len(), "parallel_map");

    let mut results: Vec<Option<T>> = ranges.iter().map(|_| None).collect();
    let body = &body;
    pool.scope(|s| {
        for (range, slot) in ranges.into_iter().zip(results.iter_mut()) {
            s.spawn(move |_| *slot = Some(body(range)));
        }
    });
    // The scope joined every task, so every slot is filled.
    results.into_iter().flatten().collect()
}

/// Run `body` over contiguous sub-ranges of `[0, n)`.
pub fn parallel_for<F>(config: &ExecutionConfig, n: usize, body: F)
where
    F: Fn(Range<usize>) + Sync,
{
    parallel_map(config, n, body);
}

/// Hand each worker an exclusive slice of whole rows of `dst`.
///
/// `dst` is treated as `dst.len() / row_len` rows of `row_len` bytes.
/// `body` receives the row range it owns and the matching bytes.
pub fn parallel_rows<F>(config: &ExecutionConfig, dst: &mut [u8], row_len: usize, body: F)
where
    F: Fn(Range<usize>, &mut [u8]) + Sync,
{
    if row_len == 0 || dst.is_empty() {
        return;
    }
    debug_assert_eq!(dst.len() % row_len, 0, "destination is not a whole number of rows");
    let rows = dst.len() / row_len;

    let mut jobs = Vec::new();
    let mut rest = dst;
    for range in partition(rows, config.max_workers()) {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len() * row_len);
        jobs.push((range, head));
        rest = tail;
    }

    let pool = match get_pool() {
        Some(pool) if jobs.len() > 1 => pool,
        _ => {
            for (range, chunk) in jobs {
                body(range, chunk);
            }
            return;
        }
    };

    trace!(target: "pixelflow::pool", rows, workers = jobs.len(), "parallel_rows");

    let body = &body;
    pool.scope(|s| {
        for (range, chunk) in jobs {
            s.spawn(move |_| body(range, chunk));
        }
    });
}
