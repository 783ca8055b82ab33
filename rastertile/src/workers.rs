//! Bounded rayon pools for CPU-bound tile work.
//!
//! Pyramid builds and aggregations each run on their own pool so a large
//! build cannot starve concurrent aggregation requests of threads.

use thiserror::Error;

/// Failure to start a worker pool.
#[derive(Debug, Error)]
#[error("Failed to start '{label}' worker pool: {reason}")]
pub struct WorkerPoolError {
    pub label: String,
    pub reason: String,
}

/// Number of threads to use for a configured worker count.
///
/// `0` means one thread per available core.
pub fn resolve_workers(configured: usize) -> usize {
    if configured > 0 {
        return configured;
    }
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

/// A named, fixed-size rayon pool.
#[derive(Debug)]
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    label: String,
}

impl WorkerPool {
    /// Start a pool of `workers` threads (`0` = one per core).
    pub fn new(workers: usize, label: impl Into<String>) -> Result<Self, WorkerPoolError> {
        let label: String = label.into();
        let threads = resolve_workers(workers);
        let thread_label = label.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("{}-{}", thread_label, i))
            .build()
            .map_err(|e| WorkerPoolError {
                label: label.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(threads, label = %label, "Created worker pool");

        Ok(Self { pool, label })
    }

    /// Run `op` inside the pool; rayon iterators used by `op` stay in it.
    pub fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_resolve_workers() {
        assert_eq!(resolve_workers(3), 3);
        assert!(resolve_workers(0) >= 1);
    }

    #[test]
    fn test_pool_runs_parallel_work() {
        let pool = WorkerPool::new(2, "test").unwrap();
        assert_eq!(pool.threads(), 2);
        assert_eq!(pool.label(), "test");
        let sum: u64 = pool.install(|| (1..=100u64).into_par_iter().sum());
        assert_eq!(sum, 5050);
    }
}
