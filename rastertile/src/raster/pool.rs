//! Reusable pixel buffers.
//!
//! Tiles are fixed-size, so nearly every buffer a build allocates has one of a
//! handful of lengths. Buffers released back to the pool are handed out again
//! for the next tile of the same length instead of going back to the allocator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Default number of idle buffers kept per length.
pub const DEFAULT_MAX_IDLE_PER_SIZE: usize = 64;

/// Counters describing pool effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers served from the pool.
    pub reused: u64,
    /// Buffers that had to be freshly allocated.
    pub allocated: u64,
    /// Idle buffers currently held.
    pub idle: usize,
}

/// Pool of `Vec<f64>` buffers keyed by length.
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<HashMap<usize, Vec<Vec<f64>>>>,
    max_idle_per_size: usize,
    reused: AtomicU64,
    allocated: AtomicU64,
}

impl BufferPool {
    /// Create a pool that keeps at most `max_idle_per_size` idle buffers per length.
    ///
    /// A limit of zero disables retention entirely.
    pub fn new(max_idle_per_size: usize) -> Self {
        Self {
            idle: Mutex::new(HashMap::new()),
            max_idle_per_size,
            reused: AtomicU64::new(0),
            allocated: AtomicU64::new(0),
        }
    }

    /// Take an empty buffer with capacity for at least `len` values.
    pub fn acquire(&self, len: usize) -> Vec<f64> {
        let pooled = self.idle.lock().get_mut(&len).and_then(|buffers| buffers.pop());
        match pooled {
            Some(mut buffer) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                buffer.clear();
                buffer
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                Vec::with_capacity(len)
            }
        }
    }

    /// Return a buffer for reuse. Buffers beyond the idle limit are dropped.
    pub fn release(&self, buffer: Vec<f64>) {
        let len = buffer.capacity();
        if len == 0 || self.max_idle_per_size == 0 {
            return;
        }
        let mut idle = self.idle.lock();
        let buffers = idle.entry(len).or_default();
        if buffers.len() < self.max_idle_per_size {
            buffers.push(buffer);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            reused: self.reused.load(Ordering::Relaxed),
            allocated: self.allocated.load(Ordering::Relaxed),
            idle: self.idle.lock().values().map(Vec::len).sum(),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE_PER_SIZE)
    }
}
