//! Lane buffer pool.
//!
//! Array buffers are recycled across frames instead of reallocated. The field
//! materializer acquires a buffer sized `lanes * stride`; the runtime state
//! hands every array buffer back at the start of the next frame.

use indexmap::IndexMap;

/// Default number of idle buffers kept per length.
pub const DEFAULT_MAX_PER_SIZE: usize = 32;

/// Pool usage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers handed out.
    pub acquired: u64,
    /// Acquisitions served from an idle buffer.
    pub reused: u64,
    /// Buffers returned and kept.
    pub released: u64,
    /// Buffers returned and dropped because the size class was full.
    pub dropped: u64,
}

/// Idle `f64` buffers keyed by length.
#[derive(Debug)]
pub struct BufferPool {
    free: IndexMap<usize, Vec<Vec<f64>>>,
    max_per_size: usize,
    stats: PoolStats,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_SIZE)
    }
}

impl BufferPool {
    pub fn new(max_per_size: usize) -> Self {
        Self {
            free: IndexMap::new(),
            max_per_size,
            stats: PoolStats::default(),
        }
    }

    /// A zero-filled buffer of exactly `len` values.
    pub fn acquire(&mut self, len: usize) -> Vec<f64> {
        self.stats.acquired += 1;
        match self.free.get_mut(&len).and_then(Vec::pop) {
            Some(mut buf) => {
                self.stats.reused += 1;
                buf.fill(0.0);
                buf
            }
            None => vec![0.0; len],
        }
    }

    /// Return a buffer for reuse.
    pub fn release(&mut self, buf: Vec<f64>) {
        let class = self.free.entry(buf.len()).or_default();
        if class.len() < self.max_per_size {
            class.push(buf);
            self.stats.released += 1;
        } else {
            self.stats.dropped += 1;
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    pub fn max_per_size(&self) -> usize {
        self.max_per_size
    }

    /// Idle buffers across all sizes.
    pub fn idle(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    /// Drop every idle buffer.
    pub fn clear(&mut self) {
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_reuses_released_buffers() {
        let mut pool = BufferPool::new(4);
        let mut buf = pool.acquire(8);
        buf[3] = 7.0;
        pool.release(buf);
        assert_eq!(pool.idle(), 1);

        let again = pool.acquire(8);
        assert_eq!(again, vec![0.0; 8]);
        assert_eq!(pool.stats().reused, 1);
        assert_eq!(pool.idle(), 0);

        let other = pool.acquire(3);
        assert_eq!(other.len(), 3);
        assert_eq!(pool.stats().acquired, 3);
        assert_eq!(pool.stats().reused, 1);
    }

    #[test]
    fn test_size_class_is_bounded() {
        let mut pool = BufferPool::new(1);
        pool.release(vec![0.0; 2]);
        pool.release(vec![0.0; 2]);
        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.stats().dropped, 1);
    }
}
