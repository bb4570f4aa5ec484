//! Thread pool management for the band update
//!
//! Each evolution owns its pool, so concurrent evolutions with different
//! thread counts never share state. The band is cut into contiguous chunks
//! by [`split_band`]; chunk `k` is always the same index range for a given
//! band size and thread count, and per-chunk results are merged in chunk
//! order, which keeps runs reproducible.

use levelcrate_core::{Error, Result};
use log::debug;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::ops::Range;

/// Thread pool configuration for the band update
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadPoolConfig {
    /// Number of worker threads (0 = one per CPU)
    pub num_threads: usize,
    /// Thread stack size in bytes
    pub stack_size: Option<usize>,
    /// Thread name prefix
    pub thread_name_prefix: String,
    /// Enable parallel processing (can be disabled for debugging)
    pub enabled: bool,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            num_threads: 1,
            stack_size: None,
            thread_name_prefix: "levelcrate-evolve".to_string(),
            enabled: true,
        }
    }
}

impl ThreadPoolConfig {
    /// Set number of threads
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Set stack size
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Enable or disable parallel processing
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Thread count after resolving the automatic setting
    pub fn resolved_threads(&self) -> usize {
        if !self.enabled {
            return 1;
        }
        match self.num_threads {
            0 => num_cpus::get().max(1),
            n => n,
        }
    }
}

/// Index range of chunk `index` when `len` items are cut into `total` chunks
///
/// Chunks are contiguous, cover `0..len` exactly once, and differ in size by
/// at most one item; the first `len % total` chunks take the extra item.
pub fn split_band(len: usize, index: usize, total: usize) -> Range<usize> {
    debug_assert!(total > 0 && index < total);
    let base = len / total;
    let extra = len % total;
    let start = index * base + index.min(extra);
    let size = base + usize::from(index < extra);
    start..start + size
}

/// Worker pool owned by one evolution
pub struct EvolutionPool {
    threads: usize,
    pool: Option<ThreadPool>,
}

impl EvolutionPool {
    pub fn new(config: &ThreadPoolConfig) -> Result<Self> {
        let threads = config.resolved_threads();
        if threads == 1 {
            return Ok(Self { threads, pool: None });
        }

        let mut builder = ThreadPoolBuilder::new().num_threads(threads);
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }
        if !config.thread_name_prefix.is_empty() {
            let prefix = config.thread_name_prefix.clone();
            builder = builder.thread_name(move |index| format!("{}-{}", prefix, index));
        }

        let pool = builder
            .build()
            .map_err(|e| Error::Algorithm(format!("Failed to create thread pool: {}", e)))?;
        debug!("evolution pool started with {} threads", threads);
        Ok(Self {
            threads,
            pool: Some(pool),
        })
    }

    /// Number of chunks the band is cut into
    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Run `op` inside the pool, or on the calling thread when sequential
    pub fn install<F, R>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

impl std::fmt::Debug for EvolutionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvolutionPool")
            .field("threads", &self.threads)
            .field("parallel", &self.is_parallel())
            .finish()
    }
}
