use std::hash::Hash;
use std::sync::Arc;

use crate::cache::CacheStore;
use crate::chunk::ChunkRegistry;
use crate::{EngineError, MemoryOptions};

/// Host hook invoked when the governor wants a forced collection.
///
/// Optional: when absent, the step is skipped (graceful degradation).
pub type ForceGcHook = Arc<dyn Fn() + Send + Sync>;

/// Host probe for the aggregate memory-usage ratio (`0..=1`).
///
/// Optional: when absent, the governor falls back to engine-internal
/// accounting (cache + chunk bytes over `max_cache_size`).
pub type MemoryProbe = Arc<dyn Fn() -> f64 + Send + Sync>;

/// What one governor pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryReport {
    /// Usage ratio observed at the start of the pass.
    pub usage: f64,
    pub expired_purged: usize,
    pub cache_evicted: usize,
    pub chunks_dropped: usize,
    /// Whether the over-threshold path ran.
    pub gc_ran: bool,
    /// Whether the host forced-collection hook was invoked.
    pub forced_gc: bool,
}

/// Periodically inspects aggregate memory pressure and evicts when the
/// configured threshold is crossed.
///
/// Every pass performs routine housekeeping (expired cache entries, stale
/// chunks) regardless of pressure. The threshold path additionally evicts
/// the oldest-accessed 30 % of the cache and requests a host forced
/// collection when a hook is installed.
pub struct MemoryGovernor {
    opts: MemoryOptions,
    force_gc: Option<ForceGcHook>,
    probe: Option<MemoryProbe>,
    gc_collections: u64,
}

impl std::fmt::Debug for MemoryGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGovernor")
            .field("opts", &self.opts)
            .field("force_gc", &self.force_gc.is_some())
            .field("probe", &self.probe.is_some())
            .field("gc_collections", &self.gc_collections)
            .finish()
    }
}

impl MemoryGovernor {
    pub fn new(opts: MemoryOptions) -> Self {
        Self {
            opts,
            force_gc: None,
            probe: None,
            gc_collections: 0,
        }
    }

    pub fn set_options(&mut self, opts: MemoryOptions) {
        self.opts = opts;
    }

    pub fn set_force_gc_hook(&mut self, hook: Option<impl Fn() + Send + Sync + 'static>) {
        self.force_gc = hook.map(|f| Arc::new(f) as _);
    }

    pub fn set_memory_probe(&mut self, probe: Option<impl Fn() -> f64 + Send + Sync + 'static>) {
        self.probe = probe.map(|f| Arc::new(f) as _);
    }

    /// Forced collections requested so far (feeds `PerformanceSample`).
    pub fn gc_collections(&self) -> u64 {
        self.gc_collections
    }

    /// Explicitly invokes the host forced-collection hook.
    ///
    /// Unlike the governor pass, which degrades gracefully when no hook is
    /// installed, an explicit request for the capability is an error.
    pub fn force_collect(&mut self) -> Result<(), EngineError> {
        let Some(hook) = &self.force_gc else {
            return Err(EngineError::EnvironmentUnavailable("force_gc hook"));
        };
        hook();
        self.gc_collections += 1;
        Ok(())
    }

    /// Current memory-usage ratio: the host probe when installed, otherwise
    /// engine-internal bytes over `max_cache_size`, clamped to `0..=1`.
    pub fn usage_ratio<K: Hash + Eq + Clone, V, T>(
        &self,
        cache: &CacheStore<K, V>,
        chunks: &ChunkRegistry<T>,
    ) -> f64 {
        if let Some(probe) = &self.probe {
            return probe().clamp(0.0, 1.0);
        }
        let held = cache.total_bytes() + chunks.total_bytes();
        if self.opts.max_cache_size == 0 {
            return 1.0;
        }
        (held as f64 / self.opts.max_cache_size as f64).clamp(0.0, 1.0)
    }

    /// Runs one governor pass over the engine's stores.
    pub fn manage<K: Hash + Eq + Clone, V, T>(
        &mut self,
        cache: &mut CacheStore<K, V>,
        chunks: &mut ChunkRegistry<T>,
        now_ms: u64,
    ) -> MemoryReport {
        let usage = self.usage_ratio(cache, chunks);

        // Routine housekeeping, threshold or not.
        let expired_purged = cache.purge_expired(now_ms);
        let chunks_dropped = chunks.evict_stale(now_ms, self.opts.chunk_max_age_ms);

        let mut report = MemoryReport {
            usage,
            expired_purged,
            chunks_dropped,
            ..MemoryReport::default()
        };

        if usage <= self.opts.gc_threshold {
            ctrace!(usage, "memory within threshold");
            return report;
        }

        report.gc_ran = true;
        report.cache_evicted = cache.evict_fraction(0.3);

        match &self.force_gc {
            Some(hook) => {
                hook();
                self.gc_collections += 1;
                report.forced_gc = true;
            }
            None => {
                cdebug!("no forced-collection hook installed; skipping");
            }
        }

        cdebug!(
            usage,
            cache_evicted = report.cache_evicted,
            chunks_dropped = report.chunks_dropped,
            "memory pressure handled"
        );
        report
    }
}
