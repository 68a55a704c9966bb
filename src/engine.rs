use std::time::{Duration, Instant};

use crate::cache::CacheStore;
use crate::chunk::{
    ChunkHandle, ChunkProvider, ChunkRegistry, ChunkRequest, LoadPoll, ProgressiveLoader,
};
use crate::events::{EngineEvent, EventBus, SubscriberId};
use crate::memory::MemoryGovernor;
use crate::metrics::{AlertKind, MetricsCollector};
use crate::optimize::{LevelOfDetail, OptimizationPipeline, OptimizationStrategy, Sampling};
use crate::{
    ChartType, ChunkKey, EngineOptions, PerformanceSample, ProviderError, VirtualSlice, Viewport,
};

/// Result of a progressive load: the accumulation plus how it ended.
///
/// A provider failure is not an exception to the caller: `items` holds the
/// partial accumulation and `error` explains the early exit.
#[derive(Clone, Debug)]
pub struct LoadOutcome<T> {
    pub items: Vec<T>,
    pub completed: bool,
    pub error: Option<ProviderError>,
    pub provider_calls: u64,
}

/// Snapshot returned by [`Engine::get_metrics`].
#[derive(Clone, Debug, Default)]
pub struct MetricsSnapshot {
    pub latest: Option<PerformanceSample>,
    pub history: Vec<PerformanceSample>,
}

/// The dataset performance/virtualization engine.
///
/// An `Engine` is an explicit, constructible object owned by whichever
/// chart/session needs it; there is no ambient global instance. It
/// coordinates the viewport indexer, the LRU cache, the chunk loader, the
/// memory governor, the metrics collector, and the optimization pipeline,
/// all on a single logical thread.
///
/// Time never comes from an internal clock: background behavior advances
/// when the owner calls [`Engine::tick`] and [`Engine::on_frame`] with the
/// current `now_ms`, the same way a UI adapter drives a virtualizer per
/// frame. The only exception is the blocking convenience driver
/// [`Engine::load_progressively`].
pub struct Engine<T> {
    options: EngineOptions,
    cache: CacheStore<String, Vec<T>>,
    chunks: ChunkRegistry<T>,
    governor: MemoryGovernor,
    metrics: MetricsCollector,
    pipeline: OptimizationPipeline<T>,
    events: EventBus,
    loader: Option<ProgressiveLoader<T>>,
    last_cleanup_ms: Option<u64>,
    last_virtualized_count: usize,
    running: bool,
}

impl<T> std::fmt::Debug for Engine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.options)
            .field("cache_entries", &self.cache.len())
            .field("chunks", &self.chunks.len())
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> Engine<T> {
    /// Creates an engine with the default strategy set: sampling toward
    /// `memory.max_data_points` (enabled) and level-of-detail (constructible
    /// but disabled, since stacking both would double-reduce).
    pub fn new(options: EngineOptions) -> Self {
        let mut pipeline = OptimizationPipeline::new();
        pipeline.add(Box::new(Sampling::new(options.memory.max_data_points)));
        pipeline.add(Box::new(LevelOfDetail::new(4).with_enabled(false)));
        Self::with_pipeline(options, pipeline)
    }

    /// Creates an engine with a caller-supplied strategy pipeline.
    pub fn with_pipeline(options: EngineOptions, pipeline: OptimizationPipeline<T>) -> Self {
        cdebug!(
            max_cache_size = options.memory.max_cache_size,
            chunk_size = options.loading.chunk_size,
            "Engine::new"
        );
        Self {
            cache: CacheStore::new(options.memory.max_cache_size),
            chunks: ChunkRegistry::new(),
            governor: MemoryGovernor::new(options.memory),
            metrics: MetricsCollector::new(options.monitoring),
            pipeline,
            events: EventBus::new(),
            loader: None,
            last_cleanup_ms: None,
            last_virtualized_count: 0,
            options,
            running: true,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Applies a partial configuration update and propagates the changed
    /// limits to the cache, governor, and collector.
    pub fn update_config(&mut self, f: impl FnOnce(&mut EngineOptions)) {
        f(&mut self.options);
        self.cache.set_max_bytes(self.options.memory.max_cache_size);
        self.governor.set_options(self.options.memory);
        self.metrics.set_options(self.options.monitoring);
        self.events.emit(&EngineEvent::ConfigUpdated);
    }

    pub fn subscribe(
        &mut self,
        callback: impl Fn(&EngineEvent) + Send + Sync + 'static,
    ) -> SubscriberId {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.events.unsubscribe(id)
    }

    // ---- virtualization ------------------------------------------------

    /// Virtualizes `data` against `viewport` using the configured window
    /// options. Pure apart from remembering the window size for metrics.
    pub fn virtualize(&mut self, data: &[T], viewport: Viewport) -> VirtualSlice<T> {
        let slice = crate::viewport::virtualize(data, viewport, &self.options.virtualization);
        self.last_virtualized_count = slice.len();
        slice
    }

    // ---- optimization --------------------------------------------------

    /// Runs the strategy pipeline, recording the processing duration for the
    /// next metrics sample.
    pub fn apply_optimizations(&mut self, data: Vec<T>, chart_type: ChartType) -> Vec<T> {
        let started = Instant::now();
        let out = self.pipeline.apply(data, chart_type);
        self.metrics
            .record_processing(started.elapsed().as_secs_f64() * 1000.0);
        out
    }

    pub fn add_strategy(&mut self, strategy: Box<dyn OptimizationStrategy<T>>) {
        self.pipeline.add(strategy);
    }

    pub fn clear_strategies(&mut self) {
        self.pipeline.clear();
    }

    // ---- cache ---------------------------------------------------------

    pub fn set_cache_entry(
        &mut self,
        key: impl Into<String>,
        data: Vec<T>,
        now_ms: u64,
        ttl_ms: Option<u64>,
    ) {
        let size_bytes = data.len() * size_of::<T>();
        self.cache.set(key.into(), data, size_bytes, now_ms, ttl_ms);
    }

    pub fn get_cache_entry(&mut self, key: &str, now_ms: u64) -> Option<&Vec<T>> {
        self.cache.get(key, now_ms)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_bytes(&self) -> usize {
        self.cache.total_bytes()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.events.emit(&EngineEvent::CacheCleared);
    }

    // ---- chunks --------------------------------------------------------

    /// Requests a chunk, coalescing with any in-flight request for the same
    /// key. The returned [`ChunkRequest`] tells the caller whether it owns
    /// the fetch or merely joined it.
    pub fn request_chunk(&mut self, key: ChunkKey, now_ms: u64) -> (ChunkHandle<T>, ChunkRequest) {
        self.chunks.request(key, now_ms)
    }

    /// Resolves an in-flight chunk; every joined handle observes the data.
    pub fn resolve_chunk(&mut self, key: ChunkKey, data: Vec<T>, now_ms: u64) -> bool {
        self.chunks.resolve(key, data, now_ms)
    }

    /// Fails an in-flight chunk and surfaces the error as a notification.
    pub fn fail_chunk(&mut self, key: ChunkKey, error: ProviderError, now_ms: u64) -> bool {
        let applied = self.chunks.fail(key, error.clone(), now_ms);
        if applied {
            self.events.emit(&EngineEvent::DataError {
                offset: error.offset,
                message: error.message,
            });
        }
        applied
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn clear_chunks(&mut self) {
        self.chunks.clear();
        self.events.emit(&EngineEvent::ChunksCleared);
    }

    // ---- progressive loading -------------------------------------------

    /// Starts a cooperative load session driven by [`Engine::poll_load`].
    pub fn begin_load(&mut self) {
        self.loader = Some(ProgressiveLoader::new(self.options.loading));
    }

    /// Advances the cooperative load session by at most one provider call,
    /// emitting progress/error notifications. Starts a session lazily if
    /// none is active.
    pub fn poll_load(&mut self, now_ms: u64, provider: &mut dyn ChunkProvider<T>) -> LoadPoll {
        if !self.running {
            return LoadPoll::Complete;
        }
        if self.loader.is_none() {
            self.begin_load();
        }
        let Some(loader) = self.loader.as_mut() else {
            return LoadPoll::Complete;
        };
        let poll = loader.poll(now_ms, provider);
        match &poll {
            LoadPoll::Progress { loaded, offset } => {
                self.events.emit(&EngineEvent::DataProgress {
                    loaded: *loaded,
                    offset: *offset,
                });
            }
            LoadPoll::Failed(e) => {
                self.events.emit(&EngineEvent::DataError {
                    offset: e.offset,
                    message: e.message.clone(),
                });
            }
            LoadPoll::Pending | LoadPoll::Complete => {}
        }
        poll
    }

    /// Takes the finished (or failed) cooperative session's accumulation.
    pub fn take_load(&mut self) -> Option<LoadOutcome<T>> {
        if !self.loader.as_ref().is_some_and(|l| l.is_terminal()) {
            return None;
        }
        let loader = self.loader.take()?;
        Some(LoadOutcome {
            completed: loader.is_complete(),
            error: loader.error().cloned(),
            provider_calls: loader.provider_calls(),
            items: loader.into_partial(),
        })
    }

    /// Drives a full progressive load to completion, suspending
    /// `load_delay_ms` between provider calls so the owner's render loop is
    /// never starved. Blocking; prefer `begin_load`/`poll_load` inside a
    /// frame loop.
    pub fn load_progressively(&mut self, provider: &mut dyn ChunkProvider<T>) -> LoadOutcome<T> {
        if !self.running {
            return LoadOutcome {
                items: Vec::new(),
                completed: false,
                error: None,
                provider_calls: 0,
            };
        }

        let started = Instant::now();
        let mut loader = ProgressiveLoader::new(self.options.loading);
        loop {
            let now_ms = started.elapsed().as_millis() as u64;
            match loader.poll(now_ms, provider) {
                LoadPoll::Pending => {
                    if let Some(due) = loader.next_due_ms() {
                        std::thread::sleep(Duration::from_millis(due.saturating_sub(now_ms)));
                    }
                }
                LoadPoll::Progress { loaded, offset } => {
                    self.events
                        .emit(&EngineEvent::DataProgress { loaded, offset });
                }
                LoadPoll::Complete | LoadPoll::Failed(_) => break,
            }
        }

        self.metrics
            .record_load(started.elapsed().as_secs_f64() * 1000.0);
        let error = loader.error().cloned();
        if let Some(e) = &error {
            self.events.emit(&EngineEvent::DataError {
                offset: e.offset,
                message: e.message.clone(),
            });
        }
        LoadOutcome {
            completed: loader.is_complete(),
            provider_calls: loader.provider_calls(),
            error,
            items: loader.into_partial(),
        }
    }

    // ---- memory --------------------------------------------------------

    /// Current aggregate memory-usage ratio (`0..=1`).
    pub fn memory_usage(&self) -> f64 {
        self.governor.usage_ratio(&self.cache, &self.chunks)
    }

    pub fn set_force_gc_hook(&mut self, hook: Option<impl Fn() + Send + Sync + 'static>) {
        self.governor.set_force_gc_hook(hook);
    }

    pub fn set_memory_probe(&mut self, probe: Option<impl Fn() -> f64 + Send + Sync + 'static>) {
        self.governor.set_memory_probe(probe);
    }

    /// Explicitly requests a host garbage collection. Errors if no
    /// [`Engine::set_force_gc_hook`] hook was installed.
    pub fn force_gc(&mut self) -> Result<(), crate::EngineError> {
        self.governor.force_collect()
    }

    /// Runs one governor pass now (also invoked periodically from `tick`
    /// when `auto_cleanup` is enabled).
    pub fn manage_memory(&mut self, now_ms: u64) -> crate::MemoryReport {
        let report = self.governor.manage(&mut self.cache, &mut self.chunks, now_ms);
        self.events.emit(&EngineEvent::MemoryManaged { report });
        if report.gc_ran {
            self.events.emit(&EngineEvent::MemoryGc {
                usage: report.usage,
            });
        }
        report
    }

    // ---- metrics -------------------------------------------------------

    /// Feeds one animation frame into the rolling frame-rate window.
    pub fn on_frame(&mut self, now_ms: u64) {
        if !self.running {
            return;
        }
        self.metrics.on_frame(now_ms);
    }

    /// Records the last observed render duration (the rendering layer calls
    /// this after each redraw).
    pub fn record_render(&mut self, render_time_ms: f64) {
        self.metrics.record_render(render_time_ms);
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            latest: self.metrics.latest().copied(),
            history: self.metrics.history().iter().copied().collect(),
        }
    }

    // ---- background driving --------------------------------------------

    /// Advances periodic behavior: metrics collection (with alert
    /// evaluation) and, when `auto_cleanup` is on, the governor pass. Call
    /// once per frame/timer tick. A no-op after [`Engine::shutdown`].
    pub fn tick(&mut self, now_ms: u64) {
        if !self.running {
            return;
        }

        if self.options.monitoring.enabled && self.metrics.due(now_ms) {
            let usage = self.memory_usage();
            let sample = self.metrics.collect(
                now_ms,
                usage,
                self.cache.hit_rate(),
                self.last_virtualized_count,
                self.governor.gc_collections(),
            );
            self.events.emit(&EngineEvent::MetricsCollected { sample });

            let thresholds = self.options.monitoring.alert_thresholds;
            for alert in MetricsCollector::alerts_for(&sample, &thresholds) {
                let event = match alert {
                    AlertKind::Memory => EngineEvent::AlertMemory {
                        usage: sample.memory_usage,
                    },
                    AlertKind::RenderTime => EngineEvent::AlertRenderTime {
                        render_time_ms: sample.render_time_ms,
                    },
                    AlertKind::FrameRate => EngineEvent::AlertFrameRate {
                        frame_rate: sample.frame_rate,
                    },
                };
                cwarn!(channel = event.channel(), "performance alert");
                self.events.emit(&event);
            }
        }

        if self.options.memory.auto_cleanup {
            let due = self.last_cleanup_ms.is_none_or(|last| {
                now_ms.saturating_sub(last) >= self.options.memory.cleanup_interval_ms
            });
            if due {
                self.last_cleanup_ms = Some(now_ms);
                self.manage_memory(now_ms);
            }
        }
    }

    // ---- teardown ------------------------------------------------------

    /// All-or-nothing scoped release: stops periodic behavior, drops any
    /// in-flight load session, and clears all caches and chunks. Safe to
    /// call on every exit path; subsequent calls are no-ops.
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        cdebug!("Engine::shutdown");
        self.running = false;
        self.loader = None;
        self.cache.clear();
        self.chunks.clear();
        self.metrics.reset();
        self.events.emit(&EngineEvent::EngineShutdown);
    }
}
