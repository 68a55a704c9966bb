use crate::*;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        // Deterministic, dependency-free PRNG for tests.
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn gen_range_u64(&mut self, start: u64, end_exclusive: u64) -> u64 {
        debug_assert!(start < end_exclusive);
        let span = end_exclusive - start;
        start + (self.next_u64() % span)
    }

    fn gen_range_usize(&mut self, start: usize, end_exclusive: usize) -> usize {
        self.gen_range_u64(start as u64, end_exclusive as u64) as usize
    }
}

fn ids(n: usize) -> Vec<u64> {
    (0..n as u64).collect()
}

fn capture_channels(engine: &mut Engine<u64>) -> Arc<Mutex<Vec<&'static str>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    engine.subscribe(move |event| sink.lock().unwrap().push(event.channel()));
    log
}

// ---- viewport ----------------------------------------------------------

#[test]
fn virtualize_is_deterministic() {
    let data = ids(1000);
    let viewport = Viewport::new(100, 200, 100);
    let opts = VirtualizationOptions::new(10)
        .with_overscan(3)
        .with_buffer_size(5);

    let a = virtualize(&data, viewport, &opts);
    let b = virtualize(&data, viewport, &opts);
    assert_eq!(a, b);
}

#[test]
fn virtualize_scenario_1000_items() {
    let data = ids(1000);
    let viewport = Viewport::new(100, 200, 100);
    let opts = VirtualizationOptions::new(10)
        .with_overscan(3)
        .with_buffer_size(5);

    let slice = virtualize(&data, viewport, &opts);
    assert_eq!(slice.start_index, 2);
    assert_eq!(slice.end_index, 28);
    assert_eq!(slice.items.len(), 27);
    assert_eq!(slice.total_height, 10_000);
    assert_eq!(slice.items[0], 2);
    assert_eq!(*slice.items.last().unwrap(), 28);
}

#[test]
fn virtualize_empty_input_contract() {
    let data: Vec<u64> = Vec::new();
    let slice = virtualize(&data, Viewport::new(0, 0, 100), &VirtualizationOptions::default());
    assert!(slice.is_empty());
    assert_eq!(slice.start_index, 0);
    assert_eq!(slice.end_index, -1);
    assert_eq!(slice.total_height, 0);
    assert!(slice.items.is_empty());
}

#[test]
fn virtualize_disabled_returns_full_dataset() {
    let data = ids(50);
    let opts = VirtualizationOptions::new(10).with_enabled(false);
    let slice = virtualize(&data, Viewport::new(0, 0, 10), &opts);
    assert_eq!(slice.start_index, 0);
    assert_eq!(slice.end_index, 49);
    assert_eq!(slice.items, data);
    assert_eq!(slice.total_height, 500);
}

#[test]
fn virtualize_clamps_viewport_past_end() {
    let data = ids(10);
    let opts = VirtualizationOptions::new(10)
        .with_overscan(3)
        .with_buffer_size(5);

    // Scrolled far beyond the dataset: the window collapses onto the tail.
    let slice = virtualize(&data, Viewport::new(1000, 0, 10), &opts);
    assert_eq!(slice.start_index, 4);
    assert_eq!(slice.end_index, 9);
    assert_eq!(slice.items, &ids(10)[4..=9]);

    // Single-item dataset, any offset: still a valid one-item window.
    let one = ids(1);
    let slice = virtualize(&one, Viewport::new(u64::MAX / 2, 0, 100), &opts);
    assert_eq!(slice.start_index, 0);
    assert_eq!(slice.end_index, 0);
    assert_eq!(slice.items, one);
}

#[test]
fn virtualize_bounds_hold_under_random_sweeps() {
    let mut rng = Lcg::new(0x5eed);
    for _ in 0..200 {
        let len = rng.gen_range_usize(0, 5000);
        let data = ids(len);
        let opts = VirtualizationOptions::new(rng.gen_range_u64(1, 50))
            .with_overscan(rng.gen_range_usize(0, 10))
            .with_buffer_size(rng.gen_range_usize(0, 10));
        let viewport = Viewport::new(rng.gen_range_u64(0, 100_000), 0, rng.gen_range_u64(0, 5000));

        let slice = virtualize(&data, viewport, &opts);
        if len == 0 {
            assert_eq!(slice.start_index, 0);
            assert_eq!(slice.end_index, -1);
            continue;
        }
        assert!(slice.end_index >= 0);
        let end = slice.end_index as usize;
        assert!(slice.start_index <= end);
        assert!(end <= len - 1);
        assert_eq!(slice.items.len(), end - slice.start_index + 1);
        assert_eq!(slice.total_height, len as u64 * opts.item_height);
    }
}

#[test]
fn virtualize_indices_are_monotonic_in_scroll_offset() {
    let data = ids(10_000);
    let opts = VirtualizationOptions::new(10)
        .with_overscan(2)
        .with_buffer_size(3);

    let mut prev = virtualize_range(data.len(), Viewport::new(0, 0, 500), &opts);
    for start in (0..100_000u64).step_by(37) {
        let range = virtualize_range(data.len(), Viewport::new(start, 0, 500), &opts);
        assert!(range.start_index >= prev.start_index);
        assert!(range.end_index >= prev.end_index);
        prev = range;
    }
}

// ---- cache -------------------------------------------------------------

#[test]
fn cache_bound_is_restored_after_oversized_insert() {
    let mut cache = CacheStore::new(100);
    cache.set("a".to_string(), ids(1), 40, 1, None);
    cache.set("b".to_string(), ids(1), 40, 2, None);
    assert_eq!(cache.total_bytes(), 80);

    // Third insert crosses the bound; eviction must actually run.
    cache.set("c".to_string(), ids(1), 40, 3, None);
    assert!(cache.total_bytes() <= 100);
    assert!(cache.len() < 3);
    assert!(!cache.contains("a")); // oldest-accessed went first
}

#[test]
fn lru_evicts_exactly_the_oldest() {
    let mut cache = CacheStore::new(1_000_000);
    cache.set("a".to_string(), ids(1), 10, 1, None);
    cache.set("b".to_string(), ids(1), 10, 2, None);
    cache.set("c".to_string(), ids(1), 10, 3, None);

    let evicted = cache.evict_fraction(0.33);
    assert_eq!(evicted, 1);
    assert!(!cache.contains("a"));
    assert!(cache.contains("b"));
    assert!(cache.contains("c"));
}

#[test]
fn lru_tie_break_is_insertion_order() {
    let mut cache = CacheStore::new(1_000_000);
    cache.set("first".to_string(), ids(1), 10, 5, None);
    cache.set("second".to_string(), ids(1), 10, 5, None);

    let evicted = cache.evict_fraction(0.5);
    assert_eq!(evicted, 1);
    assert!(!cache.contains("first"));
    assert!(cache.contains("second"));
}

#[test]
fn cache_access_refreshes_lru_position() {
    let mut cache = CacheStore::new(1_000_000);
    cache.set("a".to_string(), ids(1), 10, 1, None);
    cache.set("b".to_string(), ids(1), 10, 2, None);

    // Touch "a" later than "b" was written; "b" becomes the eviction victim.
    assert!(cache.get("a", 10).is_some());
    cache.evict_fraction(0.5);
    assert!(cache.contains("a"));
    assert!(!cache.contains("b"));
}

#[test]
fn cache_ttl_expires_on_read() {
    let mut cache = CacheStore::new(1_000_000);
    cache.set("k".to_string(), ids(3), 10, 100, Some(50));

    assert!(cache.get("k", 120).is_some()); // not yet past expires_at
    assert!(cache.get("k", 151).is_none()); // expired: deleted on read
    assert!(!cache.contains("k"));
    assert_eq!(cache.len(), 0);
}

#[test]
fn cache_purge_expired_only_removes_expired() {
    let mut cache = CacheStore::new(1_000_000);
    cache.set("ttl".to_string(), ids(1), 10, 0, Some(10));
    cache.set("keep".to_string(), ids(1), 10, 0, None);

    assert_eq!(cache.purge_expired(100), 1);
    assert!(!cache.contains("ttl"));
    assert!(cache.contains("keep"));
}

#[test]
fn cache_hit_rate_tracks_lookups() {
    let mut cache = CacheStore::new(1_000_000);
    cache.set("k".to_string(), ids(1), 10, 0, None);

    assert!(cache.get("k", 1).is_some());
    assert!(cache.get("missing", 1).is_none());
    assert!((cache.hit_rate() - 0.5).abs() < f64::EPSILON);

    let entry = cache.peek("k").unwrap();
    assert_eq!(entry.access_count, 1);
    assert_eq!(entry.last_accessed_ms, 1);
}

// ---- progressive loading -----------------------------------------------

/// Provider that returns `full_chunks` batches of `chunk_size`, then an
/// empty batch, counting every call.
fn counting_provider(
    chunk_size: usize,
    full_chunks: usize,
    calls: Arc<AtomicU64>,
) -> impl FnMut(usize, usize) -> Result<Vec<u64>, ProviderError> {
    move |offset, size| {
        calls.fetch_add(1, Ordering::SeqCst);
        if offset >= chunk_size * full_chunks {
            return Ok(Vec::new());
        }
        Ok((offset as u64..(offset + size) as u64).collect())
    }
}

#[test]
fn progressive_load_terminates_on_empty_batch() {
    let calls = Arc::new(AtomicU64::new(0));
    let mut provider = counting_provider(100, 3, Arc::clone(&calls));
    let opts = LoadingOptions::default()
        .with_chunk_size(100)
        .with_load_delay_ms(10);
    let mut loader = ProgressiveLoader::new(opts);

    let mut now_ms = 0;
    loop {
        match loader.poll(now_ms, &mut provider) {
            LoadPoll::Pending | LoadPoll::Progress { .. } => now_ms += 10,
            LoadPoll::Complete => break,
            LoadPoll::Failed(e) => panic!("unexpected failure: {e}"),
        }
    }

    // 3 full chunks + the terminating empty batch, then nothing more.
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(loader.data(), &ids(300)[..]);
    assert_eq!(loader.poll(now_ms + 100, &mut provider), LoadPoll::Complete);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn progressive_load_short_batch_means_done() {
    let mut provider = |offset: usize, _size: usize| -> Result<Vec<u64>, ProviderError> {
        assert_eq!(offset, 0, "a short batch must stop further fetches");
        Ok(vec![1, 2, 3])
    };
    let opts = LoadingOptions::default().with_chunk_size(10);
    let mut loader = ProgressiveLoader::new(opts);

    assert_eq!(loader.poll(0, &mut provider), LoadPoll::Complete);
    assert!(loader.is_complete());
    assert_eq!(loader.into_partial(), vec![1, 2, 3]);
}

#[test]
fn progressive_load_respects_load_delay() {
    let calls = Arc::new(AtomicU64::new(0));
    let mut provider = counting_provider(10, 5, Arc::clone(&calls));
    let opts = LoadingOptions::default()
        .with_chunk_size(10)
        .with_load_delay_ms(100);
    let mut loader = ProgressiveLoader::new(opts);

    assert!(matches!(loader.poll(0, &mut provider), LoadPoll::Progress { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Inside the delay window: no provider call.
    assert_eq!(loader.poll(50, &mut provider), LoadPoll::Pending);
    assert_eq!(loader.poll(99, &mut provider), LoadPoll::Pending);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(loader.next_due_ms(), Some(100));

    assert!(matches!(loader.poll(100, &mut provider), LoadPoll::Progress { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn progressive_load_failure_keeps_partial_accumulation() {
    let mut call = 0u32;
    let mut provider = move |offset: usize, size: usize| -> Result<Vec<u64>, ProviderError> {
        call += 1;
        if call <= 2 {
            Ok((offset as u64..(offset + size) as u64).collect())
        } else {
            Err(ProviderError::new(offset, "connection reset"))
        }
    };
    let opts = LoadingOptions::default()
        .with_chunk_size(10)
        .with_load_delay_ms(0);
    let mut loader = ProgressiveLoader::new(opts);

    loop {
        match loader.poll(0, &mut provider) {
            LoadPoll::Progress { .. } | LoadPoll::Pending => {}
            LoadPoll::Failed(e) => {
                assert_eq!(e.offset, 20);
                break;
            }
            LoadPoll::Complete => panic!("expected a failure"),
        }
    }

    assert!(loader.is_terminal());
    assert!(!loader.is_complete());
    assert_eq!(loader.error().unwrap().offset, 20);
    // The two successful chunks survive the failure.
    assert_eq!(loader.into_partial(), ids(20));
}

// ---- chunk registry ----------------------------------------------------

#[test]
fn chunk_requests_coalesce_on_one_fetch() {
    let mut registry: ChunkRegistry<u64> = ChunkRegistry::new();
    let key = ChunkKey::new(100, 50);

    let (first, req1) = registry.request(key, 0);
    let (second, req2) = registry.request(key, 1);
    assert_eq!(req1, ChunkRequest::Fetch);
    assert_eq!(req2, ChunkRequest::Joined);
    assert_eq!(first.state(), LoadState::Loading);
    assert!(second.try_data().is_none());

    assert!(registry.resolve(key, ids(50), 2));

    // Both handles observe the completion immediately.
    assert_eq!(first.state(), LoadState::Loaded);
    assert_eq!(second.state(), LoadState::Loaded);
    assert_eq!(second.try_data().unwrap().len(), 50);

    let (_, req3) = registry.request(key, 3);
    assert_eq!(req3, ChunkRequest::Settled);
}

#[test]
fn chunk_failure_resolves_joined_handles_with_error() {
    let mut registry: ChunkRegistry<u64> = ChunkRegistry::new();
    let key = ChunkKey::new(0, 10);

    let (_, _) = registry.request(key, 0);
    let (joined, _) = registry.request(key, 0);
    assert!(registry.fail(key, ProviderError::new(0, "boom"), 1));

    assert_eq!(joined.state(), LoadState::Error);
    assert_eq!(joined.error().unwrap().message, "boom");
    assert!(joined.try_data().is_none());
}

#[test]
fn chunk_state_machine_is_monotonic() {
    assert!(LoadState::Idle.can_transition_to(LoadState::Loading));
    assert!(LoadState::Loading.can_transition_to(LoadState::Loaded));
    assert!(LoadState::Loading.can_transition_to(LoadState::Error));
    assert!(!LoadState::Loaded.can_transition_to(LoadState::Loading));
    assert!(!LoadState::Error.can_transition_to(LoadState::Loading));
    assert!(!LoadState::Loaded.can_transition_to(LoadState::Idle));
    // Terminal states are absorbing even onto themselves.
    assert!(!LoadState::Loaded.can_transition_to(LoadState::Loaded));
    assert!(!LoadState::Error.can_transition_to(LoadState::Error));

    let mut registry: ChunkRegistry<u64> = ChunkRegistry::new();
    let key = ChunkKey::new(0, 10);
    registry.request(key, 0);
    assert!(registry.resolve(key, ids(10), 1));
    // A loaded chunk never regresses: a second resolution is rejected.
    assert!(!registry.resolve(key, ids(10), 2));
    assert!(!registry.fail(key, ProviderError::new(0, "late"), 3));
}

#[test]
fn settled_chunks_keep_their_data_and_error() {
    let mut registry: ChunkRegistry<u64> = ChunkRegistry::new();

    // A resolved chunk's data survives a late duplicate resolution.
    let loaded = ChunkKey::new(0, 10);
    let (handle, _) = registry.request(loaded, 0);
    assert!(registry.resolve(loaded, ids(10), 1));
    let data = handle.try_data().unwrap();
    assert!(!registry.resolve(loaded, vec![99; 10], 2));
    assert!(Arc::ptr_eq(&data, &handle.try_data().unwrap()));

    // A failed chunk's error survives a late duplicate failure.
    let failed = ChunkKey::new(10, 10);
    let (handle, _) = registry.request(failed, 0);
    assert!(registry.fail(failed, ProviderError::new(10, "first"), 1));
    assert!(!registry.fail(failed, ProviderError::new(10, "second"), 2));
    assert_eq!(handle.error().unwrap().message, "first");
}

#[test]
fn stale_chunks_are_dropped_but_inflight_survive() {
    let mut registry: ChunkRegistry<u64> = ChunkRegistry::new();
    let settled = ChunkKey::new(0, 10);
    let inflight = ChunkKey::new(10, 10);

    registry.request(settled, 0);
    registry.resolve(settled, ids(10), 0);
    registry.request(inflight, 0);

    assert_eq!(registry.evict_stale(500, 100), 1);
    assert!(registry.get(&settled).is_none());
    assert!(registry.get(&inflight).is_some());
}

// ---- memory governor ---------------------------------------------------

#[test]
fn governor_housekeeps_below_threshold() {
    let opts = MemoryOptions::default()
        .with_max_cache_size(1000)
        .with_gc_threshold(0.8)
        .with_chunk_max_age_ms(100);
    let mut governor = MemoryGovernor::new(opts);
    let mut cache: CacheStore<String, Vec<u64>> = CacheStore::new(1000);
    let mut chunks: ChunkRegistry<u64> = ChunkRegistry::new();

    cache.set("ttl".to_string(), ids(1), 10, 0, Some(10));
    cache.set("keep".to_string(), ids(1), 10, 0, None);
    chunks.request(ChunkKey::new(0, 10), 0);
    chunks.resolve(ChunkKey::new(0, 10), ids(10), 0);

    let report = governor.manage(&mut cache, &mut chunks, 500);
    assert!(!report.gc_ran);
    assert_eq!(report.expired_purged, 1);
    assert_eq!(report.chunks_dropped, 1);
    assert_eq!(report.cache_evicted, 0);
    assert!(cache.contains("keep"));
}

#[test]
fn governor_evicts_under_pressure_and_calls_gc_hook() {
    let opts = MemoryOptions::default()
        .with_max_cache_size(100)
        .with_gc_threshold(0.5);
    let mut governor = MemoryGovernor::new(opts);
    let gc_called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&gc_called);
    governor.set_force_gc_hook(Some(move || flag.store(true, Ordering::SeqCst)));

    let mut cache: CacheStore<String, Vec<u64>> = CacheStore::new(100);
    let mut chunks: ChunkRegistry<u64> = ChunkRegistry::new();
    for i in 0..10 {
        cache.set(format!("k{i}"), ids(1), 6, i, None);
    }

    // usage = 60 / 100 > 0.5 → evict oldest 30 %.
    let report = governor.manage(&mut cache, &mut chunks, 100);
    assert!(report.gc_ran);
    assert!(report.forced_gc);
    assert_eq!(report.cache_evicted, 3);
    assert_eq!(cache.len(), 7);
    assert!(!cache.contains("k0"));
    assert!(!cache.contains("k1"));
    assert!(!cache.contains("k2"));
    assert!(gc_called.load(Ordering::SeqCst));
    assert_eq!(governor.gc_collections(), 1);
}

#[test]
fn explicit_force_gc_requires_a_hook() {
    let mut governor = MemoryGovernor::new(MemoryOptions::default());
    assert_eq!(
        governor.force_collect(),
        Err(EngineError::EnvironmentUnavailable("force_gc hook"))
    );

    let calls = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&calls);
    governor.set_force_gc_hook(Some(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    assert!(governor.force_collect().is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(governor.gc_collections(), 1);
}

#[test]
fn governor_prefers_host_probe_when_installed() {
    let opts = MemoryOptions::default().with_gc_threshold(0.5);
    let mut governor = MemoryGovernor::new(opts);
    governor.set_memory_probe(Some(|| 0.9));

    let cache: CacheStore<String, Vec<u64>> = CacheStore::new(1000);
    let chunks: ChunkRegistry<u64> = ChunkRegistry::new();
    assert!((governor.usage_ratio(&cache, &chunks) - 0.9).abs() < f64::EPSILON);
}

// ---- metrics -----------------------------------------------------------

#[test]
fn metrics_history_is_bounded() {
    let opts = MonitoringOptions::default()
        .with_interval_ms(10)
        .with_history_size(5);
    let mut metrics = MetricsCollector::new(opts);

    for i in 0..10u64 {
        metrics.collect(i * 10, 0.1, 0.0, 0, 0);
    }
    assert_eq!(metrics.history().len(), 5);
    // Oldest samples were dropped.
    assert_eq!(metrics.history().front().unwrap().timestamp_ms, 50);
    assert_eq!(metrics.latest().unwrap().timestamp_ms, 90);
}

#[test]
fn frame_rate_uses_rolling_one_second_windows() {
    let mut metrics = MetricsCollector::new(MonitoringOptions::default());

    // 60 frames spread over exactly one second.
    for i in 0..=60u64 {
        metrics.on_frame(i * 1000 / 60);
    }
    assert!((metrics.frame_rate() - 60.0).abs() < 1.5);
}

#[test]
fn alert_thresholds_fire_independently() {
    let thresholds = AlertThresholds::default();

    let bad = PerformanceSample {
        memory_usage: 0.9,
        render_time_ms: 100.0,
        frame_rate: 20.0,
        ..PerformanceSample::default()
    };
    let alerts = MetricsCollector::alerts_for(&bad, &thresholds);
    assert_eq!(
        alerts,
        vec![AlertKind::Memory, AlertKind::RenderTime, AlertKind::FrameRate]
    );

    let good = PerformanceSample {
        memory_usage: 0.5,
        render_time_ms: 10.0,
        frame_rate: 60.0,
        ..PerformanceSample::default()
    };
    assert!(MetricsCollector::alerts_for(&good, &thresholds).is_empty());
}

// ---- optimization ------------------------------------------------------

#[test]
fn sampling_reduces_by_modulo_step() {
    let data = ids(20_000);
    let sampling = Sampling::new(10_000);
    let out = sampling.apply(data, ChartType::Line);

    assert!(out.len() <= 10_000);
    // step = ceil(20000 / 10000) = 2: kept indices are the even ones.
    for (i, v) in out.iter().enumerate() {
        assert_eq!(*v, (i * 2) as u64);
    }
}

#[test]
fn sampling_passes_small_inputs_through() {
    let data = ids(100);
    let sampling = Sampling::new(10_000);
    assert_eq!(sampling.apply(data.clone(), ChartType::Line), data);
}

#[test]
fn sampling_is_idempotent_below_threshold() {
    let sampling = Sampling::new(10_000);
    let once = sampling.apply(ids(20_000), ChartType::Line);
    let twice = sampling.apply(once.clone(), ChartType::Line);
    assert_eq!(once, twice);
}

#[test]
fn level_of_detail_reduces_toward_target() {
    let lod = LevelOfDetail::new(4);
    let out = lod.apply(ids(1000), ChartType::Line);
    // target = 1000 / 4 = 250; step = 4.
    assert_eq!(out.len(), 250);
    assert_eq!(out[1], 4);
}

#[test]
fn pipeline_runs_strategies_in_priority_order() {
    struct Tag {
        label: &'static str,
        priority: u32,
        order: Arc<Mutex<Vec<&'static str>>>,
    }
    impl OptimizationStrategy<u64> for Tag {
        fn name(&self) -> &'static str {
            self.label
        }
        fn priority(&self) -> u32 {
            self.priority
        }
        fn apply(&self, data: Vec<u64>, _chart_type: ChartType) -> Vec<u64> {
            self.order.lock().unwrap().push(self.label);
            data
        }
    }

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut pipeline: OptimizationPipeline<u64> = OptimizationPipeline::new();
    pipeline.add(Box::new(Tag {
        label: "late",
        priority: 20,
        order: Arc::clone(&order),
    }));
    pipeline.add(Box::new(Tag {
        label: "early",
        priority: 5,
        order: Arc::clone(&order),
    }));

    pipeline.apply(ids(10), ChartType::Bar);
    assert_eq!(*order.lock().unwrap(), vec!["early", "late"]);
}

#[test]
fn disabled_strategies_are_skipped() {
    let mut pipeline: OptimizationPipeline<u64> = OptimizationPipeline::new();
    pipeline.add(Box::new(Sampling::new(10).with_enabled(false)));
    assert_eq!(pipeline.apply(ids(100), ChartType::Line).len(), 100);
}

// ---- data provider -----------------------------------------------------

#[test]
fn memory_provider_caches_ranged_slices() {
    let mut provider = create_data_provider(ids(100), &MemoryOptions::default());
    assert_eq!(provider.len(), 100);
    assert_eq!(provider.get(42), Some(42));
    assert_eq!(provider.get(100), None);

    let slice = provider.fetch_range(10..20, 0);
    assert_eq!(slice.as_slice(), &ids(100)[10..20]);
    assert_eq!(provider.cached_slices(), 1);

    // Same range again: served from the slice cache.
    let again = provider.fetch_range(10..20, 1);
    assert!(Arc::ptr_eq(&slice, &again));
    assert_eq!(provider.cached_slices(), 1);

    // Out-of-range is clamped, not a panic.
    assert_eq!(provider.fetch_range(95..200, 2).len(), 5);
}

#[test]
fn memory_provider_serves_sequential_chunks() {
    let mut provider = create_data_provider(ids(25), &MemoryOptions::default());
    assert_eq!(provider.fetch(0, 10).unwrap().len(), 10);
    assert_eq!(provider.fetch(20, 10).unwrap().len(), 5);
    assert!(provider.fetch(25, 10).unwrap().is_empty());
}

// ---- engine ------------------------------------------------------------

fn quiet_options() -> EngineOptions {
    // Keep automatic cleanup/monitoring out of tests that assert on events.
    EngineOptions::new()
        .with_memory(MemoryOptions::default().with_auto_cleanup(false))
        .with_monitoring(MonitoringOptions::default().with_enabled(false))
}

#[test]
fn engine_load_progressively_returns_full_dataset() {
    let mut engine: Engine<u64> = Engine::new(
        quiet_options().with_loading(
            LoadingOptions::default()
                .with_chunk_size(1000)
                .with_load_delay_ms(0),
        ),
    );
    let log = capture_channels(&mut engine);

    let mut provider = create_data_provider(ids(2500), &MemoryOptions::default());
    let outcome = engine.load_progressively(&mut provider);

    assert!(outcome.completed);
    assert!(outcome.error.is_none());
    assert_eq!(outcome.items, ids(2500));
    // 1000 + 1000 + 500 (short batch terminates): three calls.
    assert_eq!(outcome.provider_calls, 3);

    let channels = log.lock().unwrap();
    assert_eq!(
        channels.iter().filter(|c| **c == "data:progress").count(),
        2
    );
}

#[test]
fn engine_load_failure_surfaces_error_and_partial_data() {
    let mut engine: Engine<u64> = Engine::new(
        quiet_options().with_loading(
            LoadingOptions::default()
                .with_chunk_size(10)
                .with_load_delay_ms(0),
        ),
    );
    let log = capture_channels(&mut engine);

    let mut call = 0u32;
    let mut provider = move |offset: usize, size: usize| -> Result<Vec<u64>, ProviderError> {
        call += 1;
        if call == 1 {
            Ok((offset as u64..(offset + size) as u64).collect())
        } else {
            Err(ProviderError::new(offset, "upstream gone"))
        }
    };
    let outcome = engine.load_progressively(&mut provider);

    assert!(!outcome.completed);
    assert_eq!(outcome.items, ids(10));
    assert_eq!(outcome.error.as_ref().unwrap().offset, 10);
    assert!(log.lock().unwrap().contains(&"data:error"));
}

#[test]
fn engine_cooperative_load_session() {
    let mut engine: Engine<u64> = Engine::new(
        quiet_options().with_loading(
            LoadingOptions::default()
                .with_chunk_size(10)
                .with_load_delay_ms(5),
        ),
    );
    let mut provider = create_data_provider(ids(25), &MemoryOptions::default());

    engine.begin_load();
    let mut now_ms = 0;
    loop {
        match engine.poll_load(now_ms, &mut provider) {
            LoadPoll::Pending | LoadPoll::Progress { .. } => now_ms += 5,
            LoadPoll::Complete => break,
            LoadPoll::Failed(e) => panic!("unexpected failure: {e}"),
        }
    }

    let outcome = engine.take_load().unwrap();
    assert!(outcome.completed);
    assert_eq!(outcome.items, ids(25));
    assert!(engine.take_load().is_none());
}

#[test]
fn engine_cache_roundtrip_and_clear_event() {
    let mut engine: Engine<u64> = Engine::new(quiet_options());
    let log = capture_channels(&mut engine);

    engine.set_cache_entry("slice:0:100", ids(100), 0, None);
    assert_eq!(engine.get_cache_entry("slice:0:100", 1).unwrap().len(), 100);
    assert!(engine.get_cache_entry("slice:other", 1).is_none());

    engine.clear_cache();
    assert_eq!(engine.cache_len(), 0);
    assert!(log.lock().unwrap().contains(&"cache:cleared"));
}

#[test]
fn engine_tick_collects_metrics_and_raises_alerts() {
    let mut engine: Engine<u64> = Engine::new(
        EngineOptions::new()
            .with_memory(MemoryOptions::default().with_auto_cleanup(false))
            .with_monitoring(MonitoringOptions::default().with_interval_ms(1000)),
    );
    let log = capture_channels(&mut engine);
    engine.set_memory_probe(Some(|| 0.9));
    engine.record_render(100.0);

    // Two frames a second apart: a 1 fps rolling window.
    engine.on_frame(0);
    engine.on_frame(1000);
    engine.tick(2000);

    let channels = log.lock().unwrap();
    assert!(channels.contains(&"metrics:collected"));
    assert!(channels.contains(&"alert:memory"));
    assert!(channels.contains(&"alert:render-time"));
    assert!(channels.contains(&"alert:frame-rate"));
    drop(channels);

    let snapshot = engine.get_metrics();
    let latest = snapshot.latest.unwrap();
    assert!((latest.memory_usage - 0.9).abs() < f64::EPSILON);
    assert!((latest.frame_rate - 1.0).abs() < f64::EPSILON);
}

#[test]
fn no_frame_rate_alert_before_a_window_closes() {
    let mut engine: Engine<u64> = Engine::new(
        EngineOptions::new()
            .with_memory(MemoryOptions::default().with_auto_cleanup(false))
            .with_monitoring(MonitoringOptions::default().with_interval_ms(1000)),
    );
    let log = capture_channels(&mut engine);

    // No frames at all: samples are collected but a frame rate of zero
    // means "unmeasured", not "stalled".
    engine.tick(0);
    engine.tick(1000);
    let channels = log.lock().unwrap();
    assert!(channels.contains(&"metrics:collected"));
    assert!(!channels.contains(&"alert:frame-rate"));
    drop(channels);

    // Once a window closes, a genuinely slow rate does alert.
    engine.on_frame(1000);
    engine.on_frame(2000);
    engine.tick(2000);
    assert!(log.lock().unwrap().contains(&"alert:frame-rate"));
}

#[test]
fn engine_tick_respects_collection_interval() {
    let mut engine: Engine<u64> = Engine::new(
        EngineOptions::new()
            .with_memory(MemoryOptions::default().with_auto_cleanup(false))
            .with_monitoring(MonitoringOptions::default().with_interval_ms(1000)),
    );
    let log = capture_channels(&mut engine);

    engine.tick(0);
    engine.tick(100); // within the interval: no second sample
    engine.tick(1000);

    let collected = log
        .lock()
        .unwrap()
        .iter()
        .filter(|c| **c == "metrics:collected")
        .count();
    assert_eq!(collected, 2);
}

#[test]
fn engine_auto_cleanup_runs_governor_from_tick() {
    let mut engine: Engine<u64> = Engine::new(
        EngineOptions::new()
            .with_memory(MemoryOptions::default().with_auto_cleanup(true))
            .with_monitoring(MonitoringOptions::default().with_enabled(false)),
    );
    let log = capture_channels(&mut engine);

    engine.set_cache_entry("expiring", ids(1), 0, Some(10));
    engine.tick(100);

    assert!(log.lock().unwrap().contains(&"memory:managed"));
    assert_eq!(engine.cache_len(), 0);
}

#[test]
fn engine_manage_memory_emits_gc_event_under_pressure() {
    let mut engine: Engine<u64> = Engine::new(quiet_options());
    let log = capture_channels(&mut engine);
    engine.set_memory_probe(Some(|| 0.95));

    engine.set_cache_entry("a", ids(10), 0, None);
    let report = engine.manage_memory(100);

    assert!(report.gc_ran);
    let channels = log.lock().unwrap();
    assert!(channels.contains(&"memory:managed"));
    assert!(channels.contains(&"memory:gc"));
}

#[test]
fn engine_applies_default_sampling_strategy() {
    let mut engine: Engine<u64> = Engine::new(
        quiet_options().with_memory(
            MemoryOptions::default()
                .with_auto_cleanup(false)
                .with_max_data_points(10_000),
        ),
    );
    let out = engine.apply_optimizations(ids(20_000), ChartType::Line);
    assert_eq!(out.len(), 10_000);
    assert_eq!(out[1], 2);
}

#[test]
fn engine_update_config_propagates_and_notifies() {
    let mut engine: Engine<u64> = Engine::new(quiet_options());
    let log = capture_channels(&mut engine);

    engine.set_cache_entry("a", ids(1), 0, None);
    engine.set_cache_entry("b", ids(1), 1, None);
    let bytes = engine.cache_bytes();
    assert!(bytes > 0);

    // Shrinking the budget below current usage must evict immediately.
    engine.update_config(|opts| {
        opts.memory.max_cache_size = bytes / 2;
        opts.virtualization.overscan = 7;
    });

    assert!(engine.cache_bytes() <= bytes / 2);
    assert_eq!(engine.options().virtualization.overscan, 7);
    assert!(log.lock().unwrap().contains(&"config:updated"));
}

#[test]
fn engine_chunk_join_api_shares_completion() {
    let mut engine: Engine<u64> = Engine::new(quiet_options());
    let log = capture_channels(&mut engine);
    let key = ChunkKey::new(0, 100);

    let (handle, request) = engine.request_chunk(key, 0);
    assert_eq!(request, ChunkRequest::Fetch);
    let (joined, request) = engine.request_chunk(key, 1);
    assert_eq!(request, ChunkRequest::Joined);

    assert!(engine.resolve_chunk(key, ids(100), 2));
    assert_eq!(handle.try_data().unwrap().len(), 100);
    assert_eq!(joined.state(), LoadState::Loaded);

    let other = ChunkKey::new(100, 100);
    engine.request_chunk(other, 3);
    assert!(engine.fail_chunk(other, ProviderError::new(100, "nope"), 4));
    let errors = |log: &Mutex<Vec<&str>>| {
        log.lock()
            .unwrap()
            .iter()
            .filter(|c| **c == "data:error")
            .count()
    };
    assert_eq!(errors(&log), 1);

    // Failing an already-failed chunk is rejected and not re-announced.
    assert!(!engine.fail_chunk(other, ProviderError::new(100, "again"), 5));
    assert_eq!(errors(&log), 1);
}

#[test]
fn engine_virtualize_tracks_window_for_metrics() {
    let mut engine: Engine<u64> = Engine::new(
        EngineOptions::new()
            .with_virtualization(
                VirtualizationOptions::new(10)
                    .with_overscan(3)
                    .with_buffer_size(5),
            )
            .with_memory(MemoryOptions::default().with_auto_cleanup(false))
            .with_monitoring(MonitoringOptions::default().with_interval_ms(1000)),
    );

    let data = ids(1000);
    let slice = engine.virtualize(&data, Viewport::new(100, 200, 100));
    assert_eq!(slice.items.len(), 27);

    engine.tick(1000);
    assert_eq!(
        engine.get_metrics().latest.unwrap().virtualized_item_count,
        27
    );
}

#[test]
fn shutdown_is_all_or_nothing() {
    let mut engine: Engine<u64> = Engine::new(EngineOptions::new());
    let log = capture_channels(&mut engine);

    engine.set_cache_entry("k", ids(10), 0, None);
    engine.request_chunk(ChunkKey::new(0, 10), 0);
    engine.begin_load();
    engine.tick(0);

    engine.shutdown();
    assert!(!engine.is_running());
    assert_eq!(engine.cache_len(), 0);
    assert_eq!(engine.chunk_count(), 0);
    assert!(log.lock().unwrap().contains(&"engine:shutdown"));

    // No periodic notifications after teardown, and teardown is idempotent.
    let before = log.lock().unwrap().len();
    engine.tick(10_000);
    engine.on_frame(10_000);
    engine.shutdown();
    assert_eq!(log.lock().unwrap().len(), before);
}
