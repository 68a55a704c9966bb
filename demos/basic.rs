// Example: virtualize a large dataset, load it progressively, and watch
// engine notifications.
use chartstream::{
    ChartType, Engine, EngineOptions, LoadingOptions, MemoryOptions, MonitoringOptions, Viewport,
    VirtualizationOptions, create_data_provider,
};

fn main() {
    let mut engine: Engine<u64> = Engine::new(
        EngineOptions::new()
            .with_virtualization(
                VirtualizationOptions::new(10)
                    .with_overscan(3)
                    .with_buffer_size(5),
            )
            .with_loading(
                LoadingOptions::default()
                    .with_chunk_size(25_000)
                    .with_load_delay_ms(0),
            )
            .with_memory(MemoryOptions::default().with_max_data_points(100_000))
            .with_monitoring(MonitoringOptions::default().with_interval_ms(1000)),
    );

    engine.subscribe(|event| println!("[event] {}", event.channel()));

    // Acquire the dataset chunk by chunk.
    let mut provider = create_data_provider((0..250_000u64).collect(), &MemoryOptions::default());
    let outcome = engine.load_progressively(&mut provider);
    println!(
        "loaded {} items in {} provider calls (completed={})",
        outcome.items.len(),
        outcome.provider_calls,
        outcome.completed
    );

    // Reduce point density before rendering.
    let reduced = engine.apply_optimizations(outcome.items, ChartType::Line);
    println!("reduced to {} points", reduced.len());

    // Per scroll event: render only the windowed slice.
    let slice = engine.virtualize(&reduced, Viewport::new(12_000, 0, 800));
    println!(
        "viewport window: indices {}..={} ({} items, total height {})",
        slice.start_index,
        slice.end_index,
        slice.len(),
        slice.total_height
    );

    // Per frame, with the host's clock.
    for now_ms in (0..3000u64).step_by(16) {
        engine.on_frame(now_ms);
        engine.tick(now_ms);
    }
    let metrics = engine.get_metrics();
    if let Some(sample) = metrics.latest {
        println!(
            "frame_rate={:.1} cache_hit_rate={:.2} virtualized={}",
            sample.frame_rate, sample.cache_hit_rate, sample.virtualized_item_count
        );
    }

    engine.shutdown();
}
