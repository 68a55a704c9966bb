//! A headless dataset virtualization and progressive loading engine for
//! interactive charts.
//!
//! This crate focuses on the resource-management core needed to scroll
//! through very large result sets (up to ~10^6 points) at interactive frame
//! rates: viewport → index-window math with overscan, a size-bounded LRU
//! cache, a chunked progressive loading protocol with request coalescing, a
//! periodic memory governor, a metrics/alerting loop, and an ordered
//! data-reduction pipeline.
//!
//! It is UI-agnostic and draws no pixels. A rendering layer is expected to:
//! - call [`Engine::virtualize`] on every scroll/resize and redraw only the
//!   returned items
//! - supply the asynchronous chunk-fetch callback ([`ChunkProvider`])
//! - drive [`Engine::tick`]/[`Engine::on_frame`] with its own clock
//! - subscribe to [`EngineEvent`] notifications to surface alerts
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod cache;
mod chunk;
mod engine;
mod error;
mod events;
mod memory;
mod metrics;
mod optimize;
mod options;
mod provider;
mod types;
mod viewport;

#[cfg(test)]
mod tests;

pub use cache::{CacheEntry, CacheStore};
pub use chunk::{
    ChunkHandle, ChunkProvider, ChunkRegistry, ChunkRequest, DataChunk, LoadPoll,
    ProgressiveLoader,
};
pub use engine::{Engine, LoadOutcome, MetricsSnapshot};
pub use error::{EngineError, ProviderError};
pub use events::{EngineEvent, EventBus, EventCallback, SubscriberId};
pub use memory::{ForceGcHook, MemoryGovernor, MemoryProbe, MemoryReport};
pub use metrics::{AlertKind, MetricsCollector};
pub use optimize::{LevelOfDetail, OptimizationPipeline, OptimizationStrategy, Sampling};
pub use options::{
    AlertThresholds, EngineOptions, LoadingOptions, MemoryOptions, MonitoringOptions,
    VirtualizationOptions,
};
pub use provider::{DataProvider, MemoryProvider, create_data_provider};
pub use types::{
    ChartType, ChunkKey, LoadState, PerformanceSample, SliceRange, Viewport, VirtualSlice,
};
pub use viewport::{virtualize, virtualize_range};
