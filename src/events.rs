use std::sync::Arc;

use crate::{MemoryReport, PerformanceSample};

/// A typed engine notification.
///
/// Each variant corresponds to one notification channel, so subscribers get
/// compile-time guarantees about payload shape instead of matching on event
/// names.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// A progressive load accumulated one more full chunk.
    DataProgress { loaded: usize, offset: usize },
    /// A progressive load terminated early on a provider failure.
    DataError { offset: usize, message: String },
    /// A governor pass completed (routine housekeeping included).
    MemoryManaged { report: MemoryReport },
    /// The governor's over-threshold path ran.
    MemoryGc { usage: f64 },
    MetricsCollected { sample: PerformanceSample },
    AlertMemory { usage: f64 },
    AlertRenderTime { render_time_ms: f64 },
    AlertFrameRate { frame_rate: f64 },
    CacheCleared,
    ChunksCleared,
    ConfigUpdated,
    EngineShutdown,
}

impl EngineEvent {
    /// The legacy channel name for this notification.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::DataProgress { .. } => "data:progress",
            Self::DataError { .. } => "data:error",
            Self::MemoryManaged { .. } => "memory:managed",
            Self::MemoryGc { .. } => "memory:gc",
            Self::MetricsCollected { .. } => "metrics:collected",
            Self::AlertMemory { .. } => "alert:memory",
            Self::AlertRenderTime { .. } => "alert:render-time",
            Self::AlertFrameRate { .. } => "alert:frame-rate",
            Self::CacheCleared => "cache:cleared",
            Self::ChunksCleared => "chunks:cleared",
            Self::ConfigUpdated => "config:updated",
            Self::EngineShutdown => "engine:shutdown",
        }
    }
}

/// A callback fired for every emitted [`EngineEvent`].
pub type EventCallback = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// Identifies one subscription for later removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriberId(usize);

/// A minimal multi-subscriber registry.
///
/// Subscribers are invoked in subscription order on the caller's thread;
/// unsubscribing leaves a tombstone so ids stay stable.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Option<EventCallback>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, callback: impl Fn(&EngineEvent) + Send + Sync + 'static) -> SubscriberId {
        let id = SubscriberId(self.subscribers.len());
        self.subscribers.push(Some(Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        match self.subscribers.get_mut(id.0) {
            Some(slot @ Some(_)) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub fn emit(&self, event: &EngineEvent) {
        ctrace!(channel = event.channel(), "emit");
        for callback in self.subscribers.iter().flatten() {
            callback(event);
        }
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.iter().flatten().count()
    }
}
