/// Controls [`crate::virtualize`] window sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualizationOptions {
    /// Fixed item height, in the same unit as viewport offsets. Never zero.
    pub item_height: u64,
    /// Extra indices rendered beyond the strictly visible window.
    pub overscan: usize,
    /// Additional index margin applied after overscan.
    pub buffer_size: usize,
    /// When disabled, `virtualize` returns the full dataset.
    pub enabled: bool,
}

impl Default for VirtualizationOptions {
    fn default() -> Self {
        Self {
            item_height: 1,
            overscan: 3,
            buffer_size: 5,
            enabled: true,
        }
    }
}

impl VirtualizationOptions {
    pub fn new(item_height: u64) -> Self {
        Self {
            item_height: item_height.max(1),
            ..Self::default()
        }
    }

    pub fn with_item_height(mut self, item_height: u64) -> Self {
        self.item_height = item_height.max(1);
        self
    }

    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Controls the progressive loading cadence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoadingOptions {
    /// Number of items requested from the provider per call. Never zero.
    pub chunk_size: usize,
    /// Suspension between provider calls, so the owning render loop is not
    /// starved by a long progressive load.
    pub load_delay_ms: u64,
    /// Accepted but not wired into any retry logic; a failed fetch is never
    /// retried. Kept so existing configuration round-trips unchanged.
    pub retry_attempts: u32,
    /// Accepted but not wired into any abort logic; a slow fetch is never
    /// timed out. Kept so existing configuration round-trips unchanged.
    pub timeout_ms: u64,
}

impl Default for LoadingOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            load_delay_ms: 100,
            retry_attempts: 3,
            timeout_ms: 10_000,
        }
    }
}

impl LoadingOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_load_delay_ms(mut self, load_delay_ms: u64) -> Self {
        self.load_delay_ms = load_delay_ms;
        self
    }
}

/// Controls cache and governor limits.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryOptions {
    /// Upper bound on bytes held by the cache after any insertion settles.
    pub max_cache_size: usize,
    /// Point budget fed to the default sampling strategy.
    pub max_data_points: usize,
    /// Memory-usage ratio (`0..=1`) above which the governor evicts.
    pub gc_threshold: f64,
    /// When enabled, `Engine::tick` runs the governor periodically.
    pub auto_cleanup: bool,
    /// A chunk idle longer than this is dropped by routine housekeeping.
    pub chunk_max_age_ms: u64,
    /// Cadence of the automatic governor pass.
    pub cleanup_interval_ms: u64,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            max_cache_size: 50 * 1024 * 1024,
            max_data_points: 1_000_000,
            gc_threshold: 0.8,
            auto_cleanup: true,
            chunk_max_age_ms: 300_000,
            cleanup_interval_ms: 30_000,
        }
    }
}

impl MemoryOptions {
    pub fn with_max_cache_size(mut self, max_cache_size: usize) -> Self {
        self.max_cache_size = max_cache_size;
        self
    }

    pub fn with_max_data_points(mut self, max_data_points: usize) -> Self {
        self.max_data_points = max_data_points.max(1);
        self
    }

    pub fn with_gc_threshold(mut self, gc_threshold: f64) -> Self {
        self.gc_threshold = gc_threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_auto_cleanup(mut self, auto_cleanup: bool) -> Self {
        self.auto_cleanup = auto_cleanup;
        self
    }

    pub fn with_chunk_max_age_ms(mut self, chunk_max_age_ms: u64) -> Self {
        self.chunk_max_age_ms = chunk_max_age_ms;
        self
    }
}

/// Alert boundaries evaluated against each collected sample.
///
/// Each threshold raises its own distinct notification; values within bounds
/// raise nothing.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlertThresholds {
    pub memory_usage: f64,
    /// 16.67 ms is one frame at 60 fps.
    pub render_time_ms: f64,
    pub min_frame_rate: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            memory_usage: 0.8,
            render_time_ms: 16.67,
            min_frame_rate: 30.0,
        }
    }
}

/// Controls the metrics collector.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MonitoringOptions {
    pub enabled: bool,
    /// Sample collection cadence.
    pub interval_ms: u64,
    /// Bound on the sample history ring buffer.
    pub history_size: usize,
    pub alert_thresholds: AlertThresholds,
}

impl Default for MonitoringOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 1000,
            history_size: 100,
            alert_thresholds: AlertThresholds::default(),
        }
    }
}

impl MonitoringOptions {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms.max(1);
        self
    }

    pub fn with_history_size(mut self, history_size: usize) -> Self {
        self.history_size = history_size.max(1);
        self
    }

    pub fn with_alert_thresholds(mut self, alert_thresholds: AlertThresholds) -> Self {
        self.alert_thresholds = alert_thresholds;
        self
    }
}

/// Constructor-time configuration for [`crate::Engine`].
///
/// Plain data, cheap to clone. Strategies are configured on the engine itself
/// (`add_strategy`) since boxed trait objects are not configuration data.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineOptions {
    pub virtualization: VirtualizationOptions,
    pub loading: LoadingOptions,
    pub memory: MemoryOptions,
    pub monitoring: MonitoringOptions,
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_virtualization(mut self, virtualization: VirtualizationOptions) -> Self {
        self.virtualization = virtualization;
        self
    }

    pub fn with_loading(mut self, loading: LoadingOptions) -> Self {
        self.loading = loading;
        self
    }

    pub fn with_memory(mut self, memory: MemoryOptions) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_monitoring(mut self, monitoring: MonitoringOptions) -> Self {
        self.monitoring = monitoring;
        self
    }
}
