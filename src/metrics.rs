use std::collections::VecDeque;

use crate::{AlertThresholds, MonitoringOptions, PerformanceSample};

/// A threshold breach detected for one collected sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertKind {
    Memory,
    RenderTime,
    FrameRate,
}

/// Samples engine health at a fixed cadence into a bounded history.
///
/// Frame rate comes from counting `on_frame` calls over rolling one-second
/// windows; render/processing/load durations are recorded by the engine as
/// they happen and folded into the next collected sample.
#[derive(Debug)]
pub struct MetricsCollector {
    opts: MonitoringOptions,
    history: VecDeque<PerformanceSample>,
    last_collect_ms: Option<u64>,

    window_start_ms: Option<u64>,
    frames_in_window: u32,
    frame_rate: f64,

    render_time_ms: f64,
    data_processing_time_ms: f64,
    load_time_ms: f64,
}

impl MetricsCollector {
    pub fn new(opts: MonitoringOptions) -> Self {
        Self {
            history: VecDeque::with_capacity(opts.history_size),
            opts,
            last_collect_ms: None,
            window_start_ms: None,
            frames_in_window: 0,
            frame_rate: 0.0,
            render_time_ms: 0.0,
            data_processing_time_ms: 0.0,
            load_time_ms: 0.0,
        }
    }

    pub fn set_options(&mut self, opts: MonitoringOptions) {
        self.opts = opts;
        while self.history.len() > self.opts.history_size {
            self.history.pop_front();
        }
    }

    pub fn options(&self) -> &MonitoringOptions {
        &self.opts
    }

    /// Counts one animation frame. When the rolling one-second window rolls
    /// over, the observed frame rate is finalized for the next sample.
    pub fn on_frame(&mut self, now_ms: u64) {
        let Some(start) = self.window_start_ms else {
            self.window_start_ms = Some(now_ms);
            self.frames_in_window = 1;
            return;
        };
        let elapsed = now_ms.saturating_sub(start);
        if elapsed >= 1000 {
            self.frame_rate = self.frames_in_window as f64 * 1000.0 / elapsed as f64;
            self.window_start_ms = Some(now_ms);
            self.frames_in_window = 1;
        } else {
            self.frames_in_window += 1;
        }
    }

    /// Latest finalized frame rate (frames per second).
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn record_render(&mut self, render_time_ms: f64) {
        self.render_time_ms = render_time_ms;
    }

    pub fn record_processing(&mut self, data_processing_time_ms: f64) {
        self.data_processing_time_ms = data_processing_time_ms;
    }

    pub fn record_load(&mut self, load_time_ms: f64) {
        self.load_time_ms = load_time_ms;
    }

    /// Whether the collection interval has elapsed.
    pub fn due(&self, now_ms: u64) -> bool {
        self.last_collect_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.opts.interval_ms)
    }

    /// Builds a sample from the latest observations and appends it to the
    /// bounded history (oldest dropped at capacity).
    pub fn collect(
        &mut self,
        now_ms: u64,
        memory_usage: f64,
        cache_hit_rate: f64,
        virtualized_item_count: usize,
        gc_collections: u64,
    ) -> PerformanceSample {
        let sample = PerformanceSample {
            render_time_ms: self.render_time_ms,
            memory_usage,
            data_processing_time_ms: self.data_processing_time_ms,
            virtualized_item_count,
            cache_hit_rate,
            frame_rate: self.frame_rate,
            load_time_ms: self.load_time_ms,
            gc_collections,
            timestamp_ms: now_ms,
        };

        self.history.push_back(sample);
        while self.history.len() > self.opts.history_size {
            self.history.pop_front();
        }
        self.last_collect_ms = Some(now_ms);
        ctrace!(
            frame_rate = sample.frame_rate,
            memory_usage = sample.memory_usage,
            "metrics collected"
        );
        sample
    }

    /// Evaluates each alert threshold independently against a sample.
    pub fn alerts_for(sample: &PerformanceSample, thresholds: &AlertThresholds) -> Vec<AlertKind> {
        let mut alerts = Vec::new();
        if sample.memory_usage > thresholds.memory_usage {
            alerts.push(AlertKind::Memory);
        }
        if sample.render_time_ms > thresholds.render_time_ms {
            alerts.push(AlertKind::RenderTime);
        }
        // A frame rate of zero means no window has closed yet; that is
        // "unmeasured", not "slow".
        if sample.frame_rate > 0.0 && sample.frame_rate < thresholds.min_frame_rate {
            alerts.push(AlertKind::FrameRate);
        }
        alerts
    }

    pub fn latest(&self) -> Option<&PerformanceSample> {
        self.history.back()
    }

    pub fn history(&self) -> &VecDeque<PerformanceSample> {
        &self.history
    }

    /// Drops history and frame-window state (used on shutdown).
    pub fn reset(&mut self) {
        self.history.clear();
        self.last_collect_ms = None;
        self.window_start_ms = None;
        self.frames_in_window = 0;
        self.frame_rate = 0.0;
    }
}
