use crate::ChartType;

/// A data-reduction step applied before rendering.
///
/// Strategies run in ascending priority order, each consuming the previous
/// strategy's output. Implementations must be idempotent for input already
/// below their threshold: re-running on reduced data is a no-op.
pub trait OptimizationStrategy<T> {
    fn name(&self) -> &'static str;

    fn priority(&self) -> u32;

    fn enabled(&self) -> bool {
        true
    }

    fn apply(&self, data: Vec<T>, chart_type: ChartType) -> Vec<T>;
}

fn modulo_step_reduce<T>(data: Vec<T>, target: usize) -> Vec<T> {
    let len = data.len();
    if target == 0 || len <= target {
        return data;
    }
    let step = len.div_ceil(target);
    data.into_iter()
        .enumerate()
        .filter(|(i, _)| i % step == 0)
        .map(|(_, v)| v)
        .collect()
}

/// Keeps every `ceil(len / max_points)`-th element once `len` exceeds
/// `max_points`, preserving order; smaller inputs pass through unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sampling {
    pub max_points: usize,
    pub priority: u32,
    pub enabled: bool,
}

impl Sampling {
    pub fn new(max_points: usize) -> Self {
        Self {
            max_points: max_points.max(1),
            priority: 10,
            enabled: true,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl<T> OptimizationStrategy<T> for Sampling {
    fn name(&self) -> &'static str {
        "sampling"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn apply(&self, data: Vec<T>, _chart_type: ChartType) -> Vec<T> {
        if data.len() <= self.max_points {
            return data;
        }
        modulo_step_reduce(data, self.max_points)
    }
}

/// Reduces point density toward `len / levels`, preserving overall shape
/// for zoomed-out views. Inputs at or below the target pass through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelOfDetail {
    pub levels: usize,
    pub priority: u32,
    pub enabled: bool,
}

impl LevelOfDetail {
    pub fn new(levels: usize) -> Self {
        Self {
            levels: levels.max(1),
            priority: 20,
            enabled: true,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl<T> OptimizationStrategy<T> for LevelOfDetail {
    fn name(&self) -> &'static str {
        "level-of-detail"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn apply(&self, data: Vec<T>, _chart_type: ChartType) -> Vec<T> {
        let target = data.len() / self.levels.max(1);
        modulo_step_reduce(data, target)
    }
}

/// An ordered, configurable sequence of reduction strategies.
pub struct OptimizationPipeline<T> {
    strategies: Vec<Box<dyn OptimizationStrategy<T>>>,
}

impl<T> std::fmt::Debug for OptimizationPipeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&'static str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("OptimizationPipeline")
            .field("strategies", &names)
            .finish()
    }
}

impl<T> Default for OptimizationPipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OptimizationPipeline<T> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Adds a strategy, keeping the list ordered by ascending priority
    /// (stable: equal priorities keep insertion order).
    pub fn add(&mut self, strategy: Box<dyn OptimizationStrategy<T>>) {
        self.strategies.push(strategy);
        self.strategies.sort_by_key(|s| s.priority());
    }

    pub fn clear(&mut self) {
        self.strategies.clear();
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Runs all enabled strategies in priority order.
    pub fn apply(&self, data: Vec<T>, chart_type: ChartType) -> Vec<T> {
        let mut out = data;
        for strategy in &self.strategies {
            if !strategy.enabled() {
                continue;
            }
            out = strategy.apply(out, chart_type);
            ctrace!(
                strategy = strategy.name(),
                len = out.len(),
                "optimization applied"
            );
        }
        out
    }
}
