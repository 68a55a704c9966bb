/// The currently visible scroll window.
///
/// Offsets and `height` share the unit of `VirtualizationOptions::item_height`
/// (typically pixels). A `Viewport` is transient: callers build one per
/// scroll/resize event and pass it to [`crate::virtualize`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Viewport {
    pub start: u64,
    pub end: u64,
    pub height: u64,
}

impl Viewport {
    pub fn new(start: u64, end: u64, height: u64) -> Self {
        Self { start, end, height }
    }
}

/// The chart family a dataset is rendered as.
///
/// Strategies may use this to pick reduction behavior; the engine itself only
/// threads it through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChartType {
    Line,
    Bar,
    Area,
    Scatter,
}

/// The result of virtualizing a dataset against a viewport.
///
/// `end_index` is inclusive and signed: an empty input yields
/// `{items: [], total_height: 0, start_index: 0, end_index: -1}`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualSlice<T> {
    pub items: Vec<T>,
    pub total_height: u64,
    pub start_index: usize,
    pub end_index: i64,
}

impl<T> VirtualSlice<T> {
    pub fn is_empty(&self) -> bool {
        self.end_index < 0
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// The index window computed by [`crate::virtualize_range`].
///
/// Same contract as [`VirtualSlice`], minus the cloned items.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SliceRange {
    pub total_height: u64,
    pub start_index: usize,
    pub end_index: i64,
}

impl SliceRange {
    pub fn is_empty(&self) -> bool {
        self.end_index < 0
    }

    /// Number of indices in the window.
    pub fn len(&self) -> usize {
        if self.end_index < 0 {
            return 0;
        }
        (self.end_index as usize).saturating_sub(self.start_index) + 1
    }
}

/// Identifies a contiguous index range fetched and cached as a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkKey {
    pub offset: usize,
    pub len: usize,
}

impl ChunkKey {
    pub fn new(offset: usize, len: usize) -> Self {
        debug_assert!(len >= 1, "a chunk spans at least one index");
        Self { offset, len }
    }

    /// Inclusive end index of the range.
    pub fn end_index(&self) -> usize {
        self.offset + self.len.max(1) - 1
    }
}

/// Lifecycle of a chunk fetch.
///
/// Transitions are monotonic: `Idle → Loading → {Loaded | Error}`. The two
/// terminal states are absorbing; a loaded chunk never regresses to loading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Error,
}

impl LoadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Loaded | Self::Error)
    }

    pub(crate) fn rank(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Loading => 1,
            Self::Loaded | Self::Error => 2,
        }
    }

    /// Whether moving to `next` respects the monotonic state machine.
    ///
    /// Terminal states are absorbing: once a chunk is `Loaded` or `Error`,
    /// no further transition is accepted, not even onto itself, so a settled
    /// chunk's data or error can never be overwritten.
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self == next || next.rank() > self.rank()
    }
}

/// One observation of engine health, appended to the bounded metrics history.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PerformanceSample {
    pub render_time_ms: f64,
    /// Aggregate memory pressure as a ratio in `0..=1`.
    pub memory_usage: f64,
    pub data_processing_time_ms: f64,
    pub virtualized_item_count: usize,
    pub cache_hit_rate: f64,
    pub frame_rate: f64,
    pub load_time_ms: f64,
    pub gc_collections: u64,
    pub timestamp_ms: u64,
}
