use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{ChunkKey, LoadState, LoadingOptions, ProviderError};

/// Supplies batches of items for progressive loading.
///
/// `fetch(offset, chunk_size)` returns up to `chunk_size` items starting at
/// `offset`. An empty batch, or a batch shorter than `chunk_size`, signals
/// that the dataset is exhausted.
pub trait ChunkProvider<T> {
    fn fetch(&mut self, offset: usize, chunk_size: usize) -> Result<Vec<T>, ProviderError>;
}

impl<T, F> ChunkProvider<T> for F
where
    F: FnMut(usize, usize) -> Result<Vec<T>, ProviderError>,
{
    fn fetch(&mut self, offset: usize, chunk_size: usize) -> Result<Vec<T>, ProviderError> {
        self(offset, chunk_size)
    }
}

/// Result of advancing a [`ProgressiveLoader`] by one poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadPoll {
    /// The load-delay window has not elapsed; no provider call was made.
    Pending,
    /// One full chunk was accumulated; more data is expected.
    Progress { loaded: usize, offset: usize },
    /// The provider signalled end-of-data; the accumulation is final.
    Complete,
    /// The provider failed; the partial accumulation is still available.
    Failed(ProviderError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum SessionState {
    Active,
    Complete,
    Failed(ProviderError),
}

/// Drives progressive, chunked acquisition of a full dataset.
///
/// The loader is tick-driven: callers invoke [`ProgressiveLoader::poll`] with
/// the current time, and the loader suspends itself between provider calls
/// for `load_delay_ms` by reporting [`LoadPoll::Pending`] until the delay
/// elapses. This keeps the protocol cooperative with a render loop without
/// the loader ever sleeping on its own.
///
/// Stop conditions: an empty batch, a batch shorter than `chunk_size`
/// (the "no more data" heuristic), or a provider failure. A failure
/// terminates the session early but keeps the partial accumulation.
///
/// `retry_attempts`/`timeout_ms` in [`LoadingOptions`] are deliberately not
/// consulted here; see the field docs.
#[derive(Clone, Debug)]
pub struct ProgressiveLoader<T> {
    opts: LoadingOptions,
    accumulated: Vec<T>,
    offset: usize,
    state: SessionState,
    next_due_ms: Option<u64>,
    provider_calls: u64,
}

impl<T> ProgressiveLoader<T> {
    pub fn new(opts: LoadingOptions) -> Self {
        Self {
            opts,
            accumulated: Vec::new(),
            offset: 0,
            state: SessionState::Active,
            next_due_ms: None,
            provider_calls: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.state, SessionState::Active)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, SessionState::Complete)
    }

    pub fn error(&self) -> Option<&ProviderError> {
        match &self.state {
            SessionState::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Items accumulated so far (the full dataset once complete).
    pub fn data(&self) -> &[T] {
        &self.accumulated
    }

    /// Consumes the session, yielding the accumulation: full on completion,
    /// partial after a failure.
    pub fn into_partial(self) -> Vec<T> {
        self.accumulated
    }

    pub fn provider_calls(&self) -> u64 {
        self.provider_calls
    }

    /// When the next provider call becomes due, if the loader is waiting.
    pub fn next_due_ms(&self) -> Option<u64> {
        self.next_due_ms
    }

    /// Advances the load by at most one provider call.
    pub fn poll(&mut self, now_ms: u64, provider: &mut dyn ChunkProvider<T>) -> LoadPoll {
        match &self.state {
            SessionState::Complete => return LoadPoll::Complete,
            SessionState::Failed(e) => return LoadPoll::Failed(e.clone()),
            SessionState::Active => {}
        }

        if self.next_due_ms.is_some_and(|due| now_ms < due) {
            return LoadPoll::Pending;
        }

        let chunk_size = self.opts.chunk_size.max(1);
        self.provider_calls += 1;
        match provider.fetch(self.offset, chunk_size) {
            Ok(batch) => {
                if batch.is_empty() {
                    self.state = SessionState::Complete;
                    self.next_due_ms = None;
                    cdebug!(total = self.accumulated.len(), "progressive load complete");
                    return LoadPoll::Complete;
                }
                let short = batch.len() < chunk_size;
                self.offset += batch.len();
                self.accumulated.extend(batch);
                if short {
                    self.state = SessionState::Complete;
                    self.next_due_ms = None;
                    cdebug!(total = self.accumulated.len(), "progressive load complete");
                    return LoadPoll::Complete;
                }
                self.next_due_ms = Some(now_ms.saturating_add(self.opts.load_delay_ms));
                ctrace!(
                    loaded = self.accumulated.len(),
                    offset = self.offset,
                    "progressive load progress"
                );
                LoadPoll::Progress {
                    loaded: self.accumulated.len(),
                    offset: self.offset,
                }
            }
            Err(e) => {
                cwarn!(
                    offset = self.offset,
                    partial = self.accumulated.len(),
                    error = %e,
                    "progressive load failed"
                );
                self.state = SessionState::Failed(e.clone());
                self.next_due_ms = None;
                LoadPoll::Failed(e)
            }
        }
    }
}

/// Shared completion state for one chunk.
///
/// Every requester of an in-flight chunk holds a [`ChunkHandle`] over the
/// same slot; when the fetch resolves, all handles observe the terminal
/// state immediately. This replaces joining an in-flight load by polling a
/// state flag at a fixed interval.
#[derive(Debug)]
struct ChunkSlot<T> {
    state: RefCell<LoadState>,
    data: RefCell<Option<Arc<Vec<T>>>>,
    error: RefCell<Option<ProviderError>>,
}

impl<T> ChunkSlot<T> {
    fn new() -> Self {
        Self {
            state: RefCell::new(LoadState::Idle),
            data: RefCell::new(None),
            error: RefCell::new(None),
        }
    }

    /// Applies a monotonic transition; returns false if the move would
    /// regress the state machine.
    fn transition(&self, next: LoadState) -> bool {
        let mut state = self.state.borrow_mut();
        let from = *state;
        if !from.can_transition_to(next) {
            cwarn!(from = ?from, to = ?next, "rejected chunk state regression");
            return false;
        }
        *state = next;
        true
    }
}

/// A requester's view of one chunk's shared completion state.
#[derive(Debug)]
pub struct ChunkHandle<T> {
    key: ChunkKey,
    slot: Arc<ChunkSlot<T>>,
}

impl<T> Clone for ChunkHandle<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> ChunkHandle<T> {
    pub fn key(&self) -> ChunkKey {
        self.key
    }

    pub fn state(&self) -> LoadState {
        *self.slot.state.borrow()
    }

    /// The chunk's data once loaded.
    pub fn try_data(&self) -> Option<Arc<Vec<T>>> {
        self.slot.data.borrow().clone()
    }

    pub fn error(&self) -> Option<ProviderError> {
        self.slot.error.borrow().clone()
    }
}

/// A chunk tracked by the registry: shared slot plus bookkeeping the memory
/// governor reads.
#[derive(Debug)]
pub struct DataChunk<T> {
    pub key: ChunkKey,
    slot: Arc<ChunkSlot<T>>,
    pub priority: u32,
    pub last_touched_ms: u64,
    pub size_bytes: usize,
}

impl<T> DataChunk<T> {
    pub fn state(&self) -> LoadState {
        *self.slot.state.borrow()
    }
}

/// Outcome of [`ChunkRegistry::request`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkRequest {
    /// The caller owns the fetch for this chunk.
    Fetch,
    /// The chunk is already in flight; the handle resolves when it settles.
    Joined,
    /// The chunk is already resolved (loaded or errored).
    Settled,
}

/// De-duplicates concurrent logical requests for the same chunk key.
#[derive(Debug, Default)]
pub struct ChunkRegistry<T> {
    chunks: HashMap<ChunkKey, DataChunk<T>>,
}

impl<T> ChunkRegistry<T> {
    pub fn new() -> Self {
        Self {
            chunks: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.chunks.values().map(|c| c.size_bytes).sum()
    }

    /// Requests a chunk. At most one requester per key is told to fetch;
    /// everyone else shares the same completion handle.
    pub fn request(&mut self, key: ChunkKey, now_ms: u64) -> (ChunkHandle<T>, ChunkRequest) {
        let chunk = self.chunks.entry(key).or_insert_with(|| DataChunk {
            key,
            slot: Arc::new(ChunkSlot::new()),
            priority: 0,
            last_touched_ms: now_ms,
            size_bytes: 0,
        });
        chunk.last_touched_ms = now_ms;

        let handle = ChunkHandle {
            key,
            slot: Arc::clone(&chunk.slot),
        };
        let request = match handle.state() {
            LoadState::Idle => {
                chunk.slot.transition(LoadState::Loading);
                ChunkRequest::Fetch
            }
            LoadState::Loading => ChunkRequest::Joined,
            LoadState::Loaded | LoadState::Error => ChunkRequest::Settled,
        };
        ctrace!(offset = key.offset, len = key.len, request = ?request, "chunk request");
        (handle, request)
    }

    /// Resolves an in-flight chunk with its data, waking all joined handles.
    pub fn resolve(&mut self, key: ChunkKey, data: Vec<T>, now_ms: u64) -> bool {
        let Some(chunk) = self.chunks.get_mut(&key) else {
            return false;
        };
        if !chunk.slot.transition(LoadState::Loaded) {
            return false;
        }
        chunk.size_bytes = data.len() * size_of::<T>();
        chunk.last_touched_ms = now_ms;
        *chunk.slot.data.borrow_mut() = Some(Arc::new(data));
        true
    }

    /// Fails an in-flight chunk, waking all joined handles with the error.
    pub fn fail(&mut self, key: ChunkKey, error: ProviderError, now_ms: u64) -> bool {
        let Some(chunk) = self.chunks.get_mut(&key) else {
            return false;
        };
        if !chunk.slot.transition(LoadState::Error) {
            return false;
        }
        chunk.last_touched_ms = now_ms;
        *chunk.slot.error.borrow_mut() = Some(error);
        true
    }

    pub fn get(&self, key: &ChunkKey) -> Option<&DataChunk<T>> {
        self.chunks.get(key)
    }

    /// Drops settled or idle chunks untouched for longer than `max_age_ms`.
    /// In-flight chunks are never dropped. Returns how many were removed.
    pub fn evict_stale(&mut self, now_ms: u64, max_age_ms: u64) -> usize {
        let before = self.chunks.len();
        self.chunks.retain(|_, chunk| {
            chunk.state() == LoadState::Loading
                || now_ms.saturating_sub(chunk.last_touched_ms) <= max_age_ms
        });
        before - self.chunks.len()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}
