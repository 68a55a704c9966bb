use std::sync::Arc;

use crate::cache::CacheStore;
use crate::chunk::ChunkProvider;
use crate::{MemoryOptions, ProviderError};

/// Random-access data source consumed by the rendering layer.
pub trait DataProvider<T> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Option<T>;

    /// Fetches `range.start..range.end` (clamped to the dataset).
    fn fetch_range(&mut self, range: std::ops::Range<usize>, now_ms: u64) -> Arc<Vec<T>>;
}

/// An in-memory random-access + ranged-fetch facade over a source array.
///
/// Ranged fetches are cached on demand keyed by `(start, end)`, bounded by
/// the memory options' cache size, so repeated scrolling over the same window
/// does not re-slice the source.
pub struct MemoryProvider<T> {
    rows: Arc<Vec<T>>,
    slices: CacheStore<(usize, usize), Arc<Vec<T>>>,
}

/// Builds the standard in-memory provider for a source array.
pub fn create_data_provider<T: Clone>(source: Vec<T>, opts: &MemoryOptions) -> MemoryProvider<T> {
    MemoryProvider {
        rows: Arc::new(source),
        slices: CacheStore::new(opts.max_cache_size),
    }
}

impl<T: Clone> MemoryProvider<T> {
    pub fn from_arc(rows: Arc<Vec<T>>, opts: &MemoryOptions) -> Self {
        Self {
            rows,
            slices: CacheStore::new(opts.max_cache_size),
        }
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    /// Number of ranged slices currently cached.
    pub fn cached_slices(&self) -> usize {
        self.slices.len()
    }
}

impl<T: Clone> DataProvider<T> for MemoryProvider<T> {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.rows.get(index).cloned()
    }

    fn fetch_range(&mut self, range: std::ops::Range<usize>, now_ms: u64) -> Arc<Vec<T>> {
        let start = range.start.min(self.rows.len());
        let end = range.end.min(self.rows.len());
        let key = (start, end);

        if let Some(cached) = self.slices.get(&key, now_ms) {
            return Arc::clone(cached);
        }

        let slice = Arc::new(self.rows[start..end].to_vec());
        let size_bytes = (end - start) * size_of::<T>();
        self.slices
            .set(key, Arc::clone(&slice), size_bytes, now_ms, None);
        slice
    }
}

/// Sequential chunk reads over the same in-memory source, so a
/// `MemoryProvider` can also drive a progressive load.
impl<T: Clone> ChunkProvider<T> for MemoryProvider<T> {
    fn fetch(&mut self, offset: usize, chunk_size: usize) -> Result<Vec<T>, ProviderError> {
        if offset >= self.rows.len() {
            return Ok(Vec::new());
        }
        let end = (offset + chunk_size).min(self.rows.len());
        Ok(self.rows[offset..end].to_vec())
    }
}
