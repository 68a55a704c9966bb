use crate::{SliceRange, VirtualSlice, Viewport, VirtualizationOptions};

/// Computes the index window for a viewport without touching the items.
///
/// Pure: identical inputs always yield identical outputs. For non-empty data
/// the window satisfies `0 <= start_index <= end_index <= len - 1`; empty
/// data yields `{start_index: 0, end_index: -1}`.
pub fn virtualize_range(len: usize, viewport: Viewport, opts: &VirtualizationOptions) -> SliceRange {
    if len == 0 {
        return SliceRange {
            total_height: 0,
            start_index: 0,
            end_index: -1,
        };
    }

    let item_height = opts.item_height.max(1);
    let total_height = len as u64 * item_height;
    let last = len - 1;

    if !opts.enabled {
        return SliceRange {
            total_height,
            start_index: 0,
            end_index: last as i64,
        };
    }

    // Clamp to the end so a viewport scrolled past the dataset still yields
    // a valid tail window.
    let raw_start = (viewport.start / item_height) as usize;
    let raw_start = raw_start.saturating_sub(opts.overscan).min(last);

    // ceil((start + height) / item_height), then overscan, clamped to the end.
    let bottom = viewport.start.saturating_add(viewport.height);
    let raw_end = (bottom.div_ceil(item_height)) as usize;
    let raw_end = raw_end.saturating_add(opts.overscan).min(last);

    let buffered_start = raw_start.saturating_sub(opts.buffer_size);
    let buffered_end = raw_end.saturating_add(opts.buffer_size).min(last);

    SliceRange {
        total_height,
        start_index: buffered_start,
        end_index: buffered_end as i64,
    }
}

/// Virtualizes a dataset against a viewport, cloning the windowed items.
///
/// See [`virtualize_range`] for the window math; this adds the
/// `data[start..=end]` slice. When virtualization is disabled the full
/// dataset is returned.
pub fn virtualize<T: Clone>(
    data: &[T],
    viewport: Viewport,
    opts: &VirtualizationOptions,
) -> VirtualSlice<T> {
    let range = virtualize_range(data.len(), viewport, opts);
    let items = if range.is_empty() {
        Vec::new()
    } else {
        data[range.start_index..=range.end_index as usize].to_vec()
    };
    ctrace!(
        len = data.len(),
        start_index = range.start_index,
        end_index = range.end_index,
        "virtualize"
    );
    VirtualSlice {
        items,
        total_height: range.total_height,
        start_index: range.start_index,
        end_index: range.end_index,
    }
}
