// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-item extents and cumulative offsets for a dense strip of items.

use alloc::vec::Vec;

use crate::prefix_sum::PrefixSums;
use crate::{CollectionDiff, ItemSize, Scalar};

/// Per-item extent lookup over a dense strip of items indexed `0..len`.
///
/// When every item shares one extent the cache stores only that extent and
/// answers offset and index queries with O(1) arithmetic. Otherwise it keeps
/// per-item extents plus a lazily maintained prefix-sum vector of item start
/// offsets; edits mark the prefix sums dirty from the first affected index so
/// only the suffix after an edit is ever recomputed.
///
/// Offsets are monotonically non-decreasing: `offset_at(i + 1) == offset_at(i) + size_at(i)`.
///
/// Methods that consult prefix sums take `&mut self` so the cache can be
/// refreshed on demand without interior mutability.
#[derive(Clone, Debug)]
pub struct SizeCache<S: Scalar> {
    storage: Storage<S>,
}

#[derive(Clone, Debug)]
enum Storage<S: Scalar> {
    Fixed { len: usize, extent: S },
    Variable(PrefixSums<S>),
}

impl<S: Scalar> Default for SizeCache<S> {
    fn default() -> Self {
        Self::fixed(0, S::zero())
    }
}

impl<S: Scalar> SizeCache<S> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache of `len` items that all share `extent`.
    ///
    /// Negative and non-finite extents are clamped to zero.
    #[must_use]
    pub fn fixed(len: usize, extent: S) -> Self {
        Self {
            storage: Storage::Fixed {
                len,
                extent: extent.sanitize(),
            },
        }
    }

    /// Builds a cache from a sequence of items and a size function.
    ///
    /// This is O(n). If every item reports the same extent the result uses
    /// fixed-extent arithmetic and drops the per-item storage.
    pub fn build<T, I>(items: I, size_fn: &dyn Fn(&T) -> S) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let extents = items
            .into_iter()
            .map(|item| size_fn(&item).sanitize())
            .collect();
        Self::from_extents(extents)
    }

    /// Builds a cache of `len` items by querying `extent_fn` for each index.
    pub fn from_fn(len: usize, extent_fn: &dyn Fn(usize) -> S) -> Self {
        let extents = (0..len).map(|i| extent_fn(i).sanitize()).collect();
        Self::from_extents(extents)
    }

    /// Builds a cache of `len` items sized by `item_size`.
    #[must_use]
    pub fn from_item_size(len: usize, item_size: &ItemSize<S>) -> Self {
        match item_size {
            ItemSize::Fixed(extent) => Self::fixed(len, *extent),
            ItemSize::Variable(extent_fn) => Self::from_fn(len, &**extent_fn),
        }
    }

    fn from_extents(extents: Vec<S>) -> Self {
        let Some(&first) = extents.first() else {
            return Self::new();
        };
        if extents.iter().all(|e| *e == first) {
            return Self::fixed(extents.len(), first);
        }
        Self {
            storage: Storage::Variable(PrefixSums::from_extents(extents)),
        }
    }

    /// Number of items in the cache.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Fixed { len, .. } => *len,
            Storage::Variable(sums) => sums.len(),
        }
    }

    /// Returns `true` if the cache holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the cache is using fixed-extent arithmetic.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self.storage, Storage::Fixed { .. })
    }

    /// Extent of the item at `index`, or zero past the end.
    #[must_use]
    pub fn size_at(&self, index: usize) -> S {
        match &self.storage {
            Storage::Fixed { len, extent } if index < *len => *extent,
            Storage::Fixed { .. } => S::zero(),
            Storage::Variable(sums) => sums.extent_at(index),
        }
    }

    /// Offset of the start of `index` from the start of the strip.
    ///
    /// Indices at or past the end return [`total_extent`](Self::total_extent).
    pub fn offset_at(&mut self, index: usize) -> S {
        if index >= self.len() {
            return self.total_extent();
        }
        match &mut self.storage {
            Storage::Fixed { extent, .. } => S::from_usize(index) * *extent,
            Storage::Variable(sums) => sums.offset_at(index),
        }
    }

    /// Total extent of all items.
    pub fn total_extent(&mut self) -> S {
        match &mut self.storage {
            Storage::Fixed { len, extent } => S::from_usize(*len) * *extent,
            Storage::Variable(sums) => sums.total_extent(),
        }
    }

    /// Index of the item containing `offset`.
    ///
    /// This is the largest index whose start is at or before `offset`, clamped
    /// into `0..len`. Negative offsets resolve to `0`; offsets past the end
    /// resolve to the last item. Zero-sized items never contain an offset, so
    /// the search skips past them.
    pub fn index_at_offset(&mut self, offset: S) -> usize {
        let len = self.len();
        if len == 0 {
            return 0;
        }
        let target = offset.sanitize();
        match &mut self.storage {
            Storage::Fixed { extent, .. } => fixed_index_at(target, *extent, len),
            Storage::Variable(sums) => sums.index_at_offset(target),
        }
    }

    /// Updates the extent of a single item.
    ///
    /// A fixed cache is promoted to per-item storage the first time an item
    /// diverges from the shared extent. Indices past the end grow the cache;
    /// new items copy the last known extent.
    pub fn set_extent(&mut self, index: usize, extent: S) {
        let extent = extent.sanitize();
        if let Storage::Fixed { len, extent: shared } = self.storage {
            if index < len && shared == extent {
                return;
            }
        }
        self.make_variable().set_extent(index, extent);
    }

    /// Applies an incremental collection change.
    ///
    /// `extent_fn` is consulted for inserted and updated items, using indices
    /// in the collection *after* the change. Only the affected suffix of the
    /// prefix sums is invalidated.
    pub fn apply_diff(&mut self, diff: CollectionDiff, extent_fn: &dyn Fn(usize) -> S) {
        match diff {
            CollectionDiff::Insert { index, count } => self.insert(index, count, extent_fn),
            CollectionDiff::Remove { index, count } => self.remove(index, count),
            CollectionDiff::Move { from, to } => self.move_item(from, to),
            CollectionDiff::Update { index } => {
                if index < self.len() {
                    self.set_extent(index, extent_fn(index));
                }
            }
            CollectionDiff::Reset { len } => *self = Self::from_fn(len, extent_fn),
        }
    }

    /// Rebuilds the cache from `extent_fn` if its length disagrees with `expected`.
    ///
    /// Returns `true` if a rebuild happened.
    pub fn ensure_len(&mut self, expected: usize, extent_fn: &dyn Fn(usize) -> S) -> bool {
        if self.len() == expected {
            return false;
        }
        *self = Self::from_fn(expected, extent_fn);
        true
    }

    fn insert(&mut self, index: usize, count: usize, extent_fn: &dyn Fn(usize) -> S) {
        if count == 0 {
            return;
        }
        let index = index.min(self.len());
        let new_extents = index..index + count;
        if let Storage::Fixed { len, extent } = &mut self.storage {
            let shared = *extent;
            if new_extents.clone().all(|i| extent_fn(i).sanitize() == shared) {
                *len += count;
                return;
            }
        }
        self.make_variable()
            .insert(index, new_extents.map(|i| extent_fn(i).sanitize()));
    }

    fn remove(&mut self, index: usize, count: usize) {
        let len = self.len();
        if index >= len || count == 0 {
            return;
        }
        let end = index.saturating_add(count).min(len);
        match &mut self.storage {
            Storage::Fixed { len, .. } => *len -= end - index,
            Storage::Variable(sums) => sums.remove(index..end),
        }
    }

    fn move_item(&mut self, from: usize, to: usize) {
        let len = self.len();
        if from == to || from >= len {
            return;
        }
        // Uniform extents are unaffected by reordering.
        if let Storage::Variable(sums) = &mut self.storage {
            sums.move_item(from, to.min(len - 1));
        }
    }

    fn make_variable(&mut self) -> &mut PrefixSums<S> {
        if let Storage::Fixed { len, extent } = self.storage {
            self.storage = Storage::Variable(PrefixSums::uniform(len, extent));
        }
        match &mut self.storage {
            Storage::Variable(sums) => sums,
            Storage::Fixed { .. } => unreachable!("fixed storage was just promoted"),
        }
    }
}

fn fixed_index_at<S: Scalar>(target: S, extent: S, len: usize) -> usize {
    if extent <= S::zero() {
        return len - 1;
    }
    #[allow(
        clippy::cast_sign_loss,
        reason = "Clamped to be non-negative before the cast"
    )]
    let mut index = (target / extent).floor_to_isize().max(0) as usize;
    // Division can land one ulp either side of an item boundary.
    if index < len && S::from_usize(index + 1) * extent <= target {
        index += 1;
    } else if index > 0 && S::from_usize(index) * extent > target {
        index -= 1;
    }
    index.min(len - 1)
}
