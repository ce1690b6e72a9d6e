// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-item extents with a lazily maintained prefix-sum cache.

use alloc::vec;
use alloc::vec::Vec;
use core::ops::Range;

use crate::Scalar;

/// Per-item extents plus the start offset of every item.
///
/// `prefix_starts` always has the same length as `extents`; entries at or after
/// `dirty_from` are stale and are recomputed on demand, so an edit at index `i`
/// costs O(len - i) the next time an offset past `i` is read.
#[derive(Clone, Debug)]
pub(crate) struct PrefixSums<S: Scalar> {
    extents: Vec<S>,
    prefix_starts: Vec<S>,
    dirty_from: Option<usize>,
}

impl<S: Scalar> PrefixSums<S> {
    /// Takes ownership of already sanitized extents.
    pub(crate) fn from_extents(extents: Vec<S>) -> Self {
        let len = extents.len();
        Self {
            extents,
            prefix_starts: vec![S::zero(); len],
            dirty_from: Some(0),
        }
    }

    pub(crate) fn uniform(len: usize, extent: S) -> Self {
        Self::from_extents(vec![extent; len])
    }

    pub(crate) fn len(&self) -> usize {
        self.extents.len()
    }

    pub(crate) fn extent_at(&self, index: usize) -> S {
        self.extents.get(index).copied().unwrap_or_default()
    }

    /// Start offset of `index`; `index` must be in bounds.
    pub(crate) fn offset_at(&mut self, index: usize) -> S {
        self.ensure_prefix_through(index);
        self.prefix_starts[index]
    }

    pub(crate) fn total_extent(&mut self) -> S {
        match self.extents.len().checked_sub(1) {
            None => S::zero(),
            Some(last) => self.offset_at(last) + self.extents[last],
        }
    }

    /// Largest index whose start is at or before `target`.
    pub(crate) fn index_at_offset(&mut self, target: S) -> usize {
        let Some(last) = self.extents.len().checked_sub(1) else {
            return 0;
        };
        self.ensure_prefix_through(last);
        self.prefix_starts
            .partition_point(|start| *start <= target)
            .saturating_sub(1)
            .min(last)
    }

    /// Sets one extent, growing with copies of the last extent if needed.
    pub(crate) fn set_extent(&mut self, index: usize, extent: S) {
        if index >= self.extents.len() {
            let fill = self.extents.last().copied().unwrap_or_default();
            self.extents.resize(index + 1, fill);
            self.prefix_starts.resize(index + 1, S::zero());
        }
        if self.extents[index] != extent {
            self.extents[index] = extent;
            self.mark_dirty(index);
        }
    }

    pub(crate) fn insert(&mut self, index: usize, extents: impl Iterator<Item = S>) {
        let index = index.min(self.extents.len());
        self.extents.splice(index..index, extents);
        self.prefix_starts.resize(self.extents.len(), S::zero());
        self.mark_dirty(index);
    }

    pub(crate) fn remove(&mut self, range: Range<usize>) {
        let start = range.start;
        self.extents.drain(range);
        self.prefix_starts.truncate(self.extents.len());
        self.mark_dirty(start);
    }

    pub(crate) fn move_item(&mut self, from: usize, to: usize) {
        let extent = self.extents.remove(from);
        self.extents.insert(to, extent);
        self.mark_dirty(from.min(to));
    }

    fn mark_dirty(&mut self, index: usize) {
        self.dirty_from = Some(self.dirty_from.map_or(index, |d| d.min(index)));
    }

    fn ensure_prefix_through(&mut self, through: usize) {
        let len = self.extents.len();
        if len == 0 || through >= len {
            return;
        }
        let from = match self.dirty_from {
            Some(d) if d <= through => d,
            _ => return,
        };

        let mut pos = if from == 0 {
            S::zero()
        } else {
            self.prefix_starts[from - 1] + self.extents[from - 1]
        };
        for i in from..=through {
            self.prefix_starts[i] = pos;
            pos = pos + self.extents[i];
        }

        self.dirty_from = if through + 1 >= len {
            None
        } else {
            Some(through + 1)
        };
    }
}
