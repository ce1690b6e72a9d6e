// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host-agnostic resize and collection-change inputs.
//!
//! The engine never observes the host directly. Instead a host (a native
//! resize observer, a polling loop, or a test calling methods by hand) feeds
//! a [`ResizeSignal`] and a [`CollectionDiffSignal`], and the scroller pulls
//! from them once per rendering tick. Dropping the signals releases whatever
//! observer backs them.

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::ops::Range;

use kurbo::Size;

/// A single change to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionDiff {
    /// `count` items were inserted before `index`.
    Insert {
        /// Position of the first inserted item.
        index: usize,
        /// Number of inserted items.
        count: usize,
    },
    /// `count` items starting at `index` were removed.
    Remove {
        /// Position of the first removed item.
        index: usize,
        /// Number of removed items.
        count: usize,
    },
    /// The item at `from` moved to `to` (indices after removal).
    Move {
        /// Original position.
        from: usize,
        /// New position.
        to: usize,
    },
    /// The item at `index` changed in place and may have a new extent.
    Update {
        /// Position of the changed item.
        index: usize,
    },
    /// The whole collection was replaced by one of length `len`.
    Reset {
        /// New collection length.
        len: usize,
    },
}

impl CollectionDiff {
    /// Collection length after applying this change to a collection of `len` items.
    #[must_use]
    pub const fn len_after(&self, len: usize) -> usize {
        match *self {
            Self::Insert { count, .. } => len.saturating_add(count),
            Self::Remove { index, count } => {
                if index >= len {
                    len
                } else {
                    let end = index.saturating_add(count);
                    len - ((if end < len { end } else { len }) - index)
                }
            }
            Self::Move { .. } | Self::Update { .. } => len,
            Self::Reset { len } => len,
        }
    }

    /// Indices whose item may differ after applying this change to a
    /// collection of `len` items.
    ///
    /// Views bound inside this range must be rebound even if their key and
    /// index look unchanged.
    #[must_use]
    pub fn stale_range(&self, len: usize) -> Range<usize> {
        match *self {
            Self::Insert { index, .. } => index.min(len)..self.len_after(len),
            Self::Remove { index, .. } => index.min(len)..len,
            Self::Move { from, to } => {
                from.min(to).min(len)..from.max(to).saturating_add(1).min(len)
            }
            Self::Update { index } => index.min(len)..index.saturating_add(1).min(len),
            Self::Reset { len } => 0..len,
        }
    }
}

/// Source of viewport size changes.
pub trait ResizeSignal {
    /// Returns the latest size observed since the previous call, if it changed.
    ///
    /// Implementations should coalesce: intermediate sizes inside one tick
    /// are never needed.
    fn take_size(&mut self) -> Option<Size>;
}

/// Source of collection changes.
pub trait CollectionDiffSignal {
    /// Moves all pending changes, in arrival order, into `out`.
    fn drain_diffs(&mut self, out: &mut Vec<CollectionDiff>);
}

impl<T: ResizeSignal + ?Sized> ResizeSignal for Rc<RefCell<T>> {
    fn take_size(&mut self) -> Option<Size> {
        self.borrow_mut().take_size()
    }
}

impl<T: CollectionDiffSignal + ?Sized> CollectionDiffSignal for Rc<RefCell<T>> {
    fn drain_diffs(&mut self, out: &mut Vec<CollectionDiff>) {
        self.borrow_mut().drain_diffs(out);
    }
}

/// A [`ResizeSignal`] fed by hand; keeps only the most recent size.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResizeSlot {
    pending: Option<Size>,
}

impl ResizeSlot {
    /// Records a new viewport size, replacing any size not yet taken.
    pub fn push(&mut self, size: Size) {
        self.pending = Some(size);
    }

    /// Returns `true` if a size is waiting to be applied.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl ResizeSignal for ResizeSlot {
    fn take_size(&mut self) -> Option<Size> {
        self.pending.take()
    }
}

/// A [`CollectionDiffSignal`] fed by hand.
#[derive(Debug, Default, Clone)]
pub struct DiffQueue {
    pending: VecDeque<CollectionDiff>,
}

impl DiffQueue {
    /// Queues a change.
    pub fn push(&mut self, diff: CollectionDiff) {
        self.pending.push_back(diff);
    }

    /// Number of queued changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl CollectionDiffSignal for DiffQueue {
    fn drain_diffs(&mut self, out: &mut Vec<CollectionDiff>) {
        out.extend(self.pending.drain(..));
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    use kurbo::Size;

    use super::{CollectionDiff, CollectionDiffSignal, DiffQueue, ResizeSignal, ResizeSlot};

    #[test]
    fn resize_slot_keeps_only_latest() {
        let mut slot = ResizeSlot::default();
        slot.push(Size::new(100.0, 100.0));
        slot.push(Size::new(100.0, 250.0));
        assert!(slot.is_pending());
        assert_eq!(slot.take_size(), Some(Size::new(100.0, 250.0)));
        assert_eq!(slot.take_size(), None);
    }

    #[test]
    fn shared_queue_preserves_arrival_order() {
        let queue = Rc::new(RefCell::new(DiffQueue::default()));
        let mut attached = Rc::clone(&queue);
        queue.borrow_mut().push(CollectionDiff::Insert { index: 0, count: 2 });
        queue.borrow_mut().push(CollectionDiff::Remove { index: 1, count: 1 });

        let mut out = Vec::new();
        attached.drain_diffs(&mut out);
        assert_eq!(
            out,
            [
                CollectionDiff::Insert { index: 0, count: 2 },
                CollectionDiff::Remove { index: 1, count: 1 },
            ]
        );
        assert!(queue.borrow().is_empty());
    }

    #[test]
    fn len_after_matches_cache_semantics() {
        assert_eq!(CollectionDiff::Insert { index: 3, count: 2 }.len_after(5), 7);
        assert_eq!(CollectionDiff::Remove { index: 3, count: 9 }.len_after(5), 3);
        assert_eq!(CollectionDiff::Remove { index: 7, count: 1 }.len_after(5), 5);
        assert_eq!(CollectionDiff::Move { from: 0, to: 4 }.len_after(5), 5);
        assert_eq!(CollectionDiff::Reset { len: 12 }.len_after(5), 12);
    }

    #[test]
    fn stale_range_covers_items_that_may_have_changed() {
        assert_eq!(CollectionDiff::Update { index: 3 }.stale_range(10), 3..4);
        assert_eq!(CollectionDiff::Update { index: 12 }.stale_range(10), 10..10);
        assert_eq!(CollectionDiff::Reset { len: 10 }.stale_range(10), 0..10);
        assert_eq!(CollectionDiff::Insert { index: 2, count: 3 }.stale_range(10), 2..13);
        assert_eq!(CollectionDiff::Remove { index: 4, count: 2 }.stale_range(10), 4..10);
        assert_eq!(CollectionDiff::Move { from: 7, to: 2 }.stale_range(10), 2..8);
    }
}
