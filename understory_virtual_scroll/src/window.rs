// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The window state machine: scroll position in, materialized index range out.

use alloc::vec::Drain;
use alloc::vec::Vec;
use core::ops::Range;

use bitflags::bitflags;

use crate::trace::{vtrace, vwarn};
use crate::{
    CollectionDiff, Diagnostic, ItemSize, Scalar, ScrollBroadcast, ScrollCoordinate,
    ScrollCoordinateMapper, SizeCache, WindowConfig, WindowEvent,
};

/// The contiguous range of indices that is materialized as views.
///
/// Invariant: `start_index + chunk_size <= total_count` of the owning calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WindowState {
    /// First materialized index.
    pub start_index: usize,
    /// Number of materialized items.
    pub chunk_size: usize,
}

impl WindowState {
    /// The empty window at index 0.
    pub const EMPTY: Self = Self::new(0, 0);

    /// Creates a window over `start_index..start_index + chunk_size`.
    #[must_use]
    pub const fn new(start_index: usize, chunk_size: usize) -> Self {
        Self {
            start_index,
            chunk_size,
        }
    }

    /// One past the last materialized index.
    #[must_use]
    pub const fn end_index(&self) -> usize {
        self.start_index + self.chunk_size
    }

    /// Returns `true` if nothing is materialized.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.chunk_size == 0
    }

    /// Returns `true` if `index` is materialized.
    #[must_use]
    pub const fn contains(&self, index: usize) -> bool {
        index >= self.start_index && index < self.end_index()
    }

    /// The materialized indices.
    #[must_use]
    pub const fn indices(&self) -> Range<usize> {
        self.start_index..self.end_index()
    }
}

bitflags! {
    /// Why a window transition happened.
    ///
    /// Several causes may accumulate between two calls to
    /// [`WindowCalculator::take_transition`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TransitionCause: u8 {
        /// First window after construction.
        const INIT = 1 << 0;
        /// The scroll position changed.
        const SCROLL = 1 << 1;
        /// The viewport extent changed.
        const RESIZE = 1 << 2;
        /// Items were inserted, removed, moved, replaced, or recounted.
        const DATA = 1 << 3;
        /// Item extents were re-measured.
        const SIZES = 1 << 4;
        /// The state was copied from a synchronization master.
        const SYNC = 1 << 5;
    }
}

/// A settled change from one window to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Window before the change (as last taken).
    pub previous: WindowState,
    /// Window after the change.
    pub next: WindowState,
    /// Accumulated causes.
    pub cause: TransitionCause,
    /// Indices whose items changed in place since the previous window.
    ///
    /// Views bound here are rebound even when their key and index match.
    pub stale: Range<usize>,
}

/// Processing phase of a [`WindowCalculator`].
///
/// Every input moves the calculator out of [`Phase::Idle`] and back again
/// before the input method returns; [`WindowCalculator::last_phase`] reports
/// which phase the most recent input went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// No input is being processed.
    #[default]
    Idle,
    /// A scroll position is being resolved.
    Scrolling,
    /// A viewport resize is being resolved.
    Resizing,
    /// A collection or sizing change is being resolved.
    DataChanging,
}

/// Alignment mode when scrolling a specific index into view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAlign {
    /// Align the start (top/leading edge) of the item with the viewport.
    Start,
    /// Center the item within the viewport.
    Center,
    /// Align the end (bottom/trailing edge) of the item with the viewport.
    End,
    /// Move just enough to make the item fully visible, preferring the
    /// smallest change from the current scroll offset.
    Nearest,
}

/// Converts a scroll position into a [`WindowState`].
///
/// The calculator owns the [`SizeCache`] and [`ScrollCoordinateMapper`] for
/// one strip. Every input (scroll, resize, data change) is resolved
/// synchronously: inputs are clamped, the window is recomputed, and a pending
/// [`Transition`] is recorded for the renderer to pick up with
/// [`take_transition`](Self::take_transition).
///
/// The calculator never panics on bad input. Negative or non-finite values are
/// clamped to zero and reported as [`Diagnostic`]s through
/// [`drain_events`](Self::drain_events).
#[derive(Debug)]
pub struct WindowCalculator<S: Scalar> {
    config: WindowConfig<S>,
    cache: SizeCache<S>,
    mapper: ScrollCoordinateMapper<S>,

    phase: Phase,
    last_phase: Phase,
    state: WindowState,
    committed: WindowState,
    pending: TransitionCause,
    stale: Range<usize>,

    virtual_offset: S,
    actual_offset: S,
    scrollbar_visible: bool,
    events: Vec<WindowEvent<S>>,
}

impl<S: Scalar> WindowCalculator<S> {
    /// Creates a calculator and computes the initial window at offset zero.
    ///
    /// The initial window is reported by the first call to
    /// [`take_transition`](Self::take_transition) with [`TransitionCause::INIT`].
    #[must_use]
    pub fn new(config: WindowConfig<S>) -> Self {
        let (config, diagnostics) = config.sanitized();
        let cache = SizeCache::from_item_size(config.total_count(), &config.item_size);
        let mapper = ScrollCoordinateMapper::new(config.platform_max_scroll);
        let mut calc = Self {
            config,
            cache,
            mapper,
            phase: Phase::Idle,
            last_phase: Phase::Idle,
            state: WindowState::EMPTY,
            committed: WindowState::EMPTY,
            pending: TransitionCause::empty(),
            stale: 0..0,
            virtual_offset: S::zero(),
            actual_offset: S::zero(),
            scrollbar_visible: false,
            events: Vec::new(),
        };
        for diagnostic in diagnostics {
            calc.report(diagnostic);
        }
        calc.enter(Phase::DataChanging);
        calc.refresh_extent();
        calc.place_virtual(S::zero());
        calc.settle(TransitionCause::INIT);
        calc
    }

    // --- Accessors -------------------------------------------------------

    /// Current configuration (sanitized).
    #[must_use]
    pub fn config(&self) -> &WindowConfig<S> {
        &self.config
    }

    /// Current window.
    #[must_use]
    pub const fn state(&self) -> WindowState {
        self.state
    }

    /// Current phase. Always [`Phase::Idle`] between calls.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Phase the most recent input went through.
    #[must_use]
    pub const fn last_phase(&self) -> Phase {
        self.last_phase
    }

    /// Number of items the window indexes over.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.config.total_count()
    }

    /// Viewport extent along the scroll axis.
    #[must_use]
    pub fn container_extent(&self) -> S {
        self.config.container_extent
    }

    /// Scroll offset in virtual coordinates.
    #[must_use]
    pub const fn scroll_offset(&self) -> S {
        self.virtual_offset
    }

    /// Scroll offset in platform coordinates.
    #[must_use]
    pub const fn actual_scroll_offset(&self) -> S {
        self.actual_offset
    }

    /// The current scroll position in both coordinate spaces.
    #[must_use]
    pub fn scroll_coordinate(&self) -> ScrollCoordinate<S> {
        ScrollCoordinate {
            virtual_position: self.virtual_offset,
            actual_position: self.actual_offset,
            ratio: self.mapper.ratio(),
        }
    }

    /// The coordinate mapper.
    #[must_use]
    pub fn mapper(&self) -> &ScrollCoordinateMapper<S> {
        &self.mapper
    }

    /// The size cache.
    #[must_use]
    pub fn size_cache(&self) -> &SizeCache<S> {
        &self.cache
    }

    /// Returns `true` if the content overflows the viewport.
    #[must_use]
    pub const fn scrollbar_visible(&self) -> bool {
        self.scrollbar_visible
    }

    /// Total virtual extent of the strip.
    pub fn total_extent(&mut self) -> S {
        self.sync_cache();
        self.cache.total_extent()
    }

    /// Summed extent of the materialized items.
    pub fn window_extent(&mut self) -> S {
        self.sync_cache();
        let WindowState {
            start_index,
            chunk_size,
        } = self.state;
        self.cache.offset_at(start_index + chunk_size) - self.cache.offset_at(start_index)
    }

    /// Virtual offset of the start of `index`.
    pub fn offset_at(&mut self, index: usize) -> S {
        self.sync_cache();
        self.cache.offset_at(index)
    }

    /// Position of the start of `index` relative to the start of the viewport.
    pub fn item_position(&mut self, index: usize) -> S {
        self.offset_at(index) - self.virtual_offset
    }

    // --- Queries ---------------------------------------------------------

    /// Index of the item at virtual `offset`.
    pub fn index_at_scroll(&mut self, offset: S) -> usize {
        self.sync_cache();
        self.cache.index_at_offset(offset)
    }

    /// Extent of the item at `index`.
    pub fn size_at(&mut self, index: usize) -> S {
        self.sync_cache();
        self.cache.size_at(index)
    }

    /// Virtual scroll offset that brings `index` into view with `align`.
    ///
    /// The result is clamped to the scrollable range.
    pub fn scroll_for_index(&mut self, index: usize, align: ScrollAlign) -> S {
        self.sync_cache();
        let len = self.cache.len();
        if len == 0 {
            return S::zero();
        }
        let index = index.min(len - 1);
        let item_start = self.cache.offset_at(index);
        let item_end = item_start + self.cache.size_at(index);
        let viewport = self.config.container_extent;

        let offset = match align {
            ScrollAlign::Start => item_start,
            ScrollAlign::End => item_end - viewport,
            ScrollAlign::Center => {
                let half = S::from_usize(2);
                (item_start + item_end) / half - viewport / half
            }
            ScrollAlign::Nearest => {
                let current = self.virtual_offset;
                if item_start >= current && item_end <= current + viewport {
                    current
                } else if item_start < current {
                    item_start
                } else {
                    item_end - viewport
                }
            }
        };
        offset
            .max(S::zero())
            .min(self.mapper.max_virtual(viewport))
    }

    /// Number of items that are fully inside the viewport.
    pub fn item_count_in_view(&mut self) -> usize {
        self.sync_cache();
        let len = self.cache.len();
        let view_start = self.virtual_offset;
        let view_end = view_start + self.config.container_extent;
        if len == 0 || self.config.container_extent <= S::zero() {
            return 0;
        }
        let mut index = self.cache.index_at_offset(view_start);
        if self.cache.offset_at(index) < view_start {
            index += 1;
        }
        let mut count = 0;
        while index < len && self.cache.offset_at(index + 1) <= view_end {
            count += 1;
            index += 1;
        }
        count
    }

    /// Returns `true` if `index` is not materialized in the current window.
    #[must_use]
    pub const fn is_index_outside_view(&self, index: usize) -> bool {
        !self.state.contains(index)
    }

    /// Returns `true` if the given index is fully visible within the viewport.
    pub fn is_index_fully_visible(&mut self, index: usize) -> bool {
        self.sync_cache();
        if index >= self.cache.len() {
            return false;
        }
        let item_start = self.cache.offset_at(index);
        let item_end = item_start + self.cache.size_at(index);
        let view_end = self.virtual_offset + self.config.container_extent;
        item_start >= self.virtual_offset && item_end <= view_end
    }

    /// Returns `true` if the given index overlaps the viewport at all.
    pub fn is_index_partially_visible(&mut self, index: usize) -> bool {
        self.sync_cache();
        if index >= self.cache.len() {
            return false;
        }
        let item_start = self.cache.offset_at(index);
        let item_end = item_start + self.cache.size_at(index);
        let view_end = self.virtual_offset + self.config.container_extent;
        item_end > self.virtual_offset && item_start < view_end
    }

    /// The first index overlapping the viewport, if any.
    pub fn first_visible_index(&mut self) -> Option<usize> {
        self.sync_cache();
        if self.cache.is_empty() || self.config.container_extent <= S::zero() {
            return None;
        }
        Some(self.cache.index_at_offset(self.virtual_offset))
    }

    /// The last index overlapping the viewport, if any.
    pub fn last_visible_index(&mut self) -> Option<usize> {
        let first = self.first_visible_index()?;
        let view_end = self.virtual_offset + self.config.container_extent;
        let mut last = self.cache.index_at_offset(view_end);
        if last > first && self.cache.offset_at(last) >= view_end {
            last -= 1;
        }
        Some(last)
    }

    // --- Scroll inputs ---------------------------------------------------

    /// Handles a platform scroll event at `raw_offset` (platform coordinates).
    ///
    /// The offset is clamped to the addressable range, mapped to virtual
    /// coordinates, and the window is recomputed.
    pub fn on_scroll(&mut self, raw_offset: S) {
        self.enter(Phase::Scrolling);
        self.check("scroll offset", raw_offset);
        self.sync_cache();
        let container = self.config.container_extent;
        let actual = raw_offset
            .sanitize()
            .min(self.mapper.max_actual(container));
        let virtual_offset = self
            .mapper
            .to_virtual(actual)
            .min(self.mapper.max_virtual(container));
        self.virtual_offset = virtual_offset;
        self.actual_offset = actual;
        self.state = self.window_at(virtual_offset);
        self.settle(TransitionCause::SCROLL);
    }

    /// Scrolls to a virtual offset.
    ///
    /// Returns `true` if the scroll position changed.
    pub fn scroll_to_offset(&mut self, virtual_offset: S) -> bool {
        self.enter(Phase::Scrolling);
        self.check("scroll offset", virtual_offset);
        self.sync_cache();
        let before = self.virtual_offset;
        self.place_virtual(virtual_offset);
        self.settle(TransitionCause::SCROLL);
        before != self.virtual_offset
    }

    /// Scrolls so that `index` starts at the leading edge (as far as the range allows).
    pub fn scroll_to(&mut self, index: usize) -> bool {
        let offset = self.offset_at(index);
        self.scroll_to_offset(offset)
    }

    /// Moves the first visible item out of view by exactly one item.
    pub fn scroll_next(&mut self) -> bool {
        let Some(first) = self.first_visible_index() else {
            return false;
        };
        if first + 1 >= self.cache.len() {
            return false;
        }
        let offset = self.cache.offset_at(first + 1);
        self.scroll_to_offset(offset)
    }

    /// Brings the previous item fully into view at the leading edge.
    ///
    /// If the first visible item is only partially visible, it is aligned first.
    pub fn scroll_prev(&mut self) -> bool {
        let Some(first) = self.first_visible_index() else {
            return false;
        };
        let first_start = self.cache.offset_at(first);
        let target = if self.virtual_offset > first_start {
            first_start
        } else if first > 0 {
            self.cache.offset_at(first - 1)
        } else {
            return false;
        };
        self.scroll_to_offset(target)
    }

    /// Scrolls forward by one viewport extent.
    pub fn scroll_next_page(&mut self) -> bool {
        let target = self.virtual_offset + self.config.container_extent;
        self.scroll_to_offset(target)
    }

    /// Scrolls backward by one viewport extent.
    pub fn scroll_prev_page(&mut self) -> bool {
        let target = (self.virtual_offset - self.config.container_extent).max(S::zero());
        self.scroll_to_offset(target)
    }

    /// Scrolls by a signed virtual `delta`.
    ///
    /// Returns `true` if the scroll position changed.
    pub fn add_scroll_top(&mut self, delta: S) -> bool {
        if !delta.is_finite() {
            self.check("scroll delta", delta);
            return false;
        }
        let target = (self.virtual_offset + delta).max(S::zero());
        self.scroll_to_offset(target)
    }

    /// Scrolls back to the start of the strip.
    pub fn reset_scroll_position(&mut self) -> bool {
        self.scroll_to_offset(S::zero())
    }

    // --- Resize and data inputs ------------------------------------------

    /// Sets the viewport extent.
    pub fn set_container_extent(&mut self, extent: S) {
        self.enter(Phase::Resizing);
        self.check("container extent", extent);
        self.sync_cache();
        self.config.container_extent = extent.sanitize();
        self.refresh_extent();
        self.place_virtual(self.virtual_offset);
        self.settle(TransitionCause::RESIZE);
    }

    /// Sets the platform scroll cap.
    pub fn set_platform_max_scroll(&mut self, platform_max: Option<S>) {
        self.enter(Phase::Resizing);
        self.config.platform_max_scroll = platform_max.filter(|m| m.sanitize() > S::zero());
        self.mapper.set_platform_max(self.config.platform_max_scroll);
        self.refresh_extent();
        self.place_virtual(self.virtual_offset);
        self.settle(TransitionCause::RESIZE);
    }

    /// Sets the number of locally known items.
    ///
    /// Items are added or removed at the end of the strip.
    pub fn set_item_count(&mut self, item_count: usize) {
        self.enter(Phase::DataChanging);
        let before = self.config.total_count();
        self.config.item_count = item_count;
        self.resize_cache(before);
        self.settle(TransitionCause::DATA);
    }

    /// Declares (or clears) a remote total item count.
    pub fn set_total_item_count(&mut self, total: Option<usize>) {
        self.enter(Phase::DataChanging);
        let before = self.config.total_count();
        self.config.total_item_count = total;
        self.resize_cache(before);
        self.settle(TransitionCause::DATA);
    }

    /// Replaces the item sizing and rebuilds the size cache.
    pub fn set_item_size(&mut self, item_size: ItemSize<S>) {
        self.enter(Phase::DataChanging);
        if let ItemSize::Fixed(extent) = item_size {
            self.check("item extent", extent);
        }
        self.config.item_size = item_size;
        self.rebuild_cache();
        self.settle(TransitionCause::SIZES);
    }

    /// Feeds back a measured extent for one item.
    pub fn set_extent(&mut self, index: usize, extent: S) {
        self.enter(Phase::DataChanging);
        self.check("item extent", extent);
        self.sync_cache();
        if index < self.cache.len() {
            self.cache.set_extent(index, extent);
        }
        self.refresh_extent();
        self.place_virtual(self.virtual_offset);
        self.settle(TransitionCause::SIZES);
    }

    /// Applies an incremental collection change.
    ///
    /// For a remote collection the change is applied to the declared total.
    pub fn apply_diff(&mut self, diff: CollectionDiff) {
        self.enter(Phase::DataChanging);
        self.sync_cache();
        self.mark_stale(diff.stale_range(self.cache.len()));
        match &mut self.config.total_item_count {
            Some(total) => *total = diff.len_after(*total),
            None => self.config.item_count = diff.len_after(self.config.item_count),
        }
        let item_size = &self.config.item_size;
        self.cache.apply_diff(diff, &|i| item_size.extent_of(i));
        self.sync_cache();
        self.refresh_extent();
        self.place_virtual(self.virtual_offset);
        self.settle(TransitionCause::DATA);
    }

    /// Re-queries every item extent and recomputes the window.
    ///
    /// Calling this twice without an intervening change yields the same
    /// cache and window.
    pub fn recalc_update_sizes(&mut self) {
        self.enter(Phase::DataChanging);
        self.rebuild_cache();
        self.settle(TransitionCause::SIZES);
    }

    /// Overwrites the window and offsets with a master's broadcast.
    ///
    /// The chunk size is not recomputed; it is only clamped so the window
    /// stays inside this calculator's collection.
    pub fn apply_broadcast(&mut self, broadcast: ScrollBroadcast<S>) {
        self.enter(Phase::Scrolling);
        self.sync_cache();
        let total = self.cache.len();
        let start = broadcast.state.start_index.min(total);
        let chunk = broadcast.state.chunk_size.min(total - start);
        let max_virtual = self.mapper.max_virtual(self.config.container_extent);
        self.virtual_offset = broadcast.virtual_offset.sanitize().min(max_virtual);
        self.actual_offset = self.mapper.to_actual(self.virtual_offset);
        self.state = WindowState::new(start, chunk);
        self.settle(TransitionCause::SCROLL | TransitionCause::SYNC);
    }

    /// Snapshot of the current window and offsets for synchronization.
    #[must_use]
    pub const fn broadcast(&self) -> ScrollBroadcast<S> {
        ScrollBroadcast {
            state: self.state,
            virtual_offset: self.virtual_offset,
        }
    }

    // --- Outputs ---------------------------------------------------------

    /// Takes the pending transition, if any input happened since the last call.
    pub fn take_transition(&mut self) -> Option<Transition> {
        if self.pending.is_empty() {
            return None;
        }
        let transition = Transition {
            previous: self.committed,
            next: self.state,
            cause: self.pending,
            stale: core::mem::replace(&mut self.stale, 0..0),
        };
        self.committed = self.state;
        self.pending = TransitionCause::empty();
        Some(transition)
    }

    /// Drains queued events (diagnostics and scrollbar visibility changes).
    pub fn drain_events(&mut self) -> Drain<'_, WindowEvent<S>> {
        self.events.drain(..)
    }

    // --- Internals -------------------------------------------------------

    fn enter(&mut self, phase: Phase) {
        debug_assert_eq!(self.phase, Phase::Idle, "inputs must not nest");
        self.phase = phase;
    }

    fn settle(&mut self, cause: TransitionCause) {
        debug_assert!(
            self.state.end_index() <= self.cache.len(),
            "window {:?} exceeds {} items",
            self.state,
            self.cache.len()
        );
        vtrace!(
            phase = ?self.phase,
            start = self.state.start_index,
            chunk = self.state.chunk_size,
            "window settled"
        );
        self.last_phase = self.phase;
        self.phase = Phase::Idle;
        self.pending |= cause;
    }

    fn mark_stale(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        self.stale = if self.stale.is_empty() {
            range
        } else {
            self.stale.start.min(range.start)..self.stale.end.max(range.end)
        };
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        vwarn!(%diagnostic, "virtual window input corrected");
        self.events.push(WindowEvent::Diagnostic(diagnostic));
    }

    fn check(&mut self, what: &'static str, value: S) {
        if let Some(diagnostic) = Diagnostic::check(what, value) {
            self.report(diagnostic);
        }
    }

    /// Rebuilds the cache silently if its length drifted from the collection.
    fn sync_cache(&mut self) {
        let expected = self.config.total_count();
        let cached = self.cache.len();
        let item_size = &self.config.item_size;
        if self.cache.ensure_len(expected, &|i| item_size.extent_of(i)) {
            self.report(Diagnostic::Desync { cached, expected });
            self.refresh_extent();
        }
    }

    fn rebuild_cache(&mut self) {
        self.cache = SizeCache::from_item_size(self.config.total_count(), &self.config.item_size);
        self.refresh_extent();
        self.place_virtual(self.virtual_offset);
    }

    /// Grows or shrinks the cache at the end after a count change.
    fn resize_cache(&mut self, before: usize) {
        let after = self.config.total_count();
        let diff = if after > before {
            CollectionDiff::Insert {
                index: before,
                count: after - before,
            }
        } else {
            CollectionDiff::Remove {
                index: after,
                count: before - after,
            }
        };
        let item_size = &self.config.item_size;
        self.cache.apply_diff(diff, &|i| item_size.extent_of(i));
        self.sync_cache();
        self.refresh_extent();
        self.place_virtual(self.virtual_offset);
    }

    /// Updates the mapper and scrollbar visibility after the total extent may have changed.
    fn refresh_extent(&mut self) {
        let total = self.cache.total_extent();
        if self.mapper.update(total) && self.mapper.is_compressed() {
            self.report(Diagnostic::Overflow {
                virtual_extent: total.to_f64(),
                ratio: self.mapper.ratio().to_f64(),
            });
        }
        let visible = total > self.config.container_extent;
        if visible != self.scrollbar_visible {
            self.scrollbar_visible = visible;
            self.events
                .push(WindowEvent::ScrollbarVisibilityChanged(visible));
        }
    }

    /// Moves to a virtual offset (clamped) and recomputes the window.
    fn place_virtual(&mut self, virtual_offset: S) {
        let max_virtual = self.mapper.max_virtual(self.config.container_extent);
        let virtual_offset = virtual_offset.sanitize().min(max_virtual);
        self.virtual_offset = virtual_offset;
        self.actual_offset = self.mapper.to_actual(virtual_offset);
        self.state = self.window_at(virtual_offset);
    }

    /// Computes the window for a clamped virtual offset.
    fn window_at(&mut self, virtual_offset: S) -> WindowState {
        let total = self.cache.len();
        if total == 0 {
            return WindowState::EMPTY;
        }
        let start = self.cache.index_at_offset(virtual_offset);
        if self.config.container_extent <= S::zero() {
            return WindowState::new(start, 0);
        }
        let (chunk, satisfied) = self.compute_chunk_size(start);
        if satisfied {
            // A partially scrolled first item can push the viewport end past the chunk.
            let end = (start + chunk).max(self.viewport_end_index(virtual_offset));
            return WindowState::new(start, end - start);
        }
        // Ran out of items: anchor the window to the end of the strip instead.
        let tail = self.compute_tail_chunk_size();
        let start = start.min(total - tail);
        WindowState::new(start, total - start)
    }

    /// Counts items from `start` until the viewport is covered, plus the
    /// trailing items. The flag is `false` if the strip ended first.
    fn compute_chunk_size(&mut self, start: usize) -> (usize, bool) {
        let total = self.cache.len();
        let container = self.config.container_extent;
        let mut covered = S::zero();
        let mut index = start;
        while index < total && covered < container {
            covered = covered + self.cache.size_at(index);
            index += 1;
        }
        if covered < container {
            return (index - start, false);
        }
        let trailing = self.config.chunk_policy.trailing_items;
        let extra = trailing.min(total - index);
        (index - start + extra, extra == trailing)
    }

    /// One past the last item overlapping `[virtual_offset, virtual_offset + container)`.
    fn viewport_end_index(&mut self, virtual_offset: S) -> usize {
        let view_end = virtual_offset + self.config.container_extent;
        let last = self.cache.index_at_offset(view_end);
        if self.cache.offset_at(last) < view_end {
            last + 1
        } else {
            last
        }
    }

    /// Same rule as [`compute_chunk_size`](Self::compute_chunk_size), counted
    /// backward from the last item.
    fn compute_tail_chunk_size(&mut self) -> usize {
        let total = self.cache.len();
        let container = self.config.container_extent;
        let mut covered = S::zero();
        let mut index = total;
        while index > 0 && covered < container {
            index -= 1;
            covered = covered + self.cache.size_at(index);
        }
        let extra = self.config.chunk_policy.trailing_items.min(index);
        total - index + extra
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::{Phase, ScrollAlign, TransitionCause, WindowCalculator, WindowState};
    use crate::{CollectionDiff, Diagnostic, ItemSize, WindowConfig, WindowEvent};

    fn fixed(count: usize, extent: f64, container: f64) -> WindowCalculator<f64> {
        WindowCalculator::new(WindowConfig::fixed(count, extent, container))
    }

    fn variable(extents: &'static [f64], container: f64) -> WindowCalculator<f64> {
        WindowCalculator::new(
            WindowConfig::default()
                .with_item_count(extents.len())
                .with_item_size(ItemSize::variable(move |i| extents[i]))
                .with_container_extent(container),
        )
    }

    #[test]
    fn initial_window_covers_viewport_plus_one() {
        let mut calc = fixed(10_000, 40.0, 400.0);
        assert_eq!(calc.state(), WindowState::new(0, 11));
        let transition = calc.take_transition().unwrap();
        assert_eq!(transition.previous, WindowState::EMPTY);
        assert_eq!(transition.next, WindowState::new(0, 11));
        assert!(transition.cause.contains(TransitionCause::INIT));
        assert_eq!(calc.take_transition(), None);
    }

    #[test]
    fn scroll_to_last_index_anchors_at_end() {
        let mut calc = fixed(10_000, 40.0, 400.0);
        calc.scroll_to(9_999);
        let state = calc.state();
        assert_eq!(state.chunk_size, 11);
        assert_eq!(state.end_index(), 10_000);
        assert_eq!(state.start_index, 9_989);
        assert_eq!(calc.scroll_offset(), 399_600.0);
        assert_eq!(calc.last_phase(), Phase::Scrolling);
    }

    #[test]
    fn on_scroll_clamps_out_of_range_offsets() {
        let mut calc = fixed(100, 10.0, 50.0);
        calc.on_scroll(-30.0);
        assert_eq!(calc.scroll_offset(), 0.0);
        calc.on_scroll(1.0e9);
        assert_eq!(calc.scroll_offset(), 950.0);
        assert_eq!(calc.state().end_index(), 100);

        let diagnostics: Vec<_> = calc.drain_events().collect();
        assert!(diagnostics.iter().any(|e| matches!(
            e,
            WindowEvent::Diagnostic(Diagnostic::Configuration {
                what: "scroll offset",
                ..
            })
        )));
    }

    #[test]
    fn partial_first_item_keeps_window_start() {
        let mut calc = fixed(100, 40.0, 400.0);
        calc.on_scroll(20.0);
        assert_eq!(calc.state(), WindowState::new(0, 11));
        calc.on_scroll(40.0);
        assert_eq!(calc.state(), WindowState::new(1, 11));
    }

    #[test]
    fn empty_and_degenerate_inputs_yield_empty_chunks() {
        let mut calc = fixed(0, 40.0, 400.0);
        assert_eq!(calc.state(), WindowState::EMPTY);
        calc.scroll_to(5);
        assert_eq!(calc.state(), WindowState::EMPTY);

        let calc = fixed(100, 40.0, 0.0);
        assert_eq!(calc.state().chunk_size, 0);

        let mut calc = fixed(3, 40.0, 400.0);
        assert_eq!(calc.state(), WindowState::new(0, 3));
        calc.set_container_extent(-10.0);
        assert_eq!(calc.container_extent(), 0.0);
        assert_eq!(calc.state().chunk_size, 0);
        assert_eq!(calc.last_phase(), Phase::Resizing);
    }

    #[test]
    fn variable_extents_drive_chunk_size() {
        let mut calc = variable(&[20.0, 30.0, 50.0, 10.0, 60.0, 5.0, 5.0], 60.0);
        // 20 + 30 + 50 covers 60 after three items, plus one trailing item.
        assert_eq!(calc.state(), WindowState::new(0, 4));
        assert_eq!(calc.index_at_scroll(45.0), 1);
        calc.on_scroll(55.0);
        assert_eq!(calc.state(), WindowState::new(2, 3));
    }

    #[test]
    fn scroll_next_and_prev_move_one_item() {
        let mut calc = variable(&[20.0, 30.0, 50.0, 10.0, 60.0, 5.0, 5.0], 40.0);
        assert!(calc.scroll_next());
        assert_eq!(calc.scroll_offset(), 20.0);
        assert!(calc.scroll_next());
        assert_eq!(calc.scroll_offset(), 50.0);
        assert!(calc.add_scroll_top(-5.0));
        assert_eq!(calc.first_visible_index(), Some(1));
        assert!(calc.scroll_prev());
        assert_eq!(calc.scroll_offset(), 20.0);
        assert!(calc.scroll_prev());
        assert_eq!(calc.scroll_offset(), 0.0);
        assert!(!calc.scroll_prev());
    }

    #[test]
    fn page_scrolling_moves_by_container() {
        let mut calc = fixed(100, 10.0, 50.0);
        assert!(calc.scroll_next_page());
        assert_eq!(calc.scroll_offset(), 50.0);
        assert_eq!(calc.state().start_index, 5);
        assert!(calc.scroll_prev_page());
        assert_eq!(calc.scroll_offset(), 0.0);
        assert!(!calc.scroll_prev_page());
    }

    #[test]
    fn scroll_for_index_alignments() {
        let mut calc = fixed(10, 10.0, 30.0);
        assert_eq!(calc.scroll_for_index(3, ScrollAlign::Start), 30.0);
        assert_eq!(calc.scroll_for_index(3, ScrollAlign::End), 10.0);
        assert_eq!(calc.scroll_for_index(3, ScrollAlign::Center), 20.0);
        assert_eq!(calc.scroll_for_index(1, ScrollAlign::Nearest), 0.0);
        assert_eq!(calc.scroll_for_index(9, ScrollAlign::Start), 70.0);
    }

    #[test]
    fn visibility_queries() {
        let mut calc = fixed(10, 10.0, 30.0);
        assert_eq!(calc.item_count_in_view(), 3);
        assert!(calc.is_index_fully_visible(2));
        assert!(!calc.is_index_fully_visible(3));
        // The trailing item is materialized but not visible.
        assert!(!calc.is_index_outside_view(3));
        assert!(calc.is_index_outside_view(4));

        calc.add_scroll_top(5.0);
        assert_eq!(calc.item_count_in_view(), 2);
        assert!(calc.is_index_partially_visible(0));
        assert!(calc.is_index_partially_visible(3));
        assert_eq!(calc.first_visible_index(), Some(0));
        assert_eq!(calc.last_visible_index(), Some(3));
    }

    #[test]
    fn diffs_update_window_and_keep_offset() {
        let mut calc = fixed(100, 10.0, 50.0);
        calc.scroll_to(10);
        let _ = calc.take_transition();
        calc.apply_diff(CollectionDiff::Insert { index: 0, count: 5 });
        assert_eq!(calc.total_count(), 105);
        assert_eq!(calc.scroll_offset(), 100.0);
        let transition = calc.take_transition().unwrap();
        assert_eq!(transition.cause, TransitionCause::DATA);
        assert_eq!(calc.last_phase(), Phase::DataChanging);

        calc.apply_diff(CollectionDiff::Reset { len: 3 });
        assert_eq!(calc.total_count(), 3);
        assert_eq!(calc.scroll_offset(), 0.0);
        assert_eq!(calc.state(), WindowState::new(0, 3));
    }

    #[test]
    fn in_place_changes_accumulate_until_taken() {
        let mut calc = fixed(100, 10.0, 50.0);
        let _ = calc.take_transition();
        calc.apply_diff(CollectionDiff::Update { index: 7 });
        calc.apply_diff(CollectionDiff::Update { index: 2 });
        let transition = calc.take_transition().unwrap();
        assert_eq!(transition.stale, 2..8);

        calc.scroll_to(20);
        assert!(calc.take_transition().unwrap().stale.is_empty());

        calc.apply_diff(CollectionDiff::Reset { len: 100 });
        assert_eq!(calc.take_transition().unwrap().stale, 0..100);
    }

    #[test]
    fn recalc_is_idempotent() {
        let mut calc = variable(&[20.0, 30.0, 50.0, 10.0, 60.0, 5.0, 5.0], 60.0);
        calc.on_scroll(70.0);
        calc.recalc_update_sizes();
        let first = (calc.state(), calc.scroll_offset(), calc.total_extent());
        calc.recalc_update_sizes();
        let second = (calc.state(), calc.scroll_offset(), calc.total_extent());
        assert_eq!(first, second);
    }

    #[test]
    fn measured_extents_feed_back() {
        let mut calc = fixed(10, 10.0, 30.0);
        calc.set_extent(0, 30.0);
        assert_eq!(calc.state(), WindowState::new(0, 2));
        assert_eq!(calc.total_extent(), 120.0);
    }

    #[test]
    fn scrollbar_visibility_follows_overflow() {
        let mut calc = fixed(2, 10.0, 30.0);
        assert!(!calc.scrollbar_visible());
        calc.set_item_count(10);
        assert!(calc.scrollbar_visible());
        let events: Vec<_> = calc.drain_events().collect();
        assert_eq!(events, [WindowEvent::ScrollbarVisibilityChanged(true)]);
    }

    #[test]
    fn compressed_scrolling_maps_to_virtual_offsets() {
        let mut calc = WindowCalculator::new(
            WindowConfig::fixed(1_000_000, 50.0_f64, 500.0)
                .with_platform_max_scroll(Some(10_000_000.0)),
        );
        assert_eq!(calc.mapper().ratio(), 5.0);
        calc.on_scroll(5_000_000.0);
        assert_eq!(calc.scroll_offset(), 25_000_000.0);
        assert_eq!(calc.state().start_index, 500_000);
        assert!(calc.drain_events().any(|e| matches!(
            e,
            WindowEvent::Diagnostic(Diagnostic::Overflow { .. })
        )));
    }

    #[test]
    fn broadcast_overwrites_without_recompute() {
        let mut master = fixed(100, 10.0, 50.0);
        let mut slave = fixed(100, 10.0, 50.0);
        master.scroll_to(40);
        slave.apply_broadcast(master.broadcast());
        assert_eq!(slave.state(), master.state());
        assert_eq!(slave.scroll_offset(), master.scroll_offset());
        let transition = slave.take_transition().unwrap();
        assert!(transition.cause.contains(TransitionCause::SYNC));
    }
}
