// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Configuration for a virtual window.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use crate::{Diagnostic, Direction, Orientation, Scalar};

/// How item extents along the scroll axis are determined.
#[derive(Clone)]
pub enum ItemSize<S: Scalar> {
    /// Every item has the same extent.
    Fixed(S),
    /// Extent of each item by index, over the full (virtual) index space.
    ///
    /// In remote mode the function is also asked about indices whose data is
    /// not loaded yet; it should return an estimate for those.
    Variable(Rc<dyn Fn(usize) -> S>),
}

impl<S: Scalar> ItemSize<S> {
    /// Wraps a per-index extent function.
    pub fn variable(extent_fn: impl Fn(usize) -> S + 'static) -> Self {
        Self::Variable(Rc::new(extent_fn))
    }

    /// Extent of the item at `index`, clamped to be non-negative.
    #[must_use]
    pub fn extent_of(&self, index: usize) -> S {
        match self {
            Self::Fixed(extent) => *extent,
            Self::Variable(extent_fn) => extent_fn(index),
        }
        .sanitize()
    }
}

impl<S: Scalar> fmt::Debug for ItemSize<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(extent) => f.debug_tuple("Fixed").field(extent).finish(),
            Self::Variable(_) => f.debug_tuple("Variable").finish_non_exhaustive(),
        }
    }
}

/// How many items a window materializes beyond the viewport.
///
/// The leading edge is floored: the window starts at the item that contains
/// the scroll offset, even if only a sliver of it is visible. The trailing
/// edge is ceiled: items are added until their summed extent reaches the
/// container extent, and then `trailing_items` more are added so a partially
/// revealed item is already materialized when scrolling continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    /// Extra items materialized after the viewport is covered.
    pub trailing_items: usize,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self { trailing_items: 1 }
    }
}

/// The largest start-index delta that is reconciled by shifting views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShiftLimit {
    /// Shift whenever the old and new windows could share views (`|Δstart| <= chunk_size`).
    #[default]
    ChunkSize,
    /// Shift only when `|Δstart|` is at most this many items; rebuild otherwise.
    Items(usize),
}

/// Policy choosing between shifting and rebuilding the rendered pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcilePolicy {
    /// Largest start-index delta handled by the shift path.
    pub shift_limit: ShiftLimit,
}

impl ReconcilePolicy {
    /// Returns the effective shift limit for a window of `chunk_size` items.
    #[must_use]
    pub const fn limit_for(&self, chunk_size: usize) -> usize {
        match self.shift_limit {
            ShiftLimit::ChunkSize => chunk_size,
            ShiftLimit::Items(n) => {
                if n < chunk_size {
                    n
                } else {
                    chunk_size
                }
            }
        }
    }
}

/// Inputs that configure a virtual window.
#[derive(Clone, Debug)]
pub struct WindowConfig<S: Scalar> {
    /// Scroll axis.
    pub orientation: Orientation,
    /// Reading direction; only affects presentation order of horizontal strips.
    pub direction: Direction,
    /// Extent of the viewport along the scroll axis.
    pub container_extent: S,
    /// Item extents.
    pub item_size: ItemSize<S>,
    /// Number of items known locally. For a local collection this is the collection length.
    pub item_count: usize,
    /// Declared total for a remote collection; `None` means the collection is fully local.
    pub total_item_count: Option<usize>,
    /// Largest scroll offset the host platform can address, if it is bounded.
    pub platform_max_scroll: Option<S>,
    /// Trailing-edge inclusion rule.
    pub chunk_policy: ChunkPolicy,
    /// Shift-versus-rebuild rule for the renderer.
    pub reconcile_policy: ReconcilePolicy,
}

impl<S: Scalar> Default for WindowConfig<S> {
    fn default() -> Self {
        Self {
            orientation: Orientation::default(),
            direction: Direction::default(),
            container_extent: S::zero(),
            item_size: ItemSize::Fixed(S::zero()),
            item_count: 0,
            total_item_count: None,
            platform_max_scroll: None,
            chunk_policy: ChunkPolicy::default(),
            reconcile_policy: ReconcilePolicy::default(),
        }
    }
}

impl<S: Scalar> WindowConfig<S> {
    /// Creates a configuration for `item_count` local items of uniform `extent`.
    #[must_use]
    pub fn fixed(item_count: usize, extent: S, container_extent: S) -> Self {
        Self {
            item_size: ItemSize::Fixed(extent),
            item_count,
            container_extent,
            ..Self::default()
        }
    }

    /// Sets the scroll axis.
    #[must_use]
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Sets the reading direction.
    #[must_use]
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the item extents.
    #[must_use]
    pub fn with_item_size(mut self, item_size: ItemSize<S>) -> Self {
        self.item_size = item_size;
        self
    }

    /// Sets the number of locally known items.
    #[must_use]
    pub fn with_item_count(mut self, item_count: usize) -> Self {
        self.item_count = item_count;
        self
    }

    /// Declares a remote collection of `total` items.
    #[must_use]
    pub fn with_total_item_count(mut self, total: Option<usize>) -> Self {
        self.total_item_count = total;
        self
    }

    /// Sets the viewport extent.
    #[must_use]
    pub fn with_container_extent(mut self, extent: S) -> Self {
        self.container_extent = extent;
        self
    }

    /// Bounds the addressable platform scroll range.
    #[must_use]
    pub fn with_platform_max_scroll(mut self, max: Option<S>) -> Self {
        self.platform_max_scroll = max;
        self
    }

    /// Sets the trailing-edge inclusion rule.
    #[must_use]
    pub fn with_chunk_policy(mut self, policy: ChunkPolicy) -> Self {
        self.chunk_policy = policy;
        self
    }

    /// Sets the shift-versus-rebuild rule.
    #[must_use]
    pub fn with_reconcile_policy(mut self, policy: ReconcilePolicy) -> Self {
        self.reconcile_policy = policy;
        self
    }

    /// Number of items the window indexes over.
    ///
    /// Remote collections report their declared total, local ones their length.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.total_item_count.unwrap_or(self.item_count)
    }

    /// Clamps invalid values and reports what was changed.
    ///
    /// A non-positive platform maximum is treated as unbounded.
    #[must_use]
    pub fn sanitized(mut self) -> (Self, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        diagnostics.extend(Diagnostic::check("container extent", self.container_extent));
        self.container_extent = self.container_extent.sanitize();
        if let ItemSize::Fixed(extent) = self.item_size {
            diagnostics.extend(Diagnostic::check("item extent", extent));
            self.item_size = ItemSize::Fixed(extent.sanitize());
        }
        if let Some(max) = self.platform_max_scroll {
            diagnostics.extend(Diagnostic::check("platform max scroll", max));
            if max.sanitize() <= S::zero() {
                self.platform_max_scroll = None;
            }
        }
        (self, diagnostics)
    }
}
