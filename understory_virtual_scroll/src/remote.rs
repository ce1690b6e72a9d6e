// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Loaded-range bookkeeping and preload/load notifications for remote data.
//!
//! A remote collection declares a total count up front but only holds a
//! contiguous slice of items locally. The engine never waits for data: the
//! window for an unloaded range renders as placeholders, and the host learns
//! which range to fetch from [`WindowEvent::ChunkPreload`]. Once data arrives
//! the host calls [`RemoteWindowNotifier::set_loaded`] (through the scroller)
//! and the placeholders are rebound as a data change.

use core::ops::Range;

use crate::{Scalar, Transition, TransitionCause, WindowEvent, WindowState};

/// Which slice of a remote collection is present locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VirtualCollection {
    /// Index of the first loaded item.
    pub loaded_start: usize,
    /// Number of loaded items.
    pub loaded_len: usize,
    /// Declared total number of items.
    pub total_count: usize,
}

impl VirtualCollection {
    /// Describes a remote collection of `total_count` items with `loaded` present.
    #[must_use]
    pub const fn new(total_count: usize, loaded: Range<usize>) -> Self {
        let start = if loaded.start < total_count {
            loaded.start
        } else {
            total_count
        };
        let end = if loaded.end < total_count {
            loaded.end
        } else {
            total_count
        };
        Self {
            loaded_start: start,
            loaded_len: end.saturating_sub(start),
            total_count,
        }
    }

    /// Describes a fully loaded collection of `len` items.
    #[must_use]
    pub const fn local(len: usize) -> Self {
        Self::new(len, 0..len)
    }

    /// The loaded indices.
    #[must_use]
    pub const fn loaded_range(&self) -> Range<usize> {
        self.loaded_start..self.loaded_start + self.loaded_len
    }

    /// Returns `true` if the item at `index` is present locally.
    #[must_use]
    pub const fn is_loaded(&self, index: usize) -> bool {
        index >= self.loaded_start && index < self.loaded_start + self.loaded_len
    }

    /// The smallest range covering every index of `state` that is not loaded.
    #[must_use]
    pub fn missing(&self, state: WindowState) -> Option<Range<usize>> {
        let window = state.indices();
        if window.is_empty() {
            return None;
        }
        let loaded = self.loaded_range();
        let before = window.start < loaded.start;
        let after = window.end > loaded.end;
        if loaded.is_empty() || window.end <= loaded.start || window.start >= loaded.end {
            return Some(window);
        }
        match (before, after) {
            (false, false) => None,
            (true, false) => Some(window.start..loaded.start),
            (false, true) => Some(loaded.end..window.end),
            (true, true) => Some(window),
        }
    }
}

/// Emits `ChunkPreload` before a window renders and `ChunkLoad` after.
///
/// In local mode the notifier still emits both events so hosts can observe
/// window changes uniformly; [`available`](Self::available) then covers the
/// whole collection.
#[derive(Debug, Clone, Default)]
pub struct RemoteWindowNotifier {
    collection: Option<VirtualCollection>,
    announced: Option<WindowState>,
    committed: Option<WindowState>,
}

impl RemoteWindowNotifier {
    /// Creates a notifier for a fully local collection.
    #[must_use]
    pub fn local() -> Self {
        Self::default()
    }

    /// Creates a notifier tracking a remote collection.
    #[must_use]
    pub fn remote(collection: VirtualCollection) -> Self {
        Self {
            collection: Some(collection),
            ..Self::default()
        }
    }

    /// Returns `true` if a remote collection is being tracked.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        self.collection.is_some()
    }

    /// The tracked remote collection.
    #[must_use]
    pub const fn collection(&self) -> Option<&VirtualCollection> {
        self.collection.as_ref()
    }

    /// Records which slice of the remote collection is loaded.
    ///
    /// Has no effect in local mode.
    pub fn set_loaded(&mut self, loaded: Range<usize>) {
        if let Some(collection) = &mut self.collection {
            *collection = VirtualCollection::new(collection.total_count, loaded);
        }
    }

    /// Updates the declared total, clamping the loaded range into it.
    pub fn set_total(&mut self, total_count: usize) {
        if let Some(collection) = &mut self.collection {
            *collection = VirtualCollection::new(total_count, collection.loaded_range());
        }
    }

    /// Indices whose data is present, for a collection of `total_count` items.
    #[must_use]
    pub fn available(&self, total_count: usize) -> Range<usize> {
        match &self.collection {
            Some(collection) => {
                let loaded = collection.loaded_range();
                loaded.start.min(total_count)..loaded.end.min(total_count)
            }
            None => 0..total_count,
        }
    }

    /// The range `state` still needs fetched, if any.
    #[must_use]
    pub fn missing(&self, state: WindowState) -> Option<Range<usize>> {
        self.collection.as_ref()?.missing(state)
    }

    /// Announces the window a transition is about to render.
    ///
    /// Returns a [`WindowEvent::ChunkPreload`] for the first window and for
    /// every window that differs from the previous announcement.
    pub fn announce<S: Scalar>(
        &mut self,
        transition: &Transition,
        total_count: usize,
    ) -> Option<WindowEvent<S>> {
        let state = transition.next;
        let fresh = transition.cause.contains(TransitionCause::INIT)
            || self.announced != Some(state);
        if !fresh {
            return None;
        }
        self.announced = Some(state);
        Some(WindowEvent::ChunkPreload { state, total_count })
    }

    /// Reports that the rendered pool now matches `state`.
    ///
    /// Returns a [`WindowEvent::ChunkLoad`] once per distinct committed window.
    pub fn commit<S: Scalar>(&mut self, state: WindowState) -> Option<WindowEvent<S>> {
        if self.committed == Some(state) {
            return None;
        }
        self.committed = Some(state);
        Some(WindowEvent::ChunkLoad(state))
    }

    /// Forgets announced and committed windows.
    pub fn reset(&mut self) {
        self.announced = None;
        self.committed = None;
    }
}
