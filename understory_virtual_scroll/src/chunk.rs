// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reconciliation of rendered views against window transitions.

use alloc::collections::VecDeque;
use alloc::collections::vec_deque;
use alloc::vec::Vec;
use core::hash::Hash;
use core::ops::Range;

use hashbrown::HashMap;

use crate::trace::vtrace;
use crate::{ReconcilePolicy, Scalar, Transition, TransitionCause, WindowEvent, WindowState};

/// What a view is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    /// Collection index.
    pub index: usize,
    /// `true` if the item's data is not loaded and a placeholder should be shown.
    pub placeholder: bool,
}

/// The host side of rendering: creates, rebinds, and destroys views.
///
/// The renderer owns the views between calls; the host only ever sees them
/// through these callbacks and [`ChunkRenderer::iter`].
pub trait ViewHost<S: Scalar> {
    /// A rendered view (widget, node handle, test record, ...).
    type View;
    /// Stable identity of an item, used to reuse views across data changes.
    type Key: Copy + Eq + Hash;

    /// Creates a view bound to `slot`.
    fn create(&mut self, slot: Slot) -> Self::View;

    /// Rebinds an existing view to a different slot.
    fn rebind(&mut self, view: &mut Self::View, slot: Slot);

    /// Releases a view.
    fn destroy(&mut self, view: Self::View);

    /// Stable key of the item currently at `index`.
    fn key(&self, index: usize) -> Self::Key;

    /// Called right before a view bound to `index` is destroyed.
    fn before_destroy(&mut self, view: &Self::View, index: usize) {
        let _ = (view, index);
    }

    /// Receives engine events in the order they occur.
    fn notify(&mut self, event: WindowEvent<S>) {
        let _ = event;
    }
}

/// Which path a reconciliation took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The pool already matched the window; only placeholders were refreshed.
    Unchanged {
        /// Views rebound because their placeholder state changed.
        refreshed: usize,
    },
    /// Views were moved from one edge to the other and rebound.
    Shifted {
        /// Number of moved views.
        moved: usize,
    },
    /// Every view was destroyed and the window was created from scratch.
    ///
    /// Happens on the first render, when the chunk size changes, and when
    /// the start index jumps further than the shift limit.
    Rebuilt,
    /// Views were matched to items by key after a data change.
    Rekeyed {
        /// Views left untouched.
        kept: usize,
        /// Views that had to be rebound.
        rebound: usize,
    },
}

#[derive(Debug)]
struct Entry<V, K> {
    view: V,
    slot: Slot,
    key: K,
}

/// An ordered pool of views that mirrors a [`WindowState`].
///
/// After every [`reconcile`](Self::reconcile) the pool holds exactly
/// `chunk_size` views bound to `start_index..start_index + chunk_size`,
/// stored in ascending index order.
#[derive(Debug)]
pub struct ChunkRenderer<V, K, S: Scalar> {
    pool: VecDeque<Entry<V, K>>,
    state: WindowState,
    policy: ReconcilePolicy,
    reversed: bool,
    content_extent: Option<S>,
}

impl<V, K: Copy + Eq + Hash, S: Scalar> ChunkRenderer<V, K, S> {
    /// Creates an empty renderer.
    ///
    /// If `reversed` is set, [`iter`](Self::iter) yields views in descending
    /// index order (right-to-left horizontal strips).
    #[must_use]
    pub fn new(policy: ReconcilePolicy, reversed: bool) -> Self {
        Self {
            pool: VecDeque::new(),
            state: WindowState::EMPTY,
            policy,
            reversed,
            content_extent: None,
        }
    }

    /// The window the pool currently mirrors.
    #[must_use]
    pub const fn state(&self) -> WindowState {
        self.state
    }

    /// Number of rendered views.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Returns `true` if nothing is rendered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Returns `true` if views are presented in descending index order.
    #[must_use]
    pub const fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Changes the presentation order.
    pub fn set_reversed(&mut self, reversed: bool) {
        self.reversed = reversed;
    }

    /// Changes the shift-versus-rebuild rule.
    pub fn set_policy(&mut self, policy: ReconcilePolicy) {
        self.policy = policy;
    }

    /// Rendered views with their slots, in presentation order.
    pub fn iter(&self) -> Views<'_, V, K> {
        Views {
            inner: self.pool.iter(),
            reversed: self.reversed,
        }
    }

    /// The view bound to `index`, if it is rendered.
    #[must_use]
    pub fn view_at(&self, index: usize) -> Option<&V> {
        let position = index.checked_sub(self.state.start_index)?;
        self.pool.get(position).map(|entry| &entry.view)
    }

    /// Brings the pool in line with `transition.next`.
    ///
    /// Indices outside `available` are bound as placeholders.
    pub fn reconcile<H>(
        &mut self,
        transition: &Transition,
        available: Range<usize>,
        host: &mut H,
    ) -> Reconciled
    where
        H: ViewHost<S, View = V, Key = K> + ?Sized,
    {
        let old = self.state;
        let new = transition.next;
        let delta = new.start_index.abs_diff(old.start_index);
        let limit = self.policy.limit_for(new.chunk_size);

        let outcome = if new.chunk_size != old.chunk_size {
            self.rebuild(new, &available, host)
        } else if transition.cause.contains(TransitionCause::DATA) {
            self.rekey(new, &available, &transition.stale, host)
        } else if delta > limit {
            self.rebuild(new, &available, host)
        } else if delta == 0 {
            Reconciled::Unchanged {
                refreshed: self.refresh_placeholders(&available, host),
            }
        } else {
            self.shift(new, &available, host)
        };
        vtrace!(
            ?outcome,
            start = new.start_index,
            chunk = new.chunk_size,
            "chunk reconciled"
        );
        self.state = new;
        debug_assert_eq!(self.pool.len(), new.chunk_size, "pool must mirror window");
        outcome
    }

    /// Records the rendered extent and notifies the host when it changed.
    pub fn update_content_extent<H>(&mut self, extent: S, host: &mut H)
    where
        H: ViewHost<S, View = V, Key = K> + ?Sized,
    {
        if self.content_extent != Some(extent) {
            self.content_extent = Some(extent);
            host.notify(WindowEvent::ContentSizeChange(extent));
        }
    }

    /// Destroys every view and forgets the window.
    pub fn clear<H>(&mut self, host: &mut H)
    where
        H: ViewHost<S, View = V, Key = K> + ?Sized,
    {
        for entry in self.pool.drain(..) {
            host.before_destroy(&entry.view, entry.slot.index);
            host.destroy(entry.view);
        }
        self.state = WindowState::EMPTY;
        self.content_extent = None;
    }

    fn rebuild<H>(&mut self, new: WindowState, available: &Range<usize>, host: &mut H) -> Reconciled
    where
        H: ViewHost<S, View = V, Key = K> + ?Sized,
    {
        for entry in self.pool.drain(..) {
            host.before_destroy(&entry.view, entry.slot.index);
            host.destroy(entry.view);
        }
        for index in new.indices() {
            let slot = slot_for(index, available);
            let view = host.create(slot);
            self.pool.push_back(Entry {
                view,
                slot,
                key: host.key(index),
            });
        }
        Reconciled::Rebuilt
    }

    fn shift<H>(&mut self, new: WindowState, available: &Range<usize>, host: &mut H) -> Reconciled
    where
        H: ViewHost<S, View = V, Key = K> + ?Sized,
    {
        let old = self.state;
        self.refresh_placeholders(available, host);
        let moved = if new.start_index > old.start_index {
            let moved = new.start_index - old.start_index;
            for index in old.end_index()..new.end_index() {
                let Some(entry) = self.pool.pop_front() else {
                    break;
                };
                let entry = Self::rebind_entry(entry, index, available, host);
                self.pool.push_back(entry);
            }
            moved
        } else {
            let moved = old.start_index - new.start_index;
            for index in (new.start_index..old.start_index).rev() {
                let Some(entry) = self.pool.pop_back() else {
                    break;
                };
                let entry = Self::rebind_entry(entry, index, available, host);
                self.pool.push_front(entry);
            }
            moved
        };
        Reconciled::Shifted { moved }
    }

    fn rekey<H>(
        &mut self,
        new: WindowState,
        available: &Range<usize>,
        stale: &Range<usize>,
        host: &mut H,
    ) -> Reconciled
    where
        H: ViewHost<S, View = V, Key = K> + ?Sized,
    {
        let mut old: Vec<Option<Entry<V, K>>> = self.pool.drain(..).map(Some).collect();
        let mut by_key: HashMap<K, usize> = HashMap::with_capacity(old.len());
        for (position, entry) in old.iter().enumerate() {
            if let Some(entry) = entry {
                by_key.entry(entry.key).or_insert(position);
            }
        }

        let mut next: Vec<Option<Entry<V, K>>> = Vec::with_capacity(new.chunk_size);
        let mut unmatched = Vec::new();
        let (mut kept, mut rebound) = (0, 0);
        for index in new.indices() {
            let slot = slot_for(index, available);
            let key = host.key(index);
            let matched = by_key.remove(&key).and_then(|position| old[position].take());
            match matched {
                Some(mut entry) => {
                    if entry.slot == slot && !stale.contains(&index) {
                        kept += 1;
                    } else {
                        host.rebind(&mut entry.view, slot);
                        entry.slot = slot;
                        rebound += 1;
                    }
                    next.push(Some(entry));
                }
                None => {
                    unmatched.push((next.len(), slot, key));
                    next.push(None);
                }
            }
        }

        let mut spare = old.into_iter().flatten();
        for (position, slot, key) in unmatched {
            let entry = match spare.next() {
                Some(mut entry) => {
                    host.rebind(&mut entry.view, slot);
                    entry.slot = slot;
                    entry.key = key;
                    entry
                }
                None => Entry {
                    view: host.create(slot),
                    slot,
                    key,
                },
            };
            rebound += 1;
            next[position] = Some(entry);
        }
        for entry in spare {
            host.before_destroy(&entry.view, entry.slot.index);
            host.destroy(entry.view);
        }
        self.pool = next.into_iter().flatten().collect();
        Reconciled::Rekeyed { kept, rebound }
    }

    /// Rebinds views whose loaded state no longer matches `available`.
    fn refresh_placeholders<H>(&mut self, available: &Range<usize>, host: &mut H) -> usize
    where
        H: ViewHost<S, View = V, Key = K> + ?Sized,
    {
        let mut refreshed = 0;
        for entry in &mut self.pool {
            let slot = slot_for(entry.slot.index, available);
            if slot != entry.slot {
                host.rebind(&mut entry.view, slot);
                entry.slot = slot;
                refreshed += 1;
            }
        }
        refreshed
    }

    fn rebind_entry<H>(
        mut entry: Entry<V, K>,
        index: usize,
        available: &Range<usize>,
        host: &mut H,
    ) -> Entry<V, K>
    where
        H: ViewHost<S, View = V, Key = K> + ?Sized,
    {
        let slot = slot_for(index, available);
        host.rebind(&mut entry.view, slot);
        entry.slot = slot;
        entry.key = host.key(index);
        entry
    }
}

fn slot_for(index: usize, available: &Range<usize>) -> Slot {
    Slot {
        index,
        placeholder: !available.contains(&index),
    }
}

/// Iterator over rendered views, in presentation order.
#[derive(Debug)]
pub struct Views<'a, V, K> {
    inner: vec_deque::Iter<'a, Entry<V, K>>,
    reversed: bool,
}

impl<'a, V, K> Iterator for Views<'a, V, K> {
    type Item = (Slot, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = if self.reversed {
            self.inner.next_back()?
        } else {
            self.inner.next()?
        };
        Some((entry.slot, &entry.view))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V, K> ExactSizeIterator for Views<'_, V, K> {}


#[cfg(test)]
mod tests {
    use alloc::vec::Vec;
    use core::ops::Range;

    use super::{ChunkRenderer, Reconciled, Slot, ViewHost};
    use crate::{
        ReconcilePolicy, ShiftLimit, Transition, TransitionCause, WindowEvent, WindowState,
    };

    type Renderer = ChunkRenderer<(u32, Slot), u64, f64>;

    #[derive(Default)]
    struct Recorder {
        next_id: u32,
        created: usize,
        rebound: Vec<usize>,
        destroyed: Vec<usize>,
        warned: Vec<usize>,
        keys: Vec<u64>,
        events: Vec<WindowEvent<f64>>,
    }

    impl ViewHost<f64> for Recorder {
        type View = (u32, Slot);
        type Key = u64;

        fn create(&mut self, slot: Slot) -> Self::View {
            self.created += 1;
            self.next_id += 1;
            (self.next_id, slot)
        }

        fn rebind(&mut self, view: &mut Self::View, slot: Slot) {
            self.rebound.push(slot.index);
            view.1 = slot;
        }

        fn destroy(&mut self, view: Self::View) {
            self.destroyed.push(view.1.index);
        }

        fn key(&self, index: usize) -> u64 {
            self.keys.get(index).copied().unwrap_or(index as u64)
        }

        fn before_destroy(&mut self, _view: &Self::View, index: usize) {
            self.warned.push(index);
        }

        fn notify(&mut self, event: WindowEvent<f64>) {
            self.events.push(event);
        }
    }

    fn step(previous: WindowState, next: WindowState, cause: TransitionCause) -> Transition {
        Transition {
            previous,
            next,
            cause,
            stale: 0..0,
        }
    }

    fn apply(
        renderer: &mut Renderer,
        host: &mut Recorder,
        next: WindowState,
        cause: TransitionCause,
        available: Range<usize>,
    ) -> Reconciled {
        let transition = step(renderer.state(), next, cause);
        renderer.reconcile(&transition, available, host)
    }

    fn indices(renderer: &Renderer) -> Vec<usize> {
        renderer.iter().map(|(slot, _)| slot.index).collect()
    }

    fn ids(renderer: &Renderer) -> Vec<u32> {
        renderer.iter().map(|(_, view)| view.0).collect()
    }

    #[test]
    fn initial_render_creates_chunk() {
        let mut host = Recorder::default();
        let mut renderer = Renderer::new(ReconcilePolicy::default(), false);
        let next = WindowState::new(0, 4);
        let outcome = apply(&mut renderer, &mut host, next, TransitionCause::INIT, 0..100);
        assert_eq!(outcome, Reconciled::Rebuilt);
        assert_eq!(host.created, 4);
        assert_eq!(indices(&renderer), [0, 1, 2, 3]);
    }

    #[test]
    fn small_scroll_shifts_views() {
        let mut host = Recorder::default();
        let mut renderer = Renderer::new(ReconcilePolicy::default(), false);
        let first = WindowState::new(0, 4);
        apply(&mut renderer, &mut host, first, TransitionCause::INIT, 0..100);

        let second = WindowState::new(2, 4);
        let outcome = apply(&mut renderer, &mut host, second, TransitionCause::SCROLL, 0..100);
        assert_eq!(outcome, Reconciled::Shifted { moved: 2 });
        assert_eq!(host.created, 4);
        assert_eq!(host.rebound, [4, 5]);
        assert_eq!(indices(&renderer), [2, 3, 4, 5]);

        let third = WindowState::new(1, 4);
        apply(&mut renderer, &mut host, third, TransitionCause::SCROLL, 0..100);
        assert_eq!(indices(&renderer), [1, 2, 3, 4]);
        assert!(host.destroyed.is_empty());
    }

    #[test]
    fn large_jumps_and_chunk_changes_rebuild() {
        let mut host = Recorder::default();
        let mut renderer = Renderer::new(ReconcilePolicy::default(), false);
        let first = WindowState::new(0, 4);
        apply(&mut renderer, &mut host, first, TransitionCause::INIT, 0..100);

        let far = WindowState::new(50, 4);
        let outcome = apply(&mut renderer, &mut host, far, TransitionCause::SCROLL, 0..100);
        assert_eq!(outcome, Reconciled::Rebuilt);
        assert_eq!(host.destroyed, [0, 1, 2, 3]);
        assert_eq!(host.warned, host.destroyed);

        let resized = WindowState::new(50, 6);
        let outcome = apply(&mut renderer, &mut host, resized, TransitionCause::RESIZE, 0..100);
        assert_eq!(outcome, Reconciled::Rebuilt);
        assert_eq!(indices(&renderer), [50, 51, 52, 53, 54, 55]);
    }

    #[test]
    fn resize_keeping_chunk_size_keeps_views() {
        let mut host = Recorder::default();
        let mut renderer = Renderer::new(ReconcilePolicy::default(), false);
        let window = WindowState::new(10, 4);
        apply(&mut renderer, &mut host, window, TransitionCause::INIT, 0..100);
        let before = ids(&renderer);

        let outcome = apply(&mut renderer, &mut host, window, TransitionCause::RESIZE, 0..100);
        assert_eq!(outcome, Reconciled::Unchanged { refreshed: 0 });
        assert_eq!(ids(&renderer), before);

        let nudged = WindowState::new(11, 4);
        let outcome = apply(&mut renderer, &mut host, nudged, TransitionCause::RESIZE, 0..100);
        assert_eq!(outcome, Reconciled::Shifted { moved: 1 });
        assert!(host.destroyed.is_empty());
        assert_eq!(host.created, 4);
    }

    #[test]
    fn shift_limit_forces_rebuild() {
        let mut host = Recorder::default();
        let policy = ReconcilePolicy {
            shift_limit: ShiftLimit::Items(1),
        };
        let mut renderer = Renderer::new(policy, false);
        let first = WindowState::new(0, 4);
        apply(&mut renderer, &mut host, first, TransitionCause::INIT, 0..100);
        let next = WindowState::new(2, 4);
        let outcome = apply(&mut renderer, &mut host, next, TransitionCause::SCROLL, 0..100);
        assert_eq!(outcome, Reconciled::Rebuilt);
    }

    #[test]
    fn data_changes_reuse_views_by_key() {
        let mut host = Recorder {
            keys: (0..10).collect(),
            ..Recorder::default()
        };
        let mut renderer = Renderer::new(ReconcilePolicy::default(), false);
        let window = WindowState::new(0, 4);
        apply(&mut renderer, &mut host, window, TransitionCause::INIT, 0..10);
        let before = ids(&renderer);

        // Item 0 removed: keys shift down by one and a new key appears at index 3.
        host.keys = (1..10).collect();
        let outcome = apply(&mut renderer, &mut host, window, TransitionCause::DATA, 0..9);
        assert_eq!(outcome, Reconciled::Rekeyed { kept: 0, rebound: 4 });
        let after = ids(&renderer);
        assert_eq!(after[..3], before[1..]);
        assert_eq!(after[3], before[0]);
        assert_eq!(host.created, 4);

        // Unchanged keys keep their views untouched.
        let rebound = host.rebound.len();
        let outcome = apply(&mut renderer, &mut host, window, TransitionCause::DATA, 0..9);
        assert_eq!(outcome, Reconciled::Rekeyed { kept: 4, rebound: 0 });
        assert_eq!(host.rebound.len(), rebound);
    }

    #[test]
    fn stale_items_are_rebound_even_with_matching_keys() {
        let mut host = Recorder::default();
        let mut renderer = Renderer::new(ReconcilePolicy::default(), false);
        let window = WindowState::new(0, 5);
        apply(&mut renderer, &mut host, window, TransitionCause::INIT, 0..100);
        let before = ids(&renderer);

        let updated = Transition {
            stale: 3..4,
            ..step(window, window, TransitionCause::DATA)
        };
        let outcome = renderer.reconcile(&updated, 0..100, &mut host);
        assert_eq!(outcome, Reconciled::Rekeyed { kept: 4, rebound: 1 });
        assert_eq!(host.rebound, [3]);
        assert_eq!(ids(&renderer), before);

        let reset = Transition {
            stale: 0..100,
            ..step(window, window, TransitionCause::DATA)
        };
        let outcome = renderer.reconcile(&reset, 0..100, &mut host);
        assert_eq!(outcome, Reconciled::Rekeyed { kept: 0, rebound: 5 });
        assert_eq!(host.rebound, [3, 0, 1, 2, 3, 4]);
        assert_eq!(host.created, 5);
    }

    #[test]
    fn unloaded_indices_render_as_placeholders() {
        let mut host = Recorder::default();
        let mut renderer = Renderer::new(ReconcilePolicy::default(), false);
        let window = WindowState::new(8, 4);
        apply(&mut renderer, &mut host, window, TransitionCause::INIT, 0..10);
        let flags: Vec<bool> = renderer.iter().map(|(slot, _)| slot.placeholder).collect();
        assert_eq!(flags, [false, false, true, true]);

        let outcome = apply(&mut renderer, &mut host, window, TransitionCause::SCROLL, 0..20);
        assert_eq!(outcome, Reconciled::Unchanged { refreshed: 2 });
        assert!(renderer.iter().all(|(slot, _)| !slot.placeholder));
    }

    #[test]
    fn reversed_presentation_iterates_descending() {
        let mut host = Recorder::default();
        let mut renderer = Renderer::new(ReconcilePolicy::default(), true);
        let window = WindowState::new(3, 3);
        apply(&mut renderer, &mut host, window, TransitionCause::INIT, 0..10);
        assert_eq!(indices(&renderer), [5, 4, 3]);
        assert_eq!(renderer.view_at(4).map(|v| v.1.index), Some(4));
        assert_eq!(renderer.view_at(2), None);
    }

    #[test]
    fn content_extent_is_reported_on_change_and_clear_destroys_all() {
        let mut host = Recorder::default();
        let mut renderer = Renderer::new(ReconcilePolicy::default(), false);
        let window = WindowState::new(0, 2);
        apply(&mut renderer, &mut host, window, TransitionCause::INIT, 0..10);
        renderer.update_content_extent(80.0, &mut host);
        renderer.update_content_extent(80.0, &mut host);
        renderer.update_content_extent(60.0, &mut host);
        assert_eq!(
            host.events,
            [
                WindowEvent::ContentSizeChange(80.0),
                WindowEvent::ContentSizeChange(60.0)
            ]
        );

        renderer.clear(&mut host);
        assert!(renderer.is_empty());
        assert_eq!(host.destroyed, [0, 1]);
        assert_eq!(renderer.state(), WindowState::EMPTY);
    }
}
