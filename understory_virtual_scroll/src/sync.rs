// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scroll synchronization between viewports that share an axis.
//!
//! Grids often split one logical scroll axis across several viewports (pinned
//! and unpinned column blocks, a header row and a body). Exactly one of them,
//! the master, computes windows; the others copy its state.
//!
//! Groups live in an explicit [`ScrollSyncRegistry`] that the application
//! owns, keyed by `(SyncGroupKey, Orientation)`. Within a group the first
//! registrant claims the [`MasterSlot`]; a forced registration takes it over;
//! releasing the master promotes the next registrant in registration order.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::mem;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::trace::{vdebug, vwarn};
use crate::{Orientation, Scalar, ViewHost, VirtualScroller, WindowState};

/// Identifies a group of synchronized viewports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyncGroupKey(pub u64);

/// Identifies one viewport within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(pub u64);

/// Who computes windows for a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MasterSlot {
    /// Nobody; the next registrant claims it.
    #[default]
    Unclaimed,
    /// The given member is the master.
    Claimed(MemberId),
}

/// A master's window and scroll position, as copied by slaves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollBroadcast<S: Scalar> {
    /// The master's window.
    pub state: WindowState,
    /// The master's virtual scroll offset.
    pub virtual_offset: S,
}

#[derive(Debug, Clone)]
struct SyncGroup<S: Scalar> {
    master: MasterSlot,
    members: SmallVec<[MemberId; 4]>,
    latest: Option<ScrollBroadcast<S>>,
    generation: u64,
    relayed: Vec<S>,
}

impl<S: Scalar> Default for SyncGroup<S> {
    fn default() -> Self {
        Self {
            master: MasterSlot::Unclaimed,
            members: SmallVec::new(),
            latest: None,
            generation: 0,
            relayed: Vec::new(),
        }
    }
}

impl<S: Scalar> SyncGroup<S> {
    /// Hands the slot to the first registrant after `released`, wrapping around.
    fn promote_after(&mut self, released: MemberId) {
        let position = self.members.iter().position(|m| *m == released);
        let next = match position {
            Some(position) => self
                .members
                .iter()
                .cycle()
                .skip(position + 1)
                .take(self.members.len())
                .find(|m| **m != released)
                .copied(),
            None => self.members.first().copied(),
        };
        self.master = next.map_or(MasterSlot::Unclaimed, MasterSlot::Claimed);
    }
}

/// Master election and state broadcast for synchronized viewports.
#[derive(Debug, Clone)]
pub struct ScrollSyncRegistry<S: Scalar> {
    groups: HashMap<(SyncGroupKey, Orientation), SyncGroup<S>>,
}

impl<S: Scalar> Default for ScrollSyncRegistry<S> {
    fn default() -> Self {
        Self {
            groups: HashMap::new(),
        }
    }
}

impl<S: Scalar> ScrollSyncRegistry<S> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `member` to a group.
    ///
    /// The first registrant claims an unclaimed slot; `forced` takes over an
    /// existing claim. Returns `true` if `member` is the master afterwards.
    pub fn register(
        &mut self,
        member: MemberId,
        key: SyncGroupKey,
        axis: Orientation,
        forced: bool,
    ) -> bool {
        let group = self.groups.entry((key, axis)).or_default();
        if !group.members.contains(&member) {
            group.members.push(member);
        }
        if forced || group.master == MasterSlot::Unclaimed {
            if group.master != MasterSlot::Claimed(member) {
                vdebug!(?key, ?axis, ?member, forced, "sync master claimed");
            }
            group.master = MasterSlot::Claimed(member);
        }
        group.master == MasterSlot::Claimed(member)
    }

    /// Removes `member` from a group, promoting a new master if it held the slot.
    pub fn unregister(&mut self, member: MemberId, key: SyncGroupKey, axis: Orientation) {
        let Some(group) = self.groups.get_mut(&(key, axis)) else {
            return;
        };
        if group.master == MasterSlot::Claimed(member) {
            group.promote_after(member);
            vdebug!(?key, ?axis, master = ?group.master, "sync master released");
        }
        group.members.retain(|m| *m != member);
        if group.members.is_empty() {
            self.groups.remove(&(key, axis));
        }
    }

    /// Releases the current master and promotes the next registrant.
    ///
    /// With a single registrant the slot becomes [`MasterSlot::Unclaimed`].
    pub fn reset_master(&mut self, key: SyncGroupKey, axis: Orientation) {
        let Some(group) = self.groups.get_mut(&(key, axis)) else {
            return;
        };
        if let MasterSlot::Claimed(current) = group.master {
            group.promote_after(current);
            vdebug!(?key, ?axis, master = ?group.master, "sync master reset");
        }
    }

    /// The group's master slot.
    #[must_use]
    pub fn master_slot(&self, key: SyncGroupKey, axis: Orientation) -> MasterSlot {
        self.groups
            .get(&(key, axis))
            .map_or(MasterSlot::Unclaimed, |group| group.master)
    }

    /// The group's master, if claimed.
    #[must_use]
    pub fn master(&self, key: SyncGroupKey, axis: Orientation) -> Option<MemberId> {
        match self.master_slot(key, axis) {
            MasterSlot::Claimed(member) => Some(member),
            MasterSlot::Unclaimed => None,
        }
    }

    /// Returns `true` if `member` is the group's master.
    #[must_use]
    pub fn is_master(&self, member: MemberId, key: SyncGroupKey, axis: Orientation) -> bool {
        self.master(key, axis) == Some(member)
    }

    /// Registrants of a group, in registration order.
    #[must_use]
    pub fn members(&self, key: SyncGroupKey, axis: Orientation) -> &[MemberId] {
        self.groups
            .get(&(key, axis))
            .map(|group| group.members.as_slice())
            .unwrap_or(&[])
    }

    /// Stores a broadcast from the master.
    ///
    /// Returns `false` (and stores nothing) if `member` is not the master.
    /// Republishing the stored broadcast keeps the generation, so slaves do
    /// not apply it twice.
    pub fn publish(
        &mut self,
        member: MemberId,
        key: SyncGroupKey,
        axis: Orientation,
        broadcast: ScrollBroadcast<S>,
    ) -> bool {
        let Some(group) = self.groups.get_mut(&(key, axis)) else {
            return false;
        };
        if group.master != MasterSlot::Claimed(member) {
            return false;
        }
        if group.latest != Some(broadcast) {
            group.latest = Some(broadcast);
            group.generation += 1;
        }
        true
    }

    /// The newest broadcast and its generation.
    #[must_use]
    pub fn latest(
        &self,
        key: SyncGroupKey,
        axis: Orientation,
    ) -> Option<(u64, ScrollBroadcast<S>)> {
        let group = self.groups.get(&(key, axis))?;
        group.latest.map(|broadcast| (group.generation, broadcast))
    }

    /// Queues a slave's scroll input (a virtual offset) for the master.
    pub fn relay(&mut self, key: SyncGroupKey, axis: Orientation, virtual_offset: S) {
        if let Some(group) = self.groups.get_mut(&(key, axis)) {
            group.relayed.push(virtual_offset);
        }
    }

    /// Takes relayed offsets, in arrival order. Only the master may take them.
    pub fn take_relayed(
        &mut self,
        member: MemberId,
        key: SyncGroupKey,
        axis: Orientation,
    ) -> Vec<S> {
        match self.groups.get_mut(&(key, axis)) {
            Some(group) if group.master == MasterSlot::Claimed(member) => {
                mem::take(&mut group.relayed)
            }
            _ => Vec::new(),
        }
    }
}

/// One viewport's membership in a shared [`ScrollSyncRegistry`].
///
/// [`leave`](Self::leave) or dropping the adapter unregisters the member,
/// promoting a new master if needed.
#[derive(Debug)]
pub struct SyncAdapter<S: Scalar> {
    registry: Rc<RefCell<ScrollSyncRegistry<S>>>,
    member: MemberId,
    key: SyncGroupKey,
    axis: Orientation,
    seen_generation: u64,
    registered: bool,
}

impl<S: Scalar> SyncAdapter<S> {
    /// Registers `member` in a group of `registry`.
    pub fn new(
        registry: Rc<RefCell<ScrollSyncRegistry<S>>>,
        member: MemberId,
        key: SyncGroupKey,
        axis: Orientation,
        forced: bool,
    ) -> Self {
        registry.borrow_mut().register(member, key, axis, forced);
        Self {
            registry,
            member,
            key,
            axis,
            seen_generation: 0,
            registered: true,
        }
    }

    /// This viewport's id.
    #[must_use]
    pub const fn member(&self) -> MemberId {
        self.member
    }

    /// Returns `true` until [`leave`](Self::leave) is called.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.registered
    }

    /// Unregisters the member, handing the master slot to the next registrant.
    ///
    /// Calling it again has no effect.
    pub fn leave(&mut self) {
        if self.registered {
            self.registry
                .borrow_mut()
                .unregister(self.member, self.key, self.axis);
            self.registered = false;
        }
    }

    /// Returns `true` if this viewport is currently the master.
    #[must_use]
    pub fn is_master(&self) -> bool {
        self.registry
            .borrow()
            .is_master(self.member, self.key, self.axis)
    }

    /// Publishes a broadcast if this viewport is the master.
    pub fn publish(&self, broadcast: ScrollBroadcast<S>) -> bool {
        self.registry
            .borrow_mut()
            .publish(self.member, self.key, self.axis, broadcast)
    }

    /// Queues a scroll input for the master.
    pub fn relay(&self, virtual_offset: S) {
        self.registry
            .borrow_mut()
            .relay(self.key, self.axis, virtual_offset);
    }

    /// Takes relayed offsets if this viewport is the master.
    pub fn take_relayed(&self) -> Vec<S> {
        self.registry
            .borrow_mut()
            .take_relayed(self.member, self.key, self.axis)
    }

    /// The newest broadcast not yet seen by this viewport.
    pub fn take_broadcast(&mut self) -> Option<ScrollBroadcast<S>> {
        let (generation, broadcast) = self.registry.borrow().latest(self.key, self.axis)?;
        if generation == self.seen_generation {
            return None;
        }
        self.seen_generation = generation;
        Some(broadcast)
    }
}

impl<S: Scalar> Drop for SyncAdapter<S> {
    fn drop(&mut self) {
        if !self.registered {
            return;
        }
        match self.registry.try_borrow_mut() {
            Ok(mut registry) => registry.unregister(self.member, self.key, self.axis),
            Err(_) => {
                vwarn!(
                    member = ?self.member,
                    key = ?self.key,
                    "sync registry busy; member left registered"
                );
            }
        }
    }
}

/// A [`VirtualScroller`] that takes part in scroll synchronization.
///
/// The master applies its own and relayed scroll input and publishes the
/// result; slaves relay their scroll input and copy the newest broadcast in
/// [`sync`](Self::sync) without computing a chunk size of their own.
pub struct SyncedScroller<S: Scalar, H: ViewHost<S>> {
    scroller: VirtualScroller<S, H>,
    adapter: SyncAdapter<S>,
}

impl<S: Scalar, H: ViewHost<S>> core::fmt::Debug for SyncedScroller<S, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SyncedScroller")
            .field("scroller", &self.scroller)
            .field("adapter", &self.adapter)
            .finish()
    }
}

impl<S: Scalar, H: ViewHost<S>> SyncedScroller<S, H> {
    /// Attaches `adapter` to `scroller`.
    #[must_use]
    pub fn new(scroller: VirtualScroller<S, H>, adapter: SyncAdapter<S>) -> Self {
        Self { scroller, adapter }
    }

    /// The wrapped scroller.
    #[must_use]
    pub fn scroller(&self) -> &VirtualScroller<S, H> {
        &self.scroller
    }

    /// The wrapped scroller, for inputs that are not synchronized (resize, data).
    pub fn scroller_mut(&mut self) -> &mut VirtualScroller<S, H> {
        &mut self.scroller
    }

    /// The synchronization membership.
    #[must_use]
    pub fn adapter(&self) -> &SyncAdapter<S> {
        &self.adapter
    }

    /// Returns `true` if this viewport computes windows for its group.
    #[must_use]
    pub fn is_master(&self) -> bool {
        self.adapter.is_master()
    }

    /// Handles a platform scroll event.
    ///
    /// The master applies it and publishes; a slave relays it to the master.
    pub fn on_scroll(&mut self, raw_offset: S, host: &mut H) {
        if self.adapter.is_master() {
            self.scroller.on_scroll(raw_offset, host);
            self.publish();
        } else {
            let virtual_offset = self.scroller.calculator().mapper().to_virtual(raw_offset);
            self.adapter.relay(virtual_offset);
        }
    }

    /// Scrolls to a virtual offset, through the master if this is a slave.
    pub fn scroll_to_offset(&mut self, offset: S, host: &mut H) {
        if self.adapter.is_master() {
            self.scroller.scroll_to_offset(offset, host);
            self.publish();
        } else {
            self.adapter.relay(offset);
        }
    }

    /// Brings this viewport up to date with its group.
    ///
    /// The master applies relayed inputs in arrival order and publishes its
    /// window; a slave applies the newest unseen broadcast.
    pub fn sync(&mut self, host: &mut H) {
        if self.adapter.is_master() {
            for offset in self.adapter.take_relayed() {
                self.scroller.scroll_to_offset(offset, host);
            }
            self.publish();
        } else if let Some(broadcast) = self.adapter.take_broadcast() {
            self.scroller.apply_broadcast(broadcast, host);
        }
    }

    /// Destroys every view and leaves the group.
    ///
    /// If this viewport was the master, the next registrant takes over.
    pub fn teardown(&mut self, host: &mut H) {
        self.scroller.teardown(host);
        self.adapter.leave();
    }

    fn publish(&self) {
        self.adapter.publish(self.scroller.calculator().broadcast());
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use core::cell::RefCell;

    use super::{
        MasterSlot, MemberId, ScrollBroadcast, ScrollSyncRegistry, SyncAdapter, SyncGroupKey,
        SyncedScroller,
    };
    use crate::{Orientation, Slot, ViewHost, VirtualScroller, WindowConfig, WindowState};

    #[derive(Default)]
    struct Counter {
        live: usize,
    }

    impl ViewHost<f64> for Counter {
        type View = Slot;
        type Key = usize;

        fn create(&mut self, slot: Slot) -> Slot {
            self.live += 1;
            slot
        }

        fn rebind(&mut self, view: &mut Slot, slot: Slot) {
            *view = slot;
        }

        fn destroy(&mut self, _view: Slot) {
            self.live -= 1;
        }

        fn key(&self, index: usize) -> usize {
            index
        }
    }

    fn synced(
        registry: &Rc<RefCell<ScrollSyncRegistry<f64>>>,
        member: MemberId,
        host: &mut Counter,
    ) -> SyncedScroller<f64, Counter> {
        let mut scroller = VirtualScroller::new(WindowConfig::fixed(1_000, 20.0, 200.0));
        scroller.mount(host);
        SyncedScroller::new(scroller, join(registry, member))
    }

    const GRID: SyncGroupKey = SyncGroupKey(7);
    const A: MemberId = MemberId(1);
    const B: MemberId = MemberId(2);
    const C: MemberId = MemberId(3);

    fn join(registry: &Rc<RefCell<ScrollSyncRegistry<f64>>>, member: MemberId) -> SyncAdapter<f64> {
        SyncAdapter::new(Rc::clone(registry), member, GRID, Orientation::Vertical, false)
    }

    fn broadcast(start: usize) -> ScrollBroadcast<f64> {
        ScrollBroadcast {
            state: WindowState::new(start, 5),
            virtual_offset: 10.0,
        }
    }

    #[test]
    fn first_registrant_claims_and_forced_takes_over() {
        let mut registry = ScrollSyncRegistry::<f64>::new();
        assert!(registry.register(A, GRID, Orientation::Vertical, false));
        assert!(!registry.register(B, GRID, Orientation::Vertical, false));
        assert_eq!(registry.master(GRID, Orientation::Vertical), Some(A));

        // Axes are independent groups.
        assert!(registry.register(B, GRID, Orientation::Horizontal, false));

        assert!(registry.register(C, GRID, Orientation::Vertical, true));
        assert!(registry.is_master(C, GRID, Orientation::Vertical));
        assert_eq!(registry.members(GRID, Orientation::Vertical), [A, B, C]);
    }

    #[test]
    fn releasing_master_promotes_next_in_order() {
        let mut registry = ScrollSyncRegistry::<f64>::new();
        registry.register(A, GRID, Orientation::Vertical, false);
        registry.register(B, GRID, Orientation::Vertical, false);
        registry.register(C, GRID, Orientation::Vertical, false);

        registry.unregister(A, GRID, Orientation::Vertical);
        assert_eq!(registry.master(GRID, Orientation::Vertical), Some(B));

        registry.reset_master(GRID, Orientation::Vertical);
        assert_eq!(registry.master(GRID, Orientation::Vertical), Some(C));
        registry.reset_master(GRID, Orientation::Vertical);
        assert_eq!(registry.master(GRID, Orientation::Vertical), Some(B));

        registry.unregister(C, GRID, Orientation::Vertical);
        registry.reset_master(GRID, Orientation::Vertical);
        assert_eq!(
            registry.master_slot(GRID, Orientation::Vertical),
            MasterSlot::Unclaimed
        );
        assert!(registry.register(C, GRID, Orientation::Vertical, false));

        registry.unregister(B, GRID, Orientation::Vertical);
        registry.unregister(C, GRID, Orientation::Vertical);
        assert!(registry.members(GRID, Orientation::Vertical).is_empty());
    }

    #[test]
    fn only_master_publishes_and_takes_relays() {
        let mut registry = ScrollSyncRegistry::new();
        registry.register(A, GRID, Orientation::Vertical, false);
        registry.register(B, GRID, Orientation::Vertical, false);

        assert!(!registry.publish(B, GRID, Orientation::Vertical, broadcast(3)));
        assert_eq!(registry.latest(GRID, Orientation::Vertical), None);
        assert!(registry.publish(A, GRID, Orientation::Vertical, broadcast(3)));
        assert_eq!(
            registry.latest(GRID, Orientation::Vertical),
            Some((1, broadcast(3)))
        );

        registry.relay(GRID, Orientation::Vertical, 5.0);
        registry.relay(GRID, Orientation::Vertical, 9.0);
        assert!(registry.take_relayed(B, GRID, Orientation::Vertical).is_empty());
        assert_eq!(registry.take_relayed(A, GRID, Orientation::Vertical), [5.0, 9.0]);
        assert!(registry.take_relayed(A, GRID, Orientation::Vertical).is_empty());
    }

    #[test]
    fn adapters_see_each_broadcast_once_and_unregister_on_drop() {
        let registry = Rc::new(RefCell::new(ScrollSyncRegistry::new()));
        let master = join(&registry, A);
        let mut slave = join(&registry, B);
        assert!(master.is_master());
        assert!(!slave.is_master());

        assert_eq!(slave.take_broadcast(), None);
        master.publish(broadcast(4));
        assert_eq!(slave.take_broadcast(), Some(broadcast(4)));
        assert_eq!(slave.take_broadcast(), None);

        drop(master);
        assert!(slave.is_master());
    }

    #[test]
    fn republishing_an_unchanged_window_keeps_the_generation() {
        let mut registry = ScrollSyncRegistry::new();
        registry.register(A, GRID, Orientation::Vertical, false);
        assert!(registry.publish(A, GRID, Orientation::Vertical, broadcast(3)));
        assert!(registry.publish(A, GRID, Orientation::Vertical, broadcast(3)));
        assert_eq!(
            registry.latest(GRID, Orientation::Vertical),
            Some((1, broadcast(3)))
        );
        assert!(registry.publish(A, GRID, Orientation::Vertical, broadcast(4)));
        assert_eq!(
            registry.latest(GRID, Orientation::Vertical),
            Some((2, broadcast(4)))
        );
    }

    #[test]
    fn idle_master_sync_does_not_resend_its_window() {
        let registry = Rc::new(RefCell::new(ScrollSyncRegistry::new()));
        let mut host = Counter::default();
        let mut master = synced(&registry, A, &mut host);
        let mut slave = synced(&registry, B, &mut host);

        master.on_scroll(400.0, &mut host);
        slave.sync(&mut host);
        assert_eq!(slave.scroller().state(), master.scroller().state());
        let generation = registry.borrow().latest(GRID, Orientation::Vertical).map(|l| l.0);

        for _ in 0..3 {
            master.sync(&mut host);
        }
        let after = registry.borrow().latest(GRID, Orientation::Vertical).map(|l| l.0);
        assert_eq!(after, generation);
    }

    #[test]
    fn teardown_releases_views_and_hands_over_master() {
        let registry = Rc::new(RefCell::new(ScrollSyncRegistry::new()));
        let mut host = Counter::default();
        let mut master = synced(&registry, A, &mut host);
        let slave = synced(&registry, B, &mut host);
        assert_eq!(host.live, 22);

        master.teardown(&mut host);
        assert_eq!(host.live, 11);
        assert!(master.scroller().renderer().is_empty());
        assert!(!master.adapter().is_registered());
        assert!(slave.is_master());
        assert_eq!(registry.borrow().members(GRID, Orientation::Vertical), [B]);

        // Dropping after teardown does not unregister twice.
        drop(master);
        assert!(slave.is_master());
    }

    #[test]
    fn adapter_dropped_while_registry_is_borrowed_stays_registered() {
        let registry = Rc::new(RefCell::new(ScrollSyncRegistry::<f64>::new()));
        let adapter = join(&registry, A);
        {
            let _guard = registry.borrow();
            drop(adapter);
        }
        assert!(registry.borrow().is_master(A, GRID, Orientation::Vertical));
    }
}
