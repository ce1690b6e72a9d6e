// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_virtual_scroll --heading-base-level=0

//! Understory Virtual Scroll: a renderer-agnostic virtual scrolling engine.
//!
//! This crate decides which slice of a large collection should exist as views
//! for a given scroll position, and keeps a pool of host views in step with
//! that slice as the user scrolls, resizes, and edits the collection. It knows
//! nothing about widgets or display trees; hosts plug in through [`ViewHost`].
//!
//! The core concepts are:
//!
//! - [`SizeCache`]: per-item extents and cumulative offsets, with O(1)
//!   arithmetic for uniform items and lazily recomputed prefix sums otherwise.
//! - [`ScrollCoordinateMapper`]: compresses a virtual extent larger than the
//!   platform can scroll into the platform range by a ratio.
//! - [`WindowCalculator`]: a small state machine that turns scroll, resize,
//!   and data inputs into a [`WindowState`] (`start_index`, `chunk_size`) and
//!   records a pending [`Transition`].
//! - [`ChunkRenderer`]: reconciles a [`Transition`] into create, rebind, and
//!   destroy calls on a [`ViewHost`], shifting views on small scrolls,
//!   rebuilding on large jumps, and reusing views by key on data changes.
//! - [`RemoteWindowNotifier`]: announces [`WindowEvent::ChunkPreload`] before a
//!   window renders and [`WindowEvent::ChunkLoad`] after, and tracks which
//!   slice of a remote collection is loaded.
//! - [`ScrollSyncRegistry`] and [`SyncedScroller`]: master election and state
//!   broadcast for viewports that share a scroll axis.
//! - [`VirtualScroller`]: drives all of the above for one strip.
//!
//! ## Minimal example
//!
//! A fixed-height list with a host that just records bound indices:
//!
//! ```rust
//! use understory_virtual_scroll::{Slot, ViewHost, VirtualScroller, WindowConfig, WindowState};
//!
//! struct Rows;
//!
//! impl ViewHost<f64> for Rows {
//!     type View = usize;
//!     type Key = usize;
//!
//!     fn create(&mut self, slot: Slot) -> usize {
//!         slot.index
//!     }
//!     fn rebind(&mut self, view: &mut usize, slot: Slot) {
//!         *view = slot.index;
//!     }
//!     fn destroy(&mut self, _view: usize) {}
//!     fn key(&self, index: usize) -> usize {
//!         index
//!     }
//! }
//!
//! // 10,000 rows, each 40 logical pixels tall, in a 400px viewport.
//! let mut rows = Rows;
//! let mut scroller = VirtualScroller::new(WindowConfig::fixed(10_000, 40.0, 400.0));
//! scroller.mount(&mut rows);
//! assert_eq!(scroller.state(), WindowState::new(0, 11));
//!
//! // Jumping to the last row anchors the window at the end.
//! scroller.scroll_to(9_999, &mut rows);
//! assert_eq!(scroller.state(), WindowState::new(9_989, 11));
//! let bound: Vec<usize> = scroller.renderer().iter().map(|(_, view)| *view).collect();
//! assert_eq!(bound.first(), Some(&9_989));
//! assert_eq!(bound.last(), Some(&9_999));
//! ```
//!
//! For variable item sizes pass [`ItemSize::Variable`], and feed measured
//! extents back with [`VirtualScroller::set_extent`] after layout.
//!
//! ## Synchronized viewports
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use understory_virtual_scroll::{
//!     MemberId, Orientation, ScrollSyncRegistry, SyncAdapter, SyncGroupKey,
//! };
//!
//! let registry = Rc::new(RefCell::new(ScrollSyncRegistry::<f64>::new()));
//! let join = |id| {
//!     let group = SyncGroupKey(0);
//!     SyncAdapter::new(Rc::clone(&registry), MemberId(id), group, Orientation::Vertical, false)
//! };
//! let body = join(1);
//! let pinned = join(2);
//! assert!(body.is_master());
//! assert!(!pinned.is_master());
//!
//! // Dropping the master promotes the next registrant.
//! drop(body);
//! assert!(pinned.is_master());
//! ```
//!
//! ## Features
//!
//! - `std` *(default)*: enables `std` support in `kurbo`.
//! - `libm`: `no_std` math for `kurbo`.
//! - `tracing`: logs window transitions, reconciliation paths, master
//!   elections, and diagnostics through the `tracing` crate.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod animation;
mod axis;
mod chunk;
mod config;
mod diagnostic;
mod event;
mod mapper;
mod prefix_sum;
mod remote;
mod scalar;
mod scroller;
mod signal;
mod size_cache;
mod sync;
mod trace;
mod window;

pub use animation::ScrollAnimation;
pub use axis::{Direction, Orientation, is_reversed};
pub use chunk::{ChunkRenderer, Reconciled, Slot, ViewHost, Views};
pub use config::{ChunkPolicy, ItemSize, ReconcilePolicy, ShiftLimit, WindowConfig};
pub use diagnostic::Diagnostic;
pub use event::WindowEvent;
pub use mapper::{ScrollCoordinate, ScrollCoordinateMapper};
pub use remote::{RemoteWindowNotifier, VirtualCollection};
pub use scalar::Scalar;
pub use scroller::VirtualScroller;
pub use signal::{CollectionDiff, CollectionDiffSignal, DiffQueue, ResizeSignal, ResizeSlot};
pub use size_cache::SizeCache;
pub use sync::{
    MasterSlot, MemberId, ScrollBroadcast, ScrollSyncRegistry, SyncAdapter, SyncGroupKey,
    SyncedScroller,
};
pub use window::{Phase, ScrollAlign, Transition, TransitionCause, WindowCalculator, WindowState};
