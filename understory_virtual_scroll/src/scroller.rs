// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scroller: calculator, notifier, and renderer driven as one unit.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::marker::PhantomData;
use core::ops::Range;

use kurbo::{Size, Vec2};

use crate::trace::vtrace;
use crate::{
    ChunkRenderer, CollectionDiff, CollectionDiffSignal, ItemSize, RemoteWindowNotifier,
    ResizeSignal, Scalar, ScrollAlign, ScrollAnimation, ScrollBroadcast, Transition,
    TransitionCause, ViewHost, VirtualCollection, WindowCalculator, WindowConfig, WindowEvent,
    WindowState, is_reversed,
};

/// A virtualized strip bound to a [`ViewHost`].
///
/// Every mutating method runs the same sequence before returning:
///
/// 1. the [`WindowCalculator`] resolves the input,
/// 2. queued calculator events are forwarded to [`ViewHost::notify`],
/// 3. [`WindowEvent::ChunkPreload`] announces the new window,
/// 4. the [`ChunkRenderer`] creates, rebinds, and destroys views,
/// 5. [`WindowEvent::ChunkLoad`] reports the committed window, followed by
///    [`WindowEvent::DataChanged`] if the collection changed.
///
/// Resize and collection signals attached with
/// [`attach_resize_signal`](Self::attach_resize_signal) and
/// [`attach_diff_signal`](Self::attach_diff_signal) are only consulted in
/// [`tick`](Self::tick), as is any smooth scroll started with
/// [`scroll_to_smooth`](Self::scroll_to_smooth).
pub struct VirtualScroller<S: Scalar, H: ViewHost<S>> {
    calculator: WindowCalculator<S>,
    renderer: ChunkRenderer<H::View, H::Key, S>,
    notifier: RemoteWindowNotifier,
    animation: Option<ScrollAnimation<S>>,
    resize: Option<Box<dyn ResizeSignal>>,
    diffs: Option<Box<dyn CollectionDiffSignal>>,
    pending_diffs: Vec<CollectionDiff>,
    _host: PhantomData<fn(&mut H)>,
}

impl<S: Scalar, H: ViewHost<S>> fmt::Debug for VirtualScroller<S, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualScroller")
            .field("calculator", &self.calculator)
            .field("rendered", &self.renderer.state())
            .field("notifier", &self.notifier)
            .field("animation", &self.animation)
            .field("resize_attached", &self.resize.is_some())
            .field("diffs_attached", &self.diffs.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: Scalar, H: ViewHost<S>> VirtualScroller<S, H> {
    /// Creates a scroller. Nothing is rendered until [`mount`](Self::mount)
    /// or the first input.
    ///
    /// If `config` declares a `total_item_count`, the collection is treated
    /// as remote with `0..item_count` loaded.
    #[must_use]
    pub fn new(config: WindowConfig<S>) -> Self {
        let reversed = is_reversed(config.orientation, config.direction);
        let renderer = ChunkRenderer::new(config.reconcile_policy, reversed);
        let notifier = match config.total_item_count {
            Some(total) => {
                RemoteWindowNotifier::remote(VirtualCollection::new(total, 0..config.item_count))
            }
            None => RemoteWindowNotifier::local(),
        };
        Self {
            calculator: WindowCalculator::new(config),
            renderer,
            notifier,
            animation: None,
            resize: None,
            diffs: None,
            pending_diffs: Vec::new(),
            _host: PhantomData,
        }
    }

    /// The window calculator.
    #[must_use]
    pub fn calculator(&self) -> &WindowCalculator<S> {
        &self.calculator
    }

    /// The rendered views.
    #[must_use]
    pub fn renderer(&self) -> &ChunkRenderer<H::View, H::Key, S> {
        &self.renderer
    }

    /// The loaded-range tracker.
    #[must_use]
    pub fn notifier(&self) -> &RemoteWindowNotifier {
        &self.notifier
    }

    /// Current window.
    #[must_use]
    pub fn state(&self) -> WindowState {
        self.calculator.state()
    }

    /// Returns `true` while a smooth scroll is in progress.
    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Renders the current window if it is not rendered yet.
    pub fn mount(&mut self, host: &mut H) {
        self.commit(host);
        let next = self.calculator.state();
        if self.renderer.state() != next || self.renderer.len() != next.chunk_size {
            let transition = Transition {
                previous: self.renderer.state(),
                next,
                cause: TransitionCause::INIT,
                stale: 0..0,
            };
            self.render(&transition, host);
        }
    }

    // --- Scrolling -------------------------------------------------------

    /// Handles a platform scroll event (platform coordinates).
    pub fn on_scroll(&mut self, raw_offset: S, host: &mut H) {
        self.scroll_input(host, |calc| calc.on_scroll(raw_offset));
    }

    /// Handles a wheel or trackpad delta; only the scroll-axis component is used.
    pub fn on_wheel(&mut self, delta: Vec2, host: &mut H) -> bool {
        let orientation = self.calculator.config().orientation;
        let delta = S::from_f64(orientation.main_delta(delta));
        self.scroll_input(host, |calc| calc.add_scroll_top(delta))
    }

    /// Scrolls so that `index` starts at the leading edge.
    pub fn scroll_to(&mut self, index: usize, host: &mut H) -> bool {
        self.scroll_input(host, |calc| calc.scroll_to(index))
    }

    /// Scrolls to a virtual offset.
    pub fn scroll_to_offset(&mut self, offset: S, host: &mut H) -> bool {
        self.scroll_input(host, |calc| calc.scroll_to_offset(offset))
    }

    /// See [`WindowCalculator::scroll_next`].
    pub fn scroll_next(&mut self, host: &mut H) -> bool {
        self.scroll_input(host, WindowCalculator::scroll_next)
    }

    /// See [`WindowCalculator::scroll_prev`].
    pub fn scroll_prev(&mut self, host: &mut H) -> bool {
        self.scroll_input(host, WindowCalculator::scroll_prev)
    }

    /// See [`WindowCalculator::scroll_next_page`].
    pub fn scroll_next_page(&mut self, host: &mut H) -> bool {
        self.scroll_input(host, WindowCalculator::scroll_next_page)
    }

    /// See [`WindowCalculator::scroll_prev_page`].
    pub fn scroll_prev_page(&mut self, host: &mut H) -> bool {
        self.scroll_input(host, WindowCalculator::scroll_prev_page)
    }

    /// Scrolls by a signed virtual delta.
    pub fn add_scroll_top(&mut self, delta: S, host: &mut H) -> bool {
        self.scroll_input(host, |calc| calc.add_scroll_top(delta))
    }

    /// Scrolls back to the start.
    pub fn reset_scroll_position(&mut self, host: &mut H) -> bool {
        self.scroll_input(host, WindowCalculator::reset_scroll_position)
    }

    /// Starts an ease-out scroll that brings `index` to the leading edge.
    ///
    /// The tween advances in [`tick`](Self::tick). Any other scroll input
    /// cancels it.
    pub fn scroll_to_smooth(&mut self, index: usize, now_ms: f64, duration_ms: f64) {
        let from = self.calculator.scroll_offset();
        let to = self.calculator.scroll_for_index(index, ScrollAlign::Start);
        self.animation = Some(ScrollAnimation::new(from, to, now_ms, duration_ms));
    }

    /// Stops a smooth scroll where it is.
    pub fn cancel_animation(&mut self) {
        self.animation = None;
    }

    /// Copies a synchronization master's window.
    pub fn apply_broadcast(&mut self, broadcast: ScrollBroadcast<S>, host: &mut H) {
        self.scroll_input(host, |calc| calc.apply_broadcast(broadcast));
    }

    // --- Resize and data -------------------------------------------------

    /// Applies a new viewport size; only the scroll-axis extent is used.
    pub fn resize(&mut self, size: Size, host: &mut H) {
        let orientation = self.calculator.config().orientation;
        let extent = S::from_f64(orientation.main_extent(size));
        self.input(host, |calc| calc.set_container_extent(extent));
    }

    /// Sets the viewport extent along the scroll axis.
    pub fn set_container_extent(&mut self, extent: S, host: &mut H) {
        self.input(host, |calc| calc.set_container_extent(extent));
    }

    /// Sets the platform scroll cap.
    pub fn set_platform_max_scroll(&mut self, platform_max: Option<S>, host: &mut H) {
        self.input(host, |calc| calc.set_platform_max_scroll(platform_max));
    }

    /// Sets the number of locally known items.
    pub fn set_item_count(&mut self, item_count: usize, host: &mut H) {
        self.input(host, |calc| calc.set_item_count(item_count));
    }

    /// Declares (or clears) a remote total, switching between remote and local mode.
    pub fn set_total_item_count(&mut self, total: Option<usize>, host: &mut H) {
        match (total, self.notifier.is_remote()) {
            (None, true) => self.notifier = RemoteWindowNotifier::local(),
            (Some(total), false) => {
                let loaded = 0..self.calculator.config().item_count;
                self.notifier = RemoteWindowNotifier::remote(VirtualCollection::new(total, loaded));
            }
            _ => {}
        }
        self.input(host, |calc| calc.set_total_item_count(total));
    }

    /// Replaces the item sizing.
    pub fn set_item_size(&mut self, item_size: ItemSize<S>, host: &mut H) {
        self.input(host, |calc| calc.set_item_size(item_size));
    }

    /// Feeds back a measured extent for one item.
    pub fn set_extent(&mut self, index: usize, extent: S, host: &mut H) {
        self.input(host, |calc| calc.set_extent(index, extent));
    }

    /// Applies an incremental collection change.
    pub fn apply_diff(&mut self, diff: CollectionDiff, host: &mut H) {
        self.input(host, |calc| calc.apply_diff(diff));
    }

    /// Re-queries every item extent.
    pub fn recalc_update_sizes(&mut self, host: &mut H) {
        self.input(host, WindowCalculator::recalc_update_sizes);
    }

    /// Records newly loaded remote data and rebinds placeholders that now have data.
    pub fn set_loaded(&mut self, loaded: Range<usize>, host: &mut H) {
        self.notifier.set_loaded(loaded);
        self.commit(host);
        let state = self.renderer.state();
        let transition = Transition {
            previous: state,
            next: state,
            cause: TransitionCause::DATA,
            stale: 0..0,
        };
        let available = self.notifier.available(self.calculator.total_count());
        self.renderer.reconcile(&transition, available, host);
        host.notify(WindowEvent::DataChanged);
    }

    // --- Signals and ticks -----------------------------------------------

    /// Attaches a source of viewport sizes, replacing any previous one.
    pub fn attach_resize_signal(&mut self, signal: impl ResizeSignal + 'static) {
        self.resize = Some(Box::new(signal));
    }

    /// Attaches a source of collection changes, replacing any previous one.
    pub fn attach_diff_signal(&mut self, signal: impl CollectionDiffSignal + 'static) {
        self.diffs = Some(Box::new(signal));
    }

    /// Drops both attached signals.
    pub fn detach_signals(&mut self) {
        self.resize = None;
        self.diffs = None;
    }

    /// Runs one rendering tick.
    ///
    /// Applies the latest pending viewport size, then pending collection
    /// changes in arrival order, then advances any smooth scroll, and commits.
    /// Returns `true` if a smooth scroll is still running.
    pub fn tick(&mut self, now_ms: f64, host: &mut H) -> bool {
        let size = self.resize.as_mut().and_then(|signal| signal.take_size());
        if let Some(size) = size {
            let orientation = self.calculator.config().orientation;
            self.calculator
                .set_container_extent(S::from_f64(orientation.main_extent(size)));
        }

        if let Some(signal) = &mut self.diffs {
            signal.drain_diffs(&mut self.pending_diffs);
        }
        for diff in self.pending_diffs.drain(..) {
            self.calculator.apply_diff(diff);
        }

        if let Some(animation) = self.animation {
            self.calculator.scroll_to_offset(animation.sample(now_ms));
            if animation.is_finished(now_ms) {
                self.animation = None;
            }
        }

        vtrace!(now_ms, animating = self.animation.is_some(), "tick");
        self.commit(host);
        self.animation.is_some()
    }

    /// Destroys every view, drops attached signals, and forgets pending state.
    pub fn teardown(&mut self, host: &mut H) {
        self.renderer.clear(host);
        self.detach_signals();
        self.animation = None;
        self.pending_diffs.clear();
        self.notifier.reset();
        self.calculator.drain_events().for_each(drop);
        let _ = self.calculator.take_transition();
    }

    // --- Internals -------------------------------------------------------

    fn scroll_input<R>(
        &mut self,
        host: &mut H,
        op: impl FnOnce(&mut WindowCalculator<S>) -> R,
    ) -> R {
        self.animation = None;
        self.input(host, op)
    }

    fn input<R>(&mut self, host: &mut H, op: impl FnOnce(&mut WindowCalculator<S>) -> R) -> R {
        let result = op(&mut self.calculator);
        self.commit(host);
        result
    }

    fn commit(&mut self, host: &mut H) {
        for event in self.calculator.drain_events() {
            host.notify(event);
        }
        if let Some(transition) = self.calculator.take_transition() {
            self.render(&transition, host);
        }
    }

    fn render(&mut self, transition: &Transition, host: &mut H) {
        let total = self.calculator.total_count();
        self.notifier.set_total(total);
        if let Some(event) = self.notifier.announce(transition, total) {
            host.notify(event);
        }
        let available = self.notifier.available(total);
        self.renderer.reconcile(transition, available, host);
        let extent = self.calculator.window_extent();
        self.renderer.update_content_extent(extent, host);
        if let Some(event) = self.notifier.commit(transition.next) {
            host.notify(event);
        }
        if transition.cause.contains(TransitionCause::DATA) {
            host.notify(WindowEvent::DataChanged);
        }
    }
}
