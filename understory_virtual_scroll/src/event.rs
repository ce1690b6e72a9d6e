// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Notifications delivered to the host.

use crate::{Diagnostic, Scalar, WindowState};

/// Something the host may want to react to.
///
/// Events reach the host through [`ViewHost::notify`](crate::ViewHost::notify)
/// in the order they happen, interleaved with view creation and destruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowEvent<S: Scalar> {
    /// A new window is about to be rendered; remote hosts should start
    /// fetching `state`'s range if it is not loaded.
    ChunkPreload {
        /// The window that will be rendered.
        state: WindowState,
        /// Total (virtual) item count.
        total_count: usize,
    },
    /// The rendered pool now matches `state`.
    ChunkLoad(WindowState),
    /// A collection change has been applied and rendered.
    DataChanged,
    /// The summed extent of the rendered items changed.
    ContentSizeChange(S),
    /// The content started or stopped overflowing the viewport.
    ScrollbarVisibilityChanged(bool),
    /// An input was corrected; see [`Diagnostic`].
    Diagnostic(Diagnostic),
}
