// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Logging macros that compile away unless the `tracing` feature is enabled.

#[cfg(feature = "tracing")]
macro_rules! vtrace {
    ($($arg:tt)*) => { ::tracing::trace!(target: "understory_virtual_scroll", $($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! vtrace {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "tracing")]
macro_rules! vdebug {
    ($($arg:tt)*) => { ::tracing::debug!(target: "understory_virtual_scroll", $($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! vdebug {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "tracing")]
macro_rules! vwarn {
    ($($arg:tt)*) => { ::tracing::warn!(target: "understory_virtual_scroll", $($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! vwarn {
    ($($arg:tt)*) => {};
}

pub(crate) use {vdebug, vtrace, vwarn};
