// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Non-fatal conditions the engine absorbs and reports.
//!
//! Nothing in this crate returns an error across its public surface. Malformed
//! input is clamped to the nearest valid value and the engine keeps going; a
//! [`Diagnostic`] is queued as a [`WindowEvent::Diagnostic`](crate::WindowEvent)
//! so hosts can surface it in their own logs.

/// A condition that was corrected silently.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum Diagnostic {
    /// A negative or non-finite size, extent, or offset was clamped to zero.
    #[error("invalid {what} ({value}) clamped to 0")]
    Configuration {
        /// Which input was rejected.
        what: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// The size cache length disagreed with the collection length and was rebuilt.
    #[error("size cache held {cached} entries for {expected} items; rebuilt")]
    Desync {
        /// Entries in the cache before the rebuild.
        cached: usize,
        /// Items in the collection.
        expected: usize,
    },
    /// The virtual extent exceeds the platform scroll range and is being compressed.
    #[error("virtual extent {virtual_extent} exceeds the platform scroll range; ratio {ratio}")]
    Overflow {
        /// Total virtual extent of the collection.
        virtual_extent: f64,
        /// Ratio applied between virtual and actual coordinates.
        ratio: f64,
    },
}

impl Diagnostic {
    /// Builds a [`Diagnostic::Configuration`] for `value` when it had to be clamped.
    pub(crate) fn check<S: crate::Scalar>(what: &'static str, value: S) -> Option<Self> {
        if value.is_finite() && !value.is_sign_negative() {
            None
        } else {
            Some(Self::Configuration {
                what,
                value: value.to_f64(),
            })
        }
    }
}
