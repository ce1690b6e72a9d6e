// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Smooth scrolling between two virtual offsets.

use crate::Scalar;

/// An ease-out cubic tween from one virtual offset to another.
///
/// Time is in caller-chosen milliseconds; the animation only samples the
/// timestamps it is given and never reads a clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAnimation<S: Scalar> {
    from: S,
    to: S,
    start_ms: f64,
    duration_ms: f64,
}

impl<S: Scalar> ScrollAnimation<S> {
    /// Starts a tween at `start_ms` lasting `duration_ms`.
    ///
    /// Non-positive or non-finite durations complete on the first sample.
    #[must_use]
    pub fn new(from: S, to: S, start_ms: f64, duration_ms: f64) -> Self {
        Self {
            from,
            to,
            start_ms,
            duration_ms: if duration_ms.is_finite() {
                duration_ms.max(0.0)
            } else {
                0.0
            },
        }
    }

    /// Offset the tween ends at.
    #[must_use]
    pub const fn target(&self) -> S {
        self.to
    }

    /// Returns `true` once `now_ms` is at or past the end of the tween.
    #[must_use]
    pub fn is_finished(&self, now_ms: f64) -> bool {
        now_ms - self.start_ms >= self.duration_ms
    }

    /// Offset at `now_ms`.
    #[must_use]
    pub fn sample(&self, now_ms: f64) -> S {
        if self.is_finished(now_ms) {
            return self.to;
        }
        let t = ((now_ms - self.start_ms) / self.duration_ms).clamp(0.0, 1.0);
        let from = self.from.to_f64();
        let to = self.to.to_f64();
        S::from_f64(from + (to - from) * ease_out_cubic(t))
    }
}

fn ease_out_cubic(t: f64) -> f64 {
    let inv = 1.0 - t;
    1.0 - inv * inv * inv
}
