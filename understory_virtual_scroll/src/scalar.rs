// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scalar abstraction for extents, offsets, and scroll positions.

use core::fmt::Debug;
use core::ops::{Add, Div, Mul, Sub};

/// A floating-point scalar used for extents, offsets, and scroll positions.
///
/// Implemented for `f32` and `f64`. Use `f64` when the virtual extent of a
/// collection can grow past a few million logical pixels; `f32` loses whole
/// pixels of precision there.
pub trait Scalar:
    Copy
    + Debug
    + Default
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
{
    /// Additive identity.
    fn zero() -> Self;

    /// Multiplicative identity.
    fn one() -> Self;

    /// Converts an item count or index into this scalar.
    fn from_usize(value: usize) -> Self;

    /// Converts a host `f64` (for example a `kurbo` coordinate) into this scalar.
    fn from_f64(value: f64) -> Self;

    /// Widens this scalar to `f64`.
    fn to_f64(self) -> f64;

    /// Rounds toward negative infinity and converts to `isize`, saturating.
    fn floor_to_isize(self) -> isize;

    /// Returns `true` if the value is neither infinite nor NaN.
    fn is_finite(self) -> bool;

    /// Returns `true` if the sign bit is set (including `-0.0` and negative NaNs).
    fn is_sign_negative(self) -> bool;

    /// Returns the larger of two values, preferring `self` when unordered.
    #[inline]
    #[must_use]
    fn max(self, other: Self) -> Self {
        if other > self { other } else { self }
    }

    /// Returns the smaller of two values, preferring `self` when unordered.
    #[inline]
    #[must_use]
    fn min(self, other: Self) -> Self {
        if other < self { other } else { self }
    }

    /// Absolute value.
    #[inline]
    #[must_use]
    fn abs(self) -> Self {
        if self < Self::zero() {
            Self::zero() - self
        } else {
            self
        }
    }

    /// Maps negative and non-finite values to zero.
    ///
    /// This is the clamping rule applied to every extent and offset that
    /// enters the engine from the host.
    #[inline]
    #[must_use]
    fn sanitize(self) -> Self {
        if !self.is_finite() || self.is_sign_negative() {
            Self::zero()
        } else {
            self
        }
    }
}

macro_rules! impl_scalar {
    ($ty:ty) => {
        impl Scalar for $ty {
            #[inline]
            fn zero() -> Self {
                0.0
            }

            #[inline]
            fn one() -> Self {
                1.0
            }

            #[inline]
            #[allow(
                clippy::cast_precision_loss,
                reason = "Item counts beyond the mantissa are not meaningfully addressable"
            )]
            fn from_usize(value: usize) -> Self {
                value as $ty
            }

            #[inline]
            #[allow(
                clippy::cast_possible_truncation,
                trivial_numeric_casts,
                reason = "Narrowing host coordinates into the chosen scalar is intended"
            )]
            fn from_f64(value: f64) -> Self {
                value as $ty
            }

            #[inline]
            #[allow(trivial_numeric_casts, reason = "Shared by the f32 and f64 impls")]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_precision_loss,
                reason = "`as` saturates; the fix-up below only corrects the rounding direction"
            )]
            fn floor_to_isize(self) -> isize {
                let truncated = self as isize;
                if (truncated as $ty) > self {
                    truncated.saturating_sub(1)
                } else {
                    truncated
                }
            }

            #[inline]
            fn is_finite(self) -> bool {
                <$ty>::is_finite(self)
            }

            #[inline]
            fn is_sign_negative(self) -> bool {
                <$ty>::is_sign_negative(self)
            }
        }
    };
}

impl_scalar!(f32);
impl_scalar!(f64);
