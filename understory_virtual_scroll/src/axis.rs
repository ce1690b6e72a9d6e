// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scroll axis and reading direction.

use kurbo::{Size, Vec2};

/// The axis a virtual window scrolls along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    /// Items are laid out left to right (columns).
    Horizontal,
    /// Items are laid out top to bottom (rows).
    #[default]
    Vertical,
}

impl Orientation {
    /// Extent of `size` along this axis.
    #[must_use]
    pub const fn main_extent(self, size: Size) -> f64 {
        match self {
            Self::Horizontal => size.width,
            Self::Vertical => size.height,
        }
    }

    /// Extent of `size` across this axis.
    #[must_use]
    pub const fn cross_extent(self, size: Size) -> f64 {
        match self {
            Self::Horizontal => size.height,
            Self::Vertical => size.width,
        }
    }

    /// Component of a scroll delta (for example a wheel event) along this axis.
    #[must_use]
    pub const fn main_delta(self, delta: Vec2) -> f64 {
        match self {
            Self::Horizontal => delta.x,
            Self::Vertical => delta.y,
        }
    }
}

/// Reading direction of the host layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Index 0 sits at the left (or top) edge.
    #[default]
    LeftToRight,
    /// Index 0 sits at the right edge of a horizontal strip.
    RightToLeft,
}

/// Returns `true` when rendered views should be presented in descending index order.
///
/// Only horizontal strips are mirrored; vertical strips ignore the reading direction.
#[must_use]
pub const fn is_reversed(orientation: Orientation, direction: Direction) -> bool {
    matches!(
        (orientation, direction),
        (Orientation::Horizontal, Direction::RightToLeft)
    )
}

#[cfg(test)]
mod tests {
    use kurbo::{Size, Vec2};

    use super::{Direction, Orientation, is_reversed};

    #[test]
    fn main_axis_picks_matching_component() {
        let size = Size::new(300.0, 120.0);
        assert_eq!(Orientation::Horizontal.main_extent(size), 300.0);
        assert_eq!(Orientation::Vertical.main_extent(size), 120.0);
        assert_eq!(Orientation::Vertical.cross_extent(size), 300.0);
        assert_eq!(Orientation::Horizontal.main_delta(Vec2::new(4.0, -2.0)), 4.0);
        assert_eq!(Orientation::Vertical.main_delta(Vec2::new(4.0, -2.0)), -2.0);
    }

    #[test]
    fn only_horizontal_rtl_is_reversed() {
        assert!(is_reversed(Orientation::Horizontal, Direction::RightToLeft));
        assert!(!is_reversed(Orientation::Vertical, Direction::RightToLeft));
        assert!(!is_reversed(Orientation::Horizontal, Direction::LeftToRight));
    }
}
