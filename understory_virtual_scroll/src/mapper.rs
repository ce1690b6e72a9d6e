// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compression of the virtual scroll range into the platform scroll range.
//!
//! Host platforms cap how large a single scrollable region may be. Once the
//! virtual extent of a collection passes that cap, a 1:1 mapping would leave
//! the tail of the collection unreachable and the scrollbar thumb meaningless.
//! [`ScrollCoordinateMapper`] divides virtual positions by a ratio so the
//! platform scroll range stays addressable, while index math keeps operating
//! on true virtual offsets.

use crate::Scalar;

/// A scroll position expressed in both coordinate spaces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollCoordinate<S: Scalar> {
    /// Offset in the full virtual extent of the collection.
    pub virtual_position: S,
    /// Offset in the platform scroll range.
    pub actual_position: S,
    /// `virtual_position / actual_position`; always at least one.
    pub ratio: S,
}

/// Maps between virtual and platform (actual) scroll coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollCoordinateMapper<S: Scalar> {
    platform_max: Option<S>,
    virtual_extent: S,
    ratio: S,
}

impl<S: Scalar> ScrollCoordinateMapper<S> {
    /// Creates a mapper for a platform whose scroll range is capped at `platform_max`.
    ///
    /// `None` (or a non-positive cap) means the platform range is unbounded and
    /// the ratio stays at one.
    #[must_use]
    pub fn new(platform_max: Option<S>) -> Self {
        Self {
            platform_max: platform_max.filter(|max| max.sanitize() > S::zero()),
            virtual_extent: S::zero(),
            ratio: S::one(),
        }
    }

    /// Recomputes the ratio for a new total virtual extent.
    ///
    /// Returns `true` if the ratio changed.
    pub fn update(&mut self, virtual_extent: S) -> bool {
        self.virtual_extent = virtual_extent.sanitize();
        let ratio = match self.platform_max {
            Some(max) => (self.virtual_extent / max).max(S::one()),
            None => S::one(),
        };
        let changed = ratio != self.ratio;
        self.ratio = ratio;
        changed
    }

    /// Changes the platform cap and recomputes the ratio.
    ///
    /// Returns `true` if the ratio changed.
    pub fn set_platform_max(&mut self, platform_max: Option<S>) -> bool {
        self.platform_max = platform_max.filter(|max| max.sanitize() > S::zero());
        self.update(self.virtual_extent)
    }

    /// Current ratio between virtual and actual coordinates.
    #[must_use]
    pub const fn ratio(&self) -> S {
        self.ratio
    }

    /// Returns `true` if the virtual extent is being compressed.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.ratio > S::one()
    }

    /// Total virtual extent last passed to [`update`](Self::update).
    #[must_use]
    pub const fn virtual_extent(&self) -> S {
        self.virtual_extent
    }

    /// Extent of the scrollable region as presented to the platform.
    #[must_use]
    pub fn actual_extent(&self) -> S {
        self.to_actual(self.virtual_extent)
    }

    /// Converts a virtual offset into a platform offset.
    #[must_use]
    pub fn to_actual(&self, virtual_position: S) -> S {
        virtual_position / self.ratio
    }

    /// Converts a platform offset into a virtual offset.
    #[must_use]
    pub fn to_virtual(&self, actual_position: S) -> S {
        actual_position * self.ratio
    }

    /// Largest virtual scroll offset for a viewport of `viewport_extent`.
    #[must_use]
    pub fn max_virtual(&self, viewport_extent: S) -> S {
        (self.virtual_extent - viewport_extent.sanitize()).max(S::zero())
    }

    /// Largest platform scroll offset for a viewport of `viewport_extent`.
    #[must_use]
    pub fn max_actual(&self, viewport_extent: S) -> S {
        self.to_actual(self.max_virtual(viewport_extent))
    }

    /// Describes a virtual position in both coordinate spaces.
    #[must_use]
    pub fn coordinate(&self, virtual_position: S) -> ScrollCoordinate<S> {
        ScrollCoordinate {
            virtual_position,
            actual_position: self.to_actual(virtual_position),
            ratio: self.ratio,
        }
    }
}

impl<S: Scalar> Default for ScrollCoordinateMapper<S> {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::ScrollCoordinateMapper;

    #[test]
    fn large_extents_are_compressed() {
        let mut mapper = ScrollCoordinateMapper::new(Some(10_000_000.0_f64));
        assert!(mapper.update(50_000_000.0));
        assert_eq!(mapper.ratio(), 5.0);
        assert!(mapper.is_compressed());
        assert_eq!(mapper.to_actual(25_000_000.0), 5_000_000.0);
        assert_eq!(mapper.to_virtual(5_000_000.0), 25_000_000.0);
        assert_eq!(mapper.actual_extent(), 10_000_000.0);
    }

    #[test]
    fn small_extents_map_one_to_one() {
        let mut mapper = ScrollCoordinateMapper::new(Some(10_000_000.0_f64));
        assert!(!mapper.update(400_000.0));
        assert_eq!(mapper.ratio(), 1.0);
        assert_eq!(mapper.to_actual(1234.0), 1234.0);
        assert_eq!(mapper.max_actual(400.0), 399_600.0);
    }

    #[test]
    fn unbounded_platform_never_compresses() {
        let mut mapper = ScrollCoordinateMapper::<f64>::new(None);
        mapper.update(1.0e12);
        assert_eq!(mapper.ratio(), 1.0);
        let mut mapper = ScrollCoordinateMapper::new(Some(-5.0_f64));
        mapper.update(1.0e12);
        assert_eq!(mapper.ratio(), 1.0);
    }

    #[test]
    fn coordinate_reports_both_spaces() {
        let mut mapper = ScrollCoordinateMapper::new(Some(100.0_f64));
        mapper.update(400.0);
        let coord = mapper.coordinate(200.0);
        assert_eq!(coord.actual_position, 50.0);
        assert_eq!(coord.ratio, 4.0);

        assert!(mapper.set_platform_max(None));
        assert_eq!(mapper.ratio(), 1.0);
    }
}
