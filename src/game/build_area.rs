//! Build area localization
//!
//! A build area is the rectangle of zones an observer's client currently
//! renders, anchored at its south-western zone. Entities inside it can be
//! described with short area-relative coordinates.
//!
//! Clients do not draw the outer rim of the area, so `contains` excludes a
//! border: one tile for the legacy client, two for the native clients.

use std::fmt;

use super::coord::{CoordGrid, ZONE_SIZE};

/// Default build area side in zones (104 tiles)
pub const DEFAULT_BUILD_AREA_ZONES: u32 = 13;

/// Highest zone coordinate (exclusive)
pub const MAX_ZONE: u32 = 2048;

/// Build area packed into one 64-bit value:
/// zone_x bits 0-15, zone_z 16-31, width 32-47, height 48-63.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BuildArea(u64);

impl BuildArea {
    /// Area with no extent, contains nothing
    pub const EMPTY: BuildArea = BuildArea(0);

    /// Create a build area.
    ///
    /// # Panics
    /// When the corner zone lies outside the world.
    pub fn new(zone_x: u32, zone_z: u32, width_zones: u32, height_zones: u32) -> Self {
        assert!(
            zone_x < MAX_ZONE && zone_z < MAX_ZONE,
            "build area zone ({}, {}) out of range",
            zone_x,
            zone_z
        );
        let width = width_zones.min(u16::MAX as u32) as u64;
        let height = height_zones.min(u16::MAX as u32) as u64;
        Self((zone_x as u64) | ((zone_z as u64) << 16) | (width << 32) | (height << 48))
    }

    /// Square area of `zones` zones centred on the zone of `coord`
    pub fn centered_on(coord: CoordGrid, zones: u32) -> Self {
        let half = zones / 2;
        let zone_x = coord.zone_x().saturating_sub(half).min(MAX_ZONE - 1);
        let zone_z = coord.zone_z().saturating_sub(half).min(MAX_ZONE - 1);
        Self::new(zone_x, zone_z, zones, zones)
    }

    #[inline]
    pub fn packed(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn zone_x(self) -> u32 {
        (self.0 & 0xffff) as u32
    }

    #[inline]
    pub fn zone_z(self) -> u32 {
        ((self.0 >> 16) & 0xffff) as u32
    }

    #[inline]
    pub fn width_zones(self) -> u32 {
        ((self.0 >> 32) & 0xffff) as u32
    }

    #[inline]
    pub fn height_zones(self) -> u32 {
        ((self.0 >> 48) & 0xffff) as u32
    }

    #[inline]
    pub fn width_tiles(self) -> u32 {
        self.width_zones() * ZONE_SIZE
    }

    #[inline]
    pub fn height_tiles(self) -> u32 {
        self.height_zones() * ZONE_SIZE
    }

    /// South-western tile of the area
    #[inline]
    pub fn base_x(self) -> u32 {
        self.zone_x() * ZONE_SIZE
    }

    #[inline]
    pub fn base_z(self) -> u32 {
        self.zone_z() * ZONE_SIZE
    }

    pub fn is_empty(self) -> bool {
        self.width_zones() == 0 || self.height_zones() == 0
    }

    /// Offset of `coord` from the area's corner, if it lies in the area at all
    fn offset(self, coord: CoordGrid) -> Option<(u32, u32)> {
        let x = coord.x.checked_sub(self.base_x())?;
        let z = coord.z.checked_sub(self.base_z())?;
        if x < self.width_tiles() && z < self.height_tiles() {
            Some((x, z))
        } else {
            None
        }
    }

    /// Whether `coord` is inside the rendered part of the area, excluding a
    /// rim of `border` tiles on every side
    pub fn contains(self, coord: CoordGrid, border: u32) -> bool {
        match self.offset(coord) {
            Some((x, z)) => {
                x >= border
                    && z >= border
                    && x + border < self.width_tiles()
                    && z + border < self.height_tiles()
            }
            None => false,
        }
    }

    /// Convert an absolute coordinate to area-relative tiles.
    ///
    /// # Panics
    /// When `coord` lies outside the area; check `contains` first.
    pub fn localize(self, coord: CoordGrid) -> CoordInBuildArea {
        let (x, z) = self
            .offset(coord)
            .unwrap_or_else(|| panic!("{} is outside build area {:?}", coord, self));
        CoordInBuildArea {
            level: coord.level,
            x,
            z,
        }
    }

    /// Whether `coord` came within `threshold` tiles of an edge (or left the
    /// area) and the area should be recentred
    pub fn needs_rebuild(self, coord: CoordGrid, threshold: u32) -> bool {
        if self.is_empty() {
            return true;
        }
        match self.offset(coord) {
            Some((x, z)) => {
                x < threshold
                    || z < threshold
                    || x + threshold >= self.width_tiles()
                    || z + threshold >= self.height_tiles()
            }
            None => true,
        }
    }
}

impl fmt::Debug for BuildArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildArea")
            .field("zone_x", &self.zone_x())
            .field("zone_z", &self.zone_z())
            .field("width", &self.width_zones())
            .field("height", &self.height_zones())
            .finish()
    }
}

/// Coordinate relative to a build area's south-western corner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordInBuildArea {
    pub level: u8,
    pub x: u32,
    pub z: u32,
}
