//! World coordinates
//!
//! `CoordGrid` is the absolute tile position of an entity. It is a plain
//! value: movement replaces it, nothing mutates it in place. `ZoneKey` is the
//! bitpacked 8x8 zone a coordinate falls in and is what the zone index is
//! keyed by.

use std::fmt;

use crate::error::ProtocolError;

/// Number of height levels
pub const LEVEL_COUNT: u8 = 4;

/// Coordinates are 14-bit on the wire
pub const MAX_COORD: u32 = (1 << 14) - 1;

/// Tiles per zone side
pub const ZONE_SIZE: u32 = 8;

/// Absolute world coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CoordGrid {
    /// Height level (0-3)
    pub level: u8,
    /// X coordinate (west to east)
    pub x: u32,
    /// Z coordinate (south to north)
    pub z: u32,
}

impl CoordGrid {
    pub const fn new(level: u8, x: u32, z: u32) -> Self {
        Self { level, x, z }
    }

    /// Create a coordinate, rejecting anything the wire format cannot carry
    pub fn checked(level: u8, x: u32, z: u32) -> Result<Self, ProtocolError> {
        if level >= LEVEL_COUNT || x > MAX_COORD || z > MAX_COORD {
            return Err(ProtocolError::InvalidCoordinate { x, z, level });
        }
        Ok(Self::new(level, x, z))
    }

    /// Zone X coordinate
    #[inline]
    pub fn zone_x(&self) -> u32 {
        self.x >> 3
    }

    /// Zone Z coordinate
    #[inline]
    pub fn zone_z(&self) -> u32 {
        self.z >> 3
    }

    /// Key of the zone this coordinate falls in
    #[inline]
    pub fn zone_key(&self) -> ZoneKey {
        ZoneKey::new(self.level, self.zone_x(), self.zone_z())
    }

    /// Mapsquare (64x64 region) X coordinate
    #[inline]
    pub fn mapsquare_x(&self) -> u32 {
        self.x >> 6
    }

    /// Mapsquare (64x64 region) Z coordinate
    #[inline]
    pub fn mapsquare_z(&self) -> u32 {
        self.z >> 6
    }

    /// 18-bit coarse coordinate used by the low resolution band
    #[inline]
    pub fn coarse(&self) -> u32 {
        ((self.level as u32 & 0x3) << 16) | ((self.mapsquare_x() & 0xff) << 8) | (self.mapsquare_z() & 0xff)
    }

    /// Signed tile delta from `self` to `other`, ignoring level
    #[inline]
    pub fn delta_to(&self, other: &CoordGrid) -> (i32, i32) {
        (
            other.x as i32 - self.x as i32,
            other.z as i32 - self.z as i32,
        )
    }

    /// Coordinate moved by a tile delta, clamped to the world
    pub fn translate(&self, dx: i32, dz: i32) -> Self {
        let x = (self.x as i64 + dx as i64).clamp(0, MAX_COORD as i64) as u32;
        let z = (self.z as i64 + dz as i64).clamp(0, MAX_COORD as i64) as u32;
        Self::new(self.level, x, z)
    }

    /// Chebyshev distance check on the same level
    pub fn within_distance(&self, other: &CoordGrid, distance: u32) -> bool {
        if self.level != other.level {
            return false;
        }
        let (dx, dz) = self.delta_to(other);
        dx.unsigned_abs() <= distance && dz.unsigned_abs() <= distance
    }
}

impl fmt::Display for CoordGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.z, self.level)
    }
}

/// Bitpacked zone coordinate: `level << 22 | zone_x << 11 | zone_z`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneKey(u32);

impl ZoneKey {
    #[inline]
    pub fn new(level: u8, zone_x: u32, zone_z: u32) -> Self {
        assert!(
            level < LEVEL_COUNT && zone_x < 2048 && zone_z < 2048,
            "zone ({}, {}, level {}) out of range",
            zone_x,
            zone_z,
            level
        );
        Self(((level as u32 & 0x3) << 22) | ((zone_x & 0x7ff) << 11) | (zone_z & 0x7ff))
    }

    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn level(self) -> u8 {
        ((self.0 >> 22) & 0x3) as u8
    }

    #[inline]
    pub fn zone_x(self) -> u32 {
        (self.0 >> 11) & 0x7ff
    }

    #[inline]
    pub fn zone_z(self) -> u32 {
        self.0 & 0x7ff
    }

    /// South-west tile of the zone
    pub fn base(self) -> CoordGrid {
        CoordGrid::new(self.level(), self.zone_x() * ZONE_SIZE, self.zone_z() * ZONE_SIZE)
    }
}

impl fmt::Display for ZoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone({}, {}, {})", self.zone_x(), self.zone_z(), self.level())
    }
}
