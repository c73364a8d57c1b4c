//! Build area rebuild
//!
//! When an observer's build area is recentred the client needs the zone
//! templates for every zone of the new area on all four levels, plus the
//! map keys of every mapsquare those templates point into. Zone data comes
//! from an external `ZoneProvider`; zones the observer already received in
//! its previous rebuild are reused without asking the provider again.

use std::collections::HashMap;

use tracing::trace;

use super::build_area::{BuildArea, MAX_ZONE};
use super::coord::{ZoneKey, LEVEL_COUNT};
use crate::net::buffer::PacketBuffer;

/// Where a zone's terrain is copied from, and how it is rotated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoneTemplate {
    pub level: u8,
    pub zone_x: u32,
    pub zone_z: u32,
    pub rotation: u8,
}

impl ZoneTemplate {
    pub fn new(level: u8, zone_x: u32, zone_z: u32, rotation: u8) -> Self {
        Self {
            level,
            zone_x,
            zone_z,
            rotation,
        }
    }

    /// 26-bit wire form: `level << 24 | zone_x << 14 | zone_z << 3 | rotation << 1`
    pub fn packed(&self) -> u32 {
        ((self.level as u32 & 0x3) << 24)
            | ((self.zone_x & 0x3ff) << 14)
            | ((self.zone_z & 0x7ff) << 3)
            | ((self.rotation as u32 & 0x3) << 1)
    }

    /// Mapsquare id the template's data lives in
    pub fn mapsquare(&self) -> u32 {
        ((self.zone_x >> 3) << 8) | (self.zone_z >> 3)
    }
}

/// External source of zone templates and map keys
pub trait ZoneProvider: Send + Sync {
    /// Template for a zone, `None` for zones without data
    fn zone(&self, level: u8, zone_x: u32, zone_z: u32) -> Option<ZoneTemplate>;

    /// Map keys for a mapsquare
    fn keys(&self, mapsquare: u32) -> [i32; 4];
}

/// Provider mapping every zone onto itself with zeroed keys
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticZoneProvider;

impl ZoneProvider for StaticZoneProvider {
    fn zone(&self, level: u8, zone_x: u32, zone_z: u32) -> Option<ZoneTemplate> {
        Some(ZoneTemplate::new(level, zone_x, zone_z, 0))
    }

    fn keys(&self, _mapsquare: u32) -> [i32; 4] {
        [0; 4]
    }
}

/// Per-observer rebuild state
#[derive(Debug, Clone, Default)]
pub struct RegionRebuilder {
    known: HashMap<ZoneKey, Option<ZoneTemplate>>,
}

impl RegionRebuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of zones remembered from the last rebuild
    pub fn known_zones(&self) -> usize {
        self.known.len()
    }

    /// Forget everything, the next rebuild asks the provider for every zone
    pub fn reset(&mut self) {
        self.known.clear();
    }

    /// Write the rebuild payload for `area` into `out`
    pub fn write(&mut self, area: BuildArea, provider: &dyn ZoneProvider, out: &mut PacketBuffer) {
        let width = area.width_zones();
        let height = area.height_zones();

        out.write_ushort((area.zone_x() + width / 2) as u16);
        out.write_ushort((area.zone_z() + height / 2) as u16);

        let mut current = HashMap::with_capacity((LEVEL_COUNT as u32 * width * height) as usize);
        let mut mapsquares: Vec<u32> = Vec::new();
        let mut reused = 0usize;

        out.start_bit_access();
        for level in 0..LEVEL_COUNT {
            for dx in 0..width {
                for dz in 0..height {
                    let zone_x = area.zone_x() + dx;
                    let zone_z = area.zone_z() + dz;
                    // Past the world edge
                    if zone_x >= MAX_ZONE || zone_z >= MAX_ZONE {
                        out.write_bit(false);
                        continue;
                    }
                    let key = ZoneKey::new(level, zone_x, zone_z);
                    let template = match self.known.get(&key) {
                        Some(known) => {
                            reused += 1;
                            *known
                        }
                        None => provider.zone(level, zone_x, zone_z),
                    };
                    match template {
                        Some(template) => {
                            out.write_bit(true);
                            out.write_bits(26, template.packed());
                            let mapsquare = template.mapsquare();
                            if !mapsquares.contains(&mapsquare) {
                                mapsquares.push(mapsquare);
                            }
                        }
                        None => out.write_bit(false),
                    }
                    current.insert(key, template);
                }
            }
        }
        out.end_bit_access();

        out.write_ushort(mapsquares.len() as u16);
        for &mapsquare in &mapsquares {
            for key in provider.keys(mapsquare) {
                out.write_int(key);
            }
        }

        trace!(
            zone_x = area.zone_x(),
            zone_z = area.zone_z(),
            reused,
            mapsquares = mapsquares.len(),
            "Rebuilt build area"
        );
        self.known = current;
    }
}
