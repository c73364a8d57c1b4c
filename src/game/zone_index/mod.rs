//! Spatial zone index
//!
//! Maps every occupied 8x8 zone to the entity indices standing in it.
//! Mutated only by the single-threaded tick phases; the parallel packet
//! assembly phase reads it through `&ZoneIndexStorage`.
//!
//! Double adds and removing an index that was never added are programming
//! errors and panic.

pub mod array;
pub mod dictionary;

pub use array::{ZoneIndexArray, EMPTY_SLOT};
pub use dictionary::IntDictionary;

use crate::game::coord::{CoordGrid, ZoneKey};

/// Zone index for one entity kind (players or NPCs)
#[derive(Debug, Clone)]
pub struct ZoneIndexStorage {
    zones: IntDictionary<ZoneIndexArray>,
    mutations: u64,
}

impl ZoneIndexStorage {
    /// Create a storage sized for `expected_zones` occupied zones.
    ///
    /// Sized with the entity capacity, the table can never fill up since
    /// each entity sits in exactly one zone.
    pub fn new(expected_zones: usize) -> Self {
        Self {
            zones: IntDictionary::with_expected(expected_zones),
            mutations: 0,
        }
    }

    /// Number of structural mutations performed so far
    pub fn mutations(&self) -> u64 {
        self.mutations
    }

    /// Number of occupied zones
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    pub fn add(&mut self, index: u16, coord: CoordGrid) {
        self.add_to_zone(index, coord.zone_key());
    }

    pub fn remove(&mut self, index: u16, coord: CoordGrid) {
        self.remove_from_zone(index, coord.zone_key());
    }

    /// Move an index between the zones of two coordinates.
    ///
    /// Sub-zone movement leaves the index untouched.
    pub fn move_entity(&mut self, index: u16, from: CoordGrid, to: CoordGrid) {
        let from_key = from.zone_key();
        let to_key = to.zone_key();
        if from_key == to_key {
            return;
        }
        self.remove_from_zone(index, from_key);
        self.add_to_zone(index, to_key);
    }

    pub fn add_to_zone(&mut self, index: u16, key: ZoneKey) {
        self.zones
            .get_or_insert_with(key.raw(), ZoneIndexArray::new)
            .add(index);
        self.mutations += 1;
    }

    pub fn remove_from_zone(&mut self, index: u16, key: ZoneKey) {
        let array = self
            .zones
            .get_mut(key.raw())
            .unwrap_or_else(|| panic!("index {} removed from unindexed {}", index, key));
        array.remove(index);
        if array.is_empty() {
            self.zones.remove(key.raw());
        }
        self.mutations += 1;
    }

    /// Members of a zone, empty when nothing is indexed there
    pub fn get(&self, level: u8, zone_x: u32, zone_z: u32) -> &[u16] {
        self.zone(ZoneKey::new(level, zone_x, zone_z))
            .map(ZoneIndexArray::members)
            .unwrap_or(&[])
    }

    /// Backing array of a zone, `None` once its last member left
    pub fn zone(&self, key: ZoneKey) -> Option<&ZoneIndexArray> {
        self.zones.get(key.raw())
    }
}
