//! Per-zone member array
//!
//! Holds the entity indices inside one zone. Slots past `len` hold the
//! `EMPTY_SLOT` sentinel; readers must stop at `len`, not at the backing
//! length.

/// Sentinel stored in unused slots
pub const EMPTY_SLOT: u16 = u16::MAX;

const INITIAL_CAPACITY: usize = 8;

#[derive(Debug, Clone)]
pub struct ZoneIndexArray {
    slots: Vec<u16>,
    len: usize,
}

impl ZoneIndexArray {
    pub fn new() -> Self {
        Self {
            slots: vec![EMPTY_SLOT; INITIAL_CAPACITY],
            len: 0,
        }
    }

    /// Number of members
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Members of the zone
    #[inline]
    pub fn members(&self) -> &[u16] {
        &self.slots[..self.len]
    }

    /// Whole backing array, trailing slots are `EMPTY_SLOT`
    #[inline]
    pub fn raw(&self) -> &[u16] {
        &self.slots
    }

    pub fn contains(&self, index: u16) -> bool {
        self.members().contains(&index)
    }

    /// Append a member.
    ///
    /// # Panics
    /// When `index` is already a member or is the sentinel.
    pub fn add(&mut self, index: u16) {
        assert_ne!(index, EMPTY_SLOT, "sentinel index cannot be stored");
        assert!(
            !self.contains(index),
            "index {} already present in zone",
            index
        );
        if self.len == self.slots.len() {
            let grown = self.slots.len() * 2;
            self.slots.resize(grown, EMPTY_SLOT);
        }
        self.slots[self.len] = index;
        self.len += 1;
    }

    /// Remove a member by swapping the last member into its slot.
    ///
    /// # Panics
    /// When `index` is not a member.
    pub fn remove(&mut self, index: u16) {
        let position = self
            .members()
            .iter()
            .position(|&member| member == index)
            .unwrap_or_else(|| panic!("index {} not present in zone", index));
        let last = self.len - 1;
        self.slots.swap(position, last);
        self.slots[last] = EMPTY_SLOT;
        self.len = last;
    }
}

impl Default for ZoneIndexArray {
    fn default() -> Self {
        Self::new()
    }
}
