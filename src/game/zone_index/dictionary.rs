//! Open-addressing integer dictionary
//!
//! Fixed capacity, linear probing, `u32` keys. Capacity is the next power
//! of two at or above four times the expected key count so the table stays
//! sparse and probe chains short. Key `0` marks an empty slot in the key
//! array, so a real zero key lives in a dedicated side slot.

/// Fibonacci-style mix so neighbouring zone keys spread across the table
#[inline]
fn mix(key: u32) -> u32 {
    let h = key.wrapping_mul(0x9E37_79B9);
    h ^ (h >> 16)
}

/// Integer-keyed hash table with linear probing
#[derive(Debug, Clone)]
pub struct IntDictionary<V> {
    keys: Vec<u32>,
    values: Vec<Option<V>>,
    zero_value: Option<V>,
    mask: usize,
    len: usize,
}

impl<V> IntDictionary<V> {
    /// Create a dictionary sized for `expected` keys
    pub fn with_expected(expected: usize) -> Self {
        let capacity = (expected.max(2) * 4).next_power_of_two();
        let mut values = Vec::with_capacity(capacity);
        values.resize_with(capacity, || None);
        Self {
            keys: vec![0; capacity],
            values,
            zero_value: None,
            mask: capacity - 1,
            len: 0,
        }
    }

    /// Number of slots in the probing table
    pub fn capacity(&self) -> usize {
        self.keys.len()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn ideal_slot(&self, key: u32) -> usize {
        mix(key) as usize & self.mask
    }

    /// Slot holding `key`, or the empty slot where it would be inserted
    fn probe(&self, key: u32) -> (usize, bool) {
        let mut slot = self.ideal_slot(key);
        loop {
            let current = self.keys[slot];
            if current == key {
                return (slot, true);
            }
            if current == 0 {
                return (slot, false);
            }
            slot = (slot + 1) & self.mask;
        }
    }

    pub fn contains_key(&self, key: u32) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: u32) -> Option<&V> {
        if key == 0 {
            return self.zero_value.as_ref();
        }
        match self.probe(key) {
            (slot, true) => self.values[slot].as_ref(),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: u32) -> Option<&mut V> {
        if key == 0 {
            return self.zero_value.as_mut();
        }
        match self.probe(key) {
            (slot, true) => self.values[slot].as_mut(),
            _ => None,
        }
    }

    /// Insert a value, returning the previous one.
    ///
    /// # Panics
    /// When the table has no free slot left.
    pub fn insert(&mut self, key: u32, value: V) -> Option<V> {
        if key == 0 {
            let previous = self.zero_value.replace(value);
            if previous.is_none() {
                self.len += 1;
            }
            return previous;
        }
        let (slot, found) = self.probe(key);
        if found {
            return self.values[slot].replace(value);
        }
        self.claim(slot, key);
        self.values[slot] = Some(value);
        None
    }

    /// Value for `key`, inserting `make()` first when absent
    pub fn get_or_insert_with(&mut self, key: u32, make: impl FnOnce() -> V) -> &mut V {
        if key == 0 {
            if self.zero_value.is_none() {
                self.len += 1;
            }
            return self.zero_value.get_or_insert_with(make);
        }
        let (slot, found) = self.probe(key);
        if !found {
            self.claim(slot, key);
        }
        self.values[slot].get_or_insert_with(make)
    }

    fn claim(&mut self, slot: usize, key: u32) {
        // One slot always stays empty so probes terminate.
        assert!(
            self.len + 1 < self.capacity(),
            "IntDictionary overflow: capacity {} exhausted",
            self.capacity()
        );
        self.keys[slot] = key;
        self.len += 1;
    }

    /// Remove `key`, shifting later entries of its probe chain back
    pub fn remove(&mut self, key: u32) -> Option<V> {
        if key == 0 {
            let previous = self.zero_value.take();
            if previous.is_some() {
                self.len -= 1;
            }
            return previous;
        }
        let (mut hole, found) = self.probe(key);
        if !found {
            return None;
        }
        let removed = self.values[hole].take();
        self.keys[hole] = 0;
        self.len -= 1;

        let mut next = hole;
        loop {
            next = (next + 1) & self.mask;
            let moved_key = self.keys[next];
            if moved_key == 0 {
                break;
            }
            let ideal = self.ideal_slot(moved_key);
            let stays = if hole <= next {
                hole < ideal && ideal <= next
            } else {
                ideal > hole || ideal <= next
            };
            if stays {
                continue;
            }
            self.keys[hole] = moved_key;
            self.values[hole] = self.values[next].take();
            self.keys[next] = 0;
            hole = next;
        }
        removed
    }

    /// Iterate over all entries in table order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &V)> {
        self.zero_value.iter().map(|v| (0, v)).chain(
            self.keys
                .iter()
                .zip(self.values.iter())
                .filter(|(key, _)| **key != 0)
                .filter_map(|(key, value)| value.as_ref().map(|v| (*key, v))),
        )
    }
}
