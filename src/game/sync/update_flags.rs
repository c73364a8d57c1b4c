//! Extended info mask flags
//!
//! Tracks which extended info categories an avatar carries this tick. The
//! bit values are the ones written to the wire, so the mask can be emitted
//! directly at the start of an extended block.

use bitflags::bitflags;

use crate::net::buffer::PacketBuffer;

bitflags! {
    /// Extended info categories present in a block
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UpdateFlags: u16 {
        /// No updates needed
        const NONE = 0;
        /// Face another entity
        const FACE_ENTITY = 0x1;
        /// Face a coordinate
        const FACE_COORD = 0x2;
        /// Overhead text (force chat)
        const SAY = 0x4;
        /// Animation sequence
        const SEQUENCE = 0x8;
        /// Appearance (body, equipment, name)
        const APPEARANCE = 0x10;
        /// Hit splat
        const HIT = 0x20;
        /// Second mask byte follows
        const EXTENDED = 0x40;
        /// Public chat
        const CHAT = 0x80;
        /// Graphics/spotanim effect
        const SPOT_ANIM = 0x100;
    }
}

impl Default for UpdateFlags {
    fn default() -> Self {
        Self::NONE
    }
}

impl UpdateFlags {
    /// Check if any updates are flagged
    pub fn has_update(&self) -> bool {
        !self.difference(Self::EXTENDED).is_empty()
    }

    /// Clear all flags
    pub fn clear(&mut self) {
        *self = Self::NONE;
    }

    /// Wire mask, with the extended marker set when a second byte is needed
    pub fn to_mask(&self) -> u16 {
        let mut mask = self.difference(Self::EXTENDED).bits();
        if mask >= 0x100 {
            mask |= Self::EXTENDED.bits();
        }
        mask
    }

    /// Write the mask as one or two bytes
    pub fn write(&self, buffer: &mut PacketBuffer) {
        let mask = self.to_mask();
        if mask >= 0x100 {
            buffer.write_ubyte((mask & 0xff) as u8);
            buffer.write_ubyte((mask >> 8) as u8);
        } else {
            buffer.write_ubyte(mask as u8);
        }
    }

    /// Read a mask written by `write`
    pub fn read(buffer: &mut PacketBuffer) -> Self {
        let mut mask = buffer.read_ubyte() as u16;
        if mask & Self::EXTENDED.bits() != 0 {
            mask |= (buffer.read_ubyte() as u16) << 8;
        }
        Self::from_bits_truncate(mask).difference(Self::EXTENDED)
    }
}
