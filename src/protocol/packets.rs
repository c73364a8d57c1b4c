//! Packet definitions module
//!
//! Defines the outgoing opcodes produced by the info engine and the
//! framing applied to every published buffer. Every info packet is
//! variable-short: `opcode (u8), length (u16 BE), payload`.

use crate::error::ProtocolError;
use crate::net::buffer::PacketBuffer;

/// Outgoing opcodes written by the info engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutgoingOpcode {
    /// Player info (high/low resolution players + extended info)
    PlayerInfo = 81,
    /// NPC info (high/low resolution NPCs + extended info)
    NpcInfo = 65,
    /// Build area rebuild with zone templates and keys
    RebuildRegion = 162,
}

impl OutgoingOpcode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Frame a payload into a reusable buffer, replacing its contents.
///
/// `max_size` caps the payload below what the u16 length could express.
pub fn frame_into(
    opcode: OutgoingOpcode,
    payload: &[u8],
    max_size: usize,
    out: &mut PacketBuffer,
) -> std::result::Result<(), ProtocolError> {
    let max = max_size.min(u16::MAX as usize);
    if payload.len() > max {
        return Err(ProtocolError::PacketTooLarge {
            size: payload.len(),
            max,
        });
    }

    out.clear();
    out.write_ubyte(opcode.as_u8());
    out.write_ushort(payload.len() as u16);
    out.write_bytes(payload);
    Ok(())
}
