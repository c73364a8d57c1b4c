//! Info packet writer
//!
//! Writes one observer's view of players or NPCs. Layout, bit mode first:
//! - high resolution: count (8 bits), one entry per entity the client
//!   already tracks, additions until the index terminator
//! - low resolution: count (index width), one entry per coarse entity,
//!   additions until the terminator
//!
//! then, in byte mode, the extended block of every entry whose ext bit was
//! set, in the order the bits were written.

use std::collections::HashMap;

use crate::error::{InfoError, Result};
use crate::game::build_area::BuildArea;
use crate::game::rebuild::ZoneProvider;
use crate::net::buffer::PacketBuffer;
use crate::protocol::{ClientVariant, OutgoingOpcode};

use super::avatar::{Avatar, AvatarMovement};
use super::cell_opcodes::single_cell_opcode;
use super::extended_info::{BlockContext, EncoderRegistry};
use super::observer::ViewState;
use super::update_flags::UpdateFlags;

/// Slab of avatars indexed by entity index
pub type AvatarSlab = [Option<Box<Avatar>>];

/// Which entity kind a view tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Players,
    Npcs,
}

impl ViewKind {
    /// Width of an entity index on the wire
    pub fn index_bits(self) -> usize {
        match self {
            ViewKind::Players => 11,
            ViewKind::Npcs => 16,
        }
    }

    /// Index value ending an addition list
    pub fn terminator(self) -> u32 {
        (1 << self.index_bits()) - 1
    }

    pub fn opcode(self) -> OutgoingOpcode {
        match self {
            ViewKind::Players => OutgoingOpcode::PlayerInfo,
            ViewKind::Npcs => OutgoingOpcode::NpcInfo,
        }
    }
}

/// Shared, read-only state of the packet assembly phase
#[derive(Clone, Copy)]
pub struct AssemblyContext<'a> {
    pub players: &'a AvatarSlab,
    pub npcs: &'a AvatarSlab,
    pub registry: &'a EncoderRegistry,
    pub zone_provider: &'a dyn ZoneProvider,
    pub max_packet_size: usize,
}

/// One observer's point of view
#[derive(Debug, Clone, Copy)]
pub struct InfoContext<'a> {
    pub observer: u16,
    pub variant: ClientVariant,
    pub build_area: BuildArea,
    pub registry: &'a EncoderRegistry,
}

/// Live (allocated and not destroyed) avatar at `index`
#[inline]
pub fn live_avatar(avatars: &AvatarSlab, index: u16) -> Option<&Avatar> {
    avatars
        .get(index as usize)
        .and_then(|slot| slot.as_deref())
        .filter(|avatar| !avatar.is_destroyed())
}

fn tracked_avatar(avatars: &AvatarSlab, index: u16) -> Result<&Avatar> {
    avatars
        .get(index as usize)
        .and_then(|slot| slot.as_deref())
        .ok_or_else(|| InfoError::Internal(format!("view references unallocated index {}", index)))
}

/// Write the info payload of one view into `out`
pub fn write_info(
    kind: ViewKind,
    view: &ViewState,
    avatars: &AvatarSlab,
    ctx: &InfoContext<'_>,
    appearance_cache: &mut HashMap<u16, u32>,
    out: &mut PacketBuffer,
    blocks: &mut PacketBuffer,
) -> Result<()> {
    out.clear();
    blocks.clear();

    out.start_bit_access();
    write_high_resolution(kind, view, avatars, ctx, appearance_cache, out, blocks)?;
    write_low_resolution(kind, view, avatars, out)?;
    out.end_bit_access();

    out.write_bytes(blocks.as_bytes());
    Ok(())
}

fn block_context(kind: ViewKind, ctx: &InfoContext<'_>, index: u16, force_appearance: bool) -> BlockContext {
    let subject = (kind == ViewKind::Players).then_some(index);
    BlockContext {
        variant: ctx.variant,
        force_appearance,
        self_view: subject == Some(ctx.observer),
        observer: Some(ctx.observer),
        subject,
    }
}

fn write_block(
    kind: ViewKind,
    avatar: &Avatar,
    flags: UpdateFlags,
    block: &BlockContext,
    ctx: &InfoContext<'_>,
    appearance_cache: &mut HashMap<u16, u32>,
    blocks: &mut PacketBuffer,
) -> Result<()> {
    avatar
        .extended_info
        .write_block(flags, block, ctx.registry, blocks)?;
    if kind == ViewKind::Players && flags.contains(UpdateFlags::APPEARANCE) {
        appearance_cache.insert(avatar.index(), avatar.appearance_version());
    }
    Ok(())
}

fn write_high_resolution(
    kind: ViewKind,
    view: &ViewState,
    avatars: &AvatarSlab,
    ctx: &InfoContext<'_>,
    appearance_cache: &mut HashMap<u16, u32>,
    out: &mut PacketBuffer,
    blocks: &mut PacketBuffer,
) -> Result<()> {
    let index_bits = kind.index_bits();

    out.write_bits(8, view.high().len() as u32);
    for (slot, &index) in view.high().iter().enumerate() {
        if view.is_high_removed(slot) {
            out.write_bit(true);
            out.write_bits(2, 3);
            out.write_bit(false);
            continue;
        }

        let avatar = tracked_avatar(avatars, index)?;
        let block = block_context(kind, ctx, index, false);
        let flags = avatar.extended_info.block_flags(&block);
        let ext = flags.has_update();

        match avatar.movement() {
            AvatarMovement::None if !ext => out.write_bit(false),
            AvatarMovement::None => {
                out.write_bit(true);
                out.write_bits(2, 0);
            }
            AvatarMovement::Walk(opcode) => {
                out.write_bit(true);
                out.write_bits(2, 1);
                out.write_bits(3, opcode as u32);
                out.write_bit(ext);
            }
            AvatarMovement::Run(opcode) => {
                out.write_bit(true);
                out.write_bits(2, 2);
                out.write_bits(4, opcode as u32);
                out.write_bit(ext);
            }
            AvatarMovement::Teleport => {
                let coord = avatar.coord();
                out.write_bit(true);
                out.write_bits(2, 3);
                out.write_bit(true);
                out.write_bit(ext);
                out.write_bits(2, coord.level as u32);
                out.write_bits(14, coord.x);
                out.write_bits(14, coord.z);
            }
        }

        if ext {
            write_block(kind, avatar, flags, &block, ctx, appearance_cache, blocks)?;
        }
    }

    let border = ctx.variant.build_area_border();
    for &index in view.high_added() {
        let avatar = tracked_avatar(avatars, index)?;
        let stale_appearance = kind == ViewKind::Players
            && appearance_cache.get(&index) != Some(&avatar.appearance_version());
        let block = block_context(kind, ctx, index, stale_appearance);
        let flags = avatar.extended_info.block_flags(&block);
        let ext = flags.has_update();
        let coord = avatar.coord();

        out.write_bits(index_bits, index as u32);
        out.write_bit(ext);
        if kind == ViewKind::Npcs {
            out.write_bits(14, (avatar.type_id() & 0x3fff) as u32);
        }
        out.write_bits(2, coord.level as u32);
        if ctx.build_area.contains(coord, border) {
            let local = ctx.build_area.localize(coord);
            out.write_bit(true);
            out.write_bits(7, local.x);
            out.write_bits(7, local.z);
        } else {
            out.write_bit(false);
            out.write_bits(14, coord.x);
            out.write_bits(14, coord.z);
        }

        if ext {
            write_block(kind, avatar, flags, &block, ctx, appearance_cache, blocks)?;
        }
    }
    out.write_bits(index_bits, kind.terminator());
    Ok(())
}

fn write_low_resolution(
    kind: ViewKind,
    view: &ViewState,
    avatars: &AvatarSlab,
    out: &mut PacketBuffer,
) -> Result<()> {
    let index_bits = kind.index_bits();

    out.write_bits(index_bits, view.low().len() as u32);
    for (slot, &index) in view.low().iter().enumerate() {
        if view.is_low_removed(slot) {
            out.write_bit(true);
            out.write_bits(2, 0);
            continue;
        }

        let avatar = tracked_avatar(avatars, index)?;
        let from = avatar.last_coord();
        let to = avatar.coord();
        if from.coarse() == to.coarse() {
            out.write_bit(false);
            continue;
        }

        let dx = to.mapsquare_x() as i32 - from.mapsquare_x() as i32;
        let dz = to.mapsquare_z() as i32 - from.mapsquare_z() as i32;
        out.write_bit(true);
        if dx == 0 && dz == 0 {
            out.write_bits(2, 1);
            out.write_bits(2, to.level as u32);
        } else if let Some(direction) = single_cell_opcode(dx, dz) {
            out.write_bits(2, 2);
            out.write_bits(2, to.level as u32);
            out.write_bits(3, direction as u32);
        } else {
            out.write_bits(2, 3);
            out.write_bits(18, to.coarse());
        }
    }

    for &index in view.low_added() {
        let avatar = tracked_avatar(avatars, index)?;
        out.write_bits(index_bits, index as u32);
        out.write_bits(18, avatar.coord().coarse());
    }
    out.write_bits(index_bits, kind.terminator());
    Ok(())
}
