//! Observers
//!
//! An observer is a connected client: it owns its build area, the two views
//! (players and NPCs) the client currently knows about, and the private
//! working buffers its packets are assembled in. Only the worker that
//! assembles an observer's packets touches those buffers.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::error::{InfoError, Result};
use crate::game::build_area::BuildArea;
use crate::game::coord::CoordGrid;
use crate::game::rebuild::RegionRebuilder;
use crate::game::zone_index::ZoneIndexStorage;
use crate::net::buffer::PacketBuffer;
use crate::net::shared::SharedBuffer;
use crate::protocol::packets::frame_into;
use crate::protocol::{ClientVariant, OutgoingOpcode};

use super::packet::{live_avatar, write_info, AssemblyContext, AvatarSlab, InfoContext, ViewKind};
use super::pool::PooledObject;
use super::visibility::{for_each_candidate, VisibilityPredicate};

/// Distances and limits applied when resolving a view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSettings {
    pub view_distance: u32,
    /// 0 disables the low resolution band
    pub low_resolution_distance: u32,
    pub max_high_resolution: usize,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            view_distance: 15,
            low_resolution_distance: 64,
            max_high_resolution: 255,
        }
    }
}

/// What one client knows about one entity kind
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    /// High resolution entries as of the previous tick, in wire order
    high: Vec<u16>,
    /// Parallel to `high`: entries leaving the band this tick
    high_removed: Vec<bool>,
    high_added: Vec<u16>,
    low: Vec<u16>,
    low_removed: Vec<bool>,
    low_added: Vec<u16>,
    high_members: HashSet<u16>,
    low_members: HashSet<u16>,
}

impl ViewState {
    pub fn high(&self) -> &[u16] {
        &self.high
    }

    pub fn high_added(&self) -> &[u16] {
        &self.high_added
    }

    pub fn is_high_removed(&self, slot: usize) -> bool {
        self.high_removed.get(slot).copied().unwrap_or(false)
    }

    pub fn low(&self) -> &[u16] {
        &self.low
    }

    pub fn low_added(&self) -> &[u16] {
        &self.low_added
    }

    pub fn is_low_removed(&self, slot: usize) -> bool {
        self.low_removed.get(slot).copied().unwrap_or(false)
    }

    /// Whether the client tracks `index` in high resolution
    pub fn in_high(&self, index: u16) -> bool {
        self.high_members.contains(&index)
    }

    pub fn in_low(&self, index: u16) -> bool {
        self.low_members.contains(&index)
    }

    /// Compute this tick's removals and additions.
    ///
    /// `self_index` is the observer's own avatar in this view, which stays
    /// first in the high resolution band for as long as it is alive.
    pub fn resolve(
        &mut self,
        self_index: Option<u16>,
        coord: CoordGrid,
        avatars: &AvatarSlab,
        index: &ZoneIndexStorage,
        predicate: &dyn VisibilityPredicate,
        settings: &ViewSettings,
    ) {
        let visible = |candidate: u16, distance: u32| -> bool {
            match live_avatar(avatars, candidate) {
                Some(avatar) => {
                    Some(candidate) == self_index
                        || predicate.is_visible(coord, avatar.coord(), distance, coord.level)
                }
                None => false,
            }
        };

        // High resolution
        self.high_removed.clear();
        self.high_added.clear();
        let mut kept = 0usize;
        for &member in &self.high {
            let keep = visible(member, settings.view_distance);
            self.high_removed.push(!keep);
            if keep {
                kept += 1;
            }
        }

        let mut room = settings.max_high_resolution.saturating_sub(kept);
        if let Some(own) = self_index {
            if room > 0 && !self.high_members.contains(&own) && live_avatar(avatars, own).is_some() {
                self.high_added.push(own);
                room -= 1;
            }
        }

        let mut candidates = Vec::new();
        for_each_candidate(index, coord, settings.view_distance, |candidate| {
            if Some(candidate) != self_index
                && !self.high_members.contains(&candidate)
                && visible(candidate, settings.view_distance)
            {
                candidates.push(candidate);
            }
        });
        candidates.sort_unstable();
        candidates.dedup();
        candidates.truncate(room);
        self.high_added.extend_from_slice(&candidates);

        // Low resolution, everything in range that is not high resolution
        // after this tick
        self.low_removed.clear();
        self.low_added.clear();
        let next_high = |candidate: u16| -> bool {
            match self.high.iter().position(|&m| m == candidate) {
                Some(slot) => !self.high_removed[slot],
                None => self.high_added.contains(&candidate),
            }
        };

        let distance = settings.low_resolution_distance;
        for &member in &self.low {
            let keep = distance > 0 && !next_high(member) && visible(member, distance);
            self.low_removed.push(!keep);
        }
        if distance == 0 {
            return;
        }

        let mut candidates = Vec::new();
        for_each_candidate(index, coord, distance, |candidate| {
            if Some(candidate) != self_index
                && !self.low_members.contains(&candidate)
                && !next_high(candidate)
                && visible(candidate, distance)
            {
                candidates.push(candidate);
            }
        });
        candidates.sort_unstable();
        candidates.dedup();
        self.low_added.extend_from_slice(&candidates);
    }

    /// Apply the resolved changes once the client has been sent them
    pub fn commit(&mut self) {
        let mut slot = 0;
        let removed = &self.high_removed;
        let members = &mut self.high_members;
        self.high.retain(|member| {
            let keep = !removed.get(slot).copied().unwrap_or(false);
            if !keep {
                members.remove(member);
            }
            slot += 1;
            keep
        });
        members.extend(self.high_added.iter().copied());
        self.high.append(&mut self.high_added);
        self.high_removed.clear();

        let mut slot = 0;
        let removed = &self.low_removed;
        let members = &mut self.low_members;
        self.low.retain(|member| {
            let keep = !removed.get(slot).copied().unwrap_or(false);
            if !keep {
                members.remove(member);
            }
            slot += 1;
            keep
        });
        members.extend(self.low_added.iter().copied());
        self.low.append(&mut self.low_added);
        self.low_removed.clear();
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.high.clear();
        self.high_removed.clear();
        self.high_added.clear();
        self.low.clear();
        self.low_removed.clear();
        self.low_added.clear();
        self.high_members.clear();
        self.low_members.clear();
    }
}

/// Packets produced for one observer in one tick, in send order
#[derive(Debug, Clone, Default)]
pub struct ObserverPackets {
    pub rebuild: Option<SharedBuffer>,
    pub player_info: Option<SharedBuffer>,
    pub npc_info: Option<SharedBuffer>,
}

impl ObserverPackets {
    pub fn iter(&self) -> impl Iterator<Item = &SharedBuffer> {
        self.rebuild
            .iter()
            .chain(self.player_info.iter())
            .chain(self.npc_info.iter())
    }

    /// Total framed length
    pub fn total_len(&self) -> usize {
        self.iter().map(SharedBuffer::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rebuild.is_none() && self.player_info.is_none() && self.npc_info.is_none()
    }

    /// Drop the engine's references
    pub fn release(&mut self) {
        for buffer in [&mut self.rebuild, &mut self.player_info, &mut self.npc_info] {
            if let Some(mut shared) = buffer.take() {
                shared.release();
            }
        }
    }
}

/// Allocation parameters of an observer
#[derive(Debug, Clone, Copy)]
pub struct ObserverArgs {
    pub index: u16,
    pub variant: ClientVariant,
}

#[derive(Debug)]
pub struct Observer {
    index: u16,
    variant: ClientVariant,
    build_area: BuildArea,
    rebuild_pending: bool,
    rebuilder: RegionRebuilder,
    pub(crate) players: ViewState,
    pub(crate) npcs: ViewState,
    /// Last appearance version sent per player index
    appearance_cache: HashMap<u16, u32>,
    payload: PacketBuffer,
    blocks: PacketBuffer,
    frame: PacketBuffer,
    packets: ObserverPackets,
    failure: Option<InfoError>,
    destroyed: bool,
}

impl Observer {
    /// Index of the observer's own player avatar
    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn variant(&self) -> ClientVariant {
        self.variant
    }

    pub fn build_area(&self) -> BuildArea {
        self.build_area
    }

    pub fn players(&self) -> &ViewState {
        &self.players
    }

    pub fn npcs(&self) -> &ViewState {
        &self.npcs
    }

    pub fn is_rebuild_pending(&self) -> bool {
        self.rebuild_pending
    }

    /// Recentre the build area when `coord` drifts too close to its edge
    pub fn update_build_area(&mut self, coord: CoordGrid, zones: u32, threshold: u32) {
        if !self.build_area.needs_rebuild(coord, threshold) {
            return;
        }
        self.build_area = BuildArea::centered_on(coord, zones);
        self.rebuild_pending = true;
        trace!(observer = self.index, area = ?self.build_area, "Build area recentred");
    }

    /// Assemble this tick's packets. Runs on a worker thread; reads only
    /// shared immutable state and this observer's own buffers.
    pub fn build_packets(&mut self, ctx: &AssemblyContext<'_>) -> Result<()> {
        self.packets = ObserverPackets::default();

        if self.rebuild_pending {
            self.payload.clear();
            self.rebuilder
                .write(self.build_area, ctx.zone_provider, &mut self.payload);
            frame_into(
                OutgoingOpcode::RebuildRegion,
                self.payload.as_bytes(),
                ctx.max_packet_size,
                &mut self.frame,
            )?;
            self.packets.rebuild = Some(SharedBuffer::from_packet(&self.frame));
        }

        let info = InfoContext {
            observer: self.index,
            variant: self.variant,
            build_area: self.build_area,
            registry: ctx.registry,
        };

        write_info(
            ViewKind::Players,
            &self.players,
            ctx.players,
            &info,
            &mut self.appearance_cache,
            &mut self.payload,
            &mut self.blocks,
        )?;
        frame_into(
            ViewKind::Players.opcode(),
            self.payload.as_bytes(),
            ctx.max_packet_size,
            &mut self.frame,
        )?;
        self.packets.player_info = Some(SharedBuffer::from_packet(&self.frame));

        write_info(
            ViewKind::Npcs,
            &self.npcs,
            ctx.npcs,
            &info,
            &mut self.appearance_cache,
            &mut self.payload,
            &mut self.blocks,
        )?;
        frame_into(
            ViewKind::Npcs.opcode(),
            self.payload.as_bytes(),
            ctx.max_packet_size,
            &mut self.frame,
        )?;
        self.packets.npc_info = Some(SharedBuffer::from_packet(&self.frame));

        Ok(())
    }

    /// Take the packets assembled this tick
    pub fn take_packets(&mut self) -> ObserverPackets {
        std::mem::take(&mut self.packets)
    }

    /// Record an assembly failure; its packets are discarded
    pub fn fail(&mut self, error: InfoError) {
        self.packets.release();
        self.failure = Some(error);
    }

    pub fn take_failure(&mut self) -> Option<InfoError> {
        self.failure.take()
    }

    /// The client received this tick's packets
    pub fn commit(&mut self) {
        self.players.commit();
        self.npcs.commit();
        self.rebuild_pending = false;
    }

    pub fn destroy(&mut self) {
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl PooledObject for Observer {
    type Args = ObserverArgs;

    fn create(args: ObserverArgs) -> Self {
        Self {
            index: args.index,
            variant: args.variant,
            build_area: BuildArea::EMPTY,
            rebuild_pending: false,
            rebuilder: RegionRebuilder::new(),
            players: ViewState::default(),
            npcs: ViewState::default(),
            appearance_cache: HashMap::new(),
            payload: PacketBuffer::new(),
            blocks: PacketBuffer::new(),
            frame: PacketBuffer::new(),
            packets: ObserverPackets::default(),
            failure: None,
            destroyed: false,
        }
    }

    fn on_alloc(&mut self, args: ObserverArgs) {
        self.index = args.index;
        self.variant = args.variant;
        self.build_area = BuildArea::EMPTY;
        self.rebuild_pending = false;
        self.rebuilder.reset();
        self.players.clear();
        self.npcs.clear();
        self.appearance_cache.clear();
        self.failure = None;
        self.destroyed = false;
    }

    fn on_dealloc(&mut self) {
        self.packets.release();
        self.payload.clear();
        self.blocks.clear();
        self.frame.clear();
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}
