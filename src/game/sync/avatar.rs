//! Tracked avatars
//!
//! An avatar is the info engine's view of one player or NPC: where it is,
//! where it was at the end of the previous tick, and its extended info.
//! Avatars live in the protocol's slabs and are recycled through an
//! `ObjectPool`.

use crate::game::coord::CoordGrid;
use crate::game::sync::cell_opcodes::{self, CellMovement};

use super::extended_info::{
    Appearance, Chat, ExtendedInfoSet, FaceCoord, FaceEntity, Hit, Say, Sequence, SpotAnim,
};
use super::pool::PooledObject;

/// Player or NPC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarKind {
    Player,
    Npc {
        /// NPC type id (14 bits on the wire)
        type_id: u16,
    },
}

/// Movement of an avatar since the previous tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarMovement {
    /// No movement this tick
    None,
    /// Walking (1 tile), single-cell opcode
    Walk(u8),
    /// Running (2 tiles), dual-cell opcode
    Run(u8),
    /// Teleport to new location
    Teleport,
}

/// Allocation parameters of an avatar
#[derive(Debug, Clone, Copy)]
pub struct AvatarArgs {
    pub index: u16,
    pub kind: AvatarKind,
    pub coord: CoordGrid,
}

#[derive(Debug, Clone)]
pub struct Avatar {
    index: u16,
    kind: AvatarKind,
    coord: CoordGrid,
    /// Coordinate at the end of the previous tick, the one the zone index holds
    last_coord: CoordGrid,
    teleport: bool,
    appearance_version: u32,
    destroyed: bool,
    pub extended_info: ExtendedInfoSet,
}

impl Avatar {
    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn kind(&self) -> AvatarKind {
        self.kind
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, AvatarKind::Player)
    }

    /// NPC type id, 0 for players
    pub fn type_id(&self) -> u16 {
        match self.kind {
            AvatarKind::Player => 0,
            AvatarKind::Npc { type_id } => type_id,
        }
    }

    pub fn coord(&self) -> CoordGrid {
        self.coord
    }

    pub fn last_coord(&self) -> CoordGrid {
        self.last_coord
    }

    /// Move to a new coordinate; small steps are sent as walk/run deltas.
    ///
    /// # Panics
    /// When `coord` is outside the world (see `CoordGrid::checked`).
    pub fn set_coord(&mut self, coord: CoordGrid) {
        self.coord = Self::in_world(coord);
    }

    /// Move with a full-coordinate update regardless of distance.
    ///
    /// # Panics
    /// When `coord` is outside the world.
    pub fn teleport(&mut self, coord: CoordGrid) {
        self.coord = Self::in_world(coord);
        self.teleport = true;
    }

    fn in_world(coord: CoordGrid) -> CoordGrid {
        match CoordGrid::checked(coord.level, coord.x, coord.z) {
            Ok(coord) => coord,
            Err(e) => panic!("avatar moved outside the world: {}", e),
        }
    }

    pub fn is_teleporting(&self) -> bool {
        self.teleport
    }

    /// Classify the move from `last_coord` to `coord`
    pub fn movement(&self) -> AvatarMovement {
        if self.teleport || self.coord.level != self.last_coord.level {
            return AvatarMovement::Teleport;
        }
        let (dx, dz) = self.last_coord.delta_to(&self.coord);
        match cell_opcodes::classify(dx, dz) {
            Ok(CellMovement::None) => AvatarMovement::None,
            Ok(CellMovement::Walk(opcode)) => AvatarMovement::Walk(opcode),
            Ok(CellMovement::Run(opcode)) => AvatarMovement::Run(opcode),
            Err(_) => AvatarMovement::Teleport,
        }
    }

    /// Version of the last precomputed appearance, 0 for none
    pub fn appearance_version(&self) -> u32 {
        self.appearance_version
    }

    pub(crate) fn set_appearance_version(&mut self, version: u32) {
        self.appearance_version = version;
    }

    /// Mark the avatar as unrecoverable; it leaves every view and is never
    /// pooled again
    pub fn destroy(&mut self) {
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // ============ Extended info ============

    pub fn set_appearance(&mut self, appearance: Appearance) {
        self.extended_info.appearance.set(appearance);
    }

    pub fn set_sequence(&mut self, id: u16, delay: u8) {
        self.extended_info.sequence.set(Sequence { id, delay });
    }

    pub fn set_spot_anim(&mut self, id: u16, height: u16, delay: u16) {
        self.extended_info
            .spot_anim
            .set(SpotAnim { id, height, delay });
    }

    pub fn say(&mut self, text: impl Into<String>) {
        self.extended_info.say.set(Say { text: text.into() });
    }

    pub fn set_chat(&mut self, effects: u16, rights: u8, message: Vec<u8>) {
        self.extended_info.chat.set(Chat {
            effects,
            rights,
            message,
        });
    }

    pub fn face_entity(&mut self, target: u16) {
        self.extended_info.face_entity.set(FaceEntity { target });
    }

    pub fn face_coord(&mut self, coord: CoordGrid) {
        self.extended_info
            .face_coord
            .set(FaceCoord::from_tile(coord.x as u16, coord.z as u16));
    }

    pub fn hit(&mut self, hit: Hit) {
        self.extended_info.hit = Some(hit);
    }

    /// End of tick: the current coordinate becomes the reference for the
    /// next delta and transient extended info is cleared
    pub(crate) fn post_update(&mut self) {
        self.last_coord = self.coord;
        self.teleport = false;
        self.extended_info.post_update();
    }
}

impl PooledObject for Avatar {
    type Args = AvatarArgs;

    fn create(args: AvatarArgs) -> Self {
        Self {
            index: args.index,
            kind: args.kind,
            coord: args.coord,
            last_coord: args.coord,
            teleport: false,
            appearance_version: 0,
            destroyed: false,
            extended_info: ExtendedInfoSet::new(),
        }
    }

    fn on_alloc(&mut self, args: AvatarArgs) {
        self.index = args.index;
        self.kind = args.kind;
        self.coord = args.coord;
        self.last_coord = args.coord;
        self.teleport = false;
        self.appearance_version = 0;
        self.destroyed = false;
        self.extended_info.reset();
    }

    fn on_dealloc(&mut self) {
        self.extended_info.release_buffers();
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}
